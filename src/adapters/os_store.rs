//! Current-user certificate store provider.
//!
//! The store is a per-user directory of certificates (`*.pem`, `*.crt`,
//! `*.cer`, PEM or DER). A private key for `name.pem` lives next to it as
//! `name.key` (unencrypted PEM, protected by file permissions like any user
//! key store). The store is opened read-only for each lookup and released
//! when the lookup returns.
//!
//! Several valid certificates may be bound to the same mailbox. Lookup
//! returns the first one in enumeration order (file name order) and logs
//! the ambiguity; it does not try to pick a "best" certificate.

use crate::adapters::provider::CertificateProvider;
use crate::domain::address::AddressField;
use crate::domain::crypto::{CertificateSource, Identity, IdentityRef};
use crate::infra::error::{AssemblyError, AssemblyResult, ResolutionFailure};
use crate::services::address_validator::AddressValidator;
use crate::services::cert_validator::CertificateValidator;
use openssl::pkey::PKey;
use openssl::x509::X509;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

const CERTIFICATE_EXTENSIONS: [&str; 3] = ["pem", "crt", "cer"];
const KEY_EXTENSION: &str = "key";

pub struct OsStoreProvider {
    store_path: PathBuf,
}

impl OsStoreProvider {
    /// Provider over the current user's default store directory.
    pub fn for_current_user() -> AssemblyResult<Self> {
        let store_path = Self::default_store_path().ok_or_else(|| {
            AssemblyError::ConfigurationError(
                "Could not determine the user configuration directory for the certificate store"
                    .to_string(),
            )
        })?;
        Ok(Self { store_path })
    }

    pub fn with_store_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            store_path: path.as_ref().to_path_buf(),
        }
    }

    /// `<config_dir>/smime-assembler/certs`
    #[must_use]
    pub fn default_store_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("smime-assembler").join("certs"))
    }

    #[must_use]
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }
}

impl CertificateProvider for OsStoreProvider {
    fn source(&self) -> CertificateSource {
        CertificateSource::OsStore
    }

    fn resolve_signer(&self, identity: &IdentityRef) -> AssemblyResult<Identity> {
        let mailbox = AddressValidator::validate_single(identity.as_str(), AddressField::From)
            .map_err(|_| {
                AssemblyError::resolution(
                    identity.as_str(),
                    ResolutionFailure::Malformed(
                        "store lookups need a mailbox address as identity reference".to_string(),
                    ),
                )
            })?;

        log::info!("Looking up certificate for {mailbox} in user certificate store");
        let store = UserCertificateStore::open(&self.store_path)
            .map_err(|cause| AssemblyError::resolution(identity.as_str(), cause))?;

        let matches = store.certificates_for(mailbox.as_str());
        if matches.len() > 1 {
            log::warn!(
                "{} valid certificates match {mailbox}; using the first in store order ({})",
                matches.len(),
                matches[0].cert_path.display()
            );
        }
        let entry = matches.first().ok_or_else(|| {
            AssemblyError::resolution(identity.as_str(), ResolutionFailure::NoMatchingCertificate)
        })?;

        let resolved = store
            .load_identity(entry)
            .map_err(|cause| AssemblyError::resolution(identity.as_str(), cause))?;
        log::debug!("Resolved certificate {}", resolved.fingerprint());
        Ok(resolved)
    }

    fn can_sign(&self, identity: &Identity) -> bool {
        if !identity.key_matches_certificate() {
            log::debug!("No usable private key for {}", identity.fingerprint());
            return false;
        }
        let valid = CertificateValidator::is_within_validity(identity.certificate()).unwrap_or(false);
        let usage = CertificateValidator::permits_digital_signature(identity.certificate())
            .unwrap_or(false);
        valid && usage
    }
}

/// One certificate file in the store.
struct StoreEntry {
    cert_path: PathBuf,
    certificate: X509,
    key_path: Option<PathBuf>,
}

/// Read-only view of a store directory, enumerated in file name order.
struct UserCertificateStore {
    entries: Vec<StoreEntry>,
}

impl UserCertificateStore {
    fn open(root: &Path) -> Result<Self, ResolutionFailure> {
        let listing = fs::read_dir(root).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ResolutionFailure::StoreUnavailable(format!(
                "store directory {} does not exist",
                root.display()
            )),
            _ => ResolutionFailure::StoreUnavailable(format!("{}: {e}", root.display())),
        })?;

        let mut cert_paths = Vec::new();
        for entry in listing {
            let path = entry
                .map_err(|e| ResolutionFailure::StoreUnavailable(e.to_string()))?
                .path();
            if path.is_file() && has_extension(&path, &CERTIFICATE_EXTENSIONS) {
                cert_paths.push(path);
            }
        }
        cert_paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut entries = Vec::with_capacity(cert_paths.len());
        for cert_path in cert_paths {
            let certificate = match read_certificate(&cert_path) {
                Ok(certificate) => certificate,
                Err(e) => {
                    log::debug!("Skipping unreadable store entry {}: {e}", cert_path.display());
                    continue;
                }
            };
            let key_path = Some(cert_path.with_extension(KEY_EXTENSION)).filter(|p| p.is_file());
            entries.push(StoreEntry {
                cert_path,
                certificate,
                key_path,
            });
        }
        log::debug!("Opened certificate store {} ({} entries)", root.display(), entries.len());
        Ok(Self { entries })
    }

    /// Currently valid certificates bound to `address`, in store order.
    fn certificates_for(&self, address: &str) -> Vec<&StoreEntry> {
        self.entries
            .iter()
            .filter(|entry| CertificateValidator::covers_address(&entry.certificate, address))
            .filter(|entry| {
                let valid = CertificateValidator::is_within_validity(&entry.certificate)
                    .unwrap_or(false);
                if !valid {
                    log::debug!("Ignoring out-of-date certificate {}", entry.cert_path.display());
                }
                valid
            })
            .collect()
    }

    fn load_identity(&self, entry: &StoreEntry) -> Result<Identity, ResolutionFailure> {
        let private_key = match &entry.key_path {
            Some(key_path) => {
                warn_if_key_exposed(key_path);
                let pem = Zeroizing::new(fs::read(key_path).map_err(|e| {
                    ResolutionFailure::StoreUnavailable(format!("{}: {e}", key_path.display()))
                })?);
                match PKey::private_key_from_pem(&pem) {
                    Ok(key) => Some(key),
                    Err(e) => {
                        log::warn!("Ignoring unreadable private key {}: {e}", key_path.display());
                        None
                    }
                }
            }
            None => None,
        };

        Identity::new(
            entry.certificate.clone(),
            private_key,
            Vec::new(),
            CertificateSource::OsStore,
        )
        .map_err(|e| ResolutionFailure::Malformed(e.to_string()))
    }
}

impl Drop for UserCertificateStore {
    fn drop(&mut self) {
        log::debug!("Closed certificate store");
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

fn read_certificate(path: &Path) -> Result<X509, String> {
    let bytes = fs::read(path).map_err(|e| e.to_string())?;
    X509::from_pem(&bytes)
        .or_else(|_| X509::from_der(&bytes))
        .map_err(|e| e.to_string())
}

#[cfg(unix)]
fn warn_if_key_exposed(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(metadata) = fs::metadata(path) {
        if metadata.permissions().mode() & 0o077 != 0 {
            log::warn!("Private key {} is readable by other users", path.display());
        }
    }
}

#[cfg(not(unix))]
fn warn_if_key_exposed(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_certificate_extensions() {
        assert!(has_extension(Path::new("a.pem"), &CERTIFICATE_EXTENSIONS));
        assert!(has_extension(Path::new("a.CRT"), &CERTIFICATE_EXTENSIONS));
        assert!(!has_extension(Path::new("a.key"), &CERTIFICATE_EXTENSIONS));
        assert!(!has_extension(Path::new("README"), &CERTIFICATE_EXTENSIONS));
    }

    #[test]
    fn missing_store_directory_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let provider = OsStoreProvider::with_store_path(dir.path().join("absent"));
        let err = provider
            .resolve_signer(&IdentityRef::new("signer@example.com"))
            .unwrap_err();
        match err {
            AssemblyError::CertificateResolution { identity, cause } => {
                assert_eq!(identity, "signer@example.com");
                assert!(matches!(cause, ResolutionFailure::StoreUnavailable(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn identity_reference_must_be_a_mailbox() {
        let dir = tempfile::TempDir::new().unwrap();
        let provider = OsStoreProvider::with_store_path(dir.path());
        let err = provider.resolve_signer(&IdentityRef::new("")).unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::CertificateResolution {
                cause: ResolutionFailure::Malformed(_),
                ..
            }
        ));
    }

    #[test]
    fn empty_store_has_no_match() {
        let dir = tempfile::TempDir::new().unwrap();
        let provider = OsStoreProvider::with_store_path(dir.path());
        let err = provider
            .resolve_signer(&IdentityRef::new("signer@example.com"))
            .unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::CertificateResolution {
                cause: ResolutionFailure::NoMatchingCertificate,
                ..
            }
        ));
    }
}
