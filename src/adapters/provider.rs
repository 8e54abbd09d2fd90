//! Certificate provider trait shared by the identity sources.
//!
//! Two implementations are selected by configuration:
//! - user certificate store lookup by mailbox (`OsStoreProvider`)
//! - PKCS#12 file loaded into an ephemeral store per call (`FileStoreProvider`)

use crate::adapters::file_store::FileStoreProvider;
use crate::adapters::os_store::OsStoreProvider;
use crate::domain::crypto::{CertificateSource, Identity, IdentityRef};
use crate::infra::config::AssemblerConfiguration;
use crate::infra::error::{AssemblyError, AssemblyResult};

/// Resolves signer identities.
///
/// Implementations hold no per-call state; every `resolve_signer` call opens
/// and releases its own store handle.
pub trait CertificateProvider: Send + Sync {
    /// Which source this provider reads from.
    fn source(&self) -> CertificateSource;

    /// Resolve the certificate (and private key, when available) for a signer.
    ///
    /// # Errors
    ///
    /// Returns `CertificateResolution` carrying `identity` when the store or
    /// file cannot produce a usable certificate.
    fn resolve_signer(&self, identity: &IdentityRef) -> AssemblyResult<Identity>;

    /// Whether the resolved identity can produce signatures.
    fn can_sign(&self, identity: &Identity) -> bool;
}

/// Build the provider selected by `certificate_source`.
///
/// # Errors
///
/// Returns a configuration error when the selected source is missing its settings.
pub fn provider_for_config(
    config: &AssemblerConfiguration,
) -> AssemblyResult<Box<dyn CertificateProvider>> {
    match config.certificate_source {
        CertificateSource::OsStore => {
            let provider = match &config.certificate_store_path {
                Some(path) => OsStoreProvider::with_store_path(path),
                None => OsStoreProvider::for_current_user()?,
            };
            log::debug!("Using user certificate store provider");
            Ok(Box::new(provider))
        }
        CertificateSource::File => {
            let path = config.certificate_file_path.as_ref().ok_or_else(|| {
                AssemblyError::ConfigurationError(
                    "certificate_file_path is required for the file certificate source"
                        .to_string(),
                )
            })?;
            if config.certificate_passphrase.is_empty() {
                return Err(AssemblyError::ConfigurationError(
                    "certificate_passphrase is required for the file certificate source"
                        .to_string(),
                ));
            }
            log::debug!("Using PKCS#12 file provider: {}", path.display());
            Ok(Box::new(FileStoreProvider::new(
                path,
                config.certificate_passphrase.clone(),
            )))
        }
    }
}
