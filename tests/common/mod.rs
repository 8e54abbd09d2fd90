//! Shared helpers for integration tests.
//!
//! Generates throw-away self-signed S/MIME identities and writes them in the
//! layouts the certificate providers read: PKCS#12 key files and PEM store
//! directories.

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{ExtendedKeyUsage, KeyUsage, SubjectAlternativeName};
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use smime_assembler::{CertificateSource, Identity};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const PASSPHRASE: &str = "correct horse battery staple";

const DAY: i64 = 24 * 60 * 60;

static NEXT_SERIAL: AtomicU32 = AtomicU32::new(1);

/// Knobs for generated certificates.
#[derive(Debug, Clone, Copy)]
pub struct CertOptions {
    /// Validity window relative to now, in days.
    pub valid_from_days: i64,
    pub valid_until_days: i64,
    /// Include digitalSignature in key usage.
    pub digital_signature: bool,
}

impl Default for CertOptions {
    fn default() -> Self {
        Self {
            valid_from_days: -1,
            valid_until_days: 30,
            digital_signature: true,
        }
    }
}

impl CertOptions {
    pub fn expired() -> Self {
        Self {
            valid_from_days: -30,
            valid_until_days: -1,
            ..Self::default()
        }
    }

    pub fn encipher_only() -> Self {
        Self {
            digital_signature: false,
            ..Self::default()
        }
    }
}

pub struct TestIdentity {
    pub email: String,
    pub cert: X509,
    pub key: PKey<Private>,
}

impl TestIdentity {
    pub fn generate(email: &str) -> Self {
        Self::generate_with(email, CertOptions::default())
    }

    pub fn generate_with(email: &str, options: CertOptions) -> Self {
        let rsa = Rsa::generate(2048).expect("Should generate RSA key");
        let key = PKey::from_rsa(rsa).expect("Should create PKey");

        let mut name = X509NameBuilder::new().expect("Should create name builder");
        name.append_entry_by_text("CN", "Forms Test Signer")
            .expect("Should add CN");
        name.append_entry_by_nid(Nid::PKCS9_EMAILADDRESS, email)
            .expect("Should add emailAddress");
        let name = name.build();

        let mut builder = X509Builder::new().expect("Should create X509 builder");
        builder.set_version(2).expect("Should set version");
        let serial = BigNum::from_u32(NEXT_SERIAL.fetch_add(1, Ordering::SeqCst))
            .expect("Should create serial")
            .to_asn1_integer()
            .expect("Should convert serial");
        builder.set_serial_number(&serial).expect("Should set serial");
        builder.set_subject_name(&name).expect("Should set subject");
        builder.set_issuer_name(&name).expect("Should set issuer");

        let not_before = time_from_now(options.valid_from_days);
        let not_after = time_from_now(options.valid_until_days);
        builder.set_not_before(&not_before).expect("Should set not_before");
        builder.set_not_after(&not_after).expect("Should set not_after");
        builder.set_pubkey(&key).expect("Should set pubkey");

        let mut key_usage = KeyUsage::new();
        key_usage.critical().key_encipherment();
        if options.digital_signature {
            key_usage.digital_signature();
        }
        builder
            .append_extension(key_usage.build().expect("Should build key usage"))
            .expect("Should add key usage");
        builder
            .append_extension(
                ExtendedKeyUsage::new()
                    .email_protection()
                    .build()
                    .expect("Should build EKU"),
            )
            .expect("Should add EKU");
        let san = SubjectAlternativeName::new()
            .email(email)
            .build(&builder.x509v3_context(None, None))
            .expect("Should build SAN");
        builder.append_extension(san).expect("Should add SAN");

        builder
            .sign(&key, MessageDigest::sha256())
            .expect("Should sign");

        Self {
            email: email.to_string(),
            cert: builder.build(),
            key,
        }
    }

    /// A resolved identity carrying the private key.
    pub fn identity(&self) -> Identity {
        Identity::new(
            self.cert.clone(),
            Some(self.key.clone()),
            Vec::new(),
            CertificateSource::File,
        )
        .expect("Should create identity")
    }

    /// A resolved identity without private key material.
    pub fn public_identity(&self) -> Identity {
        Identity::new(self.cert.clone(), None, Vec::new(), CertificateSource::OsStore)
            .expect("Should create identity")
    }

    /// Write a password-protected PKCS#12 file and return its path.
    pub fn write_pkcs12(&self, dir: &Path, file_name: &str) -> PathBuf {
        let pkcs12 = Pkcs12::builder()
            .name("forms-signer")
            .pkey(&self.key)
            .cert(&self.cert)
            .build2(PASSPHRASE)
            .expect("Should build PKCS#12");
        let path = dir.join(file_name);
        std::fs::write(&path, pkcs12.to_der().expect("Should encode PKCS#12"))
            .expect("Should write PKCS#12");
        path
    }

    /// Write a PKCS#12 file the way older Windows exports do: SHA-1 MAC,
    /// 3DES key bag and an RC2-40 certificate bag. Falls back to a 3DES
    /// certificate bag when the linked OpenSSL has no RC2.
    pub fn write_legacy_pkcs12(&self, dir: &Path, file_name: &str) -> PathBuf {
        let build = |cert_algorithm: Nid| {
            Pkcs12::builder()
                .name("forms-signer")
                .pkey(&self.key)
                .cert(&self.cert)
                .key_algorithm(Nid::PBE_WITHSHA1AND3_KEY_TRIPLEDES_CBC)
                .cert_algorithm(cert_algorithm)
                .mac_md(MessageDigest::sha1())
                .build2(PASSPHRASE)
        };
        let pkcs12 = build(Nid::PBE_WITHSHA1AND40BITRC2_CBC)
            .or_else(|_| build(Nid::PBE_WITHSHA1AND3_KEY_TRIPLEDES_CBC))
            .expect("Should build legacy PKCS#12");
        let path = dir.join(file_name);
        std::fs::write(&path, pkcs12.to_der().expect("Should encode PKCS#12"))
            .expect("Should write PKCS#12");
        path
    }

    /// Write `<stem>.pem` (and `<stem>.key` when `with_key`) into a store directory.
    pub fn write_store_entry(&self, store: &Path, stem: &str, with_key: bool) {
        std::fs::write(
            store.join(format!("{stem}.pem")),
            self.cert.to_pem().expect("Should encode certificate"),
        )
        .expect("Should write certificate");
        if with_key {
            let key_path = store.join(format!("{stem}.key"));
            std::fs::write(
                &key_path,
                self.key
                    .private_key_to_pem_pkcs8()
                    .expect("Should encode key"),
            )
            .expect("Should write key");
            restrict_permissions(&key_path);
        }
    }

    pub fn fingerprint_hex(&self) -> String {
        hex_upper(&self.cert.digest(MessageDigest::sha1()).expect("Should digest"))
    }
}

fn time_from_now(days: i64) -> Asn1Time {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Clock before epoch")
        .as_secs() as i64;
    Asn1Time::from_unix(now + days * DAY).expect("Should create time")
}

fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .expect("Should set key permissions");
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}
