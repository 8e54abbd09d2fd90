mod common;

use common::{CertOptions, TestIdentity, PASSPHRASE};
use smime_assembler::{
    AssemblyError, CertificateProvider, CertificateSource, FileStoreProvider, IdentityRef,
    OsStoreProvider, Passphrase, ResolutionFailure,
};
use tempfile::TempDir;

const SIGNER: &str = "forms@example.org";

fn resolution_cause(err: AssemblyError) -> ResolutionFailure {
    match err {
        AssemblyError::CertificateResolution { cause, .. } => cause,
        other => panic!("expected a resolution error, got: {other}"),
    }
}

#[test]
fn file_provider_loads_identity_with_key() {
    let dir = TempDir::new().unwrap();
    let signer = TestIdentity::generate(SIGNER);
    let path = signer.write_pkcs12(dir.path(), "signer.p12");

    let provider = FileStoreProvider::new(&path, Passphrase::new(PASSPHRASE));
    let identity = provider
        .resolve_signer(&IdentityRef::new(SIGNER))
        .expect("identity resolves");

    assert_eq!(identity.source(), CertificateSource::File);
    assert_eq!(identity.fingerprint().as_str(), signer.fingerprint_hex());
    assert!(identity.key_matches_certificate());
    assert!(provider.can_sign(&identity));
}

#[test]
fn file_provider_distinguishes_wrong_passphrase_from_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = TestIdentity::generate(SIGNER).write_pkcs12(dir.path(), "signer.p12");

    let wrong = FileStoreProvider::new(&path, Passphrase::new("not the passphrase"));
    let cause = resolution_cause(wrong.resolve_signer(&IdentityRef::new(SIGNER)).unwrap_err());
    assert_eq!(cause, ResolutionFailure::WrongPassphrase);

    let missing = FileStoreProvider::new(dir.path().join("absent.p12"), Passphrase::new(PASSPHRASE));
    let cause = resolution_cause(missing.resolve_signer(&IdentityRef::new(SIGNER)).unwrap_err());
    assert!(matches!(cause, ResolutionFailure::MissingFile(_)));
}

#[test]
fn legacy_key_file_with_right_passphrase_is_not_a_passphrase_error() {
    let dir = TempDir::new().unwrap();
    let signer = TestIdentity::generate(SIGNER);
    let path = signer.write_legacy_pkcs12(dir.path(), "legacy.p12");

    let provider = FileStoreProvider::new(&path, Passphrase::new(PASSPHRASE));
    match provider.resolve_signer(&IdentityRef::new(SIGNER)) {
        Ok(identity) => assert_eq!(identity.fingerprint().as_str(), signer.fingerprint_hex()),
        Err(err) => assert!(matches!(resolution_cause(err), ResolutionFailure::Malformed(_))),
    }

    let wrong = FileStoreProvider::new(&path, Passphrase::new("not the passphrase"));
    let cause = resolution_cause(wrong.resolve_signer(&IdentityRef::new(SIGNER)).unwrap_err());
    assert_eq!(cause, ResolutionFailure::WrongPassphrase);
}

#[test]
fn file_provider_rejects_non_pkcs12_content() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbage.p12");
    std::fs::write(&path, b"definitely not DER").unwrap();

    let provider = FileStoreProvider::new(&path, Passphrase::new(PASSPHRASE));
    let cause = resolution_cause(provider.resolve_signer(&IdentityRef::new("")).unwrap_err());
    assert!(matches!(cause, ResolutionFailure::Malformed(_)));
}

#[test]
fn file_provider_labels_errors_with_identity_reference() {
    let dir = TempDir::new().unwrap();
    let provider = FileStoreProvider::new(dir.path().join("absent.p12"), Passphrase::new(PASSPHRASE));
    match provider.resolve_signer(&IdentityRef::new("forms-signer")).unwrap_err() {
        AssemblyError::CertificateResolution { identity, .. } => assert_eq!(identity, "forms-signer"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn store_returns_first_match_in_file_name_order() {
    let store = TempDir::new().unwrap();
    let first = TestIdentity::generate(SIGNER);
    let second = TestIdentity::generate(SIGNER);
    second.write_store_entry(store.path(), "b-signer", true);
    first.write_store_entry(store.path(), "a-signer", true);

    let provider = OsStoreProvider::with_store_path(store.path());
    let identity = provider.resolve_signer(&IdentityRef::new(SIGNER)).unwrap();
    assert_eq!(identity.fingerprint().as_str(), first.fingerprint_hex());
    assert_eq!(identity.source(), CertificateSource::OsStore);
}

#[test]
fn store_lookup_ignores_case_of_mailbox() {
    let store = TempDir::new().unwrap();
    let signer = TestIdentity::generate(SIGNER);
    signer.write_store_entry(store.path(), "signer", true);

    let provider = OsStoreProvider::with_store_path(store.path());
    let identity = provider
        .resolve_signer(&IdentityRef::new("Forms@Example.org"))
        .unwrap();
    assert_eq!(identity.fingerprint().as_str(), signer.fingerprint_hex());
}

#[test]
fn store_skips_expired_certificates() {
    let store = TempDir::new().unwrap();
    let expired = TestIdentity::generate_with(SIGNER, CertOptions::expired());
    let current = TestIdentity::generate(SIGNER);
    expired.write_store_entry(store.path(), "a-expired", true);
    current.write_store_entry(store.path(), "b-current", true);

    let provider = OsStoreProvider::with_store_path(store.path());
    let identity = provider.resolve_signer(&IdentityRef::new(SIGNER)).unwrap();
    assert_eq!(identity.fingerprint().as_str(), current.fingerprint_hex());
}

#[test]
fn store_without_valid_match_reports_no_matching_certificate() {
    let store = TempDir::new().unwrap();
    TestIdentity::generate_with(SIGNER, CertOptions::expired())
        .write_store_entry(store.path(), "expired", true);
    TestIdentity::generate("someone-else@example.org").write_store_entry(store.path(), "other", true);

    let provider = OsStoreProvider::with_store_path(store.path());
    let cause = resolution_cause(provider.resolve_signer(&IdentityRef::new(SIGNER)).unwrap_err());
    assert_eq!(cause, ResolutionFailure::NoMatchingCertificate);
}

#[test]
fn keyless_store_certificate_resolves_but_cannot_sign() {
    let store = TempDir::new().unwrap();
    TestIdentity::generate(SIGNER).write_store_entry(store.path(), "signer", false);

    let provider = OsStoreProvider::with_store_path(store.path());
    let identity = provider.resolve_signer(&IdentityRef::new(SIGNER)).unwrap();
    assert!(identity.private_key().is_none());
    assert!(!provider.can_sign(&identity));
}

#[test]
fn key_usage_without_digital_signature_cannot_sign() {
    let store = TempDir::new().unwrap();
    TestIdentity::generate_with(SIGNER, CertOptions::encipher_only())
        .write_store_entry(store.path(), "signer", true);

    let provider = OsStoreProvider::with_store_path(store.path());
    let identity = provider.resolve_signer(&IdentityRef::new(SIGNER)).unwrap();
    assert!(identity.key_matches_certificate());
    assert!(!provider.can_sign(&identity));
}
