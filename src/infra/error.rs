//! Error types for secure message assembly.
//! Every variant is terminal for a single assembly call.

use crate::domain::address::AddressField;
use thiserror::Error;

/// Result type for assembly operations
pub type AssemblyResult<T> = Result<T, AssemblyError>;

/// Why a signer identity could not be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionFailure {
    #[error("certificate file not found: {0}")]
    MissingFile(String),

    #[error("wrong passphrase for certificate file")]
    WrongPassphrase,

    #[error("no valid certificate in the store matches the address")]
    NoMatchingCertificate,

    #[error("no private key available for the certificate")]
    MissingPrivateKey,

    #[error("no certificate found in the key file")]
    MissingCertificate,

    #[error("certificate store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("malformed certificate material: {0}")]
    Malformed(String),
}

/// Comprehensive error types for assembly operations
#[derive(Error, Debug, miette::Diagnostic)]
pub enum AssemblyError {
    #[error("Invalid {0} address")]
    #[diagnostic(help("addresses must be plain addr-spec values separated by ';' or ','"))]
    InvalidAddress(AddressField),

    #[error("Could not resolve certificate for '{identity}': {cause}")]
    CertificateResolution {
        identity: String,
        cause: ResolutionFailure,
    },

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Signature verification failed: {0}")]
    VerificationFailed(String),

    #[error("Message format error: {0}")]
    MessageFormat(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Worker error: {0}")]
    WorkerFailed(String),
}

impl AssemblyError {
    pub(crate) fn resolution(identity: impl Into<String>, cause: ResolutionFailure) -> Self {
        AssemblyError::CertificateResolution {
            identity: identity.into(),
            cause,
        }
    }
}

impl From<std::io::Error> for AssemblyError {
    fn from(error: std::io::Error) -> Self {
        AssemblyError::IoError(error.to_string())
    }
}

impl From<lettre::error::Error> for AssemblyError {
    fn from(error: lettre::error::Error) -> Self {
        AssemblyError::MessageFormat(error.to_string())
    }
}

impl From<der::Error> for AssemblyError {
    fn from(error: der::Error) -> Self {
        AssemblyError::MessageFormat(format!("ASN.1: {error}"))
    }
}

// OpenSSL failures are mapped at each call site: the same ErrorStack means
// different things during signing, encryption or identity loading.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AssemblyError::InvalidAddress(AddressField::Cc);
        assert_eq!(error.to_string(), "Invalid recipient (CC) address");

        let error = AssemblyError::SigningFailed("no key".to_string());
        assert_eq!(error.to_string(), "Signing failed: no key");
    }

    #[test]
    fn test_resolution_error_carries_identity() {
        let error = AssemblyError::resolution("signer@example.com", ResolutionFailure::WrongPassphrase);
        match &error {
            AssemblyError::CertificateResolution { identity, cause } => {
                assert_eq!(identity, "signer@example.com");
                assert_eq!(cause, &ResolutionFailure::WrongPassphrase);
            }
            _ => panic!("Wrong error type"),
        }
        assert!(error.to_string().contains("signer@example.com"));
    }
}
