//! Cryptographic domain types.
//!
//! Provides strongly-typed wrappers for the certificate material that flows
//! through assembly:
//! - Certificate thumbprints used to bind addresses to an encryption key
//! - Resolved signer identities (certificate, private key, chain)
//! - Identity references and the configured certificate source
//! - Key file passphrases that are wiped on drop

mod fingerprint;
mod identity;
mod passphrase;

pub use fingerprint::Fingerprint;
pub use identity::{CertificateSource, Identity, IdentityRef};
pub use passphrase::Passphrase;
