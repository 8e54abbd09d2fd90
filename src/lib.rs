//! S/MIME secure email assembler.
//!
//! Turns a form-style `EmailRequest` into a signed (optional) and encrypted
//! (mandatory) S/MIME message ready to hand to any SMTP transport. The
//! signer identity comes from the current user's certificate store or from a
//! PKCS#12 key file, selected by `AssemblerConfiguration`.
//!
//! ```no_run
//! use smime_assembler::{AssemblerConfiguration, ConfigManager, EmailRequest, SecureEmailAssembler};
//!
//! # fn run() -> smime_assembler::AssemblyResult<()> {
//! let config: AssemblerConfiguration = ConfigManager::new()?.load()?;
//! let assembler = SecureEmailAssembler::from_config(config)?;
//! let message = assembler.assemble(&EmailRequest {
//!     recipient_email: "clerk@example.org".to_string(),
//!     subject: "Permit application".to_string(),
//!     body: "<p>See attached.</p>".to_string(),
//!     ..EmailRequest::default()
//! })?;
//! std::fs::write("out.eml", message.formatted())?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod services;

pub use infra::{config, error};

pub use adapters::{provider_for_config, CertificateProvider, FileStoreProvider, OsStoreProvider};
pub use domain::address::{AddressField, AddressSet, EmailAddress};
pub use domain::crypto::{CertificateSource, Fingerprint, Identity, IdentityRef, Passphrase};
pub use domain::message::{MessageHeaders, SecureMessage, TaggedMailbox};
pub use domain::mime::{AttachmentPart, MimeEntityTree};
pub use domain::request::EmailRequest;
pub use infra::config::{AssemblerConfiguration, ConfigManager, ContentCipher, ExportFormat};
pub use infra::error::{AssemblyError, AssemblyResult, ResolutionFailure};
pub use services::{
    AddressValidator, CertificateValidator, EnvelopeContent, MessageBuilder, OpenedContent,
    SecureEmailAssembler, SecureEnvelope,
};
