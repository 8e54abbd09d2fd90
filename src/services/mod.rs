//! Service layer module root.
//! Contains address validation, MIME building and the S/MIME envelope services.

pub mod address_validator;
pub mod assembler;
pub mod cert_validator;
pub mod envelope;
pub mod message_builder;

pub use address_validator::AddressValidator;
pub use assembler::SecureEmailAssembler;
pub use cert_validator::{CertificateAnalysis, CertificateValidator};
pub use envelope::{EncryptedEntity, EnvelopeContent, OpenedContent, SecureEnvelope, SignedEntity};
pub use message_builder::MessageBuilder;
