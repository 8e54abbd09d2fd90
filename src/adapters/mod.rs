//! Adapter layer modules for certificate sources.
//!
//! Provides adapters for:
//! - The current user's certificate store, looked up by mailbox
//! - PKCS#12 key files imported into a per-call ephemeral store

pub mod file_store;
pub mod os_store;
pub mod provider;

pub use file_store::FileStoreProvider;
pub use os_store::OsStoreProvider;
pub use provider::{provider_for_config, CertificateProvider};
