//! Domain types for secure message assembly.

pub mod address;
pub mod crypto;
pub mod message;
pub mod mime;
pub mod request;
