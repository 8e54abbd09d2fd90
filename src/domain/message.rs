//! The finished, transport-ready secure message.

use super::address::EmailAddress;
use super::crypto::Fingerprint;
use lettre::Message;
use std::fmt;
use std::time::SystemTime;

/// An address bound to the certificate used to encrypt for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedMailbox {
    address: EmailAddress,
    fingerprint: Fingerprint,
}

impl TaggedMailbox {
    #[must_use]
    pub fn new(address: EmailAddress, fingerprint: Fingerprint) -> Self {
        Self {
            address,
            fingerprint,
        }
    }

    #[must_use]
    pub fn address(&self) -> &EmailAddress {
        &self.address
    }

    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub(crate) fn to_mailbox(&self) -> lettre::message::Mailbox {
        lettre::message::Mailbox::new(None, self.address.as_lettre().clone())
    }
}

impl fmt::Display for TaggedMailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.address, self.fingerprint)
    }
}

/// Header fields of a secure message.
#[derive(Debug, Clone)]
pub struct MessageHeaders {
    pub from: TaggedMailbox,
    pub sender: TaggedMailbox,
    pub to: Vec<TaggedMailbox>,
    pub cc: Vec<TaggedMailbox>,
    pub bcc: Vec<TaggedMailbox>,
    pub reply_to: Vec<TaggedMailbox>,
    pub subject: String,
    pub date: SystemTime,
}

impl MessageHeaders {
    /// Every mailbox the message is delivered to (To, Cc and Bcc).
    pub fn recipients(&self) -> impl Iterator<Item = &TaggedMailbox> {
        self.to.iter().chain(self.cc.iter()).chain(self.bcc.iter())
    }
}

/// Output of one assembly call. Immutable once returned.
pub struct SecureMessage {
    headers: MessageHeaders,
    signed: bool,
    enveloped_der: Vec<u8>,
    message: Message,
}

impl SecureMessage {
    pub(crate) fn new(
        headers: MessageHeaders,
        signed: bool,
        enveloped_der: Vec<u8>,
        message: Message,
    ) -> Self {
        Self {
            headers,
            signed,
            enveloped_der,
            message,
        }
    }

    #[must_use]
    pub fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    /// Whether the encrypted content carries a detached signature.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// The PKCS#7 EnvelopedData structure carried in the body.
    #[must_use]
    pub fn enveloped_der(&self) -> &[u8] {
        &self.enveloped_der
    }

    /// The message handed to a transport. Its envelope includes Bcc recipients.
    #[must_use]
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// RFC 5322 bytes with CRLF line endings. Bcc is not written as a header.
    #[must_use]
    pub fn formatted(&self) -> Vec<u8> {
        self.message.formatted()
    }
}

impl fmt::Debug for SecureMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureMessage")
            .field("headers", &self.headers)
            .field("signed", &self.signed)
            .field("enveloped_len", &self.enveloped_der.len())
            .finish()
    }
}
