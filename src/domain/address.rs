//! Validated e-mail address types.

use indexmap::IndexSet;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Which message field an address belongs to. Used to label validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressField {
    From,
    Sender,
    Recipient,
    Cc,
    Bcc,
    ReplyTo,
    FormsInbox,
}

impl AddressField {
    /// Human readable label used in error messages.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            AddressField::From => "from",
            AddressField::Sender => "sender",
            AddressField::Recipient => "recipient",
            AddressField::Cc => "recipient (CC)",
            AddressField::Bcc => "recipient (BCC)",
            AddressField::ReplyTo => "reply to",
            AddressField::FormsInbox => "forms inbox",
        }
    }
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single validated `addr-spec`.
///
/// Only produced by the address validator, so holding one means the text
/// round-tripped through mailbox parsing unchanged.
#[derive(Debug, Clone)]
pub struct EmailAddress {
    address: lettre::Address,
}

impl EmailAddress {
    pub(crate) fn from_parsed(address: lettre::Address) -> Self {
        Self { address }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.address.as_ref()
    }

    /// The underlying `lettre` address, for building transport headers.
    #[must_use]
    pub fn as_lettre(&self) -> &lettre::Address {
        &self.address
    }

    /// Case-insensitive comparison used when matching certificate e-mail bindings.
    #[must_use]
    pub fn matches_ignore_case(&self, other: &str) -> bool {
        self.as_str().eq_ignore_ascii_case(other.trim())
    }
}

impl PartialEq for EmailAddress {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for EmailAddress {}

impl Hash for EmailAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

// Hash and Eq both go through the address text, so lookups by `&str` agree.
impl Borrow<str> for EmailAddress {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl PartialOrd for EmailAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EmailAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deduplicated set of addresses parsed from one raw field.
///
/// Iteration follows first occurrence in the input; equality ignores order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressSet {
    members: IndexSet<EmailAddress>,
}

impl AddressSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an address unless it is already present. Returns whether it was added.
    pub fn insert(&mut self, address: EmailAddress) -> bool {
        self.members.insert(address)
    }

    #[must_use]
    pub fn contains(&self, address: &EmailAddress) -> bool {
        self.members.contains(address)
    }

    #[must_use]
    pub fn contains_str(&self, address: &str) -> bool {
        self.members.contains(address)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmailAddress> {
        self.members.iter()
    }
}

impl<'a> IntoIterator for &'a AddressSet {
    type Item = &'a EmailAddress;
    type IntoIter = indexmap::set::Iter<'a, EmailAddress>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}
