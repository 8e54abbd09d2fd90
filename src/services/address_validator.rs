//! Address validation service.
//!
//! Raw address fields are split on `;` and `,`, trimmed, and each token must
//! survive mailbox parsing unchanged. A field either validates completely or
//! fails with one error naming the field.

use crate::domain::address::{AddressField, AddressSet, EmailAddress};
use crate::infra::error::{AssemblyError, AssemblyResult};

const SEPARATORS: [char; 2] = [';', ','];

pub struct AddressValidator;

impl AddressValidator {
    /// Validate a field that must contain exactly one address.
    pub fn validate_single(raw: &str, field: AddressField) -> AssemblyResult<EmailAddress> {
        Self::parse_token(raw.trim()).ok_or_else(|| Self::invalid(field))
    }

    /// Validate an optional multi-address field. An empty result is allowed.
    pub fn validate(raw: &str, field: AddressField) -> AssemblyResult<AddressSet> {
        let mut set = AddressSet::new();
        for token in raw.split(&SEPARATORS[..]).map(str::trim).filter(|t| !t.is_empty()) {
            let address = Self::parse_token(token).ok_or_else(|| Self::invalid(field))?;
            set.insert(address);
        }
        Ok(set)
    }

    /// Validate a multi-address field that must yield at least one address.
    pub fn validate_required(raw: &str, field: AddressField) -> AssemblyResult<AddressSet> {
        let set = Self::validate(raw, field)?;
        if set.is_empty() {
            return Err(Self::invalid(field));
        }
        Ok(set)
    }

    /// Parse one trimmed token. The canonical form must equal the input,
    /// so the parser never silently repairs malformed text.
    fn parse_token(token: &str) -> Option<EmailAddress> {
        if token.is_empty() || token.ends_with('.') {
            return None;
        }
        let (local, _) = token.rsplit_once('@')?;
        if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
            return None;
        }
        let parsed: lettre::Address = token.parse().ok()?;
        if AsRef::<str>::as_ref(&parsed) != token {
            return None;
        }
        Some(EmailAddress::from_parsed(parsed))
    }

    fn invalid(field: AddressField) -> AssemblyError {
        log::warn!("Rejected {field} address field");
        AssemblyError::InvalidAddress(field)
    }
}
