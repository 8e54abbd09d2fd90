use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::x509::X509Ref;
use std::fmt;

/// Certificate thumbprint: upper-case hex SHA-1 over the certificate DER.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(certificate: &X509Ref) -> Result<Self, ErrorStack> {
        let digest = certificate.digest(MessageDigest::sha1())?;
        Ok(Self(hex::encode_upper(&*digest)))
    }

    /// Parse a thumbprint as shown by certificate tools (spaces and colons allowed).
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let cleaned: String = text
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .collect();
        let bytes = hex::decode(&cleaned).ok()?;
        (bytes.len() == 20).then(|| Self(hex::encode_upper(bytes)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalises_case_and_separators() {
        let fp = Fingerprint::parse("ab:cd:ef:01:23:45:67:89:ab:cd:ef:01:23:45:67:89:ab:cd:ef:01")
            .expect("valid thumbprint");
        assert_eq!(fp.as_str(), "ABCDEF0123456789ABCDEF0123456789ABCDEF01");
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(Fingerprint::parse("ABCD").is_none());
        assert!(Fingerprint::parse("not hex").is_none());
    }
}
