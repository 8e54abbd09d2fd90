//! Certificate validation service for S/MIME identities.

use crate::infra::error::{AssemblyError, AssemblyResult};
use der::oid::{AssociatedOid, ObjectIdentifier};
use der::Decode;
use openssl::asn1::Asn1Time;
use openssl::nid::Nid;
use openssl::x509::{X509NameRef, X509Ref};
use std::cmp::Ordering;
use x509_cert::ext::pkix::{ExtendedKeyUsage, KeyUsage};
use x509_cert::Certificate;

/// id-kp-emailProtection
const ID_KP_EMAIL_PROTECTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.4");

#[derive(Debug, Clone)]
pub struct CertificateAnalysis {
    pub is_smime_suitable: bool,
    pub within_validity: bool,
    /// `None` when the certificate has no KeyUsage extension (no restriction).
    pub can_digital_sign: Option<bool>,
    pub can_key_encipher: Option<bool>,
    pub has_email_protection_eku: Option<bool>,
    pub email_addresses: Vec<String>,
    pub warnings: Vec<String>,
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
}

pub struct CertificateValidator;

impl CertificateValidator {
    pub fn validate_for_smime(certificate: &X509Ref) -> AssemblyResult<CertificateAnalysis> {
        let parsed = Self::parse(certificate)?;
        let key_usage = Self::key_usage(&parsed)?;
        let email_protection = Self::email_protection_eku(&parsed)?;

        let mut analysis = CertificateAnalysis {
            is_smime_suitable: false,
            within_validity: Self::is_within_validity(certificate)?,
            can_digital_sign: key_usage.as_ref().map(KeyUsage::digital_signature),
            can_key_encipher: key_usage.as_ref().map(KeyUsage::key_encipherment),
            has_email_protection_eku: email_protection,
            email_addresses: Self::email_addresses(certificate),
            warnings: Vec::new(),
            subject: Self::format_name(certificate.subject_name()),
            issuer: Self::format_name(certificate.issuer_name()),
            serial_number: Self::serial_number(certificate),
        };

        log::debug!("Certificate subject: {}", analysis.subject);
        log::debug!("Certificate issuer: {}", analysis.issuer);

        if !analysis.within_validity {
            analysis
                .warnings
                .push("Certificate is expired or not yet valid".to_string());
        }
        if analysis.can_digital_sign == Some(false) {
            analysis
                .warnings
                .push("Key usage does not allow digital signatures".to_string());
        }
        if analysis.can_key_encipher == Some(false) {
            analysis
                .warnings
                .push("Key usage does not allow key encipherment".to_string());
        }
        if analysis.has_email_protection_eku == Some(false) {
            analysis
                .warnings
                .push("Certificate lacks the E-mail Protection extended key usage".to_string());
        }
        if analysis.email_addresses.is_empty() {
            analysis
                .warnings
                .push("Certificate is not bound to any e-mail address".to_string());
        }

        analysis.is_smime_suitable = analysis.within_validity
            && analysis.can_key_encipher != Some(false)
            && analysis.has_email_protection_eku != Some(false)
            && !analysis.email_addresses.is_empty();

        if !analysis.is_smime_suitable {
            for warning in &analysis.warnings {
                log::warn!("  - {warning}");
            }
        }

        Ok(analysis)
    }

    /// E-mail addresses bound to the certificate: subjectAltName rfc822Name
    /// entries first, then subject emailAddress attributes.
    #[must_use]
    pub fn email_addresses(certificate: &X509Ref) -> Vec<String> {
        let mut addresses = Vec::new();
        if let Some(names) = certificate.subject_alt_names() {
            for name in &names {
                if let Some(email) = name.email() {
                    addresses.push(email.trim().to_string());
                }
            }
        }
        for entry in certificate
            .subject_name()
            .entries_by_nid(Nid::PKCS9_EMAILADDRESS)
        {
            if let Ok(email) = entry.data().as_utf8() {
                let email = email.trim().to_string();
                if !addresses.iter().any(|a| a.eq_ignore_ascii_case(&email)) {
                    addresses.push(email);
                }
            }
        }
        addresses
    }

    #[must_use]
    pub fn covers_address(certificate: &X509Ref, address: &str) -> bool {
        let address = address.trim();
        Self::email_addresses(certificate)
            .iter()
            .any(|bound| bound.eq_ignore_ascii_case(address))
    }

    pub fn is_within_validity(certificate: &X509Ref) -> AssemblyResult<bool> {
        let now = Asn1Time::days_from_now(0).map_err(Self::crypto_error)?;
        let started = certificate
            .not_before()
            .compare(&now)
            .map_err(Self::crypto_error)?
            != Ordering::Greater;
        let unexpired = certificate
            .not_after()
            .compare(&now)
            .map_err(Self::crypto_error)?
            != Ordering::Less;
        Ok(started && unexpired)
    }

    /// Whether key usage permits signing. Absent extension means unrestricted.
    pub fn permits_digital_signature(certificate: &X509Ref) -> AssemblyResult<bool> {
        let parsed = Self::parse(certificate)?;
        Ok(Self::key_usage(&parsed)?.map_or(true, |ku| ku.digital_signature()))
    }

    fn parse(certificate: &X509Ref) -> AssemblyResult<Certificate> {
        let der = certificate.to_der().map_err(Self::crypto_error)?;
        Ok(Certificate::from_der(&der)?)
    }

    fn key_usage(certificate: &Certificate) -> AssemblyResult<Option<KeyUsage>> {
        let extensions = certificate.tbs_certificate.extensions.as_deref().unwrap_or(&[]);
        for extension in extensions {
            if extension.extn_id == KeyUsage::OID {
                return Ok(Some(KeyUsage::from_der(extension.extn_value.as_bytes())?));
            }
        }
        Ok(None)
    }

    fn email_protection_eku(certificate: &Certificate) -> AssemblyResult<Option<bool>> {
        let extensions = certificate.tbs_certificate.extensions.as_deref().unwrap_or(&[]);
        for extension in extensions {
            if extension.extn_id == ExtendedKeyUsage::OID {
                let eku = ExtendedKeyUsage::from_der(extension.extn_value.as_bytes())?;
                return Ok(Some(eku.0.contains(&ID_KP_EMAIL_PROTECTION)));
            }
        }
        Ok(None)
    }

    fn format_name(name: &X509NameRef) -> String {
        let components: Vec<String> = name
            .entries()
            .map(|entry| {
                let key = entry
                    .object()
                    .nid()
                    .short_name()
                    .unwrap_or("OID")
                    .to_string();
                let value = entry
                    .data()
                    .as_utf8()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|_| format!("0x{}", hex::encode(entry.data().as_slice())));
                format!("{key}={value}")
            })
            .collect();
        components.join(", ")
    }

    fn serial_number(certificate: &X509Ref) -> String {
        certificate
            .serial_number()
            .to_bn()
            .and_then(|bn| bn.to_hex_str().map(|s| s.to_string()))
            .unwrap_or_default()
    }

    fn crypto_error(error: openssl::error::ErrorStack) -> AssemblyError {
        AssemblyError::MessageFormat(format!("certificate inspection: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_protection_oid_is_well_formed() {
        assert_eq!(ID_KP_EMAIL_PROTECTION.to_string(), "1.3.6.1.5.5.7.3.4");
    }
}
