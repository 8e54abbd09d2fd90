//! CMS signing and encryption of an assembled MIME tree.
//!
//! The ordering `Assembled -> [Signed] -> Encrypted` is carried by the types:
//! `sign` only takes a `MimeEntityTree`, and `encrypt` takes whatever
//! `EnvelopeContent` the caller ended up with. There is no way to sign an
//! encrypted entity.

use crate::adapters::provider::CertificateProvider;
use crate::domain::crypto::{Fingerprint, Identity};
use crate::domain::message::TaggedMailbox;
use crate::domain::mime::MimeEntityTree;
use crate::infra::config::ContentCipher;
use crate::infra::error::{AssemblyError, AssemblyResult};
use lettre::message::header::{ContentDisposition, ContentTransferEncoding, ContentType};
use lettre::message::{MultiPart, SinglePart};
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::X509;
use std::collections::BTreeSet;

const SIGNATURE_PROTOCOL: &str = "application/pkcs7-signature";
const SIGNATURE_MICALG: &str = "sha-256";
const SIGNATURE_CONTENT_TYPE: &str = "application/pkcs7-signature; name=\"smime.p7s\"";
const SIGNATURE_FILENAME: &str = "smime.p7s";
const ENVELOPED_CONTENT_TYPE: &str =
    "application/pkcs7-mime; smime-type=enveloped-data; name=\"smime.p7m\"";
const ENVELOPED_FILENAME: &str = "smime.p7m";

/// A `multipart/signed` entity: the rendered tree plus its detached signature.
#[derive(Debug, Clone)]
pub struct SignedEntity {
    multipart: MultiPart,
    signed_content: Vec<u8>,
    signature_der: Vec<u8>,
    signer: Fingerprint,
}

impl SignedEntity {
    /// Canonical bytes the signature covers (the inner `multipart/mixed`).
    #[must_use]
    pub fn signed_content(&self) -> &[u8] {
        &self.signed_content
    }

    /// DER-encoded PKCS#7 SignedData without encapsulated content.
    #[must_use]
    pub fn signature_der(&self) -> &[u8] {
        &self.signature_der
    }

    #[must_use]
    pub fn signer(&self) -> &Fingerprint {
        &self.signer
    }

    #[must_use]
    pub fn formatted(&self) -> Vec<u8> {
        self.multipart.formatted()
    }
}

/// What gets encrypted.
#[derive(Debug, Clone)]
pub enum EnvelopeContent {
    Plain(MimeEntityTree),
    Signed(SignedEntity),
}

impl EnvelopeContent {
    #[must_use]
    pub fn is_signed(&self) -> bool {
        matches!(self, EnvelopeContent::Signed(_))
    }

    fn entity_bytes(&self) -> AssemblyResult<Vec<u8>> {
        match self {
            EnvelopeContent::Plain(tree) => Ok(tree.to_multipart()?.formatted()),
            EnvelopeContent::Signed(signed) => Ok(signed.formatted()),
        }
    }
}

/// PKCS#7 EnvelopedData ready to become the message body.
#[derive(Debug, Clone)]
pub struct EncryptedEntity {
    der: Vec<u8>,
    signed: bool,
    recipients: Vec<Fingerprint>,
}

impl EncryptedEntity {
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Distinct certificate fingerprints the content was encrypted for.
    #[must_use]
    pub fn recipients(&self) -> &[Fingerprint] {
        &self.recipients
    }

    pub(crate) fn into_der(self) -> Vec<u8> {
        self.der
    }

    /// The `application/pkcs7-mime` body part, base64 transfer encoded.
    pub fn to_single_part(&self) -> AssemblyResult<SinglePart> {
        Ok(SinglePart::builder()
            .header(content_type(ENVELOPED_CONTENT_TYPE)?)
            .header(ContentDisposition::attachment(ENVELOPED_FILENAME))
            .header(ContentTransferEncoding::Base64)
            .body(self.der.clone()))
    }
}

/// Decrypted (and, when signed, verified) content.
#[derive(Debug, Clone)]
pub struct OpenedContent {
    /// The signed inner entity when signed, otherwise the decrypted entity.
    pub content: Vec<u8>,
    /// Fingerprint of the verified signer, `None` for unsigned content.
    pub signer: Option<Fingerprint>,
}

impl OpenedContent {
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signer.is_some()
    }
}

/// Applies S/MIME signing and encryption.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecureEnvelope {
    cipher: ContentCipher,
}

impl SecureEnvelope {
    #[must_use]
    pub fn new(cipher: ContentCipher) -> Self {
        Self { cipher }
    }

    #[must_use]
    pub fn cipher(&self) -> ContentCipher {
        self.cipher
    }

    /// Produce a `multipart/signed` entity with a detached SHA-256 signature.
    ///
    /// The signer certificate and its chain are embedded in the SignedData.
    pub fn sign(
        &self,
        tree: &MimeEntityTree,
        identity: &Identity,
        provider: &dyn CertificateProvider,
    ) -> AssemblyResult<SignedEntity> {
        if !provider.can_sign(identity) {
            return Err(AssemblyError::SigningFailed(format!(
                "certificate {} cannot be used for signing",
                identity.fingerprint()
            )));
        }
        let key = identity.private_key().ok_or_else(|| {
            AssemblyError::SigningFailed("no private key for signer certificate".to_string())
        })?;

        let mixed = tree.to_multipart()?;
        let mut signed_content = mixed.formatted();
        // The final CRLF belongs to the outer boundary delimiter.
        if signed_content.ends_with(b"\r\n") {
            signed_content.truncate(signed_content.len() - 2);
        }

        let chain = certificate_stack(identity.chain())
            .map_err(|e| AssemblyError::SigningFailed(format!("certificate chain: {e}")))?;
        let pkcs7 = Pkcs7::sign(
            identity.certificate(),
            key,
            &chain,
            &signed_content,
            Pkcs7Flags::DETACHED | Pkcs7Flags::BINARY,
        )
        .map_err(|e| AssemblyError::SigningFailed(e.to_string()))?;
        let signature_der = pkcs7
            .to_der()
            .map_err(|e| AssemblyError::SigningFailed(format!("DER encoding: {e}")))?;
        log::debug!(
            "Signed {} content bytes ({} byte signature)",
            signed_content.len(),
            signature_der.len()
        );

        let signature = SinglePart::builder()
            .header(content_type(SIGNATURE_CONTENT_TYPE)?)
            .header(ContentDisposition::attachment(SIGNATURE_FILENAME))
            .header(ContentTransferEncoding::Base64)
            .body(signature_der.clone());
        let multipart = MultiPart::signed(SIGNATURE_PROTOCOL.to_string(), SIGNATURE_MICALG.to_string())
            .multipart(mixed)
            .singlepart(signature);

        Ok(SignedEntity {
            multipart,
            signed_content,
            signature_der,
            signer: identity.fingerprint().clone(),
        })
    }

    /// Encrypt the full entity for every recipient's certificate.
    ///
    /// Each recipient is tagged with the fingerprint of the certificate to
    /// encrypt for; only the resolved identity's certificate is known here.
    pub fn encrypt(
        &self,
        content: &EnvelopeContent,
        recipients: &[TaggedMailbox],
        identity: &Identity,
    ) -> AssemblyResult<EncryptedEntity> {
        if recipients.is_empty() {
            return Err(AssemblyError::EncryptionFailed(
                "no recipients to encrypt for".to_string(),
            ));
        }

        let fingerprints: BTreeSet<&Fingerprint> =
            recipients.iter().map(TaggedMailbox::fingerprint).collect();
        let mut certificates = Vec::with_capacity(fingerprints.len());
        for fingerprint in &fingerprints {
            if *fingerprint != identity.fingerprint() {
                return Err(AssemblyError::EncryptionFailed(format!(
                    "no certificate known for fingerprint {fingerprint}"
                )));
            }
            certificates.push(identity.certificate().to_owned());
        }

        let stack = certificate_stack(&certificates)
            .map_err(|e| AssemblyError::EncryptionFailed(format!("recipient certificates: {e}")))?;
        let entity = content.entity_bytes()?;
        let pkcs7 = Pkcs7::encrypt(&stack, &entity, self.cipher.cipher(), Pkcs7Flags::BINARY)
            .map_err(|e| AssemblyError::EncryptionFailed(e.to_string()))?;
        let der = pkcs7
            .to_der()
            .map_err(|e| AssemblyError::EncryptionFailed(format!("DER encoding: {e}")))?;
        log::debug!(
            "Encrypted {} byte entity for {} certificate(s) with {:?}",
            entity.len(),
            certificates.len(),
            self.cipher
        );

        Ok(EncryptedEntity {
            der,
            signed: content.is_signed(),
            recipients: fingerprints.into_iter().cloned().collect(),
        })
    }

    /// Decrypt an enveloped message and verify its signature when signed.
    ///
    /// `input` is either raw EnvelopedData DER or a complete
    /// `application/pkcs7-mime` message. Verification checks the signature
    /// against the embedded signer certificate only; no chain is built.
    pub fn open(&self, input: &[u8], identity: &Identity) -> AssemblyResult<OpenedContent> {
        let key = identity.private_key().ok_or_else(|| {
            AssemblyError::DecryptionFailed("no private key for recipient certificate".to_string())
        })?;

        let enveloped = if input.first() == Some(&0x30) {
            Pkcs7::from_der(input)
        } else {
            Pkcs7::from_smime(input).map(|(pkcs7, _)| pkcs7)
        }
        .map_err(|e| AssemblyError::DecryptionFailed(format!("not an enveloped message: {e}")))?;

        let decrypted = enveloped
            .decrypt(key, identity.certificate(), Pkcs7Flags::BINARY)
            .map_err(|e| AssemblyError::DecryptionFailed(e.to_string()))?;

        if !is_multipart_signed(&decrypted) {
            log::debug!("Decrypted unsigned content ({} bytes)", decrypted.len());
            return Ok(OpenedContent {
                content: decrypted,
                signer: None,
            });
        }

        let (signature, content) = Pkcs7::from_smime(&decrypted)
            .map_err(|e| AssemblyError::VerificationFailed(format!("malformed signed entity: {e}")))?;
        let content = content.ok_or_else(|| {
            AssemblyError::VerificationFailed("signed entity has no content part".to_string())
        })?;

        let no_certs = Stack::<X509>::new().map_err(verification_error)?;
        let store = X509StoreBuilder::new().map_err(verification_error)?.build();
        signature
            .verify(
                &no_certs,
                &store,
                Some(&content),
                None,
                Pkcs7Flags::NOVERIFY | Pkcs7Flags::BINARY,
            )
            .map_err(verification_error)?;

        let signers = signature
            .signers(&no_certs, Pkcs7Flags::empty())
            .map_err(verification_error)?;
        let signer = match signers.iter().next() {
            Some(cert) => Fingerprint::of(cert).map_err(verification_error)?,
            None => {
                return Err(AssemblyError::VerificationFailed(
                    "signature carries no signer certificate".to_string(),
                ))
            }
        };
        log::debug!("Verified signature from {signer}");

        Ok(OpenedContent {
            content,
            signer: Some(signer),
        })
    }
}

fn content_type(value: &str) -> AssemblyResult<ContentType> {
    ContentType::parse(value)
        .map_err(|e| AssemblyError::MessageFormat(format!("Invalid content type '{value}': {e}")))
}

fn certificate_stack(certificates: &[X509]) -> Result<Stack<X509>, openssl::error::ErrorStack> {
    let mut stack = Stack::new()?;
    for certificate in certificates {
        stack.push(certificate.clone())?;
    }
    Ok(stack)
}

fn verification_error(error: openssl::error::ErrorStack) -> AssemblyError {
    AssemblyError::VerificationFailed(error.to_string())
}

/// Checks the entity's own header block, not nested parts.
fn is_multipart_signed(entity: &[u8]) -> bool {
    let end = entity
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .unwrap_or(entity.len());
    String::from_utf8_lossy(&entity[..end])
        .to_ascii_lowercase()
        .contains("multipart/signed")
}
