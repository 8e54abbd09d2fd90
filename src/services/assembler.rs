//! Secure email assembly service orchestrating the complete workflow.
//!
//! One call takes an `EmailRequest` through address validation, signer
//! resolution, MIME building, optional signing and mandatory encryption. Any
//! failure ends the call; no partially assembled message is ever returned.

use crate::adapters::provider::{provider_for_config, CertificateProvider};
use crate::domain::address::{AddressField, AddressSet, EmailAddress};
use crate::domain::crypto::{Fingerprint, Identity, IdentityRef};
use crate::domain::message::{MessageHeaders, SecureMessage, TaggedMailbox};
use crate::domain::request::EmailRequest;
use crate::infra::config::AssemblerConfiguration;
use crate::infra::error::{AssemblyError, AssemblyResult};
use crate::services::address_validator::AddressValidator;
use crate::services::cert_validator::CertificateValidator;
use crate::services::envelope::{EnvelopeContent, SecureEnvelope};
use crate::services::message_builder::MessageBuilder;
use lettre::Message;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

/// Addresses of one request after validation and fallback resolution.
struct ValidatedAddresses {
    from: EmailAddress,
    sender: EmailAddress,
    to: AddressSet,
    cc: AddressSet,
    bcc: AddressSet,
    reply_to: AddressSet,
}

/// Assembles signed and encrypted messages for one configured organisation.
///
/// Holds no per-call state, so a shared instance can serve concurrent calls.
pub struct SecureEmailAssembler {
    config: AssemblerConfiguration,
    provider: Box<dyn CertificateProvider>,
    envelope: SecureEnvelope,
}

impl SecureEmailAssembler {
    /// Create an assembler with an explicit certificate provider.
    #[must_use]
    pub fn new(config: AssemblerConfiguration, provider: Box<dyn CertificateProvider>) -> Self {
        let envelope = SecureEnvelope::new(config.content_cipher);
        Self {
            config,
            provider,
            envelope,
        }
    }

    /// Create an assembler using the provider selected by the configuration.
    pub fn from_config(config: AssemblerConfiguration) -> AssemblyResult<Self> {
        let provider = provider_for_config(&config)?;
        Ok(Self::new(config, provider))
    }

    #[must_use]
    pub fn config(&self) -> &AssemblerConfiguration {
        &self.config
    }

    /// Assemble a message signed by the configured identity.
    pub fn assemble(&self, request: &EmailRequest) -> AssemblyResult<SecureMessage> {
        let identity = IdentityRef::new(self.config.signer_identity_reference.as_str());
        self.assemble_as(request, &identity)
    }

    /// Assemble a message signed by `identity_ref`.
    pub fn assemble_as(
        &self,
        request: &EmailRequest,
        identity_ref: &IdentityRef,
    ) -> AssemblyResult<SecureMessage> {
        let start = Instant::now();
        log::info!("Assembling secure message");

        let mut addresses = self.validate_addresses(request)?;
        log::debug!(
            "Validated addresses: {} to, {} cc, {} bcc, {} reply-to",
            addresses.to.len(),
            addresses.cc.len(),
            addresses.bcc.len(),
            addresses.reply_to.len()
        );

        let identity = self.provider.resolve_signer(identity_ref)?;
        self.log_certificate_warnings(&identity);

        if request.bcc_forms_inbox {
            self.merge_forms_inbox(&mut addresses.bcc)?;
        }

        let tree = MessageBuilder::build(&request.body, &request.attachments);

        let content = if request.sign_email {
            if self.provider.can_sign(&identity) {
                EnvelopeContent::Signed(self.envelope.sign(&tree, &identity, self.provider.as_ref())?)
            } else if self.config.allow_unsigned_fallback {
                log::warn!(
                    "Certificate {} cannot sign; sending encrypted but unsigned",
                    identity.fingerprint()
                );
                EnvelopeContent::Plain(tree)
            } else {
                return Err(AssemblyError::SigningFailed(format!(
                    "signing was requested but certificate {} cannot sign",
                    identity.fingerprint()
                )));
            }
        } else {
            EnvelopeContent::Plain(tree)
        };

        let headers = Self::tag_headers(addresses, &request.subject, identity.fingerprint());
        let recipients: Vec<TaggedMailbox> = headers.recipients().cloned().collect();
        let encrypted = self.envelope.encrypt(&content, &recipients, &identity)?;
        let message = Self::build_message(&headers, &encrypted.to_single_part()?)?;
        let signed = encrypted.is_signed();

        log::info!(
            "Assembled {} message for {} recipient(s) in {:.2?}",
            if signed { "signed and encrypted" } else { "encrypted" },
            recipients.len(),
            start.elapsed()
        );
        Ok(SecureMessage::new(headers, signed, encrypted.into_der(), message))
    }

    /// Run `assemble` on the blocking thread pool.
    ///
    /// Assembly is CPU-bound and touches the filesystem, so async hosts
    /// should not call it on a runtime worker thread.
    pub async fn assemble_offloaded(
        self: Arc<Self>,
        request: EmailRequest,
    ) -> AssemblyResult<SecureMessage> {
        tokio::task::spawn_blocking(move || self.assemble(&request))
            .await
            .map_err(|e| AssemblyError::WorkerFailed(e.to_string()))?
    }

    fn validate_addresses(&self, request: &EmailRequest) -> AssemblyResult<ValidatedAddresses> {
        let from_raw = [
            request.from_email.as_str(),
            self.config.notification_address.as_str(),
            self.config.default_from_address.as_str(),
        ]
        .into_iter()
        .find(|candidate| !candidate.trim().is_empty())
        .unwrap_or_default();
        let from = AddressValidator::validate_single(from_raw, AddressField::From)?;

        let sender = if request.sender_email.trim().is_empty() {
            from.clone()
        } else {
            AddressValidator::validate_single(&request.sender_email, AddressField::Sender)?
        };

        Ok(ValidatedAddresses {
            from,
            sender,
            to: AddressValidator::validate_required(&request.recipient_email, AddressField::Recipient)?,
            cc: AddressValidator::validate(&request.cc_email, AddressField::Cc)?,
            bcc: AddressValidator::validate(&request.bcc_email, AddressField::Bcc)?,
            reply_to: AddressValidator::validate(&request.reply_to_email, AddressField::ReplyTo)?,
        })
    }

    fn merge_forms_inbox(&self, bcc: &mut AddressSet) -> AssemblyResult<()> {
        let inbox = self.config.forms_inbox_address.trim();
        if inbox.is_empty() {
            log::debug!("No forms inbox configured; nothing to blind-copy");
            return Ok(());
        }
        let inbox = AddressValidator::validate_single(inbox, AddressField::FormsInbox)?;
        if !bcc.insert(inbox) {
            log::debug!("Forms inbox already present in Bcc");
        }
        Ok(())
    }

    fn log_certificate_warnings(&self, identity: &Identity) {
        match CertificateValidator::validate_for_smime(identity.certificate()) {
            Ok(analysis) if analysis.is_smime_suitable => {
                log::debug!("Signer certificate: {}", analysis.subject);
            }
            Ok(analysis) => {
                log::warn!(
                    "Signer certificate {} is not fully suited for S/MIME ({} issue(s))",
                    identity.fingerprint(),
                    analysis.warnings.len()
                );
            }
            Err(e) => log::warn!("Could not analyse signer certificate: {e}"),
        }
    }

    fn tag_headers(
        addresses: ValidatedAddresses,
        subject: &str,
        fingerprint: &Fingerprint,
    ) -> MessageHeaders {
        let tag = |address: EmailAddress| TaggedMailbox::new(address, fingerprint.clone());
        let tag_all = |set: AddressSet| set.iter().cloned().map(tag).collect::<Vec<_>>();

        MessageHeaders {
            from: tag(addresses.from),
            sender: tag(addresses.sender),
            to: tag_all(addresses.to),
            cc: tag_all(addresses.cc),
            bcc: tag_all(addresses.bcc),
            reply_to: tag_all(addresses.reply_to),
            subject: subject.to_string(),
            date: SystemTime::now(),
        }
    }

    fn build_message(
        headers: &MessageHeaders,
        body: &lettre::message::SinglePart,
    ) -> AssemblyResult<Message> {
        let mut builder = Message::builder()
            .from(headers.from.to_mailbox())
            .sender(headers.sender.to_mailbox())
            .subject(headers.subject.clone())
            .date(headers.date);
        for mailbox in &headers.to {
            builder = builder.to(mailbox.to_mailbox());
        }
        for mailbox in &headers.cc {
            builder = builder.cc(mailbox.to_mailbox());
        }
        for mailbox in &headers.bcc {
            builder = builder.bcc(mailbox.to_mailbox());
        }
        for mailbox in &headers.reply_to {
            builder = builder.reply_to(mailbox.to_mailbox());
        }
        Ok(builder.singlepart(body.clone())?)
    }
}
