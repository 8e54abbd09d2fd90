use super::mime::AttachmentPart;

/// Caller-supplied arguments for one secure message.
///
/// Address fields may hold several addresses separated by `;` or `,`.
#[derive(Debug, Clone)]
pub struct EmailRequest {
    /// Recipient address(es). Required.
    pub recipient_email: String,
    /// Carbon-copy address(es).
    pub cc_email: String,
    /// Blind carbon-copy address(es).
    pub bcc_email: String,
    /// Reply-to address(es).
    pub reply_to_email: String,
    /// Author address; falls back to configured defaults when blank.
    pub from_email: String,
    /// Sender address; falls back to the author when blank.
    pub sender_email: String,
    pub subject: String,
    /// HTML body.
    pub body: String,
    pub attachments: Vec<AttachmentPart>,
    /// Blind-copy the configured forms inbox.
    pub bcc_forms_inbox: bool,
    /// Sign with the resolved identity before encrypting.
    pub sign_email: bool,
}

impl Default for EmailRequest {
    fn default() -> Self {
        Self {
            recipient_email: String::new(),
            cc_email: String::new(),
            bcc_email: String::new(),
            reply_to_email: String::new(),
            from_email: String::new(),
            sender_email: String::new(),
            subject: String::new(),
            body: String::new(),
            attachments: Vec::new(),
            bcc_forms_inbox: true,
            sign_email: true,
        }
    }
}
