//! MIME entity tree: an HTML body followed by attachments.

use crate::infra::error::{AssemblyError, AssemblyResult};
use lettre::message::header::{ContentDisposition, ContentTransferEncoding, ContentType};
use lettre::message::{MultiPart, SinglePart};
use std::fmt;
use std::path::Path;

/// One attachment with its original filename and content type.
#[derive(Clone, PartialEq, Eq)]
pub struct AttachmentPart {
    filename: String,
    content_type: String,
    content: Vec<u8>,
}

impl AttachmentPart {
    /// Create an attachment. The content type must be a valid MIME type.
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: Vec<u8>,
    ) -> AssemblyResult<Self> {
        let filename = filename.into();
        let content_type = content_type.into();
        if filename.trim().is_empty() {
            return Err(AssemblyError::MessageFormat(
                "Attachment filename must not be empty".to_string(),
            ));
        }
        parse_content_type(&content_type)?;
        Ok(Self {
            filename,
            content_type,
            content,
        })
    }

    /// Read an attachment from disk, guessing the content type from the extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> AssemblyResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|e| {
            AssemblyError::IoError(format!(
                "Failed to read attachment {}: {e}",
                path.display()
            ))
        })?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                AssemblyError::MessageFormat(format!(
                    "Attachment path has no usable file name: {}",
                    path.display()
                ))
            })?
            .to_string();
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self::new(filename, content_type, content)
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Always base64: attachment bytes must survive line-ending
    /// canonicalisation unchanged, text files included.
    fn to_single_part(&self) -> AssemblyResult<SinglePart> {
        Ok(SinglePart::builder()
            .header(parse_content_type(&self.content_type)?)
            .header(ContentDisposition::attachment(&self.filename))
            .header(ContentTransferEncoding::Base64)
            .body(self.content.clone()))
    }
}

impl fmt::Debug for AttachmentPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentPart")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.content.len())
            .finish()
    }
}

fn parse_content_type(value: &str) -> AssemblyResult<ContentType> {
    ContentType::parse(value)
        .map_err(|e| AssemblyError::MessageFormat(format!("Invalid content type '{value}': {e}")))
}

/// A `multipart/mixed` tree. The body is always the first child and
/// attachments follow in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeEntityTree {
    body_html: String,
    attachments: Vec<AttachmentPart>,
}

impl MimeEntityTree {
    pub(crate) fn new(body_html: String, attachments: Vec<AttachmentPart>) -> Self {
        Self {
            body_html,
            attachments,
        }
    }

    #[must_use]
    pub fn body_html(&self) -> &str {
        &self.body_html
    }

    #[must_use]
    pub fn attachments(&self) -> &[AttachmentPart] {
        &self.attachments
    }

    /// Number of child parts including the body.
    #[must_use]
    pub fn part_count(&self) -> usize {
        1 + self.attachments.len()
    }

    /// Render the tree as a `lettre` multipart. Each render gets a fresh boundary.
    pub fn to_multipart(&self) -> AssemblyResult<MultiPart> {
        let mut multipart = MultiPart::mixed().singlepart(SinglePart::html(self.body_html.clone()));
        for attachment in &self.attachments {
            multipart = multipart.singlepart(attachment.to_single_part()?);
        }
        Ok(multipart)
    }
}
