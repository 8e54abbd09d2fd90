//! Builds the `multipart/mixed` entity tree from a body and attachments.

use crate::domain::mime::{AttachmentPart, MimeEntityTree};

/// Pure builder: identical inputs always yield equal trees.
pub struct MessageBuilder;

impl MessageBuilder {
    #[must_use]
    pub fn build(body_html: &str, attachments: &[AttachmentPart]) -> MimeEntityTree {
        log::debug!(
            "Building MIME tree: {} byte body, {} attachment(s)",
            body_html.len(),
            attachments.len()
        );
        MimeEntityTree::new(body_html.to_string(), attachments.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_attachments() -> Vec<AttachmentPart> {
        vec![
            AttachmentPart::new("a.txt", "text/plain", b"first".to_vec()).unwrap(),
            AttachmentPart::new("b.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]).unwrap(),
        ]
    }

    #[test]
    fn body_first_then_attachments_in_order() {
        let tree = MessageBuilder::build("<b>hi</b>", &sample_attachments());
        assert_eq!(tree.body_html(), "<b>hi</b>");
        assert_eq!(tree.part_count(), 3);
        let names: Vec<&str> = tree.attachments().iter().map(AttachmentPart::filename).collect();
        assert_eq!(names, vec!["a.txt", "b.png"]);
        assert_eq!(tree.attachments()[1].content_type(), "image/png");
    }

    #[test]
    fn build_is_idempotent() {
        let attachments = sample_attachments();
        let first = MessageBuilder::build("<p>same</p>", &attachments);
        let second = MessageBuilder::build("<p>same</p>", &attachments);
        assert_eq!(first, second);
    }

    #[test]
    fn no_attachments_yields_body_only() {
        let tree = MessageBuilder::build("", &[]);
        assert_eq!(tree.part_count(), 1);
        assert!(tree.attachments().is_empty());
    }
}
