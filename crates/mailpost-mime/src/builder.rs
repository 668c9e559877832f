//! Builder for outgoing MIME messages.

use crate::content_type::ContentType;
use crate::encoding::{encode_rfc2047, needs_encoding};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::message::{Message, Part};
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Formats a mailbox for an address header.
///
/// Display names are quoted, or RFC 2047 encoded when they are not plain
/// ASCII.
#[must_use]
pub fn format_mailbox(name: Option<&str>, address: &str) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) if needs_encoding(name) => {
            format!("{} <{address}>", encode_rfc2047(name, "utf-8"))
        }
        Some(name) => format!("\"{}\" <{address}>", name.replace(['\\', '"'], "")),
        None => address.to_string(),
    }
}

/// Builds a [`Message`] from envelope headers, bodies and attachments.
///
/// The resulting tree is:
///
/// ```text
/// multipart/mixed            (only with attachments)
/// ├── multipart/related      (only with inlines)
/// │   ├── multipart/alternative (only with both text and html)
/// │   │   ├── text/plain
/// │   │   └── text/html
/// │   └── inline parts
/// └── attachment parts
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Vec<String>,
    cc: Vec<String>,
    subject: String,
    text: Option<String>,
    html: Option<String>,
    attachments: Vec<Part>,
    inlines: Vec<Part>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `From` mailbox.
    #[must_use]
    pub fn from(mut self, mailbox: impl Into<String>) -> Self {
        self.from = Some(mailbox.into());
        self
    }

    /// Adds a `To` mailbox.
    #[must_use]
    pub fn to(mut self, mailbox: impl Into<String>) -> Self {
        self.to.push(mailbox.into());
        self
    }

    /// Adds a `Cc` mailbox.
    #[must_use]
    pub fn cc(mut self, mailbox: impl Into<String>) -> Self {
        self.cc.push(mailbox.into());
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the plain-text body.
    #[must_use]
    pub fn text_body(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html_body(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attach(mut self, content_type: &ContentType, filename: &str, data: &[u8]) -> Self {
        self.attachments
            .push(Part::attachment(content_type, filename, data));
        self
    }

    /// Adds an inline part referenced by `content_id`.
    #[must_use]
    pub fn inline(
        mut self,
        content_type: &ContentType,
        filename: &str,
        content_id: &str,
        data: &[u8],
    ) -> Self {
        self.inlines
            .push(Part::inline(content_type, filename, content_id, data));
        self
    }

    /// Adds a pre-built attachment part.
    #[must_use]
    pub fn attach_part(mut self, part: Part) -> Self {
        self.attachments.push(part);
        self
    }

    /// Adds a pre-built inline part.
    #[must_use]
    pub fn inline_part(mut self, part: Part) -> Self {
        self.inlines.push(part);
        self
    }

    /// Returns the `To` mailboxes.
    #[must_use]
    pub fn to_mailboxes(&self) -> &[String] {
        &self.to
    }

    /// Returns the `Cc` mailboxes.
    #[must_use]
    pub fn cc_mailboxes(&self) -> &[String] {
        &self.cc
    }

    /// Returns the subject.
    #[must_use]
    pub fn subject_text(&self) -> &str {
        &self.subject
    }

    /// Returns the attachments added so far.
    #[must_use]
    pub fn attachments(&self) -> &[Part] {
        &self.attachments
    }

    /// Returns the inline parts added so far.
    #[must_use]
    pub fn inlines(&self) -> &[Part] {
        &self.inlines
    }

    /// Assembles the message.
    ///
    /// # Errors
    ///
    /// Returns an error if `From` is missing or an address header contains a
    /// line break.
    pub fn build(self) -> Result<Message> {
        let from = self
            .from
            .ok_or_else(|| Error::MissingHeader("From".to_string()))?;
        for value in std::iter::once(&from).chain(&self.to).chain(&self.cc) {
            if value.contains(['\r', '\n']) {
                return Err(Error::InvalidHeader(value.clone()));
            }
        }

        let mut headers = Headers::new();
        headers.set("From", from.clone());
        if !self.to.is_empty() {
            headers.set("To", self.to.join(ADDRESS_SEPARATOR));
        }
        if !self.cc.is_empty() {
            headers.set("Cc", self.cc.join(ADDRESS_SEPARATOR));
        }
        headers.add_text("Subject", &self.subject);
        headers.set("Date", chrono::Utc::now().to_rfc2822());
        headers.set(
            "Message-ID",
            format!("<{}@{}>", random_token(32), domain_of(&from)),
        );
        headers.set("MIME-Version", "1.0");

        let mut body = match (self.text, self.html) {
            (Some(text), Some(html)) => Part::multipart(
                "alternative",
                boundary(),
                vec![Part::text(&text), Part::html(&html)],
            ),
            (None, Some(html)) => Part::html(&html),
            (Some(text), None) => Part::text(&text),
            (None, None) => Part::text(""),
        };

        if !self.inlines.is_empty() {
            let mut parts = vec![body];
            parts.extend(self.inlines);
            body = Part::multipart("related", boundary(), parts);
        }

        if !self.attachments.is_empty() {
            let mut parts = vec![body];
            parts.extend(self.attachments);
            body = Part::multipart("mixed", boundary(), parts);
        }

        Ok(Message::new(headers, body))
    }
}

// One mailbox per folded line
const ADDRESS_SEPARATOR: &str = ",\r\n ";

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

// "=_" never occurs in base64 or quoted-printable output
fn boundary() -> String {
    format!("=_{}", random_token(28))
}

fn domain_of(mailbox: &str) -> &str {
    let address = mailbox
        .rsplit_once('<')
        .map_or(mailbox, |(_, rest)| rest.trim_end_matches('>'));
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim())
        .filter(|domain| !domain.is_empty())
        .unwrap_or("localhost")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::Body;

    fn content_type_of(part: &Part) -> String {
        part.content_type().unwrap().essence()
    }

    #[test]
    fn test_format_mailbox() {
        assert_eq!(format_mailbox(None, "a@example.com"), "a@example.com");
        assert_eq!(
            format_mailbox(Some("Alice"), "a@example.com"),
            "\"Alice\" <a@example.com>"
        );
        assert_eq!(format_mailbox(Some("  "), "a@example.com"), "a@example.com");
        assert!(
            format_mailbox(Some("Zoë"), "z@example.com").starts_with("=?utf-8?B?")
        );
    }

    #[test]
    fn test_text_only() {
        let message = MessageBuilder::new()
            .from("sender@example.com")
            .to("recipient@example.com")
            .subject("Test")
            .text_body("body")
            .build()
            .unwrap();

        assert_eq!(message.header("From"), Some("sender@example.com"));
        assert_eq!(message.header("To"), Some("recipient@example.com"));
        assert_eq!(message.header("MIME-Version"), Some("1.0"));
        assert!(message.header("Date").is_some());
        assert!(message.header("Cc").is_none());
        assert!(
            message
                .header("Message-ID")
                .unwrap()
                .ends_with("@example.com>")
        );
        assert_eq!(content_type_of(&message.body), "text/plain");
    }

    #[test]
    fn test_text_and_html_alternative() {
        let message = MessageBuilder::new()
            .from("sender@example.com")
            .to("a@example.com")
            .cc("b@example.com")
            .subject("Both")
            .text_body("plain")
            .html_body("<p>html</p>")
            .build()
            .unwrap();

        assert_eq!(message.header("Cc"), Some("b@example.com"));
        assert_eq!(content_type_of(&message.body), "multipart/alternative");
        let kinds: Vec<String> = message.body.parts().iter().map(content_type_of).collect();
        assert_eq!(kinds, vec!["text/plain", "text/html"]);
    }

    #[test]
    fn test_attachments_and_inlines_nesting() {
        let png = ContentType::parse("image/png").unwrap();
        let message = MessageBuilder::new()
            .from("sender@example.com")
            .to("a@example.com")
            .subject("Nested")
            .html_body("<img src=\"cid:logo\">")
            .inline(&png, "logo.png", "logo", b"png")
            .attach(&ContentType::octet_stream(), "data.bin", &[0, 1, 2])
            .build()
            .unwrap();

        assert_eq!(content_type_of(&message.body), "multipart/mixed");
        let mixed = message.body.parts();
        assert_eq!(mixed.len(), 2);
        assert_eq!(content_type_of(&mixed[0]), "multipart/related");
        assert_eq!(content_type_of(&mixed[1]), "application/octet-stream");

        let related = mixed[0].parts();
        assert_eq!(content_type_of(&related[0]), "text/html");
        assert_eq!(related[1].headers.get("Content-ID"), Some("<logo>"));

        let Body::Multipart { boundary, .. } = &message.body.body else {
            panic!("expected multipart body");
        };
        let raw = message.to_string();
        assert!(raw.contains(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn test_subject_encoding() {
        let message = MessageBuilder::new()
            .from("sender@example.com")
            .to("a@example.com")
            .subject("Grüße")
            .text_body("x")
            .build()
            .unwrap();
        assert!(message.subject().unwrap().starts_with("=?utf-8?B?"));
        assert!(message.to_bytes().is_ascii());
    }

    #[test]
    fn test_long_headers_are_folded() {
        let mut builder = MessageBuilder::new()
            .from("sender@example.com")
            .subject("A plain subject that goes on ".repeat(12).trim_end())
            .text_body("x");
        for n in 0..40 {
            builder = builder
                .to(format!("recipient-number-{n:02}@mail.example.com"))
                .cc(format!("\"Copy {n:02}\" <copy-{n:02}@mail.example.com>"));
        }
        let message = builder.build().unwrap();

        let raw = message.to_string();
        let longest = raw.split("\r\n").map(str::len).max().unwrap();
        assert!(longest <= 78, "longest line = {longest}");

        let to = message.header("To").unwrap();
        assert_eq!(to.split(",\r\n ").count(), 40);
        assert!(to.starts_with("recipient-number-00@mail.example.com,\r\n "));
    }

    #[test]
    fn test_missing_from() {
        let result = MessageBuilder::new().to("a@example.com").build();
        assert!(matches!(result, Err(Error::MissingHeader(_))));
    }

    #[test]
    fn test_header_injection_rejected() {
        let result = MessageBuilder::new()
            .from("sender@example.com")
            .to("a@example.com\r\nBcc: evil@example.com")
            .build();
        assert!(matches!(result, Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_empty_bodies_produce_empty_text() {
        let message = MessageBuilder::new()
            .from("sender@example.com")
            .to("a@example.com")
            .build()
            .unwrap();
        assert_eq!(content_type_of(&message.body), "text/plain");
        assert!(message.body.is_empty());
        assert_eq!(message.subject(), Some(""));
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("\"A\" <a@example.org>"), "example.org");
        assert_eq!(domain_of("nobody"), "localhost");
    }
}
