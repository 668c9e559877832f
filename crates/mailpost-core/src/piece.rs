//! Message drafts and their validation.

use mailpost_mime::{Message, MessageBuilder, format_mailbox};
use mailpost_smtp::{Address, Mailbox};
use serde::{Deserialize, Serialize};

use crate::attachment::{Attachment, ContentResolver};
use crate::error::{Error, Result};

/// A single message draft.
///
/// Build one per send. [`MailPiece::validate`] trims its string fields,
/// resolves its attachments and returns a [`MessageBuilder`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MailPiece {
    /// Sender, `local@domain` or `Name <local@domain>`.
    pub from: String,
    /// `To` recipients.
    pub to: Vec<String>,
    /// `Cc` recipients.
    pub cc: Vec<String>,
    /// `Bcc` recipients. Never written into headers.
    pub bcc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text: String,
    /// HTML body.
    pub html: String,
    /// Attachments.
    pub attachments: Vec<Attachment>,
    /// Inline parts referenced from the HTML body.
    pub inlines: Vec<Attachment>,
    /// Accept an empty subject.
    pub allow_empty_subject: bool,
    /// Accept a message with neither text nor HTML.
    pub allow_no_text_html: bool,
    /// Resolve and include attachments and inlines.
    pub allow_attachments: bool,
}

/// SMTP envelope: reverse path and every forward path, Bcc included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// MAIL FROM address.
    pub from: Address,
    /// RCPT TO addresses, de-duplicated, in To, Cc, Bcc order.
    pub recipients: Vec<Address>,
}

impl Envelope {
    /// Creates an envelope, dropping duplicate recipients.
    #[must_use]
    pub fn new(from: Address, recipients: impl IntoIterator<Item = Address>) -> Self {
        let mut unique: Vec<Address> = Vec::new();
        for address in recipients {
            if !unique
                .iter()
                .any(|seen| seen.as_str().eq_ignore_ascii_case(address.as_str()))
            {
                unique.push(address);
            }
        }
        Self {
            from,
            recipients: unique,
        }
    }

    /// Derives an envelope from a message's `From`, `To` and `Cc` headers.
    ///
    /// Blind recipients are not in the headers; add them with
    /// [`Envelope::new`] instead.
    ///
    /// # Errors
    ///
    /// Returns an error if `From` is missing, an address is malformed, or
    /// there are no recipients.
    pub fn from_message(message: &Message) -> Result<Self> {
        let from = message
            .header("From")
            .ok_or_else(|| Error::Config("message has no From header".into()))?;
        let from = parse_mailbox("from", from)?.address;

        let mut recipients = Vec::new();
        for (field, header) in [("to", "To"), ("cc", "Cc")] {
            for value in message.headers.get_all(header) {
                for entry in split_address_list(value) {
                    recipients.push(parse_mailbox(field, &entry)?.address);
                }
            }
        }
        if recipients.is_empty() {
            return Err(Error::NoRecipients);
        }

        Ok(Self::new(from, recipients))
    }
}

impl MailPiece {
    /// Creates a draft with one `To` recipient.
    #[must_use]
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: vec![to.into()],
            subject: subject.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    /// Checks the draft and assembles a message builder.
    ///
    /// Performs no network I/O. Only this draft's own string fields and
    /// attachment state are modified.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, in this order: invalid sender, no
    /// recipients, invalid recipient, empty subject, empty body, attachment
    /// resolution.
    pub async fn validate(
        &mut self,
        resolver: Option<&dyn ContentResolver>,
    ) -> Result<MessageBuilder> {
        self.from = self.from.trim().to_string();
        let from = parse_mailbox("from", &self.from)?;

        for list in [&mut self.to, &mut self.cc, &mut self.bcc] {
            for address in list.iter_mut() {
                *address = address.trim().to_string();
            }
        }
        if self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty() {
            return Err(Error::NoRecipients);
        }
        let to = parse_list("to", &self.to)?;
        let cc = parse_list("cc", &self.cc)?;
        parse_list("bcc", &self.bcc)?;

        self.subject = self.subject.trim().to_string();
        if self.subject.is_empty() && !self.allow_empty_subject {
            return Err(Error::EmptySubject);
        }

        self.text = self.text.trim().to_string();
        self.html = self.html.trim().to_string();
        if self.text.is_empty() && self.html.is_empty() && !self.allow_no_text_html {
            return Err(Error::EmptyBody);
        }

        let mut builder = MessageBuilder::new()
            .from(header_value(&from))
            .subject(self.subject.as_str());
        for mailbox in &to {
            builder = builder.to(header_value(mailbox));
        }
        for mailbox in &cc {
            builder = builder.cc(header_value(mailbox));
        }
        if !self.text.is_empty() {
            builder = builder.text_body(self.text.as_str());
        }
        if !self.html.is_empty() {
            builder = builder.html_body(self.html.as_str());
        }

        if !self.allow_attachments {
            if !self.attachments.is_empty() || !self.inlines.is_empty() {
                tracing::debug!(
                    attachments = self.attachments.len(),
                    inlines = self.inlines.len(),
                    "Attachments not allowed, skipping"
                );
            }
            return Ok(builder);
        }

        for (index, attachment) in self.attachments.iter_mut().enumerate() {
            let part = resolve(attachment, resolver, false)
                .await
                .map_err(|source| Error::Attachment {
                    index,
                    inline: false,
                    source,
                })?;
            builder = builder.attach_part(part);
        }
        for (index, inline) in self.inlines.iter_mut().enumerate() {
            let part = resolve(inline, resolver, true)
                .await
                .map_err(|source| Error::Attachment {
                    index,
                    inline: true,
                    source,
                })?;
            builder = builder.inline_part(part);
        }

        Ok(builder)
    }

    /// Returns the SMTP envelope for this draft, Bcc included.
    ///
    /// # Errors
    ///
    /// Returns an error if an address is malformed or there are no
    /// recipients.
    pub fn envelope(&self) -> Result<Envelope> {
        let from = parse_mailbox("from", self.from.trim())?.address;

        let mut recipients = Vec::new();
        for (field, list) in [("to", &self.to), ("cc", &self.cc), ("bcc", &self.bcc)] {
            recipients.extend(
                parse_list(field, list)?
                    .into_iter()
                    .map(|mailbox| mailbox.address),
            );
        }
        if recipients.is_empty() {
            return Err(Error::NoRecipients);
        }

        Ok(Envelope::new(from, recipients))
    }
}

async fn resolve(
    attachment: &mut Attachment,
    resolver: Option<&dyn ContentResolver>,
    inline: bool,
) -> crate::attachment::AttachmentResult<mailpost_mime::Part> {
    attachment.load_content(resolver).await?;
    attachment.to_part(inline)
}

fn parse_mailbox(field: &'static str, value: &str) -> Result<Mailbox> {
    Mailbox::parse(value).map_err(|source| Error::InvalidAddress { field, source })
}

fn parse_list(field: &'static str, values: &[String]) -> Result<Vec<Mailbox>> {
    values
        .iter()
        .map(|value| parse_mailbox(field, value.trim()))
        .collect()
}

fn header_value(mailbox: &Mailbox) -> String {
    format_mailbox(mailbox.name.as_deref(), mailbox.address.as_str())
}

/// Splits an address header on commas outside quotes and angle brackets.
fn split_address_list(value: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut angle = false;

    for c in value.chars() {
        match c {
            '"' => quoted = !quoted,
            '<' if !quoted => angle = true,
            '>' if !quoted => angle = false,
            ',' if !quoted && !angle => {
                entries.push(std::mem::take(&mut current));
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    entries.push(current);

    entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}
