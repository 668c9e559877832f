//! MIME message structure and serialization.

use crate::content_type::ContentType;
use crate::encoding::{encode_base64, encode_base64_lines, encode_quoted_printable, needs_encoding};
use crate::error::Result;
use crate::header::Headers;
use std::fmt;
use std::fmt::Write as _;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
}

impl TransferEncoding {
    /// Encodes raw data with this transfer encoding.
    ///
    /// Quoted-printable assumes UTF-8 input; invalid sequences are replaced.
    #[must_use]
    pub fn encode(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Base64 => encode_base64_lines(data).into_bytes(),
            Self::QuotedPrintable => {
                encode_quoted_printable(&String::from_utf8_lossy(data)).into_bytes()
            }
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
        }
    }
}

/// Body of a MIME part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Leaf content, already transfer-encoded.
    Bytes(Vec<u8>),
    /// Child parts separated by a boundary.
    Multipart {
        /// Boundary delimiter (without leading dashes).
        boundary: String,
        /// Child parts in order.
        parts: Vec<Part>,
    },
}

/// MIME message part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body.
    pub body: Body,
}

impl Part {
    /// Creates a leaf part, encoding `data` with the given transfer encoding.
    #[must_use]
    pub fn new(content_type: &ContentType, encoding: TransferEncoding, data: &[u8]) -> Self {
        let mut headers = Headers::new();
        headers.set("Content-Type", content_type.to_string());
        headers.set("Content-Transfer-Encoding", encoding.to_string());
        Self {
            headers,
            body: Body::Bytes(encoding.encode(data)),
        }
    }

    /// Creates a `text/plain` UTF-8 part.
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self::new(
            &ContentType::text_plain(),
            TransferEncoding::QuotedPrintable,
            text.as_bytes(),
        )
    }

    /// Creates a `text/html` UTF-8 part.
    #[must_use]
    pub fn html(html: &str) -> Self {
        Self::new(
            &ContentType::text_html(),
            TransferEncoding::QuotedPrintable,
            html.as_bytes(),
        )
    }

    /// Creates a base64 attachment part with `Content-Disposition: attachment`.
    #[must_use]
    pub fn attachment(content_type: &ContentType, filename: &str, data: &[u8]) -> Self {
        let content_type = content_type
            .clone()
            .with_parameter("name", parameter_value(filename));
        let mut part = Self::new(&content_type, TransferEncoding::Base64, data);
        part.headers
            .set("Content-Disposition", disposition("attachment", filename));
        part
    }

    /// Creates an inline part referenced from HTML through `cid:<content_id>`.
    #[must_use]
    pub fn inline(
        content_type: &ContentType,
        filename: &str,
        content_id: &str,
        data: &[u8],
    ) -> Self {
        let content_type = content_type
            .clone()
            .with_parameter("name", parameter_value(filename));
        let mut part = Self::new(&content_type, TransferEncoding::Base64, data);
        part.headers
            .set("Content-Disposition", disposition("inline", filename));
        part.headers.set(
            "Content-ID",
            format!("<{}>", content_id.trim_matches(['<', '>'])),
        );
        part
    }

    /// Creates a `multipart/<sub_type>` part wrapping `parts`.
    #[must_use]
    pub fn multipart(sub_type: &str, boundary: impl Into<String>, parts: Vec<Self>) -> Self {
        let boundary = boundary.into();
        let mut headers = Headers::new();
        headers.set(
            "Content-Type",
            ContentType::multipart(sub_type, boundary.clone()).to_string(),
        );
        Self {
            headers,
            body: Body::Multipart { boundary, parts },
        }
    }

    /// Gets the content type, defaulting to `text/plain`.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("Content-Type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Returns the child parts of a multipart, or an empty slice.
    #[must_use]
    pub fn parts(&self) -> &[Self] {
        match &self.body {
            Body::Multipart { parts, .. } => parts,
            Body::Bytes(_) => &[],
        }
    }

    /// Returns the encoded body of a leaf part.
    #[must_use]
    pub fn encoded_body(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Bytes(bytes) => Some(bytes),
            Body::Multipart { .. } => None,
        }
    }

    /// Returns true if the part carries no content at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.body {
            Body::Bytes(bytes) => bytes.is_empty(),
            Body::Multipart { parts, .. } => parts.iter().all(Self::is_empty),
        }
    }

    /// Writes headers, blank line and body.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.headers.to_string().as_bytes());
        out.extend_from_slice(b"\r\n");
        self.write_body(out);
    }

    fn write_body(&self, out: &mut Vec<u8>) {
        match &self.body {
            Body::Bytes(bytes) => {
                out.extend_from_slice(bytes);
                if !bytes.ends_with(b"\r\n") {
                    out.extend_from_slice(b"\r\n");
                }
            }
            Body::Multipart { boundary, parts } => {
                for part in parts {
                    out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
                    part.write_to(out);
                }
                out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
            }
        }
    }
}

fn clean_filename(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect()
}

/// Value for the legacy Content-Type `name` parameter.
///
/// Non-ASCII names are written as an encoded word, which is what older
/// readers look for there.
fn parameter_value(value: &str) -> String {
    let cleaned = clean_filename(value);
    if needs_encoding(&cleaned) {
        format!("=?utf-8?B?{}?=", encode_base64(cleaned.as_bytes()))
    } else {
        cleaned
    }
}

/// Content-Disposition value; non-ASCII names use `filename*` (RFC 2231).
fn disposition(kind: &str, filename: &str) -> String {
    let cleaned = clean_filename(filename);
    if cleaned.is_ascii() {
        format!("{kind}; filename=\"{cleaned}\"")
    } else {
        format!("{kind}; filename*=utf-8''{}", percent_encode(&cleaned))
    }
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

/// Complete MIME message ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Top-level message headers (From, To, Subject, ...).
    pub headers: Headers,
    /// Root body part. Its headers are written into the message header block.
    pub body: Part,
}

impl Message {
    /// Creates a new message.
    #[must_use]
    pub const fn new(headers: Headers, body: Part) -> Self {
        Self { headers, body }
    }

    /// Gets a top-level header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| self.body.headers.get(name))
    }

    /// Gets the subject header as written.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("Subject")
    }

    /// Serializes the message with CRLF line endings.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    /// Appends the serialized message to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.headers.to_string().as_bytes());
        self.body.write_to(out);
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}
