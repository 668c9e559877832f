//! # mailpost-mime
//!
//! MIME generation for outgoing email.
//!
//! ## Features
//!
//! - **Message generation**: Build MIME messages with attachments and inline parts
//! - **Encoding**: Base64, Quoted-Printable, RFC 2047 header encoding
//! - **Content types**: Parameters kept in order, quoted on output when needed
//! - **Multipart**: Mixed, alternative, related message types
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpost_mime::{ContentType, MessageBuilder};
//!
//! let message = MessageBuilder::new()
//!     .from("sender@example.com")
//!     .to("recipient@example.com")
//!     .subject("Document")
//!     .text_body("Plain text version")
//!     .html_body("<p>HTML version</p>")
//!     .attach(&ContentType::octet_stream(), "data.bin", &[1, 2, 3])
//!     .build()?;
//!
//! let bytes = message.to_bytes();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod builder;
mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use builder::{MessageBuilder, format_mailbox};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Body, Message, Part, TransferEncoding};
