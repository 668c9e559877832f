//! # mailpost-core
//!
//! SMTP transport core.
//!
//! This crate provides:
//! - Settings validation into an immutable [`SmtpConfig`]
//! - Dial mode resolution with STARTTLS-to-plain fallback in auto mode
//! - AUTH PLAIN with an optional authorization identity
//! - Attachment resolution from inline base64, local files or a
//!   host-supplied [`ContentResolver`]
//! - Message draft validation and MIME assembly
//! - One connection per probe or send; no pooling, queueing or retries
//!
//! ## Example
//!
//! ```ignore
//! use mailpost_core::{MailPiece, SmtpClient, SmtpSettings};
//!
//! let mut settings = SmtpSettings::from_json_file("smtp.json")?;
//! let client = SmtpClient::new(settings.validate()?);
//! client.test().await?;
//!
//! let piece = MailPiece::new("sender@example.com", "recipient@example.com", "Test", "body");
//! client.send_mail(piece).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod attachment;
pub mod auth;
mod client;
pub mod config;
pub mod dial;
mod error;
pub mod piece;
pub mod sender;

pub use attachment::{
    Attachment, AttachmentError, AttachmentKey, AttachmentScheme, BoxError, ContentResolver,
    ResolvedContent,
};
pub use auth::Authenticator;
pub use client::{SendCallback, SmtpClient};
pub use config::{AuthType, DialMode, SmtpConfig, SmtpSettings};
pub use dial::{DialAttempt, DialStrategy};
pub use error::{Error, Result};
pub use piece::{Envelope, MailPiece};
pub use sender::SmtpSender;
