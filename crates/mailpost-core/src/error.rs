//! Error types for the transport core.

use std::path::PathBuf;

use thiserror::Error;

use crate::attachment::AttachmentError;
use crate::dial::DialAttempt;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Settings are missing or inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Password file could not be read.
    #[error("Failed to read password file {}: {source}", path.display())]
    PasswordFile {
        /// Path from the settings.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message has no To, Cc or Bcc recipient.
    #[error("Message has no recipients")]
    NoRecipients,

    /// Address failed syntax validation.
    #[error("Invalid {field} address: {source}")]
    InvalidAddress {
        /// Which field held the address (`from`, `to`, `cc`, `bcc`).
        field: &'static str,
        /// Parse error.
        source: mailpost_smtp::Error,
    },

    /// Subject is empty and empty subjects are not allowed.
    #[error("Message subject is empty")]
    EmptySubject,

    /// Neither text nor HTML body, and bodiless messages are not allowed.
    #[error("Message has neither a text nor an HTML body")]
    EmptyBody,

    /// An attachment or inline could not be resolved.
    #[error("{} {index}: {source}", part_kind(.inline))]
    Attachment {
        /// Position in the attachment or inline list.
        index: usize,
        /// True for inlines.
        inline: bool,
        /// Resolution error.
        source: AttachmentError,
    },

    /// MIME assembly failed.
    #[error("MIME error: {0}")]
    Mime(#[from] mailpost_mime::Error),

    /// Every dial strategy failed.
    #[error("Failed to connect: {}", describe_attempts(.attempts))]
    Dial {
        /// One entry per strategy tried, in order.
        attempts: Vec<DialAttempt>,
    },

    /// Authentication was refused.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// SMTP conversation failed after the session was established.
    #[error("{stage} failed: {source}")]
    Transport {
        /// Command or phase that failed (e.g. `MAIL FROM`, `DATA`).
        stage: &'static str,
        /// Protocol error.
        source: mailpost_smtp::Error,
    },
}

impl Error {
    /// Returns true for errors that need a settings change before retrying.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        match self {
            Self::Config(_) | Self::PasswordFile { .. } | Self::Serde(_) => true,
            Self::Attachment { source, .. } => source.is_config(),
            _ => false,
        }
    }

    /// Returns true for problems with the message itself.
    #[must_use]
    pub const fn is_message(&self) -> bool {
        matches!(
            self,
            Self::NoRecipients
                | Self::InvalidAddress { .. }
                | Self::EmptySubject
                | Self::EmptyBody
                | Self::Mime(_)
        )
    }

    /// Returns true if the server refused authentication.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Returns true for dial and protocol failures.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Dial { .. } | Self::Transport { .. })
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn part_kind(inline: &bool) -> &'static str {
    if *inline { "Inline" } else { "Attachment" }
}

fn describe_attempts(attempts: &[DialAttempt]) -> String {
    if attempts.is_empty() {
        return "no dial strategy available".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
