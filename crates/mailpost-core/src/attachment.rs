//! Attachment content resolution.
//!
//! An attachment's bytes come from one of three places, selected by its key:
//!
//! | key            | source                                   |
//! |----------------|------------------------------------------|
//! | `""`           | base64 `content` already on the struct   |
//! | `file:<path>`  | local file                               |
//! | `id:<ref>`     | host application's [`ContentResolver`]   |
//!
//! A pre-built MIME part takes precedence over all of them.

use std::fmt;
use std::path::{Path, PathBuf};

use mailpost_mime::encoding::{decode_base64, encode_base64};
use mailpost_mime::{ContentType, Part};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error returned by a [`ContentResolver`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from parsing attachment keys or resolving content.
#[derive(Debug, Error)]
pub enum AttachmentError {
    /// Key is not `""` or `scheme:target`.
    #[error("Invalid attachment key: {0:?}")]
    InvalidKey(String),

    /// Key scheme is neither `file` nor `id`.
    #[error("Unsupported attachment scheme: {0:?}")]
    UnsupportedScheme(String),

    /// An `id:` key was used but no resolver was supplied.
    #[error("Content resolver not set")]
    ResolverNotSet,

    /// File could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// Path from the key.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Resolver failed for an id.
    #[error("Content lookup for id {id:?} failed: {source}")]
    Lookup {
        /// Reference from the key.
        id: String,
        /// Error from the resolver.
        source: BoxError,
    },

    /// Nothing to send after resolution.
    #[error("Attachment content is empty")]
    EmptyContent,

    /// Content or content type could not be turned into a MIME part.
    #[error("Invalid attachment content: {0}")]
    Mime(#[from] mailpost_mime::Error),
}

impl AttachmentError {
    /// Returns true for errors caused by setup rather than data.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::InvalidKey(_) | Self::UnsupportedScheme(_) | Self::ResolverNotSet
        )
    }
}

/// Result type for attachment operations.
pub type AttachmentResult<T> = std::result::Result<T, AttachmentError>;

/// Content returned by a [`ContentResolver`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedContent {
    /// Raw bytes.
    pub data: Vec<u8>,
    /// MIME type, e.g. `text/plain`.
    pub content_type: String,
    /// File name shown to the recipient.
    pub name: String,
}

/// Host-supplied lookup for `id:` attachments.
///
/// Implemented for any `Fn(&str) -> Result<ResolvedContent, BoxError>`.
pub trait ContentResolver: Send + Sync {
    /// Fetches content by opaque reference.
    ///
    /// # Errors
    ///
    /// Returns whatever error the backing store produces.
    fn content_by_id(&self, id: &str) -> Result<ResolvedContent, BoxError>;
}

impl<F> ContentResolver for F
where
    F: Fn(&str) -> Result<ResolvedContent, BoxError> + Send + Sync,
{
    fn content_by_id(&self, id: &str) -> Result<ResolvedContent, BoxError> {
        self(id)
    }
}

/// Scheme of an attachment key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttachmentScheme {
    /// Empty key: content is already inline.
    Inline,
    /// `file:` key.
    File,
    /// `id:` key.
    Id,
    /// Anything else, kept for diagnostics.
    Unrecognized(String),
}

impl AttachmentScheme {
    /// Returns the scheme as written in a key (`""` for inline).
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inline => "",
            Self::File => "file",
            Self::Id => "id",
            Self::Unrecognized(raw) => raw,
        }
    }
}

/// Parsed `scheme:target` attachment key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttachmentKey {
    /// Where the content comes from.
    pub scheme: AttachmentScheme,
    /// Path or reference; empty for inline keys.
    pub target: String,
}

impl AttachmentKey {
    /// Parses a key.
    ///
    /// An empty key is valid and means inline content. Otherwise the key must
    /// contain exactly one `:` with non-empty text on both sides.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::InvalidKey`] if the key is malformed.
    pub fn parse(key: &str) -> AttachmentResult<Self> {
        if key.is_empty() {
            return Ok(Self {
                scheme: AttachmentScheme::Inline,
                target: String::new(),
            });
        }

        let mut pieces = key.split(':');
        let (Some(scheme), Some(target), None) = (pieces.next(), pieces.next(), pieces.next())
        else {
            return Err(AttachmentError::InvalidKey(key.to_string()));
        };
        if scheme.is_empty() || target.is_empty() {
            return Err(AttachmentError::InvalidKey(key.to_string()));
        }

        let scheme = match scheme {
            "file" => AttachmentScheme::File,
            "id" => AttachmentScheme::Id,
            other => AttachmentScheme::Unrecognized(other.to_string()),
        };

        Ok(Self {
            scheme,
            target: target.to_string(),
        })
    }
}

impl fmt::Display for AttachmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scheme {
            AttachmentScheme::Inline => Ok(()),
            _ => write!(f, "{}:{}", self.scheme.as_str(), self.target),
        }
    }
}

/// Attachment or inline part of a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Attachment {
    /// Source directive: `""`, `file:<path>` or `id:<ref>`.
    pub key: String,
    /// MIME type; derived from the source when empty.
    pub content_type: String,
    /// File name; derived from the source when empty.
    pub name: String,
    /// Base64 content.
    pub content: String,
    /// Content-ID for inlines; defaults to the name.
    pub content_id: String,
    /// Pre-built MIME part, used as-is.
    #[serde(skip)]
    pub part: Option<Part>,
}

impl Attachment {
    /// Creates an attachment resolved from `key` on load.
    #[must_use]
    pub fn from_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// Creates an attachment from raw bytes.
    #[must_use]
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: &[u8],
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            content: encode_base64(data),
            ..Self::default()
        }
    }

    /// Wraps a pre-built MIME part.
    #[must_use]
    pub fn from_part(part: Part) -> Self {
        Self {
            part: Some(part),
            ..Self::default()
        }
    }

    /// Sets the Content-ID used to reference an inline from HTML.
    #[must_use]
    pub fn with_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = content_id.into();
        self
    }

    /// Returns true if content is available without further resolution.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.part.as_ref().map_or(!self.content.is_empty(), |part| !part.is_empty())
    }

    /// Populates `content` (and empty `content_type`/`name`) from the key.
    ///
    /// A native part is only checked for content. File and id sources are
    /// read again on every call.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid, the source cannot be read,
    /// an `id:` key has no resolver, or the result is empty.
    pub async fn load_content(
        &mut self,
        resolver: Option<&dyn ContentResolver>,
    ) -> AttachmentResult<()> {
        if let Some(part) = &self.part {
            return if part.is_empty() {
                Err(AttachmentError::EmptyContent)
            } else {
                Ok(())
            };
        }

        let key = AttachmentKey::parse(&self.key)?;
        match key.scheme {
            AttachmentScheme::Inline => {}
            AttachmentScheme::File => {
                let path = PathBuf::from(&key.target);
                let data = tokio::fs::read(&path)
                    .await
                    .map_err(|source| AttachmentError::Read {
                        path: path.clone(),
                        source,
                    })?;
                tracing::debug!(path = %path.display(), bytes = data.len(), "Loaded attachment file");

                self.content = encode_base64(&data);
                if self.content_type.is_empty() {
                    self.content_type = guess_content_type(&path);
                }
                if self.name.is_empty() {
                    self.name = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default();
                }
            }
            AttachmentScheme::Id => {
                let resolver = resolver.ok_or(AttachmentError::ResolverNotSet)?;
                let resolved =
                    resolver
                        .content_by_id(&key.target)
                        .map_err(|source| AttachmentError::Lookup {
                            id: key.target.clone(),
                            source,
                        })?;

                self.content = encode_base64(&resolved.data);
                if self.content_type.is_empty() {
                    self.content_type = resolved.content_type;
                }
                if self.name.is_empty() {
                    self.name = resolved.name;
                }
            }
            AttachmentScheme::Unrecognized(scheme) => {
                return Err(AttachmentError::UnsupportedScheme(scheme));
            }
        }

        if self.content.trim().is_empty() {
            return Err(AttachmentError::EmptyContent);
        }
        Ok(())
    }

    /// Builds the MIME part for a resolved attachment.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not valid base64, is empty, or the
    /// content type cannot be parsed.
    pub fn to_part(&self, inline: bool) -> AttachmentResult<Part> {
        if let Some(part) = &self.part {
            return Ok(part.clone());
        }

        let data = decode_base64(&self.content)?;
        if data.is_empty() {
            return Err(AttachmentError::EmptyContent);
        }

        let content_type = if self.content_type.trim().is_empty() {
            ContentType::parse(&guess_content_type(Path::new(&self.name)))?
        } else {
            ContentType::parse(&self.content_type)?
        };
        let name = if self.name.is_empty() {
            "attachment"
        } else {
            self.name.as_str()
        };

        Ok(if inline {
            let content_id = if self.content_id.is_empty() {
                name
            } else {
                self.content_id.as_str()
            };
            Part::inline(&content_type, name, content_id, &data)
        } else {
            Part::attachment(&content_type, name, &data)
        })
    }
}

fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
