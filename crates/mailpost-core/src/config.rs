//! SMTP settings and their validated form.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 587;

/// Dial timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// EHLO name used when none is configured.
pub const DEFAULT_LOCAL_NAME: &str = "localhost";

/// How the connection to the server should be secured.
///
/// Parsed from `""`/`"unknown"` (auto-detect), `"no-tls"`, `"tls"` and
/// `"start-tls"`. Any other value is kept verbatim and rejected by
/// [`SmtpSettings::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DialMode {
    /// Pick a strategy from the port.
    #[default]
    Auto,
    /// Plaintext only.
    NoTls,
    /// Implicit TLS.
    Tls,
    /// Plaintext upgraded with STARTTLS; fails if the server cannot upgrade.
    StartTls,
    /// Value not understood.
    Unrecognized(String),
}

impl DialMode {
    /// Returns the configuration string for this mode.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Auto => "unknown",
            Self::NoTls => "no-tls",
            Self::Tls => "tls",
            Self::StartTls => "start-tls",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Returns false for [`DialMode::Unrecognized`].
    #[must_use]
    pub const fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl From<&str> for DialMode {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "unknown" => Self::Auto,
            "no-tls" => Self::NoTls,
            "tls" => Self::Tls,
            "start-tls" => Self::StartTls,
            _ => Self::Unrecognized(value.to_string()),
        }
    }
}

impl From<String> for DialMode {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<DialMode> for String {
    fn from(mode: DialMode) -> Self {
        mode.as_str().to_string()
    }
}

impl fmt::Display for DialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication strategy.
///
/// Parsed from `"none"`, `"plain"` and `"identity"`. Empty and unknown values
/// are kept in [`AuthType::Unrecognized`] and rejected by validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthType {
    /// No AUTH command is issued.
    None,
    /// AUTH PLAIN with username and password.
    Plain,
    /// AUTH PLAIN with an additional authorization identity.
    Identity,
    /// Value not understood (empty when unset).
    Unrecognized(String),
}

impl Default for AuthType {
    fn default() -> Self {
        Self::Unrecognized(String::new())
    }
}

impl AuthType {
    /// Returns the configuration string for this type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Plain => "plain",
            Self::Identity => "identity",
            Self::Unrecognized(raw) => raw,
        }
    }

    /// Returns true if credentials are needed.
    #[must_use]
    pub const fn requires_credentials(&self) -> bool {
        matches!(self, Self::Plain | Self::Identity)
    }
}

impl From<&str> for AuthType {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "plain" => Self::Plain,
            "identity" => Self::Identity,
            _ => Self::Unrecognized(value.to_string()),
        }
    }
}

impl From<String> for AuthType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<AuthType> for String {
    fn from(auth: AuthType) -> Self {
        auth.as_str().to_string()
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw SMTP settings as supplied by the caller.
///
/// Deserialized from JSON with camelCase keys. Zero or empty values mean
/// "use the default". Turn them into a [`SmtpConfig`] with
/// [`SmtpSettings::validate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmtpSettings {
    /// Server hostname.
    pub host: String,
    /// Server port (default: 587).
    pub port: u16,
    /// Username for authentication.
    pub username: String,
    /// Password for authentication.
    pub password: String,
    /// File holding the password, read when `password` is empty.
    pub password_file: Option<PathBuf>,
    /// Authorization identity for [`AuthType::Identity`].
    pub identity: String,
    /// How to secure the connection.
    pub dial_mode: DialMode,
    /// Accept any server certificate.
    pub insecure_skip_verify: bool,
    /// Dial timeout in seconds (default: 30).
    pub connection_timeout: u64,
    /// Authentication strategy.
    pub auth_type: AuthType,
    /// Name sent with EHLO/HELO (default: `localhost`).
    pub local_name: String,
    /// Allow sending messages with an empty subject.
    pub allow_empty_subject: bool,
    /// Allow sending messages without text or HTML body.
    pub allow_no_text_html: bool,
    /// Resolve and send attachments and inlines.
    pub allow_attachments: bool,
}

impl SmtpSettings {
    /// Loads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parses settings from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Normalizes the settings and produces an immutable configuration.
    ///
    /// String fields are trimmed. When `password` is empty and
    /// `password_file` is set, the password is read from the file and the
    /// file reference is cleared so it is not read again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a missing host, an unknown dial mode or
    /// auth type, or missing credentials; [`Error::PasswordFile`] if the
    /// password file cannot be read.
    pub fn validate(&mut self) -> Result<SmtpConfig> {
        trim_in_place(&mut self.host);
        trim_in_place(&mut self.username);
        trim_in_place(&mut self.identity);
        trim_in_place(&mut self.local_name);

        if self.password.is_empty()
            && let Some(path) = &self.password_file
        {
            let contents = std::fs::read_to_string(path).map_err(|source| Error::PasswordFile {
                path: path.clone(),
                source,
            })?;
            self.password = contents.trim_end_matches(['\r', '\n']).to_string();
            // Kept until a read succeeds
            self.password_file = None;
        }

        if self.host.is_empty() {
            return Err(Error::Config("host is required".into()));
        }

        if !self.dial_mode.is_recognized() {
            return Err(Error::Config(format!(
                "invalid dial mode: {:?}",
                self.dial_mode.as_str()
            )));
        }

        match &self.auth_type {
            AuthType::Unrecognized(raw) if raw.trim().is_empty() => {
                return Err(Error::Config("missing auth type".into()));
            }
            AuthType::Unrecognized(raw) => {
                return Err(Error::Config(format!("invalid auth type: {raw:?}")));
            }
            auth if auth.requires_credentials() => {
                if self.username.is_empty() {
                    return Err(Error::Config(format!(
                        "username is required for auth type {auth}"
                    )));
                }
                if self.password.is_empty() {
                    return Err(Error::Config(format!(
                        "password is required for auth type {auth}"
                    )));
                }
                if *auth == AuthType::Identity && self.identity.is_empty() {
                    return Err(Error::Config(
                        "identity is required for auth type identity".into(),
                    ));
                }
            }
            _ => {}
        }

        if self.port == 0 {
            self.port = DEFAULT_PORT;
        }
        if self.local_name.is_empty() {
            self.local_name = DEFAULT_LOCAL_NAME.to_string();
        }
        let timeout = if self.connection_timeout == 0 {
            DEFAULT_TIMEOUT
        } else {
            Duration::from_secs(self.connection_timeout)
        };

        Ok(SmtpConfig {
            address: format!("{}:{}", self.host, self.port),
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            identity: self.identity.clone(),
            dial_mode: self.dial_mode.clone(),
            insecure_skip_verify: self.insecure_skip_verify,
            timeout,
            auth_type: self.auth_type.clone(),
            local_name: self.local_name.clone(),
            allow_empty_subject: self.allow_empty_subject,
            allow_no_text_html: self.allow_no_text_html,
            allow_attachments: self.allow_attachments,
        })
    }
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

/// Validated, immutable SMTP configuration.
///
/// Only [`SmtpSettings::validate`] creates one, so every value here has
/// passed validation and has its defaults applied.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    host: String,
    port: u16,
    address: String,
    username: String,
    password: String,
    identity: String,
    dial_mode: DialMode,
    insecure_skip_verify: bool,
    timeout: Duration,
    auth_type: AuthType,
    local_name: String,
    allow_empty_subject: bool,
    allow_no_text_html: bool,
    allow_attachments: bool,
}

impl SmtpConfig {
    /// Server hostname.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Username for authentication.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password for authentication.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Authorization identity.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Dial mode.
    #[must_use]
    pub const fn dial_mode(&self) -> &DialMode {
        &self.dial_mode
    }

    /// Whether certificate verification is skipped.
    #[must_use]
    pub const fn insecure_skip_verify(&self) -> bool {
        self.insecure_skip_verify
    }

    /// Dial timeout. Bounds the TCP connect only.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Authentication strategy.
    #[must_use]
    pub const fn auth_type(&self) -> &AuthType {
        &self.auth_type
    }

    /// Name sent with EHLO/HELO.
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Whether messages may have an empty subject.
    #[must_use]
    pub const fn allow_empty_subject(&self) -> bool {
        self.allow_empty_subject
    }

    /// Whether messages may omit both text and HTML bodies.
    #[must_use]
    pub const fn allow_no_text_html(&self) -> bool {
        self.allow_no_text_html
    }

    /// Whether attachments and inlines are resolved and sent.
    #[must_use]
    pub const fn allow_attachments(&self) -> bool {
        self.allow_attachments
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("identity", &self.identity)
            .field("dial_mode", &self.dial_mode)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("timeout", &self.timeout)
            .field("auth_type", &self.auth_type)
            .field("local_name", &self.local_name)
            .finish_non_exhaustive()
    }
}
