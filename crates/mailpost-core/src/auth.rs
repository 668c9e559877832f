//! Authentication strategy selection.

use std::net::IpAddr;

use mailpost_smtp::{Authenticated, Client, Connected, SmtpConnection};

use crate::config::{AuthType, SmtpConfig};
use crate::error::{Error, Result};

/// AUTH PLAIN credentials, optionally scoped by an authorization identity.
#[derive(Clone, PartialEq, Eq)]
pub struct Authenticator {
    identity: Option<String>,
    username: String,
    password: String,
    host: String,
}

impl Authenticator {
    /// Builds the authenticator for a configuration.
    ///
    /// Returns `None` for [`AuthType::None`]. Credential requirements are
    /// enforced by validation, not here.
    #[must_use]
    pub fn from_config(config: &SmtpConfig) -> Option<Self> {
        let identity = match config.auth_type() {
            AuthType::Plain => None,
            AuthType::Identity => Some(config.identity().to_string()),
            AuthType::None | AuthType::Unrecognized(_) => return None,
        };

        Some(Self {
            identity,
            username: config.username().to_string(),
            password: config.password().to_string(),
            host: config.host().to_string(),
        })
    }

    /// Authorization identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Username sent to the server.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Runs AUTH PLAIN on an established session.
    ///
    /// Credentials are only sent over TLS or to a loopback host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the connection is not protected, the server
    /// does not offer AUTH, or it rejects the credentials; I/O failures are
    /// returned as [`Error::Transport`].
    pub async fn authenticate(&self, client: Client<Connected>) -> Result<Client<Authenticated>> {
        if !client.is_tls() && !is_loopback(&self.host) {
            return Err(Error::Auth(format!(
                "refusing to send credentials to {} over an unencrypted connection",
                self.host
            )));
        }

        tracing::debug!(username = %self.username, identity = ?self.identity, "Authenticating");
        client
            .auth_plain(self.identity(), &self.username, &self.password)
            .await
            .map_err(|error| match error {
                mailpost_smtp::Error::SmtpError { .. } | mailpost_smtp::Error::NotSupported(_) => {
                    Error::Auth(error.to_string())
                }
                source => Error::Transport {
                    stage: "AUTH",
                    source,
                },
            })
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("identity", &self.identity)
            .field("username", &self.username)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

fn is_loopback(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host
            .trim_matches(['[', ']'])
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_loopback())
}
