//! Connection establishment.
//!
//! A [`DialMode`] resolves to an ordered list of [`DialStrategy`] values.
//! Strategies are tried in order on fresh sockets until one yields a greeted
//! session; if all fail, every attempt's error is reported.

use std::fmt;

use mailpost_smtp::connection::{connect as connect_plain, connect_tls};
use mailpost_smtp::{Client, Connected, TlsOptions};

use crate::config::{DialMode, SmtpConfig};
use crate::error::{Error, Result};

/// Port reserved for implicit TLS (RFC 8314).
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// One way of establishing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialStrategy {
    /// TCP, greeting, EHLO.
    Plain,
    /// TCP, TLS handshake, greeting, EHLO.
    ImplicitTls,
    /// TCP, greeting, EHLO, STARTTLS, TLS handshake, EHLO.
    StartTls,
}

impl fmt::Display for DialStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::ImplicitTls => write!(f, "implicit TLS"),
            Self::StartTls => write!(f, "STARTTLS"),
        }
    }
}

impl DialMode {
    /// Returns the strategies to try, in order, for a destination port.
    ///
    /// Explicit modes yield exactly one strategy. Auto-detect yields implicit
    /// TLS alone on port 465 and STARTTLS followed by plain everywhere else.
    #[must_use]
    pub fn strategies(&self, port: u16) -> Vec<DialStrategy> {
        match self {
            Self::NoTls => vec![DialStrategy::Plain],
            Self::Tls => vec![DialStrategy::ImplicitTls],
            Self::StartTls => vec![DialStrategy::StartTls],
            Self::Auto if port == IMPLICIT_TLS_PORT => vec![DialStrategy::ImplicitTls],
            Self::Auto => vec![DialStrategy::StartTls, DialStrategy::Plain],
            Self::Unrecognized(_) => Vec::new(),
        }
    }
}

/// A failed connection attempt.
#[derive(Debug)]
pub struct DialAttempt {
    /// Strategy that was tried.
    pub strategy: DialStrategy,
    /// Why it failed.
    pub error: mailpost_smtp::Error,
}

impl fmt::Display for DialAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.error)
    }
}

/// Establishes a greeted session using the configured dial mode.
///
/// # Errors
///
/// Returns [`Error::Dial`] listing every attempt if no strategy succeeds.
pub async fn connect(config: &SmtpConfig) -> Result<Client<Connected>> {
    let strategies = config.dial_mode().strategies(config.port());
    let mut attempts = Vec::with_capacity(strategies.len());

    for strategy in strategies {
        tracing::debug!(%strategy, address = config.address(), "Dialing SMTP server");
        match establish(strategy, config).await {
            Ok(client) => {
                tracing::debug!(%strategy, server = %client_name(&client), "SMTP session established");
                return Ok(client);
            }
            Err(error) => {
                // The failed socket was dropped inside `establish`
                tracing::debug!(%strategy, %error, "Dial attempt failed");
                attempts.push(DialAttempt { strategy, error });
            }
        }
    }

    Err(Error::Dial { attempts })
}

async fn establish(
    strategy: DialStrategy,
    config: &SmtpConfig,
) -> mailpost_smtp::Result<Client<Connected>> {
    let tls = TlsOptions {
        insecure_skip_verify: config.insecure_skip_verify(),
    };
    let host = config.host();

    match strategy {
        DialStrategy::Plain => {
            let stream = connect_plain(host, config.port(), config.timeout()).await?;
            Client::from_stream(stream)
                .await?
                .hello(config.local_name())
                .await
        }
        DialStrategy::ImplicitTls => {
            let stream = connect_tls(host, config.port(), config.timeout(), tls).await?;
            Client::from_stream(stream)
                .await?
                .hello(config.local_name())
                .await
        }
        DialStrategy::StartTls => {
            let stream = connect_plain(host, config.port(), config.timeout()).await?;
            Client::from_stream(stream)
                .await?
                .hello(config.local_name())
                .await?
                .starttls(host, config.local_name(), tls)
                .await
        }
    }
}

fn client_name(client: &Client<Connected>) -> &str {
    use mailpost_smtp::SmtpConnection;
    &client.server_info().hostname
}
