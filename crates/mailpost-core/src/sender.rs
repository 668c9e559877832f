//! Per-call SMTP transmitter.
//!
//! Every operation opens one connection, runs its whole conversation and
//! closes the connection again. Nothing is cached between calls.

use std::sync::Arc;

use mailpost_mime::Message;
use mailpost_smtp::{Client, Ready};

use crate::auth::Authenticator;
use crate::config::SmtpConfig;
use crate::dial;
use crate::error::{Error, Result};
use crate::piece::Envelope;

/// Sends messages using a validated configuration.
#[derive(Debug, Clone)]
pub struct SmtpSender {
    config: Arc<SmtpConfig>,
    authenticator: Option<Authenticator>,
}

impl SmtpSender {
    /// Creates a sender for a configuration.
    #[must_use]
    pub fn new(config: Arc<SmtpConfig>) -> Self {
        let authenticator = Authenticator::from_config(&config);
        Self {
            config,
            authenticator,
        }
    }

    /// Configuration this sender uses.
    #[must_use]
    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    /// Checks that a session can be established and authenticated.
    ///
    /// Connects, authenticates if configured, sends NOOP and QUIT.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dial`], [`Error::Auth`] or [`Error::Transport`].
    pub async fn probe(&self) -> Result<()> {
        let client = dial::connect(&self.config).await?;
        match &self.authenticator {
            Some(authenticator) => noop_and_quit(authenticator.authenticate(client).await?).await,
            None => noop_and_quit(client).await,
        }
    }

    /// Sends a pre-built MIME message.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting, authenticating or any transaction
    /// step fails.
    pub async fn send_message(&self, envelope: &Envelope, message: &Message) -> Result<()> {
        self.send(envelope, &message.to_bytes()).await
    }

    /// Sends raw RFC 5322 bytes.
    ///
    /// The message is either accepted by the final DATA reply or the whole
    /// send fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecipients`] for an empty envelope, otherwise any
    /// dial, auth or transport error.
    pub async fn send(&self, envelope: &Envelope, message: &[u8]) -> Result<()> {
        if envelope.recipients.is_empty() {
            return Err(Error::NoRecipients);
        }

        let client = dial::connect(&self.config).await?;
        match &self.authenticator {
            Some(authenticator) => {
                transmit(authenticator.authenticate(client).await?, envelope, message).await
            }
            None => transmit(client, envelope, message).await,
        }?;

        tracing::debug!(
            address = self.config.address(),
            recipients = envelope.recipients.len(),
            bytes = message.len(),
            "Message accepted"
        );
        Ok(())
    }
}

fn stage(stage: &'static str) -> impl FnOnce(mailpost_smtp::Error) -> Error {
    move |source| Error::Transport { stage, source }
}

async fn noop_and_quit<S: Ready>(mut client: Client<S>) -> Result<()> {
    client.noop().await.map_err(stage("NOOP"))?;
    client.quit().await.map_err(stage("QUIT"))
}

async fn transmit<S: Ready>(client: Client<S>, envelope: &Envelope, message: &[u8]) -> Result<()> {
    let client = client
        .mail_from(envelope.from.clone(), Some(message.len()))
        .await
        .map_err(stage("MAIL FROM"))?;

    let (first, rest) = envelope
        .recipients
        .split_first()
        .ok_or(Error::NoRecipients)?;
    let mut client = client
        .rcpt_to(first.clone())
        .await
        .map_err(stage("RCPT TO"))?;
    for recipient in rest {
        client = client
            .rcpt_to(recipient.clone())
            .await
            .map_err(stage("RCPT TO"))?;
    }

    let client = client.data().await.map_err(stage("DATA"))?;
    let client = client
        .send_message(message)
        .await
        .map_err(stage("message transfer"))?;

    client.quit().await.map_err(stage("QUIT"))
}
