//! SMTP client lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;

use crate::attachment::ContentResolver;
use crate::config::SmtpConfig;
use crate::error::Result;
use crate::piece::MailPiece;
use crate::sender::SmtpSender;

/// Callback receiving the outcome of a detached send.
pub type SendCallback = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// Configured SMTP client.
///
/// Holds a validated [`SmtpConfig`] and an optional [`ContentResolver`] for
/// `id:` attachments. No connection is kept open: [`SmtpClient::test`] and
/// [`SmtpClient::send_mail`] each open and close their own.
pub struct SmtpClient {
    config: Arc<SmtpConfig>,
    resolver: Option<Arc<dyn ContentResolver>>,
    initialized: AtomicBool,
}

impl SmtpClient {
    /// Creates a client from a validated configuration.
    #[must_use]
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            config: Arc::new(config),
            resolver: None,
            initialized: AtomicBool::new(false),
        }
    }

    /// Sets the resolver used for `id:` attachment keys.
    #[must_use]
    pub fn with_content_resolver(mut self, resolver: Arc<dyn ContentResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    /// Probes the server: connect, authenticate, NOOP, QUIT.
    ///
    /// Marks the client initialized on success and uninitialized on failure.
    ///
    /// # Errors
    ///
    /// Returns the dial, auth or transport error from the probe.
    pub async fn test(&self) -> Result<()> {
        let result = self.sender().probe().await;
        self.initialized.store(result.is_ok(), Ordering::SeqCst);
        match &result {
            Ok(()) => tracing::info!(address = self.config.address(), "SMTP server reachable"),
            Err(error) => tracing::debug!(address = self.config.address(), %error, "SMTP probe failed"),
        }
        result
    }

    /// Same as [`SmtpClient::test`].
    ///
    /// # Errors
    ///
    /// Returns the dial, auth or transport error from the probe.
    pub async fn open_connection(&self) -> Result<()> {
        self.test().await
    }

    /// Marks the client uninitialized. There is no socket to release.
    pub fn close_connection(&self) {
        self.initialized.store(false, Ordering::SeqCst);
    }

    /// Returns true after a successful probe and before the next failure or
    /// [`SmtpClient::close_connection`].
    #[must_use]
    pub fn has_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Returns a fresh transmitter for pre-built messages.
    #[must_use]
    pub fn sender(&self) -> SmtpSender {
        SmtpSender::new(Arc::clone(&self.config))
    }

    /// Validates, assembles and sends a message.
    ///
    /// The client's allow flags are combined with the piece's own; either
    /// side can relax a check.
    ///
    /// # Errors
    ///
    /// Returns message errors before any network I/O, then dial, auth or
    /// transport errors. Nothing is retried.
    pub async fn send_mail(&self, mut piece: MailPiece) -> Result<()> {
        piece.allow_empty_subject |= self.config.allow_empty_subject();
        piece.allow_no_text_html |= self.config.allow_no_text_html();
        piece.allow_attachments |= self.config.allow_attachments();

        let builder = piece.validate(self.resolver.as_deref()).await?;
        let envelope = piece.envelope()?;
        let message = builder.build()?;

        self.sender().send_message(&envelope, &message).await
    }

    /// Sends a message on a background task.
    ///
    /// The outcome goes to `callback`; without one, failures are logged.
    pub fn send_mail_detached(
        self: &Arc<Self>,
        piece: MailPiece,
        callback: Option<SendCallback>,
    ) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            let result = client.send_mail(piece).await;
            match callback {
                Some(callback) => callback(result),
                None => {
                    if let Err(error) = result {
                        tracing::error!(address = client.config.address(), %error, "Failed to send mail");
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for SmtpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpClient")
            .field("config", &self.config)
            .field("resolver", &self.resolver.is_some())
            .field("initialized", &self.has_initialized())
            .finish()
    }
}
