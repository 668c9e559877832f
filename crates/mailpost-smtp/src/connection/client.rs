//! Type-state SMTP client.

use super::{ServerInfo, SmtpStream, TlsOptions};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
use base64::Engine;
use std::collections::HashSet;
use std::marker::PhantomData;

/// Type-state marker for connected state.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for authenticated state.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker for mail transaction started.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker for recipient added.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker for data mode.
#[derive(Debug)]
pub struct Data;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Connected {}
    impl Sealed for super::Authenticated {}
}

/// States from which a mail transaction may start.
pub trait Ready: sealed::Sealed {}
impl Ready for Connected {}
impl Ready for Authenticated {}

/// SMTP client with type-state pattern.
///
/// Dropping a client in any state closes the underlying socket.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    _state: PhantomData<State>,
}

/// Connection trait for all states.
pub trait SmtpConnection {
    /// Returns the server information.
    fn server_info(&self) -> &ServerInfo;

    /// Returns true if the session runs over TLS.
    fn is_tls(&self) -> bool;
}

impl<S> SmtpConnection for Client<S> {
    fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }
}

impl Client<Connected> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or if the server returns an error.
    pub async fn from_stream(mut stream: SmtpStream) -> Result<Self> {
        let greeting = stream.read_reply().await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(greeting.into_error());
        }

        // First word of the greeting is the server's name
        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                extensions: HashSet::new(),
            },
            _state: PhantomData,
        })
    }

    /// Greets the server with EHLO, falling back to HELO when EHLO is
    /// rejected with a permanent error.
    ///
    /// # Errors
    ///
    /// Returns an error if both greetings fail.
    pub async fn hello(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .send_command(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;

        if reply.is_success() {
            self.server_info.extensions = parse_extensions(&reply);
            return Ok(self);
        }

        if !reply.code.is_permanent() {
            return Err(reply.into_error());
        }

        tracing::debug!(code = %reply.code, "EHLO rejected, trying HELO");
        let reply = self
            .send_command(Command::Helo {
                hostname: client_hostname.to_string(),
            })
            .await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }

        self.server_info.extensions.clear();
        Ok(self)
    }

    /// Upgrades the connection to TLS using STARTTLS and greets again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if the server did not advertise
    /// STARTTLS, or an error if the command or handshake fails.
    pub async fn starttls(
        mut self,
        hostname: &str,
        client_hostname: &str,
        tls: TlsOptions,
    ) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        let reply = self.send_command(Command::StartTls).await?;
        if reply.code != ReplyCode::SERVICE_READY {
            return Err(reply.into_error());
        }

        let server_info = self.server_info;
        let stream = self.stream.upgrade_to_tls(hostname, tls).await?;
        let client = Self {
            stream,
            server_info,
            _state: PhantomData,
        };

        // Capabilities learned before the handshake are discarded
        client.hello(client_hostname).await
    }

    /// Authenticates using the PLAIN mechanism (RFC 4616).
    ///
    /// `identity` is the optional authorization identity sent before the
    /// username.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if the server did not advertise AUTH,
    /// or the server's rejection.
    pub async fn auth_plain(
        mut self,
        identity: Option<&str>,
        username: &str,
        password: &str,
    ) -> Result<Client<Authenticated>> {
        if self.server_info.auth_mechanisms().is_none() {
            return Err(Error::NotSupported("AUTH".into()));
        }

        let reply = self
            .send_command(Command::Auth {
                mechanism: AuthMechanism::Plain,
                initial_response: plain_response(identity, username, password),
            })
            .await?;

        if reply.code != ReplyCode::AUTH_SUCCEEDED && !reply.is_success() {
            return Err(reply.into_error());
        }

        Ok(self.transition())
    }
}

impl<S: Ready> Client<S> {
    /// Sends NOOP to check the session is alive.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not answer with 2xx.
    pub async fn noop(&mut self) -> Result<()> {
        let reply = self.send_command(Command::Noop).await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        Ok(())
    }

    /// Starts a mail transaction.
    ///
    /// `size` is the message size announced with the SIZE parameter when the
    /// server supports it; a message over the advertised limit is refused
    /// before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is too large or MAIL FROM fails.
    pub async fn mail_from(
        mut self,
        from: Address,
        size: Option<usize>,
    ) -> Result<Client<MailTransaction>> {
        let info = &self.server_info;
        if let (Some(size), Some(limit)) = (size, info.max_message_size()) {
            if size > limit {
                return Err(Error::MessageTooLarge { size, limit });
            }
        }

        let cmd = Command::MailFrom {
            body: info.supports(&Extension::EightBitMime).then_some("8BITMIME"),
            size: size.filter(|_| info.has_size_extension()),
            smtputf8: info.supports(&Extension::SmtpUtf8) && !from.as_str().is_ascii(),
            from,
        };
        let reply = self.send_command(cmd).await?;

        if !reply.is_success() {
            return Err(reply.into_error());
        }

        Ok(self.transition())
    }
}

impl Client<MailTransaction> {
    /// Adds a recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Client<RecipientAdded>> {
        self.add_recipient(to).await?;
        Ok(self.transition())
    }
}

impl Client<RecipientAdded> {
    /// Adds another recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Self> {
        self.add_recipient(to).await?;
        Ok(self)
    }

    /// Begins sending message data.
    ///
    /// # Errors
    ///
    /// Returns an error if the DATA command fails.
    pub async fn data(mut self) -> Result<Client<Data>> {
        let reply = self.send_command(Command::Data).await?;

        if reply.code != ReplyCode::START_DATA {
            return Err(reply.into_error());
        }

        Ok(self.transition())
    }
}

impl Client<Data> {
    /// Sends the message content and completes the transaction.
    ///
    /// Message should be RFC 5322 formatted. Line endings are normalized to
    /// CRLF, lines starting with `.` are dot-stuffed, and the terminating
    /// `.` line is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if sending the message fails or server rejects it.
    pub async fn send_message(mut self, message: &[u8]) -> Result<Client<Connected>> {
        self.stream.write_all(&dot_stuff(message)).await?;

        let reply = self.stream.read_reply().await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }

        Ok(self.transition())
    }
}

// Common implementation for all states
impl<S> Client<S> {
    async fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        self.stream.write_all(&cmd.serialize()).await?;
        self.stream.read_reply().await
    }

    async fn add_recipient(&mut self, to: Address) -> Result<()> {
        let reply = self.send_command(Command::RcptTo { to }).await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        Ok(())
    }

    fn transition<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            _state: PhantomData,
        }
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(Command::Quit).await?;

        if !reply.is_success() {
            return Err(reply.into_error());
        }

        Ok(())
    }
}

fn parse_extensions(reply: &Reply) -> HashSet<Extension> {
    // First line is the server greeting, not an extension
    reply
        .message
        .iter()
        .skip(1)
        .map(|line| Extension::parse(line))
        .collect()
}

/// Builds the base64 `authzid NUL authcid NUL passwd` PLAIN response.
fn plain_response(identity: Option<&str>, username: &str, password: &str) -> String {
    let credentials = format!("{}\0{username}\0{password}", identity.unwrap_or_default());
    base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes())
}

/// Normalizes line endings to CRLF, dot-stuffs, and appends `.` CRLF.
fn dot_stuff(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 64 + 8);
    let body = message.strip_suffix(b"\n").unwrap_or(message);
    let body = body.strip_suffix(b"\r").unwrap_or(body);

    if !body.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
}
