//! # mailpost-smtp
//!
//! SMTP client protocol layer implementing the parts of RFC 5321 needed to
//! deliver one message per connection.
//!
//! ## Features
//!
//! - **Type-state connection management**: Compile-time enforcement of valid
//!   SMTP state transitions
//! - **Protocol support**: EHLO (with HELO fallback), STARTTLS, AUTH PLAIN,
//!   MAIL FROM, RCPT TO, DATA, NOOP, QUIT
//! - **TLS support**: Both implicit TLS (port 465) and STARTTLS, with an
//!   opt-in to skip certificate verification
//! - **Dial timeout**: bounds the TCP connect only, never the conversation
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use mailpost_smtp::{Address, Client, TlsOptions};
//! use mailpost_smtp::connection::connect;
//!
//! #[tokio::main]
//! async fn main() -> mailpost_smtp::Result<()> {
//!     let stream = connect("smtp.example.com", 587, Duration::from_secs(30)).await?;
//!     let client = Client::from_stream(stream).await?;
//!     let client = client.hello("client.example.com").await?;
//!     let client = client
//!         .starttls("smtp.example.com", "client.example.com", TlsOptions::default())
//!         .await?;
//!     let client = client.auth_plain(None, "user@example.com", "password").await?;
//!
//!     let client = client
//!         .mail_from(Address::new("sender@example.com")?, None)
//!         .await?;
//!     let client = client.rcpt_to(Address::new("recipient@example.com")?).await?;
//!     let client = client.data().await?;
//!     let client = client
//!         .send_message(b"Subject: Test\r\n\r\nHello, World!\r\n")
//!         .await?;
//!
//!     client.quit().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── auth_plain() ───→ Authenticated
//! └──────────────┘                            │
//!        │                                    │
//!        └──────────── mail_from() ───────────┘
//!                          │
//!                          ↓
//!                   MailTransaction ───→ RecipientAdded ───→ Data
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{
    Authenticated, Client, Connected, Data, MailTransaction, Ready, RecipientAdded, ServerInfo,
    SmtpConnection, TlsOptions,
};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Mailbox, Reply, ReplyCode};
