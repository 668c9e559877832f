//! `mailpost` - send mail through an SMTP server described in a JSON file.
//!
//! ```text
//! mailpost <settings.json> test
//! mailpost <settings.json> send <piece.json>
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use mailpost_core::{MailPiece, SmtpClient, SmtpSettings};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: mailpost <settings.json> test\n       mailpost <settings.json> send <piece.json>";

/// Parsed command line.
enum Command {
    /// Probe the server.
    Test { settings: PathBuf },
    /// Send one message.
    Send { settings: PathBuf, piece: PathBuf },
}

impl Command {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        match args {
            [settings, command] if command == "test" => Ok(Self::Test {
                settings: settings.into(),
            }),
            [settings, command, piece] if command == "send" => Ok(Self::Send {
                settings: settings.into(),
                piece: piece.into(),
            }),
            _ => bail!("{USAGE}"),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailpost=info,mailpost_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> anyhow::Result<()> {
    match Command::parse(args)? {
        Command::Test { settings } => {
            let client = load_client(&settings)?;
            client
                .test()
                .await
                .with_context(|| format!("Connection test to {} failed", client.config().address()))?;
            info!(address = client.config().address(), "Connection test successful");
        }
        Command::Send { settings, piece } => {
            let client = load_client(&settings)?;
            let piece = load_piece(&piece)?;
            let recipients = piece.to.len() + piece.cc.len() + piece.bcc.len();
            client
                .send_mail(piece)
                .await
                .context("Failed to send message")?;
            info!(address = client.config().address(), recipients, "Message sent");
        }
    }
    Ok(())
}

fn load_client(path: &Path) -> anyhow::Result<SmtpClient> {
    let mut settings = SmtpSettings::from_json_file(path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    let config = settings.validate().context("Invalid SMTP settings")?;
    Ok(SmtpClient::new(config))
}

fn load_piece(path: &Path) -> anyhow::Result<MailPiece> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read message from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid message in {}", path.display()))
}
