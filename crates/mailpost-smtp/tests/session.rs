//! Session tests against a scripted in-process SMTP server.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use mailpost_smtp::connection::connect;
use mailpost_smtp::{Address, Client, Error, SmtpConnection};

/// Starts a server that answers one session and returns every line it read.
async fn scripted_server(ehlo_reply: &'static str) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut reader = BufReader::new(read);
        let mut seen = Vec::new();

        write.write_all(b"220 test.local ESMTP\r\n").await.unwrap();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            let line = line.trim_end().to_string();
            seen.push(line.clone());

            let verb = line.split([' ', ':']).next().unwrap().to_ascii_uppercase();
            let reply: &[u8] = match verb.as_str() {
                "EHLO" => ehlo_reply.as_bytes(),
                "AUTH" => b"235 2.7.0 Authentication successful\r\n",
                "DATA" => {
                    write.write_all(b"354 go ahead\r\n").await.unwrap();
                    loop {
                        let mut data = String::new();
                        reader.read_line(&mut data).await.unwrap();
                        let data = data.trim_end().to_string();
                        let done = data == ".";
                        seen.push(data);
                        if done {
                            break;
                        }
                    }
                    b"250 2.0.0 queued\r\n"
                }
                "QUIT" => {
                    write.write_all(b"221 bye\r\n").await.unwrap();
                    break;
                }
                _ => b"250 OK\r\n",
            };
            write.write_all(reply).await.unwrap();
        }
        seen
    });

    (port, handle)
}

#[tokio::test]
async fn test_full_transaction() {
    let (port, server) =
        scripted_server("250-test.local\r\n250-AUTH PLAIN\r\n250 8BITMIME\r\n").await;

    let stream = connect("127.0.0.1", port, Duration::from_secs(5))
        .await
        .unwrap();
    let client = Client::from_stream(stream).await.unwrap();
    assert_eq!(client.server_info().hostname, "test.local");

    let client = client.hello("client.local").await.unwrap();
    assert!(!client.is_tls());

    let client = client.auth_plain(None, "user", "pass").await.unwrap();
    let client = client
        .mail_from(Address::new("sender@example.com").unwrap(), Some(42))
        .await
        .unwrap();
    let client = client
        .rcpt_to(Address::new("a@example.com").unwrap())
        .await
        .unwrap();
    let client = client
        .rcpt_to(Address::new("b@example.com").unwrap())
        .await
        .unwrap();
    let client = client.data().await.unwrap();
    let client = client
        .send_message(b"Subject: hi\r\n\r\n.dot\r\nbody\r\n")
        .await
        .unwrap();
    client.quit().await.unwrap();

    let seen = server.await.unwrap();
    assert_eq!(seen[0], "EHLO client.local");
    assert_eq!(seen[1], "AUTH PLAIN AHVzZXIAcGFzcw==");
    // SIZE was not advertised, 8BITMIME was
    assert_eq!(seen[2], "MAIL FROM:<sender@example.com> BODY=8BITMIME");
    assert_eq!(seen[3], "RCPT TO:<a@example.com>");
    assert_eq!(seen[4], "RCPT TO:<b@example.com>");
    assert_eq!(seen[5], "DATA");
    assert!(seen.contains(&"..dot".to_string()));
    assert_eq!(seen.last().unwrap(), "QUIT");
}

#[tokio::test]
async fn test_helo_fallback() {
    let (port, server) = scripted_server("502 5.5.1 EHLO not implemented\r\n").await;

    let stream = connect("127.0.0.1", port, Duration::from_secs(5))
        .await
        .unwrap();
    let client = Client::from_stream(stream).await.unwrap();
    let mut client = client.hello("client.local").await.unwrap();
    assert!(client.server_info().extensions.is_empty());

    client.noop().await.unwrap();
    client.quit().await.unwrap();

    let seen = server.await.unwrap();
    assert_eq!(seen, vec!["EHLO client.local", "HELO client.local", "NOOP", "QUIT"]);
}

#[tokio::test]
async fn test_starttls_not_advertised() {
    let (port, _server) = scripted_server("250 test.local\r\n").await;

    let stream = connect("127.0.0.1", port, Duration::from_secs(5))
        .await
        .unwrap();
    let client = Client::from_stream(stream).await.unwrap();
    let client = client.hello("client.local").await.unwrap();

    let result = client
        .starttls("127.0.0.1", "client.local", mailpost_smtp::TlsOptions::default())
        .await;
    assert!(matches!(result, Err(Error::NotSupported(ref what)) if what == "STARTTLS"));
}

#[tokio::test]
async fn test_auth_requires_advertisement() {
    let (port, _server) = scripted_server("250 test.local\r\n").await;

    let stream = connect("127.0.0.1", port, Duration::from_secs(5))
        .await
        .unwrap();
    let client = Client::from_stream(stream).await.unwrap();
    let client = client.hello("client.local").await.unwrap();

    let result = client.auth_plain(None, "user", "pass").await;
    assert!(matches!(result, Err(Error::NotSupported(ref what)) if what == "AUTH"));
}

#[tokio::test]
async fn test_size_limit_refused_locally() {
    let (port, _server) = scripted_server("250-test.local\r\n250 SIZE 10\r\n").await;

    let stream = connect("127.0.0.1", port, Duration::from_secs(5))
        .await
        .unwrap();
    let client = Client::from_stream(stream).await.unwrap();
    let client = client.hello("client.local").await.unwrap();

    let result = client
        .mail_from(Address::new("sender@example.com").unwrap(), Some(11))
        .await;
    assert!(matches!(
        result,
        Err(Error::MessageTooLarge { size: 11, limit: 10 })
    ));
}
