//! Minimal SMTP submission client over implicit TLS (SMTPS).
//!
//! Covers exactly the happy path a notification needs: greeting, EHLO,
//! AUTH PLAIN, one envelope, one message, QUIT. Anything the server says
//! that we did not expect aborts the attempt; the caller treats that as a
//! failed (and forgotten) delivery.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rustls::pki_types::ServerName;
use std::env;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

#[derive(Debug, Error)]
pub enum SmtpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid SMTP host: {0}")]
    InvalidHost(String),
    #[error("connection closed mid-dialogue")]
    ConnectionClosed,
    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: &'static str, reply: String },
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// From header, either a bare address or `Display Name <addr>`.
    pub from: String,
}

impl SmtpConfig {
    /// Reads `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`,
    /// `SMTP_FROM`. Returns `None` unless both credentials are present.
    pub fn from_env() -> Option<Self> {
        let username = env::var("SMTP_USERNAME").ok().filter(|v| !v.is_empty())?;
        let password = env::var("SMTP_PASSWORD").ok().filter(|v| !v.is_empty())?;
        let host = env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string());
        let port = env::var("SMTP_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(465);
        let from = env::var("SMTP_FROM").unwrap_or_else(|_| format!("Mealbridge <{username}>"));
        Some(Self {
            host,
            port,
            username,
            password,
            from,
        })
    }
}

type SmtpStream = BufReader<TlsStream<TcpStream>>;

/// Submits one HTML message to one recipient.
pub async fn submit(
    config: &SmtpConfig,
    to: &str,
    subject: &str,
    html_body: &str,
) -> Result<(), SmtpError> {
    let mut stream = connect_tls(&config.host, config.port).await?;
    expect(&mut stream, "greeting", "220").await?;

    command(&mut stream, "EHLO", "EHLO localhost\r\n", "250").await?;

    let token = STANDARD.encode(format!("\0{}\0{}", config.username, config.password));
    command(&mut stream, "AUTH", &format!("AUTH PLAIN {token}\r\n"), "235").await?;

    let from_addr = bare_address(&config.from);
    command(
        &mut stream,
        "MAIL FROM",
        &format!("MAIL FROM:<{from_addr}>\r\n"),
        "250",
    )
    .await?;
    command(&mut stream, "RCPT TO", &format!("RCPT TO:<{to}>\r\n"), "250").await?;
    command(&mut stream, "DATA", "DATA\r\n", "354").await?;

    let message = format_message(&config.from, to, subject, html_body);
    write_all(&mut stream, message.as_bytes()).await?;
    command(&mut stream, "end of data", "\r\n.\r\n", "250").await?;
    command(&mut stream, "QUIT", "QUIT\r\n", "221").await?;
    Ok(())
}

async fn connect_tls(host: &str, port: u16) -> Result<SmtpStream, SmtpError> {
    let tcp = TcpStream::connect((host, port)).await?;

    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let tls_config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(tls_config));
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| SmtpError::InvalidHost(host.to_string()))?;

    let tls = connector.connect(server_name, tcp).await?;
    Ok(BufReader::new(tls))
}

async fn command(
    stream: &mut SmtpStream,
    name: &'static str,
    line: &str,
    expected: &'static str,
) -> Result<(), SmtpError> {
    write_all(stream, line.as_bytes()).await?;
    expect(stream, name, expected).await
}

async fn write_all(stream: &mut SmtpStream, data: &[u8]) -> Result<(), SmtpError> {
    stream.get_mut().write_all(data).await?;
    stream.get_mut().flush().await?;
    Ok(())
}

/// Reads one (possibly multi-line) reply and checks its code.
async fn expect(
    stream: &mut SmtpStream,
    command: &'static str,
    expected: &'static str,
) -> Result<(), SmtpError> {
    let reply = read_reply(stream).await?;
    if reply.starts_with(expected) {
        Ok(())
    } else {
        Err(SmtpError::UnexpectedReply { command, reply })
    }
}

async fn read_reply(stream: &mut SmtpStream) -> Result<String, SmtpError> {
    let mut reply = String::new();
    loop {
        let mut line = String::new();
        let n = stream.read_line(&mut line).await?;
        if n == 0 {
            return Err(SmtpError::ConnectionClosed);
        }
        let line = line.trim_end();
        if !reply.is_empty() {
            reply.push(' ');
        }
        reply.push_str(line);
        // "250-..." continues the reply, "250 ..." ends it.
        if line.len() < 4 || line.as_bytes()[3] != b'-' {
            break;
        }
    }
    Ok(reply)
}

/// Extracts the address from `Display Name <addr>`, or returns the input
/// unchanged when it is already a bare address.
fn bare_address(from: &str) -> &str {
    match (from.find('<'), from.rfind('>')) {
        (Some(start), Some(end)) if start < end => from[start + 1..end].trim(),
        _ => from.trim(),
    }
}

fn format_message(from: &str, to: &str, subject: &str, html_body: &str) -> String {
    use std::fmt::Write;

    let mut message = String::new();
    let _ = write!(message, "From: {from}\r\n");
    let _ = write!(message, "To: {to}\r\n");
    let _ = write!(message, "Subject: {subject}\r\n");
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str("Content-Type: text/html; charset=utf-8\r\n");
    message.push_str("Content-Transfer-Encoding: 8bit\r\n");
    message.push_str("\r\n");
    message.push_str(&dot_stuff(html_body));
    message
}

/// Doubles leading dots so body lines cannot terminate DATA early.
fn dot_stuff(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    for (i, line) in body.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if line.starts_with('.') {
            out.push('.');
        }
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_address_unwraps_display_names() {
        assert_eq!(bare_address("Mealbridge <relay@example.org>"), "relay@example.org");
        assert_eq!(bare_address("relay@example.org"), "relay@example.org");
        assert_eq!(bare_address(" relay@example.org "), "relay@example.org");
    }

    #[test]
    fn dot_stuffing_escapes_leading_dots_only() {
        assert_eq!(dot_stuff(".hidden\nvisible"), "..hidden\nvisible");
        assert_eq!(dot_stuff("a.b\n.c"), "a.b\n..c");
        assert_eq!(dot_stuff("plain"), "plain");
    }

    #[test]
    fn message_separates_headers_from_body() {
        let msg = format_message("a@x", "b@y", "Hi", "<p>Body</p>");
        assert!(msg.contains("Subject: Hi\r\n"));
        assert!(msg.contains("\r\n\r\n<p>Body</p>"));
        assert!(msg.contains("Content-Type: text/html"));
    }
}
