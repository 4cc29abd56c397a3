//! One TCP connection to one IRC server (§4.5). State machine:
//! `connecting -> registering -> ready -> {ready | closing} -> closed`.
//! Only `ready` permits `JOIN`/`PRIVMSG`; this adaptor only exposes
//! methods that make sense once registration has completed, so there is
//! no separate state enum to get wrong — the type you hold up to
//! `connect()` returning is the "ready" state.
//!
//! Split socket (`into_split`), an `Arc<Mutex<writer>>` serializing
//! writes, and a spawned reader task — the same shape as an inbound
//! relay socket, reapplied to an outbound connection.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use log::warn;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::{oneshot, Mutex},
};

use crate::error::IrcError;

/// Recommended registration bound (§5 Timeouts).
pub const REGISTER_TIMEOUT: Duration = Duration::from_secs(30);

pub struct IrcTransport {
    writer: Arc<Mutex<BufWriter<OwnedWriteHalf>>>,
    closed: Arc<AtomicBool>,
}

impl IrcTransport {
    /// Connect, register (`NICK`/`USER`), and wait for the welcome
    /// numeric (001) or a pre-registration error, bounded by
    /// `REGISTER_TIMEOUT` (§4.5, §5).
    pub async fn connect(addr: SocketAddr, nick: &str) -> Result<Self, IrcError> {
        let stream = TcpStream::connect(addr).await.map_err(IrcError::Connect)?;
        let _ = stream.set_nodelay(true);

        let (read_half, write_half) = stream.into_split();
        let writer = Arc::new(Mutex::new(BufWriter::new(write_half)));
        let closed = Arc::new(AtomicBool::new(false));

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(read_loop(read_half, writer.clone(), closed.clone(), ready_tx));

        write_line(&writer, &format!("NICK {nick}")).await?;
        write_line(&writer, &format!("USER {nick} 0 * :irker relay")).await?;

        match tokio::time::timeout(REGISTER_TIMEOUT, ready_rx).await {
            Ok(Ok(Ok(()))) => Ok(Self { writer, closed }),
            Ok(Ok(Err(reason))) => Err(IrcError::RegistrationFailed(reason)),
            Ok(Err(_)) => Err(IrcError::Closed),
            Err(_) => Err(IrcError::RegistrationTimeout),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// `JOIN #channel` (§4.5). Callers are responsible for only joining
    /// once per connection (§4.1 step 3, §4.5).
    pub async fn join(&self, channel: &str) -> Result<(), IrcError> {
        write_line(&self.writer, &format!("JOIN {channel}")).await
    }

    /// `PRIVMSG #channel :text`, sent as-is (§4.5, §6: the producer is
    /// responsible for pre-truncating `text`).
    pub async fn privmsg(&self, channel: &str, text: &str) -> Result<(), IrcError> {
        write_line(&self.writer, &format!("PRIVMSG {channel} :{text}")).await
    }

    /// `QUIT :reason` on orderly release (§4.2, §4.5).
    pub async fn quit(&self, reason: &str) {
        let _ = write_line(&self.writer, &format!("QUIT :{reason}")).await;
    }
}

async fn write_line(
    writer: &Arc<Mutex<BufWriter<OwnedWriteHalf>>>,
    line: &str,
) -> Result<(), IrcError> {
    let mut w = writer.lock().await;
    w.write_all(line.as_bytes()).await.map_err(IrcError::Write)?;
    w.write_all(b"\r\n").await.map_err(IrcError::Write)?;
    w.flush().await.map_err(IrcError::Write)
}

/// Reader task: consumes server-to-client traffic for the lifetime of
/// the connection (§5, "one reader per ServerConnection"). Answers
/// `PING` with `PONG` at any time, resolves `ready_tx` on the welcome
/// numeric (001) or a pre-registration error, and marks the connection
/// closed on EOF or read error.
async fn read_loop(
    read_half: OwnedReadHalf,
    writer: Arc<Mutex<BufWriter<OwnedWriteHalf>>>,
    closed: Arc<AtomicBool>,
    ready_tx: oneshot::Sender<Result<(), String>>,
) {
    let mut lines = BufReader::new(read_half).lines();
    let mut ready_tx = Some(ready_tx);

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("{}", IrcError::Read(e));
                break;
            }
        };

        if let Some(rest) = line.strip_prefix("PING ") {
            let _ = write_line(&writer, &format!("PONG {rest}")).await;
            continue;
        }

        if let Some(tx) = ready_tx.take() {
            if is_welcome(&line) {
                let _ = tx.send(Ok(()));
            } else if let Some(reason) = registration_error(&line) {
                let _ = tx.send(Err(reason));
            } else {
                ready_tx = Some(tx);
            }
        }
    }

    closed.store(true, Ordering::Relaxed);
}

/// Numeric 001 (RPL_WELCOME) marks a completed registration.
fn is_welcome(line: &str) -> bool {
    numeric(line) == Some(1)
}

/// Any numeric in the 400s/500s before registration completes is
/// treated as a registration failure (nick collision, bad password,
/// etc.) — we don't special-case each one, just surface the line.
fn registration_error(line: &str) -> Option<String> {
    match numeric(line) {
        Some(code) if (400..600).contains(&code) => Some(line.to_string()),
        _ => None,
    }
}

fn numeric(line: &str) -> Option<u16> {
    line.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_numeric_detected() {
        assert!(is_welcome(":server 001 nick :Welcome to the network"));
        assert!(!is_welcome(":server 002 nick :more info"));
    }

    #[test]
    fn registration_error_detected() {
        assert!(registration_error(":server 433 * nick :Nickname is already in use").is_some());
        assert!(registration_error(":server 001 nick :Welcome").is_none());
    }
}
