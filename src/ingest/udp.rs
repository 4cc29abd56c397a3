//! UDP ingest (§4.4): each datagram is one JSON request; a trailing
//! newline is permitted and stripped.

use std::{net::SocketAddr, sync::Arc};

use log::{info, warn};
use tokio::net::UdpSocket;

use crate::{dispatcher, registry::Registry, shutdown::ShutdownSignal, wire::Request};

pub async fn spawn(
    addr: SocketAddr,
    registry: Arc<Registry>,
    mut stop: ShutdownSignal,
) -> anyhow::Result<()> {
    let socket = UdpSocket::bind(addr).await?;
    info!("ingest listening: addr={addr}, transport=udp");

    tokio::spawn(async move {
        let mut buf = vec![0u8; 65536];
        loop {
            let (size, peer) = tokio::select! {
                _ = stop.wait() => {
                    info!("udp ingest stopping: shutdown requested");
                    break;
                }
                received = socket.recv_from(&mut buf) => match received {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("udp recv failed: {e}");
                        continue;
                    }
                },
            };

            let datagram = trim_trailing_newline(&buf[..size]);
            if datagram.is_empty() {
                continue;
            }

            match Request::parse(datagram) {
                Ok(request) => dispatcher::dispatch(&registry, request),
                Err(e) => warn!("{peer}: {e}"),
            }
        }
    });

    Ok(())
}

fn trim_trailing_newline(bytes: &[u8]) -> &[u8] {
    match bytes {
        [rest @ .., b'\n'] => trim_trailing_newline(rest),
        [rest @ .., b'\r'] => trim_trailing_newline(rest),
        _ => bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_newline_variants() {
        assert_eq!(trim_trailing_newline(b"hi\n"), b"hi");
        assert_eq!(trim_trailing_newline(b"hi\r\n"), b"hi");
        assert_eq!(trim_trailing_newline(b"hi"), b"hi");
    }
}
