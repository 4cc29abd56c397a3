//! TCP ingest (§4.4): accept connections, read newline-terminated
//! lines, each line is one JSON request. A connection may carry many
//! requests; closing it does not terminate any Session.

use std::{net::SocketAddr, sync::Arc};

use log::{info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpListener,
};

use crate::{dispatcher, registry::Registry, shutdown::ShutdownSignal, wire::Request};

pub async fn spawn(
    addr: SocketAddr,
    registry: Arc<Registry>,
    stop: ShutdownSignal,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("ingest listening: addr={addr}, transport=tcp");

    tokio::spawn(async move {
        let mut stop = stop;
        loop {
            let (socket, peer) = tokio::select! {
                _ = stop.wait() => {
                    info!("tcp ingest stopping: shutdown requested");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("tcp accept failed: {e}");
                        continue;
                    }
                },
            };

            let registry = registry.clone();
            let mut stop = stop.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(socket).lines();
                loop {
                    let line = tokio::select! {
                        _ = stop.wait() => break,
                        line = lines.next_line() => match line {
                            Ok(Some(line)) => line,
                            Ok(None) => break,
                            Err(e) => {
                                warn!("{peer}: read error: {e}");
                                break;
                            }
                        },
                    };

                    if line.trim().is_empty() {
                        continue;
                    }

                    match Request::parse(line.as_bytes()) {
                        Ok(request) => dispatcher::dispatch(&registry, request),
                        Err(e) => warn!("{peer}: {e}"),
                    }
                }
                info!("{peer}: tcp connection closed");
            });
        }
    });

    Ok(())
}
