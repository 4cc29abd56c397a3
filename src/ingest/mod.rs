//! Ingest endpoint (§4.4): exactly one of TCP or UDP mode per daemon
//! instance, each feeding parsed requests to the dispatcher.

mod tcp;
mod udp;

use std::sync::Arc;

use crate::{config::Config, registry::Registry, shutdown::ShutdownSignal};

/// Starts the configured listener and returns once it is bound.
/// Listening itself runs in a spawned task (§5: "one listener task for
/// the ingest endpoint"), which stops accepting new work as soon as
/// `stop` fires.
pub async fn run(
    config: Arc<Config>,
    registry: Arc<Registry>,
    stop: ShutdownSignal,
) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    if config.tcp {
        tcp::spawn(addr, registry, stop).await
    } else {
        udp::spawn(addr, registry, stop).await
    }
}
