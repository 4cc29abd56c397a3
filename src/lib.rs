pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ingest;
pub mod irc;
pub mod pool;
pub mod registry;
pub mod session;
pub mod shutdown;
pub mod wire;

use std::sync::Arc;

use config::Config;
use registry::Registry;

/// Starts the ingest endpoint and blocks until a shutdown signal has
/// been handled and every Session has drained (§4.9). Exposed as a
/// function rather than folded into `main` so integration tests can
/// drive a full daemon instance directly.
pub async fn run(config: Arc<Config>) -> anyhow::Result<()> {
    let registry = Registry::new(&config);
    let (stop_tx, stop_rx) = shutdown::channel();
    ingest::run(config, registry.clone(), stop_rx).await?;
    shutdown::wait_and_drain(registry, stop_tx).await
}
