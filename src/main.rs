use std::sync::Arc;

use irker::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::load()?);
    simple_logger::init_with_level(config.log_level().to_level().unwrap_or(log::Level::Warn))?;
    irker::run(config).await
}
