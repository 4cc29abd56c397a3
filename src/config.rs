//! Daemon configuration, assembled from the CLI flags in §6. This
//! daemon takes flags only, no config file — but the flags still land
//! in one explicit typed record rather than being read ad hoc.

use std::time::Duration;

use clap::Parser;

/// Default per-connection channel-occupancy cap (§3, §4.2).
pub const DEFAULT_CONNECT_MAX: usize = 18;

/// Default idle-session TTL (§3, §8 scenario 6).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3 * 60 * 60);

#[derive(Parser, Debug)]
#[command(
    about = "Relay JSON requests over a local socket as IRC PRIVMSGs",
    version,
)]
struct Cli {
    /// debug verbosity 0..3
    #[arg(short = 'd', default_value_t = 0)]
    debug: u8,

    /// ingest port
    #[arg(short = 'p', default_value_t = 6659)]
    port: u16,

    /// nick host-suffix (otherwise derived from FQDN)
    #[arg(short = 'n')]
    nick_suffix: Option<String>,

    /// use TCP ingest instead of UDP
    #[arg(short = 't', default_value_t = false)]
    tcp: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub debug: u8,
    pub port: u16,
    pub nick_suffix: String,
    pub tcp: bool,
    pub connect_max: usize,
    pub ttl: Duration,
}

impl Config {
    /// Load CLI flags and resolve the nick suffix, defaulting to the
    /// local FQDN with dots replaced by dashes (§4.2).
    pub fn load() -> anyhow::Result<Self> {
        let cli = Cli::parse();

        let nick_suffix = match cli.nick_suffix {
            Some(s) => s,
            None => fqdn_suffix()?,
        };

        Ok(Config {
            debug: cli.debug,
            port: cli.port,
            nick_suffix,
            tcp: cli.tcp,
            connect_max: DEFAULT_CONNECT_MAX,
            ttl: DEFAULT_TTL,
        })
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match self.debug {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    pub fn bind_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([127, 0, 0, 1], self.port))
    }
}

/// FQDN with dots replaced by dashes, as the nick suffix convention
/// requires (§4.2, GLOSSARY "Nick suffix").
fn fqdn_suffix() -> anyhow::Result<String> {
    let hostname = hostname::get()?
        .into_string()
        .map_err(|_| anyhow::anyhow!("hostname is not valid UTF-8"))?;

    Ok(hostname.replace('.', "-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_mapping() {
        let mut cfg = Config {
            debug: 0,
            port: 6659,
            nick_suffix: "test".into(),
            tcp: false,
            connect_max: DEFAULT_CONNECT_MAX,
            ttl: DEFAULT_TTL,
        };
        assert_eq!(cfg.log_level(), log::LevelFilter::Warn);
        cfg.debug = 3;
        assert_eq!(cfg.log_level(), log::LevelFilter::Trace);
    }
}
