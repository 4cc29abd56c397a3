//! Connection pool (§4.2): enforces `CONNECT_MAX` channel occupancies per
//! IRC server connection, allocates nicknames, and holds the shared
//! transports Sessions send through.
//!
//! Grounded on `crates/service/src/session/mod.rs`'s `SessionManager`:
//! a `parking_lot`-guarded table keyed by a connection identifier, an
//! `AtomicU64` counter for a monotonically increasing id (there:
//! `Timer`; here: `nickCounter`), and a `Table<K, V>` pre-sized map
//! wrapper — reused directly rather than reinvented.

use std::{
    collections::HashSet,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

use log::{info, warn};
use parking_lot::{Mutex, RwLock};

use crate::{
    config::Config,
    irc::IrcTransport,
    wire::{self, ServerKey},
};

/// Connection lifecycle (§4.5): only `Ready` permits `JOIN`/`PRIVMSG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Ready,
    Closed,
}

/// One TCP connection to one IRC server, shared by up to `CONNECT_MAX`
/// sessions (§3).
pub struct ServerConnection {
    pub key: ServerKey,
    pub nick: String,
    transport: IrcTransport,
    joined: Mutex<HashSet<String>>,
    occupancy: AtomicUsize,
    state: Mutex<ConnectionState>,
}

impl ServerConnection {
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn occupancy(&self) -> usize {
        self.occupancy.load(Ordering::Relaxed)
    }

    /// `JOIN`s `channel` on this connection unless already joined
    /// (§4.5: "do not rejoin on subsequent messages unless the
    /// connection was reset").
    pub async fn ensure_joined(&self, channel: &str) -> Result<(), crate::error::IrcError> {
        {
            let joined = self.joined.lock();
            if joined.contains(channel) {
                return Ok(());
            }
        }

        self.transport.join(channel).await?;
        self.joined.lock().insert(channel.to_string());
        Ok(())
    }

    pub async fn privmsg(&self, channel: &str, text: &str) -> Result<(), crate::error::IrcError> {
        self.transport.privmsg(channel, text).await
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed() || self.state() == ConnectionState::Closed
    }
}

/// Registry slice owning server connections (§3 `Registry.connections`,
/// §4.2). Does not own sessions; `Registry` composes this with the
/// session table.
pub struct ConnectionPool {
    connect_max: usize,
    nick_suffix: String,
    nick_counter: AtomicU64,
    connections: RwLock<std::collections::HashMap<ServerKey, Arc<ServerConnection>>>,
}

impl ConnectionPool {
    pub fn new(config: &Config) -> Self {
        Self {
            connect_max: config.connect_max,
            nick_suffix: config.nick_suffix.clone(),
            nick_counter: AtomicU64::new(0),
            connections: RwLock::new(std::collections::HashMap::new()),
        }
    }

    /// `acquire(ServerKey)` (§4.2): reuse the current connection for
    /// `key` if it has spare occupancy, otherwise open a fresh one with
    /// a freshly allocated nick.
    pub async fn acquire(
        &self,
        key: &ServerKey,
    ) -> Result<Arc<ServerConnection>, crate::error::IrcError> {
        if let Some(conn) = self.try_reuse(key) {
            return Ok(conn);
        }

        let addrs = wire::resolve(&key.host, key.port)
            .map_err(crate::error::IrcError::Connect)?;
        let addr: SocketAddr = addrs
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::IrcError::Connect(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no addresses resolved",
            )))?;

        let nick = self.next_nick();
        info!("connecting to {}:{} as {nick}", key.host, key.port);
        let transport = IrcTransport::connect(addr, &nick).await?;

        let conn = Arc::new(ServerConnection {
            key: key.clone(),
            nick,
            transport,
            joined: Mutex::new(HashSet::new()),
            occupancy: AtomicUsize::new(1),
            state: Mutex::new(ConnectionState::Ready),
        });

        self.connections.write().insert(key.clone(), conn.clone());
        Ok(conn)
    }

    fn try_reuse(&self, key: &ServerKey) -> Option<Arc<ServerConnection>> {
        let connections = self.connections.read();
        let conn = connections.get(key)?;

        if conn.is_closed() {
            return None;
        }

        loop {
            let current = conn.occupancy.load(Ordering::Relaxed);
            if current >= self.connect_max {
                return None;
            }
            if conn
                .occupancy
                .compare_exchange(current, current + 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return Some(conn.clone());
            }
        }
    }

    /// `release(ServerConnection)` (§4.2): decrement occupancy, and on
    /// reaching zero, `QUIT` and drop the connection from the registry.
    /// The removal checks identity (`Arc::ptr_eq`) rather than just the
    /// key: under the `CONNECT_MAX`-overflow path `acquire` may already
    /// have replaced this key's entry with a newer connection, and a
    /// blind `remove(&key)` here would evict that live connection
    /// instead of the dead one.
    pub async fn release(&self, conn: &Arc<ServerConnection>) {
        let remaining = conn.occupancy.fetch_sub(1, Ordering::Relaxed) - 1;
        if remaining > 0 {
            return;
        }

        *conn.state.lock() = ConnectionState::Closed;
        conn.transport.quit("relay shutting down").await;

        let mut connections = self.connections.write();
        if connections.get(&conn.key).is_some_and(|current| Arc::ptr_eq(current, conn)) {
            connections.remove(&conn.key);
        }
        drop(connections);

        warn!("closed connection to {}:{} ({})", conn.key.host, conn.key.port, conn.nick);
    }

    /// Nicknames are zero-padded and salted with the host suffix (§4.2)
    /// so two daemons on different hosts can't collide. The counter is
    /// not reset on overflow past 999 (§SPEC_FULL §4.2): it just keeps
    /// counting and the nick gets wider.
    fn next_nick(&self) -> String {
        let n = self.nick_counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("irker{n:03}-{}", self.nick_suffix)
    }

    /// Issue `QUIT` on every live connection (§4.9 graceful shutdown).
    pub async fn quit_all(&self, reason: &str) {
        let conns: Vec<_> = self.connections.read().values().cloned().collect();
        for conn in conns {
            conn.transport.quit(reason).await;
            *conn.state.lock() = ConnectionState::Closed;
        }
        self.connections.write().clear();
    }
}
