//! `Registry.sessions` (§3): the channel→Session table. Owns the
//! connection pool alongside it since both are mutated only by the
//! dispatcher and by session termination (§5), and the two naturally
//! share a lock discipline with their session and connection tables
//! kept side by side.

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::RwLock;

use crate::{config::Config, pool::ConnectionPool, session::Session, wire::ChannelKey};

pub struct Registry {
    sessions: RwLock<HashMap<ChannelKey, Session>>,
    pool: Arc<ConnectionPool>,
    ttl: Duration,
}

impl Registry {
    pub fn new(config: &Config) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            pool: Arc::new(ConnectionPool::new(config)),
            ttl: config.ttl,
        })
    }

    /// Looks up the Session for `key`, creating (and starting) one if
    /// none exists yet (§4.3 step 3). A TTL-reaped Session is dead (its
    /// drain loop has exited and dropped the receiver); finding one here
    /// means a later message re-addressed the same channel, so it gets
    /// replaced with a fresh one rather than handed back (§8 scenario 6:
    /// "a subsequent message to the same channel reopens everything from
    /// scratch").
    pub fn session_for(&self, key: ChannelKey) -> Session {
        {
            let sessions = self.sessions.read();
            if let Some(session) = sessions.get(&key) {
                if !session.is_closed() {
                    return session.clone();
                }
            }
        }

        let mut sessions = self.sessions.write();
        match sessions.get(&key) {
            Some(session) if !session.is_closed() => session.clone(),
            _ => {
                let session = Session::spawn(key.clone(), self.pool.clone(), self.ttl);
                sessions.insert(key, session.clone());
                session
            }
        }
    }

    /// Graceful shutdown (§4.9, §5): stop accepting new work is the
    /// ingest listener's job; here we just wait for queues to drain and
    /// then `QUIT` every connection. Draining has no hard deadline
    /// (§5), so this polls queue lengths rather than joining worker
    /// tasks directly (the registry doesn't hold join handles — the
    /// handles that matter are the per-Session senders).
    pub async fn drain_and_quit(&self, reason: &str) {
        loop {
            let total: usize = self
                .sessions
                .read()
                .values()
                .map(Session::queue_len)
                .sum();
            if total == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        self.pool.quit_all(reason).await;
    }
}
