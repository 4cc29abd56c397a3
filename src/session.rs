//! Per-channel delivery worker (§4.1): a FIFO queue plus a drain loop
//! that joins the channel and sends `PRIVMSG`s onto whatever server
//! connection the pool currently hands back.
//!
//! A background reaper that ticks once a second comparing `expires`
//! against a monotonic counter works when one table holds every
//! session; here each Session has exactly one thing to wait on, so the
//! tick is replaced by a timeout directly on its own message queue.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use log::{info, warn};
use tokio::sync::mpsc;

use crate::{pool::ConnectionPool, wire::ChannelKey};

/// Cheap handle to a running Session worker (§4.1 contract).
#[derive(Clone)]
pub struct Session {
    sender: mpsc::UnboundedSender<String>,
    queue_len: Arc<AtomicUsize>,
}

impl Session {
    /// Spawns the worker and returns a handle to it. The worker starts
    /// draining immediately, per §4.3 step 3.
    pub fn spawn(key: ChannelKey, pool: Arc<ConnectionPool>, ttl: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue_len = Arc::new(AtomicUsize::new(0));

        tokio::spawn(drain_loop(key, pool, ttl, receiver, queue_len.clone()));

        Session { sender, queue_len }
    }

    /// `enqueue(text)` (§4.1): never blocks on IRC I/O, safe to call
    /// from the dispatcher. A send error means the worker has already
    /// terminated (TTL reap racing the dispatcher); the caller treats
    /// that the same as "session needs recreating".
    pub fn enqueue(&self, text: String) -> Result<(), String> {
        self.queue_len.fetch_add(1, Ordering::Relaxed);
        self.sender.send(text).map_err(|e| e.0)
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    /// True once the drain loop has exited (TTL reap) and dropped its
    /// receiver half. A registry entry in this state is dead and must
    /// be replaced rather than handed out again.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

async fn drain_loop(
    key: ChannelKey,
    pool: Arc<ConnectionPool>,
    ttl: Duration,
    mut receiver: mpsc::UnboundedReceiver<String>,
    queue_len: Arc<AtomicUsize>,
) {
    let irc_channel = key.irc_name();
    let mut conn = None;
    let mut last_active = Instant::now();
    let mut pending: Option<String> = None;

    'drain: loop {
        if pending.is_none() {
            let deadline = last_active + ttl;
            let now = Instant::now();
            if now >= deadline {
                break 'drain;
            }

            match tokio::time::timeout(deadline - now, receiver.recv()).await {
                Ok(Some(text)) => {
                    last_active = Instant::now();
                    pending = Some(text);
                }
                Ok(None) => break 'drain,
                Err(_) => continue 'drain,
            }
        }

        let text = pending.as_deref().unwrap();

        let active = match conn.take() {
            Some(c) => c,
            None => match pool.acquire(&key.server).await {
                Ok(c) => c,
                Err(e) => {
                    warn!("{}: connection acquire failed: {e}", irc_channel);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue 'drain;
                }
            },
        };

        if let Err(e) = active.ensure_joined(&irc_channel).await {
            warn!("{}: join failed: {e}", irc_channel);
            pool.release(&active).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
            continue 'drain;
        }

        match active.privmsg(&irc_channel, text).await {
            Ok(()) => {
                info!("{}: delivered privmsg", irc_channel);
                queue_len.fetch_sub(1, Ordering::Relaxed);
                pending = None;
                last_active = Instant::now();
                conn = Some(active);
            }
            Err(e) => {
                warn!("{}: send failed, reconnecting: {e}", irc_channel);
                pool.release(&active).await;
                // `pending` (the current head-of-queue message) is kept
                // so the retry re-sends it (§4.1 failure semantics: no
                // reordering, no loss).
            }
        }
    }

    if let Some(active) = conn {
        pool.release(&active).await;
    }
    info!("{}: session terminated (idle TTL)", irc_channel);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DEFAULT_CONNECT_MAX};

    fn test_config() -> Config {
        Config {
            debug: 0,
            port: 6659,
            nick_suffix: "test".into(),
            tcp: false,
            connect_max: DEFAULT_CONNECT_MAX,
            ttl: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn terminates_after_ttl_with_no_messages() {
        let pool = Arc::new(ConnectionPool::new(&test_config()));
        let key = ChannelKey::parse("irc://127.0.0.1:1/#t").unwrap();
        let session = Session::spawn(key, pool, Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(session.enqueue("late".into()).is_err());
    }
}
