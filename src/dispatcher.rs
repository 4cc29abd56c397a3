//! `dispatch(request)` (§4.3): a pure routing step from a validated
//! wire request to per-channel Session enqueues. Never touches I/O
//! beyond the non-blocking channel sends `Session::enqueue` performs.

use std::sync::Arc;

use log::warn;

use crate::{registry::Registry, wire::Request};

/// Routes `request` to the Session for each addressed channel,
/// creating sessions on demand (§4.3 step 3). Failure to enqueue on one
/// channel (a racing TTL reap) is logged and does not affect the
/// others.
pub fn dispatch(registry: &Arc<Registry>, request: Request) {
    for channel in request.channels {
        let name = channel.irc_name();
        let session = registry.session_for(channel);
        if let Err(text) = session.enqueue(request.privmsg.clone()) {
            warn!("{name}: dropped message, session already terminated: {text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, wire::Request};
    use std::time::Duration;

    fn test_registry() -> Arc<Registry> {
        Registry::new(&Config {
            debug: 0,
            port: 6659,
            nick_suffix: "test".into(),
            tcp: false,
            connect_max: 18,
            ttl: Duration::from_secs(3 * 60 * 60),
        })
    }

    #[tokio::test]
    async fn dispatch_creates_one_session_per_channel() {
        let registry = test_registry();
        let request = Request::parse(
            br#"{"to": ["irc://srv:6667/#a", "irc://srv:6667/#b"], "privmsg": "hi"}"#,
        )
        .unwrap();

        dispatch(&registry, request);

        let a = registry.session_for(crate::wire::ChannelKey::parse("irc://srv:6667/#a").unwrap());
        let b = registry.session_for(crate::wire::ChannelKey::parse("irc://srv:6667/#b").unwrap());
        assert_eq!(a.queue_len(), 1);
        assert_eq!(b.queue_len(), 1);
    }

    #[tokio::test]
    async fn dispatch_to_same_channel_reuses_session() {
        let registry = test_registry();
        let req1 = Request::parse(br#"{"to": "irc://srv:6667/#a", "privmsg": "hi"}"#).unwrap();
        let req2 = Request::parse(br#"{"to": "irc://srv:6667/#a", "privmsg": "there"}"#).unwrap();

        dispatch(&registry, req1);
        dispatch(&registry, req2);

        let a = registry.session_for(crate::wire::ChannelKey::parse("irc://srv:6667/#a").unwrap());
        assert_eq!(a.queue_len(), 2);
    }
}
