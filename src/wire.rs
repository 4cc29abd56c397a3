//! The JSON wire format clients speak to the ingest endpoint (§6), and
//! the typed addressing scheme (ChannelKey/ServerKey, §3) the rest of
//! the daemon routes on.

use std::net::SocketAddr;

use serde::Deserialize;

use crate::error::WireError;

const DEFAULT_IRC_PORT: u16 = 6667;

/// `to` accepts either a single channel URL or a list of them; both forms
/// normalize to the same `Vec<String>` before parsing (§8 boundary
/// behavior: single string and one-element list are equivalent).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ToField {
    One(String),
    Many(Vec<String>),
}

impl ToField {
    fn into_vec(self) -> Vec<String> {
        match self {
            ToField::One(s) => vec![s],
            ToField::Many(v) => v,
        }
    }
}

/// Wire request: `{ "to": ..., "privmsg": "..." }` (§3, §6).
#[derive(Debug, Deserialize)]
pub struct WireRequest {
    to: ToField,
    privmsg: String,
}

/// A validated request ready for dispatch: `to` has been normalized to a
/// list and every URL has been parsed into a `ChannelKey`.
#[derive(Debug)]
pub struct Request {
    pub channels: Vec<ChannelKey>,
    pub privmsg: String,
}

impl Request {
    /// Parse and validate a single line/datagram of wire JSON (§4.3 step
    /// 1-2, §7.1). Malformed JSON and missing/wrong-typed fields are the
    /// caller's responsibility to log and drop; this function only
    /// reports *why*.
    pub fn parse(bytes: &[u8]) -> Result<Self, WireError> {
        let wire: WireRequest = serde_json::from_slice(bytes)?;

        let urls = wire.to.into_vec();
        if urls.is_empty() {
            return Err(WireError::IllFormed("`to` must name at least one channel"));
        }

        let channels = urls
            .iter()
            .map(|url| ChannelKey::parse(url))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Request {
            channels,
            privmsg: wire.privmsg,
        })
    }
}

/// `(servername, port)` — identifies one IRC server connection (§3).
/// Cheap to clone: the host is an `Arc<str>`, not a fresh allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerKey {
    pub host: ServerHost,
    pub port: u16,
}

/// IRC server connections are keyed by the literal host string the
/// producer supplied, not its resolved address — two URLs naming the
/// same server textually share a connection; DNS aliasing is out of
/// scope.
pub type ServerHost = std::sync::Arc<str>;

/// Normalized channel address: `(servername, port, channel-name)` (§3).
/// The channel name is stored *without* its leading `#`; delivery always
/// sends the `#`-prefixed form (§9: canonical `#` rule).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub server: ServerKey,
    pub channel: String,
}

impl ChannelKey {
    pub fn parse(url: &str) -> Result<Self, WireError> {
        let rest = url
            .strip_prefix("irc://")
            .ok_or_else(|| WireError::InvalidChannelUrl(url.to_string()))?;

        let (authority, channel) = rest
            .split_once('/')
            .ok_or_else(|| WireError::InvalidChannelUrl(url.to_string()))?;

        if channel.is_empty() {
            return Err(WireError::InvalidChannelUrl(url.to_string()));
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port_str)) => {
                let port: u16 = port_str
                    .parse()
                    .map_err(|_| WireError::InvalidChannelUrl(url.to_string()))?;
                (host, port)
            }
            None => (authority, DEFAULT_IRC_PORT),
        };

        if host.is_empty() {
            return Err(WireError::InvalidChannelUrl(url.to_string()));
        }

        let channel = channel.strip_prefix('#').unwrap_or(channel).to_string();
        if channel.is_empty() {
            return Err(WireError::InvalidChannelUrl(url.to_string()));
        }

        Ok(ChannelKey {
            server: ServerKey {
                host: ServerHost::from(host),
                port,
            },
            channel,
        })
    }

    /// The `#`-prefixed form sent on the wire to IRC (§9).
    pub fn irc_name(&self) -> String {
        format!("#{}", self.channel)
    }
}

/// Parses `host:port` pairs used internally when connecting; kept
/// separate from `ChannelKey::parse` since it never sees a channel
/// component.
pub fn resolve(host: &str, port: u16) -> std::io::Result<Vec<SocketAddr>> {
    use std::net::ToSocketAddrs;
    Ok((host, port).to_socket_addrs()?.collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_omitted_defaults_to_6667() {
        let key = ChannelKey::parse("irc://chat.freenode.net/#commits").unwrap();
        assert_eq!(key.server.port, 6667);
        assert_eq!(&*key.server.host, "chat.freenode.net");
        assert_eq!(key.channel, "commits");
        assert_eq!(key.irc_name(), "#commits");
    }

    #[test]
    fn port_present_is_used() {
        let key = ChannelKey::parse("irc://irc.example.org:6697/#a").unwrap();
        assert_eq!(key.server.port, 6697);
    }

    #[test]
    fn channel_without_hash_is_normalized() {
        let key = ChannelKey::parse("irc://srv/commits").unwrap();
        assert_eq!(key.channel, "commits");
        assert_eq!(key.irc_name(), "#commits");
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!(ChannelKey::parse("chat.freenode.net/#commits").is_err());
    }

    #[test]
    fn rejects_missing_channel() {
        assert!(ChannelKey::parse("irc://srv:6667/").is_err());
    }

    #[test]
    fn single_string_and_one_element_list_are_equivalent() {
        let a = Request::parse(br#"{"to":"irc://srv:6667/#a","privmsg":"hi"}"#).unwrap();
        let b = Request::parse(br#"{"to":["irc://srv:6667/#a"],"privmsg":"hi"}"#).unwrap();
        assert_eq!(a.channels, b.channels);
        assert_eq!(a.privmsg, b.privmsg);
    }

    #[test]
    fn multi_channel_request_parses_all() {
        let req = Request::parse(
            br#"{"to": ["irc://irc.example.org:6697/#a","irc://irc.example.org:6697/#b"], "privmsg": "multi"}"#,
        )
        .unwrap();
        assert_eq!(req.channels.len(), 2);
        assert_eq!(req.channels[0].channel, "a");
        assert_eq!(req.channels[1].channel, "b");
    }

    #[test]
    fn malformed_json_is_an_error_not_a_panic() {
        assert!(Request::parse(b"not-json").is_err());
    }

    #[test]
    fn missing_fields_are_ill_formed() {
        assert!(Request::parse(br#"{"to":"irc://srv/#a"}"#).is_err());
        assert!(Request::parse(br#"{"privmsg":"hi"}"#).is_err());
    }
}
