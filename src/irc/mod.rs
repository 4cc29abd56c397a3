//! IRC wire protocol adaptor (§4.5): enough RFC 1459/2812 to register a
//! nick, join channels, send `PRIVMSG`, answer `PING`, and `QUIT`.

mod transport;

pub use transport::{IrcTransport, REGISTER_TIMEOUT};
