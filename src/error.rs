use thiserror::Error;

/// Errors produced while decoding the wire protocol described in the
/// ingest endpoint contract: a malformed request never aborts the
/// listener, it is logged and dropped by the caller.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("can't recognize JSON on input: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("ill-formed request: {0}")]
    IllFormed(&'static str),

    #[error("invalid channel url: {0}")]
    InvalidChannelUrl(String),
}

/// Errors surfaced by the IRC transport adaptor. These are recovered
/// locally by the session worker (§4.1/§7): a transport error never
/// escapes to the listener or the dispatcher.
#[derive(Debug, Error)]
pub enum IrcError {
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("registration timed out")]
    RegistrationTimeout,

    #[error("registration failed: {0}")]
    RegistrationFailed(String),

    #[error("transport closed")]
    Closed,

    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),
}
