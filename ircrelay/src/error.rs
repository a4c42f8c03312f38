//! Error type returned by the relay.

/// Errors surfaced to relay consumers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configuration cannot be used to connect.
    #[error("invalid config: {0}")]
    Config(String),

    /// TCP connect or TLS handshake failed.
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The server address is not a valid TLS server name.
    #[error("tls: {0}")]
    Tls(String),

    /// Read or write on an established connection failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// `start` was already called on this bot.
    #[error("bot already started")]
    AlreadyStarted,

    /// A send was attempted before `start`.
    #[error("bot not started")]
    NotStarted,

    /// The session ended; nothing more can be sent.
    #[error("connection closed")]
    Closed,

    /// Outbound target is not a single channel or nick.
    #[error("invalid target {0:?}")]
    InvalidTarget(String),

    /// Outbound text or target would break line framing.
    #[error("text contains CR, LF or NUL")]
    InvalidText,

    /// Every nick fallback was rejected by the server.
    #[error("nickname {0} is already in use")]
    NickInUse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
