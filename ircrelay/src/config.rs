//! Relay configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::irc;

/// Port that implies TLS when `tls` is not set explicitly.
pub const TLS_PORT_SUFFIX: &str = ":6697";

/// Configuration for connecting a [`Bot`](crate::Bot) to an IRC server.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BotConfig {
    /// Server address (host:port).
    pub server_addr: String,
    /// Desired nickname.
    pub nick: String,
    /// Username (ident).
    pub user: String,
    /// Real name.
    pub realname: String,
    /// Server password, sent with PASS before registration.
    pub password: Option<String>,
    /// Channels joined once registration completes, in this order.
    pub channels: Vec<String>,
    /// Use TLS.
    pub tls: bool,
    /// Skip TLS certificate verification (for self-signed certs).
    pub tls_insecure: bool,
    /// Capacity of the event channel. Delivery waits while it is full.
    pub event_capacity: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:6667".to_string(),
            nick: "relay".to_string(),
            user: "relay".to_string(),
            realname: "ircrelay".to_string(),
            password: None,
            channels: Vec::new(),
            tls: false,
            tls_insecure: false,
            event_capacity: 1,
        }
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("server_addr", &self.server_addr)
            .field("nick", &self.nick)
            .field("user", &self.user)
            .field("realname", &self.realname)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("channels", &self.channels)
            .field("tls", &self.tls)
            .field("tls_insecure", &self.tls_insecure)
            .field("event_capacity", &self.event_capacity)
            .finish()
    }
}

impl BotConfig {
    /// Config for `nick` on `server_addr` joining `channels`. The nick doubles
    /// as the username.
    pub fn new(server_addr: &str, nick: &str, channels: &[&str]) -> Self {
        Self {
            server_addr: server_addr.to_string(),
            nick: nick.to_string(),
            user: nick.to_string(),
            channels: channels.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Whether the connection should use TLS (explicit, or implied by port 6697).
    pub fn use_tls(&self) -> bool {
        self.tls || self.server_addr.ends_with(TLS_PORT_SUFFIX)
    }

    /// Host part of `server_addr`.
    pub fn server_host(&self) -> &str {
        match self.server_addr.rsplit_once(':') {
            Some((host, _)) => host.trim_start_matches('[').trim_end_matches(']'),
            None => &self.server_addr,
        }
    }

    /// Check the config before any network I/O.
    pub fn validate(&self) -> Result<()> {
        if self.server_addr.trim().is_empty() {
            return Err(Error::Config("server address is empty".into()));
        }
        check_word("nick", &self.nick)?;
        check_word("user", &self.user)?;
        if irc::has_line_break(&self.realname) {
            return Err(Error::Config("realname contains a line break".into()));
        }
        if let Some(ref password) = self.password
            && (password.is_empty() || irc::has_line_break(password) || password.contains(' '))
        {
            return Err(Error::Config("password must be a single non-empty word".into()));
        }
        for channel in &self.channels {
            if !channel.starts_with(['#', '&', '+', '!']) {
                return Err(Error::Config(format!("{channel:?} is not a channel name")));
            }
            if channel.len() < 2
                || channel.contains([',', ' ', '\x07'])
                || irc::has_line_break(channel)
            {
                return Err(Error::Config(format!("invalid channel name {channel:?}")));
            }
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".into()));
        }
        Ok(())
    }
}

fn check_word(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Config(format!("{field} is empty")));
    }
    if value.contains(' ') || value.starts_with(':') || irc::has_line_break(value) {
        return Err(Error::Config(format!("{field} {value:?} is not a single word")));
    }
    Ok(())
}
