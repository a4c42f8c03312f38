//! Relay between an IRC network and an application message channel.
//!
//! A [`Bot`] connects to one server, registers, joins its configured
//! channels, answers keep-alive PINGs, and forwards every PRIVMSG it sees as a
//! [`MessageEvent`] on a bounded channel. The application publishes replies
//! with [`Bot::send_message`] or [`Bot::send_raw_message`].
//!
//! # Modules
//!
//! - [`bot`] — the relay facade
//! - [`config`] — connection settings
//! - [`event`] — events handed to the consumer
//! - [`irc`] — IRC message parsing/formatting
//! - [`session`] — protocol handlers and the dispatch loop
//! - [`transport`] — TCP / TLS connection setup

pub mod bot;
pub mod config;
pub mod error;
pub mod event;
pub mod irc;
pub mod session;
pub mod transport;

pub use bot::Bot;
pub use config::BotConfig;
pub use error::{Error, Result};
pub use event::MessageEvent;
