//! Events the relay hands to its consumer.

/// An incoming chat message.
///
/// `channel` is the PRIVMSG target: a channel name, or the bot's own nick
/// for a private message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub sender: String,
    pub text: String,
    pub channel: String,
}
