//! The relay facade: connect, auto-join, forward chat messages, publish replies.

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;

use crate::config::BotConfig;
use crate::error::{Error, Result};
use crate::event::MessageEvent;
use crate::irc;
use crate::session::{COMMAND_CAPACITY, Command, Session};
use crate::transport::{self, EstablishedConnection};

/// An IRC bot relaying channel messages to an application.
///
/// ```rust,no_run
/// use ircrelay::{Bot, BotConfig};
///
/// # async fn example() -> ircrelay::Result<()> {
/// let mut bot = Bot::new(BotConfig::new("irc.libera.chat:6697", "relay", &["#bots"]));
/// let mut events = bot.start().await?;
/// while let Some(event) = events.recv().await {
///     bot.send_message(&event.sender, &event.text, Some("#bots")).await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Bot {
    config: BotConfig,
    handle: Option<SessionHandle>,
}

/// Sending side of a running session.
#[derive(Clone)]
struct SessionHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl Bot {
    /// Bind a bot to its configuration. No network I/O happens here.
    pub fn new(config: BotConfig) -> Self {
        Self {
            config,
            handle: None,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Channels joined after registration.
    pub fn channels(&self) -> &[String] {
        &self.config.channels
    }

    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// Connect, register and start the dispatch loop.
    ///
    /// Returns the event channel. A connection failure is returned as
    /// [`Error::Connect`] and leaves the bot unstarted.
    pub async fn start(&mut self) -> Result<mpsc::Receiver<MessageEvent>> {
        self.ensure_startable()?;
        let conn = transport::establish_connection(&self.config).await?;
        tracing::info!(
            server = %self.config.server_addr,
            nick = %self.config.nick,
            channels = ?self.config.channels,
            "Connected"
        );
        Ok(match conn {
            EstablishedConnection::Plain(tcp) => self.spawn_session(tcp),
            EstablishedConnection::Tls(tls) => self.spawn_session(*tls),
        })
    }

    /// Start over an already-connected stream instead of dialing the server.
    pub fn start_with_stream<S>(&mut self, stream: S) -> Result<mpsc::Receiver<MessageEvent>>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.ensure_startable()?;
        Ok(self.spawn_session(stream))
    }

    fn ensure_startable(&self) -> Result<()> {
        if self.handle.is_some() {
            return Err(Error::AlreadyStarted);
        }
        self.config.validate()
    }

    fn spawn_session<S>(&mut self, stream: S) -> mpsc::Receiver<MessageEvent>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::channel(self.config.event_capacity);
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CAPACITY);

        let session = Session::new(self.config.clone(), event_tx);
        let server = self.config.server_addr.clone();
        let (reader, writer) = tokio::io::split(stream);

        tokio::spawn(async move {
            match session.run(BufReader::new(reader), writer, cmd_rx).await {
                Ok(()) => tracing::info!(server = %server, "Session ended"),
                Err(e) => tracing::warn!(server = %server, error = %e, "Session ended with error"),
            }
        });

        self.handle = Some(SessionHandle { cmd_tx });
        event_rx
    }

    /// Publish `"<nick> text"` to `channel`, or to every configured channel
    /// when `channel` is `None`.
    pub async fn send_message(&self, nick: &str, text: &str, channel: Option<&str>) -> Result<()> {
        let line = format_message(nick, text);
        match channel {
            Some(target) => self.privmsg(target, &line).await,
            None => {
                if self.config.channels.is_empty() {
                    return Err(Error::InvalidTarget("no channels configured".into()));
                }
                for target in &self.config.channels {
                    self.privmsg(target, &line).await?;
                }
                Ok(())
            }
        }
    }

    /// Send `text` unchanged to `to` (a channel or a nick).
    pub async fn send_raw_message(&self, text: &str, to: &str) -> Result<()> {
        self.privmsg(to, text).await
    }

    /// Send QUIT and end the session.
    pub async fn quit(&self, reason: Option<&str>) -> Result<()> {
        if reason.is_some_and(irc::has_line_break) {
            return Err(Error::InvalidText);
        }
        self.command(Command::Quit(reason.map(str::to_string))).await
    }

    async fn privmsg(&self, target: &str, text: &str) -> Result<()> {
        if target.is_empty() || target.starts_with(':') || target.contains([' ', ',']) {
            return Err(Error::InvalidTarget(target.to_string()));
        }
        if irc::has_line_break(target) || irc::has_line_break(text) {
            return Err(Error::InvalidText);
        }
        self.command(Command::Privmsg {
            target: target.to_string(),
            text: text.to_string(),
        })
        .await
    }

    async fn command(&self, command: Command) -> Result<()> {
        let handle = self.handle.as_ref().ok_or(Error::NotStarted)?;
        handle.cmd_tx.send(command).await.map_err(|_| Error::Closed)
    }
}

/// Display form of a relayed message.
pub fn format_message(nick: &str, text: &str) -> String {
    format!("<{nick}> {text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_nick_in_angle_brackets() {
        assert_eq!(format_message("bob", "hello"), "<bob> hello");
        assert_eq!(format_message("bob", ""), "<bob> ");
    }

    #[tokio::test]
    async fn sends_before_start_fail() {
        let bot = Bot::new(BotConfig::new("127.0.0.1:6667", "relay", &["#x"]));
        assert!(!bot.is_started());
        assert!(matches!(
            bot.send_message("bob", "hello", Some("#x")).await,
            Err(Error::NotStarted)
        ));
        assert!(matches!(
            bot.send_raw_message("raw", "#x").await,
            Err(Error::NotStarted)
        ));
        assert!(matches!(bot.quit(None).await, Err(Error::NotStarted)));
    }

    #[tokio::test]
    async fn rejects_injection_before_touching_the_session() {
        let bot = Bot::new(BotConfig::new("127.0.0.1:6667", "relay", &["#x"]));
        assert!(matches!(
            bot.send_raw_message("hi\r\nQUIT", "#x").await,
            Err(Error::InvalidText)
        ));
        assert!(matches!(
            bot.send_raw_message("hi", "#x #y").await,
            Err(Error::InvalidTarget(_))
        ));
        assert!(matches!(
            bot.send_raw_message("hi", "").await,
            Err(Error::InvalidTarget(_))
        ));
        assert!(matches!(
            bot.quit(Some("a\nb")).await,
            Err(Error::InvalidText)
        ));
    }

    #[tokio::test]
    async fn invalid_config_is_not_started() {
        let mut bot = Bot::new(BotConfig::new("127.0.0.1:6667", "", &["#x"]));
        let (client, _server) = tokio::io::duplex(64);
        assert!(matches!(
            bot.start_with_stream(client),
            Err(Error::Config(_))
        ));
        assert!(!bot.is_started());
    }
}
