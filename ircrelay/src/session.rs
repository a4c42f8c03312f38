//! Per-connection protocol state and the dispatch loop.
//!
//! A [`Session`] owns the writer half of the connection. Incoming lines are
//! dispatched to its handlers; outbound requests from the [`Bot`](crate::Bot)
//! arrive over a command channel so the writer has a single owner.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::config::BotConfig;
use crate::error::{Error, Result};
use crate::event::MessageEvent;
use crate::irc::{Message, cmd};

/// Nick fallbacks tried before giving up on registration.
const MAX_NICK_TRIES: u32 = 5;

/// Longest accepted line in bytes: 8191 for IRCv3 tags plus the 512 byte body.
const MAX_LINE_LEN: usize = 8191 + 512;

/// Capacity of the command channel from the bot to the session.
pub(crate) const COMMAND_CAPACITY: usize = 256;

/// Outbound requests the bot hands to the session task.
#[derive(Debug)]
pub(crate) enum Command {
    Privmsg { target: String, text: String },
    Quit(Option<String>),
}

/// Whether the dispatch loop keeps going after a line or command.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Connection context shared by the protocol handlers.
pub struct Session {
    config: BotConfig,
    event_tx: mpsc::Sender<MessageEvent>,
    nick: String,
    nick_tries: u32,
    registered: bool,
    pending: Vec<Command>,
}

impl Session {
    pub fn new(config: BotConfig, event_tx: mpsc::Sender<MessageEvent>) -> Self {
        let nick = config.nick.clone();
        Self {
            config,
            event_tx,
            nick,
            nick_tries: 0,
            registered: false,
            pending: Vec::new(),
        }
    }

    /// Nick currently in use (differs from the configured one after a fallback).
    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Send PASS (if configured), NICK and USER.
    pub async fn register<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<()> {
        if let Some(ref password) = self.config.password {
            write_message(writer, &Message::new(cmd::PASS, vec![password.as_str()])).await?;
        }
        let nick = Message::new(cmd::NICK, vec![self.config.nick.as_str()]);
        write_message(writer, &nick).await?;
        write_message(
            writer,
            &Message::new(
                cmd::USER,
                vec![
                    self.config.user.as_str(),
                    "0",
                    "*",
                    self.config.realname.as_str(),
                ],
            ),
        )
        .await?;
        writer.flush().await?;
        Ok(())
    }

    /// Register, then dispatch lines and commands until the connection ends.
    pub(crate) async fn run<R, W>(
        mut self,
        mut reader: R,
        mut writer: W,
        mut cmd_rx: mpsc::Receiver<Command>,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.register(&mut writer).await?;

        let mut line_buf = Vec::new();
        let mut commands_open = true;
        // Set while skipping the rest of an overlong line.
        let mut discarding = false;

        loop {
            let limit = (MAX_LINE_LEN + 1).saturating_sub(line_buf.len()) as u64;
            let mut capped = (&mut reader).take(limit);
            tokio::select! {
                result = capped.read_until(b'\n', &mut line_buf) => {
                    if result? == 0 {
                        let server = &self.config.server_addr;
                        tracing::info!(server = %server, "Connection closed by server");
                        break;
                    }
                    let complete = line_buf.ends_with(b"\n");
                    if discarding {
                        discarding = !complete;
                        line_buf.clear();
                        continue;
                    }
                    if line_buf.len() > MAX_LINE_LEN {
                        tracing::warn!(limit = MAX_LINE_LEN, "Discarding overlong line");
                        discarding = !complete;
                        line_buf.clear();
                        continue;
                    }
                    let line = String::from_utf8_lossy(&line_buf).into_owned();
                    line_buf.clear();
                    tracing::debug!(line = %line.trim_end(), "<-");

                    let Some(msg) = Message::parse(&line) else {
                        continue;
                    };
                    if self.handle(&msg, &mut writer).await? == Flow::Stop {
                        break;
                    }
                }
                received = cmd_rx.recv(), if commands_open => {
                    match received {
                        Some(command) => {
                            if self.submit(command, &mut writer).await? == Flow::Stop {
                                break;
                            }
                        }
                        None => commands_open = false,
                    }
                }
            }
        }

        let _ = writer.shutdown().await;
        Ok(())
    }

    /// Dispatch one incoming message to its handler.
    pub async fn handle<W: AsyncWrite + Unpin>(
        &mut self,
        msg: &Message,
        writer: &mut W,
    ) -> Result<Flow> {
        match msg.command.as_str() {
            cmd::PING => self.on_ping(msg, writer).await?,
            cmd::RPL_WELCOME => self.on_welcome(msg, writer).await?,
            cmd::PRIVMSG => self.on_privmsg(msg).await,
            cmd::ERR_NICKNAMEINUSE if !self.registered => self.on_nick_in_use(writer).await?,
            cmd::ERROR => {
                tracing::warn!(reason = msg.trailing().unwrap_or(""), "Server sent ERROR");
                return Ok(Flow::Stop);
            }
            _ => {}
        }
        Ok(Flow::Continue)
    }

    /// Keep-alive: answer with the same parameters.
    async fn on_ping<W: AsyncWrite + Unpin>(&self, msg: &Message, writer: &mut W) -> Result<()> {
        let pong = Message {
            params: msg.params.clone(),
            ..Message::new(cmd::PONG, vec![])
        };
        write_message(writer, &pong).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Registration finished: join every configured channel, then flush
    /// anything queued while unregistered.
    async fn on_welcome<W: AsyncWrite + Unpin>(
        &mut self,
        msg: &Message,
        writer: &mut W,
    ) -> Result<()> {
        if let Some(confirmed) = msg.params.first() {
            self.nick = confirmed.clone();
        }
        self.registered = true;
        tracing::info!(nick = %self.nick, server = %self.config.server_addr, "Registered");

        for channel in &self.config.channels {
            tracing::info!(channel = %channel, "Joining");
            write_message(writer, &Message::new(cmd::JOIN, vec![channel.as_str()])).await?;
        }
        for command in std::mem::take(&mut self.pending) {
            execute_command(writer, command).await?;
        }
        writer.flush().await?;
        Ok(())
    }

    /// Hand the message to the consumer, waiting while the event channel is full.
    async fn on_privmsg(&self, msg: &Message) {
        let [target, text] = msg.params.as_slice() else {
            tracing::debug!(params = ?msg.params, "Ignoring PRIVMSG with unexpected params");
            return;
        };
        let event = MessageEvent {
            sender: msg.source_nick().unwrap_or_default().to_string(),
            text: text.clone(),
            channel: target.clone(),
        };
        if self.event_tx.send(event).await.is_err() {
            tracing::debug!("Event receiver dropped, discarding message");
        }
    }

    async fn on_nick_in_use<W: AsyncWrite + Unpin>(&mut self, writer: &mut W) -> Result<()> {
        self.nick_tries = self.nick_tries.saturating_add(1);
        if self.nick_tries > MAX_NICK_TRIES {
            return Err(Error::NickInUse(self.config.nick.clone()));
        }
        self.nick = format!("{}{}", self.config.nick, self.nick_tries);
        tracing::info!(nick = %self.nick, "Nickname in use, trying fallback");
        write_message(writer, &Message::new(cmd::NICK, vec![self.nick.as_str()])).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Execute a command now, or queue it until registration completes.
    pub(crate) async fn submit<W: AsyncWrite + Unpin>(
        &mut self,
        command: Command,
        writer: &mut W,
    ) -> Result<Flow> {
        let quitting = matches!(command, Command::Quit(_));
        if quitting && !self.pending.is_empty() {
            tracing::warn!(
                discarded = self.pending.len(),
                "Quitting before registration, dropping queued messages"
            );
            self.pending.clear();
        }
        if self.registered || quitting {
            execute_command(writer, command).await?;
            writer.flush().await?;
        } else {
            self.pending.push(command);
        }
        Ok(if quitting { Flow::Stop } else { Flow::Continue })
    }
}

/// Execute a single command on the wire.
async fn execute_command<W: AsyncWrite + Unpin>(writer: &mut W, command: Command) -> Result<()> {
    let msg = match command {
        Command::Privmsg { ref target, ref text } => {
            Message::new(cmd::PRIVMSG, vec![target.as_str(), text.as_str()])
        }
        Command::Quit(Some(ref reason)) => Message::new(cmd::QUIT, vec![reason.as_str()]),
        Command::Quit(None) => Message::new(cmd::QUIT, vec![]),
    };
    write_message(writer, &msg).await
}

async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, msg: &Message) -> Result<()> {
    if msg.command == cmd::PASS {
        tracing::debug!(line = "PASS <redacted>", "->");
    } else {
        tracing::debug!(line = %msg, "->");
    }
    writer.write_all(format!("{msg}\r\n").as_bytes()).await?;
    Ok(())
}
