//! ircrelay: bridge an IRC channel to stdin/stdout.
//!
//! Prints every channel message as `[channel] <sender> text`. Lines typed on
//! stdin are relayed to the first configured channel:
//!
//!   some text              send to the first channel
//!   /msg <target> <text>   send to an explicit target
//!   /quit [reason]         leave the server
//!
//! End of stdin only stops reading input; the relay keeps printing until
//! the server closes. Pass `--quit-on-eof` to leave the server instead.
//!
//! Settings come from `~/.config/ircrelay/relay.toml` (or `--config`) and
//! `IRCRELAY_*` environment variables, overridden by flags.

mod input;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use ircrelay::Bot;
use tokio::io::{AsyncBufReadExt, BufReader};

use input::Input;
use settings::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json);

    let config = settings::resolve(&args)?;
    tracing::info!(
        server = %config.server_addr,
        nick = %config.nick,
        channels = ?config.channels,
        "Starting ircrelay"
    );

    let server = config.server_addr.clone();
    let mut bot = Bot::new(config);
    let mut events = bot
        .start()
        .await
        .with_context(|| format!("connecting to {server}"))?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::info!("Relay closed");
                    break;
                };
                println!("[{}] <{}> {}", event.channel, event.sender, event.text);
            }
            line = stdin.next_line(), if stdin_open => {
                match line.context("reading stdin")? {
                    Some(line) => {
                        if let Err(e) = relay_input(&bot, &line).await {
                            tracing::warn!(error = %e, "Send failed");
                        }
                    }
                    None => {
                        stdin_open = false;
                        if args.quit_on_eof {
                            tracing::info!("stdin closed, quitting");
                            let _ = bot.quit(None).await;
                        } else {
                            tracing::debug!("stdin closed");
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

async fn relay_input(bot: &Bot, line: &str) -> ircrelay::Result<()> {
    match input::parse(line) {
        Input::Say(text) => match bot.channels().first() {
            Some(channel) => bot.send_raw_message(text, channel).await,
            None => Err(ircrelay::Error::InvalidTarget(
                "no channel configured; use /msg <target> <text>".into(),
            )),
        },
        Input::Msg { target, text } => bot.send_raw_message(text, target).await,
        Input::Quit(reason) => bot.quit(reason).await,
        Input::Ignore => Ok(()),
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ircrelay=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
