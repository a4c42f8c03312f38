//! Relay settings: optional TOML file, overridden by command-line flags.
//!
//! Config file lives at `~/.config/ircrelay/relay.toml` unless `--config`
//! points elsewhere.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use ircrelay::BotConfig;

#[derive(Parser, Debug, Default)]
#[command(name = "ircrelay", about = "Relay an IRC channel to stdin/stdout")]
pub struct Args {
    /// IRC server address (host:port)
    #[arg(long, env = "IRCRELAY_SERVER")]
    pub server: Option<String>,

    /// Bot nick
    #[arg(long, env = "IRCRELAY_NICK")]
    pub nick: Option<String>,

    /// Server password (sent with PASS)
    #[arg(long, env = "IRCRELAY_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Channel to join (repeatable)
    #[arg(long = "channel", env = "IRCRELAY_CHANNELS", value_delimiter = ',')]
    pub channels: Vec<String>,

    /// Use TLS (implied by port 6697)
    #[arg(long)]
    pub tls: bool,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub tls_insecure: bool,

    /// Event channel capacity
    #[arg(long, env = "IRCRELAY_EVENT_CAPACITY")]
    pub event_capacity: Option<usize>,

    /// Config file (TOML)
    #[arg(long, env = "IRCRELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Send QUIT when stdin reaches end of file
    #[arg(long, env = "IRCRELAY_QUIT_ON_EOF")]
    pub quit_on_eof: bool,
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ircrelay")
        .join("relay.toml")
}

pub fn load_file(path: &Path) -> Result<BotConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

/// Build the bot config from the file (if any) and the flags.
pub fn resolve(args: &Args) -> Result<BotConfig> {
    let mut config = match &args.config {
        Some(path) => load_file(path)?,
        None => {
            let path = default_config_path();
            if path.exists() {
                load_file(&path)?
            } else {
                BotConfig::default()
            }
        }
    };

    if let Some(ref server) = args.server {
        config.server_addr = server.clone();
    }
    if let Some(ref nick) = args.nick {
        // The file's user stays unless it was left at the default.
        if config.user == BotConfig::default().user {
            config.user = nick.clone();
        }
        config.nick = nick.clone();
    }
    if args.password.is_some() {
        config.password = args.password.clone();
    }
    if !args.channels.is_empty() {
        config.channels = args.channels.clone();
    }
    config.tls |= args.tls;
    config.tls_insecure |= args.tls_insecure;
    if let Some(capacity) = args.event_capacity {
        config.event_capacity = capacity;
    }

    config.validate().context("invalid relay config")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn flags_override_file() {
        let f = file(
            r##"
            server_addr = "irc.file.net:6667"
            nick = "filebot"
            channels = ["#file"]
            "##,
        );
        let args = Args {
            config: Some(f.path().to_path_buf()),
            nick: Some("flagbot".into()),
            channels: vec!["#a".into(), "#b".into()],
            ..Args::default()
        };
        let config = resolve(&args).unwrap();
        assert_eq!(config.server_addr, "irc.file.net:6667");
        assert_eq!(config.nick, "flagbot");
        assert_eq!(config.user, "flagbot");
        assert_eq!(config.channels, vec!["#a", "#b"]);
    }

    #[test]
    fn file_user_kept_when_nick_overridden() {
        let f = file(
            r##"
            nick = "filebot"
            user = "ident"
            "##,
        );
        let args = Args {
            config: Some(f.path().to_path_buf()),
            nick: Some("flagbot".into()),
            ..Args::default()
        };
        assert_eq!(resolve(&args).unwrap().user, "ident");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let args = Args {
            config: Some(PathBuf::from("/nonexistent/ircrelay/relay.toml")),
            ..Args::default()
        };
        let err = resolve(&args).unwrap_err();
        assert!(err.to_string().contains("reading config"));
    }

    #[test]
    fn invalid_result_is_rejected() {
        let f = file("channels = [\"nohash\"]");
        let args = Args {
            config: Some(f.path().to_path_buf()),
            ..Args::default()
        };
        assert!(resolve(&args).is_err());
    }

    #[test]
    fn parses_repeated_and_comma_channels() {
        let args = Args::try_parse_from([
            "ircrelay",
            "--server",
            "irc.test:6697",
            "--channel",
            "#a,#b",
            "--channel",
            "#c",
            "--password",
            "pw",
        ])
        .unwrap();
        assert_eq!(args.channels, vec!["#a", "#b", "#c"]);
        assert_eq!(args.password.as_deref(), Some("pw"));
        assert_eq!(args.server.as_deref(), Some("irc.test:6697"));
    }

    #[test]
    fn quit_on_eof_is_opt_in() {
        let args = Args::try_parse_from(["ircrelay", "--server", "irc.test:6667"]).unwrap();
        assert!(!args.quit_on_eof);

        let args = Args::try_parse_from(["ircrelay", "--quit-on-eof"]).unwrap();
        assert!(args.quit_on_eof);
    }
}
