//! IRC message parsing and formatting.
//!
//! Wire format (RFC 1459 / RFC 2812, with IRCv3 message tags):
//!
//! ```text
//! [@tags] [:prefix] COMMAND [param ...] [:trailing]\r\n
//! ```
//!
//! The trailing parameter is stored as the last entry of `params`.

use std::collections::HashMap;
use std::fmt;

/// Commands and numerics the relay reacts to.
pub mod cmd {
    pub const PING: &str = "PING";
    pub const PONG: &str = "PONG";
    pub const PASS: &str = "PASS";
    pub const NICK: &str = "NICK";
    pub const USER: &str = "USER";
    pub const JOIN: &str = "JOIN";
    pub const PRIVMSG: &str = "PRIVMSG";
    pub const QUIT: &str = "QUIT";
    pub const ERROR: &str = "ERROR";
    pub const RPL_WELCOME: &str = "001";
    pub const ERR_NICKNAMEINUSE: &str = "433";
}

/// A single IRC protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// IRCv3 message tags (empty if none).
    pub tags: HashMap<String, String>,
    /// Source of the message (`nick!user@host` or a server name).
    pub prefix: Option<String>,
    /// Command name or three-digit numeric, upper-cased.
    pub command: String,
    /// Parameters; a trailing parameter is the last entry.
    pub params: Vec<String>,
}

impl Message {
    /// Build a client-originated message with no tags and no prefix.
    pub fn new(command: &str, params: Vec<&str>) -> Self {
        Self {
            tags: HashMap::new(),
            prefix: None,
            command: command.to_string(),
            params: params.into_iter().map(str::to_string).collect(),
        }
    }

    /// Build a message carrying a source prefix, as a server would send it.
    pub fn from_server(prefix: &str, command: &str, params: Vec<&str>) -> Self {
        Self {
            prefix: Some(prefix.to_string()),
            ..Self::new(command, params)
        }
    }

    /// Parse one line. Returns `None` for blank lines or lines with no command.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']).trim_start_matches(' ');
        if rest.is_empty() {
            return None;
        }

        let mut tags = HashMap::new();
        if let Some(stripped) = rest.strip_prefix('@') {
            let (raw_tags, after) = stripped.split_once(' ')?;
            for tag in raw_tags.split(';').filter(|t| !t.is_empty()) {
                let (key, value) = match tag.split_once('=') {
                    Some((k, v)) => (k, unescape_tag_value(v)),
                    None => (tag, String::new()),
                };
                tags.insert(key.to_string(), value);
            }
            rest = after.trim_start_matches(' ');
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (p, after) = stripped.split_once(' ')?;
            prefix = Some(p.to_string());
            rest = after.trim_start_matches(' ');
        }

        let (command, mut rest) = match rest.split_once(' ') {
            Some((c, after)) => (c, after),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((p, after)) => {
                    params.push(p.to_string());
                    rest = after;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Some(Self {
            tags,
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Nick part of the prefix (`alice` for `alice!user@host`).
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .and_then(|p| p.split('!').next())
            .filter(|n| !n.is_empty())
    }

    /// The trailing (last) parameter, if any.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }
}

impl fmt::Display for Message {
    /// Formats the line without the CRLF terminator.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            let mut keys: Vec<&String> = self.tags.keys().collect();
            keys.sort();
            f.write_str("@")?;
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    f.write_str(";")?;
                }
                let value = &self.tags[key];
                if value.is_empty() {
                    write!(f, "{key}")?;
                } else {
                    write!(f, "{key}={}", escape_tag_value(value))?;
                }
            }
            f.write_str(" ")?;
        }
        if let Some(ref prefix) = self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;
        if let Some((last, middle)) = self.params.split_last() {
            for p in middle {
                write!(f, " {p}")?;
            }
            if last.is_empty() || last.contains(' ') || last.starts_with(':') {
                write!(f, " :{last}")?;
            } else {
                write!(f, " {last}")?;
            }
        }
        Ok(())
    }
}

/// True if `s` would break IRC line framing when sent as a parameter.
pub fn has_line_break(s: &str) -> bool {
    s.contains(['\r', '\n', '\0'])
}

fn unescape_tag_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn escape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ';' => out.push_str("\\:"),
            ' ' => out.push_str("\\s"),
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_privmsg_with_prefix() {
        let msg = Message::parse(":alice!a@host PRIVMSG #x :hi there\r\n").unwrap();
        assert_eq!(msg.prefix.as_deref(), Some("alice!a@host"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#x", "hi there"]);
        assert_eq!(msg.source_nick(), Some("alice"));
        assert_eq!(msg.trailing(), Some("hi there"));
    }

    #[test]
    fn parse_ping_without_prefix() {
        let msg = Message::parse("PING :irc.example.net\n").unwrap();
        assert!(msg.prefix.is_none());
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, vec!["irc.example.net"]);
    }

    #[test]
    fn parse_numeric_with_middle_params() {
        let msg = Message::parse(":srv 001 relay :Welcome to the network relay").unwrap();
        assert_eq!(msg.command, "001");
        assert_eq!(msg.params, vec!["relay", "Welcome to the network relay"]);
        assert_eq!(msg.source_nick(), Some("srv"));
    }

    #[test]
    fn parse_tags_unescaped() {
        let line = "@time=2025-01-01T00:00:00Z;label=a\\sb\\:c;flag :n!u@h PRIVMSG #c :x";
        let msg = Message::parse(line).unwrap();
        assert_eq!(msg.tags["time"], "2025-01-01T00:00:00Z");
        assert_eq!(msg.tags["label"], "a b;c");
        assert_eq!(msg.tags["flag"], "");
        assert_eq!(msg.params, vec!["#c", "x"]);
    }

    #[test]
    fn parse_lowercase_command_is_normalized() {
        let msg = Message::parse("privmsg #c :x").unwrap();
        assert_eq!(msg.command, "PRIVMSG");
    }

    #[test]
    fn parse_empty_trailing() {
        let msg = Message::parse("PRIVMSG #c :").unwrap();
        assert_eq!(msg.params, vec!["#c", ""]);
    }

    #[test]
    fn parse_rejects_blank_and_truncated() {
        assert!(Message::parse("").is_none());
        assert!(Message::parse("\r\n").is_none());
        assert!(Message::parse(":prefix-only").is_none());
        assert!(Message::parse("@tags-only").is_none());
    }

    #[test]
    fn display_adds_colon_only_when_needed() {
        assert_eq!(Message::new("JOIN", vec!["#x"]).to_string(), "JOIN #x");
        assert_eq!(
            Message::new("PRIVMSG", vec!["#x", "<bob> hello"]).to_string(),
            "PRIVMSG #x :<bob> hello"
        );
        assert_eq!(
            Message::new("PRIVMSG", vec!["#x", ""]).to_string(),
            "PRIVMSG #x :"
        );
        assert_eq!(
            Message::new("PRIVMSG", vec!["#x", ":)"]).to_string(),
            "PRIVMSG #x ::)"
        );
        assert_eq!(Message::new("QUIT", vec![]).to_string(), "QUIT");
    }

    #[test]
    fn display_with_prefix_and_tags() {
        let mut msg = Message::from_server("srv", "NOTICE", vec!["*", "hello world"]);
        msg.tags.insert("b".to_string(), "x y".to_string());
        msg.tags.insert("a".to_string(), String::new());
        assert_eq!(msg.to_string(), "@a;b=x\\sy :srv NOTICE * :hello world");
    }

    #[test]
    fn formatted_line_parses_back_identically() {
        let line = ":alice!a@h PRIVMSG #chan :some text: with colon";
        let msg = Message::parse(line).unwrap();
        assert_eq!(Message::parse(&msg.to_string()).unwrap(), msg);
    }

    #[test]
    fn line_break_detection() {
        assert!(has_line_break("a\r\nQUIT"));
        assert!(has_line_break("a\nb"));
        assert!(has_line_break("a\0b"));
        assert!(!has_line_break("plain text"));
    }
}
