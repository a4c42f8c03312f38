//! Lines typed on stdin.

#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    /// Plain text for the default channel.
    Say(&'a str),
    /// `/msg <target> <text>`
    Msg { target: &'a str, text: &'a str },
    /// `/quit [reason]`
    Quit(Option<&'a str>),
    /// Blank line or a malformed command.
    Ignore,
}

pub fn parse(line: &str) -> Input<'_> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Input::Ignore;
    }
    if let Some(rest) = line.strip_prefix("/msg ") {
        return match rest.trim_start().split_once(' ') {
            Some((target, text)) if !text.is_empty() => Input::Msg { target, text },
            _ => Input::Ignore,
        };
    }
    if line == "/quit" {
        return Input::Quit(None);
    }
    if let Some(reason) = line.strip_prefix("/quit ") {
        let reason = reason.trim();
        return Input::Quit((!reason.is_empty()).then_some(reason));
    }
    Input::Say(line)
}
