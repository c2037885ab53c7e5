use std::path::PathBuf;

/// One line of REPL input
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    /// Plain text: a message, or a URL while the URL picker is open
    Text(String),
    New,
    List,
    Open(String),
    Rename(String),
    /// Delete the given conversation, or the active one
    Delete(Option<String>),
    Image(PathBuf),
    /// Attach the given URL, or toggle the URL picker when none is given
    Url(Option<String>),
    Detach,
    Stop,
    Errors,
    Help,
    Quit,
    Unknown(String),
}

pub const HELP: &str = "\
Commands:
  /new                 start a new conversation
  /list                list conversations, newest first
  /open <n|id>         switch to a conversation and show it
  /rename <name>       rename the active conversation
  /delete [n|id]       delete a conversation (default: active)
  /image <path>        attach an image file to the next message
  /url [url]           attach an image URL (no argument: type it on the next line)
  /detach              remove the attachment
  /stop                stop the streaming response
  /errors              show recent warnings and errors
  /help                show this help
  /quit                exit
Anything else is sent as a message.";

/// Parse a line; `None` for blank input
pub fn parse(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Text(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let arg = (!arg.is_empty()).then(|| arg.to_string());

    let command = match (name, arg) {
        ("new", _) => Command::New,
        ("list" | "ls", _) => Command::List,
        ("open", Some(target)) => Command::Open(target),
        ("rename", Some(new_name)) => Command::Rename(new_name),
        ("delete" | "rm", target) => Command::Delete(target),
        ("image", Some(path)) => Command::Image(PathBuf::from(path)),
        ("url", url) => Command::Url(url),
        ("detach", _) => Command::Detach,
        ("stop", _) => Command::Stop,
        ("errors", _) => Command::Errors,
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit" | "q", _) => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    };
    Some(command)
}
