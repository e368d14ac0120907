//! Interactive commands read from stdin.

use wifidirect_core::SessionPhase;

pub const TEXT_DEFAULT: &str = "Host a game or join a friend.";
pub const TEXT_HOSTING: &str =
    "Hosting game... Please stand near the person you wish to connect with. Passphrase: ";
pub const TEXT_DISCOVERING: &str =
    "Looking for server... Please stand near the person you wish to connect with.";
pub const TEXT_SELECTED: &str = "Please enter the passphrase for the network you've selected.";

pub const HELP: &str = "\
commands:
  host [passphrase]              host a group (passphrase generated when omitted)
  join                           look for hosts advertising the service
  peers                          look for any nearby host
  list                           show discovered devices
  connect <address> [passphrase] connect to a discovered device
  cancel                         stop discovery or a pending connection
  send <text>                    send a message to the connected peer
  remove                         stop advertising, keep the group
  disconnect                     leave the group or connection
  status                         show session state
  help                           show this text
  quit                           close the session and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Host(Option<String>),
    Join,
    Peers,
    List,
    Connect {
        address: String,
        passphrase: Option<String>,
    },
    Cancel,
    Send(String),
    Remove,
    Disconnect,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, ParseError> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let mut args = rest.split_whitespace();
        let cmd = match word.to_ascii_lowercase().as_str() {
            "" => return Err(ParseError::Empty),
            "host" => Command::Host(args.next().map(str::to_string)),
            "join" | "discover" => Command::Join,
            "peers" => Command::Peers,
            "list" | "ls" => Command::List,
            "connect" => {
                let address = args
                    .next()
                    .ok_or(ParseError::Usage("connect <address> [passphrase]"))?;
                Command::Connect {
                    address: address.to_string(),
                    passphrase: args.next().map(str::to_string),
                }
            }
            "cancel" => Command::Cancel,
            "send" => {
                if rest.is_empty() {
                    return Err(ParseError::Usage("send <text>"));
                }
                // Text is sent as typed, inner spacing included.
                Command::Send(rest.to_string())
            }
            "remove" => Command::Remove,
            "disconnect" => Command::Disconnect,
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }
}

/// Instruction line for the current phase.
pub fn instruction(phase: SessionPhase, passphrase: Option<&str>) -> String {
    match phase {
        SessionPhase::Hosting => format!("{}{}", TEXT_HOSTING, passphrase.unwrap_or("")),
        SessionPhase::Discovering => TEXT_DISCOVERING.to_string(),
        _ => TEXT_DEFAULT.to_string(),
    }
}
