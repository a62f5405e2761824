//! Interactive input source
//!
//! Reads one command per line from the terminal (or from piped stdin) and
//! forwards the resulting events:
//!
//! ```text
//! move 960 540     absolute pointer position
//! press j          key down
//! release j        key up
//! tap space        key down + key up
//! quit             close the source (shuts the process down)
//! ```

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{EventSender, InputEvent};
use crate::keys::KeyId;

const PROMPT: &str = "mouse2pad> ";

const HELP: &str = "commands: move X Y | press KEY | release KEY | tap KEY | help | quit";

/// One parsed REPL line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Event(InputEvent),
    Tap(KeyId),
    Help,
    Quit,
    Empty,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("'{0}' expects {1}")]
    Usage(&'static str, &'static str),
    #[error("invalid coordinate '{0}'")]
    Coordinate(String),
    #[error(transparent)]
    Key(#[from] crate::keys::InvalidKey),
}

/// Parse one line of REPL input
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Command::Empty);
    };
    let args: Vec<&str> = words.collect();

    let key_arg = |verb: &'static str| -> Result<KeyId, CommandError> {
        match args.as_slice() {
            [key] => Ok(KeyId::parse(key)?),
            _ => Err(CommandError::Usage(verb, "one key name")),
        }
    };

    match verb.to_ascii_lowercase().as_str() {
        "move" | "m" => match args.as_slice() {
            [x, y] => {
                let x = x.parse().map_err(|_| CommandError::Coordinate(x.to_string()))?;
                let y = y.parse().map_err(|_| CommandError::Coordinate(y.to_string()))?;
                Ok(Command::Event(InputEvent::MouseMove { x, y }))
            }
            _ => Err(CommandError::Usage("move", "two integer coordinates")),
        },
        "press" | "p" => Ok(Command::Event(InputEvent::KeyPress(key_arg("press")?))),
        "release" | "r" => Ok(Command::Event(InputEvent::KeyRelease(key_arg("release")?))),
        "tap" | "t" => Ok(Command::Tap(key_arg("tap")?)),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        _ => Err(CommandError::Unknown(verb.to_string())),
    }
}

/// Line-oriented input source running on its own OS thread
pub struct ReplSource;

impl ReplSource {
    /// Start reading commands; the sender is dropped when the source ends
    pub fn spawn(tx: EventSender) -> Result<JoinHandle<()>> {
        let handle = std::thread::Builder::new()
            .name("repl-source".to_string())
            .spawn(move || Self::run(tx))?;
        Ok(handle)
    }

    fn run(tx: EventSender) {
        // The editor owns the terminal, so it is created on the thread that uses it
        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                warn!("Failed to open input REPL: {}", e);
                return;
            }
        };
        info!("Input REPL ready ({})", HELP);

        loop {
            let line = match editor.readline(PROMPT) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    warn!("Input REPL read error: {}", e);
                    break;
                }
            };
            let _ = editor.add_history_entry(line.as_str());

            let events = match parse_command(&line) {
                Ok(Command::Event(event)) => vec![event],
                Ok(Command::Tap(key)) => {
                    vec![InputEvent::KeyPress(key.clone()), InputEvent::KeyRelease(key)]
                }
                Ok(Command::Help) => {
                    println!("{}", HELP);
                    continue;
                }
                Ok(Command::Quit) => break,
                Ok(Command::Empty) => continue,
                Err(e) => {
                    println!("{} ({})", e, HELP);
                    continue;
                }
            };

            for event in events {
                debug!("REPL event: {:?}", event);
                if tx.send(event).is_err() {
                    debug!("Dispatcher gone, stopping REPL");
                    return;
                }
            }
        }

        info!("Input REPL closed");
    }
}
