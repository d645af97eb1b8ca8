//! Console control surface: one command per line on standard input.
//!
//! | Line                   | Command                                   |
//! |------------------------|-------------------------------------------|
//! | `text <caption>`       | replace the caption text                  |
//! | `color <css color>`    | caption color (`white`, `#fc0`, `rgb(...)`)|
//! | `font <css font>`      | caption font (`24px Arial`)               |
//! | `pos <x> <y>`          | caption anchor                            |
//! | `sl <n>`               | request simulcast substream `n`           |
//! | `tl <n>`               | request temporal layer `n`                |
//! | `audio` / `video`      | toggle the echoed medium                  |
//! | `bitrate <kbps>`       | cap the echoed bitrate, `0` removes the cap|
//! | `stop`                 | end the session                           |
//!
//! Parsing is separate from reading so every rule can be tested without a
//! terminal.  Lines that do not parse are reported and skipped; the reader
//! keeps going.

use canvas_core::{CaptionEdit, CaptionError, LayerKind};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::session::ControlCommand;

/// Why a console line was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty line")]
    Empty,
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("{0:?} is not a valid number")]
    InvalidNumber(String),
    #[error(transparent)]
    Caption(#[from] CaptionError),
}

/// Parses one console line.
///
/// # Errors
///
/// Returns a [`CommandError`] for blank lines, unknown commands, missing
/// arguments and malformed numbers.  Colors and fonts are validated later,
/// when the edit is applied to the caption.
pub fn parse_command(line: &str) -> Result<ControlCommand, CommandError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let required = |name: &'static str| {
        if rest.is_empty() {
            Err(CommandError::MissingArgument(name))
        } else {
            Ok(rest)
        }
    };

    match word.to_ascii_lowercase().as_str() {
        "" => Err(CommandError::Empty),
        // Text may legitimately be empty.
        "text" => Ok(ControlCommand::EditCaption(CaptionEdit::text(rest))),
        "color" => Ok(ControlCommand::EditCaption(CaptionEdit::color(required(
            "color",
        )?))),
        "font" => Ok(ControlCommand::EditCaption(CaptionEdit::font(required(
            "font",
        )?))),
        "pos" => {
            let mut parts = rest.split_whitespace();
            let (Some(x), Some(y)) = (parts.next(), parts.next()) else {
                return Err(CommandError::MissingArgument("pos"));
            };
            Ok(ControlCommand::EditCaption(CaptionEdit::position_from_str(
                x, y,
            )?))
        }
        "sl" => Ok(ControlCommand::RequestLayer {
            kind: LayerKind::Spatial,
            value: parse_number(required("sl")?)?,
        }),
        "tl" => Ok(ControlCommand::RequestLayer {
            kind: LayerKind::Temporal,
            value: parse_number(required("tl")?)?,
        }),
        "audio" => Ok(ControlCommand::ToggleAudio),
        "video" => Ok(ControlCommand::ToggleVideo),
        "bitrate" => Ok(ControlCommand::CapBitrate {
            kbps: parse_number(required("bitrate")?)?,
        }),
        "stop" | "quit" => Ok(ControlCommand::Stop),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str) -> Result<T, CommandError> {
    raw.parse()
        .map_err(|_| CommandError::InvalidNumber(raw.to_string()))
}

/// Forwards every valid line of `reader` to `commands`.
///
/// Returns when the input ends or the session stops listening.
pub async fn forward_commands<R>(reader: R, commands: mpsc::Sender<ControlCommand>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("console input closed");
                break;
            }
            Err(e) => {
                warn!("console read failed: {e}");
                break;
            }
        };
        match parse_command(&line) {
            Ok(command) => {
                if commands.send(command).await.is_err() {
                    break;
                }
            }
            Err(CommandError::Empty) => {}
            Err(e) => warn!("ignored console line: {e}"),
        }
    }
}

/// Spawns a task reading commands from standard input.
pub fn spawn_stdin_reader(commands: mpsc::Sender<ControlCommand>) -> JoinHandle<()> {
    tokio::spawn(forward_commands(BufReader::new(tokio::io::stdin()), commands))
}
