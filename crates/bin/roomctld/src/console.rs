//! Line-oriented console standing in for the hardware buses.
//!
//! Each stdin line is one command:
//!
//! ```text
//! panel <pid> <pressed-mask> <backlight>
//! level <channel> <0|1>
//! ir <channel> <0|1>
//! run <aid>
//! cancel <aid>
//! pause <aid> <millis>
//! status
//! ```
//!
//! Numbers accept decimal or `0x`-prefixed hexadecimal.

use std::num::ParseIntError;
use std::str::FromStr;
use std::time::Duration;

use roomctl_domain::id::{PanelId, SceneId};

/// One parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Panel {
        panel: PanelId,
        pressed_mask: u8,
        backlight: u8,
    },
    Level {
        channel: u8,
        bit: bool,
    },
    Infrared {
        channel: u8,
        bit: bool,
    },
    Run(SceneId),
    Cancel(SceneId),
    Pause(SceneId, Duration),
    Status,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("missing argument {0}")]
    MissingArgument(&'static str),
    #[error("invalid {name}: {source}")]
    InvalidNumber {
        name: &'static str,
        source: ParseIntError,
    },
    #[error("{name} out of range: {value}")]
    OutOfRange { name: &'static str, value: u64 },
    #[error("unexpected trailing input {0:?}")]
    Trailing(String),
}

/// Parse an unsigned integer in decimal or `0x` hexadecimal.
fn number<T>(name: &'static str, raw: Option<&str>) -> Result<T, ConsoleError>
where
    T: TryFrom<u64>,
{
    let raw = raw.ok_or(ConsoleError::MissingArgument(name))?;
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    }
    .map_err(|source| ConsoleError::InvalidNumber { name, source })?;
    T::try_from(parsed).map_err(|_| ConsoleError::OutOfRange { name, value: parsed })
}

fn bit(raw: Option<&str>) -> Result<bool, ConsoleError> {
    Ok(number::<u8>("bit", raw)? != 0)
}

impl FromStr for Command {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default();
        let command = match verb {
            "panel" => Self::Panel {
                panel: PanelId::new(number("pid", words.next())?),
                pressed_mask: number("mask", words.next())?,
                backlight: number("backlight", words.next())?,
            },
            "level" => Self::Level {
                channel: number("channel", words.next())?,
                bit: bit(words.next())?,
            },
            "ir" => Self::Infrared {
                channel: number("channel", words.next())?,
                bit: bit(words.next())?,
            },
            "run" => Self::Run(SceneId::new(number("aid", words.next())?)),
            "cancel" => Self::Cancel(SceneId::new(number("aid", words.next())?)),
            "pause" => Self::Pause(
                SceneId::new(number("aid", words.next())?),
                Duration::from_millis(number("millis", words.next())?),
            ),
            "status" => Self::Status,
            other => return Err(ConsoleError::UnknownCommand(other.to_string())),
        };
        let rest: Vec<&str> = words.collect();
        if !rest.is_empty() {
            return Err(ConsoleError::Trailing(rest.join(" ")));
        }
        Ok(command)
    }
}
