//! Operator commands typed into a running `watch` session.
//!
//! One command per line, words separated by whitespace:
//!
//! ```text
//! start <id> <minutes> <price>
//! plan <id> half-hour|hour
//! confirm <id> returned|not-returned
//! return <id>
//! stop <id>
//! reset <id>
//! ```

use std::str::FromStr;

use paddock_core::{Clock, RentalPlan, SessionRecord, Unit};
use thiserror::Error;

use crate::{
    engine::RentalEngine, error::EngineError, notifier::NotificationSink, storage::Storage,
};

/// A lifecycle operation requested by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Start a rental with an explicit duration and price
    Start {
        /// Unit id
        id: String,
        /// Paid minutes
        minutes: u32,
        /// Price charged
        price: u32,
    },
    /// Start a rental on a priced plan
    Plan {
        /// Unit id
        id: String,
        /// Chosen plan
        plan: RentalPlan,
    },
    /// Answer the return prompt
    Confirm {
        /// Unit id
        id: String,
        /// Whether the kart is back
        returned: bool,
    },
    /// Return before paid time lapses
    Return {
        /// Unit id
        id: String,
    },
    /// End overtime
    Stop {
        /// Unit id
        id: String,
    },
    /// Discard the session without history
    Reset {
        /// Unit id
        id: String,
    },
}

/// A command line that could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseCommandError {
    /// Blank line
    #[error("empty command")]
    Empty,

    /// First word is not a known command
    #[error("unknown command: {0}")]
    Unknown(String),

    /// Known command with missing or malformed arguments
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl FromStr for EngineCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = parts.split_first() else {
            return Err(ParseCommandError::Empty);
        };

        match (command, args) {
            ("start", [id, minutes, price]) => {
                let usage = ParseCommandError::Usage("start <id> <minutes> <price>");
                Ok(Self::Start {
                    id: (*id).to_owned(),
                    minutes: minutes.parse().map_err(|_| usage.clone())?,
                    price: price.parse().map_err(|_| usage)?,
                })
            },
            ("start", _) => Err(ParseCommandError::Usage("start <id> <minutes> <price>")),
            ("plan", [id, plan]) => {
                let plan = match *plan {
                    "half-hour" => RentalPlan::HalfHour,
                    "hour" => RentalPlan::Hour,
                    _ => return Err(ParseCommandError::Usage("plan <id> half-hour|hour")),
                };
                Ok(Self::Plan { id: (*id).to_owned(), plan })
            },
            ("plan", _) => Err(ParseCommandError::Usage("plan <id> half-hour|hour")),
            ("confirm", [id, answer]) => {
                let returned = match *answer {
                    "returned" => true,
                    "not-returned" => false,
                    _ => {
                        return Err(ParseCommandError::Usage("confirm <id> returned|not-returned"));
                    },
                };
                Ok(Self::Confirm { id: (*id).to_owned(), returned })
            },
            ("confirm", _) => Err(ParseCommandError::Usage("confirm <id> returned|not-returned")),
            ("return", [id]) => Ok(Self::Return { id: (*id).to_owned() }),
            ("return", _) => Err(ParseCommandError::Usage("return <id>")),
            ("stop", [id]) => Ok(Self::Stop { id: (*id).to_owned() }),
            ("stop", _) => Err(ParseCommandError::Usage("stop <id>")),
            ("reset", [id]) => Ok(Self::Reset { id: (*id).to_owned() }),
            ("reset", _) => Err(ParseCommandError::Usage("reset <id>")),
            (other, _) => Err(ParseCommandError::Unknown(other.to_owned())),
        }
    }
}

impl EngineCommand {
    /// Unit the command targets.
    pub fn unit_id(&self) -> &str {
        match self {
            Self::Start { id, .. }
            | Self::Plan { id, .. }
            | Self::Confirm { id, .. }
            | Self::Return { id }
            | Self::Stop { id }
            | Self::Reset { id } => id,
        }
    }
}

/// Result of one executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Unit after the transition
    pub unit: Unit,
    /// Session closed by the command, as billed
    pub closed: Option<SessionRecord>,
}

impl<C: Clock, S: Storage, N: NotificationSink> RentalEngine<C, S, N> {
    /// Run one operator command.
    ///
    /// For closing commands the billed session is previewed right before
    /// the transition runs, and only reported once it succeeded.
    ///
    /// # Errors
    ///
    /// As the underlying lifecycle operation.
    pub fn execute(&mut self, command: &EngineCommand) -> Result<CommandOutcome, EngineError> {
        let closing = matches!(
            command,
            EngineCommand::Return { .. }
                | EngineCommand::Stop { .. }
                | EngineCommand::Confirm { returned: true, .. }
        );
        let preview = if closing { self.close_summary(command.unit_id())? } else { None };

        let unit = match command {
            EngineCommand::Start { id, minutes, price } => self.start_rental(id, *minutes, *price)?,
            EngineCommand::Plan { id, plan } => self.start_plan(id, *plan)?,
            EngineCommand::Confirm { id, returned } => self.confirm_return(id, *returned)?,
            EngineCommand::Return { id } => self.early_return(id)?,
            EngineCommand::Stop { id } => self.stop_overtime(id)?,
            EngineCommand::Reset { id } => self.force_reset(id)?,
        };

        Ok(CommandOutcome { unit, closed: preview })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_command() {
        assert_eq!(
            "start basic-karts-1 30 20".parse(),
            Ok(EngineCommand::Start { id: "basic-karts-1".into(), minutes: 30, price: 20 })
        );
        assert_eq!(
            "plan basic-karts-1 hour".parse(),
            Ok(EngineCommand::Plan { id: "basic-karts-1".into(), plan: RentalPlan::Hour })
        );
        assert_eq!(
            "  confirm   basic-karts-1 not-returned ".parse(),
            Ok(EngineCommand::Confirm { id: "basic-karts-1".into(), returned: false })
        );
        assert_eq!("return k".parse(), Ok(EngineCommand::Return { id: "k".into() }));
        assert_eq!("stop k".parse(), Ok(EngineCommand::Stop { id: "k".into() }));
        assert_eq!("reset k".parse(), Ok(EngineCommand::Reset { id: "k".into() }));
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!("".parse::<EngineCommand>(), Err(ParseCommandError::Empty));
        assert_eq!(
            "fly k".parse::<EngineCommand>(),
            Err(ParseCommandError::Unknown("fly".into()))
        );
        assert!(matches!(
            "start k thirty 20".parse::<EngineCommand>(),
            Err(ParseCommandError::Usage(_))
        ));
        assert!(matches!(
            "confirm k maybe".parse::<EngineCommand>(),
            Err(ParseCommandError::Usage(_))
        ));
        assert!(matches!("return".parse::<EngineCommand>(), Err(ParseCommandError::Usage(_))));
    }
}
