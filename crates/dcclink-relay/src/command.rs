//! Operator console commands.

use crate::control::RelayControl;
use crate::error::{RelayError, Result};

/// Usage line for the `dcc` command.
pub const USAGE: &str = "dcc ('enable'|'disable')";

/// A parsed console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Enable,
    Disable,
}

impl ConsoleCommand {
    /// Parse one console line.
    ///
    /// `dcc_port` is recognised but reserved, and fails with
    /// [`RelayError::Unavailable`].
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("dcc"), Some("enable"), None) => Ok(Self::Enable),
            (Some("dcc"), Some("disable"), None) => Ok(Self::Disable),
            (Some("dcc_port"), _, _) => Err(RelayError::Unavailable("dcc_port".into())),
            _ => Err(RelayError::UnknownCommand(format!("usage: {USAGE}"))),
        }
    }

    /// Apply to the relay and return a line for the operator.
    pub fn apply(self, control: &RelayControl) -> &'static str {
        match self {
            Self::Enable => {
                control.set_enabled(true);
                "dcc enabled"
            }
            Self::Disable => {
                control.set_enabled(false);
                "dcc disabled"
            }
        }
    }
}

impl std::str::FromStr for ConsoleCommand {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_enable_and_disable() {
        assert_eq!(ConsoleCommand::parse("dcc enable").unwrap(), ConsoleCommand::Enable);
        assert_eq!(
            "  dcc   disable \n".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Disable
        );
    }

    #[test]
    fn bad_argument_prints_usage() {
        for line in ["dcc", "dcc on", "dcc enable now", "", "reset"] {
            let err = ConsoleCommand::parse(line).unwrap_err();
            assert!(
                matches!(&err, RelayError::UnknownCommand(msg) if msg.contains(USAGE)),
                "{line:?} -> {err}"
            );
        }
    }

    #[test]
    fn port_command_is_reserved() {
        let err = ConsoleCommand::parse("dcc_port 4000").unwrap_err();
        assert!(matches!(err, RelayError::Unavailable(name) if name == "dcc_port"));
    }

    #[test]
    fn apply_toggles_control() {
        let control = RelayControl::new(true);
        assert_eq!(ConsoleCommand::Disable.apply(&control), "dcc disabled");
        assert!(!control.is_enabled());
        assert_eq!(ConsoleCommand::Enable.apply(&control), "dcc enabled");
        assert!(control.is_enabled());
    }
}
