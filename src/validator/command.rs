//! Command grammar and parsing.
//!
//! Every client request is a single line of the form
//!
//! ```text
//! verb [ "=" param [ ":" value ] ]
//! ```
//!
//! The verb is made of ASCII word characters. Parameter and value tokens
//! additionally allow `.`, `+` and `-` so signed and decimal numbers survive.
//! Parsing only checks shape; whether a command is legal is decided by
//! [`CommandValidator`](super::CommandValidator).

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

static GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^([A-Za-z0-9_]+)(?:=([A-Za-z0-9_.+\-]+)(?::([A-Za-z0-9_.+\-]+))?)?$")
        .expect("command grammar is a valid regex")
});

/// Closed set of verbs understood by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Liveness probe.
    Ping,
    /// Start a capture.
    Trigger,
    /// Fetch the last captured frame.
    GetFrame,
    /// Read the current operating state.
    GetState,
    /// Reset the device.
    Reset,
    /// Request a state transition.
    SetState,
    /// Read one configuration parameter.
    GetConfig,
    /// Write one configuration parameter.
    SetConfig,
}

impl Verb {
    /// All verbs, in declaration order.
    pub const ALL: [Verb; 8] = [
        Verb::Ping,
        Verb::Trigger,
        Verb::GetFrame,
        Verb::GetState,
        Verb::Reset,
        Verb::SetState,
        Verb::GetConfig,
        Verb::SetConfig,
    ];

    /// Wire name of the verb.
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Ping => "ping",
            Verb::Trigger => "trigger",
            Verb::GetFrame => "get_frame",
            Verb::GetState => "get_state",
            Verb::Reset => "reset",
            Verb::SetState => "set_state",
            Verb::GetConfig => "get_config",
            Verb::SetConfig => "set_config",
        }
    }

    /// Verbs that never take an argument.
    pub fn is_standalone(self) -> bool {
        matches!(
            self,
            Verb::Ping | Verb::Trigger | Verb::GetFrame | Verb::GetState | Verb::Reset
        )
    }

    /// Verbs that start or collect a capture and must only run from `Idle`.
    pub fn is_capture(self) -> bool {
        matches!(self, Verb::Trigger | Verb::GetFrame)
    }

    /// Verbs after which the device may be in a different operating state.
    pub fn changes_state(self) -> bool {
        matches!(self, Verb::SetState | Verb::Reset | Verb::Trigger)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|verb| verb.as_str() == s)
            .ok_or_else(|| ParseError::UnknownVerb(s.to_string()))
    }
}

/// Why a raw command string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The text does not match the command grammar.
    #[error("malformed command '{0}'")]
    Malformed(String),
    /// The verb is well formed but not one the device understands.
    #[error("unknown verb '{0}'")]
    UnknownVerb(String),
}

/// A parsed request: verb plus optional parameter and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Requested operation.
    pub verb: Verb,
    /// Token after `=`, if any.
    pub param: Option<String>,
    /// Token after `:`, if any.
    pub value: Option<String>,
    raw: String,
}

impl Command {
    /// Parse `raw` against the command grammar.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let captures = GRAMMAR
            .captures(raw)
            .ok_or_else(|| ParseError::Malformed(raw.to_string()))?;

        let verb = captures[1].parse::<Verb>()?;
        Ok(Self {
            verb,
            param: captures.get(2).map(|m| m.as_str().to_string()),
            value: captures.get(3).map(|m| m.as_str().to_string()),
            raw: raw.to_string(),
        })
    }

    /// The command exactly as the client sent it. This is what the device receives.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
