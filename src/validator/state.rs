//! Operating states of the inspection device.

use super::command::Verb;
use std::fmt;
use std::str::FromStr;

/// Coarse operating mode of the device.
///
/// `Capturing` is never a valid `set_state` destination. The gateway only
/// learns about it when the device reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperatingState {
    /// Ready to trigger a capture.
    #[default]
    Idle,
    /// Configuration parameters may be read and written.
    Config,
    /// A capture is in progress.
    Capturing,
}

impl OperatingState {
    /// All states, in declaration order.
    pub const ALL: [OperatingState; 3] = [
        OperatingState::Idle,
        OperatingState::Config,
        OperatingState::Capturing,
    ];

    /// Wire name of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            OperatingState::Idle => "idle",
            OperatingState::Config => "config",
            OperatingState::Capturing => "capturing",
        }
    }

    /// Verbs the device accepts while in this state.
    pub fn legal_verbs(self) -> &'static [Verb] {
        match self {
            OperatingState::Idle => &[
                Verb::Ping,
                Verb::Trigger,
                Verb::GetFrame,
                Verb::GetState,
                Verb::SetState,
                Verb::Reset,
            ],
            OperatingState::Config => &[
                Verb::Ping,
                Verb::GetState,
                Verb::SetState,
                Verb::GetConfig,
                Verb::SetConfig,
                Verb::Reset,
            ],
            OperatingState::Capturing => &[Verb::Ping, Verb::GetState, Verb::Reset],
        }
    }

    /// Whether `verb` is legal in this state.
    pub fn allows(self, verb: Verb) -> bool {
        self.legal_verbs().contains(&verb)
    }

    /// Whether a client may request this state through `set_state`.
    pub fn is_settable(self) -> bool {
        !matches!(self, OperatingState::Capturing)
    }
}

impl fmt::Display for OperatingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a state name is not one of `idle`, `config`, `capturing`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operating state '{0}'")]
pub struct UnknownState(pub String);

impl FromStr for OperatingState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperatingState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}
