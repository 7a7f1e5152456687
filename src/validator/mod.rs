//! Command validation and the hardware mirror.
//!
//! [`CommandValidator`] owns the gateway's belief about the device: its
//! [`OperatingState`] and the last known value of every [`ConfigParameter`].
//! It decides whether a command is legal against that belief and applies the
//! mutations a legal command implies. It never performs I/O; the
//! [`Gateway`](crate::gateway::Gateway) feeds it device reads.
//!
//! Three independent checks guard the device:
//!
//! - per-state verb legality and argument shape in [`CommandValidator::validate`]
//! - capture gating in [`CommandValidator::validate_operation`]
//! - the `photometric_mode`/`led_pattern` interdependency in [`CommandValidator::set_config`]

pub mod command;
pub mod param;
pub mod state;

pub use command::{Command, ParseError, Verb};
pub use param::{ConfigParameter, PhotometricMode, UnknownParameter};
pub use state::{OperatingState, UnknownState};

use tracing::debug;

/// Locally cached copy of the device's state and configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareMirror {
    state: OperatingState,
    values: [Option<String>; ConfigParameter::ALL.len()],
}

impl Default for HardwareMirror {
    fn default() -> Self {
        Self {
            state: OperatingState::Idle,
            values: ConfigParameter::ALL.map(|param| param.default_value().map(str::to_string)),
        }
    }
}

impl HardwareMirror {
    /// Current operating state.
    pub fn state(&self) -> OperatingState {
        self.state
    }

    /// Last known value of `param`, if any.
    pub fn value(&self, param: ConfigParameter) -> Option<&str> {
        self.values[param.index()].as_deref()
    }
}

/// State machine and value validator for device commands.
#[derive(Debug, Clone, Default)]
pub struct CommandValidator {
    mirror: HardwareMirror,
}

impl CommandValidator {
    /// Validator in `Idle` with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `command` is well formed and legal in the current state.
    ///
    /// Accepted `set_state` and `set_config` commands are applied to the mirror.
    pub fn validate(&mut self, command: &Command) -> bool {
        let state = self.mirror.state;
        // set_state is judged by its destination alone, so Capturing can be left.
        if command.verb != Verb::SetState && !state.allows(command.verb) {
            debug!(command = %command, %state, "verb not legal in current state");
            return false;
        }

        match (command.verb, command.param.as_deref(), command.value.as_deref()) {
            (verb, None, None) if verb.is_standalone() => true,
            (Verb::SetState, Some(destination), None) => destination
                .parse::<OperatingState>()
                .is_ok_and(|destination| self.set_state(destination)),
            (Verb::GetConfig, Some(param), None) => {
                state == OperatingState::Config && param.parse::<ConfigParameter>().is_ok()
            }
            (Verb::SetConfig, Some(param), Some(value)) => param
                .parse::<ConfigParameter>()
                .is_ok_and(|param| self.set_config(param, value)),
            _ => false,
        }
    }

    /// Capture gate: `trigger` and `get_frame` only run from `Idle`.
    pub fn validate_operation(&self, verb: Verb) -> bool {
        !verb.is_capture() || self.mirror.state == OperatingState::Idle
    }

    /// Move to a client-requested state. `Capturing` is never accepted.
    pub fn set_state(&mut self, state: OperatingState) -> bool {
        if !state.is_settable() {
            return false;
        }
        self.mirror.state = state;
        true
    }

    /// Record a state the device reported about itself.
    ///
    /// Unlike [`set_state`](Self::set_state) this accepts `capturing`, since
    /// the device is the authority on its own mode. Unknown names leave the
    /// mirror untouched.
    pub fn sync_state(&mut self, reported: &str) -> bool {
        match reported.parse::<OperatingState>() {
            Ok(state) => {
                self.mirror.state = state;
                true
            }
            Err(_) => false,
        }
    }

    /// Write a configuration value after checking state, domain and interdependency.
    pub fn set_config(&mut self, param: ConfigParameter, value: &str) -> bool {
        if self.mirror.state != OperatingState::Config || !param.accepts(value) {
            return false;
        }

        match param {
            ConfigParameter::PhotometricMode
                if value == "1" && self.mirror.value(ConfigParameter::LedPattern) != Some("a") =>
            {
                debug!("photometric_mode:1 requires led_pattern:a");
                return false;
            }
            ConfigParameter::LedPattern
                if self.photometric_mode() == PhotometricMode::On
                    && self.mirror.value(param) != Some(value) =>
            {
                debug!("led_pattern is locked while photometric_mode is 1");
                return false;
            }
            _ => {}
        }

        self.mirror.values[param.index()] = Some(value.to_string());
        true
    }

    /// Last known value of `name`, or `""` when the parameter is unknown or unread.
    pub fn get_config(&self, name: &str) -> &str {
        name.parse::<ConfigParameter>()
            .ok()
            .and_then(|param| self.mirror.value(param))
            .unwrap_or("")
    }

    /// Current operating state.
    pub fn get_state(&self) -> OperatingState {
        self.mirror.state
    }

    /// Mirrored photometric mode.
    pub fn photometric_mode(&self) -> PhotometricMode {
        PhotometricMode::from_value(self.mirror.value(ConfigParameter::PhotometricMode))
    }

    /// Read-only view of the mirror.
    pub fn mirror(&self) -> &HardwareMirror {
        &self.mirror
    }

    /// Put back a previously taken snapshot.
    pub fn restore(&mut self, snapshot: HardwareMirror) {
        self.mirror = snapshot;
    }
}
