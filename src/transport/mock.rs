//! Simulated device for tests and `--simulate` runs.
//!
//! [`MockTransport`] answers the command set the way the inspection device
//! does and records every exchange. It provides:
//! - per-command latency, turned into a timeout when it exceeds the deadline
//! - failure injection (next N sends time out, or fully offline and unreachable)
//! - scripted reply overrides for malformed-reply scenarios
//! - scripted rejections (non-2xx status)
//! - a short capturing phase after `trigger`
//! - concurrency tracking to verify the gateway serializes device access

use super::{Transport, TransportError};
use crate::validator::{ConfigParameter, OperatingState};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One command as the simulated device received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommand {
    /// Raw command text.
    pub command: String,
    /// Deadline the gateway attached.
    pub deadline: Duration,
}

#[derive(Debug)]
struct SimulatedDevice {
    state: OperatingState,
    config: HashMap<ConfigParameter, String>,
    capture_polls: u32,
    pending_capture_polls: u32,
    failures_remaining: u32,
    offline: bool,
    latency: HashMap<String, Duration>,
    overrides: HashMap<String, String>,
    rejections: HashMap<String, (u16, String)>,
    log: Vec<SentCommand>,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        let config = [
            (ConfigParameter::Focus, "800"),
            (ConfigParameter::Exposure, "10.0"),
            (ConfigParameter::Gain, "+0"),
            (ConfigParameter::LedPattern, "a"),
            (ConfigParameter::LedIntensity, "128"),
            (ConfigParameter::PhotometricMode, "0"),
        ]
        .into_iter()
        .map(|(param, value)| (param, value.to_string()))
        .collect();

        Self {
            state: OperatingState::Idle,
            config,
            capture_polls: 0,
            pending_capture_polls: 0,
            failures_remaining: 0,
            offline: false,
            latency: HashMap::new(),
            overrides: HashMap::new(),
            rejections: HashMap::new(),
            log: Vec::new(),
        }
    }
}

impl SimulatedDevice {
    fn reply(&mut self, command: &str) -> Result<String, TransportError> {
        if let Some((status, body)) = self.rejections.get(command) {
            return Err(TransportError::Rejected {
                command: command.to_string(),
                status: *status,
                body: body.clone(),
            });
        }
        if let Some(reply) = self.overrides.get(command) {
            return Ok(reply.clone());
        }

        let (verb, argument) = match command.split_once('=') {
            Some((verb, argument)) => (verb, Some(argument)),
            None => (command, None),
        };

        let reply = match (verb, argument) {
            ("ping", None) => "pong".to_string(),
            ("reset", None) => {
                self.state = OperatingState::Idle;
                self.pending_capture_polls = 0;
                "reset_ack".to_string()
            }
            ("get_state", None) => {
                let reported = if self.pending_capture_polls > 0 {
                    self.pending_capture_polls -= 1;
                    if self.pending_capture_polls == 0 {
                        self.state = OperatingState::Idle;
                    }
                    OperatingState::Capturing
                } else {
                    self.state
                };
                format!("state:{reported}")
            }
            ("set_state", Some(destination)) => match destination.parse() {
                Ok(state) => {
                    self.state = state;
                    self.pending_capture_polls = 0;
                    format!("state:{state}")
                }
                Err(_) => return Err(self.reject(command)),
            },
            ("get_config", Some(name)) => match name.parse::<ConfigParameter>() {
                Ok(param) => {
                    let value = self.config.get(&param).cloned().unwrap_or_default();
                    format!("{param}:{value}")
                }
                Err(_) => return Err(self.reject(command)),
            },
            ("set_config", Some(assignment)) => {
                let parsed = assignment
                    .split_once(':')
                    .and_then(|(name, value)| Some((name.parse::<ConfigParameter>().ok()?, value)));
                match parsed {
                    Some((param, value)) => {
                        self.config.insert(param, value.to_string());
                        format!("{param}:{value}")
                    }
                    None => return Err(self.reject(command)),
                }
            }
            ("trigger", None) => {
                if self.capture_polls > 0 {
                    self.state = OperatingState::Capturing;
                    self.pending_capture_polls = self.capture_polls;
                }
                "trigger_ack".to_string()
            }
            ("get_frame", None) => "frame:00ff00ff".to_string(),
            _ => return Err(self.reject(command)),
        };
        Ok(reply)
    }

    fn reject(&self, command: &str) -> TransportError {
        TransportError::Rejected {
            command: command.to_string(),
            status: 400,
            body: "bad_request".to_string(),
        }
    }
}

/// In-process stand-in for the inspection device.
///
/// # Example
///
/// ```
/// use hardware_gateway::transport::{MockTransport, Transport};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let device = MockTransport::new();
/// let reply = device.send("ping", Duration::from_millis(150)).await.unwrap();
/// assert_eq!(reply, "pong");
/// assert_eq!(device.count("ping"), 1);
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    device: Arc<Mutex<SimulatedDevice>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockTransport {
    /// Simulated device in `Idle` with factory configuration.
    pub fn new() -> Self {
        Self::default()
    }

    fn device(&self) -> MutexGuard<'_, SimulatedDevice> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Preload a configuration value on the device.
    pub fn with_config(self, param: ConfigParameter, value: &str) -> Self {
        self.device().config.insert(param, value.to_string());
        self
    }

    /// Put the device in a given state.
    pub fn with_state(self, state: OperatingState) -> Self {
        self.device().state = state;
        self
    }

    /// Delay replies to commands starting with `prefix`.
    pub fn with_latency(self, prefix: &str, latency: Duration) -> Self {
        self.device().latency.insert(prefix.to_string(), latency);
        self
    }

    /// After each `trigger`, report `capturing` for the next `polls` state reads.
    pub fn with_capture_polls(self, polls: u32) -> Self {
        self.device().capture_polls = polls;
        self
    }

    /// Answer `command` with `reply` verbatim instead of simulating it.
    pub fn with_reply(self, command: &str, reply: &str) -> Self {
        self.device()
            .overrides
            .insert(command.to_string(), reply.to_string());
        self
    }

    /// Refuse `command` with an HTTP-style error status and body.
    pub fn with_rejection(self, command: &str, status: u16, body: &str) -> Self {
        self.device()
            .rejections
            .insert(command.to_string(), (status, body.to_string()));
        self
    }

    /// Fail the next `count` sends as if the device never answered.
    pub fn fail_next(&self, count: u32) {
        self.device().failures_remaining = count;
    }

    /// Refuse every connection until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.device().offline = offline;
    }

    /// Every command received so far, in order.
    pub fn sent(&self) -> Vec<SentCommand> {
        self.device().log.clone()
    }

    /// Raw text of every command received so far.
    pub fn commands(&self) -> Vec<String> {
        self.device().log.iter().map(|s| s.command.clone()).collect()
    }

    /// How many times `command` was received.
    pub fn count(&self, command: &str) -> usize {
        self.device()
            .log
            .iter()
            .filter(|sent| sent.command == command)
            .count()
    }

    /// Forget the command log.
    pub fn clear_log(&self) {
        self.device().log.clear();
    }

    /// Current simulated device state.
    pub fn state(&self) -> OperatingState {
        self.device().state
    }

    /// Current simulated value of `param`.
    pub fn config(&self, param: ConfigParameter) -> Option<String> {
        self.device().config.get(&param).cloned()
    }

    /// Highest number of sends that were ever in progress at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn latency_for(&self, command: &str) -> Duration {
        self.device()
            .latency
            .iter()
            .filter(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, latency)| *latency)
            .max()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, command: &str, deadline: Duration) -> Result<String, TransportError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let result = self.exchange(command, deadline).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

impl MockTransport {
    async fn exchange(&self, command: &str, deadline: Duration) -> Result<String, TransportError> {
        let (offline, injected) = {
            let mut device = self.device();
            device.log.push(SentCommand {
                command: command.to_string(),
                deadline,
            });
            let injected = device.failures_remaining > 0;
            if injected {
                device.failures_remaining -= 1;
            }
            (device.offline, injected)
        };

        if offline {
            return Err(TransportError::Unavailable(format!(
                "simulated device offline, dropped '{command}'"
            )));
        }

        let latency = self.latency_for(command);
        if injected || latency > deadline {
            tokio::time::sleep(deadline).await;
            return Err(TransportError::Timeout {
                command: command.to_string(),
                deadline,
            });
        }

        tokio::time::sleep(latency).await;
        self.device().reply(command)
    }
}
