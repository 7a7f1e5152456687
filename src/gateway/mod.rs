//! Hardware gateway client.
//!
//! The [`Gateway`] is the only component that talks to the device. Every
//! client command goes through one critical section:
//!
//! 1. resynchronize the mirror from the device (once, on first use)
//! 2. parse and check the capture gate ([`Reply::OperationError`])
//! 3. validate against state and value rules ([`Reply::ValidationError`])
//! 4. pick a deadline from the verb and the mirrored photometric mode
//! 5. deliver with a fixed-backoff retry budget
//! 6. on exhaustion, roll back the mirror, reset the device and report [`Reply::TimeoutError`]
//! 7. on success, reconcile the mirror with what the device now reports
//!
//! There is one physical device, so commands are serialized: the lock is
//! held from validation until the mirror is updated, retries included.
//! Each dispatch runs on its own task so a client hanging up mid-command
//! never abandons a device exchange halfway.

pub mod retry;
pub mod timeout;

pub use retry::RetryPolicy;
pub use timeout::timeout_for;

use crate::transport::{Transport, TransportError};
use crate::validator::{
    Command, CommandValidator, ConfigParameter, HardwareMirror, OperatingState, Verb,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Outcome of a dispatched command, as sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Raw device reply text.
    Response(String),
    /// Malformed command, or not legal for the current state or value domain.
    ValidationError,
    /// Capture verb used outside `Idle`.
    OperationError,
    /// The device never answered within the retry budget.
    TimeoutError,
}

impl Reply {
    /// Wire sentinel for [`Reply::ValidationError`].
    pub const VALIDATION_ERR: &'static str = "validation_err";
    /// Wire sentinel for [`Reply::OperationError`].
    pub const OPERATION_ERR: &'static str = "operation_err";
    /// Wire sentinel for [`Reply::TimeoutError`].
    pub const TIMEOUT_ERR: &'static str = "timeout_err";

    /// Text written back to the client.
    pub fn as_wire(&self) -> &str {
        match self {
            Reply::Response(body) => body,
            Reply::ValidationError => Self::VALIDATION_ERR,
            Reply::OperationError => Self::OPERATION_ERR,
            Reply::TimeoutError => Self::TIMEOUT_ERR,
        }
    }

    /// True for any of the gateway's error sentinels.
    pub fn is_error(&self) -> bool {
        !matches!(self, Reply::Response(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Extract `value` from a `param:value` device reply.
///
/// Returns `None` when there is no colon or nothing after it.
pub fn value_from_response(response: &str) -> Option<&str> {
    let (_, value) = response.split_once(':')?;
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

struct Session {
    validator: CommandValidator,
    synced: bool,
}

/// Serializing client for the single device behind the gateway.
///
/// Cloning is cheap; all clones share the same mirror and lock.
#[derive(Clone)]
pub struct Gateway {
    session: Arc<Mutex<Session>>,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl Gateway {
    /// Gateway over `transport` with the given retry policy.
    pub fn new<T: Transport + 'static>(transport: T, retry: RetryPolicy) -> Self {
        Self::with_shared_transport(Arc::new(transport), retry)
    }

    /// Gateway over an already shared transport.
    pub fn with_shared_transport(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session {
                validator: CommandValidator::new(),
                synced: false,
            })),
            transport,
            retry,
        }
    }

    /// Snapshot of the current mirror.
    pub async fn mirror(&self) -> HardwareMirror {
        self.session.lock().await.validator.mirror().clone()
    }

    /// Whether startup resynchronization has run.
    pub async fn is_synced(&self) -> bool {
        self.session.lock().await.synced
    }

    /// Validate `raw`, deliver it to the device and reconcile the mirror.
    pub async fn dispatch(&self, raw: &str) -> Reply {
        let gateway = self.clone();
        let raw = raw.to_string();
        match tokio::spawn(async move { gateway.dispatch_serialized(&raw).await }).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "dispatch task failed");
                Reply::TimeoutError
            }
        }
    }

    async fn dispatch_serialized(&self, raw: &str) -> Reply {
        let mut session = self.session.lock().await;
        if !session.synced {
            self.resync(&mut session.validator).await;
            session.synced = true;
        }
        let validator = &mut session.validator;

        let command = match Command::parse(raw) {
            Ok(command) => command,
            Err(e) => {
                warn!(command = raw, error = %e, "rejecting command");
                return Reply::ValidationError;
            }
        };

        if !validator.validate_operation(command.verb) {
            warn!(command = raw, state = %validator.get_state(), "operation not allowed in current state");
            return Reply::OperationError;
        }

        let snapshot = validator.mirror().clone();
        if !validator.validate(&command) {
            warn!(command = raw, state = %validator.get_state(), "invalid command or parameter");
            return Reply::ValidationError;
        }

        let deadline = timeout_for(command.verb, validator.photometric_mode());
        match self.exchange(command.raw(), deadline).await {
            Ok(body) => {
                debug!(command = raw, reply = %body, "device replied");
                self.record(validator, &command, &body).await;
                Reply::Response(body)
            }
            Err(TransportError::Rejected { status, body, .. }) => {
                validator.restore(snapshot);
                warn!(command = raw, status, reply = %body, "device rejected command");
                Reply::Response(body)
            }
            Err(e) => {
                validator.restore(snapshot);
                error!(
                    command = raw,
                    attempts = self.retry.max_attempts,
                    deadline_ms = deadline.as_millis() as u64,
                    error = %e,
                    "retries exhausted, resetting device"
                );
                self.best_effort_reset(validator).await;
                Reply::TimeoutError
            }
        }
    }

    async fn exchange(&self, command: &str, deadline: Duration) -> Result<String, TransportError> {
        self.retry
            .run(command, |_| self.transport.send(command, deadline))
            .await
    }

    /// Pull authoritative configuration and state from the device.
    async fn resync(&self, validator: &mut CommandValidator) {
        info!(transport = self.transport.name(), "synchronizing mirror with device");

        match self.exchange("set_state=config", timeout_for(Verb::SetState, validator.photometric_mode())).await {
            Ok(_) => {
                validator.set_state(OperatingState::Config);
                for param in [ConfigParameter::PhotometricMode, ConfigParameter::LedPattern] {
                    self.read_config(validator, param).await;
                }
            }
            Err(e) => warn!(error = %e, "could not enter config state, keeping default configuration"),
        }

        match self.exchange("set_state=idle", timeout_for(Verb::SetState, validator.photometric_mode())).await {
            Ok(_) => {
                validator.set_state(OperatingState::Idle);
            }
            Err(e) => warn!(error = %e, "could not return device to idle"),
        }

        self.refresh_state(validator).await;

        info!(
            state = %validator.get_state(),
            photometric_mode = validator.get_config("photometric_mode"),
            led_pattern = validator.get_config("led_pattern"),
            "mirror synchronized"
        );
    }

    async fn read_config(&self, validator: &mut CommandValidator, param: ConfigParameter) {
        let command = format!("get_config={param}");
        match self.exchange(&command, timeout_for(Verb::GetConfig, validator.photometric_mode())).await {
            Ok(body) => self.record_config(validator, param, &body),
            Err(e) => warn!(%param, error = %e, "could not read configuration"),
        }
    }

    fn record_config(&self, validator: &mut CommandValidator, param: ConfigParameter, body: &str) {
        match value_from_response(body) {
            Some(value) => {
                if !validator.set_config(param, value) {
                    warn!(%param, value, "device reported a value the rules reject, keeping mirror");
                }
            }
            None => warn!(%param, reply = body, "malformed configuration reply, keeping mirror"),
        }
    }

    async fn refresh_state(&self, validator: &mut CommandValidator) {
        match self.exchange("get_state", timeout_for(Verb::GetState, validator.photometric_mode())).await {
            Ok(body) => self.record_state(validator, &body),
            Err(e) => warn!(error = %e, "could not read device state"),
        }
    }

    fn record_state(&self, validator: &mut CommandValidator, body: &str) {
        match value_from_response(body) {
            Some(reported) if validator.sync_state(reported) => {
                debug!(state = reported, "device state recorded");
            }
            _ => warn!(reply = body, "malformed state reply, keeping mirror"),
        }
    }

    /// Bring the mirror in line with a command the device just acknowledged.
    async fn record(&self, validator: &mut CommandValidator, command: &Command, body: &str) {
        match command.verb {
            verb if verb.changes_state() => self.refresh_state(validator).await,
            Verb::GetState => self.record_state(validator, body),
            Verb::GetConfig => {
                if let Some(param) = command
                    .param
                    .as_deref()
                    .and_then(|name| name.parse::<ConfigParameter>().ok())
                {
                    self.record_config(validator, param, body);
                }
            }
            // set_config was applied to the mirror when it was validated.
            _ => {}
        }
    }

    async fn best_effort_reset(&self, validator: &mut CommandValidator) {
        let deadline = timeout_for(Verb::Reset, validator.photometric_mode());
        match self.transport.send("reset", deadline).await {
            Ok(_) => {
                info!("device reset after failed command");
                self.refresh_state(validator).await;
            }
            Err(e) => warn!(error = %e, "best-effort reset failed"),
        }
    }
}
