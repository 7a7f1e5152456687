//! Per-command deadlines.
//!
//! | Command | Deadline |
//! |---|---|
//! | `reset` | 2000 ms |
//! | `trigger`, `get_frame` with `photometric_mode:0` | 3000 ms |
//! | `trigger`, `get_frame` with `photometric_mode:1` | 4500 ms |
//! | everything else | 150 ms |
//!
//! Inspection (trigger acknowledged until the frame buffer is ready) takes
//! 2.0-3.0 s with photometric mode off and 3.5-4.5 s with it on. Capture
//! deadlines bound the slow end of each range.

use crate::validator::{PhotometricMode, Verb};
use std::time::Duration;

/// Deadline for `reset`.
pub const RESET_TIMEOUT: Duration = Duration::from_millis(2000);
/// Deadline for capture verbs with photometric mode off.
pub const CAPTURE_TIMEOUT: Duration = Duration::from_millis(3000);
/// Deadline for capture verbs with photometric mode on.
pub const PHOTOMETRIC_CAPTURE_TIMEOUT: Duration = Duration::from_millis(4500);
/// Deadline for every other command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(150);

/// Deadline for `verb` given the mirrored photometric mode.
pub fn timeout_for(verb: Verb, mode: PhotometricMode) -> Duration {
    match (verb, mode) {
        (Verb::Reset, _) => RESET_TIMEOUT,
        (Verb::Trigger | Verb::GetFrame, PhotometricMode::Off) => CAPTURE_TIMEOUT,
        (Verb::Trigger | Verb::GetFrame, PhotometricMode::On) => PHOTOMETRIC_CAPTURE_TIMEOUT,
        _ => DEFAULT_TIMEOUT,
    }
}
