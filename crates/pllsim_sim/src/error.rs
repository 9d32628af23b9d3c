//! Simulation error types for the discrete-event kernel.
//!
//! Wiring errors are reported while the model is being elaborated, before
//! simulated time advances. Everything else is a program error inside a unit
//! or an I/O failure of the waveform collaborator.

use std::io;

/// Errors that can occur during elaboration or execution.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A second writer role was bound to a signal that already has one.
    #[error("signal '{signal}' already driven by {existing}, cannot bind {requested}")]
    MultipleDrivers {
        /// Name of the signal.
        signal: String,
        /// The writer role already bound.
        existing: String,
        /// The writer role that attempted to bind.
        requested: String,
    },

    /// A signal has no writer role at elaboration.
    #[error("signal '{signal}' is not driven by any instance")]
    Unconnected {
        /// Name of the undriven signal.
        signal: String,
    },

    /// A unit wrote a signal that its instance does not drive.
    #[error("unit '{unit}' wrote signal '{signal}' without driving it")]
    IllegalWrite {
        /// Name of the offending unit.
        unit: String,
        /// Name of the signal.
        signal: String,
    },

    /// A reactive unit was registered with nothing to trigger it.
    #[error("reactive unit '{unit}' has an empty sensitivity list")]
    EmptySensitivity {
        /// Name of the unit.
        unit: String,
    },

    /// Clock periods must be non-zero and even in femtoseconds.
    #[error("invalid clock period for '{clock}': {period_fs} fs")]
    InvalidClockPeriod {
        /// Name of the clock.
        clock: String,
        /// The rejected period.
        period_fs: u64,
    },

    /// Wiring was attempted after the kernel started running.
    #[error("cannot {action} after elaboration")]
    ElaborationClosed {
        /// What was attempted.
        action: &'static str,
    },

    /// A trigger or handle does not refer to anything in this kernel.
    #[error("invalid signal reference: {reason}")]
    InvalidSignalRef {
        /// Description of why the reference is invalid.
        reason: String,
    },

    /// Too many delta cycles at a single instant, indicating a zero-delay loop.
    #[error("delta cycle limit exceeded at {fs} fs (max {max_deltas} deltas)")]
    DeltaCycleLimit {
        /// The time in femtoseconds where the limit was hit.
        fs: u64,
        /// The maximum number of delta cycles allowed.
        max_deltas: u32,
    },

    /// An I/O error occurred while writing waveform data.
    #[error("waveform I/O error: {0}")]
    WaveformIo(#[from] io::Error),
}
