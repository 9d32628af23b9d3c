//! Schedulable units and the context they run in.
//!
//! Two kinds of unit exist:
//!
//! - [`ReactiveUnit`]: runs to completion every time one of its static
//!   triggers fires. It has no suspension points.
//! - [`SequentialUnit`]: an explicit state machine. Each call to
//!   [`resume`](SequentialUnit::resume) runs until the next suspension point
//!   and returns the [`Wait`] describing when it wants to run again. The
//!   reason for each resumption is passed in as a [`WokenBy`] tag.

use std::fmt;

use crate::error::SimError;
use crate::signal::{Driver, EventId, Signal, SignalState, SignalValue, Trigger};
use crate::time::SimTime;

/// A module instance: the writer role that owns output signals and units.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct InstanceId(u32);

impl InstanceId {
    /// Creates an `InstanceId` from a raw index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// Registration-order index of a unit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct UnitId(u32);

impl UnitId {
    /// Creates a `UnitId` from a raw index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// Why a sequential unit was resumed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WokenBy {
    /// First activation at the start of the run.
    Start,
    /// The first trigger of the active wait (in list order) that fired.
    Trigger(Trigger),
    /// The wait's duration elapsed before any trigger fired.
    Timeout,
}

/// The suspension a sequential unit asks for when it yields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Wait {
    /// Wait on the static sensitivity given at registration.
    Static,
    /// Wait on an explicit trigger set.
    Any(Vec<Trigger>),
    /// Wait for a fixed duration in femtoseconds.
    Delay(u64),
    /// Static sensitivity raced against a timeout.
    StaticOrTimeout(u64),
    /// Explicit triggers raced against a timeout.
    AnyOrTimeout(Vec<Trigger>, u64),
    /// Never resume again.
    Exit,
}

/// Behavior that fires instantly and fully on each trigger.
pub trait ReactiveUnit {
    /// Runs the unit body once.
    fn react(&mut self, ctx: &mut UnitContext<'_>) -> Result<(), SimError>;
}

/// Behavior that suspends at explicit points and resumes later.
pub trait SequentialUnit {
    /// Runs from the last suspension point to the next one.
    fn resume(&mut self, ctx: &mut UnitContext<'_>, woken: WokenBy) -> Result<Wait, SimError>;
}

/// Everything a unit may touch while it runs.
///
/// Reads return committed values; writes and notifications are staged and
/// take effect after the current evaluate phase.
pub struct UnitContext<'k> {
    pub(crate) unit_name: &'k str,
    pub(crate) instance: InstanceId,
    pub(crate) now: SimTime,
    pub(crate) signals: &'k mut [SignalState],
    pub(crate) notifications: &'k mut Vec<(EventId, u64)>,
    pub(crate) transcript: &'k mut Vec<String>,
    pub(crate) stop_requested: &'k mut bool,
}

impl UnitContext<'_> {
    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Name of the running unit (`instance.unit`).
    pub fn name(&self) -> &str {
        self.unit_name
    }

    /// Reads the committed value of a signal.
    ///
    /// # Panics
    ///
    /// Panics if `signal` was created by a different kernel.
    pub fn read<T: SignalValue>(&self, signal: Signal<T>) -> T {
        T::from_bits(self.signals[signal.id().as_raw() as usize].value)
    }

    /// Stages a write. Only the instance bound as the signal's driver may write it.
    pub fn write<T: SignalValue>(&mut self, signal: Signal<T>, value: T) -> Result<(), SimError> {
        let raw = signal.id().as_raw();
        let Some(state) = self.signals.get_mut(raw as usize) else {
            return Err(SimError::InvalidSignalRef {
                reason: format!("unit '{}' wrote unknown signal {raw}", self.unit_name),
            });
        };
        if state.driver != Some(Driver::Instance(self.instance)) {
            return Err(SimError::IllegalWrite {
                unit: self.unit_name.to_string(),
                signal: state.name.clone(),
            });
        }
        state.stage(value.to_bits());
        Ok(())
    }

    /// Schedules delivery of `event` after `delay_fs`.
    ///
    /// A zero delay delivers in the next delta of the current instant.
    pub fn notify(&mut self, event: EventId, delay_fs: u64) {
        self.notifications.push((event, delay_fs));
    }

    /// Requests the scheduler to stop once the current delta completes.
    pub fn stop(&mut self) {
        *self.stop_requested = true;
    }

    /// Appends a line to the run transcript.
    pub fn display(&mut self, message: impl fmt::Display) {
        let line = format!("@{}: {message}", self.now.instant());
        tracing::info!(unit = self.unit_name, time = %self.now, "{message}");
        self.transcript.push(line);
    }

    /// Appends a line to the run transcript without the time prefix.
    pub fn print(&mut self, message: impl fmt::Display) {
        let line = message.to_string();
        tracing::info!(unit = self.unit_name, time = %self.now, "{line}");
        self.transcript.push(line);
    }

    /// Appends a warning line to the run transcript.
    pub fn warn(&mut self, message: impl fmt::Display) {
        let line = format!("@{}: warning: {message}", self.now.instant());
        tracing::warn!(unit = self.unit_name, time = %self.now, "{message}");
        self.transcript.push(line);
    }
}
