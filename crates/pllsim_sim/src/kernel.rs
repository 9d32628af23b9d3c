//! Simulation kernel: wiring, timed queue, and the delta-cycle loop.
//!
//! [`SimKernel`] owns every signal, event, clock, and unit. A model is built
//! in two phases:
//!
//! 1. **Elaboration**: create signals, events, clocks, and instances, bind
//!    each output signal to exactly one writer, register units with their
//!    static sensitivity. [`SimKernel::elaborate`] checks the wiring.
//! 2. **Execution**: [`SimKernel::run`] repeats evaluate → update → wake
//!    deltas until the instant is quiescent, then [`SimKernel::advance`]s to
//!    the nearest timed entry, until a unit calls `stop()`.
//!
//! Units that become runnable in the same delta run in registration order.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap, HashSet};

use crate::error::SimError;
use crate::signal::{Driver, EventId, Signal, SignalId, SignalState, SignalValue, Trigger};
use crate::time::SimTime;
use crate::unit::{
    InstanceId, ReactiveUnit, SequentialUnit, UnitContext, UnitId, Wait, WokenBy,
};
use crate::waveform::WaveformRecorder;

/// What happens when a timed entry comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimedAction {
    /// Flip a clock and schedule its next half period.
    ClockToggle(usize),
    /// Expire a unit's wait, unless the unit has resumed since.
    Timeout { unit: usize, epoch: u64 },
    /// Deliver a delayed event notification.
    Notify(EventId),
}

/// An entry of the timed queue.
#[derive(Debug, Clone)]
struct TimedEntry {
    /// Instant in femtoseconds.
    time: u64,
    /// Insertion order, keeps same-instant entries deterministic.
    seq: u64,
    action: TimedAction,
}

impl PartialEq for TimedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for TimedEntry {}

impl PartialOrd for TimedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time).then(self.seq.cmp(&other.seq))
    }
}

/// A free-running clock owned by the kernel.
#[derive(Debug, Clone)]
struct Clock {
    signal: SignalId,
    half_period: u64,
}

enum UnitBody {
    Reactive(Box<dyn ReactiveUnit>),
    Sequential(Box<dyn SequentialUnit>),
}

/// A registered unit and its scheduling state.
struct UnitSlot {
    /// `instance.unit`, used only for diagnostics.
    name: String,
    instance: InstanceId,
    body: UnitBody,
    /// Static sensitivity given at registration.
    sensitivity: Vec<Trigger>,
    /// Triggers of the current wait; empty when not waiting on triggers.
    waiting_on: Vec<Trigger>,
    /// Bumped on every resumption so stale timeouts can be discarded.
    epoch: u64,
    exited: bool,
}

/// The result of a completed simulation run.
#[derive(Debug, Clone)]
pub struct SimResult {
    /// The simulated time when the run ended.
    pub final_time: SimTime,
    /// Whether a unit requested the stop (as opposed to a time limit or starvation).
    pub stopped_by_unit: bool,
    /// The total number of delta cycles executed.
    pub total_deltas: u64,
    /// Every line units wrote with `display` or `warn`.
    pub transcript: Vec<String>,
}

/// Outcome of a single [`SimKernel::step_delta`] or [`SimKernel::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// There may be more to do.
    Continued,
    /// Nothing left at this point (stop requested, time limit, or idle).
    Done,
}

/// The simulation kernel.
///
/// Construct with [`SimKernel::new`], wire the model, then call
/// [`run`](SimKernel::run). The kernel also exposes read-only observation of
/// every signal so that an external collaborator can sample committed values.
pub struct SimKernel {
    current_time: SimTime,
    /// Min-heap of timed entries (earliest first).
    timed_queue: BinaryHeap<Reverse<TimedEntry>>,
    next_seq: u64,
    signals: Vec<SignalState>,
    event_names: Vec<String>,
    instance_names: Vec<String>,
    clocks: Vec<Clock>,
    units: Vec<UnitSlot>,
    /// Units to run in the next evaluate phase, keyed by registration index.
    runnable: BTreeMap<usize, WokenBy>,
    recorder: Option<Box<dyn WaveformRecorder>>,
    transcript: Vec<String>,
    stop_requested: bool,
    elaborated: bool,
    /// Optional time limit in femtoseconds.
    time_limit: Option<u64>,
    /// Maximum delta cycles per instant (default 10,000).
    max_delta_per_step: u32,
    deltas_at_current_time: u32,
    total_deltas: u64,
}

impl Default for SimKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl SimKernel {
    /// Creates an empty kernel at time zero.
    pub fn new() -> Self {
        Self {
            current_time: SimTime::zero(),
            timed_queue: BinaryHeap::new(),
            next_seq: 0,
            signals: Vec::new(),
            event_names: Vec::new(),
            instance_names: Vec::new(),
            clocks: Vec::new(),
            units: Vec::new(),
            runnable: BTreeMap::new(),
            recorder: None,
            transcript: Vec::new(),
            stop_requested: false,
            elaborated: false,
            time_limit: None,
            max_delta_per_step: 10_000,
            deltas_at_current_time: 0,
            total_deltas: 0,
        }
    }

    // ---- Elaboration ----

    /// Declares a signal with an explicit initial value.
    pub fn signal<T: SignalValue>(&mut self, name: impl Into<String>, init: T) -> Signal<T> {
        let id = SignalId::from_raw(self.signals.len() as u32);
        self.signals
            .push(SignalState::new(name.into(), T::WIDTH, init.to_bits()));
        Signal::new(id)
    }

    /// Declares a one-shot wakeup event.
    pub fn event(&mut self, name: impl Into<String>) -> EventId {
        let id = EventId::from_raw(self.event_names.len() as u32);
        self.event_names.push(name.into());
        id
    }

    /// Declares a module instance, the writer role for its output signals.
    pub fn instance(&mut self, name: impl Into<String>) -> InstanceId {
        let id = InstanceId::from_raw(self.instance_names.len() as u32);
        self.instance_names.push(name.into());
        id
    }

    /// Creates a clock signal that starts low and rises at time zero, then
    /// toggles every half period.
    pub fn add_clock(
        &mut self,
        name: impl Into<String>,
        period_fs: u64,
    ) -> Result<Signal<bool>, SimError> {
        self.check_open("add a clock")?;
        let name = name.into();
        if period_fs == 0 || period_fs % 2 != 0 {
            return Err(SimError::InvalidClockPeriod {
                clock: name,
                period_fs,
            });
        }
        let signal = self.signal(name, false);
        self.signals[signal.id().as_raw() as usize].driver = Some(Driver::Clock);
        let index = self.clocks.len();
        self.clocks.push(Clock {
            signal: signal.id(),
            half_period: period_fs / 2,
        });
        self.schedule(self.current_time.fs, TimedAction::ClockToggle(index));
        Ok(signal)
    }

    /// Binds `instance` as the only writer of `signal`.
    pub fn bind_output<T: SignalValue>(
        &mut self,
        signal: Signal<T>,
        instance: InstanceId,
    ) -> Result<(), SimError> {
        self.check_open("bind an output")?;
        self.check_instance(instance)?;
        let requested = Driver::Instance(instance);
        let state = self.signal_state(signal.id())?;
        if let Some(existing) = state.driver {
            return Err(SimError::MultipleDrivers {
                signal: state.name.clone(),
                existing: self.describe_driver(existing),
                requested: self.describe_driver(requested),
            });
        }
        self.signals[signal.id().as_raw() as usize].driver = Some(requested);
        Ok(())
    }

    /// Registers a reactive unit triggered by any of `sensitivity`.
    pub fn register_reactive(
        &mut self,
        instance: InstanceId,
        name: &str,
        unit: impl ReactiveUnit + 'static,
        sensitivity: Vec<Trigger>,
    ) -> Result<UnitId, SimError> {
        let full_name = self.unit_name(instance, name)?;
        if sensitivity.is_empty() {
            return Err(SimError::EmptySensitivity { unit: full_name });
        }
        self.push_unit(
            full_name,
            instance,
            UnitBody::Reactive(Box::new(unit)),
            sensitivity,
        )
    }

    /// Registers a sequential unit. `sensitivity` is what [`Wait::Static`]
    /// waits on; the unit is first resumed with [`WokenBy::Start`].
    pub fn register_sequential(
        &mut self,
        instance: InstanceId,
        name: &str,
        unit: impl SequentialUnit + 'static,
        sensitivity: Vec<Trigger>,
    ) -> Result<UnitId, SimError> {
        let full_name = self.unit_name(instance, name)?;
        self.push_unit(
            full_name,
            instance,
            UnitBody::Sequential(Box::new(unit)),
            sensitivity,
        )
    }

    /// Attaches a waveform recorder. Signals are registered at elaboration.
    pub fn set_recorder(&mut self, recorder: Box<dyn WaveformRecorder>) {
        self.recorder = Some(recorder);
    }

    /// Sets an absolute time limit in femtoseconds.
    pub fn set_time_limit(&mut self, limit_fs: u64) {
        self.time_limit = Some(limit_fs);
    }

    /// Sets the maximum number of delta cycles per instant.
    pub fn set_max_delta(&mut self, max: u32) {
        self.max_delta_per_step = max;
    }

    /// Checks the wiring and prepares the first evaluate phase.
    ///
    /// Every signal must have a writer. Called automatically by
    /// [`run`](SimKernel::run); calling it again is a no-op.
    pub fn elaborate(&mut self) -> Result<(), SimError> {
        if self.elaborated {
            return Ok(());
        }
        if let Some(undriven) = self.signals.iter().find(|s| s.driver.is_none()) {
            return Err(SimError::Unconnected {
                signal: undriven.name.clone(),
            });
        }

        if let Some(rec) = &mut self.recorder {
            rec.begin_scope("top")?;
            for (index, sig) in self.signals.iter().enumerate() {
                rec.register_signal(SignalId::from_raw(index as u32), &sig.name, sig.width)?;
            }
            rec.end_scope()?;
            for (index, sig) in self.signals.iter().enumerate() {
                rec.record_change(
                    self.current_time.fs,
                    SignalId::from_raw(index as u32),
                    sig.value,
                )?;
            }
        }

        for (index, slot) in self.units.iter().enumerate() {
            if matches!(slot.body, UnitBody::Sequential(_)) {
                self.runnable.insert(index, WokenBy::Start);
            }
        }

        self.elaborated = true;
        tracing::debug!(
            signals = self.signals.len(),
            units = self.units.len(),
            clocks = self.clocks.len(),
            "elaborated"
        );
        Ok(())
    }

    // ---- Observation ----

    /// Returns the current simulation time.
    pub fn current_time(&self) -> SimTime {
        self.current_time
    }

    /// Returns the committed value of a signal.
    ///
    /// # Panics
    ///
    /// Panics if `signal` was created by a different kernel. Use
    /// [`signal_bits`](Self::signal_bits) for unchecked IDs.
    pub fn value<T: SignalValue>(&self, signal: Signal<T>) -> T {
        T::from_bits(self.signals[signal.id().as_raw() as usize].value)
    }

    /// Returns the committed raw bits of a signal.
    pub fn signal_bits(&self, id: SignalId) -> Option<u64> {
        self.signals.get(id.as_raw() as usize).map(|s| s.value)
    }

    /// Finds a signal by name.
    pub fn find_signal(&self, name: &str) -> Option<SignalId> {
        self.signals
            .iter()
            .position(|s| s.name == name)
            .map(|i| SignalId::from_raw(i as u32))
    }

    /// Iterates over all signals with their IDs.
    pub fn signals(&self) -> impl Iterator<Item = (SignalId, &SignalState)> {
        self.signals
            .iter()
            .enumerate()
            .map(|(i, s)| (SignalId::from_raw(i as u32), s))
    }

    /// Returns the number of signals.
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Returns the number of registered units.
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Returns the transcript collected so far.
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// Whether a unit has requested the stop.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    // ---- Execution ----

    /// Elaborates if needed and runs until a unit stops the simulation, the
    /// time limit is reached, or nothing is left to schedule.
    pub fn run(&mut self) -> Result<SimResult, SimError> {
        self.elaborate()?;
        self.run_instant()?;
        while self.advance()? == StepResult::Continued {}

        if let Some(rec) = &mut self.recorder {
            rec.finalize()?;
        }
        tracing::debug!(
            time = %self.current_time,
            deltas = self.total_deltas,
            stopped = self.stop_requested,
            "simulation ended"
        );

        Ok(SimResult {
            final_time: self.current_time,
            stopped_by_unit: self.stop_requested,
            total_deltas: self.total_deltas,
            transcript: self.transcript.clone(),
        })
    }

    /// Executes one evaluate → update → wake round in the current instant.
    pub fn step_delta(&mut self) -> Result<StepResult, SimError> {
        if self.stop_requested || self.runnable.is_empty() {
            return Ok(StepResult::Done);
        }

        let notifications = self.evaluate()?;
        let mut fired = self.update()?;
        for (event, delay) in notifications {
            if delay == 0 {
                if !fired.contains(&Trigger::Event(event)) {
                    fired.push(Trigger::Event(event));
                }
            } else {
                let at = self.current_time.after(delay);
                self.schedule(at, TimedAction::Notify(event));
            }
        }

        self.current_time = self.current_time.next_delta();
        self.total_deltas += 1;
        self.deltas_at_current_time += 1;
        if self.deltas_at_current_time >= self.max_delta_per_step {
            return Err(SimError::DeltaCycleLimit {
                fs: self.current_time.fs,
                max_deltas: self.max_delta_per_step,
            });
        }

        self.wake(&fired);
        Ok(StepResult::Continued)
    }

    /// Runs deltas until nothing is runnable in the current instant.
    pub fn run_instant(&mut self) -> Result<(), SimError> {
        while self.step_delta()? == StepResult::Continued {}
        Ok(())
    }

    /// Moves to the nearest pending timed entry, delivers every entry due at
    /// that instant, and runs the instant to quiescence.
    pub fn advance(&mut self) -> Result<StepResult, SimError> {
        self.elaborate()?;
        self.run_instant()?;
        if self.stop_requested {
            return Ok(StepResult::Done);
        }

        let Some(Reverse(head)) = self.timed_queue.peek() else {
            return Ok(StepResult::Done);
        };
        let next_fs = head.time;
        if self.time_limit.is_some_and(|limit| next_fs > limit) {
            return Ok(StepResult::Done);
        }

        if next_fs > self.current_time.fs {
            self.current_time = self.current_time.advance_to(next_fs);
            self.deltas_at_current_time = 0;
            tracing::trace!(time = %self.current_time, "advance");
        }

        let mut events = Vec::new();
        while self
            .timed_queue
            .peek()
            .is_some_and(|Reverse(e)| e.time == next_fs)
        {
            let Some(Reverse(entry)) = self.timed_queue.pop() else {
                break;
            };
            match entry.action {
                TimedAction::ClockToggle(index) => {
                    let Clock {
                        signal,
                        half_period,
                    } = self.clocks[index].clone();
                    let state = &mut self.signals[signal.as_raw() as usize];
                    state.stage(state.value ^ 1);
                    self.schedule(next_fs.saturating_add(half_period), entry.action);
                }
                TimedAction::Timeout { unit, epoch } => {
                    let slot = &mut self.units[unit];
                    if slot.epoch == epoch && !slot.exited {
                        slot.waiting_on.clear();
                        slot.epoch += 1;
                        self.runnable.insert(unit, WokenBy::Timeout);
                    }
                }
                TimedAction::Notify(event) => {
                    if !events.contains(&Trigger::Event(event)) {
                        events.push(Trigger::Event(event));
                    }
                }
            }
        }

        let mut fired = self.update()?;
        fired.extend(events);
        self.wake(&fired);
        self.run_instant()?;
        Ok(StepResult::Continued)
    }

    /// Runs every runnable unit once, in registration order.
    fn evaluate(&mut self) -> Result<Vec<(EventId, u64)>, SimError> {
        let batch = std::mem::take(&mut self.runnable);
        let mut notifications = Vec::new();
        let mut suspensions = Vec::new();

        for (index, woken) in batch {
            let UnitSlot {
                name,
                instance,
                body,
                ..
            } = &mut self.units[index];
            let mut ctx = UnitContext {
                unit_name: name.as_str(),
                instance: *instance,
                now: self.current_time,
                signals: &mut self.signals,
                notifications: &mut notifications,
                transcript: &mut self.transcript,
                stop_requested: &mut self.stop_requested,
            };
            match body {
                UnitBody::Reactive(unit) => unit.react(&mut ctx)?,
                UnitBody::Sequential(unit) => {
                    let wait = unit.resume(&mut ctx, woken)?;
                    suspensions.push((index, wait));
                }
            }
        }

        for (index, wait) in suspensions {
            self.suspend(index, wait)?;
        }
        Ok(notifications)
    }

    /// Commits staged writes and returns the triggers they produce.
    fn update(&mut self) -> Result<Vec<Trigger>, SimError> {
        let mut fired = Vec::new();
        for (index, sig) in self.signals.iter_mut().enumerate() {
            if !sig.has_pending() {
                continue;
            }
            let id = SignalId::from_raw(index as u32);
            if sig.commit(id, &mut fired) {
                if let Some(rec) = &mut self.recorder {
                    rec.record_change(self.current_time.fs, id, sig.value)?;
                }
            }
        }
        Ok(fired)
    }

    /// Marks units whose sensitivity or active wait matches `fired` as runnable.
    fn wake(&mut self, fired: &[Trigger]) {
        if fired.is_empty() {
            return;
        }
        let fired: HashSet<Trigger> = fired.iter().copied().collect();
        for (index, slot) in self.units.iter_mut().enumerate() {
            if slot.exited || self.runnable.contains_key(&index) {
                continue;
            }
            let candidates = match slot.body {
                UnitBody::Reactive(_) => &slot.sensitivity,
                UnitBody::Sequential(_) => &slot.waiting_on,
            };
            let Some(&hit) = candidates.iter().find(|t| fired.contains(t)) else {
                continue;
            };
            if matches!(slot.body, UnitBody::Sequential(_)) {
                slot.waiting_on.clear();
                slot.epoch += 1;
            }
            self.runnable.insert(index, WokenBy::Trigger(hit));
        }
    }

    /// Records the wait a sequential unit yielded.
    fn suspend(&mut self, index: usize, wait: Wait) -> Result<(), SimError> {
        let (triggers, timeout) = match wait {
            Wait::Static => (self.units[index].sensitivity.clone(), None),
            Wait::Any(triggers) => (triggers, None),
            Wait::Delay(d) => (Vec::new(), Some(d)),
            Wait::StaticOrTimeout(d) => (self.units[index].sensitivity.clone(), Some(d)),
            Wait::AnyOrTimeout(triggers, d) => (triggers, Some(d)),
            Wait::Exit => {
                let slot = &mut self.units[index];
                slot.exited = true;
                slot.waiting_on.clear();
                return Ok(());
            }
        };
        self.check_triggers(&triggers)?;

        let slot = &mut self.units[index];
        slot.epoch += 1;
        slot.waiting_on = triggers;
        let epoch = slot.epoch;
        if let Some(d) = timeout {
            let at = self.current_time.after(d);
            self.schedule(at, TimedAction::Timeout { unit: index, epoch });
        }
        Ok(())
    }

    fn schedule(&mut self, time: u64, action: TimedAction) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timed_queue
            .push(Reverse(TimedEntry { time, seq, action }));
    }

    fn push_unit(
        &mut self,
        name: String,
        instance: InstanceId,
        body: UnitBody,
        sensitivity: Vec<Trigger>,
    ) -> Result<UnitId, SimError> {
        self.check_open("register a unit")?;
        self.check_triggers(&sensitivity)?;
        let id = UnitId::from_raw(self.units.len() as u32);
        self.units.push(UnitSlot {
            name,
            instance,
            body,
            sensitivity,
            waiting_on: Vec::new(),
            epoch: 0,
            exited: false,
        });
        Ok(id)
    }

    fn unit_name(&self, instance: InstanceId, name: &str) -> Result<String, SimError> {
        self.check_instance(instance)?;
        Ok(format!(
            "{}.{name}",
            self.instance_names[instance.as_raw() as usize]
        ))
    }

    fn check_open(&self, action: &'static str) -> Result<(), SimError> {
        if self.elaborated {
            Err(SimError::ElaborationClosed { action })
        } else {
            Ok(())
        }
    }

    fn check_instance(&self, instance: InstanceId) -> Result<(), SimError> {
        if (instance.as_raw() as usize) < self.instance_names.len() {
            Ok(())
        } else {
            Err(SimError::InvalidSignalRef {
                reason: format!("unknown instance {}", instance.as_raw()),
            })
        }
    }

    fn signal_state(&self, id: SignalId) -> Result<&SignalState, SimError> {
        self.signals
            .get(id.as_raw() as usize)
            .ok_or_else(|| SimError::InvalidSignalRef {
                reason: format!("unknown signal {}", id.as_raw()),
            })
    }

    fn check_triggers(&self, triggers: &[Trigger]) -> Result<(), SimError> {
        for trigger in triggers {
            match *trigger {
                Trigger::Changed(id) => {
                    self.signal_state(id)?;
                }
                Trigger::Rose(id) | Trigger::Fell(id) => {
                    let state = self.signal_state(id)?;
                    if state.width != 1 {
                        return Err(SimError::InvalidSignalRef {
                            reason: format!(
                                "edge trigger on {}-bit signal '{}'",
                                state.width, state.name
                            ),
                        });
                    }
                }
                Trigger::Event(event) => {
                    if event.as_raw() as usize >= self.event_names.len() {
                        return Err(SimError::InvalidSignalRef {
                            reason: format!("unknown event {}", event.as_raw()),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn describe_driver(&self, driver: Driver) -> String {
        match driver {
            Driver::Clock => "a clock".to_string(),
            Driver::Instance(id) => {
                format!("instance '{}'", self.instance_names[id.as_raw() as usize])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pllsim_common::FS_PER_NS;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(u64, WokenBy)>>>;

    /// Records every resumption, then yields the next wait from a script.
    struct Scripted {
        log: Log,
        waits: Vec<Wait>,
    }

    impl SequentialUnit for Scripted {
        fn resume(&mut self, ctx: &mut UnitContext<'_>, woken: WokenBy) -> Result<Wait, SimError> {
            self.log.borrow_mut().push((ctx.now().to_ns(), woken));
            if self.waits.is_empty() {
                ctx.stop();
                return Ok(Wait::Exit);
            }
            Ok(self.waits.remove(0))
        }
    }

    /// Copies `input` to `output` whenever `input` changes.
    struct Follower {
        input: Signal<u32>,
        output: Signal<u32>,
    }

    impl ReactiveUnit for Follower {
        fn react(&mut self, ctx: &mut UnitContext<'_>) -> Result<(), SimError> {
            let v = ctx.read(self.input);
            ctx.write(self.output, v)
        }
    }

    /// Writes `value` to `target` on start, then records what it reads back
    /// in the same resumption and in the next delta.
    struct WriteThenRead {
        target: Signal<u32>,
        seen: Rc<RefCell<Vec<u32>>>,
    }

    impl SequentialUnit for WriteThenRead {
        fn resume(&mut self, ctx: &mut UnitContext<'_>, woken: WokenBy) -> Result<Wait, SimError> {
            match woken {
                WokenBy::Start => {
                    ctx.write(self.target, 7)?;
                    self.seen.borrow_mut().push(ctx.read(self.target));
                    Ok(Wait::Any(vec![self.target.changed()]))
                }
                _ => {
                    self.seen.borrow_mut().push(ctx.read(self.target));
                    ctx.stop();
                    Ok(Wait::Exit)
                }
            }
        }
    }

    fn scripted(log: &Log, waits: Vec<Wait>) -> Scripted {
        Scripted {
            log: log.clone(),
            waits,
        }
    }

    #[test]
    fn kernel_starts_at_zero() {
        let kernel = SimKernel::new();
        assert_eq!(kernel.current_time(), SimTime::zero());
        assert_eq!(kernel.signal_count(), 0);
        assert_eq!(kernel.unit_count(), 0);
    }

    #[test]
    fn find_signal_by_name() {
        let mut kernel = SimKernel::new();
        kernel.signal("a", false);
        let b = kernel.signal("b", 3u32);
        assert_eq!(kernel.find_signal("b"), Some(b.id()));
        assert_eq!(kernel.find_signal("zzz"), None);
        assert_eq!(kernel.value(b), 3);
        assert_eq!(kernel.signal_bits(b.id()), Some(3));
    }

    #[test]
    fn second_driver_is_rejected() {
        let mut kernel = SimKernel::new();
        let sig = kernel.signal("locked", false);
        let a = kernel.instance("pll_inst");
        let b = kernel.instance("pmu_inst");
        kernel.bind_output(sig, a).unwrap();
        let err = kernel.bind_output(sig, b).unwrap_err();
        assert!(matches!(err, SimError::MultipleDrivers { .. }));
        assert!(err.to_string().contains("pll_inst"));
    }

    #[test]
    fn clock_cannot_be_rebound() {
        let mut kernel = SimKernel::new();
        let clk = kernel.add_clock("clk", 10 * FS_PER_NS).unwrap();
        let inst = kernel.instance("tb");
        let err = kernel.bind_output(clk, inst).unwrap_err();
        assert!(err.to_string().contains("a clock"));
    }

    #[test]
    fn undriven_signal_fails_elaboration() {
        let mut kernel = SimKernel::new();
        kernel.signal("bus_we", false);
        let err = kernel.elaborate().unwrap_err();
        assert!(matches!(err, SimError::Unconnected { ref signal } if signal == "bus_we"));
        assert_eq!(kernel.current_time(), SimTime::zero());
    }

    #[test]
    fn odd_clock_period_rejected() {
        let mut kernel = SimKernel::new();
        assert!(matches!(
            kernel.add_clock("clk", 3),
            Err(SimError::InvalidClockPeriod { .. })
        ));
        assert!(kernel.add_clock("clk0", 0).is_err());
    }

    #[test]
    fn reactive_unit_needs_sensitivity() {
        let mut kernel = SimKernel::new();
        let inst = kernel.instance("dut");
        let input = kernel.signal("in", 0u32);
        let output = kernel.signal("out", 0u32);
        let err = kernel
            .register_reactive(inst, "follow", Follower { input, output }, vec![])
            .unwrap_err();
        assert!(matches!(err, SimError::EmptySensitivity { .. }));
    }

    #[test]
    fn edge_trigger_on_wide_signal_rejected() {
        let mut kernel = SimKernel::new();
        let inst = kernel.instance("dut");
        let wide = kernel.signal("addr", 0u32);
        let log = Log::default();
        let err = kernel
            .register_sequential(
                inst,
                "seq",
                scripted(&log, vec![]),
                vec![Trigger::Rose(wide.id())],
            )
            .unwrap_err();
        assert!(err.to_string().contains("edge trigger on 32-bit"));
    }

    #[test]
    fn wiring_closed_after_elaboration() {
        let mut kernel = SimKernel::new();
        kernel.elaborate().unwrap();
        let inst = kernel.instance("late");
        let log = Log::default();
        let err = kernel
            .register_sequential(inst, "seq", scripted(&log, vec![]), vec![])
            .unwrap_err();
        assert!(matches!(err, SimError::ElaborationClosed { .. }));
    }

    #[test]
    fn write_is_visible_only_next_delta() {
        let mut kernel = SimKernel::new();
        let inst = kernel.instance("tb");
        let target = kernel.signal("target", 0u32);
        kernel.bind_output(target, inst).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        kernel
            .register_sequential(
                inst,
                "writer",
                WriteThenRead {
                    target,
                    seen: seen.clone(),
                },
                vec![],
            )
            .unwrap();
        let result = kernel.run().unwrap();
        assert_eq!(*seen.borrow(), vec![0, 7]);
        assert!(result.stopped_by_unit);
        assert_eq!(result.final_time.fs, 0);
    }

    #[test]
    fn illegal_write_is_an_error() {
        let mut kernel = SimKernel::new();
        let owner = kernel.instance("owner");
        let other = kernel.instance("other");
        let target = kernel.signal("target", 0u32);
        kernel.bind_output(target, owner).unwrap();
        kernel
            .register_sequential(
                other,
                "writer",
                WriteThenRead {
                    target,
                    seen: Rc::default(),
                },
                vec![],
            )
            .unwrap();
        let err = kernel.run().unwrap_err();
        assert!(matches!(err, SimError::IllegalWrite { ref unit, .. } if unit == "other.writer"));
    }

    #[test]
    fn foreign_handle_write_is_an_error() {
        let mut kernel = SimKernel::new();
        let inst = kernel.instance("tb");
        let own = kernel.signal("own", 0u32);
        kernel.bind_output(own, inst).unwrap();
        let foreign: Signal<u32> = Signal::new(SignalId::from_raw(9));
        kernel
            .register_sequential(
                inst,
                "writer",
                WriteThenRead {
                    target: foreign,
                    seen: Rc::default(),
                },
                vec![],
            )
            .unwrap();
        let err = kernel.run().unwrap_err();
        assert!(matches!(err, SimError::InvalidSignalRef { ref reason } if reason.contains("tb.writer")));
    }

    #[test]
    fn clock_rises_at_zero_and_every_period() {
        let mut kernel = SimKernel::new();
        let clk = kernel.add_clock("clk", 10 * FS_PER_NS).unwrap();
        let inst = kernel.instance("tb");
        let log = Log::default();
        kernel
            .register_sequential(
                inst,
                "edges",
                scripted(&log, vec![Wait::Static, Wait::Static, Wait::Static]),
                vec![clk.rose()],
            )
            .unwrap();
        kernel.run().unwrap();
        let times: Vec<u64> = log.borrow().iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![0, 0, 10, 20]);
        assert_eq!(log.borrow()[1].1, WokenBy::Trigger(clk.rose()));
    }

    #[test]
    fn delay_resumes_with_timeout() {
        let mut kernel = SimKernel::new();
        let inst = kernel.instance("tb");
        let log = Log::default();
        kernel
            .register_sequential(
                inst,
                "sleeper",
                scripted(&log, vec![Wait::Delay(500 * FS_PER_NS)]),
                vec![],
            )
            .unwrap();
        let result = kernel.run().unwrap();
        assert_eq!(*log.borrow(), vec![(0, WokenBy::Start), (500, WokenBy::Timeout)]);
        assert_eq!(result.final_time.to_ns(), 500);
    }

    #[test]
    fn timeout_loses_to_earlier_trigger() {
        let mut kernel = SimKernel::new();
        let clk = kernel.add_clock("clk", 10 * FS_PER_NS).unwrap();
        let inst = kernel.instance("tb");
        let log = Log::default();
        kernel
            .register_sequential(
                inst,
                "racer",
                scripted(
                    &log,
                    vec![
                        Wait::AnyOrTimeout(vec![clk.fell()], 100 * FS_PER_NS),
                        Wait::Delay(200 * FS_PER_NS),
                    ],
                ),
                vec![],
            )
            .unwrap();
        kernel.run().unwrap();
        let log = log.borrow();
        assert_eq!(log[1], (5, WokenBy::Trigger(clk.fell())));
        // The discarded 100 ns timeout must not resume the unit early.
        assert_eq!(log[2], (205, WokenBy::Timeout));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn trigger_loses_to_earlier_timeout() {
        let mut kernel = SimKernel::new();
        let clk = kernel.add_clock("clk", 1000 * FS_PER_NS).unwrap();
        let inst = kernel.instance("tb");
        let log = Log::default();
        kernel
            .register_sequential(
                inst,
                "racer",
                scripted(&log, vec![Wait::AnyOrTimeout(vec![clk.fell()], 20 * FS_PER_NS)]),
                vec![],
            )
            .unwrap();
        kernel.run().unwrap();
        assert_eq!(log.borrow()[1], (20, WokenBy::Timeout));
    }

    #[test]
    fn zero_delay_event_is_delivered_next_delta() {
        struct Firer {
            event: EventId,
        }
        impl SequentialUnit for Firer {
            fn resume(&mut self, ctx: &mut UnitContext<'_>, _: WokenBy) -> Result<Wait, SimError> {
                ctx.notify(self.event, 0);
                Ok(Wait::Exit)
            }
        }

        let mut kernel = SimKernel::new();
        let inst = kernel.instance("tb");
        let event = kernel.event("go");
        let log = Log::default();
        kernel
            .register_sequential(inst, "firer", Firer { event }, vec![])
            .unwrap();
        kernel
            .register_sequential(inst, "waiter", scripted(&log, vec![Wait::Static]), vec![event.fired()])
            .unwrap();
        let result = kernel.run().unwrap();
        assert_eq!(
            *log.borrow(),
            vec![(0, WokenBy::Start), (0, WokenBy::Trigger(event.fired()))]
        );
        assert_eq!(result.final_time.fs, 0);
        assert!(result.final_time.delta >= 1);
    }

    #[test]
    fn delayed_event_uses_timed_queue() {
        struct Firer {
            event: EventId,
        }
        impl SequentialUnit for Firer {
            fn resume(&mut self, ctx: &mut UnitContext<'_>, _: WokenBy) -> Result<Wait, SimError> {
                ctx.notify(self.event, 42 * FS_PER_NS);
                Ok(Wait::Exit)
            }
        }

        let mut kernel = SimKernel::new();
        let inst = kernel.instance("tb");
        let event = kernel.event("later");
        let log = Log::default();
        kernel
            .register_sequential(inst, "firer", Firer { event }, vec![])
            .unwrap();
        kernel
            .register_sequential(inst, "waiter", scripted(&log, vec![Wait::Static]), vec![event.fired()])
            .unwrap();
        kernel.run().unwrap();
        assert_eq!(log.borrow()[1].0, 42);
    }

    #[test]
    fn first_listed_trigger_is_reported() {
        let mut kernel = SimKernel::new();
        let clk = kernel.add_clock("clk", 10 * FS_PER_NS).unwrap();
        let inst = kernel.instance("tb");
        let log = Log::default();
        kernel
            .register_sequential(
                inst,
                "prio",
                scripted(&log, vec![Wait::Any(vec![clk.rose(), clk.changed()])]),
                vec![],
            )
            .unwrap();
        kernel.run().unwrap();
        assert_eq!(log.borrow()[1].1, WokenBy::Trigger(clk.rose()));
    }

    #[test]
    fn reactive_units_follow_changes() {
        let mut kernel = SimKernel::new();
        let clk = kernel.add_clock("clk", 10 * FS_PER_NS).unwrap();
        let tb = kernel.instance("tb");
        let dut = kernel.instance("dut");
        let input = kernel.signal("in", 0u32);
        let output = kernel.signal("out", 0u32);
        kernel.bind_output(input, tb).unwrap();
        kernel.bind_output(output, dut).unwrap();
        kernel
            .register_reactive(dut, "follow", Follower { input, output }, vec![input.changed()])
            .unwrap();

        struct Driver0 {
            input: Signal<u32>,
            edges: u32,
        }
        impl SequentialUnit for Driver0 {
            fn resume(&mut self, ctx: &mut UnitContext<'_>, _: WokenBy) -> Result<Wait, SimError> {
                if self.edges == 3 {
                    ctx.stop();
                    return Ok(Wait::Exit);
                }
                self.edges += 1;
                ctx.write(self.input, self.edges * 10)?;
                Ok(Wait::Static)
            }
        }
        kernel
            .register_sequential(tb, "drive", Driver0 { input, edges: 0 }, vec![clk.rose()])
            .unwrap();

        kernel.run().unwrap();
        assert_eq!(kernel.value(input), 30);
        assert_eq!(kernel.value(output), 30);
    }

    #[test]
    fn time_limit_ends_run_without_stop() {
        let mut kernel = SimKernel::new();
        kernel.add_clock("clk", 10 * FS_PER_NS).unwrap();
        kernel.set_time_limit(92 * FS_PER_NS);
        let result = kernel.run().unwrap();
        assert!(!result.stopped_by_unit);
        assert_eq!(result.final_time.to_ns(), 90);
    }

    #[test]
    fn empty_kernel_runs_to_nothing() {
        let mut kernel = SimKernel::new();
        let result = kernel.run().unwrap();
        assert!(!result.stopped_by_unit);
        assert_eq!(result.total_deltas, 0);
    }

    #[test]
    fn zero_delay_loop_hits_delta_limit() {
        struct PingPong {
            event: EventId,
        }
        impl SequentialUnit for PingPong {
            fn resume(&mut self, ctx: &mut UnitContext<'_>, _: WokenBy) -> Result<Wait, SimError> {
                ctx.notify(self.event, 0);
                Ok(Wait::Static)
            }
        }

        let mut kernel = SimKernel::new();
        let inst = kernel.instance("tb");
        let event = kernel.event("loop");
        kernel
            .register_sequential(inst, "spin", PingPong { event }, vec![event.fired()])
            .unwrap();
        kernel.set_max_delta(50);
        let err = kernel.run().unwrap_err();
        assert!(matches!(err, SimError::DeltaCycleLimit { max_deltas: 50, .. }));
    }

    #[test]
    fn same_instant_units_run_in_registration_order() {
        struct Tagger {
            tag: u32,
            order: Rc<RefCell<Vec<u32>>>,
        }
        impl SequentialUnit for Tagger {
            fn resume(&mut self, _: &mut UnitContext<'_>, _: WokenBy) -> Result<Wait, SimError> {
                self.order.borrow_mut().push(self.tag);
                Ok(Wait::Exit)
            }
        }

        let mut kernel = SimKernel::new();
        let inst = kernel.instance("tb");
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in [3, 1, 2] {
            kernel
                .register_sequential(
                    inst,
                    &format!("t{tag}"),
                    Tagger {
                        tag,
                        order: order.clone(),
                    },
                    vec![],
                )
                .unwrap();
        }
        kernel.run().unwrap();
        assert_eq!(*order.borrow(), vec![3, 1, 2]);
    }
}
