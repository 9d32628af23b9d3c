//! The PLL device model.
//!
//! Two units share one [`PllCore`]:
//!
//! - `bus` (reactive, on `clk` rise and any `reset` change) decodes bus
//!   writes into the register file and arms the lock sequence when CTRL is
//!   written with 1.
//! - `lock` (sequential, on `reset` change and the wakeup event) runs the
//!   timed sequence `Idle -> Armed -> Locking -> Locked` and drives `locked`.
//!
//! Reset preempts every state: registers are zeroed, enable is cleared and
//! `locked` drops.

use std::cell::RefCell;
use std::rc::Rc;

use pllsim_common::{Frequency, FS_PER_NS};
use pllsim_sim::{
    EventId, InstanceId, ReactiveUnit, SequentialUnit, SimError, SimKernel, SimTime, Trigger,
    UnitContext, Wait, WokenBy,
};
use serde::Serialize;

use crate::regs::{PllRegister, RegisterFile, RegisterSnapshot};
use crate::system::Wires;

/// Observable lock sequence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    /// Reset is asserted.
    Reset,
    /// Waiting for a start command.
    Idle,
    /// Start accepted, lock sequence not yet running.
    Armed,
    /// Lock time is elapsing.
    Locking,
    /// `locked` is asserted.
    Locked,
}

/// Device parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PllParams {
    /// Reference input frequency.
    pub reference: Frequency,
    /// Time from an accepted start to `locked`, in femtoseconds.
    pub lock_time_fs: u64,
}

impl Default for PllParams {
    fn default() -> Self {
        Self {
            reference: Frequency::from_mhz(25.0),
            lock_time_fs: 500 * FS_PER_NS,
        }
    }
}

/// State shared by the two device units.
#[derive(Debug)]
struct PllCore {
    registers: RegisterFile,
    enable: bool,
    state: LockState,
    protocol_violations: u32,
    output: Option<Frequency>,
}

impl PllCore {
    fn new() -> Self {
        Self {
            registers: RegisterFile::default(),
            enable: false,
            state: LockState::Idle,
            protocol_violations: 0,
            output: None,
        }
    }
}

/// Handle to an instantiated device, for observation after or between runs.
#[derive(Debug, Clone)]
pub struct Pll {
    core: Rc<RefCell<PllCore>>,
}

impl Pll {
    /// Binds `locked` to `instance` and registers the device units.
    pub fn instantiate(
        kernel: &mut SimKernel,
        instance: InstanceId,
        wires: Wires,
        params: PllParams,
    ) -> Result<Self, SimError> {
        kernel.bind_output(wires.locked, instance)?;
        let wakeup = kernel.event("pll_inst.start_locking");
        let core = Rc::new(RefCell::new(PllCore::new()));

        kernel.register_reactive(
            instance,
            "bus",
            BusDecoder {
                wires,
                wakeup,
                core: core.clone(),
            },
            vec![wires.clk.rose(), wires.reset.changed()],
        )?;
        kernel.register_sequential(
            instance,
            "lock",
            LockSequence {
                wires,
                params,
                core: core.clone(),
            },
            vec![wires.reset.changed(), wakeup.fired()],
        )?;

        Ok(Self { core })
    }

    /// Current lock state.
    pub fn lock_state(&self) -> LockState {
        self.core.borrow().state
    }

    /// Whether CTRL last enabled the PLL.
    pub fn enabled(&self) -> bool {
        self.core.borrow().enable
    }

    /// Current register contents.
    pub fn registers(&self) -> RegisterSnapshot {
        self.core.borrow().registers.snapshot()
    }

    /// Number of ignored or inconsistent bus requests.
    pub fn protocol_violations(&self) -> u32 {
        self.core.borrow().protocol_violations
    }

    /// Output frequency computed at the last lock, if any.
    pub fn output_frequency(&self) -> Option<Frequency> {
        self.core.borrow().output
    }
}

/// The register decoder.
struct BusDecoder {
    wires: Wires,
    wakeup: EventId,
    core: Rc<RefCell<PllCore>>,
}

impl ReactiveUnit for BusDecoder {
    fn react(&mut self, ctx: &mut UnitContext<'_>) -> Result<(), SimError> {
        let mut core = self.core.borrow_mut();

        if ctx.read(self.wires.reset) {
            core.registers.clear();
            core.enable = false;
            core.state = LockState::Reset;
            for reg in PllRegister::ALL.iter().rev() {
                ctx.display(format!(
                    "PLL received write to REG[{}] with data 0x0",
                    reg.index()
                ));
            }
            return Ok(());
        }
        if core.state == LockState::Reset {
            core.state = LockState::Idle;
        }
        if !ctx.read(self.wires.bus_we) {
            return Ok(());
        }

        let addr = ctx.read(self.wires.bus_addr);
        let data = ctx.read(self.wires.bus_wdata);
        let Some(reg) = PllRegister::from_addr(addr) else {
            core.protocol_violations += 1;
            ctx.warn(format_args!(
                "PLL ignored write of 0x{data:x} to undefined address 0x{addr:x}"
            ));
            return Ok(());
        };

        core.registers.write(reg, data);
        if reg == PllRegister::Ctrl {
            if data == 1 {
                core.enable = true;
                core.state = LockState::Armed;
                ctx.notify(self.wakeup, 0);
            } else {
                core.enable = false;
                core.state = LockState::Idle;
                ctx.write(self.wires.locked, false)?;
            }
        }
        ctx.display(format!(
            "PLL received write to REG[{}] with data 0x{data:x}",
            reg.index()
        ));
        Ok(())
    }
}

/// Why the lock sequence resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockWake {
    Reset,
    Event,
    Timeout,
}

/// The timed lock sequence.
struct LockSequence {
    wires: Wires,
    params: PllParams,
    core: Rc<RefCell<PllCore>>,
}

impl LockSequence {
    fn classify(&self, woken: WokenBy) -> Option<LockWake> {
        match woken {
            WokenBy::Start => None,
            WokenBy::Trigger(Trigger::Changed(id)) if id == self.wires.reset.id() => {
                Some(LockWake::Reset)
            }
            WokenBy::Trigger(_) => Some(LockWake::Event),
            WokenBy::Timeout => Some(LockWake::Timeout),
        }
    }

    fn lock(&self, ctx: &mut UnitContext<'_>) -> Result<(), SimError> {
        let mut core = self.core.borrow_mut();
        ctx.write(self.wires.locked, true)?;
        core.state = LockState::Locked;
        ctx.display("PLL lock time elapsed.");

        match core.registers.dividers().output_frequency(self.params.reference) {
            Ok(output) => {
                core.output = Some(output);
                tracing::info!(frequency = %output, "pll output");
                ctx.display(format_args!(
                    "PLL LOCKED. Generating output clock with period {} ns.",
                    output.period_ns()
                ));
            }
            Err(e) => {
                core.output = None;
                core.protocol_violations += 1;
                ctx.warn(format_args!("PLL LOCKED without a valid output clock: {e}"));
            }
        }
        Ok(())
    }
}

impl SequentialUnit for LockSequence {
    fn resume(&mut self, ctx: &mut UnitContext<'_>, woken: WokenBy) -> Result<Wait, SimError> {
        let Some(wake) = self.classify(woken) else {
            return Ok(Wait::Static);
        };

        match wake {
            LockWake::Reset => {
                ctx.write(self.wires.locked, false)?;
                let mut core = self.core.borrow_mut();
                core.output = None;
                core.state = if ctx.read(self.wires.reset) {
                    LockState::Reset
                } else {
                    LockState::Idle
                };
                Ok(Wait::Static)
            }
            LockWake::Event => {
                if !self.core.borrow().enable {
                    return Ok(Wait::Static);
                }
                ctx.write(self.wires.locked, false)?;
                self.core.borrow_mut().state = LockState::Locking;
                ctx.display("PLL enabled. Starting lock sequence.");
                ctx.display(format_args!(
                    "PLL is in LOCKING state. Waiting for {}.",
                    SimTime::from_fs(self.params.lock_time_fs)
                ));
                Ok(Wait::StaticOrTimeout(self.params.lock_time_fs))
            }
            LockWake::Timeout => {
                if self.core.borrow().enable {
                    self.lock(ctx)?;
                }
                Ok(Wait::Static)
            }
        }
    }
}
