//! The PMU host model.
//!
//! The host is a single sequential unit clocked by `clk` rising edges. Its
//! script is compiled into a flat list of [`Op`]s; each resumption executes
//! ops until one of them suspends. After the script the host races `locked`
//! against the lock timeout, records a [`Verdict`], waits for the end marker
//! and stops the simulation.
//!
//! Host messages go to the transcript without the `@time:` prefix the device
//! uses.

use std::cell::RefCell;
use std::rc::Rc;

use pllsim_common::{Dividers, Frequency};
use pllsim_config::{ResolvedConfig, Step};
use pllsim_sim::{
    InstanceId, SequentialUnit, SimError, SimKernel, SimTime, UnitContext, Wait, WokenBy,
};
use serde::Serialize;

use crate::regs::PllRegister;
use crate::system::Wires;

/// Outcome of the host's bounded wait for lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// `locked` rose before the timeout.
    Locked {
        /// When the host observed it.
        at: SimTime,
    },
    /// The timeout elapsed first.
    TimedOut {
        /// When the host gave up.
        at: SimTime,
    },
}

impl Verdict {
    /// `true` for [`Verdict::Locked`].
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }

    /// When the verdict was reached.
    pub fn at(&self) -> SimTime {
        match *self {
            Self::Locked { at } | Self::TimedOut { at } => at,
        }
    }
}

/// Host parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PmuParams {
    /// Divider triple written by [`Step::Program`].
    pub dividers: Dividers,
    /// Frequency the dividers were derived from, for the transcript.
    pub target: Option<Frequency>,
    /// CTRL value written by [`Step::Program`].
    pub start_code: u32,
    /// Bounded lock wait in femtoseconds.
    pub lock_timeout_fs: u64,
    /// Absolute stop time in femtoseconds.
    pub end_marker_fs: u64,
    /// Steps executed before the lock wait.
    pub script: Vec<Step>,
}

impl From<&ResolvedConfig> for PmuParams {
    fn from(config: &ResolvedConfig) -> Self {
        Self {
            dividers: config.dividers,
            target: config.target,
            start_code: config.start_code,
            lock_timeout_fs: config.lock_timeout_fs,
            end_marker_fs: config.end_marker_fs,
            script: config.script.clone(),
        }
    }
}

/// Handle to an instantiated host.
#[derive(Debug, Clone)]
pub struct Pmu {
    verdict: Rc<RefCell<Option<Verdict>>>,
}

impl Pmu {
    /// Binds the host's outputs to `instance` and registers its unit.
    pub fn instantiate(
        kernel: &mut SimKernel,
        instance: InstanceId,
        wires: Wires,
        params: &PmuParams,
    ) -> Result<Self, SimError> {
        kernel.bind_output(wires.reset, instance)?;
        kernel.bind_output(wires.bus_addr, instance)?;
        kernel.bind_output(wires.bus_wdata, instance)?;
        kernel.bind_output(wires.bus_we, instance)?;

        let verdict = Rc::new(RefCell::new(None));
        kernel.register_sequential(
            instance,
            "run_test",
            HostScript {
                wires,
                ops: compile(params),
                pc: 0,
                edges_left: 0,
                lock_timeout_fs: params.lock_timeout_fs,
                end_marker_fs: params.end_marker_fs,
                verdict: verdict.clone(),
            },
            vec![wires.clk.rose()],
        )?;
        Ok(Self { verdict })
    }

    /// The verdict, once the lock wait has resolved.
    pub fn verdict(&self) -> Option<Verdict> {
        *self.verdict.borrow()
    }
}

/// One host micro-operation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Say(String),
    Reset(bool),
    /// Drive address, data and write-enable.
    Drive { addr: u32, data: u32 },
    /// Drop write-enable.
    Release,
    /// Wait for this many rising edges.
    Edges(u32),
    AwaitLock,
    Verdict,
    AwaitEnd,
    Finish,
}

fn compile(params: &PmuParams) -> Vec<Op> {
    let mut ops = Vec::new();
    let write = |ops: &mut Vec<Op>, addr: u32, data: u32| {
        ops.push(Op::Drive { addr, data });
        ops.push(Op::Edges(1));
        ops.push(Op::Release);
    };

    for step in &params.script {
        match *step {
            Step::Settle => ops.push(Op::Edges(1)),
            Step::Reset { cycles } => {
                ops.push(Op::Say("PMU_TEST: Resetting the system...".to_string()));
                ops.push(Op::Reset(true));
                ops.push(Op::Edges(cycles));
                ops.push(Op::Reset(false));
                ops.push(Op::Edges(1));
            }
            Step::Program => {
                let d = params.dividers;
                let intro = match params.target {
                    Some(target) => format!(
                        "PMU_TEST: Starting test case: Configure PLL for {} MHz.",
                        target.mhz()
                    ),
                    None => format!("PMU_TEST: Starting test case: Program PLL with {d}."),
                };
                ops.push(Op::Say(intro));
                if params.target.is_some() {
                    ops.push(Op::Say(format!("PMU_TEST: Calculation successful. {d}")));
                }
                ops.push(Op::Say("PMU_TEST: Programming PLL registers...".to_string()));
                write(&mut ops, PllRegister::N.addr(), d.n);
                write(&mut ops, PllRegister::M.addr(), d.m);
                write(&mut ops, PllRegister::Od.addr(), d.od);
                write(&mut ops, PllRegister::Ctrl.addr(), params.start_code);
            }
            Step::Write { addr, data } => write(&mut ops, addr, data),
            Step::Idle { edges } => ops.push(Op::Edges(edges)),
        }
    }

    ops.push(Op::Say("PMU_TEST: Waiting for PLL lock signal...".to_string()));
    ops.push(Op::AwaitLock);
    ops.push(Op::Verdict);
    ops.push(Op::Say("PMU_TEST: Test finished.".to_string()));
    ops.push(Op::AwaitEnd);
    ops.push(Op::Finish);
    ops
}

/// The host's sequential unit.
struct HostScript {
    wires: Wires,
    ops: Vec<Op>,
    pc: usize,
    /// Rising edges still to wait for the current `Edges` op.
    edges_left: u32,
    lock_timeout_fs: u64,
    end_marker_fs: u64,
    verdict: Rc<RefCell<Option<Verdict>>>,
}

impl SequentialUnit for HostScript {
    fn resume(&mut self, ctx: &mut UnitContext<'_>, woken: WokenBy) -> Result<Wait, SimError> {
        if self.edges_left > 0 {
            if matches!(woken, WokenBy::Trigger(_)) {
                self.edges_left -= 1;
            }
            if self.edges_left > 0 {
                return Ok(Wait::Static);
            }
        }

        while let Some(op) = self.ops.get(self.pc).cloned() {
            self.pc += 1;
            match op {
                Op::Say(text) => ctx.print(text),
                Op::Reset(level) => ctx.write(self.wires.reset, level)?,
                Op::Drive { addr, data } => {
                    ctx.print(format_args!(
                        "  PMU_DRIVER: Wrote 0x{data:x} to address 0x{addr:x}"
                    ));
                    ctx.write(self.wires.bus_addr, addr)?;
                    ctx.write(self.wires.bus_wdata, data)?;
                    ctx.write(self.wires.bus_we, true)?;
                }
                Op::Release => ctx.write(self.wires.bus_we, false)?,
                Op::Edges(0) => {}
                Op::Edges(n) => {
                    self.edges_left = n;
                    return Ok(Wait::Static);
                }
                Op::AwaitLock => {
                    return Ok(Wait::AnyOrTimeout(
                        vec![self.wires.locked.rose()],
                        self.lock_timeout_fs,
                    ));
                }
                Op::Verdict => {
                    let at = ctx.now();
                    let verdict = if ctx.read(self.wires.locked) {
                        ctx.print("PMU_TEST: SUCCESS! PLL lock signal asserted.");
                        Verdict::Locked { at }
                    } else {
                        ctx.print("PMU_TEST: FAILED! PLL did not lock.");
                        tracing::warn!(%at, "lock wait timed out");
                        Verdict::TimedOut { at }
                    };
                    *self.verdict.borrow_mut() = Some(verdict);
                }
                Op::AwaitEnd => {
                    let remaining = self.end_marker_fs.saturating_sub(ctx.now().fs);
                    if remaining > 0 {
                        return Ok(Wait::Delay(remaining));
                    }
                }
                Op::Finish => {
                    ctx.stop();
                    return Ok(Wait::Exit);
                }
            }
        }
        Ok(Wait::Exit)
    }
}
