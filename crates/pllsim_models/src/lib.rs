//! Hardware models for the PLL configuration testbench.
//!
//! - `regs`: the PLL register map and register file
//! - `pll`: the device, a bus decoder plus a timed lock sequence
//! - `pmu`: the host, a scripted bus master that waits for lock
//! - `system`: top-level wiring, waveform setup and the run report

#![warn(missing_docs)]

pub mod pll;
pub mod pmu;
pub mod regs;
pub mod system;

pub use pll::{LockState, Pll, PllParams};
pub use pmu::{Pmu, PmuParams, Verdict};
pub use regs::{PllRegister, RegisterFile, RegisterSnapshot};
pub use system::{run, RunReport, Testbench, Wires};
