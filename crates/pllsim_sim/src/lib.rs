//! Discrete-event simulation kernel for small hardware models.
//!
//! The kernel runs reactive and sequential units over two-phase signals.
//! Every instant is divided into delta cycles: units run in the evaluate
//! phase, staged writes commit in the update phase, and the commits wake
//! whoever is sensitive to them. Time only moves once an instant is quiet.
//!
//! # Usage
//!
//! ```ignore
//! use pllsim_sim::SimKernel;
//!
//! let mut kernel = SimKernel::new();
//! let clk = kernel.add_clock("clk", 10_000_000)?;
//! let inst = kernel.instance("dut");
//! kernel.register_sequential(inst, "main", my_unit, vec![clk.rose()])?;
//! let result = kernel.run()?;
//! println!("Simulation ended at {}", result.final_time);
//! ```
//!
//! # Modules
//!
//! - `error`: wiring and runtime errors
//! - `time`: femtosecond time with delta cycles
//! - `signal`: typed signal cells, events, triggers
//! - `unit`: the two unit traits and their context
//! - `waveform`: VCD recording
//! - `kernel`: timed queue and delta-cycle loop

#![warn(missing_docs)]

pub mod error;
pub mod kernel;
pub mod signal;
pub mod time;
pub mod unit;
pub mod waveform;

pub use error::SimError;
pub use kernel::{SimKernel, SimResult, StepResult};
pub use signal::{Driver, EventId, Signal, SignalId, SignalState, SignalValue, Trigger};
pub use time::SimTime;
pub use unit::{
    InstanceId, ReactiveUnit, SequentialUnit, UnitContext, UnitId, Wait, WokenBy,
};
pub use waveform::{VcdRecorder, WaveformRecorder};
