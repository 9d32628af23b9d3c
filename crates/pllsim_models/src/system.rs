//! Top-level wiring of the PLL testbench.
//!
//! [`Testbench::build`] creates the clock and the five bus signals, connects
//! the host (`pmu_inst`) and the device (`pll_inst`) to them one-to-one,
//! attaches an optional VCD recorder, and returns a testbench ready to run.

use std::fs::File;
use std::io::BufWriter;

use pllsim_config::ResolvedConfig;
use pllsim_sim::{Signal, SimError, SimKernel, SimTime, VcdRecorder};
use serde::Serialize;

use crate::pll::{LockState, Pll, PllParams};
use crate::pmu::{Pmu, PmuParams, Verdict};
use crate::regs::RegisterSnapshot;

/// The signals shared by host and device.
#[derive(Debug, Clone, Copy)]
pub struct Wires {
    /// System clock, kernel-driven.
    pub clk: Signal<bool>,
    /// Active-high reset, host-driven.
    pub reset: Signal<bool>,
    /// Bus write enable, host-driven.
    pub bus_we: Signal<bool>,
    /// Bus address, host-driven.
    pub bus_addr: Signal<u32>,
    /// Bus write data, host-driven.
    pub bus_wdata: Signal<u32>,
    /// Lock indication, device-driven.
    pub locked: Signal<bool>,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Simulated time at which the run ended.
    pub final_time: SimTime,
    /// Delta cycles executed.
    pub total_deltas: u64,
    /// The host's verdict; `None` if the run ended before the lock wait resolved.
    pub verdict: Option<Verdict>,
    /// Device registers at the end of the run.
    pub registers: RegisterSnapshot,
    /// Device lock state at the end of the run.
    pub lock_state: LockState,
    /// Bus requests the device rejected or could not honor.
    pub protocol_violations: u32,
    /// Console transcript.
    pub transcript: Vec<String>,
}

/// An elaborated host + device pair.
pub struct Testbench {
    kernel: SimKernel,
    wires: Wires,
    pll: Pll,
    pmu: Pmu,
    preamble: Vec<String>,
}

impl Testbench {
    /// Wires host and device according to `config`.
    ///
    /// Creates the waveform file when one is configured.
    pub fn build(config: &ResolvedConfig) -> Result<Self, SimError> {
        let mut kernel = SimKernel::new();
        let mut preamble = vec!["Instantiating modules...".to_string()];
        let pmu_inst = kernel.instance("pmu_inst");
        let pll_inst = kernel.instance("pll_inst");

        preamble.push("Creating signals and clocks...".to_string());
        let wires = Wires {
            clk: kernel.add_clock("clk", config.clock_period_fs)?,
            reset: kernel.signal("reset", false),
            bus_we: kernel.signal("bus_we", false),
            bus_addr: kernel.signal("bus_addr", 0u32),
            bus_wdata: kernel.signal("bus_wdata", 0u32),
            locked: kernel.signal("locked", false),
        };

        preamble.push("Connecting modules...".to_string());
        let pmu = Pmu::instantiate(&mut kernel, pmu_inst, wires, &PmuParams::from(config))?;
        let pll = Pll::instantiate(
            &mut kernel,
            pll_inst,
            wires,
            PllParams {
                reference: config.reference,
                lock_time_fs: config.lock_time_fs,
            },
        )?;

        preamble.push("Starting simulation...".to_string());
        if let Some(waveform) = &config.waveform {
            preamble.push("Setting up VCD waveform tracing...".to_string());
            let file = File::create(&waveform.path)?;
            kernel.set_recorder(Box::new(VcdRecorder::with_timescale(
                BufWriter::new(file),
                waveform.timescale_fs,
            )));
            tracing::debug!(path = %waveform.path.display(), "waveform enabled");
        }

        if let Some(limit) = config.time_limit_fs {
            kernel.set_time_limit(limit);
        }
        kernel.set_max_delta(config.max_deltas);

        Ok(Self {
            kernel,
            wires,
            pll,
            pmu,
            preamble,
        })
    }

    /// The signals connecting host and device.
    pub fn wires(&self) -> Wires {
        self.wires
    }

    /// The kernel, for observation.
    pub fn kernel(&self) -> &SimKernel {
        &self.kernel
    }

    /// The kernel, for stepping by hand.
    pub fn kernel_mut(&mut self) -> &mut SimKernel {
        &mut self.kernel
    }

    /// The device handle.
    pub fn pll(&self) -> &Pll {
        &self.pll
    }

    /// The host handle.
    pub fn pmu(&self) -> &Pmu {
        &self.pmu
    }

    /// Runs to completion and summarizes the result.
    pub fn run(mut self) -> Result<RunReport, SimError> {
        let result = self.kernel.run()?;

        let mut transcript = self.preamble;
        transcript.extend(result.transcript);
        transcript.push(format!(
            "Simulation finished at {}",
            result.final_time.instant()
        ));

        Ok(RunReport {
            final_time: result.final_time,
            total_deltas: result.total_deltas,
            verdict: self.pmu.verdict(),
            registers: self.pll.registers(),
            lock_state: self.pll.lock_state(),
            protocol_violations: self.pll.protocol_violations(),
            transcript,
        })
    }
}

/// Builds and runs a testbench in one call.
pub fn run(config: &ResolvedConfig) -> Result<RunReport, SimError> {
    Testbench::build(config)?.run()
}
