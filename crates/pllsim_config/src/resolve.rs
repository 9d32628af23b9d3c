//! Resolution of a parsed [`RunConfig`] into numeric run parameters.

use std::path::PathBuf;

use pllsim_common::{parse_duration, DividerLimits, Dividers, Frequency, FS_PER_NS, FS_PER_US};

use crate::error::ConfigError;
use crate::types::{RunConfig, ScriptStep};

/// Target used when neither explicit dividers nor a target are configured.
const DEFAULT_TARGET_MHZ: f64 = 800.0;

/// One resolved host script step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Wait one clock edge.
    Settle,
    /// Hold reset for `cycles` edges, release, wait one edge.
    Reset {
        /// Edges with reset asserted.
        cycles: u32,
    },
    /// Write the divider triple, then CTRL with the start code.
    Program,
    /// Write one register.
    Write {
        /// Register address.
        addr: u32,
        /// Data word.
        data: u32,
    },
    /// Wait `edges` clock edges without touching the bus.
    Idle {
        /// Edges to wait.
        edges: u32,
    },
}

/// Where and how to write the VCD file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveformSettings {
    /// Output path.
    pub path: PathBuf,
    /// Timescale in femtoseconds.
    pub timescale_fs: u64,
}

/// Fully numeric run parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// Clock period in femtoseconds (non-zero, even).
    pub clock_period_fs: u64,
    /// PLL reference frequency.
    pub reference: Frequency,
    /// Lock sequence duration in femtoseconds.
    pub lock_time_fs: u64,
    /// Divider triple programmed by the host.
    pub dividers: Dividers,
    /// The frequency the dividers were solved for, if they were solved.
    pub target: Option<Frequency>,
    /// Value the `Program` step writes to CTRL.
    pub start_code: u32,
    /// Host lock wait in femtoseconds.
    pub lock_timeout_fs: u64,
    /// Absolute end-of-run marker in femtoseconds.
    pub end_marker_fs: u64,
    /// Host script.
    pub script: Vec<Step>,
    /// Optional waveform output.
    pub waveform: Option<WaveformSettings>,
    /// Optional scheduler time limit in femtoseconds.
    pub time_limit_fs: Option<u64>,
    /// Delta cycles allowed per instant.
    pub max_deltas: u32,
}

impl Default for ResolvedConfig {
    /// The reference run: 800 MHz from 25 MHz with `N=1, M=32, OD=1`.
    fn default() -> Self {
        Self {
            clock_period_fs: 10 * FS_PER_NS,
            reference: Frequency::from_mhz(25.0),
            lock_time_fs: 500 * FS_PER_NS,
            dividers: Dividers::new(1, 32, 1),
            target: Some(Frequency::from_mhz(DEFAULT_TARGET_MHZ)),
            start_code: 1,
            lock_timeout_fs: 20 * FS_PER_US,
            end_marker_fs: 850 * FS_PER_NS,
            script: default_script(5),
            waveform: None,
            time_limit_fs: None,
            max_deltas: 10_000,
        }
    }
}

/// The sequence used when `bench.script` is absent.
pub fn default_script(reset_cycles: u32) -> Vec<Step> {
    vec![
        Step::Settle,
        Step::Reset {
            cycles: reset_cycles,
        },
        Step::Program,
    ]
}

/// Resolves durations, frequencies, dividers and the script.
pub fn resolve(config: &RunConfig) -> Result<ResolvedConfig, ConfigError> {
    let clock_period_fs = duration("clock.period", &config.clock.period)?;
    if clock_period_fs == 0 || clock_period_fs % 2 != 0 {
        return Err(ConfigError::ValidationError(format!(
            "clock.period: {} must be a non-zero, even number of femtoseconds",
            config.clock.period
        )));
    }

    let reference = frequency("pll.reference", &config.pll.reference)?;
    let bench = &config.bench;

    let (dividers, target) = match (bench.n, bench.m, bench.od) {
        (Some(n), Some(m), Some(od)) => (Dividers::new(n, m, od), None),
        _ => {
            let target = match &bench.target {
                Some(text) => frequency("bench.target", text)?,
                None => Frequency::from_mhz(DEFAULT_TARGET_MHZ),
            };
            let dividers = Dividers::solve(reference, target, DividerLimits::default())
                .map_err(|e| ConfigError::ValidationError(format!("bench.target: {e}")))?;
            (dividers, Some(target))
        }
    };

    let script = match &bench.script {
        None => default_script(bench.reset_cycles),
        Some(steps) => steps
            .iter()
            .map(|step| match *step {
                ScriptStep::Settle => Step::Settle,
                ScriptStep::Reset { cycles } => Step::Reset {
                    cycles: cycles.unwrap_or(bench.reset_cycles),
                },
                ScriptStep::Program => Step::Program,
                ScriptStep::Write { addr, data } => Step::Write { addr, data },
                ScriptStep::Idle { edges } => Step::Idle { edges },
            })
            .collect(),
    };

    let waveform = match &config.waveform.path {
        None => None,
        Some(path) => {
            let timescale_fs = duration("waveform.timescale", &config.waveform.timescale)?;
            if timescale_fs == 0 {
                return Err(ConfigError::ValidationError(
                    "waveform.timescale: must be non-zero".to_string(),
                ));
            }
            Some(WaveformSettings {
                path: PathBuf::from(path),
                timescale_fs,
            })
        }
    };

    let time_limit_fs = config
        .limits
        .time_limit
        .as_deref()
        .map(|text| duration("limits.time_limit", text))
        .transpose()?;

    Ok(ResolvedConfig {
        clock_period_fs,
        reference,
        lock_time_fs: duration("pll.lock_time", &config.pll.lock_time)?,
        dividers,
        target,
        start_code: bench.start_code,
        lock_timeout_fs: duration("bench.lock_timeout", &bench.lock_timeout)?,
        end_marker_fs: duration("bench.end_marker", &bench.end_marker)?,
        script,
        waveform,
        time_limit_fs,
        max_deltas: config.limits.max_deltas,
    })
}

fn duration(field: &str, text: &str) -> Result<u64, ConfigError> {
    parse_duration(text).map_err(|e| ConfigError::ValidationError(format!("{field}: {e}")))
}

fn frequency(field: &str, text: &str) -> Result<Frequency, ConfigError> {
    let value: Frequency = text
        .parse()
        .map_err(|e| ConfigError::ValidationError(format!("{field}: {e}")))?;
    if !value.hz().is_finite() || value.hz() <= 0.0 {
        return Err(ConfigError::ValidationError(format!(
            "{field}: frequency must be positive and finite"
        )));
    }
    Ok(value)
}
