//! Configuration types deserialized from `pllsim.toml`.
//!
//! Durations and frequencies stay as strings here; [`crate::resolve`] turns
//! them into femtoseconds and [`Frequency`](pllsim_common::Frequency) values.

use serde::Deserialize;

/// The top-level run configuration parsed from `pllsim.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// System clock settings.
    #[serde(default)]
    pub clock: ClockConfig,
    /// Device (PLL) parameters.
    #[serde(default)]
    pub pll: PllConfig,
    /// Host script and verdict parameters.
    #[serde(default)]
    pub bench: BenchConfig,
    /// Waveform output.
    #[serde(default)]
    pub waveform: WaveformConfig,
    /// Safety limits for the scheduler.
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// The `[clock]` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClockConfig {
    /// Full clock period, e.g. `"10ns"`.
    #[serde(default = "default_clock_period")]
    pub period: String,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            period: default_clock_period(),
        }
    }
}

/// The `[pll]` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PllConfig {
    /// Reference input frequency, e.g. `"25MHz"`.
    #[serde(default = "default_reference")]
    pub reference: String,
    /// Time from an accepted start to the lock indication.
    #[serde(default = "default_lock_time")]
    pub lock_time: String,
}

impl Default for PllConfig {
    fn default() -> Self {
        Self {
            reference: default_reference(),
            lock_time: default_lock_time(),
        }
    }
}

/// The `[bench]` table driving the host model.
///
/// Dividers are either given explicitly (`n`, `m`, `od`, all three) or solved
/// from `target`. With neither, the target defaults to 800 MHz.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    /// Desired output frequency for the divider solver.
    pub target: Option<String>,
    /// Explicit input divider.
    pub n: Option<u32>,
    /// Explicit feedback multiplier.
    pub m: Option<u32>,
    /// Explicit output divider.
    pub od: Option<u32>,
    /// Value written to CTRL by the `program` step; 1 starts the lock sequence.
    #[serde(default = "default_start_code")]
    pub start_code: u32,
    /// Edges the reset is held for by a `reset` step without its own count.
    #[serde(default = "default_reset_cycles")]
    pub reset_cycles: u32,
    /// How long the host waits for lock before giving up.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout: String,
    /// Absolute time at which the host ends the run, if not already past.
    #[serde(default = "default_end_marker")]
    pub end_marker: String,
    /// Replaces the default `settle, reset, program` sequence.
    pub script: Option<Vec<ScriptStep>>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            target: None,
            n: None,
            m: None,
            od: None,
            start_code: default_start_code(),
            reset_cycles: default_reset_cycles(),
            lock_timeout: default_lock_timeout(),
            end_marker: default_end_marker(),
            script: None,
        }
    }
}

/// One entry of `bench.script`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ScriptStep {
    /// Wait one clock edge.
    Settle,
    /// Assert reset, hold it, release it, wait one more edge.
    Reset {
        /// Edges to hold reset; defaults to `bench.reset_cycles`.
        cycles: Option<u32>,
    },
    /// Write N, M, OD, then CTRL with the start code.
    Program,
    /// A single bus write.
    Write {
        /// Register address.
        addr: u32,
        /// Data word.
        data: u32,
    },
    /// Leave the bus idle for a number of edges.
    Idle {
        /// Edges to wait.
        edges: u32,
    },
}

/// The `[waveform]` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WaveformConfig {
    /// VCD output path; no waveform is written when absent.
    pub path: Option<String>,
    /// VCD timescale, e.g. `"1ns"`.
    #[serde(default = "default_timescale")]
    pub timescale: String,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            path: None,
            timescale: default_timescale(),
        }
    }
}

/// The `[limits]` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Optional absolute simulated-time limit.
    pub time_limit: Option<String>,
    /// Maximum delta cycles in a single instant.
    #[serde(default = "default_max_deltas")]
    pub max_deltas: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            time_limit: None,
            max_deltas: default_max_deltas(),
        }
    }
}

fn default_clock_period() -> String {
    "10ns".to_string()
}

fn default_reference() -> String {
    "25MHz".to_string()
}

fn default_lock_time() -> String {
    "500ns".to_string()
}

fn default_start_code() -> u32 {
    1
}

fn default_reset_cycles() -> u32 {
    5
}

fn default_lock_timeout() -> String {
    "20us".to_string()
}

fn default_end_marker() -> String {
    "850ns".to_string()
}

fn default_timescale() -> String {
    "1ns".to_string()
}

fn default_max_deltas() -> u32 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config: RunConfig = toml::from_str("").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.clock.period, "10ns");
        assert_eq!(config.pll.lock_time, "500ns");
        assert_eq!(config.bench.start_code, 1);
        assert!(config.waveform.path.is_none());
    }

    #[test]
    fn script_steps_are_tagged() {
        let config: RunConfig = toml::from_str(
            r#"
[bench]
script = [
  { op = "settle" },
  { op = "reset", cycles = 3 },
  { op = "program" },
  { op = "idle", edges = 19 },
  { op = "write", addr = 12, data = 0 },
]
"#,
        )
        .unwrap();
        assert_eq!(
            config.bench.script.unwrap(),
            vec![
                ScriptStep::Settle,
                ScriptStep::Reset { cycles: Some(3) },
                ScriptStep::Program,
                ScriptStep::Idle { edges: 19 },
                ScriptStep::Write { addr: 12, data: 0 },
            ]
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = toml::from_str::<RunConfig>("[clock]\nfrequency = \"100MHz\"\n").unwrap_err();
        assert!(err.to_string().contains("frequency"));
    }

    #[test]
    fn unknown_op_is_rejected() {
        assert!(toml::from_str::<RunConfig>("[bench]\nscript = [{ op = \"jump\" }]\n").is_err());
    }
}
