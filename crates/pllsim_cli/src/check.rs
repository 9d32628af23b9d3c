//! The `pllsim check` command.

use pllsim_config::{ResolvedConfig, Step};
use pllsim_models::PllRegister;
use pllsim_sim::SimTime;

use crate::{config, GlobalArgs};

/// Validates the configuration and prints the resolved parameters.
pub fn run(global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (config, source) = config::load(global)?;
    let resolved = pllsim_config::resolve(&config)?;

    for line in describe(&resolved) {
        println!("{line}");
    }
    if !global.quiet {
        match source {
            Some(path) => eprintln!("   {} is valid", path.display()),
            None => eprintln!("   No configuration file; built-in defaults are valid"),
        }
    }
    Ok(0)
}

fn describe(config: &ResolvedConfig) -> Vec<String> {
    let mut lines = vec![
        format!("clock period   {}", format_fs(config.clock_period_fs)),
        format!("reference      {}", config.reference),
        format!("lock time      {}", format_fs(config.lock_time_fs)),
    ];
    let dividers = match config.dividers.output_frequency(config.reference) {
        Ok(f) => format!("dividers       {} -> {f}", config.dividers),
        Err(e) => format!("dividers       {} ({e})", config.dividers),
    };
    lines.push(dividers);
    lines.push(format!("start code     {}", config.start_code));
    lines.push(format!("lock timeout   {}", format_fs(config.lock_timeout_fs)));
    lines.push(format!("end marker     {}", format_fs(config.end_marker_fs)));
    for (i, step) in config.script.iter().enumerate() {
        lines.push(format!("step {i:<9} {}", describe_step(*step)));
    }
    if let Some(waveform) = &config.waveform {
        lines.push(format!(
            "waveform       {} ({})",
            waveform.path.display(),
            format_fs(waveform.timescale_fs)
        ));
    }
    if let Some(limit) = config.time_limit_fs {
        lines.push(format!("time limit     {}", format_fs(limit)));
    }
    lines
}

fn format_fs(fs: u64) -> String {
    SimTime::from_fs(fs).to_string()
}

fn describe_step(step: Step) -> String {
    match step {
        Step::Settle => "settle".to_string(),
        Step::Reset { cycles } => format!("reset for {cycles} edges"),
        Step::Program => "program N, M, OD, CTRL".to_string(),
        Step::Write { addr, data } => match PllRegister::from_addr(addr) {
            Some(reg) => format!("write {} = 0x{data:x}", reg.name()),
            None => format!("write 0x{addr:x} = 0x{data:x} (undefined address)"),
        },
        Step::Idle { edges } => format!("idle {edges} edges"),
    }
}
