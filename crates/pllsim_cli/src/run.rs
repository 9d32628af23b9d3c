//! The `pllsim run` command.

use pllsim_config::RunConfig;
use pllsim_models::RunReport;

use crate::{config, GlobalArgs, RunArgs};

/// Exit code for a run whose host did not observe lock, with `--fail-on-timeout`.
const EXIT_NOT_LOCKED: i32 = 2;

/// Runs the simulation and prints the transcript (or the JSON report).
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (mut config, source) = config::load(global)?;
    apply_overrides(&mut config, args);
    let resolved = pllsim_config::resolve(&config)?;

    if !global.quiet {
        match &source {
            Some(path) => eprintln!("   Simulating with {}", path.display()),
            None => eprintln!("   Simulating with built-in defaults"),
        }
    }

    let report = pllsim_models::run(&resolved)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in &report.transcript {
            println!("{line}");
        }
    }

    if !global.quiet {
        eprintln!(
            "   Simulation finished at {} ({} delta cycles)",
            report.final_time.instant(),
            report.total_deltas
        );
        match report.verdict {
            Some(v) if v.is_locked() => eprintln!("   PLL locked at {}", v.at().instant()),
            Some(v) => eprintln!("   PLL did not lock (gave up at {})", v.at().instant()),
            None => eprintln!("   Run ended before the lock wait resolved"),
        }
        if report.protocol_violations > 0 {
            eprintln!("   {} protocol violation(s)", report.protocol_violations);
        }
        if let Some(waveform) = &resolved.waveform {
            eprintln!("   Waveform: {}", waveform.path.display());
        }
    }

    Ok(exit_code(&report, args.fail_on_timeout))
}

/// Applies command-line overrides on top of the file configuration.
fn apply_overrides(config: &mut RunConfig, args: &RunArgs) {
    if let Some(path) = &args.vcd {
        config.waveform.path = Some(path.clone());
    }
    if args.no_waveform {
        config.waveform.path = None;
    }
    if let Some(time) = &args.time {
        config.limits.time_limit = Some(time.clone());
    }
}

fn exit_code(report: &RunReport, fail_on_timeout: bool) -> i32 {
    let locked = report.verdict.is_some_and(|v| v.is_locked());
    if fail_on_timeout && !locked {
        EXIT_NOT_LOCKED
    } else {
        0
    }
}
