//! CLI entry point for the intermittent-power simulator.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process;

use log::info;
use nvp_core::{Memory, PowerSource, Simulation, StopReason};

mod errors;
mod loader;
mod power;
mod registry;
mod report;

use errors::ConfigError;
use power::{ConstantPowerSource, TracePowerSource};
use report::Report;

const HELP_TEXT: &str = "\
Usage: nvp-sim <program> (--power <watts> | --trace <file>) [options]

Simulates a Thumb-1 program on an intermittently-powered core.

Options:
  --policy <name>      backup/restore scheme: odab (default) or clank
  --power <watts>      constant harvested power
  --trace <file>       harvested-power trace, one watts sample per cycle
  --max-cycles <n>     stop after n simulated cycles
  --entry <addr>       entry point override (hex accepted, e.g. 0x8000)
  --sp <addr>          initial stack pointer (default: top of data memory)
  --output <file>      write the JSON report to a file instead of stdout
  --help               show this text

Exit codes: 0 normal, 1 fatal simulation fault, 2 configuration error.";

#[derive(Debug, PartialEq)]
struct CliArgs {
    program: PathBuf,
    policy: String,
    power: Option<f64>,
    trace: Option<PathBuf>,
    max_cycles: Option<u64>,
    entry: Option<u32>,
    sp: Option<u32>,
    output: Option<PathBuf>,
}

#[derive(Debug)]
enum ParseResult {
    Args(CliArgs),
    Help,
}

fn parse_number_u64(value: &str) -> Option<u64> {
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else {
        value.parse().ok()
    }
}

fn parse_number_u32(value: &str) -> Option<u32> {
    parse_number_u64(value).and_then(|n| u32::try_from(n).ok())
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut program: Option<PathBuf> = None;
    let mut policy = String::from("odab");
    let mut power: Option<f64> = None;
    let mut trace: Option<PathBuf> = None;
    let mut max_cycles: Option<u64> = None;
    let mut entry: Option<u32> = None;
    let mut sp: Option<u32> = None;
    let mut output: Option<PathBuf> = None;

    let value_of = |name: &str, args: &mut dyn Iterator<Item = OsString>| {
        args.next()
            .ok_or_else(|| format!("missing value for {name}"))
    };

    while let Some(arg) = args.next() {
        if arg == "--help" {
            return Ok(ParseResult::Help);
        }

        if arg == "--policy" {
            policy = value_of("--policy", &mut args)?.to_string_lossy().into_owned();
            continue;
        }

        if arg == "--power" {
            let value = value_of("--power", &mut args)?;
            let text = value.to_string_lossy();
            power = Some(
                text.parse()
                    .map_err(|_| format!("--power: '{text}' is not a number"))?,
            );
            continue;
        }

        if arg == "--trace" {
            trace = Some(PathBuf::from(value_of("--trace", &mut args)?));
            continue;
        }

        if arg == "--max-cycles" {
            let value = value_of("--max-cycles", &mut args)?;
            let text = value.to_string_lossy();
            max_cycles = Some(
                parse_number_u64(&text)
                    .ok_or_else(|| format!("--max-cycles: '{text}' is not a number"))?,
            );
            continue;
        }

        if arg == "--entry" {
            let value = value_of("--entry", &mut args)?;
            let text = value.to_string_lossy();
            entry = Some(
                parse_number_u32(&text)
                    .ok_or_else(|| format!("--entry: '{text}' is not an address"))?,
            );
            continue;
        }

        if arg == "--sp" {
            let value = value_of("--sp", &mut args)?;
            let text = value.to_string_lossy();
            sp = Some(
                parse_number_u32(&text).ok_or_else(|| format!("--sp: '{text}' is not an address"))?,
            );
            continue;
        }

        if arg == "--output" {
            output = Some(PathBuf::from(value_of("--output", &mut args)?));
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if program.is_some() {
            return Err(String::from("multiple program paths provided"));
        }
        program = Some(PathBuf::from(arg));
    }

    let program = program.ok_or_else(|| String::from("missing program path"))?;

    if power.is_none() && trace.is_none() {
        return Err(String::from("one of --power or --trace is required"));
    }
    if power.is_some() && trace.is_some() {
        return Err(String::from("--power and --trace are mutually exclusive"));
    }

    Ok(ParseResult::Args(CliArgs {
        program,
        policy,
        power,
        trace,
        max_cycles,
        entry,
        sp,
        output,
    }))
}

fn build_power_source(args: &CliArgs) -> Result<Box<dyn PowerSource>, ConfigError> {
    if let Some(watts) = args.power {
        return Ok(Box::new(ConstantPowerSource::new(watts)?));
    }

    let path = args
        .trace
        .as_deref()
        .ok_or_else(|| ConfigError::Usage(String::from("one of --power or --trace is required")))?;
    let trace = TracePowerSource::from_file(path)?;
    if let Some(budget) = args.max_cycles {
        trace.check_budget(budget)?;
    }
    Ok(Box::new(trace))
}

fn configure(args: &CliArgs) -> Result<(Simulation, Box<dyn PowerSource>), ConfigError> {
    let mut mem = Memory::default();
    let program = loader::load_program(&args.program, &mut mem)?;

    let scheme = registry::create_scheme(&args.policy)?;
    let source = build_power_source(args)?;

    let layout = mem.layout();
    let entry = args.entry.unwrap_or(program.entry);
    let sp = args
        .sp
        .unwrap_or(layout.data.base + layout.data.size)
        & !3;

    info!(
        "policy {} entry {entry:#010X} sp {sp:#010X} clock {} Hz",
        args.policy,
        scheme.clock_frequency()
    );

    Ok((Simulation::new(mem, scheme, entry, sp), source))
}

fn run(args: &CliArgs) -> i32 {
    let (mut sim, source) = match configure(args) {
        Ok(configured) => configured,
        Err(error) => {
            eprintln!("error: {error}");
            return 2;
        }
    };

    let outcome = match sim.run(source.as_ref(), args.max_cycles) {
        Ok(outcome) => outcome,
        Err(error) => {
            eprintln!("error: {error}");
            return 1;
        }
    };

    match outcome.reason {
        StopReason::SupervisorExit => info!("program exited via supervisor call"),
        StopReason::CycleLimit => info!("stopped at the configured cycle budget"),
    }

    let report = Report::build(sim.stats(), sim.cpu(), sim.scheme());
    if let Err(error) = report.write(args.output.as_deref()) {
        eprintln!("error: {error}");
        return 2;
    }

    0
}

fn main() {
    env_logger::init();

    let code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{HELP_TEXT}");
            0
        }
        Ok(ParseResult::Args(args)) => run(&args),
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{HELP_TEXT}");
            2
        }
    };

    process::exit(code);
}
