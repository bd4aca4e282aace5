//! Water heater simulator entry point: CLI wiring and config-driven trial runs.

use std::path::{Path, PathBuf};
use std::process;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ewh_sim::config::ScenarioConfig;
use ewh_sim::io::export::{export_draws_csv, export_steps_csv, trial_path};
use ewh_sim::runner::{build_engine, run_batch};
use ewh_sim::sim::engine::{DayDraw, TrialOutcome};

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    seed_override: Option<u64>,
    days_override: Option<usize>,
    trials_override: Option<usize>,
    ambient_csv: Option<PathBuf>,
    telemetry_out: Option<String>,
    events_out: Option<String>,
    print_steps: bool,
}

fn print_help() {
    eprintln!("ewh-sim — Electric water heater simulator with stochastic hot-water draws");
    eprintln!();
    eprintln!("Usage: ewh-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!("  --preset <name>          Use a built-in preset (baseline, demand_response, randomised)");
    eprintln!("  --seed <u64>             Override random seed");
    eprintln!("  --days <usize>           Override number of simulated days");
    eprintln!("  --trials <usize>         Override number of independent trials");
    eprintln!("  --ambient-csv <path>     Read hourly ambient temperature from CSV");
    eprintln!("  --telemetry-out <path>   Export step results to CSV (one file per trial)");
    eprintln!("  --events-out <path>      Export sampled draw events to CSV");
    eprintln!("  --print-steps            Print every step of the first trial");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
    eprintln!("Log verbosity follows RUST_LOG (default: info); logs go to stderr.");
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str, what: &str) -> &'a str {
    *i += 1;
    match args.get(*i) {
        Some(value) => value.as_str(),
        None => {
            eprintln!("error: {flag} requires {what}");
            process::exit(1);
        }
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, flag: &str, kind: &str) -> T {
    raw.parse::<T>().unwrap_or_else(|_| {
        eprintln!("error: {flag} value \"{raw}\" is not a valid {kind}");
        process::exit(1);
    })
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        seed_override: None,
        days_override: None,
        trials_override: None,
        ambient_csv: None,
        telemetry_out: None,
        events_out: None,
        print_steps: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => {
                cli.scenario_path = Some(next_value(&args, &mut i, "--scenario", "a path argument").to_string());
            }
            "--preset" => {
                cli.preset = Some(next_value(&args, &mut i, "--preset", "a name argument").to_string());
            }
            "--seed" => {
                let raw = next_value(&args, &mut i, "--seed", "a u64 argument");
                cli.seed_override = Some(parse_number(raw, "--seed", "u64"));
            }
            "--days" => {
                let raw = next_value(&args, &mut i, "--days", "a usize argument");
                cli.days_override = Some(parse_number(raw, "--days", "usize"));
            }
            "--trials" => {
                let raw = next_value(&args, &mut i, "--trials", "a usize argument");
                cli.trials_override = Some(parse_number(raw, "--trials", "usize"));
            }
            "--ambient-csv" => {
                let raw = next_value(&args, &mut i, "--ambient-csv", "a path argument");
                cli.ambient_csv = Some(PathBuf::from(raw));
            }
            "--telemetry-out" => {
                cli.telemetry_out =
                    Some(next_value(&args, &mut i, "--telemetry-out", "a path argument").to_string());
            }
            "--events-out" => {
                cli.events_out =
                    Some(next_value(&args, &mut i, "--events-out", "a path argument").to_string());
            }
            "--print-steps" => {
                cli.print_steps = true;
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_outcome(index: usize, outcome: &TrialOutcome) {
    let h = &outcome.heater;
    println!(
        "=== Trial {index} (seed {}): {:.0} W, {:.0} kg, limits {:.2}/{:.2} C ===",
        outcome.seed, h.element_rating, h.mass, h.lower_temp_limit, h.upper_temp_limit
    );
    println!("{}\n", outcome.kpi);
}

fn main() {
    init_tracing();
    let cli = parse_args();

    // Load config: --scenario takes priority, then --preset, then baseline default
    let mut scenario = if let Some(ref path) = cli.scenario_path {
        match ScenarioConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else if let Some(ref name) = cli.preset {
        match ScenarioConfig::from_preset(name) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        ScenarioConfig::baseline()
    };

    // Apply overrides
    if let Some(seed) = cli.seed_override {
        scenario.simulation.seed = seed;
    }
    if let Some(days) = cli.days_override {
        scenario.simulation.days = days;
    }
    if let Some(trials) = cli.trials_override {
        scenario.simulation.trials = trials;
    }
    if let Some(path) = cli.ambient_csv {
        scenario.ambient.csv = Some(path);
    }

    // Validate and build
    let engine = match build_engine(&scenario) {
        Ok(engine) => engine,
        Err(errors) => {
            for e in &errors {
                eprintln!("{e}");
            }
            process::exit(1);
        }
    };

    let outcomes = match run_batch(&engine, scenario.simulation.trials) {
        Ok(outcomes) => outcomes,
        Err(e) => {
            eprintln!("error: trial aborted: {e}");
            process::exit(1);
        }
    };

    if cli.print_steps {
        if let Some(first) = outcomes.first() {
            for r in &first.results {
                println!("{r}");
            }
            println!();
        }
    }

    for (i, outcome) in outcomes.iter().enumerate() {
        print_outcome(i, outcome);
    }

    // Export CSV if requested
    if let Some(ref path) = cli.telemetry_out {
        let path = Path::new(path);
        for (i, outcome) in outcomes.iter().enumerate() {
            let target = if outcomes.len() > 1 {
                trial_path(path, i)
            } else {
                path.to_path_buf()
            };
            if let Err(e) = export_steps_csv(&outcome.results, &target) {
                eprintln!("error: failed to write CSV: {e}");
                process::exit(1);
            }
            eprintln!("Telemetry written to {}", target.display());
        }
    }

    if let Some(ref path) = cli.events_out {
        let draws: Vec<&[DayDraw]> = outcomes.iter().map(|o| o.draws.as_slice()).collect();
        if let Err(e) = export_draws_csv(&draws, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Draw events written to {path}");
    }
}
