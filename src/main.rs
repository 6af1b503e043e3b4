//! popframe-check CLI
//!
//! Runs the pop-frame rejection checks once against the simulated runtime
//! and exits with the verdict plus the status base (95 = PASSED,
//! 97 = FAILED). Configuration errors exit with 1 before anything runs.

use clap::Parser;
use popframe_harness::{run_simulated, Console, EffectiveConfig};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "popframe-check")]
#[command(about = "Check that pop-frame rejects invalid thread arguments without side effects", version)]
struct Cli {
    /// Print a line for every passing check
    #[arg(short, long)]
    verbose: bool,

    /// Path to a TOML config file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Argument encoding: auto, primary or alternate
    #[arg(long)]
    mode: Option<String>,

    /// How long to wait for the worker to park (milliseconds)
    #[arg(long)]
    ready_timeout_ms: Option<u64>,

    /// How long to wait for the worker's post-hoc checks (milliseconds, 0 = don't wait)
    #[arg(long)]
    settle_timeout_ms: Option<u64>,

    /// Make the simulated runtime misbehave, e.g. `invalid_thread=accept`
    #[arg(long, value_name = "REJECTION=OUTCOME")]
    inject: Vec<String>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Write the run report to a file
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Cli {
    /// Flags that were actually given, as a config layer
    fn overrides(&self) -> Value {
        let mut map = Map::new();
        if self.verbose {
            map.insert("verbose".to_string(), json!(true));
        }
        if let Some(ref mode) = self.mode {
            map.insert("mode".to_string(), json!(mode));
        }

        let mut timeouts = Map::new();
        if let Some(ms) = self.ready_timeout_ms {
            timeouts.insert("ready_ms".to_string(), json!(ms));
        }
        if let Some(ms) = self.settle_timeout_ms {
            timeouts.insert("settle_ms".to_string(), json!(ms));
        }
        if !timeouts.is_empty() {
            map.insert("timeouts".to_string(), Value::Object(timeouts));
        }

        let mut inject = Map::new();
        for spec in &self.inject {
            match spec.split_once('=') {
                Some((key, value)) => {
                    inject.insert(key.trim().to_string(), json!(value.trim()));
                }
                None => {
                    eprintln!("Error: --inject expects REJECTION=OUTCOME, got '{}'", spec);
                    process::exit(1);
                }
            }
        }
        if !inject.is_empty() {
            map.insert("inject".to_string(), Value::Object(inject));
        }

        Value::Object(map)
    }
}

fn main() {
    let cli = Cli::parse();

    let effective = match EffectiveConfig::build(cli.config.as_deref(), Some(cli.overrides())) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };
    let config = match effective.harness_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    let console = Arc::new(Console::stdout(config.verbose));
    let run = match run_simulated(&config, console) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let report = run.report.with_effective_config(effective);

    if config.verbose {
        eprintln!("{}", report.human_summary);
    }

    if cli.json {
        match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing report: {}", e),
        }
    }

    if let Some(ref path) = cli.report {
        if let Err(e) = report.write_to_file(path) {
            eprintln!("Error writing report to {}: {}", path.display(), e);
        }
    }

    process::exit(run.verdict.exit_code());
}
