//! Surefire compiler CLI.
//!
//! Checks configs, prints state vector layouts, and drives compiled
//! state machines with a synthetic clock for quick inspection.

use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use sfc::diag::ConfigError;
use sfc::{layout, sm_assembly, sv_assembly};
use surefire_core::StateVector;

#[derive(Parser)]
#[command(name = "sfc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Surefire config compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a config and report diagnostics
    Check {
        /// Config file to check
        input: PathBuf,

        /// Treat the input as a state machine config and compile it
        /// against this state vector config
        #[arg(long, value_name = "SV_CONFIG")]
        state_vector: Option<PathBuf>,
    },

    /// Print the memory layout of a state vector config
    Layout {
        /// State vector config file
        input: PathBuf,

        /// Emit the layout as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compile and step a state machine with a synthetic clock
    Run {
        /// State vector config file
        state_vector: PathBuf,

        /// State machine config file
        state_machine: PathBuf,

        /// Number of steps to execute
        #[arg(short, long, default_value_t = 10)]
        steps: u64,

        /// Nanoseconds between steps
        #[arg(long, default_value_t = 100_000_000)]
        period_ns: u64,

        /// Elements to print each step (default: all state vector
        /// elements)
        #[arg(short, long)]
        watch: Vec<String>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            input,
            state_vector,
        } => {
            run_check(&input, state_vector.as_deref());
        }
        Commands::Layout { input, json } => {
            run_layout(&input, json);
        }
        Commands::Run {
            state_vector,
            state_machine,
            steps,
            period_ns,
            watch,
        } => {
            run_machine(&state_vector, &state_machine, steps, period_ns, &watch);
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "sfc", &mut io::stdout());
        }
    }
}

fn fail(err: ConfigError) -> ! {
    eprintln!("{}", err);
    process::exit(1);
}

fn compile_sv(path: &Path) -> StateVector {
    sv_assembly::compile_file(path).unwrap_or_else(|e| fail(e))
}

fn run_check(input: &Path, state_vector: Option<&Path>) {
    match state_vector {
        Some(sv_path) => {
            let sv = compile_sv(sv_path);
            sm_assembly::compile_file(input, &sv).unwrap_or_else(|e| fail(e));
        }
        None => {
            compile_sv(input);
        }
    }
    println!("{}: OK", input.display());
}

fn run_layout(input: &Path, json: bool) {
    let sv = compile_sv(input);
    let report = layout::report(&sv);
    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        }
    } else {
        print!("{}", report);
    }
}

fn run_machine(
    sv_path: &Path,
    sm_path: &Path,
    steps: u64,
    period_ns: u64,
    watch: &[String],
) {
    let sv = compile_sv(sv_path);
    let mut asm = sm_assembly::compile_file(sm_path, &sv).unwrap_or_else(|e| fail(e));

    let watched: Vec<String> = if watch.is_empty() {
        sv.elements().map(|(name, _)| name.to_string()).collect()
    } else {
        watch.to_vec()
    };

    let global_time = asm.machine.global_time_element();
    for step in 0..steps {
        global_time.write(step * period_ns);
        if let Err(e) = asm.machine.step() {
            eprintln!("step {}: {}", step, e);
            process::exit(1);
        }

        let mut line = format!("t={}", step * period_ns);
        for name in &watched {
            // Watched names may live in the shared or the local vector.
            let value = sv
                .get_any_element(name)
                .or_else(|_| asm.local.get_any_element(name))
                .map(|e| e.value().to_string())
                .unwrap_or_else(|_| "?".to_string());
            line.push_str(&format!(" {}={}", name, value));
        }
        println!("{}", line);
    }
}
