//! mnasim - MNA Circuit Simulator
//!
//! Runs the DC operating point and a fixed-step transient analysis of a
//! netlist file, writing one tab-separated row per step to stdout.
//!
//! # Usage
//!
//! ```bash
//! mnasim rc.cir --step 10u --ticks 500 > rc.tsv
//! ```

use std::path::PathBuf;

use clap::Parser;
use log::{info, Level, Log, Metadata, Record};
use mnasim::{
    circuit::{validate_circuit, Circuit},
    dsl::{self, parse_value},
    error::Result,
    report::TableWriter,
    SolverConfig,
};

/// Lumped-element circuit simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the netlist file
    #[arg(value_name = "NETLIST")]
    netlist: PathBuf,

    /// Transient time step, e.g. `10u` (overrides `.tran`)
    #[arg(short, long, value_parser = parse_step)]
    step: Option<f64>,

    /// Number of transient steps (overrides `.tran`)
    #[arg(short, long)]
    ticks: Option<usize>,

    /// Skip the DC operating point
    #[arg(long)]
    no_dc: bool,

    /// Newton-Raphson iteration cap per step
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Newton-Raphson voltage tolerance
    #[arg(long, value_parser = parse_tolerance)]
    tolerance: Option<f64>,

    /// Print the labelled MNA matrix before simulating
    #[arg(long)]
    dump_matrix: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_step(s: &str) -> std::result::Result<f64, String> {
    parse_value(s).ok_or_else(|| format!("invalid value '{}'", s))
}

fn parse_tolerance(s: &str) -> std::result::Result<f64, String> {
    let tolerance = parse_step(s)?;
    SolverConfig::new()
        .with_tolerance(tolerance)
        .validate()
        .map_err(|e| e.to_string())?;
    Ok(tolerance)
}

/// Minimal logger writing to stderr, filtered by the global max level.
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::Warn,
        1 => Level::Info,
        2 => Level::Debug,
        _ => Level::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level.to_level_filter());
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    // Parse the netlist, command line settings win over directives
    let mut ast = dsl::parse_file(&args.netlist)?;
    if args.max_iterations.is_some() {
        ast.options.max_iterations = args.max_iterations;
    }
    if args.tolerance.is_some() {
        ast.options.tolerance = args.tolerance;
    }

    // Build and validate
    let mut circuit = Circuit::from_ast(ast)?;
    validate_circuit(&circuit)?;
    let netlist = &mut circuit.netlist;
    netlist.finalize()?;

    let mut table = TableWriter::stdout();
    if args.dump_matrix {
        table.write_comment(&netlist.dump_matrix()?)?;
    }
    table.write_header(&netlist.net_names()?)?;

    if !(args.no_dc || circuit.no_dc) {
        let report = netlist.step()?.into_result()?;
        info!("DC operating point in {} iterations", report.iterations);
        table.write_row(&report)?;
    }

    let step = args.step.or(circuit.tran.map(|t| t.step));
    let ticks = args.ticks.or(circuit.tran.map(|t| t.ticks)).unwrap_or(0);
    if let Some(step) = step {
        netlist.set_time_step(step)?;
        for _ in 0..ticks {
            let report = netlist.step()?.into_result()?;
            table.write_row(&report)?;
        }
        info!("transient: {} steps to t = {:e} s", ticks, netlist.time());
    }

    table.flush()
}
