use std::any::Any;
use std::path::PathBuf;

use circuitry_core::backend::conformance::{check_equivalence, compile_with};
use circuitry_core::benches::{benchmarks, circuit, BenchType};
use circuitry_core::{BackendKind, OptimizationLevel};
use clap::{Args, Parser, Subcommand, ValueEnum};
use common::serializable::Serializable;
use eyre::WrapErr;
use tracing_chrome::ChromeLayerBuilder;
use tracing_subscriber::{self, fmt::format::FmtSpan, prelude::*, EnvFilter};

/// Compile synthetic circuits on every backend and inspect the result.
#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile and witness a circuit on every backend under tracing.
    Profile(ProfileArgs),
    /// Compile a circuit, check backend agreement and write the export JSON.
    Export(ExportArgs),
}

#[derive(Args, Debug, Clone)]
struct CircuitArgs {
    /// Circuit to build
    #[clap(long, value_enum)]
    name: BenchType,

    /// Number of steps in the circuit
    #[clap(short, long, default_value_t = 1 << 10)]
    size: usize,

    /// none, standard or aggressive
    #[clap(short, long, default_value_t = OptimizationLevel::Standard)]
    optimization: OptimizationLevel,
}

#[derive(Args, Debug, Clone)]
struct ProfileArgs {
    #[clap(flatten)]
    circuit: CircuitArgs,

    /// Output formats
    #[clap(short, long, value_enum)]
    format: Option<Vec<Format>>,

    /// Chrome trace file; defaults to trace-<timestamp>.json
    #[clap(long)]
    trace_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct ExportArgs {
    #[clap(flatten)]
    circuit: CircuitArgs,

    /// Backend to export from; all backends are compared when omitted
    #[clap(long)]
    backend: Option<BackendKind>,

    /// Destination of the constraint system JSON
    #[clap(long)]
    out: PathBuf,
}

#[derive(Debug, Clone, ValueEnum, PartialEq)]
enum Format {
    Default,
    Chrome,
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Profile(args) => profile(args),
        Commands::Export(args) => export(args),
    }
}

fn profile(args: ProfileArgs) -> eyre::Result<()> {
    let mut layers = Vec::new();

    let log_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_filter(log_filter)
        .boxed();
    layers.push(log_layer);

    let mut guards: Vec<Box<dyn Any>> = vec![];

    if let Some(format) = &args.format {
        if format.contains(&Format::Default) {
            let collector_layer = tracing_subscriber::fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .compact()
                .with_target(false)
                .with_file(false)
                .with_line_number(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .boxed();
            layers.push(collector_layer);
        }
        if format.contains(&Format::Chrome) {
            let (chrome_layer, guard) = match &args.trace_file {
                Some(file) => ChromeLayerBuilder::new()
                    .file(file)
                    .include_args(true)
                    .build(),
                None => ChromeLayerBuilder::new().include_args(true).build(),
            };
            layers.push(chrome_layer.boxed());
            guards.push(Box::new(guard));
            tracing::info!("Running tracing-chrome. Traces can be viewed in https://ui.perfetto.dev/");
        }
    }

    tracing_subscriber::registry().with(layers).init();

    let CircuitArgs {
        name,
        size,
        optimization,
    } = args.circuit;
    for (span, task) in benchmarks(name, size, optimization) {
        span.in_scope(task)
            .wrap_err_with(|| format!("profiling {name:?} failed"))?;
    }
    tracing::info!("Profile complete");
    Ok(())
}

fn export(args: ExportArgs) -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let CircuitArgs {
        name,
        size,
        optimization,
    } = args.circuit;
    let body = circuit(name, size);
    let cs = match args.backend {
        Some(kind) => compile_with(kind, optimization, &body)?,
        None => check_equivalence(optimization, &body)?,
    };
    let json = cs.to_json();
    json.serialize_to_file(&args.out)
        .wrap_err_with(|| format!("writing {}", args.out.display()))?;
    for (kind, count) in json.gate_summary() {
        println!("{kind}: {count}");
    }
    println!("rows: {}", json.rows);
    println!("digest: {}", json.digest);
    Ok(())
}
