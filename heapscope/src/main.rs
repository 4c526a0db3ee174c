//! # heapscope - Main Entry Point
//!
//! Three subcommands:
//! - **sample**: attach to the runtime in this process, sample the heap and
//!   print the per-class table, optionally several times and to JSON
//! - **symbols**: resolve names against every loaded object
//! - **maps**: list loaded objects and where they were mapped

use anyhow::{Context, Result};
use clap::Parser;
use heapscope::analysis::StatisticalSampler;
use heapscope::cli::{Args, Command, SampleArgs};
use heapscope::domain::InspectError;
use heapscope::export::JsonReportExporter;
use heapscope::inferior::{Inferior, SelfInferior};
use heapscope::preflight::run_preflight_checks;
use heapscope::symbolization::{read_process_symbols, ElfSymbols};
use heapscope::vm::Runtime;
use log::info;
use std::time::Duration;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if matches!(err.downcast_ref::<InspectError>(), Some(InspectError::Config(_))) {
        return EXIT_USAGE;
    }
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("permission denied") {
        EXIT_NOPERM
    } else {
        EXIT_ERROR
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Sample(sample) => run_sample(&sample).await,
        Command::Symbols { names } => print_symbols(&names),
        Command::Maps => print_maps(),
    }
}

async fn run_sample(args: &SampleArgs) -> Result<()> {
    let quiet = args.quiet;
    let config = args.to_config();
    config.validate()?;
    run_preflight_checks()?;

    let inferior = SelfInferior::open().context("Failed to open own address space")?;
    let mut runtime = Runtime::attach(Box::new(inferior), &config.page_cache)
        .context("Failed to attach to the runtime in this process")?;

    if !quiet {
        println!("heapscope v{}", env!("CARGO_PKG_VERSION"));
        println!("heap: {}", runtime.shape());
        println!("samples: {}", config.sampler.samples);
        if let Some(ref export_path) = args.export {
            println!("export: {}", export_path.display());
        }
    }

    let mut exporter = args.export.as_ref().map(|_| JsonReportExporter::new());

    // Setup Ctrl+C handler
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let runs = args.repeat.max(1);
    let mut completed = 0;
    for run_index in 0..runs {
        if run_index > 0 {
            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(args.interval)) => {}
                _ = &mut ctrl_c => {
                    info!("Interrupted after {completed} runs");
                    break;
                }
            }
            runtime.reset().context("Failed to reset before the next run")?;
        }

        let report = StatisticalSampler::new(&runtime, &config.sampler)
            .run()
            .with_context(|| format!("Sampling run {} failed", run_index + 1))?;

        if runs > 1 && !quiet {
            println!("\n== run {}/{runs} (seed {}) ==", run_index + 1, report.seed);
        }
        print!("{report}");
        if let Some(ref mut exporter) = exporter {
            exporter.add_run(report);
        }
        completed += 1;
    }
    runtime.detach();

    if let (Some(exporter), Some(export_path)) = (exporter, args.export.as_ref()) {
        exporter.export_to_path(export_path).context("Failed to export report")?;
        if !quiet {
            println!("saved: {}", export_path.display());
        }
    }
    Ok(())
}

fn print_symbols(names: &[String]) -> Result<()> {
    let inferior = SelfInferior::open().context("Failed to read process symbols")?;
    let mut missing = 0;
    for name in names {
        match inferior.lookup_symbol(name) {
            Some(address) => println!("0x{address:016x} {name}"),
            None => {
                println!("{:>18} {name}", "-");
                missing += 1;
            }
        }
    }
    if missing > 0 {
        anyhow::bail!("{missing} of {} symbols not found", names.len());
    }
    Ok(())
}

fn print_maps() -> Result<()> {
    let (objects, symbols) = read_process_symbols().context("Failed to read loaded objects")?;
    for object in &objects {
        // load base, not map start: fixed-address executables relocate by zero
        match ElfSymbols::read(&object.path) {
            Ok(elf) => println!(
                "0x{:016x} {}",
                object.map_start.wrapping_sub(elf.link_base()),
                object.path.display()
            ),
            Err(e) => println!("{:>18} {} ({e})", "-", object.path.display()),
        }
    }
    println!("{} objects, {} symbols", objects.len(), symbols.len());
    Ok(())
}
