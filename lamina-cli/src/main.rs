use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use lamina_core::layers::standard_registry;
use lamina_core::{CompileOptions, LayerRegistry, SourceUnit, compile_session, load_sources};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Compile Lamina sources with the layer stack claimed by each file's extension.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Source files or directories to compile
    #[arg(value_name = "PATH", required_unless_present_any = ["list_passes", "keywords"])]
    inputs: Vec<PathBuf>,

    #[arg(
        short,
        long,
        value_name = "DIR",
        help = "Write rendered units below DIR instead of standard output"
    )]
    output: Option<PathBuf>,

    #[arg(long, value_name = "PASS", help = "Stop every unit after the named pass")]
    stop_after: Option<String>,

    #[arg(long, help = "Print the resolved pipeline of every layer stack")]
    list_passes: bool,

    #[arg(long, help = "Print the keyword set of every layer stack")]
    keywords: bool,

    #[arg(long, help = "Compile units one at a time")]
    sequential: bool,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    execute(cli)
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn execute(cli: Cli) -> Result<()> {
    let registry = standard_registry().context("failed to assemble the standard layer stacks")?;

    if cli.list_passes || cli.keywords {
        describe(&registry, cli.list_passes, cli.keywords);
        if cli.inputs.is_empty() {
            return Ok(());
        }
    }

    let mut units = Vec::new();
    for input in &cli.inputs {
        let loaded = load_sources(input, |path| registry.claims(path))
            .with_context(|| format!("failed to load sources from {}", input.display()))?;
        if loaded.is_empty() {
            bail!("no Lamina sources found under {}", input.display());
        }
        units.extend(loaded);
    }
    info!(units = units.len(), "loaded sources");

    let options = CompileOptions {
        parallel: !cli.sequential,
        stop_after: cli.stop_after.clone(),
        emit_output: true,
    };
    let report = compile_session(&registry, &units, &options).context("compilation aborted")?;

    for (unit, result) in units.iter().zip(&report.units) {
        for diagnostic in &result.diagnostics {
            eprintln!("{}: {diagnostic}", unit.path.display());
        }
        if let Some(text) = &result.output {
            match &cli.output {
                Some(dir) => write_output(dir, unit, text)?,
                None => print!("{text}"),
            }
        }
    }

    if report.failed() {
        let failed = report.units.iter().filter(|unit| unit.failed).count();
        bail!(
            "{failed} of {} unit(s) failed with {} error(s)",
            report.units.len(),
            report.error_count()
        );
    }
    Ok(())
}

fn describe(registry: &LayerRegistry, passes: bool, keywords: bool) {
    for bootstrap in registry.bootstraps() {
        let extensions: Vec<_> = bootstrap
            .file_extensions()
            .iter()
            .map(|ext| format!(".{ext}"))
            .collect();
        println!("{} ({})", bootstrap.name(), extensions.join(", "));
        if passes {
            println!("  passes: {}", bootstrap.pipeline().ids().join(" -> "));
        }
        if keywords {
            let words: Vec<_> = bootstrap.keywords().iter().collect();
            println!("  keywords: {}", words.join(" "));
        }
    }
}

fn write_output(dir: &Path, unit: &SourceUnit, text: &str) -> Result<()> {
    let path = dir.join(&unit.relative);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(&path, text)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}
