// Migo compiler CLI
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use migoc::check::check_file;
use migoc::importer::StdImporter;
use migoc::parser::parse_file;
use migoc::printer::print_file;
use migoc::transform::transform_file;

#[derive(Parser)]
#[command(name = "migoc")]
#[command(version = "0.1.0")]
#[command(about = "Compiler front-end for Migo, a Go-like language with generics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a Migo source file for syntax and type errors
    Check {
        /// Input Migo source file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Monomorphize a Migo source file and write the resulting program
    Build {
        /// Input Migo source file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file (defaults to <input>.go)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Write the generic registry as JSON for inspection
        #[arg(long, value_name = "REGISTRY")]
        emit_registry: Option<PathBuf>,

        /// Verbose output showing pipeline stages
        #[arg(short, long)]
        verbose: bool,
    },

    /// Build a Migo source file and run it with the host Go toolchain
    Run {
        /// Input Migo source file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Check { input } => check(&input),
        Commands::Build {
            input,
            output,
            emit_registry,
            verbose,
        } => {
            build(&input, output.as_deref(), emit_registry.as_deref(), verbose)?;
            Ok(())
        }
        Commands::Run { input } => run(&input),
    }
}

fn check(input: &Path) -> Result<()> {
    let source = fs::read_to_string(input)
        .with_context(|| format!("could not read {}", input.display()))?;
    let file = parse_file(&source).map_err(|err| anyhow::anyhow!("{}: {}", input.display(), err))?;
    let mut importer = StdImporter::new();
    let checked = check_file(&file, &mut importer);
    if !checked.is_ok() {
        for diagnostic in &checked.diagnostics {
            eprintln!("{}: {}", input.display(), diagnostic);
        }
        bail!("{} errors", checked.diagnostics.len());
    }
    Ok(())
}

fn build(
    input: &Path,
    output: Option<&Path>,
    emit_registry: Option<&Path>,
    verbose: bool,
) -> Result<PathBuf> {
    if input.extension().and_then(|e| e.to_str()) != Some("mg") {
        bail!("{} is not a Migo file (expected '.mg' extension)", input.display());
    }
    let source = fs::read_to_string(input)
        .with_context(|| format!("could not read {}", input.display()))?;

    if verbose {
        eprintln!("parsing {}", input.display());
    }
    let file = parse_file(&source).map_err(|err| anyhow::anyhow!("{}: {}", input.display(), err))?;

    if verbose {
        eprintln!("checking {}", input.display());
    }
    let mut importer = StdImporter::new();
    let checked = check_file(&file, &mut importer);
    if !checked.is_ok() {
        for diagnostic in &checked.diagnostics {
            eprintln!("{}: {}", input.display(), diagnostic);
        }
        bail!("{} errors", checked.diagnostics.len());
    }

    if let Some(registry_path) = emit_registry {
        let summary = checked.registry.summary(&checked.arena);
        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(registry_path, json)
            .with_context(|| format!("could not write {}", registry_path.display()))?;
    }

    if verbose {
        eprintln!("transforming {}", input.display());
    }
    let transformed = transform_file(&file, &checked)?;
    let text = print_file(&transformed);

    let out_path = match output {
        Some(path) => path.to_path_buf(),
        None => input.with_extension("go"),
    };
    fs::write(&out_path, text)
        .with_context(|| format!("could not write {}", out_path.display()))?;
    if verbose {
        eprintln!("wrote {}", out_path.display());
    }
    Ok(out_path)
}

fn run(input: &Path) -> Result<()> {
    let out_path = build(input, None, None, false)?;
    let status = Command::new("go")
        .arg("run")
        .arg(&out_path)
        .status()
        .context("could not invoke the go toolchain")?;
    if !status.success() {
        bail!("go run exited with {}", status);
    }
    Ok(())
}
