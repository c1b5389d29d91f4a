//! mirgen CLI
//!
//! Inspection tools for serialized MIR assemblies.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use mirgen::mir::{format_assembly, verify_body, MirAssembly};
use mirgen::{EmitterConfig, MirError};

#[derive(Parser)]
#[command(name = "mirgen", version, about = "MIR assembly inspection")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pretty-print a serialized assembly
    Dump {
        /// Assembly JSON file
        file: PathBuf,
    },
    /// Check every body of a serialized assembly for structural problems
    Check {
        /// Assembly JSON file
        file: PathBuf,
    },
    /// Print the effective emitter configuration
    Config {
        /// TOML file to load (defaults are printed if omitted)
        file: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("MIRGEN_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Dump { file } => dump_file(&file),
        Command::Check { file } => check_file(&file),
        Command::Config { file } => print_config(file.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_assembly(path: &Path) -> mirgen::Result<MirAssembly> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| MirError::io_error(format!("{}: {}", path.display(), e)))?;
    MirAssembly::from_json(&json)
}

fn dump_file(path: &Path) -> mirgen::Result<()> {
    let masm = load_assembly(path)?;
    print!("{}", format_assembly(&masm));
    Ok(())
}

fn check_file(path: &Path) -> mirgen::Result<()> {
    let masm = load_assembly(path)?;
    let mut failures = 0;

    for (key, decl) in &masm.invoke_decls {
        let params: Vec<String> = decl.params.iter().map(|p| p.name.clone()).collect();
        if let Err(violations) = verify_body(&decl.body, &params) {
            failures += 1;
            for v in violations {
                println!("{}: {}", key, v);
            }
        }
    }

    if failures > 0 {
        return Err(MirError::Rejected(vec![mirgen::error::Diagnostic::unlocated(format!(
            "{} malformed bod{}",
            failures,
            if failures == 1 { "y" } else { "ies" }
        ))]));
    }

    println!("✓ {} bodies are well formed", masm.invoke_decls.len());
    Ok(())
}

fn print_config(path: Option<&Path>) -> mirgen::Result<()> {
    let config = match path {
        Some(p) => EmitterConfig::load(p)?,
        None => EmitterConfig::default(),
    };
    print!("{}", config.to_toml_string()?);
    Ok(())
}
