use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use simplelog::LevelFilter;

mod extract;
mod figures;
mod pdfium;
mod region;
mod tables;

/// Extracts figures and tables from PDFs, guided by TEI markup describing where they are.
#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Logging level.
    #[arg(long, default_value = "Warn")]
    log_level: LevelFilter,
}

#[derive(Subcommand)]
enum Command {
    Extract(extract::Command),
    Region(region::Command),
    Tables(tables::Command),
    Figures(figures::Command),
}

pub fn run() -> Result<()> {
    let args = Args::parse();

    simplelog::SimpleLogger::init(args.log_level, simplelog::Config::default())
        .with_context(|| "configuring logging")?;

    use Command::*;
    match &args.command {
        Extract(cmd) => extract::run(cmd),
        Region(cmd) => region::run(cmd),
        Tables(cmd) => tables::run(cmd),
        Figures(cmd) => figures::run(cmd),
    }
}
