use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use extraction::{
    config::UnidentifiedPolicy,
    markup::{self, Markup},
    output::{ItemOutcome, Tally},
    tables,
};

/// Exports the tables of one markup document as standalone XML fragments.
#[derive(Args, Debug)]
pub struct Command {
    /// Path to the markup document.
    markup: PathBuf,

    /// Directory to write fragments into.
    output_dir: PathBuf,

    /// Prefix of the written file names.
    #[arg(long, default_value = "0")]
    batch_id: usize,

    /// What to do with tables without an identifier (skip or positional).
    #[arg(long, default_value = "skip")]
    unidentified: UnidentifiedPolicy,
}

/// Runs the subcommand.
pub fn run(cmd: &Command) -> Result<()> {
    let text = markup::read_document(&cmd.markup)?;
    let markup = Markup::parse(&text)?;
    let fragments = tables::export_tables(&markup);

    let mut tally = Tally::default();
    for outcome in
        tables::write_fragments(&fragments, &cmd.output_dir, cmd.batch_id, cmd.unidentified)?
    {
        if let ItemOutcome::Written(path) = &outcome {
            println!("{}", path.display());
        }
        tally.add(&outcome);
    }
    eprintln!(
        "Tables: {} written, {} skipped, {} failed.",
        tally.written, tally.skipped, tally.failed
    );
    Ok(())
}
