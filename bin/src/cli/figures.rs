use std::{
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Args;
use extraction::{
    figures::{self, FIGURE_TAG},
    markup::{self, Markup},
};
use serde::Serialize;

/// Lists the figures of one markup document that have coordinates, as JSON lines.
#[derive(Args, Debug)]
pub struct Command {
    /// Path to the markup document.
    markup: PathBuf,
}

#[derive(Serialize)]
struct FigureLine<'a> {
    position: usize,
    identifier: Option<&'a str>,
    page: i64,
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    description: Option<&'a str>,
}

/// Runs the subcommand.
pub fn run(cmd: &Command) -> Result<()> {
    let text = markup::read_document(&cmd.markup)?;
    let markup = Markup::parse(&text)?;
    let scan = figures::scan_figures(&markup.read(FIGURE_TAG));

    for err in &scan.failures {
        log::warn!("{:#}", err);
    }

    let mut stdout = io::stdout().lock();
    for record in &scan.records {
        let coords = &record.coordinates;
        let line = FigureLine {
            position: record.position,
            identifier: record.identifier.as_deref(),
            page: coords.page,
            x: coords.x,
            y: coords.y,
            w: coords.w,
            h: coords.h,
            description: record.description.as_deref(),
        };
        serde_json::to_writer(&mut stdout, &line).context("writing figure as JSON")?;
        writeln!(stdout).context("writing figure as JSON")?;
    }
    Ok(())
}
