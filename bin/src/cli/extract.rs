use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Result, bail};
use clap::Args;
use extraction::{
    batch::{self, BatchEvent, BatchEvents, BatchProcessor, BatchSummary},
    config::{BatchConfig, ImageFormat, UnidentifiedPolicy},
};
use simple_bar::ProgressBar;

use super::pdfium::PdfiumArgs;

/// Extracts the figures and tables of every markup document in a directory, rasterizing figures
/// from the paired PDFs.
#[derive(Args, Debug)]
pub struct Command {
    /// YAML configuration file. Options given on the command line override its settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base directory containing `tei/` and `pdf/`, with output written to `output/`.
    #[arg(long)]
    base: Option<PathBuf>,

    /// Directory of markup documents.
    #[arg(long)]
    markup_dir: Option<PathBuf>,

    /// Directory of source PDFs.
    #[arg(long)]
    pdf_dir: Option<PathBuf>,

    /// Directory to write per-document output into.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Resolution multiplier applied when rasterizing.
    #[arg(long)]
    zoom: Option<f32>,

    /// Image file format for figures (jpeg or png).
    #[arg(long)]
    image_format: Option<ImageFormat>,

    /// What to do with figures and tables without an identifier (skip or positional).
    #[arg(long)]
    unidentified: Option<UnidentifiedPolicy>,

    /// Maximum time in seconds to wait for the figures of one document to be rasterized.
    #[arg(long)]
    timeout_secs: Option<f64>,

    /// Write a CSV file mapping batch ids to PDF file names.
    #[arg(long)]
    index_file: Option<PathBuf>,

    /// Do not show a progress bar.
    #[arg(long, default_value = "false")]
    no_progress: bool,

    #[command(flatten)]
    pdfium: PdfiumArgs,
}

impl Command {
    fn batch_config(&self) -> Result<BatchConfig> {
        let mut config = match (&self.config, &self.base) {
            (Some(path), _) => BatchConfig::load(path)?,
            (None, Some(base)) => BatchConfig::from_base_dir(base),
            (None, None) => match (&self.markup_dir, &self.pdf_dir, &self.output_dir) {
                (Some(markup_dir), Some(pdf_dir), Some(output_dir)) => {
                    BatchConfig::new(markup_dir.clone(), pdf_dir.clone(), output_dir.clone())
                }
                _ => bail!(
                    "give --config, --base, or all of --markup-dir, --pdf-dir and --output-dir"
                ),
            },
        };

        if let Some(base) = &self.base {
            if self.config.is_some() {
                let defaults = BatchConfig::from_base_dir(base);
                config.markup_dir = defaults.markup_dir;
                config.pdf_dir = defaults.pdf_dir;
                config.output_dir = defaults.output_dir;
            }
        }
        if let Some(markup_dir) = &self.markup_dir {
            config.markup_dir = markup_dir.clone();
        }
        if let Some(pdf_dir) = &self.pdf_dir {
            config.pdf_dir = pdf_dir.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if let Some(zoom) = self.zoom {
            config.zoom_level = zoom;
        }
        if let Some(image_format) = self.image_format {
            config.image_format = image_format;
        }
        if let Some(unidentified) = self.unidentified {
            config.unidentified = unidentified;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.document_timeout_secs = Some(timeout_secs);
        }
        if let Some(index_file) = &self.index_file {
            config.index_file = Some(index_file.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

/// Runs the subcommand.
pub fn run(cmd: &Command) -> Result<()> {
    let config = cmd.batch_config()?;
    let worker = cmd.pdfium.start_worker()?;

    let continue_intent = Arc::new(AtomicBool::new(true));
    let mut events = EventDisplayer::new(!cmd.no_progress, continue_intent.clone());
    ctrlc::set_handler(move || continue_intent.store(false, Ordering::SeqCst))?;

    let outcome = BatchProcessor::new(&config, &worker.client())?.process_directory(&mut events);

    if let Err(err) = worker.shutdown() {
        log::warn!("Failed to shut down rasterization worker: {err}");
    }

    let summary = outcome?.summary();
    if summary.documents_failed > 0 {
        bail!("{} document(s) failed", summary.documents_failed);
    }
    Ok(())
}

struct EventDisplayer {
    show_progress: bool,
    progress_bar: Option<ProgressBar>,
    continue_intent: Arc<AtomicBool>,
}

impl EventDisplayer {
    fn new(show_progress: bool, continue_intent: Arc<AtomicBool>) -> Self {
        EventDisplayer {
            show_progress,
            progress_bar: None,
            continue_intent,
        }
    }
}

impl BatchEvents for EventDisplayer {
    fn on_event(&mut self, event: BatchEvent<'_>) {
        batch::log_event(&event);
        match event {
            BatchEvent::Started { total } => {
                if self.show_progress && total > 0 {
                    self.progress_bar = Some(ProgressBar::cargo_style(total as u32, 80, true));
                }
            }
            BatchEvent::DocumentDone { record, .. } => {
                if let Err(err) = &record.outcome {
                    eprintln!(
                        "Error (continuing) with {:?} ({}): {:#}.",
                        record.paths.markup,
                        batch::failure_kind(err),
                        err
                    );
                }
                if let Some(progress_bar) = self.progress_bar.as_mut() {
                    progress_bar.update();
                }
            }
            BatchEvent::Cancelled => {
                eprintln!("Extraction cancelled.");
            }
            BatchEvent::Completed { summary } => {
                eprintln!("Extraction complete. {}", describe_summary(&summary));
            }
        }
    }

    fn do_continue(&self) -> bool {
        self.continue_intent.load(Ordering::Relaxed)
    }
}

fn describe_summary(summary: &BatchSummary) -> String {
    format!(
        "Documents: {} succeeded, {} failed. Figures: {} written, {} skipped, {} failed. \
         Tables: {} written, {} skipped, {} failed.",
        summary.documents_succeeded,
        summary.documents_failed,
        summary.figures.written,
        summary.figures.skipped,
        summary.figures.failed,
        summary.tables.written,
        summary.tables.skipped,
        summary.tables.failed,
    )
}
