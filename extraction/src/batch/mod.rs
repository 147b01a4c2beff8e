//! Processing of a whole directory of markup documents and their source PDFs.

#[cfg(test)]
mod tests;

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use atomic_write_file::AtomicWriteFile;
use serde::Serialize;
use walkdir::WalkDir;

use crate::{
    config::BatchConfig,
    error,
    figures::{self, FIGURE_TAG, FigureRecord},
    markup::{self, Markup},
    output::{ItemOutcome, Tally, file_stem},
    raster::RasterClient,
    tables,
};

/// A markup document paired with its source PDF.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DocumentPaths {
    pub markup: PathBuf,
    pub pdf: PathBuf,
    /// File name of the source PDF, recorded in the index.
    pub pdf_name: String,
    /// Name of the document's output directory.
    pub base_name: String,
}

impl DocumentPaths {
    /// Pairs the markup file `file_name` with its PDF, or returns `None` if the name does not
    /// carry the markup suffix.
    fn pair(config: &BatchConfig, file_name: &str) -> Option<Self> {
        let pdf_name = file_name.strip_suffix(&config.markup_suffix)?;
        if pdf_name.is_empty() {
            return None;
        }
        let base_name = file_name
            .strip_suffix(&config.base_name_suffix)
            .filter(|base_name| !base_name.is_empty())
            .unwrap_or(pdf_name);
        Some(Self {
            markup: config.markup_dir.join(file_name),
            pdf: config.pdf_dir.join(pdf_name),
            pdf_name: pdf_name.to_owned(),
            base_name: base_name.to_owned(),
        })
    }
}

/// Lists the markup documents directly within `config.markup_dir`, sorted by file name.
pub fn list_documents(config: &BatchConfig) -> Result<Vec<DocumentPaths>> {
    let mut documents = Vec::new();
    for entry in WalkDir::new(&config.markup_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry =
            entry.with_context(|| format!("listing markup directory {:?}", config.markup_dir))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(file_name) = entry.file_name().to_str() else {
            log::warn!("Ignoring non-UTF-8 file name {:?}.", entry.file_name());
            continue;
        };
        match DocumentPaths::pair(config, file_name) {
            Some(document) => documents.push(document),
            None => log::debug!("Ignoring {:?}: not a markup document.", entry.path()),
        }
    }
    Ok(documents)
}

/// What was produced from one document.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DocumentReport {
    pub figures: Tally,
    pub tables: Tally,
}

/// One document of a batch and how processing it went.
#[derive(Debug)]
pub struct DocumentRecord {
    /// Batch id, used as the prefix of the document's output files.
    pub id: usize,
    pub paths: DocumentPaths,
    pub outcome: Result<DocumentReport>,
}

/// Totals over a batch.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BatchSummary {
    pub documents_succeeded: usize,
    pub documents_failed: usize,
    pub figures: Tally,
    pub tables: Tally,
}

/// Result of [BatchProcessor::process_directory].
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub documents: Vec<DocumentRecord>,
    /// Set if processing stopped early at the request of [BatchEvents::do_continue].
    pub cancelled: bool,
}

#[derive(Serialize)]
struct IndexRecord<'a> {
    pdf_id: usize,
    filename: &'a str,
}

impl BatchOutcome {
    /// Maps each batch id to the source PDF's file name, in id order.
    pub fn id_mapping(&self) -> Vec<(usize, &str)> {
        self.documents
            .iter()
            .map(|record| (record.id, record.paths.pdf_name.as_str()))
            .collect()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for record in &self.documents {
            match &record.outcome {
                Ok(report) => {
                    summary.documents_succeeded += 1;
                    summary.figures.merge(report.figures);
                    summary.tables.merge(report.tables);
                }
                Err(_) => summary.documents_failed += 1,
            }
        }
        summary
    }

    /// Writes the `pdf_id,filename` index as CSV to `path`, replacing it atomically.
    pub fn write_index(&self, path: &Path) -> Result<()> {
        let mut output = csv::Writer::from_writer(Vec::new());
        for (pdf_id, filename) in self.id_mapping() {
            output
                .serialize(IndexRecord { pdf_id, filename })
                .with_context(|| format!("writing index row for id {pdf_id}"))?;
        }
        let data = output
            .into_inner()
            .map_err(|err| anyhow!("flushing index CSV: {}", err.error()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory for index {:?}", path))?;
        }
        let mut file = AtomicWriteFile::open(path)
            .with_context(|| format!("opening index {:?} for writing", path))?;
        file.write_all(&data)
            .with_context(|| format!("writing index {:?}", path))?;
        file.commit()
            .with_context(|| format!("committing index {:?}", path))?;
        Ok(())
    }
}

/// Batch event emitted to track progress.
#[derive(Debug)]
pub enum BatchEvent<'a> {
    /// Processing of the documents is about to start.
    Started { total: usize },
    /// A document has been processed, successfully or not.
    DocumentDone {
        record: &'a DocumentRecord,
        completed: usize,
        total: usize,
    },
    /// Processing stopped before all documents were processed.
    Cancelled,
    /// All documents were processed, and no more events will follow.
    Completed { summary: BatchSummary },
}

/// Trait to implement to receive notifications about batch events, or to cancel processing
/// between documents.
pub trait BatchEvents {
    fn on_event(&mut self, event: BatchEvent<'_>);
    fn do_continue(&self) -> bool;
}

/// [BatchEvents] that only logs.
pub struct LogEvents;

impl BatchEvents for LogEvents {
    fn on_event(&mut self, event: BatchEvent<'_>) {
        log_event(&event);
    }

    fn do_continue(&self) -> bool {
        true
    }
}

/// Logs `event` at a level reflecting its severity.
pub fn log_event(event: &BatchEvent<'_>) {
    match event {
        BatchEvent::Started { total } => log::info!("Processing {} document(s).", total),
        BatchEvent::DocumentDone {
            record,
            completed,
            total,
        } => match &record.outcome {
            Ok(report) => log::info!(
                "[{}/{}] {:?}: {} figure(s), {} table(s) written.",
                completed,
                total,
                record.paths.markup,
                report.figures.written,
                report.tables.written,
            ),
            Err(err) => log::error!(
                "[{}/{}] Failed to process {:?} (id {}, {}): {:#}",
                completed,
                total,
                record.paths.markup,
                record.id,
                failure_kind(err),
                err,
            ),
        },
        BatchEvent::Cancelled => log::warn!("Batch processing cancelled."),
        BatchEvent::Completed { summary } => log::info!("Batch complete: {:?}", summary),
    }
}

/// Short description of the kind of a document failure.
pub fn failure_kind(err: &anyhow::Error) -> String {
    match error::classify(err) {
        Some(kind) => kind.to_string(),
        None => "error".to_string(),
    }
}

/// Processes markup documents and their PDFs into figure images and table fragments.
pub struct BatchProcessor<'a> {
    config: &'a BatchConfig,
    raster: RasterClient,
}

impl<'a> BatchProcessor<'a> {
    /// Creates a processor that rasterizes through `raster`, applying the configured
    /// per-document timeout.
    pub fn new(config: &'a BatchConfig, raster: &RasterClient) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            raster: raster.with_timeout(config.document_timeout()),
        })
    }

    /// Processes every document in the markup directory, in file name order. Each is assigned
    /// the next batch id before it is processed. A document failing does not stop the batch.
    ///
    /// Fails only if the markup directory cannot be listed, or the index cannot be written.
    pub fn process_directory(&self, events: &mut dyn BatchEvents) -> Result<BatchOutcome> {
        let documents = list_documents(self.config)?;
        let total = documents.len();
        events.on_event(BatchEvent::Started { total });

        let mut outcome = BatchOutcome::default();
        for (id, paths) in documents.into_iter().enumerate() {
            let result = self
                .process_document(id, &paths)
                .with_context(|| format!("processing {:?}", paths.markup));
            outcome.documents.push(DocumentRecord {
                id,
                paths,
                outcome: result,
            });

            if let Some(record) = outcome.documents.last() {
                events.on_event(BatchEvent::DocumentDone {
                    record,
                    completed: id + 1,
                    total,
                });
            }
            if id + 1 < total && !events.do_continue() {
                outcome.cancelled = true;
                events.on_event(BatchEvent::Cancelled);
                break;
            }
        }

        if let Some(index_file) = &self.config.index_file {
            outcome.write_index(index_file)?;
        }
        if !outcome.cancelled {
            events.on_event(BatchEvent::Completed {
                summary: outcome.summary(),
            });
        }
        Ok(outcome)
    }

    /// Extracts the figures and tables of one document into
    /// `{output_dir}/{base_name}/images` and `{output_dir}/{base_name}/tables`.
    pub fn process_document(&self, id: usize, paths: &DocumentPaths) -> Result<DocumentReport> {
        let text = markup::read_document(&paths.markup)?;
        let markup = Markup::parse(&text)?;

        let document_dir = self.config.output_dir.join(&paths.base_name);
        let figures = self.extract_figures(id, paths, &markup, &document_dir.join("images"))?;

        let fragments = tables::export_tables(&markup);
        let mut table_tally = Tally::default();
        for outcome in tables::write_fragments(
            &fragments,
            &document_dir.join("tables"),
            id,
            self.config.unidentified,
        )? {
            table_tally.add(&outcome);
        }

        Ok(DocumentReport {
            figures,
            tables: table_tally,
        })
    }

    fn extract_figures(
        &self,
        id: usize,
        paths: &DocumentPaths,
        markup: &Markup<'_>,
        images_dir: &Path,
    ) -> Result<Tally> {
        let mut tally = Tally::default();
        let scan = figures::scan_figures(&markup.read(FIGURE_TAG));
        tally.skipped += scan.without_coordinates;
        for err in scan.failures {
            log::warn!("Skipping figure in {:?}: {:#}", paths.markup, err);
            tally.add(&ItemOutcome::Failed(err));
        }

        let mut named: Vec<(FigureRecord, String)> = Vec::new();
        for record in scan.records {
            match file_stem(
                id,
                record.identifier.as_deref(),
                "figure",
                record.position,
                self.config.unidentified,
            ) {
                Some(stem) => named.push((record, stem)),
                None => {
                    log::info!(
                        "Skipping figure at position {} of {:?}: caption has no identifier.",
                        record.position,
                        paths.markup
                    );
                    tally.add(&ItemOutcome::Skipped);
                }
            }
        }

        fs::create_dir_all(images_dir)
            .with_context(|| format!("creating image output directory {:?}", images_dir))?;
        if named.is_empty() {
            return Ok(tally);
        }

        let regions = named.iter().map(|(record, _)| record.coordinates).collect();
        let images = self
            .raster
            .rasterize_document(&paths.pdf, regions, self.config.zoom_level)?;

        for ((mut record, stem), image) in named.into_iter().zip(images) {
            let outcome = image.and_then(|image| {
                let path = images_dir.join(format!(
                    "{stem}.{}",
                    self.config.image_format.extension()
                ));
                figures::save_image(record.image.insert(image), &path, self.config.image_format)?;
                Ok(path)
            });
            let outcome = match outcome {
                Ok(path) => ItemOutcome::Written(path),
                Err(err) => {
                    log::warn!(
                        "Failed to extract figure {:?} of {:?}: {:#}",
                        stem,
                        paths.markup,
                        err
                    );
                    ItemOutcome::Failed(err)
                }
            };
            tally.add(&outcome);
        }
        Ok(tally)
    }
}

/// Processes every document under `config` with default event handling, returning the batch id
/// to source PDF name mapping.
pub fn process_directory(config: &BatchConfig, raster: &RasterClient) -> Result<Vec<(usize, String)>> {
    let outcome = BatchProcessor::new(config, raster)?.process_directory(&mut LogEvents)?;
    Ok(outcome
        .id_mapping()
        .into_iter()
        .map(|(id, name)| (id, name.to_owned()))
        .collect())
}
