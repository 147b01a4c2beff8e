use std::{fs, path::Path};

use anyhow::Result;
use googletest::prelude::*;
use tempfile::TempDir;
use testutils::{anyhow_downcasts_to, tei_document};

use super::*;
use crate::{
    ExtractError,
    config::{ImageFormat, UnidentifiedPolicy},
    raster::{RasterWorker, fake::FakeOpener},
};

const IDENTIFIED: &str = r#"
<figure xml:id="fig_0">
  <head>Figure 1</head>
  <figDesc>Figure 1. Overview of the pipeline.</figDesc>
  <graphic coords="1,10.0,20.0,100.0,50.0" />
</figure>
<figure xml:id="fig_1">
  <figDesc>A figure without a number.</figDesc>
  <graphic coords="1,0.0,0.0,10.0,10.0" />
</figure>
<figure xml:id="fig_2">
  <figDesc>Fig. 2: no coordinates.</figDesc>
</figure>
<figure type="table" xml:id="tab_0">
  <head>Table 1: Results</head>
  <table><row><cell>a</cell></row></table>
</figure>
"#;

/// Lays out `<base>/tei` and `<base>/pdf` with one markup document and fake PDF per name.
struct Fixture {
    dir: TempDir,
    config: BatchConfig,
}

impl Fixture {
    fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let config = BatchConfig::from_base_dir(dir.path());
        fs::create_dir_all(&config.markup_dir)?;
        fs::create_dir_all(&config.pdf_dir)?;
        Ok(Self { dir, config })
    }

    fn add(&self, pdf_name: &str, markup: &str) -> Result<()> {
        fs::write(
            self.config.markup_dir.join(format!("{pdf_name}.tei.xml")),
            markup,
        )?;
        fs::write(self.config.pdf_dir.join(pdf_name), b"%PDF-fake")?;
        Ok(())
    }

    fn output(&self, relative: &str) -> std::path::PathBuf {
        self.config.output_dir.join(relative)
    }

    fn run(&self, opener: &FakeOpener) -> Result<BatchOutcome> {
        let worker_opener = opener.clone();
        let worker = RasterWorker::spawn(move || Ok(worker_opener))?;
        let outcome = BatchProcessor::new(&self.config, &worker.client())?
            .process_directory(&mut LogEvents)?;
        worker.shutdown()?;
        Ok(outcome)
    }
}

fn file_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

#[gtest]
fn test_list_documents_pairs_and_sorts() -> Result<()> {
    let fixture = Fixture::new()?;
    fixture.add("b.pdf", "")?;
    fixture.add("a.pdf", "")?;
    fs::write(fixture.config.markup_dir.join("notes.txt"), "")?;
    fs::create_dir(fixture.config.markup_dir.join("c.pdf.tei.xml"))?;

    let documents = list_documents(&fixture.config)?;

    expect_eq!(
        documents,
        vec![
            DocumentPaths {
                markup: fixture.config.markup_dir.join("a.pdf.tei.xml"),
                pdf: fixture.config.pdf_dir.join("a.pdf"),
                pdf_name: "a.pdf".to_string(),
                base_name: "a".to_string(),
            },
            DocumentPaths {
                markup: fixture.config.markup_dir.join("b.pdf.tei.xml"),
                pdf: fixture.config.pdf_dir.join("b.pdf"),
                pdf_name: "b.pdf".to_string(),
                base_name: "b".to_string(),
            },
        ]
    );
    Ok(())
}

#[gtest]
fn test_base_name_falls_back_to_markup_suffix() -> Result<()> {
    let mut fixture = Fixture::new()?;
    fixture.config.markup_suffix = ".xml".to_string();
    fs::write(fixture.config.markup_dir.join("paper.xml"), "")?;

    let documents = list_documents(&fixture.config)?;

    let base_names: Vec<&str> = documents.iter().map(|d| d.base_name.as_str()).collect();
    expect_eq!(base_names, vec!["paper"]);
    Ok(())
}

#[gtest]
fn test_process_directory_writes_figures_and_tables() -> Result<()> {
    let fixture = Fixture::new()?;
    fixture.add("paper.pdf", &tei_document(IDENTIFIED))?;
    let opener = FakeOpener::new(2);

    let outcome = fixture.run(&opener)?;

    expect_that!(outcome.cancelled, eq(false));
    expect_that!(file_names(&fixture.output("paper/images"))?, elements_are![eq("0_figure1.jpg")]);
    expect_that!(file_names(&fixture.output("paper/tables"))?, elements_are![eq("0_table1.xml")]);
    let image = image::open(fixture.output("paper/images/0_figure1.jpg"))?;
    expect_eq!((image.width(), image.height()), (200, 100));

    expect_eq!(
        outcome.summary(),
        BatchSummary {
            documents_succeeded: 1,
            documents_failed: 0,
            figures: Tally {
                // Unnumbered, without coordinates, and the table.
                written: 1,
                skipped: 3,
                failed: 0,
            },
            tables: Tally {
                written: 1,
                skipped: 0,
                failed: 0,
            },
        }
    );
    expect_eq!(opener.opened(), vec![fixture.config.pdf_dir.join("paper.pdf")]);
    expect_eq!(opener.open_handles(), 0);
    Ok(())
}

#[gtest]
fn test_positional_names_and_png_output() -> Result<()> {
    let mut fixture = Fixture::new()?;
    fixture.config.unidentified = UnidentifiedPolicy::Positional;
    fixture.config.image_format = ImageFormat::Png;
    fixture.add("paper.pdf", &tei_document(IDENTIFIED))?;

    fixture.run(&FakeOpener::new(2))?;

    expect_that!(
        file_names(&fixture.output("paper/images"))?,
        elements_are![eq("0_figure1.png"), eq("0_figure_pos1.png")]
    );
    Ok(())
}

#[gtest]
fn test_failing_document_does_not_stop_batch() -> Result<()> {
    let fixture = Fixture::new()?;
    fixture.add("a.pdf", &tei_document(IDENTIFIED))?;
    fixture.add("b.pdf", "<TEI><unclosed></TEI>")?;
    fixture.add("c.pdf", &tei_document(IDENTIFIED))?;

    let outcome = fixture.run(&FakeOpener::new(2))?;

    expect_eq!(
        outcome.id_mapping(),
        vec![(0, "a.pdf"), (1, "b.pdf"), (2, "c.pdf")]
    );
    let summary = outcome.summary();
    expect_eq!(summary.documents_succeeded, 2);
    expect_eq!(summary.documents_failed, 1);
    expect_that!(
        outcome.documents[1].outcome,
        err(anyhow_downcasts_to::<ExtractError, _>(eq(
            ExtractError::MalformedDocument
        )))
    );
    expect_that!(fixture.output("c/images/2_figure1.jpg").exists(), eq(true));
    Ok(())
}

#[gtest]
fn test_missing_pdf_fails_only_that_document() -> Result<()> {
    let fixture = Fixture::new()?;
    fixture.add("a.pdf", &tei_document(IDENTIFIED))?;
    fs::write(
        fixture.config.markup_dir.join("orphan.pdf.tei.xml"),
        tei_document(IDENTIFIED),
    )?;

    let outcome = fixture.run(&FakeOpener::new(2))?;

    expect_eq!(outcome.documents.len(), 2);
    expect_that!(outcome.documents[0].outcome.is_ok(), eq(true));
    expect_that!(outcome.documents[1].outcome.is_err(), eq(true));
    Ok(())
}

#[gtest]
fn test_out_of_range_figure_is_counted_as_failure() -> Result<()> {
    let fixture = Fixture::new()?;
    fixture.add(
        "paper.pdf",
        &tei_document(
            r#"
<figure><figDesc>Figure 4</figDesc><graphic coords="9,0,0,10,10"/></figure>
<figure><figDesc>Figure 5</figDesc><graphic coords="1,0,0,10,10"/></figure>
<figure><figDesc>Figure 6</figDesc><graphic coords="1,x,0,10,10"/></figure>
"#,
        ),
    )?;

    let outcome = fixture.run(&FakeOpener::new(2))?;

    let report = outcome.documents[0].outcome.as_ref().map_err(|err| anyhow::anyhow!("{err:#}"))?;
    expect_eq!(
        report.figures,
        Tally {
            written: 1,
            skipped: 0,
            failed: 2,
        }
    );
    expect_that!(file_names(&fixture.output("paper/images"))?, elements_are![eq("0_figure5.jpg")]);
    Ok(())
}

#[gtest]
fn test_write_index() -> Result<()> {
    let mut fixture = Fixture::new()?;
    let index = fixture.dir.path().join("out/index.csv");
    fixture.config.index_file = Some(index.clone());
    fixture.add("z.pdf", &tei_document(""))?;
    fixture.add("m.pdf", &tei_document(""))?;

    fixture.run(&FakeOpener::new(1))?;

    expect_eq!(fs::read_to_string(&index)?, "pdf_id,filename\n0,m.pdf\n1,z.pdf\n");
    Ok(())
}

/// Records events, and asks to stop after `stop_after` documents.
struct Recorder {
    stop_after: usize,
    done: usize,
    events: Vec<String>,
}

impl BatchEvents for Recorder {
    fn on_event(&mut self, event: BatchEvent<'_>) {
        let description = match event {
            BatchEvent::Started { total } => format!("started {total}"),
            BatchEvent::DocumentDone {
                record,
                completed,
                total,
            } => {
                self.done += 1;
                format!("{} {completed}/{total}", record.paths.pdf_name)
            }
            BatchEvent::Cancelled => "cancelled".to_string(),
            BatchEvent::Completed { summary } => {
                format!("completed {}", summary.documents_succeeded)
            }
        };
        self.events.push(description);
    }

    fn do_continue(&self) -> bool {
        self.done < self.stop_after
    }
}

#[gtest]
fn test_events_and_cancellation() -> Result<()> {
    let fixture = Fixture::new()?;
    for name in ["a.pdf", "b.pdf", "c.pdf"] {
        fixture.add(name, &tei_document(""))?;
    }
    let opener = FakeOpener::new(1);
    let worker_opener = opener.clone();
    let worker = RasterWorker::spawn(move || Ok(worker_opener))?;
    let processor = BatchProcessor::new(&fixture.config, &worker.client())?;

    let mut all = Recorder {
        stop_after: usize::MAX,
        done: 0,
        events: Vec::new(),
    };
    let outcome = processor.process_directory(&mut all)?;
    expect_that!(outcome.cancelled, eq(false));
    expect_eq!(
        all.events,
        vec!["started 3", "a.pdf 1/3", "b.pdf 2/3", "c.pdf 3/3", "completed 3"]
    );

    let mut stopping = Recorder {
        stop_after: 1,
        done: 0,
        events: Vec::new(),
    };
    let outcome = processor.process_directory(&mut stopping)?;
    expect_that!(outcome.cancelled, eq(true));
    expect_eq!(outcome.documents.len(), 1);
    expect_eq!(stopping.events, vec!["started 3", "a.pdf 1/3", "cancelled"]);

    drop(processor);
    worker.shutdown()?;
    Ok(())
}

#[gtest]
fn test_rejects_invalid_config() -> Result<()> {
    let mut fixture = Fixture::new()?;
    fixture.config.zoom_level = 0.0;
    let worker = RasterWorker::spawn(|| Ok(FakeOpener::new(1)))?;
    expect_that!(
        BatchProcessor::new(&fixture.config, &worker.client()).map(|_| ()),
        err(displays_as(contains_substring("zoom_level")))
    );
    worker.shutdown()?;
    Ok(())
}
