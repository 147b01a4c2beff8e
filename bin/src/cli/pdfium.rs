use anyhow::Result;
use clap::Args;
use extraction::raster::{PdfiumOpener, RasterWorker};

/// Options for locating the pdfium library.
#[derive(Args, Debug)]
pub struct PdfiumArgs {
    /// Path to the pdfium shared library. By default, it is looked up on the system library
    /// search path.
    #[arg(long)]
    pdfium_library: Option<String>,
}

impl PdfiumArgs {
    /// Starts the rasterization worker thread with pdfium bound on it.
    pub fn start_worker(&self) -> Result<RasterWorker> {
        let library_path = self.pdfium_library.clone();
        RasterWorker::spawn(move || PdfiumOpener::new(library_path.as_deref()))
    }
}
