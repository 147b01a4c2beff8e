use std::path::Path;

use anyhow::{Context, Result};
use pdfium_render::prelude::{PdfDocument, PdfRenderConfig, Pdfium};

use super::{PageImage, PdfOpener, PdfPages};

/// [PdfOpener] backed by the pdfium library.
///
/// Pdfium is not safe to use from multiple threads; keep an instance on one thread, as
/// [super::RasterWorker] does.
pub struct PdfiumOpener {
    pdfium: Pdfium,
}

impl PdfiumOpener {
    /// Binds to the pdfium shared library at `library_path`, or to the one found on the system
    /// library search path if `None`.
    pub fn new(library_path: Option<&str>) -> Result<Self> {
        let bindings = match library_path {
            Some(library_path) => Pdfium::bind_to_library(library_path)
                .with_context(|| format!("binding to pdfium library at {:?}", library_path))?,
            None => Pdfium::bind_to_system_library()
                .context("binding to pdfium library on the system search path")?,
        };
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl PdfOpener for PdfiumOpener {
    fn open<'a>(&'a self, path: &Path) -> Result<Box<dyn PdfPages + 'a>> {
        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .with_context(|| format!("loading PDF {:?}", path))?;
        log::debug!("Opened PDF {:?}.", path);
        Ok(Box::new(PdfiumDocument { document }))
    }
}

/// Closes the pdfium document when dropped.
struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl PdfPages for PdfiumDocument<'_> {
    fn page_count(&self) -> u16 {
        self.document.pages().len()
    }

    fn render_page(&self, page_index: u16, scale: f32) -> Result<PageImage> {
        let page = self
            .document
            .pages()
            .get(page_index)
            .with_context(|| format!("getting page index {}", page_index))?;
        let config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&config)
            .with_context(|| format!("rendering page index {}", page_index))?;
        Ok(bitmap.as_image().into_rgb8())
    }
}
