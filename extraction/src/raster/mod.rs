//! Rasterization of page regions from source PDFs.

#[cfg(test)]
pub(crate) mod fake;
mod pdfium;
mod server;

use std::path::Path;

use anyhow::{Result, bail};
use image::{ImageBuffer, Rgb};

pub use pdfium::PdfiumOpener;
pub use server::{RasterClient, RasterWorker};

use crate::{
    ExtractError,
    coords::{CoordinateSpec, PageRect},
};

/// 24-bit RGB pixels, row-major, top-to-bottom.
pub type PageImage = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// Default resolution multiplier. A zoom of 1 yields one pixel per PDF point.
pub const DEFAULT_ZOOM: f32 = 2.0;

const BLANK: Rgb<u8> = Rgb([255, 255, 255]);

/// An open PDF document. Dropping it releases the underlying handle.
pub trait PdfPages {
    fn page_count(&self) -> u16;

    /// Renders the whole of the page at `page_index`, at `scale` pixels per point.
    fn render_page(&self, page_index: u16, scale: f32) -> Result<PageImage>;
}

/// Opens PDF documents from the filesystem.
pub trait PdfOpener {
    fn open<'a>(&'a self, path: &Path) -> Result<Box<dyn PdfPages + 'a>>;
}

/// Rasterizes the region described by `coords` from the PDF at `pdf_path`.
///
/// Returns `None` without touching the PDF if `coords` is absent or blank. The document is open
/// only for the duration of the call.
pub fn rasterize(
    opener: &dyn PdfOpener,
    pdf_path: &Path,
    coords: Option<&str>,
    zoom: f32,
) -> Result<Option<PageImage>> {
    let Some(region) = CoordinateSpec::parse_optional(coords)? else {
        return Ok(None);
    };
    let pdf = opener.open(pdf_path)?;
    rasterize_region(pdf.as_ref(), &region, zoom).map(Some)
}

/// Rasterizes every region in `regions` from a single opening of the PDF at `pdf_path`.
///
/// Fails as a whole only if the document cannot be opened; each region otherwise gets its own
/// result, in the order given.
pub fn rasterize_regions(
    opener: &dyn PdfOpener,
    pdf_path: &Path,
    regions: &[CoordinateSpec],
    zoom: f32,
) -> Result<Vec<Result<PageImage>>> {
    let pdf = opener.open(pdf_path)?;
    let mut renderer = CachedPageRenderer::new(pdf.as_ref(), zoom);
    Ok(regions
        .iter()
        .map(|region| renderer.rasterize(region))
        .collect())
}

/// Rasterizes `region` from an already open document.
pub fn rasterize_region(
    pdf: &dyn PdfPages,
    region: &CoordinateSpec,
    zoom: f32,
) -> Result<PageImage> {
    CachedPageRenderer::new(pdf, zoom).rasterize(region)
}

/// Copies `rect` (in points) out of a page rendered at `zoom`.
///
/// The output is always `round(width * zoom)` by `round(height * zoom)` pixels; any part of the
/// rectangle that falls outside the rendered page is left blank.
pub fn crop_region(page: &PageImage, rect: &PageRect, zoom: f32) -> PageImage {
    let scale = f64::from(zoom);
    let left = (rect.left * scale).round() as i64;
    let top = (rect.top * scale).round() as i64;
    let width = (rect.width() * scale).round().max(0.0) as u32;
    let height = (rect.height() * scale).round().max(0.0) as u32;

    let mut region = PageImage::from_pixel(width, height, BLANK);
    image::imageops::replace(&mut region, page, -left, -top);
    region
}

/// Renders pages of one document, keeping the most recently rendered page so that consecutive
/// regions on the same page only render it once.
struct CachedPageRenderer<'a> {
    pdf: &'a dyn PdfPages,
    zoom: f32,
    last_page: Option<(u16, PageImage)>,
}

impl<'a> CachedPageRenderer<'a> {
    fn new(pdf: &'a dyn PdfPages, zoom: f32) -> Self {
        Self {
            pdf,
            zoom,
            last_page: None,
        }
    }

    fn rasterize(&mut self, region: &CoordinateSpec) -> Result<PageImage> {
        if !(self.zoom.is_finite() && self.zoom > 0.0) {
            bail!("zoom must be a positive number, got {}", self.zoom);
        }
        let page_index = resolve_page_index(self.pdf, region)?;

        let page = match self.last_page.take() {
            Some((index, page)) if index == page_index => page,
            _ => self.pdf.render_page(page_index, self.zoom)?,
        };
        let image = crop_region(&page, &region.rect(), self.zoom);
        self.last_page = Some((page_index, page));
        Ok(image)
    }
}

fn resolve_page_index(pdf: &dyn PdfPages, region: &CoordinateSpec) -> Result<u16> {
    let page_count = pdf.page_count();
    let page_index = region.page_index();
    if page_index < 0 || page_index >= i64::from(page_count) {
        return Err(ExtractError::PageOutOfRange {
            page_index,
            page_count,
        }
        .into());
    }
    Ok(page_index as u16)
}
