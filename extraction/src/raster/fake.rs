//! In-memory [PdfOpener] for tests, standing in for pdfium.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::{Result, anyhow};
use image::Rgb;

use super::{PageImage, PdfOpener, PdfPages};

/// Page size of every fake document, in points (US letter).
pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;

/// Opens any path that exists on the filesystem as a document of `page_count` pages.
///
/// Rendered page pixels encode their own position: red is `x % 256`, green is `y % 256`, and blue
/// is always 0, so blank (white) padding is distinguishable from page content.
#[derive(Clone, Default)]
pub struct FakeOpener {
    pub page_count: u16,
    pub open_handles: Arc<AtomicUsize>,
    pub opened: Arc<Mutex<Vec<PathBuf>>>,
    pub renders: Arc<AtomicUsize>,
}

impl FakeOpener {
    pub fn new(page_count: u16) -> Self {
        Self {
            page_count,
            ..Default::default()
        }
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl PdfOpener for FakeOpener {
    fn open<'a>(&'a self, path: &Path) -> Result<Box<dyn PdfPages + 'a>> {
        if !path.exists() {
            return Err(anyhow!("no PDF at {:?}", path));
        }
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(path.to_owned());
        }
        Ok(Box::new(FakePdf { opener: self }))
    }
}

struct FakePdf<'a> {
    opener: &'a FakeOpener,
}

impl PdfPages for FakePdf<'_> {
    fn page_count(&self) -> u16 {
        self.opener.page_count
    }

    fn render_page(&self, page_index: u16, scale: f32) -> Result<PageImage> {
        if page_index >= self.opener.page_count {
            return Err(anyhow!("page index {} out of range", page_index));
        }
        self.opener.renders.fetch_add(1, Ordering::SeqCst);
        let width = (PAGE_WIDTH * scale).round() as u32;
        let height = (PAGE_HEIGHT * scale).round() as u32;
        Ok(PageImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 0])
        }))
    }
}

impl Drop for FakePdf<'_> {
    fn drop(&mut self) {
        self.opener.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}
