use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use extraction::{config::ImageFormat, figures, raster::DEFAULT_ZOOM};

use super::pdfium::PdfiumArgs;

/// Rasterizes one region of a PDF to an image file.
#[derive(Args, Debug)]
pub struct Command {
    /// Path to input PDF.
    pdf: PathBuf,

    /// Region as "page,x,y,width,height", with a 1-based page number and the rest in points.
    coords: String,

    /// Path of the image to write. The format follows the extension (.jpg or .png).
    output: PathBuf,

    /// Resolution multiplier.
    #[arg(long, default_value_t = DEFAULT_ZOOM)]
    zoom: f32,

    #[command(flatten)]
    pdfium: PdfiumArgs,
}

/// Runs the subcommand.
pub fn run(cmd: &Command) -> Result<()> {
    let format = match cmd.output.extension().and_then(|ext| ext.to_str()) {
        Some("png") => ImageFormat::Png,
        Some("jpg" | "jpeg") => ImageFormat::Jpeg,
        _ => bail!("output {:?} must end in .jpg, .jpeg or .png", cmd.output),
    };

    let worker = cmd.pdfium.start_worker()?;
    let image = worker
        .client()
        .rasterize(&cmd.pdf, Some(cmd.coords.as_str()), cmd.zoom);
    worker.shutdown()?;

    match image? {
        Some(image) => figures::save_image(&image, &cmd.output, format),
        None => bail!("no region given"),
    }
}
