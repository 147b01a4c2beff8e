//! Assembly of [FigureRecord]s from markup, and writing of their images.

use std::path::Path;

use anyhow::{Context, Result};

use crate::{
    config::ImageFormat,
    coords::CoordinateSpec,
    identifier::{Keyword, extract_identifier},
    markup::{ShallowNode, extract_value},
    raster::PageImage,
};

/// Structural tag of figure-like elements.
pub const FIGURE_TAG: &str = "figure";

/// One figure with resolvable coordinates.
#[derive(Debug)]
pub struct FigureRecord {
    /// Position of the figure element among all figure elements of its document.
    pub position: usize,
    /// Caption text.
    pub description: Option<String>,
    /// Identifier parsed from the caption, or failing that from the heading.
    pub identifier: Option<String>,
    pub coordinates: CoordinateSpec,
    /// Filled in once rasterized.
    pub image: Option<PageImage>,
}

/// Result of examining every figure element of a document.
#[derive(Debug, Default)]
pub struct FigureScan {
    pub records: Vec<FigureRecord>,
    /// Number of figure elements without coordinates.
    pub without_coordinates: usize,
    /// Figure elements whose coordinates could not be decoded.
    pub failures: Vec<anyhow::Error>,
}

/// Builds a [FigureScan] from shallow figure elements, as read with [FIGURE_TAG].
pub fn scan_figures(nodes: &[ShallowNode]) -> FigureScan {
    let mut scan = FigureScan::default();
    for (position, node) in nodes.iter().enumerate() {
        match figure_record(position, node) {
            Ok(Some(record)) => scan.records.push(record),
            Ok(None) => {
                log::debug!("Figure at position {} has no coordinates.", position);
                scan.without_coordinates += 1;
            }
            Err(err) => scan.failures.push(err),
        }
    }
    scan
}

/// Builds the record for one figure element. `None` if it has no coordinates.
pub fn figure_record(position: usize, node: &ShallowNode) -> Result<Option<FigureRecord>> {
    let coordinates = CoordinateSpec::parse_optional(extract_value(node, "graphic", Some("coords")))
        .with_context(|| match node.attribute("id") {
            Some(id) => format!("reading coordinates of figure {:?}", id),
            None => format!("reading coordinates of figure at position {}", position),
        })?;
    let Some(coordinates) = coordinates else {
        return Ok(None);
    };

    let description = extract_value(node, "figDesc", None);
    let identifier = extract_identifier(description, Keyword::Figure)
        .or_else(|| extract_identifier(extract_value(node, "head", None), Keyword::Figure));

    Ok(Some(FigureRecord {
        position,
        description: description.map(str::to_owned),
        identifier,
        coordinates,
        image: None,
    }))
}

/// Writes `image` to `path` in `format`.
pub fn save_image(image: &PageImage, path: &Path, format: ImageFormat) -> Result<()> {
    image
        .save_with_format(path, format.image_format())
        .with_context(|| format!("writing image {:?}", path))
}
