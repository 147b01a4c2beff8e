//! Configuration of a batch extraction run.

use std::{
    fs::File,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use strum_macros::{Display, EnumString};

use crate::raster::DEFAULT_ZOOM;

/// What to do with a figure or table whose caption or heading yields no identifier.
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UnidentifiedPolicy {
    /// Log and do not write the item.
    #[default]
    Skip,
    /// Name the item by its position within the document, e.g. `3_table_pos1`.
    Positional,
}

/// Encoding for written figure images.
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }

    pub fn image_format(self) -> image::ImageFormat {
        match self {
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
        }
    }
}

pub const DEFAULT_MARKUP_SUFFIX: &str = ".tei.xml";
pub const DEFAULT_BASE_NAME_SUFFIX: &str = ".pdf.tei.xml";

/// Settings for [crate::batch::BatchProcessor], typically read from a YAML file and then
/// overridden from the command line.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// Resolution multiplier for rasterized figures.
    #[serde(default = "default_zoom")]
    pub zoom_level: f32,
    /// Directory holding the markup documents.
    pub markup_dir: PathBuf,
    /// Directory holding the source PDFs.
    pub pdf_dir: PathBuf,
    /// Root of the per-document output directories.
    pub output_dir: PathBuf,
    /// Suffix appended to a PDF's file name to form its markup document's file name.
    #[serde(default = "default_markup_suffix")]
    pub markup_suffix: String,
    /// Suffix stripped from a markup file name to form the document's output directory name.
    #[serde(default = "default_base_name_suffix")]
    pub base_name_suffix: String,
    #[serde(default)]
    pub image_format: ImageFormat,
    #[serde(default)]
    pub unidentified: UnidentifiedPolicy,
    /// Upper bound on the wait for one document's figures to rasterize.
    #[serde(default)]
    pub document_timeout_secs: Option<f64>,
    /// Where to write the `pdf_id,filename` index, if anywhere.
    #[serde(default)]
    pub index_file: Option<PathBuf>,
}

fn default_zoom() -> f32 {
    DEFAULT_ZOOM
}

fn default_markup_suffix() -> String {
    DEFAULT_MARKUP_SUFFIX.to_string()
}

fn default_base_name_suffix() -> String {
    DEFAULT_BASE_NAME_SUFFIX.to_string()
}

impl BatchConfig {
    /// Creates a configuration with default settings for the given directories.
    pub fn new(markup_dir: PathBuf, pdf_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            zoom_level: default_zoom(),
            markup_dir,
            pdf_dir,
            output_dir,
            markup_suffix: default_markup_suffix(),
            base_name_suffix: default_base_name_suffix(),
            image_format: ImageFormat::default(),
            unidentified: UnidentifiedPolicy::default(),
            document_timeout_secs: None,
            index_file: None,
        }
    }

    /// Creates a configuration following the `<base>/tei`, `<base>/pdf`, `<base>/output`
    /// directory convention.
    pub fn from_base_dir(base: &Path) -> Self {
        Self::new(base.join("tei"), base.join("pdf"), base.join("output"))
    }

    /// Loads the configuration from the YAML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let rdr = File::open(path).with_context(|| format!("opening configuration {:?}", path))?;
        let config: BatchConfig = serde_yaml_ng::from_reader(rdr)
            .with_context(|| format!("parsing configuration {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.zoom_level.is_finite() && self.zoom_level > 0.0) {
            bail!("zoom_level must be a positive number, got {}", self.zoom_level);
        }
        if self.markup_suffix.is_empty() {
            bail!("markup_suffix must not be empty");
        }
        if let Some(secs) = self.document_timeout_secs {
            if !(secs > 0.0 && Duration::try_from_secs_f64(secs).is_ok()) {
                bail!(
                    "document_timeout_secs must be a positive number of representable size, got {}",
                    secs
                );
            }
        }
        Ok(())
    }

    /// Timeout as a [Duration]; `None` if unset or not representable.
    pub fn document_timeout(&self) -> Option<Duration> {
        self.document_timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}
