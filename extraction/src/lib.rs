//! Extracts figure images and table fragments from scholarly PDFs, guided by the regions that a
//! TEI markup producer has already located in them.

pub mod batch;
pub mod config;
pub mod coords;
pub mod error;
pub mod figures;
pub mod identifier;
pub mod markup;
mod mpscutil;
pub mod output;
pub mod raster;
pub mod tables;

pub use error::ExtractError;
