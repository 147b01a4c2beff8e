use thiserror::Error;

/// Classifies failures that callers are expected to recover from at some level.
///
/// These are attached to [anyhow::Error]s, either as the error itself or as context, so that the
/// failure kind survives any context added on the way up. Absence of a value (no caption, no
/// coordinates) is never represented here.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum ExtractError {
    /// Markup could not be parsed, or its root declares no default namespace.
    #[error("malformed markup document")]
    MalformedDocument,
    /// A coordinate string was present but could not be decoded.
    #[error("invalid coordinate string")]
    InvalidCoordinate,
    /// The resolved 0-based page index is not within the document.
    #[error("page index {page_index} is out of range for a document of {page_count} pages")]
    PageOutOfRange { page_index: i64, page_count: u16 },
    /// The rasterization worker did not respond within the configured timeout.
    #[error("timed out waiting for rasterization")]
    RasterTimeout,
}

/// Returns the [ExtractError] carried by `err`, if any.
pub fn classify(err: &anyhow::Error) -> Option<ExtractError> {
    err.downcast_ref::<ExtractError>()
        .or_else(|| err.chain().find_map(|cause| cause.downcast_ref()))
        .copied()
}
