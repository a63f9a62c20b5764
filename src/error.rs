use std::path::PathBuf;

use thiserror::Error;

/// Errors raised anywhere in the scan pipeline.
///
/// Page-scoped variants are recovered locally by the page pipeline (the page
/// is marked failed and the run continues); document-scoped variants
/// terminate `process()`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a PDF document (missing %PDF header)")]
    InvalidDocument,

    #[error("document is {size} bytes, over the {limit} byte limit")]
    DocumentTooLarge { size: u64, limit: u64 },

    #[error("document has {pages} pages, over the {limit} page limit")]
    TooManyPages { pages: usize, limit: usize },

    #[error("document has no pages")]
    EmptyDocument,

    #[error("PDF could not be parsed: {0}")]
    DocumentParseError(String),

    #[error("page {page} not found (document has {pages} pages)")]
    PageNotFound { page: usize, pages: usize },

    #[error("page {page} could not be rendered: {reason}")]
    SurfaceUnavailable { page: usize, reason: String },

    #[error("rendering page {page} exceeded the {secs}s limit")]
    RenderTimeout { page: usize, secs: u64 },

    #[error("recognizing page {page} exceeded the {secs}s limit")]
    RecognitionTimeout { page: usize, secs: u64 },

    #[error("no page yielded usable text")]
    NoUsableText,

    #[error("image processing error: {0}")]
    ImageProcessing(String),

    #[error("recognition engine initialization failed: {0}")]
    EngineInit(String),

    #[error("recognition engine configuration error: {0}")]
    EngineConfig(String),

    #[error("recognition failed: {0}")]
    EngineProcessing(String),

    #[error("tessdata not found at: {0}")]
    TessdataNotFound(PathBuf),
}

impl PipelineError {
    /// True for errors that are contained to a single page rather than
    /// aborting the document run.
    pub fn is_page_scoped(&self) -> bool {
        matches!(
            self,
            Self::PageNotFound { .. }
                | Self::SurfaceUnavailable { .. }
                | Self::RenderTimeout { .. }
                | Self::RecognitionTimeout { .. }
                | Self::ImageProcessing(_)
                | Self::EngineProcessing(_)
        )
    }
}
