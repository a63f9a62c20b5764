//! deedscan: scanned-contract OCR pipeline.
//!
//! Takes a commercial real-estate contract as a PDF byte buffer, renders
//! each page to a raster, runs a recognition engine over it with bounded
//! time and per-page error containment, aggregates text and confidence, and
//! extracts a fixed set of contract fields from the noisy result.
//!
//! ```no_run
//! use std::sync::Arc;
//! use deedscan::{DocumentPipeline, PdfiumRasterizer, RecognitionConfig};
//! use deedscan::engine::MockRecognitionEngine;
//!
//! # async fn scan(pdf_bytes: &[u8]) -> Result<(), deedscan::PipelineError> {
//! let pipeline = DocumentPipeline::new(
//!     Arc::new(PdfiumRasterizer::new()?),
//!     Arc::new(MockRecognitionEngine::new("Buyer: John Doe", 90.0)),
//! );
//! let result = pipeline.process(pdf_bytes, &RecognitionConfig::default(), None).await?;
//! let fields = deedscan::fields::extract(&result.text);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod fields;
pub mod pipeline;
pub mod progress;
pub mod raster;
pub mod types;

pub use config::{EngineMode, PageSegMode, PipelineLimits, RecognitionConfig};
pub use engine::RecognitionEngine;
pub use error::PipelineError;
pub use fields::{extract, ExtractedField, FieldName};
pub use pipeline::DocumentPipeline;
pub use progress::{ProgressEvent, ProgressSink};
pub use raster::{PageRasterizer, PdfiumRasterizer};
pub use types::{PageRecognition, PageState, Recognition, ScanResult};

use tracing_subscriber::EnvFilter;

/// Initialize tracing output for binaries and tests.
///
/// Respects `RUST_LOG`; defaults to `info` for this crate. Safe to call
/// more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("deedscan=info")),
        )
        .try_init();
}
