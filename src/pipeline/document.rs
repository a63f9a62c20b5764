//! Document pipeline: validate, iterate pages, aggregate.
//!
//! Pages run strictly in order, one at a time: each page holds a large
//! raster and the engine is CPU-heavy, so sequential processing bounds peak
//! memory and keeps progress monotonic. Page failures stay visible as
//! markers in the aggregate text; the run only fails outright when the
//! document cannot be opened or no page yields usable text.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{PipelineLimits, RecognitionConfig};
use crate::engine::RecognitionEngine;
use crate::error::PipelineError;
use crate::pipeline::page::process_page;
use crate::progress::{emit, ProgressEvent, ProgressSink};
use crate::raster::PageRasterizer;
use crate::types::{PageRecognition, PageState, ScanResult};

const PDF_MAGIC: &[u8] = b"%PDF";

/// Scans a document end to end: bytes in, aggregate text and confidence out.
pub struct DocumentPipeline {
    rasterizer: Arc<dyn PageRasterizer>,
    engine: Arc<dyn RecognitionEngine>,
    limits: PipelineLimits,
}

impl DocumentPipeline {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, engine: Arc<dyn RecognitionEngine>) -> Self {
        Self {
            rasterizer,
            engine,
            limits: PipelineLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: PipelineLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Process every page of `pdf_bytes` under `config`, reporting progress
    /// to the optional sink.
    ///
    /// Returns a best-effort aggregate whenever at least one page yields
    /// usable text. Document-level problems (unreadable file, zero pages,
    /// over-limit input, nothing recognized anywhere) surface as errors.
    pub async fn process(
        &self,
        pdf_bytes: &[u8],
        config: &RecognitionConfig,
        sink: Option<Arc<dyn ProgressSink>>,
    ) -> Result<ScanResult, PipelineError> {
        let document_id = Uuid::new_v4();

        validate_header(pdf_bytes)?;
        if let Some(limit) = self.limits.max_file_bytes {
            let size = pdf_bytes.len() as u64;
            if size > limit {
                return Err(PipelineError::DocumentTooLarge { size, limit });
            }
        }

        let page_count = self.rasterizer.page_count(pdf_bytes)?;
        if page_count == 0 {
            return Err(PipelineError::EmptyDocument);
        }
        if let Some(limit) = self.limits.max_pages {
            if page_count > limit {
                return Err(PipelineError::TooManyPages {
                    pages: page_count,
                    limit,
                });
            }
        }

        info!(
            document_id = %document_id,
            pages = page_count,
            size = pdf_bytes.len(),
            lang = %config.language,
            "Starting document scan"
        );
        emit(
            &sink,
            ProgressEvent::Loading {
                total_pages: page_count,
            },
        );

        let pdf_bytes = Arc::new(pdf_bytes.to_vec());
        let config = Arc::new(config.clone());
        let mut pages = Vec::with_capacity(page_count);

        for page_number in 1..=page_count {
            let page = process_page(
                Arc::clone(&self.rasterizer),
                Arc::clone(&self.engine),
                Arc::clone(&pdf_bytes),
                page_number,
                page_count,
                Arc::clone(&config),
                &self.limits,
                sink.clone(),
            )
            .await;
            pages.push(page);
        }

        let (text, confidence, usable) = aggregate(&pages);
        if usable == 0 {
            warn!(document_id = %document_id, pages = page_count, "No page yielded usable text");
            return Err(PipelineError::NoUsableText);
        }

        info!(
            document_id = %document_id,
            pages = page_count,
            usable_pages = usable,
            confidence,
            text_length = text.len(),
            "Document scan complete"
        );

        Ok(ScanResult {
            document_id,
            text,
            confidence,
            pages,
            page_count,
        })
    }
}

fn validate_header(pdf_bytes: &[u8]) -> Result<(), PipelineError> {
    if pdf_bytes.len() < PDF_MAGIC.len() || !pdf_bytes.starts_with(PDF_MAGIC) {
        return Err(PipelineError::InvalidDocument);
    }
    Ok(())
}

/// Build the aggregate text and confidence from per-page outcomes.
///
/// Every page contributes a `--- Page N ---` header followed by its text,
/// `(No text found)`, or `(Error: ...)`. The confidence denominator counts
/// only pages with usable text; failed and empty pages are annotated, not
/// scored as zero.
fn aggregate(pages: &[PageRecognition]) -> (String, f32, usize) {
    let mut fragments = Vec::with_capacity(pages.len());
    let mut confidence_sum = 0.0f32;
    let mut usable = 0usize;

    for page in pages {
        let body = match page.state {
            PageState::Succeeded if page.has_usable_text() => {
                confidence_sum += page.confidence.unwrap_or(0.0);
                usable += 1;
                page.text.trim_end().to_string()
            }
            PageState::Succeeded => "(No text found)".to_string(),
            _ => format!(
                "(Error: {})",
                page.error.as_deref().unwrap_or("processing failed")
            ),
        };
        fragments.push(format!("--- Page {} ---\n{}", page.page_number, body));
    }

    let text = fragments.join("\n\n");
    let confidence = if usable > 0 {
        confidence_sum / usable as f32
    } else {
        0.0
    };
    (text, confidence, usable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::engine::{MockRecognitionEngine, ScriptedRecognitionEngine};
    use crate::progress::CollectingSink;
    use crate::raster::MockPageRasterizer;

    const FAKE_PDF: &[u8] = b"%PDF-1.4 fake contract bytes";

    fn pipeline(
        rasterizer: MockPageRasterizer,
        engine: impl RecognitionEngine + 'static,
    ) -> DocumentPipeline {
        DocumentPipeline::new(Arc::new(rasterizer), Arc::new(engine))
    }

    #[tokio::test]
    async fn all_pages_succeed() {
        let result = pipeline(
            MockPageRasterizer::new(3),
            MockRecognitionEngine::new("Commercial Purchase Agreement", 90.0),
        )
        .process(FAKE_PDF, &RecognitionConfig::default(), None)
        .await
        .unwrap();

        assert_eq!(result.page_count, 3);
        assert_eq!(result.usable_pages(), 3);
        assert!((result.confidence - 90.0).abs() < 0.01);
        for n in 1..=3 {
            assert!(result.text.contains(&format!("--- Page {n} ---")));
        }
    }

    #[tokio::test]
    async fn headers_appear_in_ascending_order() {
        let result = pipeline(
            MockPageRasterizer::new(4),
            MockRecognitionEngine::new("text", 80.0),
        )
        .process(FAKE_PDF, &RecognitionConfig::default(), None)
        .await
        .unwrap();

        let positions: Vec<usize> = (1..=4)
            .map(|n| result.text.find(&format!("--- Page {n} ---")).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[tokio::test]
    async fn confidence_averages_per_page_scores() {
        let engine = ScriptedRecognitionEngine::new(vec![
            Ok(("page one", 90.0)),
            Ok(("page two", 70.0)),
        ]);
        let result = pipeline(MockPageRasterizer::new(2), engine)
            .process(FAKE_PDF, &RecognitionConfig::default(), None)
            .await
            .unwrap();

        assert!((result.confidence - 80.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn failed_page_excluded_from_average_but_marked() {
        let result = pipeline(
            MockPageRasterizer::new(3).failing_on(vec![2]),
            MockRecognitionEngine::new("recognized text", 84.0),
        )
        .process(FAKE_PDF, &RecognitionConfig::default(), None)
        .await
        .unwrap();

        assert_eq!(result.usable_pages(), 2);
        assert!((result.confidence - 84.0).abs() < 0.01);
        assert!(result.text.contains("--- Page 2 ---\n(Error:"));
        assert_eq!(result.pages[1].state, PageState::Failed);
    }

    #[tokio::test]
    async fn empty_text_page_gets_no_text_marker() {
        let engine = ScriptedRecognitionEngine::new(vec![
            Ok(("real content", 88.0)),
            Ok(("", 77.0)),
        ]);
        let result = pipeline(MockPageRasterizer::new(2), engine)
            .process(FAKE_PDF, &RecognitionConfig::default(), None)
            .await
            .unwrap();

        assert!(result.text.contains("--- Page 2 ---\n(No text found)"));
        // Empty page is processed but not scored.
        assert_eq!(result.usable_pages(), 1);
        assert!((result.confidence - 88.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn zero_usable_pages_fails_with_no_usable_text() {
        let err = pipeline(
            MockPageRasterizer::new(2).failing_on(vec![1, 2]),
            MockRecognitionEngine::new("unused", 90.0),
        )
        .process(FAKE_PDF, &RecognitionConfig::default(), None)
        .await
        .unwrap_err();

        assert!(matches!(err, PipelineError::NoUsableText));
    }

    /// Engine whose first call sleeps past any short deadline; later calls
    /// return immediately.
    struct SlowFirstCallEngine {
        calls: std::sync::Mutex<usize>,
    }

    impl SlowFirstCallEngine {
        fn new() -> Self {
            Self {
                calls: std::sync::Mutex::new(0),
            }
        }
    }

    impl RecognitionEngine for SlowFirstCallEngine {
        fn recognize(
            &self,
            _image_png: &[u8],
            _config: &RecognitionConfig,
            _on_progress: &dyn Fn(u8),
        ) -> Result<crate::types::Recognition, PipelineError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if call == 1 {
                std::thread::sleep(Duration::from_millis(400));
            }
            Ok(crate::types::Recognition {
                text: format!("recognized on call {call}"),
                confidence: 85.0,
            })
        }
    }

    #[tokio::test]
    async fn recognition_timeout_spares_later_pages() {
        let mut limits = PipelineLimits::default();
        limits.recognition_timeout = Duration::from_millis(80);

        let result = pipeline(MockPageRasterizer::new(3), SlowFirstCallEngine::new())
            .with_limits(limits)
            .process(FAKE_PDF, &RecognitionConfig::default(), None)
            .await
            .unwrap();

        assert_eq!(result.pages[0].state, PageState::Failed);
        assert!(result.pages[0]
            .error
            .as_deref()
            .unwrap()
            .contains("exceeded"));
        assert_eq!(result.pages[1].state, PageState::Succeeded);
        assert_eq!(result.pages[2].state, PageState::Succeeded);
        assert_eq!(result.usable_pages(), 2);
        assert!(result.text.contains("--- Page 1 ---\n(Error:"));
    }

    #[tokio::test]
    async fn rejects_non_pdf_bytes() {
        let err = pipeline(
            MockPageRasterizer::new(1),
            MockRecognitionEngine::new("unused", 90.0),
        )
        .process(b"GIF89a not a pdf", &RecognitionConfig::default(), None)
        .await
        .unwrap_err();

        assert!(matches!(err, PipelineError::InvalidDocument));
    }

    #[tokio::test]
    async fn rejects_empty_buffer() {
        let err = pipeline(
            MockPageRasterizer::new(1),
            MockRecognitionEngine::new("unused", 90.0),
        )
        .process(b"", &RecognitionConfig::default(), None)
        .await
        .unwrap_err();

        assert!(matches!(err, PipelineError::InvalidDocument));
    }

    #[tokio::test]
    async fn rejects_oversized_document() {
        let mut limits = PipelineLimits::default();
        limits.max_file_bytes = Some(16);

        let err = pipeline(
            MockPageRasterizer::new(1),
            MockRecognitionEngine::new("unused", 90.0),
        )
        .with_limits(limits)
        .process(FAKE_PDF, &RecognitionConfig::default(), None)
        .await
        .unwrap_err();

        assert!(matches!(err, PipelineError::DocumentTooLarge { limit: 16, .. }));
    }

    #[tokio::test]
    async fn rejects_too_many_pages() {
        let mut limits = PipelineLimits::default();
        limits.max_pages = Some(2);

        let err = pipeline(
            MockPageRasterizer::new(5),
            MockRecognitionEngine::new("unused", 90.0),
        )
        .with_limits(limits)
        .process(FAKE_PDF, &RecognitionConfig::default(), None)
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::TooManyPages { pages: 5, limit: 2 }
        ));
    }

    #[tokio::test]
    async fn rejects_zero_page_document() {
        let err = pipeline(
            MockPageRasterizer::new(0),
            MockRecognitionEngine::new("unused", 90.0),
        )
        .process(FAKE_PDF, &RecognitionConfig::default(), None)
        .await
        .unwrap_err();

        assert!(matches!(err, PipelineError::EmptyDocument));
    }

    #[tokio::test]
    async fn progress_sequence_is_monotonic_per_page() {
        let sink = Arc::new(CollectingSink::new());
        pipeline(
            MockPageRasterizer::new(2),
            MockRecognitionEngine::new("text", 80.0),
        )
        .process(FAKE_PDF, &RecognitionConfig::default(), Some(sink.clone()))
        .await
        .unwrap();

        let events = sink.snapshot();
        assert_eq!(events[0], ProgressEvent::Loading { total_pages: 2 });

        // Converting events arrive in page order.
        let converting: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Converting { page, .. } => Some(*page),
                _ => None,
            })
            .collect();
        assert_eq!(converting, vec![1, 2]);
    }

    #[tokio::test]
    async fn runs_identically_without_a_sink() {
        let with_sink = pipeline(
            MockPageRasterizer::new(2),
            MockRecognitionEngine::new("stable text", 82.0),
        )
        .process(
            FAKE_PDF,
            &RecognitionConfig::default(),
            Some(Arc::new(CollectingSink::new())),
        )
        .await
        .unwrap();

        let without_sink = pipeline(
            MockPageRasterizer::new(2),
            MockRecognitionEngine::new("stable text", 82.0),
        )
        .process(FAKE_PDF, &RecognitionConfig::default(), None)
        .await
        .unwrap();

        assert_eq!(with_sink.text, without_sink.text);
        assert_eq!(with_sink.confidence, without_sink.confidence);
    }

    // ── aggregate() unit tests ──

    fn page(n: usize, state: PageState, text: &str, conf: Option<f32>, err: Option<&str>) -> PageRecognition {
        PageRecognition {
            page_number: n,
            state,
            text: text.into(),
            confidence: conf,
            error: err.map(String::from),
        }
    }

    #[test]
    fn aggregate_mixes_markers_and_content() {
        let pages = vec![
            page(1, PageState::Succeeded, "first", Some(90.0), None),
            page(2, PageState::Failed, "", None, Some("rendering failed")),
            page(3, PageState::Succeeded, "", None, None),
        ];
        let (text, confidence, usable) = aggregate(&pages);

        assert_eq!(usable, 1);
        assert!((confidence - 90.0).abs() < f32::EPSILON);
        assert!(text.contains("--- Page 1 ---\nfirst"));
        assert!(text.contains("--- Page 2 ---\n(Error: rendering failed)"));
        assert!(text.contains("--- Page 3 ---\n(No text found)"));
    }

    #[test]
    fn aggregate_of_nothing_usable_scores_zero() {
        let pages = vec![page(1, PageState::Failed, "", None, Some("boom"))];
        let (_, confidence, usable) = aggregate(&pages);
        assert_eq!(usable, 0);
        assert_eq!(confidence, 0.0);
    }
}
