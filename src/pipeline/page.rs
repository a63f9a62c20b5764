//! Per-page pipeline: rasterize, diagnose, recognize.
//!
//! State machine: `pending -> rasterizing -> recognizing -> {succeeded |
//! failed}`. Each stage runs as a blocking task raced against its own
//! deadline. A timed-out stage is abandoned, never retried: the blocking
//! call finishes in the background and its result (and any late progress)
//! is ignored. Failures are contained to the page: this function always
//! returns a `PageRecognition`, never an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{PipelineLimits, RecognitionConfig};
use crate::engine::RecognitionEngine;
use crate::error::PipelineError;
use crate::progress::{emit, ProgressEvent, ProgressSink};
use crate::raster::{is_blank_raster, PageRasterizer};
use crate::types::{PageRecognition, PageState};

/// Run one page through rasterization and recognition.
#[allow(clippy::too_many_arguments)]
pub async fn process_page(
    rasterizer: Arc<dyn PageRasterizer>,
    engine: Arc<dyn RecognitionEngine>,
    pdf_bytes: Arc<Vec<u8>>,
    page_number: usize,
    total_pages: usize,
    config: Arc<RecognitionConfig>,
    limits: &PipelineLimits,
    sink: Option<Arc<dyn ProgressSink>>,
) -> PageRecognition {
    emit(
        &sink,
        ProgressEvent::Converting {
            page: page_number,
            total: total_pages,
        },
    );

    // ── Rasterizing ──

    let raster_task = tokio::task::spawn_blocking({
        let rasterizer = Arc::clone(&rasterizer);
        let pdf_bytes = Arc::clone(&pdf_bytes);
        let dpi = limits.render_dpi;
        move || rasterizer.rasterize(&pdf_bytes, page_number, dpi)
    });

    let png = match tokio::time::timeout(limits.render_timeout, raster_task).await {
        Err(_) => {
            return fail(
                &sink,
                page_number,
                PipelineError::RenderTimeout {
                    page: page_number,
                    secs: limits.render_timeout.as_secs(),
                },
            );
        }
        Ok(Err(join_err)) => {
            return fail(
                &sink,
                page_number,
                PipelineError::SurfaceUnavailable {
                    page: page_number,
                    reason: format!("rasterizer task failed: {join_err}"),
                },
            );
        }
        Ok(Ok(Err(err))) => return fail(&sink, page_number, err),
        Ok(Ok(Ok(png))) => png,
    };

    // Blank-raster diagnostic: an all-background raster is a silent
    // rendering failure and must not reach recognition as valid content.
    let raster = match image::load_from_memory(&png) {
        Ok(img) => img.to_rgb8(),
        Err(e) => {
            return fail(
                &sink,
                page_number,
                PipelineError::ImageProcessing(format!("raster decode failed: {e}")),
            );
        }
    };
    if is_blank_raster(&raster) {
        return fail(
            &sink,
            page_number,
            PipelineError::SurfaceUnavailable {
                page: page_number,
                reason: "raster is entirely blank".into(),
            },
        );
    }
    drop(raster);

    // ── Recognizing ──

    emit(
        &sink,
        ProgressEvent::Ocr {
            page: page_number,
            total: total_pages,
            percent: 0,
        },
    );

    // Gates off progress from an abandoned (timed-out) engine call.
    let live = Arc::new(AtomicBool::new(true));

    let recognize_task = tokio::task::spawn_blocking({
        let engine = Arc::clone(&engine);
        let config = Arc::clone(&config);
        let sink = sink.clone();
        let live = Arc::clone(&live);
        move || {
            let forward = |percent: u8| {
                if live.load(Ordering::Relaxed) {
                    emit(
                        &sink,
                        ProgressEvent::Ocr {
                            page: page_number,
                            total: total_pages,
                            percent,
                        },
                    );
                }
            };
            engine.recognize(&png, &config, &forward)
        }
    });

    let recognition = match tokio::time::timeout(limits.recognition_timeout, recognize_task).await
    {
        Err(_) => {
            live.store(false, Ordering::Relaxed);
            return fail(
                &sink,
                page_number,
                PipelineError::RecognitionTimeout {
                    page: page_number,
                    secs: limits.recognition_timeout.as_secs(),
                },
            );
        }
        Ok(Err(join_err)) => {
            return fail(
                &sink,
                page_number,
                PipelineError::EngineProcessing(format!("recognition task failed: {join_err}")),
            );
        }
        Ok(Ok(Err(err))) => return fail(&sink, page_number, err),
        Ok(Ok(Ok(recognition))) => recognition,
    };

    if recognition.text.trim().is_empty() {
        debug!(page = page_number, "Page recognized with no usable text");
        emit(
            &sink,
            ProgressEvent::Fallback {
                page: page_number,
                message: "no text found".into(),
            },
        );
        return PageRecognition {
            page_number,
            state: PageState::Succeeded,
            text: String::new(),
            confidence: None,
            error: None,
        };
    }

    debug!(
        page = page_number,
        confidence = recognition.confidence,
        text_length = recognition.text.len(),
        "Page recognized"
    );

    PageRecognition {
        page_number,
        state: PageState::Succeeded,
        text: recognition.text,
        confidence: Some(recognition.confidence),
        error: None,
    }
}

/// Mark a page failed: log, emit the error events, keep the run alive.
fn fail(
    sink: &Option<Arc<dyn ProgressSink>>,
    page_number: usize,
    err: PipelineError,
) -> PageRecognition {
    let message = err.to_string();
    warn!(page = page_number, error = %message, "Page failed, continuing with next page");
    emit(
        sink,
        ProgressEvent::PageFailed {
            page: page_number,
            message: message.clone(),
        },
    );
    emit(
        sink,
        ProgressEvent::Fallback {
            page: page_number,
            message: message.clone(),
        },
    );
    PageRecognition {
        page_number,
        state: PageState::Failed,
        text: String::new(),
        confidence: None,
        error: Some(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::engine::MockRecognitionEngine;
    use crate::progress::CollectingSink;
    use crate::raster::MockPageRasterizer;

    fn limits() -> PipelineLimits {
        PipelineLimits::default()
    }

    async fn run_page(
        rasterizer: MockPageRasterizer,
        engine: impl RecognitionEngine + 'static,
        limits: &PipelineLimits,
        sink: Option<Arc<dyn ProgressSink>>,
    ) -> PageRecognition {
        process_page(
            Arc::new(rasterizer),
            Arc::new(engine),
            Arc::new(b"%PDF-1.4 fake".to_vec()),
            1,
            1,
            Arc::new(RecognitionConfig::default()),
            limits,
            sink,
        )
        .await
    }

    #[tokio::test]
    async fn successful_page_carries_text_and_confidence() {
        let page = run_page(
            MockPageRasterizer::new(1),
            MockRecognitionEngine::new("Buyer: John Doe", 87.0),
            &limits(),
            None,
        )
        .await;

        assert_eq!(page.state, PageState::Succeeded);
        assert_eq!(page.text, "Buyer: John Doe");
        assert_eq!(page.confidence, Some(87.0));
        assert!(page.error.is_none());
    }

    #[tokio::test]
    async fn raster_failure_is_contained() {
        let page = run_page(
            MockPageRasterizer::new(1).failing_on(vec![1]),
            MockRecognitionEngine::new("unused", 90.0),
            &limits(),
            None,
        )
        .await;

        assert_eq!(page.state, PageState::Failed);
        assert!(page.error.as_deref().unwrap().contains("page 1"));
        assert!(page.confidence.is_none());
    }

    #[tokio::test]
    async fn blank_raster_is_a_render_failure() {
        let sink = Arc::new(CollectingSink::new());
        let page = run_page(
            MockPageRasterizer::new(1).blank_on(vec![1]),
            MockRecognitionEngine::new("should never run", 90.0),
            &limits(),
            Some(sink.clone()),
        )
        .await;

        assert_eq!(page.state, PageState::Failed);
        assert!(page.error.as_deref().unwrap().contains("blank"));
        // Recognition must never have started.
        let events = sink.snapshot();
        assert!(!events
            .iter()
            .any(|e| matches!(e, ProgressEvent::Ocr { .. })));
    }

    #[tokio::test]
    async fn recognition_timeout_abandons_the_stage() {
        let mut limits = limits();
        limits.recognition_timeout = Duration::from_millis(50);

        let page = run_page(
            MockPageRasterizer::new(1),
            MockRecognitionEngine::new("late", 90.0).with_delay(Duration::from_millis(400)),
            &limits,
            None,
        )
        .await;

        assert_eq!(page.state, PageState::Failed);
        assert!(page.error.as_deref().unwrap().contains("exceeded"));
    }

    #[tokio::test]
    async fn render_timeout_reported_separately() {
        let mut limits = limits();
        limits.render_timeout = Duration::from_millis(50);

        let page = run_page(
            MockPageRasterizer::new(1).with_delay(Duration::from_millis(400)),
            MockRecognitionEngine::new("unused", 90.0),
            &limits,
            None,
        )
        .await;

        assert_eq!(page.state, PageState::Failed);
        assert!(page.error.as_deref().unwrap().contains("rendering"));
    }

    #[tokio::test]
    async fn empty_text_succeeds_without_confidence() {
        let sink = Arc::new(CollectingSink::new());
        let page = run_page(
            MockPageRasterizer::new(1),
            MockRecognitionEngine::new("  \n ", 75.0),
            &limits(),
            Some(sink.clone()),
        )
        .await;

        assert_eq!(page.state, PageState::Succeeded);
        assert!(page.text.is_empty());
        assert!(page.confidence.is_none());

        let events = sink.snapshot();
        assert!(events
            .iter()
            .any(|e| matches!(e, ProgressEvent::Fallback { page: 1, .. })));
    }

    #[tokio::test]
    async fn progress_events_cover_both_stages() {
        let sink = Arc::new(CollectingSink::new());
        run_page(
            MockPageRasterizer::new(1),
            MockRecognitionEngine::new("text", 80.0),
            &limits(),
            Some(sink.clone()),
        )
        .await;

        let events = sink.snapshot();
        assert!(matches!(
            events[0],
            ProgressEvent::Converting { page: 1, total: 1 }
        ));
        let percents: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Ocr { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert!(percents.contains(&0));
        assert!(percents.contains(&100));
    }

    #[tokio::test]
    async fn failed_page_emits_error_event() {
        let sink = Arc::new(CollectingSink::new());
        run_page(
            MockPageRasterizer::new(1).failing_on(vec![1]),
            MockRecognitionEngine::new("unused", 80.0),
            &limits(),
            Some(sink.clone()),
        )
        .await;

        let events = sink.snapshot();
        assert!(events
            .iter()
            .any(|e| matches!(e, ProgressEvent::PageFailed { page: 1, .. })));
    }
}
