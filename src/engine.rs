//! Recognition engine adapter.
//!
//! Wraps a black-box OCR engine behind a narrow trait: PNG bytes plus a
//! `RecognitionConfig` in, recognized text plus a 0-100 confidence out.
//! Engine progress is forwarded as whole percents through a callback
//! supplied by the caller.
//!
//! The production engine (`TesseractEngine`) is only available when
//! compiled with the `ocr` feature flag; mocks below cover everything else.

use crate::config::RecognitionConfig;
use crate::error::PipelineError;
use crate::types::Recognition;

/// Converts one page raster into text plus a confidence estimate.
///
/// Implementations report confidence exactly as the engine does, clamped to
/// the documented 0-100 range, with one exception: an empty or
/// whitespace-only text result is scored 0 even when the engine claims
/// otherwise. Text quality, not just the score, gates success.
pub trait RecognitionEngine: Send + Sync {
    fn recognize(
        &self,
        image_png: &[u8],
        config: &RecognitionConfig,
        on_progress: &dyn Fn(u8),
    ) -> Result<Recognition, PipelineError>;
}

/// Convert an engine's fractional completion (0.0-1.0) to whole percents.
///
/// Engines report the recognizing phase as a fraction; sinks only ever see
/// whole percents. Out-of-range fractions clamp to the endpoints.
pub fn progress_percent(fraction: f32) -> u8 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}

/// Normalize a raw engine result: clamp confidence into 0-100 and zero it
/// when the text carries nothing usable.
fn normalize(text: String, confidence: f32) -> Recognition {
    let confidence = if text.trim().is_empty() {
        0.0
    } else {
        confidence.clamp(0.0, 100.0)
    };
    Recognition { text, confidence }
}

/// Bundled Tesseract engine.
/// Only available when compiled with the `ocr` feature flag.
#[cfg(feature = "ocr")]
pub struct TesseractEngine {
    tessdata_dir: std::path::PathBuf,
}

#[cfg(feature = "ocr")]
impl TesseractEngine {
    /// Initialize with a tessdata directory.
    ///
    /// Fail-fast: the English traineddata file must exist, otherwise every
    /// later recognition call would fail identically.
    pub fn new(tessdata_dir: &std::path::Path) -> Result<Self, PipelineError> {
        if !tessdata_dir.join("eng.traineddata").exists() {
            return Err(PipelineError::TessdataNotFound(tessdata_dir.to_path_buf()));
        }
        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
        })
    }
}

#[cfg(feature = "ocr")]
impl RecognitionEngine for TesseractEngine {
    fn recognize(
        &self,
        image_png: &[u8],
        config: &RecognitionConfig,
        on_progress: &dyn Fn(u8),
    ) -> Result<Recognition, PipelineError> {
        let tessdata_str = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| PipelineError::EngineInit("Invalid tessdata path".into()))?;

        // The binding does not expose the C API's progress monitor, so the
        // recognizing phase reports its endpoints only.
        on_progress(progress_percent(0.0));

        let mut tess = tesseract::Tesseract::new(Some(tessdata_str), Some(&config.language))
            .map_err(|e| PipelineError::EngineInit(format!("{e:?}")))?;

        // Each config field maps to its own engine variable, never merged.
        tess = tess
            .set_variable(
                "tessedit_pageseg_mode",
                &config.page_seg_mode.as_code().to_string(),
            )
            .map_err(|e| PipelineError::EngineConfig(format!("{e:?}")))?;
        tess = tess
            .set_variable(
                "tessedit_ocr_engine_mode",
                &config.engine_mode.as_code().to_string(),
            )
            .map_err(|e| PipelineError::EngineConfig(format!("{e:?}")))?;
        if config.preserve_interword_spaces {
            tess = tess
                .set_variable("preserve_interword_spaces", "1")
                .map_err(|e| PipelineError::EngineConfig(format!("{e:?}")))?;
        }
        if let Some(ref whitelist) = config.char_whitelist {
            tess = tess
                .set_variable("tessedit_char_whitelist", whitelist)
                .map_err(|e| PipelineError::EngineConfig(format!("{e:?}")))?;
        }
        if let Some(ref blacklist) = config.char_blacklist {
            tess = tess
                .set_variable("tessedit_char_blacklist", blacklist)
                .map_err(|e| PipelineError::EngineConfig(format!("{e:?}")))?;
        }

        let mut tess = tess
            .set_image_from_mem(image_png)
            .map_err(|e| PipelineError::EngineProcessing(format!("{e:?}")))?;

        let text = tess
            .get_text()
            .map_err(|e| PipelineError::EngineProcessing(format!("{e:?}")))?;

        on_progress(progress_percent(1.0));

        let confidence = tess.mean_text_conf().clamp(0, 100) as f32;

        tracing::debug!(
            lang = %config.language,
            psm = config.page_seg_mode.as_code(),
            confidence,
            text_length = text.len(),
            "Tesseract recognition complete"
        );

        Ok(normalize(text, confidence))
    }
}

// ── Mocks for testing ─────────────────────────────────────

/// Mock engine returning fixed text and confidence for every raster.
///
/// Reports the full progress ramp so sinks see whole-percent updates, and
/// optionally sleeps to exercise the recognition timeout path.
pub struct MockRecognitionEngine {
    pub text: String,
    pub confidence: f32,
    delay: Option<std::time::Duration>,
}

impl MockRecognitionEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl RecognitionEngine for MockRecognitionEngine {
    fn recognize(
        &self,
        _image_png: &[u8],
        _config: &RecognitionConfig,
        on_progress: &dyn Fn(u8),
    ) -> Result<Recognition, PipelineError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        for fraction in [0.0f32, 0.25, 0.5, 0.75, 1.0] {
            on_progress(progress_percent(fraction));
        }
        Ok(normalize(self.text.clone(), self.confidence))
    }
}

/// Mock engine that plays back a script of per-call outcomes.
///
/// Each call pops the next entry: `Ok((text, confidence))` or
/// `Err(message)` (surfaced as an engine processing failure). An exhausted
/// script repeats its last entry.
pub struct ScriptedRecognitionEngine {
    script: std::sync::Mutex<Vec<Result<(String, f32), String>>>,
}

impl ScriptedRecognitionEngine {
    pub fn new(outcomes: Vec<Result<(&str, f32), &str>>) -> Self {
        let script = outcomes
            .into_iter()
            .rev()
            .map(|o| match o {
                Ok((text, conf)) => Ok((text.to_string(), conf)),
                Err(msg) => Err(msg.to_string()),
            })
            .collect();
        Self {
            script: std::sync::Mutex::new(script),
        }
    }
}

impl RecognitionEngine for ScriptedRecognitionEngine {
    fn recognize(
        &self,
        _image_png: &[u8],
        _config: &RecognitionConfig,
        on_progress: &dyn Fn(u8),
    ) -> Result<Recognition, PipelineError> {
        let mut script = self.script.lock().expect("script poisoned");
        let outcome = if script.len() > 1 {
            script.pop().expect("checked non-empty")
        } else {
            script.last().cloned().unwrap_or(Ok((String::new(), 0.0)))
        };
        on_progress(100);
        match outcome {
            Ok((text, confidence)) => Ok(normalize(text, confidence)),
            Err(msg) => Err(PipelineError::EngineProcessing(msg)),
        }
    }
}
