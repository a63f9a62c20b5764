//! Pipeline configuration: recognition engine settings and run limits.
//!
//! `RecognitionConfig` is immutable per run: swapping it means re-running
//! the whole document, not patching an in-flight scan. `PipelineLimits`
//! carries the policy knobs (timeouts, size caps) with defaults tuned for
//! letter-size scanned contracts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Page-segmentation modes the engine understands.
///
/// Integer codes follow the engine's own numbering; unknown codes are
/// rejected rather than coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSegMode {
    /// Fully automatic page segmentation (code 3).
    Automatic,
    /// Single column of text of variable sizes (code 4).
    SingleColumn,
    /// Single uniform block of text (code 6). Default for contract pages.
    UniformBlock,
    /// Single text line (code 7).
    SingleLine,
    /// Single word (code 8).
    SingleWord,
    /// Sparse text, find as much as possible in no particular order (code 11).
    SparseText,
}

impl PageSegMode {
    pub fn as_code(&self) -> u8 {
        match self {
            Self::Automatic => 3,
            Self::SingleColumn => 4,
            Self::UniformBlock => 6,
            Self::SingleLine => 7,
            Self::SingleWord => 8,
            Self::SparseText => 11,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            3 => Some(Self::Automatic),
            4 => Some(Self::SingleColumn),
            6 => Some(Self::UniformBlock),
            7 => Some(Self::SingleLine),
            8 => Some(Self::SingleWord),
            11 => Some(Self::SparseText),
            _ => None,
        }
    }

    pub fn all() -> &'static [PageSegMode] {
        &[
            Self::Automatic,
            Self::SingleColumn,
            Self::UniformBlock,
            Self::SingleLine,
            Self::SingleWord,
            Self::SparseText,
        ]
    }
}

impl Default for PageSegMode {
    fn default() -> Self {
        Self::UniformBlock
    }
}

/// OCR engine mode selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Legacy engine only (code 0).
    LegacyOnly,
    /// Neural-net LSTM engine only (code 1).
    LstmOnly,
    /// Legacy + LSTM combined (code 2).
    LegacyAndLstm,
    /// Default, based on what is available (code 3).
    Combined,
}

impl EngineMode {
    pub fn as_code(&self) -> u8 {
        match self {
            Self::LegacyOnly => 0,
            Self::LstmOnly => 1,
            Self::LegacyAndLstm => 2,
            Self::Combined => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::LegacyOnly),
            1 => Some(Self::LstmOnly),
            2 => Some(Self::LegacyAndLstm),
            3 => Some(Self::Combined),
            _ => None,
        }
    }
}

impl Default for EngineMode {
    fn default() -> Self {
        Self::Combined
    }
}

/// Recognition settings for one pipeline run.
///
/// Each field maps to a distinct engine option. The adapter passes them
/// through one-to-one, never merged or reinterpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// Engine language code (e.g. "eng").
    pub language: String,
    pub page_seg_mode: PageSegMode,
    pub engine_mode: EngineMode,
    /// Keep the engine's inter-word spacing instead of collapsing it.
    pub preserve_interword_spaces: bool,
    /// Restrict recognition to these characters, when set.
    pub char_whitelist: Option<String>,
    /// Never recognize these characters, when set.
    pub char_blacklist: Option<String>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            page_seg_mode: PageSegMode::default(),
            engine_mode: EngineMode::default(),
            preserve_interword_spaces: false,
            char_whitelist: None,
            char_blacklist: None,
        }
    }
}

impl RecognitionConfig {
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    pub fn with_page_seg_mode(mut self, mode: PageSegMode) -> Self {
        self.page_seg_mode = mode;
        self
    }

    pub fn with_whitelist(mut self, chars: &str) -> Self {
        self.char_whitelist = Some(chars.to_string());
        self
    }

    pub fn with_blacklist(mut self, chars: &str) -> Self {
        self.char_blacklist = Some(chars.to_string());
        self
    }
}

/// Default upper bound on input file size (50 MB).
pub const MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

/// Default upper bound on document page count.
pub const MAX_PAGES: usize = 20;

/// Policy knobs for a pipeline instance.
///
/// The size and page caps are policy, not core invariants. Set them to
/// `None` to disable. Timeouts are always enforced per stage.
#[derive(Debug, Clone)]
pub struct PipelineLimits {
    /// Rasterization DPI. 200 DPI ~ 2.78x the 72-pt PDF page size.
    pub render_dpi: u32,
    /// Per-page rasterization deadline.
    pub render_timeout: Duration,
    /// Per-page recognition deadline.
    pub recognition_timeout: Duration,
    pub max_file_bytes: Option<u64>,
    pub max_pages: Option<usize>,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            render_dpi: crate::raster::DEFAULT_RENDER_DPI,
            render_timeout: Duration::from_secs(30),
            recognition_timeout: Duration::from_secs(90),
            max_file_bytes: Some(MAX_FILE_BYTES),
            max_pages: Some(MAX_PAGES),
        }
    }
}

impl PipelineLimits {
    /// Remove the file-size and page-count caps, keeping the timeouts.
    pub fn unbounded(mut self) -> Self {
        self.max_file_bytes = None;
        self.max_pages = None;
        self
    }
}
