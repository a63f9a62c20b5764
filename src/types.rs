use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw output of one recognition engine call over one page raster.
///
/// `confidence` is the engine's self-reported quality estimate on the 0-100
/// scale. Zero signals total failure, not literally zero-quality text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recognition {
    pub text: String,
    pub confidence: f32,
}

/// Lifecycle of a single page inside the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    Pending,
    Rasterizing,
    Recognizing,
    Succeeded,
    Failed,
}

impl PageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Rasterizing => "rasterizing",
            Self::Recognizing => "recognizing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of running one page through rasterization and recognition.
///
/// A failed page carries its error message here and as a marker in the
/// aggregate text; it never aborts the document run. A succeeded page with
/// empty text has `confidence: None` and is excluded from the document
/// average while still counting as processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecognition {
    /// 1-based page number.
    pub page_number: usize,
    pub state: PageState,
    pub text: String,
    pub confidence: Option<f32>,
    pub error: Option<String>,
}

impl PageRecognition {
    /// Page produced non-empty recognized text.
    pub fn has_usable_text(&self) -> bool {
        self.state == PageState::Succeeded && !self.text.trim().is_empty()
    }
}

/// Aggregate result of scanning one document.
///
/// `text` concatenates `--- Page N ---` headers with each page's fragment
/// for every page in ascending order, failed pages annotated inline.
/// `confidence` averages only pages that produced usable text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub document_id: Uuid,
    pub text: String,
    pub confidence: f32,
    pub pages: Vec<PageRecognition>,
    pub page_count: usize,
}

impl ScanResult {
    /// Number of pages that contributed to the confidence average.
    pub fn usable_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.has_usable_text()).count()
    }
}
