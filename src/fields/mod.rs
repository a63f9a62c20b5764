//! Field extraction from recognized contract text.
//!
//! `extract` is a pure function over the aggregate OCR text: it applies the
//! ordered rule table in `rules` and always returns exactly one entry per
//! required field, in a stable order, whether or not anything matched.
//! Re-running after the text has been corrected by hand is just calling
//! `extract` again. The result fully replaces any previous field list, no
//! merging.

mod rules;

use serde::{Deserialize, Serialize};

use rules::FIELD_RULES;

/// Confidence assigned when a human overwrites a field value.
/// Manual trust overrides OCR trust.
pub const MANUAL_EDIT_CONFIDENCE: f32 = 100.0;

/// The required contract fields, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    PropertyAddress,
    LegalDescription,
    BuyerName,
    SellerName,
    PurchasePrice,
    EarnestMoney,
    ExecutionDate,
    ClosingDate,
}

impl FieldName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PropertyAddress => "Property Address",
            Self::LegalDescription => "Legal Description",
            Self::BuyerName => "Buyer Name",
            Self::SellerName => "Seller Name",
            Self::PurchasePrice => "Purchase Price",
            Self::EarnestMoney => "Earnest Money",
            Self::ExecutionDate => "Execution Date",
            Self::ClosingDate => "Closing Date",
        }
    }

    /// Column label used in the CSV export (party names shorten there).
    pub fn csv_label(&self) -> &'static str {
        match self {
            Self::BuyerName => "Buyer",
            Self::SellerName => "Seller",
            other => other.as_str(),
        }
    }

    pub fn all() -> &'static [FieldName] {
        &[
            Self::PropertyAddress,
            Self::LegalDescription,
            Self::BuyerName,
            Self::SellerName,
            Self::PurchasePrice,
            Self::EarnestMoney,
            Self::ExecutionDate,
            Self::ClosingDate,
        ]
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One extracted (or missing) contract field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub field: FieldName,
    pub value: String,
    pub confidence: f32,
    /// Full text the winning pattern matched, for review.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
}

impl ExtractedField {
    fn missing(field: FieldName) -> Self {
        Self {
            field,
            value: String::new(),
            confidence: 0.0,
            original_text: None,
        }
    }

    /// Overwrite the value with a human correction.
    ///
    /// Forces confidence to 100 regardless of the prior score and keeps the
    /// machine-extracted value visible in `original_text`.
    pub fn apply_edit(&mut self, new_value: &str) {
        if self.original_text.is_none() && !self.value.is_empty() {
            self.original_text = Some(self.value.clone());
        }
        self.value = new_value.trim().to_string();
        self.confidence = MANUAL_EDIT_CONFIDENCE;
    }
}

/// Extract the required fields from recognized text.
///
/// Pure and deterministic: the same text always yields the same list.
/// Always returns exactly one entry per required field, in `FieldName::all()`
/// order; fields no pattern matched come back with an empty value and
/// confidence 0 so the downstream form always has one row per field.
pub fn extract(text: &str) -> Vec<ExtractedField> {
    FIELD_RULES
        .iter()
        .map(|(field, patterns)| {
            for pattern in patterns {
                if let Some(caps) = pattern.regex.captures(text) {
                    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                    let value = clean_value(raw);
                    if value.is_empty() {
                        continue;
                    }
                    let matched = caps.get(0).map(|m| m.as_str().trim().to_string());
                    return ExtractedField {
                        field: *field,
                        value,
                        confidence: pattern.confidence,
                        original_text: matched,
                    };
                }
            }
            ExtractedField::missing(*field)
        })
        .collect()
}

/// Trim surrounding whitespace and trailing separator punctuation from a
/// captured value. Inner text is left untouched; OCR artifacts are the
/// reviewer's call, not ours.
fn clean_value(raw: &str) -> String {
    raw.trim().trim_end_matches([',', ';', ':']).trim_end().to_string()
}
