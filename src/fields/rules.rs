//! Ordered pattern rules for the required contract fields.
//!
//! One rule group per field; alternatives within a group are tried in order
//! and the first match wins. Each alternative carries a fixed confidence
//! weight reflecting its specificity: a labeled "Purchase Price: $X" is
//! worth more than a bare dollar amount anywhere in the text. Patterns stay
//! deliberately loose about whitespace and punctuation because the input is
//! noisy OCR text.

use std::sync::LazyLock;

use regex::Regex;

use super::FieldName;

/// A compiled pattern alternative. Capture group 1 is the field value.
pub(super) struct FieldPattern {
    pub regex: Regex,
    pub confidence: f32,
}

fn pattern(re: &str, confidence: f32) -> FieldPattern {
    FieldPattern {
        regex: Regex::new(re).expect("invalid built-in field pattern"),
        confidence,
    }
}

/// Numeric or written-month date.
const DATE: &str = r"(?:\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}|(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4})";

/// Dollar amount with optional thousands separators and cents.
const MONEY: &str = r"\$\s*[0-9][0-9,]*(?:\.[0-9]{2})?";

/// The rule table, in required-field output order.
pub(super) static FIELD_RULES: LazyLock<Vec<(FieldName, Vec<FieldPattern>)>> =
    LazyLock::new(|| {
        vec![
            (
                FieldName::PropertyAddress,
                vec![
                    pattern(r"(?i)property\s+address\s*[:\-]\s*([^\n]+)", 85.0),
                    pattern(
                        r"(?i)(?:commonly\s+known\s+as|located\s+at|premises\s+at)\s*:?\s*([0-9][^\n;]+)",
                        70.0,
                    ),
                    pattern(
                        r"(?m)^[^\S\n]*([0-9]{1,6}\s+[A-Za-z0-9 .']+\s+(?:Street|St\.?|Avenue|Ave\.?|Boulevard|Blvd\.?|Road|Rd\.?|Drive|Dr\.?|Lane|Ln\.?|Way|Court|Ct\.?|Place|Pl\.?|Parkway|Pkwy\.?)[^\n]*)",
                        55.0,
                    ),
                ],
            ),
            (
                FieldName::LegalDescription,
                vec![
                    pattern(r"(?i)legal\s+description\s*[:\-]\s*([^\n]+)", 85.0),
                    pattern(r"(?i)\b(lot\s+\d+[^\n]*?block\s+\d+[^\n]*)", 70.0),
                    pattern(r"(?i)\b(parcel\s+(?:no\.?|number|id)\s*:?\s*[A-Z0-9\-]+[^\n]*)", 60.0),
                ],
            ),
            (
                FieldName::BuyerName,
                vec![
                    pattern(r"(?i)buyer(?:'s)?(?:\s+name)?\s*[:\-]\s*([^\n]+)", 80.0),
                    pattern(r"(?i)purchaser\s*[:\-]\s*([^\n]+)", 75.0),
                    pattern(
                        r#"(?i)\band\s+([A-Z][A-Za-z0-9 .,&']+?)\s*[,(]\s*(?:the\s+)?["“”]?buyer"#,
                        60.0,
                    ),
                ],
            ),
            (
                FieldName::SellerName,
                vec![
                    pattern(r"(?i)seller(?:'s)?(?:\s+name)?\s*[:\-]\s*([^\n]+)", 80.0),
                    pattern(r"(?i)\b(?:vendor|grantor)\s*[:\-]\s*([^\n]+)", 75.0),
                    pattern(
                        r#"(?i)\bbetween\s+([A-Z][A-Za-z0-9 .,&']+?)\s*[,(]\s*(?:the\s+)?["“”]?seller"#,
                        60.0,
                    ),
                ],
            ),
            (
                FieldName::PurchasePrice,
                vec![
                    pattern(
                        &format!(r"(?i)purchase\s+price\s*(?:of|is|shall\s+be)?\s*[:\-]?\s*({MONEY})"),
                        90.0,
                    ),
                    pattern(
                        &format!(
                            r"(?i)(?:total\s+consideration|sales?\s+price)\s*(?:of|is)?\s*[:\-]?\s*({MONEY})"
                        ),
                        75.0,
                    ),
                    pattern(r"(\$\s*[0-9]{1,3}(?:,[0-9]{3})+(?:\.[0-9]{2})?)", 50.0),
                ],
            ),
            (
                FieldName::EarnestMoney,
                vec![
                    pattern(
                        &format!(
                            r"(?i)earnest\s+money(?:\s+deposit)?\s*(?:of|in\s+the\s+amount\s+of)?\s*[:\-]?\s*({MONEY})"
                        ),
                        85.0,
                    ),
                    pattern(&format!(r"(?i)\bdeposit\s*(?:of)?\s*[:\-]?\s*({MONEY})"), 60.0),
                ],
            ),
            (
                FieldName::ExecutionDate,
                vec![
                    pattern(
                        &format!(r"(?i)(?:execution\s+date|date\s+of\s+execution)\s*[:\-]?\s*({DATE})"),
                        75.0,
                    ),
                    pattern(
                        &format!(r"(?i)executed\s+(?:on|as\s+of)\s+(?:this\s+)?({DATE})"),
                        65.0,
                    ),
                    pattern(&format!(r"(?i)\bdated\s+(?:as\s+of\s+)?({DATE})"), 55.0),
                ],
            ),
            (
                FieldName::ClosingDate,
                vec![
                    pattern(&format!(r"(?i)closing\s+date\s*[:\-]?\s*({DATE})"), 75.0),
                    pattern(
                        &format!(
                            r"(?i)(?:close\s+of\s+escrow|settlement\s+date)\s*[:\-]?\s*({DATE})"
                        ),
                        65.0,
                    ),
                    pattern(
                        &format!(
                            r"(?i)closing\s+shall\s+(?:occur|take\s+place)\s+on(?:\s+or\s+before)?\s+({DATE})"
                        ),
                        55.0,
                    ),
                ],
            ),
        ]
    });
