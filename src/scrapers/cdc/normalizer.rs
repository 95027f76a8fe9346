use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{NormalizedRow, ParsedRiskRow, RiskLevel};

// Everything from the first "(", ";" or "," onward is an annotation.
static COUNTRY_ANNOTATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)[(;,].*").unwrap());
// Footnote markers: a digit and whatever follows it.
static RISK_FOOTNOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\d.*").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Primary form of a country name: "Congo, Republic of" -> "Congo".
pub fn trim_country(raw: &str) -> String {
    COUNTRY_ANNOTATION.replace(raw, "").trim().to_string()
}

/// Canonical risk level: "Very Low2" -> "very low".
pub fn categorize_risk(raw: &str) -> RiskLevel {
    let without_footnote = RISK_FOOTNOTE.replace(raw, "");
    let collapsed = WHITESPACE.replace_all(&without_footnote, " ");
    RiskLevel::from_canonical(collapsed.trim().to_lowercase())
}

/// Turns parsed rows into normalized rows.
pub struct CdcNormalizer;

impl Default for CdcNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CdcNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize_row(&self, row: ParsedRiskRow) -> NormalizedRow {
        NormalizedRow {
            country: trim_country(&row.country),
            estimated_risk: categorize_risk(&row.estimated_risk),
            areas_with_malaria: row.areas_with_malaria,
            raw_country: row.country,
        }
    }

    pub fn normalize_rows(&self, rows: Vec<ParsedRiskRow>) -> Vec<NormalizedRow> {
        rows.into_iter().map(|r| self.normalize_row(r)).collect()
    }
}
