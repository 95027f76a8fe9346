use crate::error::{Result, ScraperError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Starting letter of a per-letter country table page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Letter(char);

impl Letter {
    pub fn new(c: char) -> Result<Self> {
        let lower = c.to_ascii_lowercase();
        if lower.is_ascii_lowercase() {
            Ok(Self(lower))
        } else {
            Err(ScraperError::InvalidLetter(c.to_string()))
        }
    }

    /// All 26 letters, a through z.
    pub fn all() -> Vec<Letter> {
        crate::constants::all_letters().into_iter().map(Letter).collect()
    }

    /// Parse a list such as "abc" or "a,b,c" into letters, dropping duplicates.
    pub fn parse_list(s: &str) -> Result<Vec<Letter>> {
        let mut letters = Vec::new();
        for c in s.chars().filter(|c| !c.is_whitespace() && *c != ',') {
            let letter = Letter::new(c)?;
            if !letters.contains(&letter) {
                letters.push(letter);
            }
        }
        Ok(letters)
    }

    pub fn as_char(&self) -> char {
        self.0
    }
}

impl TryFrom<&str> for Letter {
    type Error = ScraperError;

    fn try_from(s: &str) -> Result<Self> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Letter::new(c),
            _ => Err(ScraperError::InvalidLetter(s.to_string())),
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the source table with all seven columns, as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRiskRow {
    pub country: String,
    pub areas_with_malaria: String,
    pub estimated_risk: String,
    pub drug_resistance: String,
    pub malaria_species: String,
    pub rec_prophylaxis: String,
    pub info: String,
}

/// The three columns kept from a raw row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRiskRow {
    pub country: String,
    pub areas_with_malaria: String,
    pub estimated_risk: String,
}

impl From<RawRiskRow> for ParsedRiskRow {
    fn from(raw: RawRiskRow) -> Self {
        Self {
            country: raw.country,
            areas_with_malaria: raw.areas_with_malaria,
            estimated_risk: raw.estimated_risk,
        }
    }
}

/// Categorical risk level. The set of levels is open; values are only built
/// by the normalizer, so two levels compare equal iff their canonical text does.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskLevel(String);

impl RiskLevel {
    pub(crate) fn from_canonical(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRow {
    pub country: String,
    /// Country cell as it appeared on the page, before trimming.
    pub raw_country: String,
    pub areas_with_malaria: String,
    pub estimated_risk: RiskLevel,
}

/// How a reconciled row got its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSource {
    Reference,
    Alias,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledRow {
    pub country: String,
    pub raw_country: String,
    pub areas_with_malaria: String,
    pub estimated_risk: RiskLevel,
    pub iso_a3: Option<String>,
    pub code_source: CodeSource,
}

impl ReconciledRow {
    pub fn unjoined(row: NormalizedRow) -> Self {
        Self {
            country: row.country,
            raw_country: row.raw_country,
            areas_with_malaria: row.areas_with_malaria,
            estimated_risk: row.estimated_risk,
            iso_a3: None,
            code_source: CodeSource::Unresolved,
        }
    }
}

/// Country name and ISO-3 code pair from the map reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub country: String,
    pub iso_a3: Option<String>,
}
