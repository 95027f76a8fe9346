use serde::Serialize;
use std::collections::BTreeSet;

use crate::types::{NormalizedRow, ReconciledRow, RiskLevel};

/// The combined risk table, one row per country entry, keyed by country name.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct RiskDataset {
    rows: Vec<ReconciledRow>,
}

impl RiskDataset {
    pub fn new(rows: Vec<ReconciledRow>) -> Self {
        Self { rows }
    }

    /// Dataset without codes, in input order.
    pub fn without_codes(rows: Vec<NormalizedRow>) -> Self {
        Self::new(rows.into_iter().map(ReconciledRow::unjoined).collect())
    }

    pub fn rows(&self) -> &[ReconciledRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First row for a country name.
    pub fn get(&self, country: &str) -> Option<&ReconciledRow> {
        self.rows.iter().find(|r| r.country == country)
    }

    pub fn get_all<'a>(&'a self, country: &'a str) -> impl Iterator<Item = &'a ReconciledRow> + 'a {
        self.rows.iter().filter(move |r| r.country == country)
    }

    /// Distinct risk levels that occur in the data.
    pub fn categories(&self) -> BTreeSet<&RiskLevel> {
        self.rows.iter().map(|r| &r.estimated_risk).collect()
    }
}
