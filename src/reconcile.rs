use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::dataset::RiskDataset;
use crate::error::{Result, ScraperError};
use crate::reference::{AliasTable, CountryReference};
use crate::types::{CodeSource, NormalizedRow, ReconciledRow};

/// Counts and leftovers from one reconciliation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub total_rows: usize,
    pub matched_by_reference: usize,
    pub matched_by_alias: usize,
    /// Aliases that replaced a different code from the join.
    pub overridden: Vec<String>,
    /// Raw country cells still without a code.
    pub unresolved: Vec<String>,
    /// Country names that occur on more than one row.
    pub duplicate_countries: Vec<String>,
    /// Codes assigned to more than one distinct country name.
    pub duplicate_codes: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
            && self.duplicate_countries.is_empty()
            && self.duplicate_codes.is_empty()
    }
}

/// Attaches ISO-3 codes to normalized rows: left join on country name
/// against the reference, then alias overrides, then sort by code.
pub struct Reconciler<'a> {
    reference: &'a CountryReference,
    aliases: &'a AliasTable,
}

impl<'a> Reconciler<'a> {
    pub fn new(reference: &'a CountryReference, aliases: &'a AliasTable) -> Self {
        Self { reference, aliases }
    }

    pub fn reconcile(&self, rows: Vec<NormalizedRow>) -> (RiskDataset, ReconcileReport) {
        let mut report = ReconcileReport {
            total_rows: rows.len(),
            ..Default::default()
        };

        let mut reconciled: Vec<ReconciledRow> = rows
            .into_iter()
            .map(|row| {
                let joined = self.reference.code_for(&row.country).map(str::to_string);
                let alias = self
                    .aliases
                    .resolve(&row.raw_country, &row.country, self.reference);

                let (iso_a3, code_source) = match (alias, joined) {
                    (Some(code), joined) => {
                        if let Some(prev) = joined.as_ref().filter(|j| **j != code) {
                            debug!("Alias for '{}' replaces joined code {} with {}", row.raw_country, prev, code);
                            report.overridden.push(row.raw_country.clone());
                        }
                        report.matched_by_alias += 1;
                        (Some(code), CodeSource::Alias)
                    }
                    (None, Some(code)) => {
                        report.matched_by_reference += 1;
                        (Some(code), CodeSource::Reference)
                    }
                    (None, None) => {
                        report.unresolved.push(row.raw_country.clone());
                        (None, CodeSource::Unresolved)
                    }
                };

                ReconciledRow {
                    iso_a3,
                    code_source,
                    ..ReconciledRow::unjoined(row)
                }
            })
            .collect();

        sort_by_code(&mut reconciled);
        report.duplicate_countries = duplicates(reconciled.iter().map(|r| r.country.as_str()));
        report.duplicate_codes = shared_codes(&reconciled);

        info!(
            "Reconciled {} rows: {} by reference, {} by alias, {} unresolved",
            report.total_rows,
            report.matched_by_reference,
            report.matched_by_alias,
            report.unresolved.len()
        );
        for name in &report.unresolved {
            warn!("No ISO-3 code for '{}'", name);
        }
        for name in &report.duplicate_countries {
            warn!("Country '{}' appears on more than one row", name);
        }
        for code in &report.duplicate_codes {
            warn!("Code {} is shared by more than one country", code);
        }

        (RiskDataset::new(reconciled), report)
    }

    /// Like `reconcile`, but any row left without a code is an error.
    pub fn reconcile_strict(&self, rows: Vec<NormalizedRow>) -> Result<(RiskDataset, ReconcileReport)> {
        let (dataset, report) = self.reconcile(rows);
        if report.unresolved.is_empty() {
            Ok((dataset, report))
        } else {
            Err(ScraperError::Unreconciled {
                unresolved: report.unresolved,
                letter_errors: Vec::new(),
            })
        }
    }
}

/// Ascending by code with missing codes last; ties broken by country name.
pub fn sort_by_code(rows: &mut [ReconciledRow]) {
    rows.sort_by(|a, b| match (&a.iso_a3, &b.iso_a3) {
        (Some(x), Some(y)) => x.cmp(y).then_with(|| a.country.cmp(&b.country)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.country.cmp(&b.country),
    });
}

fn duplicates<'s>(names: impl Iterator<Item = &'s str>) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for name in names {
        *counts.entry(name).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(name, _)| name.to_string())
        .collect()
}

fn shared_codes(rows: &[ReconciledRow]) -> Vec<String> {
    let mut by_code: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for row in rows {
        if let Some(code) = row.iso_a3.as_deref() {
            let names = by_code.entry(code).or_default();
            if !names.contains(&row.country.as_str()) {
                names.push(&row.country);
            }
        }
    }
    by_code
        .into_iter()
        .filter(|(_, names)| names.len() > 1)
        .map(|(code, _)| code.to_string())
        .collect()
}
