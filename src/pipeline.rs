use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::dataset::RiskDataset;
use crate::error::{Result, ScraperError};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::reference::{AliasTable, CountryReference};
use crate::scrapers::cdc::{CdcCrawler, CdcNormalizer, CdcTableParser};
use crate::storage::LetterStore;
use crate::types::{Letter, NormalizedRow};

/// Outcome of fetching a set of letters.
#[derive(Debug, Default, Serialize)]
pub struct FetchReport {
    pub fetched: Vec<Letter>,
    /// Skipped because a non-empty file was already on disk.
    pub cached: Vec<Letter>,
    /// Fetched, but the page had no table in time; an empty file was written.
    pub empty: Vec<Letter>,
    pub errors: Vec<String>,
}

/// Result of a complete pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub total_rows: usize,
    pub letters_with_data: Vec<Letter>,
    pub errors: Vec<String>,
    pub dataset: RiskDataset,
    pub reconcile: Option<ReconcileReport>,
}

/// How the aggregated rows get their codes.
pub struct ReconcileOptions<'a> {
    pub reference: &'a CountryReference,
    pub aliases: &'a AliasTable,
    /// Fail the run when a row is left without a code.
    pub strict: bool,
}

pub struct Pipeline;

impl Pipeline {
    /// Fetch letters one after another. A letter already on disk with content is
    /// skipped unless `force` is set. A failing letter is recorded and the rest continue.
    #[instrument(skip(crawler, store, letters), fields(letters = letters.len()))]
    pub async fn fetch_tables(
        crawler: &CdcCrawler,
        store: &LetterStore,
        letters: &[Letter],
        force: bool,
    ) -> FetchReport {
        let mut report = FetchReport::default();
        for &letter in letters {
            if !force && store.is_cached(letter) {
                debug!("'{}' already stored, skipping fetch", letter);
                report.cached.push(letter);
                continue;
            }
            match crawler.fetch_and_store(letter, store).await {
                Ok(path) => {
                    if store.is_cached(letter) {
                        report.fetched.push(letter);
                    } else {
                        warn!("'{}' produced an empty file at {}", letter, path.display());
                        report.empty.push(letter);
                    }
                }
                Err(e) => {
                    error!("Fetching '{}' failed: {}", letter, e);
                    report.errors.push(format!("{letter}: {e}"));
                }
            }
        }
        info!(
            "Fetch finished: {} fetched, {} cached, {} empty, {} errors",
            report.fetched.len(),
            report.cached.len(),
            report.empty.len(),
            report.errors.len()
        );
        report
    }

    /// Parse and normalize one letter. A missing or empty file gives no rows.
    pub fn letter_rows(store: &LetterStore, letter: Letter) -> Result<Vec<NormalizedRow>> {
        if !store.exists(letter) {
            warn!("No stored table for '{}' at {}", letter, store.path_for(letter).display());
            return Ok(Vec::new());
        }
        let parsed = CdcTableParser::new().parse_letter(store, letter)?;
        Ok(CdcNormalizer::new().normalize_rows(parsed))
    }

    /// Union of the normalized rows of every letter, in letter order.
    pub fn collect_rows(store: &LetterStore, letters: &[Letter]) -> (Vec<NormalizedRow>, Vec<Letter>, Vec<String>) {
        let mut rows = Vec::new();
        let mut with_data = Vec::new();
        let mut errors = Vec::new();

        for &letter in letters {
            match Self::letter_rows(store, letter) {
                Ok(letter_rows) if letter_rows.is_empty() => {
                    debug!("'{}' contributed no rows", letter);
                }
                Ok(letter_rows) => {
                    with_data.push(letter);
                    rows.extend(letter_rows);
                }
                Err(e) => {
                    error!("Processing '{}' failed: {}", letter, e);
                    errors.push(format!("{letter}: {e}"));
                }
            }
        }
        (rows, with_data, errors)
    }

    /// Aggregate the stored letters and optionally reconcile codes.
    #[instrument(skip_all, fields(data_dir = %store.data_dir().display()))]
    pub fn run(
        store: &LetterStore,
        letters: &[Letter],
        reconcile: Option<ReconcileOptions<'_>>,
    ) -> Result<PipelineResult> {
        let (rows, letters_with_data, errors) = Self::collect_rows(store, letters);
        let total_rows = rows.len();
        info!(
            "Aggregated {} rows from {} of {} letters ({} errors)",
            total_rows,
            letters_with_data.len(),
            letters.len(),
            errors.len()
        );

        let (dataset, report) = match reconcile {
            Some(opts) => {
                let reconciler = Reconciler::new(opts.reference, opts.aliases);
                let (dataset, report) = if opts.strict {
                    match reconciler.reconcile_strict(rows) {
                        Ok(reconciled) => reconciled,
                        Err(ScraperError::Unreconciled { unresolved, .. }) => {
                            return Err(ScraperError::Unreconciled {
                                unresolved,
                                letter_errors: errors,
                            })
                        }
                        Err(e) => return Err(e),
                    }
                } else {
                    reconciler.reconcile(rows)
                };
                (dataset, Some(report))
            }
            None => (RiskDataset::without_codes(rows), None),
        };

        Ok(PipelineResult {
            total_rows,
            letters_with_data,
            errors,
            dataset,
            reconcile: report,
        })
    }
}
