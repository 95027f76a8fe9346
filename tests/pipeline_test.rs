use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

use malaria_scraper::app::ports::{ElementLookup, PageRenderer, PageSession};
use malaria_scraper::error::{Result, ScraperError};
use malaria_scraper::output::{write_csv, write_dataset_to_file, OutputFormat};
use malaria_scraper::pipeline::{Pipeline, ReconcileOptions};
use malaria_scraper::reference::{load_reference, AliasTable};
use malaria_scraper::scrapers::cdc::CdcCrawler;
use malaria_scraper::storage::LetterStore;
use malaria_scraper::types::{CodeSource, Letter};

const B_TABLE: &str = r#"<table>
<tr><th>Country</th><th>Areas</th><th>Risk</th><th>Resistance</th><th>Species</th><th>Prophylaxis</th><th>Info</th></tr>
<tr><td>Benin</td><td>All</td><td>High</td><td>Chloroquine</td><td>P. falciparum</td><td>Atovaquone-proguanil</td><td></td></tr>
<tr><td>Bhutan</td><td>Rural areas below 1,700 m</td><td>Very Low</td><td>Chloroquine</td><td>P. vivax</td><td>Mefloquine</td><td></td></tr>
<tr><td>Bolivia</td><td>Amazon basin</td><td>Very low<sup>1</sup></td><td>Chloroquine</td><td>P. vivax</td><td>Primaquine</td><td></td></tr>
<tr><td>Burma (Myanmar)</td><td>Rural areas</td><td>Moderate2</td><td>Mefloquine</td><td>P. falciparum</td><td>Doxycycline</td><td></td></tr>
</table>"#;

const C_TABLE: &str = r#"<table>
<tr><th>Country</th><th>Areas</th><th>Risk</th><th>Resistance</th><th>Species</th><th>Prophylaxis</th><th>Info</th></tr>
<tr><td>Congo, Republic of</td><td>All</td><td>High</td><td>Chloroquine</td><td>P. falciparum</td><td>Doxycycline</td><td></td></tr>
<tr><td>Congo, Democratic Republic of the</td><td>All</td><td>High</td><td>Chloroquine</td><td>P. falciparum</td><td>Doxycycline</td><td></td></tr>
<tr><td>Côte d'Ivoire (Ivory Coast)</td><td>All</td><td>Moderate</td><td>Chloroquine</td><td>P. falciparum</td><td>Mefloquine</td><td></td></tr>
<tr><td>Comoros</td><td>All</td><td>Moderate</td><td>Chloroquine</td><td>P. falciparum</td><td>Mefloquine</td><td></td></tr>
<tr><td>Cayman Islands; British territory</td><td>None</td><td>No data</td><td></td><td></td><td></td><td></td></tr>
</table>"#;

fn letters(s: &str) -> Vec<Letter> {
    Letter::parse_list(s).unwrap()
}

fn bundled_reference() -> malaria_scraper::reference::CountryReference {
    load_reference(&Path::new(env!("CARGO_MANIFEST_DIR")).join("data").join("iso_a3.csv")).unwrap()
}

fn seeded_store(dir: &Path) -> LetterStore {
    let store = LetterStore::new(dir);
    store.write(Letter::new('b').unwrap(), B_TABLE).unwrap();
    store.write(Letter::new('c').unwrap(), C_TABLE).unwrap();
    store.write(Letter::new('x').unwrap(), "").unwrap();
    store
}

#[test]
fn test_aggregate_without_reconcile() {
    let tmp = tempdir().unwrap();
    let store = seeded_store(tmp.path());

    let result = Pipeline::run(&store, &Letter::all(), None).unwrap();

    assert_eq!(result.total_rows, 9);
    assert_eq!(result.letters_with_data, letters("bc"));
    assert!(result.errors.is_empty());
    assert!(result.reconcile.is_none());

    let congo_rows = result.dataset.get_all("Congo").count();
    assert_eq!(congo_rows, 2);
    assert_eq!(result.dataset.get("Burma").unwrap().estimated_risk.as_str(), "moderate");
    assert_eq!(result.dataset.get("Cayman Islands").unwrap().estimated_risk.as_str(), "no data");
}

#[test]
fn test_empty_letter_contributes_nothing() {
    let tmp = tempdir().unwrap();
    let store = seeded_store(tmp.path());

    let result = Pipeline::run(&store, &letters("x"), None).unwrap();
    assert_eq!(result.total_rows, 0);
    assert!(result.dataset.is_empty());
    assert!(result.errors.is_empty());
}

#[test]
fn test_missing_letter_file_contributes_nothing() {
    let tmp = tempdir().unwrap();
    let store = LetterStore::new(tmp.path());
    let result = Pipeline::run(&store, &letters("qz"), None).unwrap();
    assert_eq!(result.total_rows, 0);
    assert!(result.letters_with_data.is_empty());
    assert!(result.errors.is_empty());
}

#[test]
fn test_malformed_letter_is_recorded_not_fatal() {
    let tmp = tempdir().unwrap();
    let store = seeded_store(tmp.path());
    store
        .write(
            Letter::new('d').unwrap(),
            "<table><tr><td>1</td><td>2</td><td>3</td><td>4</td><td>5</td><td>6</td><td>7</td><td>8</td></tr></table>",
        )
        .unwrap();

    let result = Pipeline::run(&store, &letters("bd"), None).unwrap();
    assert_eq!(result.total_rows, 4);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("d:"));
}

#[test]
fn test_risk_casing_collapses_to_one_category() {
    let tmp = tempdir().unwrap();
    let store = seeded_store(tmp.path());
    let result = Pipeline::run(&store, &letters("b"), None).unwrap();

    let bhutan = result.dataset.get("Bhutan").unwrap();
    let bolivia = result.dataset.get("Bolivia").unwrap();
    assert_eq!(bhutan.estimated_risk, bolivia.estimated_risk);
    let categories: Vec<&str> = result.dataset.categories().into_iter().map(|c| c.as_str()).collect();
    assert_eq!(categories, vec!["high", "moderate", "very low"]);
}

#[test]
fn test_reconcile_against_bundled_reference() {
    let tmp = tempdir().unwrap();
    let store = seeded_store(tmp.path());
    let reference = bundled_reference();
    let aliases = AliasTable::builtin().unwrap();

    let result = Pipeline::run(
        &store,
        &Letter::all(),
        Some(ReconcileOptions {
            reference: &reference,
            aliases: &aliases,
            strict: false,
        }),
    )
    .unwrap();

    let ds = &result.dataset;
    assert_eq!(ds.get("Benin").unwrap().iso_a3.as_deref(), Some("BEN"));
    assert_eq!(ds.get("Benin").unwrap().code_source, CodeSource::Reference);

    let burma = ds.get("Burma").unwrap();
    assert_eq!(burma.iso_a3.as_deref(), Some("MMR"));
    assert_eq!(burma.code_source, CodeSource::Alias);

    assert_eq!(ds.get("Côte d'Ivoire").unwrap().iso_a3.as_deref(), Some("CIV"));
    assert_eq!(ds.get("Comoros").unwrap().iso_a3.as_deref(), Some("COM"));

    let congo_codes: Vec<_> = ds
        .get_all("Congo")
        .map(|r| (r.raw_country.as_str(), r.iso_a3.as_deref()))
        .collect();
    assert_eq!(
        congo_codes,
        vec![
            ("Congo, Democratic Republic of the", Some("COD")),
            ("Congo, Republic of", Some("COG")),
        ]
    );

    let report = result.reconcile.unwrap();
    assert_eq!(report.unresolved, vec!["Cayman Islands; British territory"]);
    assert_eq!(report.duplicate_countries, vec!["Congo"]);

    // Sorted by code, unresolved last.
    let last = ds.rows().last().unwrap();
    assert_eq!(last.country, "Cayman Islands");
    assert!(last.iso_a3.is_none());
    let codes: Vec<&str> = ds.rows().iter().filter_map(|r| r.iso_a3.as_deref()).collect();
    let mut sorted = codes.clone();
    sorted.sort();
    assert_eq!(codes, sorted);
}

#[test]
fn test_strict_reconcile_fails_on_unresolved() {
    let tmp = tempdir().unwrap();
    let store = seeded_store(tmp.path());
    let reference = bundled_reference();
    let aliases = AliasTable::builtin().unwrap();

    let err = Pipeline::run(
        &store,
        &letters("c"),
        Some(ReconcileOptions {
            reference: &reference,
            aliases: &aliases,
            strict: true,
        }),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ScraperError::Unreconciled { ref unresolved, ref letter_errors }
            if unresolved.len() == 1 && letter_errors.is_empty()
    ));
}

#[test]
fn test_strict_failure_carries_letter_errors() {
    let tmp = tempdir().unwrap();
    let store = seeded_store(tmp.path());
    store
        .write(
            Letter::new('d').unwrap(),
            "<table><tr><td>1</td><td>2</td><td>3</td><td>4</td><td>5</td><td>6</td><td>7</td><td>8</td></tr></table>",
        )
        .unwrap();
    let reference = bundled_reference();
    let aliases = AliasTable::builtin().unwrap();

    let err = Pipeline::run(
        &store,
        &letters("cd"),
        Some(ReconcileOptions {
            reference: &reference,
            aliases: &aliases,
            strict: true,
        }),
    )
    .unwrap_err();
    match &err {
        ScraperError::Unreconciled { unresolved, letter_errors } => {
            assert_eq!(unresolved, &vec!["Cayman Islands; British territory".to_string()]);
            assert_eq!(letter_errors.len(), 1);
            assert!(letter_errors[0].starts_with("d:"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("1 letter(s) also failed to parse"));
}

#[test]
fn test_spanned_country_rows_keep_their_country() {
    let tmp = tempdir().unwrap();
    let store = LetterStore::new(tmp.path());
    store
        .write(
            Letter::new('e').unwrap(),
            r#"<table>
            <tr><th>Country</th><th>Areas</th><th>Risk</th><th>Resistance</th><th>Species</th><th>Prophylaxis</th><th>Info</th></tr>
            <tr><td rowspan="2">Ecuador</td><td>Amazon provinces</td><td>Low</td><td>Chloroquine</td><td>P. vivax</td><td>Mefloquine</td><td></td></tr>
            <tr><td>Galapagos</td><td>None</td><td>N/A</td><td>N/A</td><td>Not applicable</td><td></td></tr>
            </table>"#,
        )
        .unwrap();
    store
        .write(
            Letter::new('a').unwrap(),
            r#"<table><tr><td>Andorra</td><td colspan="6">No malaria transmission</td></tr></table>"#,
        )
        .unwrap();

    let result = Pipeline::run(&store, &letters("ae"), None).unwrap();
    let ecuador: Vec<(&str, &str)> = result
        .dataset
        .get_all("Ecuador")
        .map(|r| (r.areas_with_malaria.as_str(), r.estimated_risk.as_str()))
        .collect();
    assert_eq!(ecuador, vec![("Amazon provinces", "low"), ("Galapagos", "none")]);
    assert_eq!(
        result.dataset.get("Andorra").unwrap().estimated_risk.as_str(),
        "no malaria transmission"
    );
}

#[test]
fn test_csv_output_of_run() {
    let tmp = tempdir().unwrap();
    let store = seeded_store(tmp.path());
    let reference = bundled_reference();
    let aliases = AliasTable::builtin().unwrap();
    let result = Pipeline::run(
        &store,
        &letters("b"),
        Some(ReconcileOptions {
            reference: &reference,
            aliases: &aliases,
            strict: true,
        }),
    )
    .unwrap();

    let mut buf = Vec::new();
    write_csv(&result.dataset, &mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "country,areas_with_malaria,estimated_risk,iso_a3");
    assert_eq!(lines[1], "Benin,All,high,BEN");
    assert_eq!(lines[2], "Bolivia,Amazon basin,very low,BOL");
    assert_eq!(lines[3], "Bhutan,\"Rural areas below 1,700 m\",very low,BTN");
    assert_eq!(lines[4], "Burma,Rural areas,moderate,MMR");

    let out = tmp.path().join("out").join("dataset.json");
    write_dataset_to_file(&result.dataset, OutputFormat::Json, &out).unwrap();
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 4);
}

/// Serves a one-row table for `b` and `c`; every other letter never renders one.
struct StaticRenderer {
    opened: AtomicUsize,
}

struct StaticSession {
    found: Option<String>,
}

#[async_trait]
impl PageRenderer for StaticRenderer {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StaticSession { found: None }))
    }
}

#[async_trait]
impl PageSession for StaticSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        let letter = url.trim_end_matches(".html").chars().last().unwrap();
        if "bc".contains(letter) {
            self.found = Some(format!("<table><tr><td>{letter}-land</td><td>All</td><td>Low</td></tr></table>"));
        }
        Ok(())
    }

    async fn find_element(&mut self, _tag: &str) -> Result<ElementLookup> {
        Ok(match &self.found {
            Some(html) => ElementLookup::Found(html.clone()),
            None => ElementLookup::Pending,
        })
    }

    async fn close(self: Box<Self>) {}
}

#[tokio::test]
async fn test_fetch_respects_cache_and_retries_empty() {
    let tmp = tempdir().unwrap();
    let store = LetterStore::new(tmp.path());
    let renderer = Arc::new(StaticRenderer {
        opened: AtomicUsize::new(0),
    });
    let crawler = CdcCrawler::new(renderer.clone(), "https://example.test/country_table", Duration::from_millis(300));

    store.write(Letter::new('b').unwrap(), "<table>cached</table>").unwrap();
    store.write(Letter::new('d').unwrap(), "").unwrap();

    let report = Pipeline::fetch_tables(&crawler, &store, &letters("bcd"), false).await;
    assert_eq!(report.cached, letters("b"));
    assert_eq!(report.fetched, letters("c"));
    assert_eq!(report.empty, letters("d"));
    assert!(report.errors.is_empty());
    assert_eq!(renderer.opened.load(Ordering::SeqCst), 2);
    assert_eq!(store.read(Letter::new('b').unwrap()).unwrap(), "<table>cached</table>");

    let forced = Pipeline::fetch_tables(&crawler, &store, &letters("b"), true).await;
    assert_eq!(forced.fetched, letters("b"));
    assert!(store.read(Letter::new('b').unwrap()).unwrap().contains("b-land"));

    let result = Pipeline::run(&store, &letters("bcd"), None).unwrap();
    assert_eq!(result.total_rows, 2);
    assert_eq!(result.dataset.get("c-land").unwrap().estimated_risk.as_str(), "low");
}
