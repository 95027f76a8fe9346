use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::{
    constants::{SOURCE_COLUMNS, TABLE_TAG},
    error::{Result, ScraperError},
    storage::LetterStore,
    types::{Letter, ParsedRiskRow, RawRiskRow},
};

/// Browsers clamp `colspan` to the same bound.
const MAX_SPAN: usize = 1000;

/// Parses stored per-letter markup into table rows.
pub struct CdcTableParser;

impl Default for CdcTableParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CdcTableParser {
    pub fn new() -> Self {
        Self
    }

    /// Read the letter's file and parse it. A zero-length file is an empty table.
    pub fn parse_letter(&self, store: &LetterStore, letter: Letter) -> Result<Vec<ParsedRiskRow>> {
        let html = store.read(letter)?;
        if html.is_empty() {
            debug!("{} is empty, no rows for '{}'", store.path_for(letter).display(), letter);
            return Ok(Vec::new());
        }
        let rows = self.parse_table(&html)?;
        info!("Parsed {} rows for '{}'", rows.len(), letter);
        Ok(rows)
    }

    /// Parse the first table and keep country, risk areas and estimated risk.
    pub fn parse_table(&self, html: &str) -> Result<Vec<ParsedRiskRow>> {
        Ok(self
            .parse_raw_rows(html)?
            .into_iter()
            .map(ParsedRiskRow::from)
            .collect())
    }

    /// Parse the first table into seven-column rows. Header rows (all `<th>`)
    /// are dropped in favour of the fixed column layout. `rowspan` and
    /// `colspan` are expanded before short rows are padded; rows wider than
    /// seven columns are rejected.
    pub fn parse_raw_rows(&self, html: &str) -> Result<Vec<RawRiskRow>> {
        if html.trim().is_empty() {
            return Ok(Vec::new());
        }

        let document = Html::parse_document(html);
        let table_sel = Selector::parse(TABLE_TAG).expect("static selector");
        let row_sel = Selector::parse("tr").expect("static selector");

        let Some(table) = document.select(&table_sel).next() else {
            warn!("No <table> in markup ({} bytes), treating as empty", html.len());
            return Ok(Vec::new());
        };

        let mut rows = Vec::new();
        let mut carried: Vec<Option<SpanCarry>> = Vec::new();
        for (i, tr) in table.select(&row_sel).enumerate() {
            let cells: Vec<ElementRef> = tr
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "td" | "th"))
                .collect();

            if cells.is_empty() || cells.iter().all(|c| c.value().name() == "th") {
                continue;
            }

            let mut text = expand_spans(&cells, &mut carried);
            if text.len() > SOURCE_COLUMNS.len() {
                return Err(ScraperError::TableShape {
                    message: format!(
                        "row {} spans {} columns, expected at most {}",
                        i,
                        text.len(),
                        SOURCE_COLUMNS.len()
                    ),
                });
            }

            if text.len() < SOURCE_COLUMNS.len() {
                debug!("row {} has {} cells, padding", i, text.len());
                text.resize(SOURCE_COLUMNS.len(), String::new());
            }
            let mut it = text.into_iter();
            let mut next = || it.next().unwrap_or_default();
            rows.push(RawRiskRow {
                country: next(),
                areas_with_malaria: next(),
                estimated_risk: next(),
                drug_resistance: next(),
                malaria_species: next(),
                rec_prophylaxis: next(),
                info: next(),
            });
        }
        Ok(rows)
    }
}

/// A `rowspan` cell still owed to the rows below it.
struct SpanCarry {
    text: String,
    rows_left: usize,
}

/// Lay one row's cells onto the column grid. Cells carried down by an
/// earlier `rowspan` take their column first; `colspan` repeats the text
/// across every column it covers.
fn expand_spans(cells: &[ElementRef], carried: &mut Vec<Option<SpanCarry>>) -> Vec<String> {
    let mut grid = Vec::new();
    let mut cells = cells.iter();
    loop {
        let col = grid.len();
        if let Some(mut carry) = carried.get_mut(col).and_then(Option::take) {
            grid.push(carry.text.clone());
            carry.rows_left -= 1;
            if carry.rows_left > 0 {
                carried[col] = Some(carry);
            }
            continue;
        }

        let Some(cell) = cells.next() else {
            // A carried cell further right still owns its column.
            if carried.iter().skip(col).any(Option::is_some) {
                grid.push(String::new());
                continue;
            }
            break;
        };

        let text = cell_text(cell);
        let rowspan = span_attr(cell, "rowspan");
        for _ in 0..span_attr(cell, "colspan") {
            if rowspan > 1 {
                let c = grid.len();
                if carried.len() <= c {
                    carried.resize_with(c + 1, || None);
                }
                carried[c] = Some(SpanCarry {
                    text: text.clone(),
                    rows_left: rowspan - 1,
                });
            }
            grid.push(text.clone());
        }
    }
    grid
}

/// `rowspan`/`colspan` value; absent, zero or unparsable counts as 1.
fn span_attr(cell: &ElementRef, name: &str) -> usize {
    cell.value()
        .attr(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .map_or(1, |n| n.min(MAX_SPAN))
}

/// Text of a cell with whitespace runs collapsed; `<br>` and nested tags become one space.
fn cell_text(cell: &ElementRef) -> String {
    cell.text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}
