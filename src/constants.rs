//! Site, file layout and table shape constants shared across the crate.

/// Base URL of the per-letter country tables.
pub const DEFAULT_BASE_URL: &str = "https://www.cdc.gov/malaria/travelers/country_table";

/// Seconds to wait for the table element before giving up on a letter.
pub const DEFAULT_TIMEOUT_SECS: u64 = 6;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const REFERENCE_FILE_NAME: &str = "iso_a3.csv";
pub const ALIASES_FILE_NAME: &str = "aliases.toml";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Letters the site publishes one table page for.
pub const LETTERS: &str = "abcdefghijklmnopqrstuvwxyz";

/// Tag the fetcher waits for and the parser reads.
pub const TABLE_TAG: &str = "table";

// Source table columns, in page order.
pub const COL_COUNTRY: &str = "country";
pub const COL_AREAS_WITH_MALARIA: &str = "areas_with_malaria";
pub const COL_ESTIMATED_RISK: &str = "estimated_risk";
pub const COL_DRUG_RESISTANCE: &str = "drug_resistance";
pub const COL_MALARIA_SPECIES: &str = "malaria_species";
pub const COL_REC_PROPHYLAXIS: &str = "rec_prophylaxis";
pub const COL_INFO: &str = "info";

pub const SOURCE_COLUMNS: [&str; 7] = [
    COL_COUNTRY,
    COL_AREAS_WITH_MALARIA,
    COL_ESTIMATED_RISK,
    COL_DRUG_RESISTANCE,
    COL_MALARIA_SPECIES,
    COL_REC_PROPHYLAXIS,
    COL_INFO,
];

pub const COL_ISO_A3: &str = "iso_a3";

/// Natural Earth uses this in place of a code for disputed or unassigned entries.
pub const NATURAL_EARTH_MISSING_CODE: &str = "-99";

/// Lowercase letters a-z, in order.
pub fn all_letters() -> Vec<char> {
    LETTERS.chars().collect()
}

// Log output
pub const LOG_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "malaria_scraper.log";
pub const DEFAULT_LOG_DIRECTIVE: &str = "malaria_scraper=info";
