//! Canonical country name to ISO-3 reference, and the alias table used to
//! bridge names that differ between the risk tables and the reference.

pub mod aliases;
pub mod geo;

pub use aliases::{AliasTable, AliasTarget};
pub use geo::{load_world_map, MapFeature, WorldMap};

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::constants::NATURAL_EARTH_MISSING_CODE;
use crate::error::Result;
use crate::types::ReferenceEntry;

/// Country name lookup over reference entries. Names match exactly.
#[derive(Debug, Clone, Default)]
pub struct CountryReference {
    entries: Vec<ReferenceEntry>,
    by_name: HashMap<String, usize>,
}

impl CountryReference {
    pub fn new(entries: Vec<ReferenceEntry>) -> Self {
        let mut by_name = HashMap::with_capacity(entries.len());
        let entries: Vec<ReferenceEntry> = entries.into_iter().map(clean_entry).collect();
        for (i, entry) in entries.iter().enumerate() {
            if by_name.contains_key(&entry.country) {
                warn!("Duplicate reference country '{}', keeping the first", entry.country);
                continue;
            }
            by_name.insert(entry.country.clone(), i);
        }
        Self { entries, by_name }
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, country: &str) -> Option<&ReferenceEntry> {
        self.by_name.get(country).map(|&i| &self.entries[i])
    }

    /// Code for an exact country name. `None` when the name is unknown or its code is missing.
    pub fn code_for(&self, country: &str) -> Option<&str> {
        self.get(country).and_then(|e| e.iso_a3.as_deref())
    }
}

fn clean_entry(entry: ReferenceEntry) -> ReferenceEntry {
    let iso_a3 = entry
        .iso_a3
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty() && c != NATURAL_EARTH_MISSING_CODE);
    ReferenceEntry {
        country: entry.country.trim().to_string(),
        iso_a3,
    }
}

/// Read the `country,iso_a3` cache file.
pub fn load_reference(path: &Path) -> Result<CountryReference> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut entries = Vec::new();
    for record in reader.deserialize() {
        let entry: ReferenceEntry = record?;
        entries.push(entry);
    }
    info!("Loaded {} reference countries from {}", entries.len(), path.display());
    Ok(CountryReference::new(entries))
}

/// Write the `country,iso_a3` cache file, replacing any previous one.
pub fn write_reference_csv(entries: &[ReferenceEntry], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)?;
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    debug!("Wrote {} reference rows to {}", entries.len(), path.display());
    Ok(())
}
