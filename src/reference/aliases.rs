use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use super::CountryReference;
use crate::error::{Result, ScraperError};

const BUILTIN_ALIASES: &str = include_str!("../../data/aliases.toml");

/// What an alias resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasTarget<'a> {
    Code(&'a str),
    /// A country name as spelled in the reference.
    Name(&'a str),
}

/// Alternate country spellings, loaded from TOML:
///
/// ```toml
/// [codes]
/// "Burma" = "MMR"
///
/// [names]
/// "Czech Republic" = "Czechia"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AliasTable {
    codes: BTreeMap<String, String>,
    names: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn from_toml(content: &str) -> Result<Self> {
        let table: AliasTable = toml::from_str(content)?;
        table.validate()?;
        Ok(table)
    }

    /// The alias table shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_ALIASES)
    }

    /// Load `path`, or the built-in table when the file does not exist.
    pub fn load_or_builtin(path: &Path) -> Result<Self> {
        if path.exists() {
            let table = Self::from_toml(&fs::read_to_string(path)?)?;
            info!("Loaded {} aliases from {}", table.len(), path.display());
            Ok(table)
        } else {
            info!("No alias file at {}, using built-in aliases", path.display());
            Self::builtin()
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, code) in &self.codes {
            if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
                return Err(ScraperError::Config(format!(
                    "alias '{}' maps to '{}', expected a three-letter upper-case code",
                    name, code
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.codes.len() + self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert_code(&mut self, name: impl Into<String>, code: impl Into<String>) {
        self.codes.insert(name.into(), code.into());
    }

    pub fn insert_name(&mut self, name: impl Into<String>, reference_name: impl Into<String>) {
        self.names.insert(name.into(), reference_name.into());
    }

    pub fn lookup(&self, key: &str) -> Option<AliasTarget<'_>> {
        if let Some(code) = self.codes.get(key) {
            return Some(AliasTarget::Code(code));
        }
        self.names.get(key).map(|n| AliasTarget::Name(n))
    }

    /// Code for a row, trying the page's raw country cell before the trimmed name.
    /// The raw cell is what tells apart territories that trim to the same name.
    pub fn resolve(
        &self,
        raw_country: &str,
        country: &str,
        reference: &CountryReference,
    ) -> Option<String> {
        let keys = [raw_country.trim(), country];
        for key in keys {
            match self.lookup(key) {
                Some(AliasTarget::Code(code)) => return Some(code.to_string()),
                Some(AliasTarget::Name(name)) => match reference.code_for(name) {
                    Some(code) => return Some(code.to_string()),
                    None => warn!("Alias '{}' points at '{}', which has no reference code", key, name),
                },
                None => {}
            }
        }
        None
    }

    /// Name aliases whose target is not in the reference.
    pub fn dangling_names(&self, reference: &CountryReference) -> Vec<&str> {
        self.names
            .iter()
            .filter(|(_, target)| reference.get(target).is_none())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
