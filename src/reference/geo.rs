use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::constants::{COL_COUNTRY, COL_ISO_A3};
use crate::error::Result;
use crate::types::ReferenceEntry;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Value,
}

/// One map feature with lower-cased property names and `name` renamed to `country`.
#[derive(Debug, Clone)]
pub struct MapFeature {
    pub properties: Map<String, Value>,
    pub geometry: Value,
}

impl MapFeature {
    pub fn country(&self) -> Option<&str> {
        self.properties.get(COL_COUNTRY).and_then(Value::as_str)
    }

    /// The feature's ISO-3 code as text. Numeric codes are stringified.
    pub fn iso_a3(&self) -> Option<String> {
        match self.properties.get(COL_ISO_A3)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// World map geometry, e.g. the Natural Earth low-resolution countries.
#[derive(Debug, Clone, Default)]
pub struct WorldMap {
    pub features: Vec<MapFeature>,
}

impl WorldMap {
    pub fn from_geojson(content: &str) -> Result<Self> {
        let collection: FeatureCollection = serde_json::from_str(content)?;
        let features = collection
            .features
            .into_iter()
            .map(|f| MapFeature {
                properties: normalize_properties(f.properties.unwrap_or_default()),
                geometry: f.geometry,
            })
            .collect();
        Ok(Self { features })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Country and code pairs, in map order. Features without a country name are skipped.
    pub fn reference_entries(&self) -> Vec<ReferenceEntry> {
        let mut entries = Vec::with_capacity(self.features.len());
        for feature in &self.features {
            match feature.country() {
                Some(country) => entries.push(ReferenceEntry {
                    country: country.to_string(),
                    iso_a3: feature.iso_a3(),
                }),
                None => warn!("Map feature without a country name, skipping"),
            }
        }
        entries
    }
}

/// Lower-case every property name, then rename `name` to `country`.
fn normalize_properties(properties: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(properties.len());
    for (key, value) in properties {
        let key = key.to_lowercase();
        let key = if key == "name" { COL_COUNTRY.to_string() } else { key };
        out.insert(key, value);
    }
    out
}

pub fn load_world_map(path: &Path) -> Result<WorldMap> {
    let content = fs::read_to_string(path)?;
    let map = WorldMap::from_geojson(&content)?;
    info!("Loaded {} map features from {}", map.len(), path.display());
    Ok(map)
}
