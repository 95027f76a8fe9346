use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    ALIASES_FILE_NAME, CONFIG_FILE_NAME, DEFAULT_BASE_URL, DEFAULT_DATA_DIR, DEFAULT_TIMEOUT_SECS,
    REFERENCE_FILE_NAME,
};
use crate::error::{Result, ScraperError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub fetch: FetchConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub renderer: RendererKind,
    /// Chrome/Chromium binary; looked up on the system when unset.
    pub chrome_path: Option<PathBuf>,
}

/// Which page renderer fetches the letter pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// Headless Chrome; waits for script-rendered tables.
    #[default]
    Browser,
    /// Plain HTTP GET; only for pages that ship the table in their markup.
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    /// Relative paths resolve against `data_dir`.
    pub reference_file: PathBuf,
    pub aliases_file: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            renderer: RendererKind::default(),
            chrome_path: None,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            reference_file: PathBuf::from(REFERENCE_FILE_NAME),
            aliases_file: PathBuf::from(ALIASES_FILE_NAME),
        }
    }
}

impl Config {
    /// Load `config.toml` (or the file named by `MALARIA_CONFIG`), falling back to
    /// defaults when no file exists. `MALARIA_DATA_DIR` overrides the data directory.
    pub fn load() -> Result<Self> {
        let explicit = std::env::var("MALARIA_CONFIG").ok();
        let config_path = explicit.clone().unwrap_or_else(|| CONFIG_FILE_NAME.to_string());

        let mut config = if Path::new(&config_path).exists() {
            Self::from_file(Path::new(&config_path))?
        } else if explicit.is_some() {
            return Err(ScraperError::Config(format!(
                "Config file '{}' named by MALARIA_CONFIG does not exist",
                config_path
            )));
        } else {
            Self::default()
        };

        if let Ok(dir) = std::env::var("MALARIA_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.paths.data_dir = PathBuf::from(dir);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.fetch.timeout_secs == 0 {
            return Err(ScraperError::Config(
                "fetch.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.site.base_url.trim().is_empty() {
            return Err(ScraperError::Config("site.base_url is empty".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_secs)
    }

    pub fn data_dir(&self) -> &Path {
        &self.paths.data_dir
    }

    pub fn reference_path(&self) -> PathBuf {
        self.resolve(&self.paths.reference_file)
    }

    pub fn aliases_path(&self) -> PathBuf {
        self.resolve(&self.paths.aliases_file)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.paths.data_dir.join(path)
        }
    }
}
