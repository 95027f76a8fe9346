use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::{
    app::ports::{ElementLookup, PageRenderer, PageSession},
    config::Config,
    constants::TABLE_TAG,
    error::Result,
    storage::LetterStore,
    types::Letter,
};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Fetches the per-letter country tables through a page renderer.
pub struct CdcCrawler {
    renderer: Arc<dyn PageRenderer>,
    base_url: String,
    timeout: Duration,
}

impl CdcCrawler {
    pub fn new(renderer: Arc<dyn PageRenderer>, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            renderer,
            base_url: base_url.into(),
            timeout,
        }
    }

    pub fn from_config(renderer: Arc<dyn PageRenderer>, config: &Config) -> Self {
        Self::new(renderer, config.site.base_url.clone(), config.timeout())
    }

    pub fn url_for(&self, letter: Letter) -> String {
        format!("{}/{}.html", self.base_url.trim_end_matches('/'), letter)
    }

    /// Outer HTML of the letter's table, or "" when the table did not show up
    /// within the timeout or the page has none. Navigation errors propagate.
    /// The session is closed on every path.
    #[instrument(skip(self), fields(letter = %letter))]
    pub async fn fetch_table_html(&self, letter: Letter) -> Result<String> {
        let url = self.url_for(letter);
        let mut session = self.renderer.open().await?;

        let outcome = self.load_table(session.as_mut(), &url).await;
        session.close().await;

        match outcome {
            Ok(TableOutcome::Found(html)) => {
                info!("Fetched table for '{}' ({} bytes)", letter, html.len());
                Ok(html)
            }
            Ok(TableOutcome::TimedOut) => {
                warn!("Timed out after {:?} waiting for table at {}, returning empty string", self.timeout, url);
                Ok(String::new())
            }
            Ok(TableOutcome::Missing) => {
                warn!("No table element at {}, returning empty string", url);
                Ok(String::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn load_table(&self, session: &mut dyn PageSession, url: &str) -> Result<TableOutcome> {
        session.goto(url).await?;
        match tokio::time::timeout(self.timeout, wait_for_element(session, TABLE_TAG)).await {
            Ok(result) => result,
            Err(_) => Ok(TableOutcome::TimedOut),
        }
    }

    /// Fetch one letter and write it to the store, overwriting prior content.
    pub async fn fetch_and_store(&self, letter: Letter, store: &LetterStore) -> Result<PathBuf> {
        let html = self.fetch_table_html(letter).await?;
        store.write(letter, &html)
    }
}

enum TableOutcome {
    Found(String),
    Missing,
    TimedOut,
}

async fn wait_for_element(session: &mut dyn PageSession, tag: &str) -> Result<TableOutcome> {
    loop {
        match session.find_element(tag).await? {
            ElementLookup::Found(html) => return Ok(TableOutcome::Found(html)),
            ElementLookup::Missing => return Ok(TableOutcome::Missing),
            ElementLookup::Pending => {
                debug!("'{}' not rendered yet", tag);
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}
