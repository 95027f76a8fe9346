use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::app::ports::{ElementLookup, PageRenderer, PageSession};
use crate::error::{Result, ScraperError};

/// How long Chrome may sit without a command before it is shut down.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(300);

/// Page renderer backed by headless Chrome, for pages whose table is filled
/// in by client-side script. Chrome is launched on the first `open` and one
/// tab is used per session.
pub struct ChromeRenderer {
    chrome_path: Option<PathBuf>,
    browser: OnceCell<Browser>,
}

impl ChromeRenderer {
    /// `chrome_path` of `None` lets headless_chrome find a local Chrome/Chromium.
    pub fn new(chrome_path: Option<PathBuf>) -> Self {
        Self {
            chrome_path,
            browser: OnceCell::new(),
        }
    }

    async fn launch(&self) -> Result<Browser> {
        let path = self.chrome_path.clone();
        let browser = blocking(move || {
            let options = LaunchOptions::default_builder()
                .headless(true)
                .path(path)
                .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
                .build()
                .map_err(|e| anyhow::anyhow!("invalid launch options: {}", e))?;
            Browser::new(options)
        })
        .await?;
        info!("Launched headless Chrome");
        Ok(browser)
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        let browser = self.browser.get_or_try_init(|| self.launch()).await?.clone();
        let tab = blocking(move || browser.new_tab()).await?;
        Ok(Box::new(ChromeSession { tab }))
    }
}

struct ChromeSession {
    tab: Arc<Tab>,
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        let url = url.to_string();
        blocking(move || {
            tab.navigate_to(&url)?;
            tab.wait_until_navigated()?;
            debug!("Navigated to {}", url);
            Ok(())
        })
        .await
    }

    async fn find_element(&mut self, tag: &str) -> Result<ElementLookup> {
        let tab = Arc::clone(&self.tab);
        let script = visible_element_script(tag);
        let value = blocking(move || Ok(tab.evaluate(&script, false)?.value)).await?;
        Ok(lookup_from_value(value))
    }

    async fn close(self: Box<Self>) {
        let tab = self.tab;
        if let Err(e) = blocking(move || tab.close(true)).await {
            warn!("Failed to close browser tab: {}", e);
        }
    }
}

/// Script yielding the outer HTML of the first `tag` once it is laid out, else null.
fn visible_element_script(tag: &str) -> String {
    let selector = serde_json::Value::from(tag).to_string();
    format!(
        "(() => {{ const el = document.querySelector({selector}); \
         if (!el || el.getClientRects().length === 0) return null; \
         return el.outerHTML; }})()"
    )
}

/// A rendering page never reports `Missing`; the crawler's timeout ends the wait.
fn lookup_from_value(value: Option<serde_json::Value>) -> ElementLookup {
    match value {
        Some(serde_json::Value::String(html)) if !html.is_empty() => ElementLookup::Found(html),
        _ => ElementLookup::Pending,
    }
}

/// headless_chrome is synchronous; keep its calls off the async workers.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ScraperError::Browser(format!("browser task failed: {}", e)))?
        .map_err(|e| ScraperError::Browser(format!("{:#}", e)))
}
