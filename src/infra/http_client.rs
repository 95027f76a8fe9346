use crate::app::ports::{ElementLookup, PageRenderer, PageSession};
use crate::error::Result;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

/// Page renderer backed by plain HTTP GETs, for pages served with their table
/// already in the markup. The response body is treated as the fully rendered
/// page, so a missing element is reported as `Missing` straight away.
pub struct ReqwestRenderer {
    client: reqwest::Client,
}

impl Default for ReqwestRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestRenderer {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("malaria_scraper/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

#[async_trait]
impl PageRenderer for ReqwestRenderer {
    async fn open(&self) -> Result<Box<dyn PageSession>> {
        Ok(Box::new(ReqwestSession {
            client: self.client.clone(),
            body: None,
        }))
    }
}

struct ReqwestSession {
    client: reqwest::Client,
    body: Option<String>,
}

#[async_trait]
impl PageSession for ReqwestSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let body = resp.text().await?;
        debug!("GET {} -> {} bytes", url, body.len());
        self.body = Some(body);
        Ok(())
    }

    async fn find_element(&mut self, tag: &str) -> Result<ElementLookup> {
        Ok(match &self.body {
            Some(body) => match first_element_html(body, tag) {
                Some(html) => ElementLookup::Found(html),
                None => ElementLookup::Missing,
            },
            None => ElementLookup::Missing,
        })
    }

    async fn close(self: Box<Self>) {
        debug!("closing http page session");
    }
}

/// Outer HTML of the first element matching `tag`.
pub fn first_element_html(html: &str, tag: &str) -> Option<String> {
    let selector = Selector::parse(tag).ok()?;
    let document = Html::parse_document(html);
    let found = document.select(&selector).next().map(|el| el.html());
    found
}
