use async_trait::async_trait;

use crate::error::Result;

/// Result of looking up an element on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementLookup {
    /// Outer HTML of the first matching element.
    Found(String),
    /// Not there yet; the page may still be rendering.
    Pending,
    /// The page has finished rendering and the element is absent.
    Missing,
}

/// Something that can open page sessions, e.g. a browser driver.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageSession>>;
}

/// One page session. Callers must `close` it on every exit path.
#[async_trait]
pub trait PageSession: Send {
    async fn goto(&mut self, url: &str) -> Result<()>;

    async fn find_element(&mut self, tag: &str) -> Result<ElementLookup>;

    async fn close(self: Box<Self>);
}
