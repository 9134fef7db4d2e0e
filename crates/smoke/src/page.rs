//! The browser seam scenarios are written against, plus bounded waits

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

use crate::config::Tolerances;
use crate::error::{SmokeError, SmokeResult};

/// Longest page excerpt attached to a timeout
pub const SNIPPET_LEN: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Desktop, tablet and phone
    pub fn standard_set() -> Vec<Viewport> {
        vec![
            Viewport::new(1920, 1080),
            Viewport::new(768, 1024),
            Viewport::new(375, 667),
        ]
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A loaded page that can be inspected.
///
/// Selectors are CSS selectors. Element queries operate on the first match
/// unless stated otherwise.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate and block until the browser reports the load finished.
    async fn goto(&self, url: &str) -> SmokeResult<()>;

    async fn title(&self) -> SmokeResult<String>;

    /// Raw HTML of the current document
    async fn source(&self) -> SmokeResult<String>;

    /// Number of elements matching `selector`
    async fn count(&self, selector: &str) -> SmokeResult<usize>;

    /// Rendered text of every element matching `selector`
    async fn texts(&self, selector: &str) -> SmokeResult<Vec<String>>;

    /// `None` when nothing matches
    async fn is_visible(&self, selector: &str) -> SmokeResult<Option<bool>>;

    /// Computed style value; `None` when nothing matches
    async fn css_value(&self, selector: &str, property: &str) -> SmokeResult<Option<String>>;

    async fn set_viewport(&self, viewport: Viewport) -> SmokeResult<()>;

    /// `document.readyState`
    async fn ready_state(&self) -> SmokeResult<String>;

    async fn screenshot_png(&self) -> SmokeResult<Vec<u8>>;
}

/// Poll `check` until it returns true or `timeout` elapses.
///
/// Errors from `check` abort the wait immediately. On timeout the error
/// carries a snippet of whatever the page currently shows.
pub async fn wait_until<P, F, Fut>(
    page: &P,
    what: &str,
    timeout: Duration,
    poll: Duration,
    mut check: F,
) -> SmokeResult<()>
where
    P: Page + ?Sized,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = SmokeResult<bool>>,
{
    let start = Instant::now();
    let mut attempts = 0usize;

    loop {
        attempts += 1;
        if check().await? {
            debug!("{} ready after {} attempt(s) ({:?})", what, attempts, start.elapsed());
            return Ok(());
        }
        if start.elapsed() >= timeout {
            break;
        }
        sleep(poll).await;
    }

    let snippet = match page.source().await {
        Ok(html) => page_snippet(&html),
        Err(e) => format!("<page source unavailable: {}>", e),
    };
    Err(SmokeError::Timeout {
        what: what.to_string(),
        seconds: timeout.as_secs_f64(),
        snippet,
    })
}

/// Wait for at least one element matching `selector`.
pub async fn wait_for_element<P>(page: &P, selector: &str, tolerances: &Tolerances) -> SmokeResult<()>
where
    P: Page + ?Sized,
{
    wait_until(
        page,
        &format!("element '{}'", selector),
        tolerances.wait_timeout(),
        tolerances.poll_interval(),
        || async move { Ok::<_, SmokeError>(page.count(selector).await? > 0) },
    )
    .await
}

/// Wait for `document.readyState == "complete"`.
pub async fn wait_for_document_ready<P>(page: &P, tolerances: &Tolerances) -> SmokeResult<()>
where
    P: Page + ?Sized,
{
    wait_until(
        page,
        "document ready",
        tolerances.wait_timeout(),
        tolerances.poll_interval(),
        || async move { Ok::<_, SmokeError>(page.ready_state().await? == "complete") },
    )
    .await
}

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<(script|style)[^>]*>.*?</(script|style)>|<[^>]*>").unwrap());
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Visible text of an HTML document, whitespace collapsed and truncated.
pub fn page_snippet(html: &str) -> String {
    let text = TAG_RE.replace_all(html, " ");
    let text = SPACE_RE.replace_all(&text, " ");
    let text = text.trim();

    if text.chars().count() <= SNIPPET_LEN {
        return text.to_string();
    }
    let mut out: String = text.chars().take(SNIPPET_LEN).collect();
    out.push_str("...");
    out
}
