#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use webapp_smoke::config::SuiteConfig;
use webapp_smoke::page::{Page, Viewport};
use webapp_smoke::session::{Provisioner, Session};
use webapp_smoke::{SmokeError, SmokeResult};

pub const CONNECTED_SOURCE: &str = include_str!("../fixtures/index.html");
pub const DB_DOWN_SOURCE: &str = include_str!("../fixtures/index_db_error.html");

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub text: String,
    pub visible: bool,
    pub css: HashMap<String, String>,
    /// Rendered hidden when the window is narrower than this
    pub hidden_below: Option<u32>,
}

impl FakeElement {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            visible: true,
            css: HashMap::new(),
            hidden_below: None,
        }
    }

    pub fn css(mut self, property: &str, value: &str) -> Self {
        self.css.insert(property.to_string(), value.to_string());
        self
    }
}

/// In-memory page keyed by exact selector strings
pub struct FakePage {
    pub title: String,
    pub source: String,
    pub ready_state: String,
    pub elements: HashMap<String, Vec<FakeElement>>,
    pub visits: Mutex<Vec<String>>,
    pub viewports: Mutex<Vec<Viewport>>,
    /// Reading the title panics with this message
    pub panic_on_title: Option<String>,
    /// Bumped by `Session::close`
    pub closes: Arc<AtomicUsize>,
    current: Mutex<Viewport>,
}

impl FakePage {
    pub fn blank() -> Self {
        Self {
            title: String::new(),
            source: String::new(),
            ready_state: "complete".to_string(),
            elements: HashMap::new(),
            visits: Mutex::new(Vec::new()),
            viewports: Mutex::new(Vec::new()),
            panic_on_title: None,
            closes: Arc::new(AtomicUsize::new(0)),
            current: Mutex::new(Viewport::new(1920, 1080)),
        }
    }

    /// The page as rendered with a reachable, seeded database
    pub fn connected() -> Self {
        let success = FakeElement::new("\u{2705} Database connection successful!")
            .css("padding", "10px")
            .css("background-color", "rgba(212, 237, 218, 1)");

        Self::blank()
            .with_title("Simple PHP MySQL App")
            .with_source(CONNECTED_SOURCE)
            .with("body", vec![FakeElement::new("").css("font-family", "Arial, sans-serif")])
            .with(".container", vec![FakeElement::new("").css("max-width", "800px")])
            .with("h1", vec![FakeElement::new("\u{1F680} Simple PHP Application")])
            .with(".status", vec![success.clone()])
            .with(".status.success", vec![success])
            .with(
                "table",
                vec![FakeElement::new(
                    "ID Name Value Created At\n1 Sample Item 1 This is a test value 1 2024-01-01 00:00:00",
                )],
            )
            .with(
                "tbody tr",
                (1..=3)
                    .map(|i| FakeElement::new(&format!("{} Sample Item {}", i, i)))
                    .collect(),
            )
            .with(
                "th",
                ["ID", "Name", "Value", "Created At"]
                    .iter()
                    .map(|h| FakeElement::new(h))
                    .collect(),
            )
    }

    /// The page as rendered when the database refuses connections
    pub fn db_down() -> Self {
        let error = FakeElement::new("\u{274C} Database Error: Connection failed: Connection refused")
            .css("padding", "10px")
            .css("background-color", "rgba(248, 215, 218, 1)");

        Self::blank()
            .with_title("Simple PHP MySQL App")
            .with_source(DB_DOWN_SOURCE)
            .with("body", vec![FakeElement::new("").css("font-family", "Arial, sans-serif")])
            .with(".container", vec![FakeElement::new("").css("max-width", "800px")])
            .with("h1", vec![FakeElement::new("\u{1F680} Simple PHP Application")])
            .with(".status", vec![error.clone()])
            .with(".status.error", vec![error])
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn with(mut self, selector: &str, elements: Vec<FakeElement>) -> Self {
        self.elements.insert(selector.to_string(), elements);
        self
    }

    pub fn without(mut self, selector: &str) -> Self {
        self.elements.remove(selector);
        self
    }

    pub fn hide_below(mut self, selector: &str, width: u32) -> Self {
        if let Some(elements) = self.elements.get_mut(selector) {
            for element in elements {
                element.hidden_below = Some(width);
            }
        }
        self
    }

    pub fn panicking(mut self, message: &str) -> Self {
        self.panic_on_title = Some(message.to_string());
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub fn viewports(&self) -> Vec<Viewport> {
        self.viewports.lock().unwrap().clone()
    }

    fn first(&self, selector: &str) -> Option<&FakeElement> {
        self.elements.get(selector).and_then(|e| e.first())
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str) -> SmokeResult<()> {
        self.visits.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn title(&self) -> SmokeResult<String> {
        if let Some(message) = &self.panic_on_title {
            panic!("{}", message);
        }
        Ok(self.title.clone())
    }

    async fn source(&self) -> SmokeResult<String> {
        Ok(self.source.clone())
    }

    async fn count(&self, selector: &str) -> SmokeResult<usize> {
        Ok(self.elements.get(selector).map(Vec::len).unwrap_or(0))
    }

    async fn texts(&self, selector: &str) -> SmokeResult<Vec<String>> {
        Ok(self
            .elements
            .get(selector)
            .map(|els| els.iter().map(|e| e.text.clone()).collect())
            .unwrap_or_default())
    }

    async fn is_visible(&self, selector: &str) -> SmokeResult<Option<bool>> {
        let width = self.current.lock().unwrap().width;
        Ok(self.first(selector).map(|e| {
            e.visible && e.hidden_below.map(|min| width >= min).unwrap_or(true)
        }))
    }

    async fn css_value(&self, selector: &str, property: &str) -> SmokeResult<Option<String>> {
        Ok(self
            .first(selector)
            .map(|e| e.css.get(property).cloned().unwrap_or_default()))
    }

    async fn set_viewport(&self, viewport: Viewport) -> SmokeResult<()> {
        *self.current.lock().unwrap() = viewport;
        self.viewports.lock().unwrap().push(viewport);
        Ok(())
    }

    async fn ready_state(&self) -> SmokeResult<String> {
        Ok(self.ready_state.clone())
    }

    async fn screenshot_png(&self) -> SmokeResult<Vec<u8>> {
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }
}

#[async_trait]
impl Session for FakePage {
    async fn close(self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out one prepared page and counts how often it was opened and closed
pub struct FakeProvisioner {
    page: Mutex<Option<FakePage>>,
    pub opens: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
}

impl FakeProvisioner {
    pub fn new(page: FakePage) -> Self {
        let closes = page.closes.clone();
        Self {
            page: Mutex::new(Some(page)),
            opens: AtomicUsize::new(0),
            closes,
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    type Session = FakePage;

    async fn open(&self, _config: &SuiteConfig) -> SmokeResult<FakePage> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.page
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| SmokeError::DriverStartup("page already handed out".to_string()))
    }
}

/// Defaults with waits short enough for unit tests
pub fn fast_config() -> SuiteConfig {
    let mut config = SuiteConfig::default();
    config.app_url = "http://app.test:8080".to_string();
    config.tolerances.wait_timeout_ms = 200;
    config.tolerances.poll_interval_ms = 10;
    config.tolerances.settle_delay_ms = 0;
    config.tolerances.viewport_settle_ms = 0;
    config.tolerances.load_ceiling_ms = 2_000;
    config.screenshots_on_failure = false;
    config
}
