//! Headless Chrome session over WebDriver

use async_trait::async_trait;
use thirtyfour::prelude::*;
use thirtyfour::ChromiumLikeCapabilities;
use tracing::{debug, info, warn};

use crate::config::SuiteConfig;
use crate::driver::DriverProcess;
use crate::error::SmokeResult;
use crate::page::{Page, Viewport};

/// A page that holds browser resources until it is closed
#[async_trait]
pub trait Session: Page + Sized {
    async fn close(self);
}

/// Opens the session a run shares between its scenarios
#[async_trait]
pub trait Provisioner: Send + Sync {
    type Session: Session;

    async fn open(&self, config: &SuiteConfig) -> SmokeResult<Self::Session>;
}

/// Provisions headless Chrome through [`provision`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeProvisioner;

#[async_trait]
impl Provisioner for ChromeProvisioner {
    type Session = BrowserSession;

    async fn open(&self, config: &SuiteConfig) -> SmokeResult<BrowserSession> {
        provision(config).await
    }
}

/// One browser session shared by every scenario of a run.
///
/// Call [`Session::close`] when done; dropping without closing only
/// stops a spawned driver process.
pub struct BrowserSession {
    driver: WebDriver,
    process: Option<DriverProcess>,
}

/// Configure and open the run's browser session.
///
/// Attaches to `driver.remote_url` when set, otherwise spawns the driver
/// binary. A missing binary is reported as
/// [`SmokeError::DriverNotFound`](crate::error::SmokeError::DriverNotFound).
pub async fn provision(config: &SuiteConfig) -> SmokeResult<BrowserSession> {
    let (server_url, process) = match &config.driver.remote_url {
        Some(url) => (url.clone(), None),
        None => {
            let process = DriverProcess::spawn(&config.driver).await?;
            (process.url().to_string(), Some(process))
        }
    };

    let mut caps = DesiredCapabilities::chrome();
    for arg in config.browser.chrome_args() {
        caps.add_arg(&arg)?;
    }

    info!("Opening browser session via {}", server_url);
    let driver = WebDriver::new(&server_url, caps).await?;
    let session = BrowserSession { driver, process };

    let page_load = config.tolerances.page_load_timeout();
    if let Err(e) = session.driver.set_page_load_timeout(page_load).await {
        session.close().await;
        return Err(e.into());
    }
    debug!("Page load timeout set to {:?}", page_load);

    Ok(session)
}

#[async_trait]
impl Session for BrowserSession {
    /// Quit the browser, then stop the driver process.
    async fn close(self) {
        let BrowserSession { driver, process } = self;
        if let Err(e) = driver.quit().await {
            warn!("Failed to quit browser session: {}", e);
        }
        if let Some(mut process) = process {
            if let Err(e) = process.stop() {
                warn!("Failed to stop driver: {}", e);
            }
        }
        info!("Browser session closed");
    }
}

impl BrowserSession {
    async fn first(&self, selector: &str) -> SmokeResult<Option<WebElement>> {
        let mut found = self.driver.find_all(By::Css(selector)).await?;
        if found.is_empty() {
            Ok(None)
        } else {
            Ok(Some(found.swap_remove(0)))
        }
    }
}

#[async_trait]
impl Page for BrowserSession {
    async fn goto(&self, url: &str) -> SmokeResult<()> {
        debug!("Navigating to {}", url);
        self.driver.goto(url).await?;
        Ok(())
    }

    async fn title(&self) -> SmokeResult<String> {
        Ok(self.driver.title().await?)
    }

    async fn source(&self) -> SmokeResult<String> {
        Ok(self.driver.source().await?)
    }

    async fn count(&self, selector: &str) -> SmokeResult<usize> {
        Ok(self.driver.find_all(By::Css(selector)).await?.len())
    }

    async fn texts(&self, selector: &str) -> SmokeResult<Vec<String>> {
        let elements = self.driver.find_all(By::Css(selector)).await?;
        let mut texts = Vec::with_capacity(elements.len());
        for element in elements {
            texts.push(element.text().await?);
        }
        Ok(texts)
    }

    async fn is_visible(&self, selector: &str) -> SmokeResult<Option<bool>> {
        match self.first(selector).await? {
            Some(element) => Ok(Some(element.is_displayed().await?)),
            None => Ok(None),
        }
    }

    async fn css_value(&self, selector: &str, property: &str) -> SmokeResult<Option<String>> {
        match self.first(selector).await? {
            Some(element) => Ok(Some(element.css_value(property).await?)),
            None => Ok(None),
        }
    }

    async fn set_viewport(&self, viewport: Viewport) -> SmokeResult<()> {
        self.driver
            .set_window_rect(0, 0, viewport.width, viewport.height)
            .await?;
        Ok(())
    }

    async fn ready_state(&self) -> SmokeResult<String> {
        let ret = self
            .driver
            .execute("return document.readyState;", Vec::new())
            .await?;
        Ok(ret.json().as_str().unwrap_or_default().to_string())
    }

    async fn screenshot_png(&self) -> SmokeResult<Vec<u8>> {
        Ok(self.driver.screenshot_as_png().await?)
    }
}
