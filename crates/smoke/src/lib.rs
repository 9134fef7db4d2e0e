//! Smoke tests for the PHP/MySQL status page
//!
//! This crate drives a headless Chrome over WebDriver and a plain HTTP client
//! against a single page that reports its database connection, renders a
//! table of seeded rows and lists environment details.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SuiteRunner                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Provisioner::open(config) -> Session (BrowserSession)      │
//! │    ├── DriverProcess::spawn()  (chromedriver subprocess)    │
//! │    └── WebDriver session (headless, 1920x1080)              │
//! │  for scenario in Scenario::ALL                              │
//! │    └── scenario.execute(page, config) -> Outcome            │
//! │          Passed | Failed(reason) | Skipped(reason)          │
//! │  Session::close()  (always, after the last scenario)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Page trait: goto, title, source, count, texts,             │
//! │              is_visible, css_value, set_viewport, ...       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod http;
pub mod page;
pub mod runner;
pub mod scenario;
pub mod session;

pub use config::{Profile, SuiteConfig};
pub use error::{SmokeError, SmokeResult};
pub use page::{Page, Viewport};
pub use runner::{ScenarioResult, SuiteResult, SuiteRunner};
pub use scenario::{Outcome, Scenario};
pub use session::{ChromeProvisioner, Provisioner, Session};
