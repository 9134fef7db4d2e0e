//! Suite runner: one session, scenarios in order, teardown no matter what

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::SuiteConfig;
use crate::error::SmokeResult;
use crate::page::Page;
use crate::scenario::{Outcome, Scenario};
use crate::session::{ChromeProvisioner, Provisioner, Session};

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
    pub screenshot_path: Option<PathBuf>,
}

/// Result of running the suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub app_url: String,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn get(&self, scenario: Scenario) -> Option<&ScenarioResult> {
        self.results.iter().find(|r| r.name == scenario.name())
    }
}

pub struct SuiteRunner {
    config: SuiteConfig,
}

impl SuiteRunner {
    pub fn new(config: SuiteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Provision headless Chrome (when any scenario needs one), run, and close it.
    ///
    /// Only setup errors are returned; scenario failures are part of the result.
    pub async fn run(&self, scenarios: &[Scenario]) -> SmokeResult<SuiteResult> {
        self.run_on(&ChromeProvisioner, scenarios).await
    }

    /// Like [`SuiteRunner::run`], opening the session through `provisioner`.
    pub async fn run_on<L>(&self, provisioner: &L, scenarios: &[Scenario]) -> SmokeResult<SuiteResult>
    where
        L: Provisioner,
    {
        let browser = if scenarios.iter().any(Scenario::needs_browser) {
            Some(provisioner.open(&self.config).await?)
        } else {
            None
        };

        let result = self.run_with(browser.as_ref(), scenarios).await;

        if let Some(browser) = browser {
            browser.close().await;
        }
        Ok(result)
    }

    /// Run scenarios against an already provisioned page.
    pub async fn run_with<P>(&self, page: Option<&P>, scenarios: &[Scenario]) -> SuiteResult
    where
        P: Page + ?Sized,
    {
        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::with_capacity(scenarios.len());

        info!("Running {} scenario(s) against {}", scenarios.len(), self.config.app_url);

        for scenario in scenarios {
            let result = self.run_one(page, *scenario).await;
            match &result.outcome {
                Outcome::Passed => info!("✓ {} ({} ms)", result.name, result.duration_ms),
                Outcome::Skipped(reason) => info!("- {} skipped: {}", result.name, reason),
                Outcome::Failed(reason) => error!("✗ {} - {}", result.name, reason),
            }
            results.push(result);
        }

        let passed = results.iter().filter(|r| r.outcome == Outcome::Passed).count();
        let failed = results.iter().filter(|r| r.outcome.is_failed()).count();
        let skipped = results.len() - passed - failed;
        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        SuiteResult {
            app_url: self.config.app_url.clone(),
            started_at,
            total: results.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        }
    }

    async fn run_one<P>(&self, page: Option<&P>, scenario: Scenario) -> ScenarioResult
    where
        P: Page + ?Sized,
    {
        let start = Instant::now();

        // A panicking scenario must not take the session teardown down with it
        let outcome = match AssertUnwindSafe(scenario.execute(page, &self.config))
            .catch_unwind()
            .await
        {
            Ok(result) => Outcome::from_result(result),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<String>()
                    .cloned()
                    .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
                    .unwrap_or_else(|| "scenario panicked".to_string());
                Outcome::Failed(format!("panic: {}", message))
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;

        let screenshot_path = match (&outcome, page) {
            (Outcome::Failed(_), Some(page))
                if scenario.needs_browser() && self.config.screenshots_on_failure =>
            {
                self.save_screenshot(page, scenario).await
            }
            _ => None,
        };

        ScenarioResult {
            name: scenario.name().to_string(),
            outcome,
            duration_ms,
            screenshot_path,
        }
    }

    async fn save_screenshot<P>(&self, page: &P, scenario: Scenario) -> Option<PathBuf>
    where
        P: Page + ?Sized,
    {
        let dir = self.config.screenshot_dir();
        let path = dir.join(format!("{}.png", scenario.name()));

        let saved = async {
            let png = page.screenshot_png().await?;
            std::fs::create_dir_all(&dir)?;
            std::fs::write(&path, png)?;
            Ok::<_, crate::error::SmokeError>(())
        }
        .await;

        match saved {
            Ok(()) => {
                debug!("Saved failure screenshot to {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Could not save screenshot for {}: {}", scenario, e);
                None
            }
        }
    }

    /// Write results to `<output_dir>/test-results.json`
    pub fn write_results(&self, results: &SuiteResult) -> SmokeResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// Run every scenario with the given configuration, closing the session on exit.
pub async fn run_all(config: SuiteConfig) -> SmokeResult<SuiteResult> {
    SuiteRunner::new(config).run(&Scenario::ALL).await
}
