//! The scenario catalog
//!
//! Every scenario navigates afresh, waits for its readiness condition, then
//! inspects the page. Scenarios never share state beyond the session itself.
//!
//! Scenarios whose subject only exists when the database is up check that
//! precondition explicitly: an error status and no success status means the
//! page legitimately has no table, and the scenario is skipped. A page with
//! neither indicator fails like any other mismatch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tokio::time::sleep;
use tracing::debug;

use crate::config::SuiteConfig;
use crate::error::{SmokeError, SmokeResult};
use crate::http::{self, ApiStatus};
use crate::page::{wait_for_document_ready, wait_for_element, wait_until, Page};

pub const BODY: &str = "body";
pub const HEADING: &str = "h1";
pub const CONTAINER: &str = ".container";
pub const STATUS: &str = ".status";
pub const SUCCESS_STATUS: &str = ".status.success";
pub const ERROR_STATUS: &str = ".status.error";
pub const TABLE: &str = "table";
pub const HEADER_CELL: &str = "th";
pub const BODY_ROW: &str = "tbody tr";

/// Result of one scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed(String),
    Skipped(String),
}

impl Outcome {
    pub fn from_result(result: SmokeResult<Outcome>) -> Self {
        result.unwrap_or_else(|e| Outcome::Failed(e.to_string()))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    HealthCheck,
    ApiHealth,
    ApiDbTest,
    ApiDbStatus,
    PageLoad,
    DbConnection,
    TableDisplay,
    CssApplied,
    SampleData,
    RecordCount,
    EnvironmentInfo,
    LoadPerformance,
    ResponsiveLayout,
    StatusStyling,
}

impl Scenario {
    /// Declaration order, which is also run order
    pub const ALL: [Scenario; 14] = [
        Scenario::HealthCheck,
        Scenario::ApiHealth,
        Scenario::ApiDbTest,
        Scenario::ApiDbStatus,
        Scenario::PageLoad,
        Scenario::DbConnection,
        Scenario::TableDisplay,
        Scenario::CssApplied,
        Scenario::SampleData,
        Scenario::RecordCount,
        Scenario::EnvironmentInfo,
        Scenario::LoadPerformance,
        Scenario::ResponsiveLayout,
        Scenario::StatusStyling,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::HealthCheck => "health-check",
            Scenario::ApiHealth => "api-health",
            Scenario::ApiDbTest => "api-db-test",
            Scenario::ApiDbStatus => "api-db-status",
            Scenario::PageLoad => "page-load",
            Scenario::DbConnection => "db-connection",
            Scenario::TableDisplay => "table-display",
            Scenario::CssApplied => "css-applied",
            Scenario::SampleData => "sample-data",
            Scenario::RecordCount => "record-count",
            Scenario::EnvironmentInfo => "environment-info",
            Scenario::LoadPerformance => "load-performance",
            Scenario::ResponsiveLayout => "responsive-layout",
            Scenario::StatusStyling => "status-styling",
        }
    }

    pub fn needs_browser(&self) -> bool {
        !matches!(
            self,
            Scenario::HealthCheck
                | Scenario::ApiHealth
                | Scenario::ApiDbTest
                | Scenario::ApiDbStatus
        )
    }

    /// Run the scenario. Browser scenarios fail when `page` is `None`.
    pub async fn execute<P>(&self, page: Option<&P>, config: &SuiteConfig) -> SmokeResult<Outcome>
    where
        P: Page + ?Sized,
    {
        debug!("Running scenario: {}", self.name());

        let page = match (self.needs_browser(), page) {
            (false, _) => return self.execute_http(config).await,
            (true, Some(page)) => page,
            (true, None) => {
                return Err(SmokeError::Config(format!(
                    "{} needs a browser session",
                    self.name()
                )))
            }
        };

        match self {
            Scenario::PageLoad => page_load(page, config).await,
            Scenario::DbConnection => db_connection(page, config).await,
            Scenario::TableDisplay => table_display(page, config).await,
            Scenario::CssApplied => css_applied(page, config).await,
            Scenario::SampleData => sample_data(page, config).await,
            Scenario::RecordCount => record_count(page, config).await,
            Scenario::EnvironmentInfo => environment_info(page, config).await,
            Scenario::LoadPerformance => load_performance(page, config).await,
            Scenario::ResponsiveLayout => responsive_layout(page, config).await,
            Scenario::StatusStyling => status_styling(page, config).await,
            Scenario::HealthCheck
            | Scenario::ApiHealth
            | Scenario::ApiDbTest
            | Scenario::ApiDbStatus => self.execute_http(config).await,
        }
    }

    async fn execute_http(&self, config: &SuiteConfig) -> SmokeResult<Outcome> {
        let timeout = config.tolerances.http_timeout();
        match self {
            Scenario::HealthCheck => {
                http::health_check(&config.app_url, timeout).await?;
                Ok(Outcome::Passed)
            }
            Scenario::ApiHealth => {
                http::api_health(&config.app_url, timeout).await?;
                Ok(Outcome::Passed)
            }
            Scenario::ApiDbTest => match http::api_db_test(&config.app_url, timeout).await? {
                ApiStatus::Ok(_) => Ok(Outcome::Passed),
                ApiStatus::DatabaseDown(error) => {
                    Ok(Outcome::Skipped(format!("database unavailable: {}", error)))
                }
            },
            Scenario::ApiDbStatus => match http::api_db_status(&config.app_url, timeout).await? {
                ApiStatus::Ok(status) => {
                    if !status.test_table_exists {
                        return Err(SmokeError::assertion("test table present", "missing"));
                    }
                    let records = status.test_table_records.unwrap_or(0);
                    let min_rows = config.expectations.min_rows as u64;
                    if records < min_rows {
                        return Err(SmokeError::assertion(
                            format!("at least {} test record(s)", min_rows),
                            records.to_string(),
                        ));
                    }
                    debug!("MySQL {} with {} test record(s)", status.database_version, records);
                    Ok(Outcome::Passed)
                }
                ApiStatus::DatabaseDown(error) => {
                    Ok(Outcome::Skipped(format!("database unavailable: {}", error)))
                }
            },
            other => Err(SmokeError::Config(format!(
                "{} is not an HTTP scenario",
                other.name()
            ))),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = SmokeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .iter()
            .copied()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| SmokeError::Config(format!("unknown scenario: {}", s)))
    }
}

/// What the status messages say about the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbState {
    Connected,
    Failed(String),
    Unknown,
}

pub async fn db_state<P: Page + ?Sized>(page: &P) -> SmokeResult<DbState> {
    if page.count(SUCCESS_STATUS).await? > 0 {
        return Ok(DbState::Connected);
    }
    let errors = page.texts(ERROR_STATUS).await?;
    if errors.is_empty() {
        Ok(DbState::Unknown)
    } else {
        Ok(DbState::Failed(errors.join("; ")))
    }
}

/// `Some(Skipped)` when the table is missing because the database is down.
async fn skip_without_table<P: Page + ?Sized>(page: &P) -> SmokeResult<Option<Outcome>> {
    if page.count(TABLE).await? > 0 {
        return Ok(None);
    }
    match db_state(page).await? {
        DbState::Failed(error) => Ok(Some(Outcome::Skipped(format!(
            "no table rendered, database unavailable: {}",
            error
        )))),
        DbState::Connected | DbState::Unknown => Ok(None),
    }
}

async fn open<P: Page + ?Sized>(page: &P, config: &SuiteConfig) -> SmokeResult<()> {
    page.goto(&config.app_url).await?;
    wait_for_element(page, BODY, &config.tolerances).await
}

async fn settle(config: &SuiteConfig) {
    let delay = config.tolerances.settle_delay();
    if !delay.is_zero() {
        sleep(delay).await;
    }
}

fn contains_any<'a>(haystack: &str, needles: &'a [String]) -> Option<&'a String> {
    needles.iter().find(|needle| haystack.contains(needle.as_str()))
}

fn contains_any_ignore_case<'a>(haystack: &str, needles: &'a [String]) -> Option<&'a String> {
    let haystack = haystack.to_lowercase();
    needles
        .iter()
        .find(|needle| haystack.contains(&needle.to_lowercase()))
}

fn one_of(needles: &[String]) -> String {
    format!("one of {:?}", needles)
}

/// Compare a computed color such as `rgba(212, 237, 218, 1)` to an RGB triple.
pub fn rgb_matches(value: &str, rgb: [u8; 3]) -> bool {
    let inner = match (value.find('('), value.rfind(')')) {
        (Some(open), Some(close)) if open < close => &value[open + 1..close],
        _ => return false,
    };
    let channels: Vec<u8> = inner
        .split(',')
        .take(3)
        .filter_map(|part| part.trim().parse().ok())
        .collect();
    channels == rgb
}

async fn page_load<P: Page + ?Sized>(page: &P, config: &SuiteConfig) -> SmokeResult<Outcome> {
    open(page, config).await?;

    let expected = &config.expectations.app_name;
    let title = page.title().await?;
    if !title.contains(expected.as_str()) {
        return Err(SmokeError::assertion(
            format!("title containing {:?}", expected),
            title,
        ));
    }

    if page.count(CONTAINER).await? == 0 {
        return Err(SmokeError::assertion(
            format!("a {} element", CONTAINER),
            "none",
        ));
    }

    if let Some(heading) = &config.expectations.heading {
        let headings = page.texts(HEADING).await?;
        if !headings.iter().any(|text| text.contains(heading.as_str())) {
            return Err(SmokeError::assertion(
                format!("{} containing {:?}", HEADING, heading),
                if headings.is_empty() { "none".to_string() } else { headings.join("; ") },
            ));
        }
    }
    Ok(Outcome::Passed)
}

async fn db_connection<P: Page + ?Sized>(page: &P, config: &SuiteConfig) -> SmokeResult<Outcome> {
    open(page, config).await?;

    let successes = page.texts(SUCCESS_STATUS).await?;
    if successes.is_empty() {
        return match db_state(page).await? {
            DbState::Failed(error) => Err(SmokeError::DatabaseError(error)),
            _ => Err(SmokeError::assertion(
                format!("at least one {} element", SUCCESS_STATUS),
                "none",
            )),
        };
    }

    let phrase = config.expectations.success_phrase.to_lowercase();
    let glyph = &config.expectations.success_glyph;
    let connected = successes.iter().any(|text| {
        text.to_lowercase().contains(&phrase) || (!glyph.is_empty() && text.contains(glyph.as_str()))
    });

    if connected {
        Ok(Outcome::Passed)
    } else {
        Err(SmokeError::assertion(
            format!(
                "status text containing {:?} or {:?}",
                config.expectations.success_phrase, glyph
            ),
            successes.join("; "),
        ))
    }
}

async fn table_display<P: Page + ?Sized>(page: &P, config: &SuiteConfig) -> SmokeResult<Outcome> {
    open(page, config).await?;

    if let Some(skipped) = skip_without_table(page).await? {
        return Ok(skipped);
    }

    match page.is_visible(TABLE).await? {
        Some(true) => {}
        Some(false) => return Err(SmokeError::assertion("visible table", "hidden table")),
        None => return Err(SmokeError::assertion("a table element", "none")),
    }

    let headers = page.texts(HEADER_CELL).await?;
    if headers.is_empty() {
        return Err(SmokeError::assertion("at least one header cell", "none"));
    }

    for required in &config.expectations.required_headers {
        if !headers.iter().any(|h| h.trim() == required) {
            return Err(SmokeError::assertion(
                format!("header {:?}", required),
                format!("{:?}", headers),
            ));
        }
    }
    Ok(Outcome::Passed)
}

async fn css_applied<P: Page + ?Sized>(page: &P, config: &SuiteConfig) -> SmokeResult<Outcome> {
    open(page, config).await?;
    let expectations = &config.expectations;

    let font = page
        .css_value(BODY, "font-family")
        .await?
        .unwrap_or_default();
    if contains_any_ignore_case(&font, &expectations.font_keywords).is_none() {
        return Err(SmokeError::assertion(
            format!("body font-family with {}", one_of(&expectations.font_keywords)),
            font,
        ));
    }

    match page.css_value(CONTAINER, "max-width").await? {
        Some(width) if width == expectations.container_max_width => Ok(Outcome::Passed),
        Some(width) => Err(SmokeError::assertion(
            format!("container max-width {}", expectations.container_max_width),
            width,
        )),
        None => Err(SmokeError::assertion(
            format!("a {} element", CONTAINER),
            "none",
        )),
    }
}

async fn sample_data<P: Page + ?Sized>(page: &P, config: &SuiteConfig) -> SmokeResult<Outcome> {
    open(page, config).await?;
    if let Some(skipped) = skip_without_table(page).await? {
        return Ok(skipped);
    }
    wait_for_element(page, BODY_ROW, &config.tolerances).await?;

    let expectations = &config.expectations;
    let rows = page.count(BODY_ROW).await?;
    if rows < expectations.min_rows {
        return Err(SmokeError::assertion(
            format!("at least {} data row(s)", expectations.min_rows),
            rows.to_string(),
        ));
    }

    let table_text = page.texts(TABLE).await?.join("\n");
    if contains_any(&table_text, &expectations.sample_keywords).is_none() {
        return Err(SmokeError::assertion(
            format!("table text with {}", one_of(&expectations.sample_keywords)),
            crate::page::page_snippet(&table_text),
        ));
    }
    Ok(Outcome::Passed)
}

async fn record_count<P: Page + ?Sized>(page: &P, config: &SuiteConfig) -> SmokeResult<Outcome> {
    open(page, config).await?;
    if let Some(skipped) = skip_without_table(page).await? {
        return Ok(skipped);
    }
    wait_for_element(page, TABLE, &config.tolerances).await?;
    settle(config).await;

    let source = page.source().await?;
    let phrases = &config.expectations.record_count_phrases;
    match contains_any(&source, phrases) {
        Some(phrase) => {
            debug!("Record count shown as {:?}", phrase);
            Ok(Outcome::Passed)
        }
        None => Err(SmokeError::assertion(
            format!("page with {}", one_of(phrases)),
            crate::page::page_snippet(&source),
        )),
    }
}

async fn environment_info<P: Page + ?Sized>(page: &P, config: &SuiteConfig) -> SmokeResult<Outcome> {
    open(page, config).await?;
    settle(config).await;

    let source = page.source().await?;
    let keywords = &config.expectations.environment_keywords;
    if contains_any_ignore_case(&source, keywords).is_none() {
        return Err(SmokeError::assertion(
            format!("page with {} (any case)", one_of(keywords)),
            crate::page::page_snippet(&source),
        ));
    }
    Ok(Outcome::Passed)
}

async fn load_performance<P: Page + ?Sized>(page: &P, config: &SuiteConfig) -> SmokeResult<Outcome> {
    let ceiling = config.tolerances.load_ceiling();
    let start = Instant::now();
    page.goto(&config.app_url).await?;

    // Content is ready once the table or a database error has been rendered
    wait_until(
        page,
        "rendered content",
        ceiling,
        config.tolerances.poll_interval(),
        || async move {
            if page.ready_state().await? != "complete" {
                return Ok::<_, SmokeError>(false);
            }
            Ok(page.count(TABLE).await? > 0 || page.count(ERROR_STATUS).await? > 0)
        },
    )
    .await?;

    let elapsed = start.elapsed();
    debug!("Page ready after {:?}", elapsed);
    if elapsed >= ceiling {
        return Err(SmokeError::assertion(
            format!("load under {:.2}s", ceiling.as_secs_f64()),
            format!("{:.2}s", elapsed.as_secs_f64()),
        ));
    }
    Ok(Outcome::Passed)
}

async fn responsive_layout<P: Page + ?Sized>(page: &P, config: &SuiteConfig) -> SmokeResult<Outcome> {
    open(page, config).await?;

    let result = check_viewports(page, config).await;

    let window = &config.browser;
    let restore = page
        .set_viewport(crate::page::Viewport::new(window.window_width, window.window_height))
        .await;

    let outcome = result?;
    restore?;
    Ok(outcome)
}

async fn check_viewports<P: Page + ?Sized>(page: &P, config: &SuiteConfig) -> SmokeResult<Outcome> {
    let skipped = skip_without_table(page).await?;

    let container = if page.count(CONTAINER).await? > 0 {
        CONTAINER
    } else {
        BODY
    };

    for viewport in &config.expectations.viewports {
        page.set_viewport(*viewport).await?;
        let settle = config.tolerances.viewport_settle();
        if !settle.is_zero() {
            sleep(settle).await;
        }
        wait_for_document_ready(page, &config.tolerances).await?;

        let mut selectors = vec![container];
        if skipped.is_none() {
            selectors.push(TABLE);
        }
        for selector in selectors {
            match page.is_visible(selector).await? {
                Some(true) => {}
                Some(false) => {
                    return Err(SmokeError::assertion(
                        format!("{} visible at {}", selector, viewport),
                        "hidden",
                    ))
                }
                None => {
                    return Err(SmokeError::assertion(
                        format!("{} present at {}", selector, viewport),
                        "missing",
                    ))
                }
            }
        }
    }

    Ok(skipped.unwrap_or(Outcome::Passed))
}

async fn status_styling<P: Page + ?Sized>(page: &P, config: &SuiteConfig) -> SmokeResult<Outcome> {
    open(page, config).await?;
    let expectations = &config.expectations;

    if page.count(STATUS).await? == 0 {
        return Ok(Outcome::Skipped("no status messages rendered".to_string()));
    }

    // Computed padding is one to four lengths; one of them must be the expected one
    let padding = page.css_value(STATUS, "padding").await?.unwrap_or_default();
    if !padding
        .split_whitespace()
        .any(|length| length == expectations.status_padding)
    {
        return Err(SmokeError::assertion(
            format!("status padding {}", expectations.status_padding),
            padding,
        ));
    }

    let colored = [
        (SUCCESS_STATUS, expectations.success_rgb),
        (ERROR_STATUS, expectations.error_rgb),
    ];
    for (selector, rgb) in colored {
        if let Some(color) = page.css_value(selector, "background-color").await? {
            if !rgb_matches(&color, rgb) {
                return Err(SmokeError::assertion(
                    format!("{} background rgb({}, {}, {})", selector, rgb[0], rgb[1], rgb[2]),
                    color,
                ));
            }
        }
    }
    Ok(Outcome::Passed)
}
