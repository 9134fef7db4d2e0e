//! Suite configuration
//!
//! Timeouts and content expectations come in two profiles. `lenient` is the
//! default and tolerates slow containers and partial seed data; `strict` pins
//! the exact headers and row counts of a freshly seeded database.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{SmokeError, SmokeResult};
use crate::page::Viewport;

/// Target URL used when `APP_URL` is not set
pub const DEFAULT_APP_URL: &str = "http://localhost:8080";

/// Where the chromedriver binary is expected to live
pub const DEFAULT_DRIVER_PATH: &str = "/usr/local/bin/chromedriver";

pub const ENV_APP_URL: &str = "APP_URL";
pub const ENV_DRIVER_PATH: &str = "CHROMEDRIVER_PATH";
pub const ENV_WEBDRIVER_URL: &str = "WEBDRIVER_URL";

/// Read the target URL from `APP_URL`, falling back to the local default.
pub fn app_url() -> String {
    std::env::var(ENV_APP_URL).unwrap_or_else(|_| DEFAULT_APP_URL.to_string())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Strict,
    #[default]
    Lenient,
}

/// Complete configuration for one suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Page under test
    pub app_url: String,

    /// Profile the tolerances and expectations were derived from
    pub profile: Profile,

    pub driver: DriverConfig,
    pub browser: BrowserConfig,
    pub tolerances: Tolerances,
    pub expectations: Expectations,

    /// Output directory for results and failure screenshots
    pub output_dir: PathBuf,

    /// Save a screenshot when a browser scenario fails
    pub screenshots_on_failure: bool,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self::for_profile(Profile::default())
    }
}

impl SuiteConfig {
    pub fn for_profile(profile: Profile) -> Self {
        Self {
            app_url: DEFAULT_APP_URL.to_string(),
            profile,
            driver: DriverConfig::default(),
            browser: BrowserConfig::default(),
            tolerances: Tolerances::for_profile(profile),
            expectations: Expectations::for_profile(profile),
            output_dir: PathBuf::from("test-results"),
            screenshots_on_failure: true,
        }
    }

    /// Switch profile, replacing tolerances and expectations.
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self.tolerances = Tolerances::for_profile(profile);
        self.expectations = Expectations::for_profile(profile);
        self
    }

    /// Load configuration from a YAML file, or defaults when it does not exist.
    ///
    /// `profile` (or else the file's `profile` key) picks the base; every other
    /// key in the file overrides it.
    pub fn load(path: &Path, profile: Option<Profile>) -> SmokeResult<Self> {
        if !path.exists() {
            return Ok(Self::for_profile(profile.unwrap_or_default()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_as(&content, profile)
    }

    pub fn from_yaml(yaml: &str) -> SmokeResult<Self> {
        Self::from_yaml_as(yaml, None)
    }

    /// Like [`SuiteConfig::from_yaml`], with `profile` taking precedence over
    /// the file's `profile` key.
    pub fn from_yaml_as(yaml: &str, profile: Option<Profile>) -> SmokeResult<Self> {
        let overlay: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        if overlay.is_null() {
            return Ok(Self::for_profile(profile.unwrap_or_default()));
        }
        if !overlay.is_mapping() {
            return Err(SmokeError::Config("top level must be a mapping".to_string()));
        }

        let profile = match (profile, overlay.get("profile")) {
            (Some(profile), _) => profile,
            (None, Some(value)) => serde_yaml::from_value(value.clone())?,
            (None, None) => Profile::default(),
        };

        let mut merged = serde_yaml::to_value(Self::for_profile(profile))?;
        merge_yaml(&mut merged, overlay);
        let mut config: Self = serde_yaml::from_value(merged)?;
        config.profile = profile;
        config.validate()?;
        Ok(config)
    }

    /// Apply `APP_URL`, `CHROMEDRIVER_PATH` and `WEBDRIVER_URL` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_APP_URL) {
            self.app_url = url;
        }
        if let Some(path) = lookup(ENV_DRIVER_PATH) {
            self.driver.binary_path = PathBuf::from(path);
        }
        if let Some(url) = lookup(ENV_WEBDRIVER_URL) {
            self.driver.remote_url = Some(url);
        }
    }

    pub fn validate(&self) -> SmokeResult<()> {
        if self.tolerances.poll_interval_ms == 0 {
            return Err(SmokeError::Config("poll_interval_ms must be positive".to_string()));
        }
        if self.tolerances.wait_timeout_ms == 0 || self.tolerances.http_timeout_ms == 0 {
            return Err(SmokeError::Config("timeouts must be positive".to_string()));
        }
        if self.expectations.viewports.is_empty() {
            return Err(SmokeError::Config("at least one viewport is required".to_string()));
        }
        Ok(())
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.output_dir.join("screenshots")
    }
}

fn merge_yaml(base: &mut serde_yaml::Value, overlay: serde_yaml::Value) {
    match (base, overlay) {
        (serde_yaml::Value::Mapping(base), serde_yaml::Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// How to reach a WebDriver endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Path to the chromedriver binary
    pub binary_path: PathBuf,

    /// Port to listen on (None = find free port)
    pub port: Option<u16>,

    /// Already running WebDriver endpoint; no binary is spawned when set
    pub remote_url: Option<String>,

    /// How long the driver may take to report ready
    pub startup_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from(DEFAULT_DRIVER_PATH),
            port: None,
            remote_url: None,
            startup_timeout_ms: 10_000,
        }
    }
}

impl DriverConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

/// Browser launch flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,

    /// Passed verbatim after the built-in flags
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            extra_args: Vec::new(),
        }
    }
}

impl BrowserConfig {
    /// Chrome command-line flags for the session
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.headless {
            args.push("--headless".to_string());
        }
        args.push("--no-sandbox".to_string());
        args.push("--disable-dev-shm-usage".to_string());
        args.push("--disable-gpu".to_string());
        args.push(format!("--window-size={},{}", self.window_width, self.window_height));
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Wait bounds and ceilings, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tolerances {
    /// Bound on every readiness wait
    pub wait_timeout_ms: u64,

    /// Bound on plain HTTP requests
    pub http_timeout_ms: u64,

    /// Maximum time from navigation to a rendered table
    pub load_ceiling_ms: u64,

    /// Pause after the readiness wait before reading page source
    pub settle_delay_ms: u64,

    /// Pause after resizing the window
    pub viewport_settle_ms: u64,

    pub poll_interval_ms: u64,
}

impl Tolerances {
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Strict => Self {
                wait_timeout_ms: 10_000,
                http_timeout_ms: 30_000,
                load_ceiling_ms: 10_000,
                settle_delay_ms: 0,
                viewport_settle_ms: 1_000,
                poll_interval_ms: 100,
            },
            Profile::Lenient => Self {
                wait_timeout_ms: 15_000,
                http_timeout_ms: 30_000,
                load_ceiling_ms: 30_000,
                settle_delay_ms: 2_000,
                viewport_settle_ms: 1_000,
                poll_interval_ms: 100,
            },
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn load_ceiling(&self) -> Duration {
        Duration::from_millis(self.load_ceiling_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn viewport_settle(&self) -> Duration {
        Duration::from_millis(self.viewport_settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// WebDriver page-load timeout, so navigation never outlives the run's bounds
    pub fn page_load_timeout(&self) -> Duration {
        self.load_ceiling().max(self.wait_timeout())
    }
}

/// What the page is expected to contain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expectations {
    /// Substring of the document title
    pub app_name: String,

    /// Substring of the `h1` text; `None` skips the heading check
    #[serde(default)]
    pub heading: Option<String>,

    /// Matched case-insensitively against success status text
    pub success_phrase: String,

    /// Alternate literal success marker
    pub success_glyph: String,

    /// Header cells that must all be present; empty means any header will do
    pub required_headers: Vec<String>,

    pub min_rows: usize,

    /// At least one must appear in the table text
    pub sample_keywords: Vec<String>,

    /// At least one must appear in the page source
    pub record_count_phrases: Vec<String>,

    /// At least one must appear in the page source, case-insensitive
    pub environment_keywords: Vec<String>,

    /// At least one must appear in the body's computed font-family
    pub font_keywords: Vec<String>,

    pub container_max_width: String,
    pub status_padding: String,
    pub success_rgb: [u8; 3],
    pub error_rgb: [u8; 3],
    pub viewports: Vec<Viewport>,
}

impl Expectations {
    pub fn for_profile(profile: Profile) -> Self {
        let base = Self {
            app_name: "PHP".to_string(),
            heading: Some("PHP Application".to_string()),
            success_phrase: "Database connection successful".to_string(),
            success_glyph: "\u{2705}".to_string(),
            required_headers: Vec::new(),
            min_rows: 1,
            sample_keywords: vec![
                "Sample Item".to_string(),
                "test value".to_string(),
                "Sample".to_string(),
            ],
            record_count_phrases: vec![
                "Total records:".to_string(),
                "Record Count:".to_string(),
                "Showing latest".to_string(),
            ],
            environment_keywords: vec![
                "php version".to_string(),
                "server time".to_string(),
                "environment".to_string(),
            ],
            font_keywords: vec!["Arial".to_string(), "sans-serif".to_string()],
            container_max_width: "800px".to_string(),
            status_padding: "10px".to_string(),
            success_rgb: [212, 237, 218],
            error_rgb: [248, 215, 218],
            viewports: Viewport::standard_set(),
        };

        match profile {
            Profile::Lenient => base,
            Profile::Strict => Self {
                required_headers: ["ID", "Name", "Value", "Created At"]
                    .iter()
                    .map(|h| h.to_string())
                    .collect(),
                min_rows: 3,
                sample_keywords: vec!["Sample Item".to_string(), "test value".to_string()],
                ..base
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_is_lenient() {
        let config = SuiteConfig::default();
        assert_eq!(config.profile, Profile::Lenient);
        assert_eq!(config.app_url, DEFAULT_APP_URL);
        assert_eq!(config.tolerances.wait_timeout(), Duration::from_secs(15));
        assert_eq!(config.tolerances.load_ceiling(), Duration::from_secs(30));
        assert_eq!(config.tolerances.http_timeout(), Duration::from_secs(30));
        assert!(config.expectations.required_headers.is_empty());
    }

    #[test]
    fn test_strict_profile_tightens_bounds() {
        let config = SuiteConfig::default().with_profile(Profile::Strict);
        assert_eq!(config.tolerances.wait_timeout(), Duration::from_secs(10));
        assert_eq!(config.tolerances.load_ceiling(), Duration::from_secs(10));
        assert_eq!(config.expectations.min_rows, 3);
        assert_eq!(config.expectations.required_headers.len(), 4);
    }

    #[test]
    fn test_yaml_profile_then_overrides() {
        let yaml = r#"
profile: strict
app_url: http://app:80
tolerances:
  load_ceiling_ms: 20000
"#;
        let config = SuiteConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.app_url, "http://app:80");
        assert_eq!(config.profile, Profile::Strict);
        assert_eq!(config.tolerances.load_ceiling_ms, 20_000);
        // untouched keys keep the strict values
        assert_eq!(config.tolerances.wait_timeout_ms, 10_000);
        assert_eq!(config.expectations.min_rows, 3);
    }

    #[test]
    fn test_cli_profile_keeps_file_overrides() {
        let yaml = r#"
profile: lenient
tolerances:
  load_ceiling_ms: 20000
expectations:
  min_rows: 5
"#;
        let config = SuiteConfig::from_yaml_as(yaml, Some(Profile::Strict)).unwrap();
        assert_eq!(config.profile, Profile::Strict);
        assert_eq!(config.tolerances.load_ceiling_ms, 20_000);
        assert_eq!(config.expectations.min_rows, 5);
        // everything else comes from strict, not from the file's profile
        assert_eq!(config.tolerances.wait_timeout_ms, 10_000);
        assert_eq!(config.expectations.required_headers.len(), 4);
    }

    #[test]
    fn test_load_missing_file_uses_requested_profile() {
        let config =
            SuiteConfig::load(Path::new("/nonexistent/smoke.yaml"), Some(Profile::Strict)).unwrap();
        assert_eq!(config.profile, Profile::Strict);
    }

    #[test]
    fn test_heading_can_be_disabled() {
        let config = SuiteConfig::from_yaml("expectations:\n  heading: null\n").unwrap();
        assert!(config.expectations.heading.is_none());
        assert_eq!(
            SuiteConfig::default().expectations.heading.as_deref(),
            Some("PHP Application")
        );
    }

    #[test]
    fn test_page_load_timeout_covers_every_wait() {
        let lenient = Tolerances::for_profile(Profile::Lenient);
        assert_eq!(lenient.page_load_timeout(), Duration::from_secs(30));

        let mut tolerances = Tolerances::for_profile(Profile::Strict);
        tolerances.wait_timeout_ms = 12_000;
        assert_eq!(tolerances.page_load_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = SuiteConfig::from_yaml("").unwrap();
        assert_eq!(config.profile, Profile::Lenient);
    }

    #[test]
    fn test_yaml_rejects_zero_poll_interval() {
        let yaml = "tolerances:\n  poll_interval_ms: 0\n";
        assert!(matches!(
            SuiteConfig::from_yaml(yaml),
            Err(SmokeError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let config = SuiteConfig::load(Path::new("/nonexistent/smoke.yaml"), None).unwrap();
        assert_eq!(config.driver.binary_path, PathBuf::from(DEFAULT_DRIVER_PATH));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_APP_URL, "http://web:8080"),
            (ENV_WEBDRIVER_URL, "http://selenium:4444"),
        ]
        .into_iter()
        .collect();

        let mut config = SuiteConfig::default();
        config.apply_env_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.app_url, "http://web:8080");
        assert_eq!(config.driver.remote_url.as_deref(), Some("http://selenium:4444"));
        assert_eq!(config.driver.binary_path, PathBuf::from(DEFAULT_DRIVER_PATH));
    }

    #[test]
    fn test_env_accepts_any_string() {
        let mut config = SuiteConfig::default();
        config.apply_env_from(|key| (key == ENV_APP_URL).then(|| "not a url".to_string()));
        assert_eq!(config.app_url, "not a url");
    }

    #[test]
    fn test_chrome_args() {
        let args = BrowserConfig::default().chrome_args();
        assert_eq!(
            args,
            vec![
                "--headless",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--disable-gpu",
                "--window-size=1920,1080",
            ]
        );
    }
}
