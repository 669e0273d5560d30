use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::PaletteError;
use crate::pipeline::retry::RetryPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the oracle lives and how to find things on it
    pub oracle: OracleConfig,
    /// Browser process settings
    pub browser: BrowserSettings,
    /// Timeouts and pacing
    pub timing: TimingConfig,
    /// Attempt counts
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Page that renders the ramps
    pub url: String,
    pub selectors: Selectors,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            url: "https://www.radix-ui.com/colors/custom".to_string(),
            selectors: Selectors::default(),
        }
    }
}

/// CSS selectors and attribute names for the oracle page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub accent_input: String,
    pub gray_input: String,
    pub background_input: String,
    pub light_toggle: String,
    pub dark_toggle: String,
    /// Attribute holding the toggle state
    pub toggle_state_attribute: String,
    /// Attribute value meaning "active"
    pub toggle_on_value: String,
    /// All 24 swatches, accent family first
    pub swatch: String,
    pub dialog: String,
    /// Controls inside the dialog that may display the hex value
    pub hex_control: String,
    /// Key that dismisses the dialog without committing
    pub cancel_key: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            accent_input: "input#accent".to_string(),
            gray_input: "input#gray".to_string(),
            background_input: "input#background".to_string(),
            light_toggle: "button[aria-label=\"Light theme\"]".to_string(),
            dark_toggle: "button[aria-label=\"Dark theme\"]".to_string(),
            toggle_state_attribute: "data-state".to_string(),
            toggle_on_value: "on".to_string(),
            swatch: "button[data-swatch]".to_string(),
            dialog: "[role=\"dialog\"]".to_string(),
            hex_control: "input, code, span, p, button".to_string(),
            cancel_key: "Escape".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run without a visible window
    pub headless: bool,
    /// Chromium/Chrome binary (auto-detected when unset)
    pub executable: Option<PathBuf>,
    /// Keep the browser process alive between requests
    pub keep_warm: bool,
    /// Pass --no-sandbox (containers)
    pub no_sandbox: bool,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            keep_warm: false,
            no_sandbox: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub request_timeout_secs: u64,
    pub navigation_timeout_secs: u64,
    pub dialog_open_ms: u64,
    pub dialog_close_ms: u64,
    pub swatch_presence_ms: u64,
    /// Pause after each input change so the oracle re-renders its swatches
    pub settle_ms: u64,
    pub inter_swatch_ms: u64,
    pub retry_backoff_ms: u64,
    pub poll_interval_ms: u64,
    /// Upper bound on any single oracle call (click, read, fill, close)
    pub step_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 45,
            navigation_timeout_secs: 30,
            dialog_open_ms: 2000,
            dialog_close_ms: 3000,
            swatch_presence_ms: 10_000,
            settle_ms: 350,
            inter_swatch_ms: 60,
            retry_backoff_ms: 150,
            poll_interval_ms: 50,
            step_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub swatch_attempts: u32,
    pub session_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            swatch_attempts: 3,
            session_attempts: 1,
        }
    }
}

/// Waits used while driving a single session. Copied into every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub dialog_open: Duration,
    pub dialog_close: Duration,
    pub swatch_presence: Duration,
    pub settle: Duration,
    pub inter_swatch: Duration,
    pub poll_interval: Duration,
    pub step: Duration,
}

impl TimingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn timings(&self) -> Timings {
        Timings {
            dialog_open: Duration::from_millis(self.dialog_open_ms),
            dialog_close: Duration::from_millis(self.dialog_close_ms),
            swatch_presence: Duration::from_millis(self.swatch_presence_ms),
            settle: Duration::from_millis(self.settle_ms),
            inter_swatch: Duration::from_millis(self.inter_swatch_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            step: Duration::from_millis(self.step_timeout_ms),
        }
    }
}

impl Config {
    /// Get the XDG config directory for rampgen (~/.config/rampgen)
    pub fn config_dir() -> PathBuf {
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|p| p.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("."))
            })
            .join("rampgen")
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load config from XDG config directory
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        Ok(config)
    }

    /// Reject settings that can never produce a palette.
    pub fn validate(&self) -> Result<(), PaletteError> {
        if self.oracle.url.trim().is_empty() {
            return Err(PaletteError::Config("oracle.url is empty".to_string()));
        }
        if self.timing.request_timeout_secs == 0 {
            return Err(PaletteError::Config(
                "timing.request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.timing.navigation_timeout_secs == 0 {
            return Err(PaletteError::Config(
                "timing.navigation_timeout_secs must be positive".to_string(),
            ));
        }
        for (name, value) in [
            ("dialog_open_ms", self.timing.dialog_open_ms),
            ("dialog_close_ms", self.timing.dialog_close_ms),
            ("swatch_presence_ms", self.timing.swatch_presence_ms),
            ("step_timeout_ms", self.timing.step_timeout_ms),
        ] {
            if value == 0 {
                return Err(PaletteError::Config(format!(
                    "timing.{name} must be positive"
                )));
            }
        }
        if self.retry.swatch_attempts == 0 || self.retry.session_attempts == 0 {
            return Err(PaletteError::Config(
                "retry attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn swatch_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.swatch_attempts,
            Duration::from_millis(self.timing.retry_backoff_ms),
        )
    }

    pub fn session_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.session_attempts,
            Duration::from_millis(self.timing.retry_backoff_ms),
        )
    }

    /// Generate a default config file content
    pub fn default_toml() -> String {
        r#"# rampgen configuration
# Location: ~/.config/rampgen/config.toml

[oracle]
url = "https://www.radix-ui.com/colors/custom"

[oracle.selectors]
# accent_input = "input#accent"
# gray_input = "input#gray"
# background_input = "input#background"
# light_toggle = 'button[aria-label="Light theme"]'
# dark_toggle = 'button[aria-label="Dark theme"]'
# toggle_state_attribute = "data-state"
# toggle_on_value = "on"
# swatch = "button[data-swatch]"
# dialog = '[role="dialog"]'
# hex_control = "input, code, span, p, button"
# cancel_key = "Escape"

[browser]
headless = true
keep_warm = false
# executable = "/usr/bin/chromium"
# no_sandbox = false

[timing]
request_timeout_secs = 45
navigation_timeout_secs = 30
# dialog_open_ms = 2000
# dialog_close_ms = 3000
# swatch_presence_ms = 10000
# settle_ms = 350
# inter_swatch_ms = 60
# retry_backoff_ms = 150
# poll_interval_ms = 50
# step_timeout_ms = 5000

[retry]
swatch_attempts = 3
session_attempts = 1
"#
        .to_string()
    }

    /// Create the config directory and a default config file if needed
    pub fn init() -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_path();

        std::fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

        if !config_path.exists() {
            std::fs::write(&config_path, Self::default_toml())
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        Ok(config_path)
    }
}
