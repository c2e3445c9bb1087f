//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "app": { "demoMode": false, ... },
//!   "plaid": {
//!     "clientId": "...",
//!     "secret": "...",
//!     "environment": "sandbox",
//!     "countryCodes": ["US"],
//!     "syncPageSize": 100
//!   }
//! }
//! ```
//!
//! Environment variables override the file: `PLAID_CLIENT_ID`, `PLAID_SECRET`,
//! `PLAID_ENV`, `PLAID_BASE_URL` and `FININFO_DEMO_MODE`.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default number of transactions requested per /transactions/sync page
const DEFAULT_SYNC_PAGE_SIZE: u32 = 100;

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(default)]
    plaid: PlaidSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default)]
    demo_mode: bool,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Plaid environment, selects the default API host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaidEnvironment {
    #[default]
    Sandbox,
    Development,
    Production,
}

impl PlaidEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            PlaidEnvironment::Sandbox => "https://sandbox.plaid.com",
            PlaidEnvironment::Development => "https://development.plaid.com",
            PlaidEnvironment::Production => "https://production.plaid.com",
        }
    }
}

impl fmt::Display for PlaidEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaidEnvironment::Sandbox => "sandbox",
            PlaidEnvironment::Development => "development",
            PlaidEnvironment::Production => "production",
        };
        f.write_str(name)
    }
}

impl FromStr for PlaidEnvironment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sandbox" => Ok(PlaidEnvironment::Sandbox),
            "development" => Ok(PlaidEnvironment::Development),
            "production" => Ok(PlaidEnvironment::Production),
            other => anyhow::bail!(
                "Unknown Plaid environment '{}' (expected sandbox, development or production)",
                other
            ),
        }
    }
}

/// Connection settings for the Plaid API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaidSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default)]
    pub environment: PlaidEnvironment,
    /// Overrides the environment's host (mock servers, proxies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_country_codes")]
    pub country_codes: Vec<String>,
    #[serde(default = "default_sync_page_size")]
    pub sync_page_size: u32,
}

fn default_country_codes() -> Vec<String> {
    vec!["US".to_string()]
}

fn default_sync_page_size() -> u32 {
    DEFAULT_SYNC_PAGE_SIZE
}

impl Default for PlaidSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            secret: None,
            environment: PlaidEnvironment::default(),
            base_url: None,
            country_codes: default_country_codes(),
            sync_page_size: DEFAULT_SYNC_PAGE_SIZE,
        }
    }
}

impl PlaidSettings {
    /// API host to talk to
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.environment.base_url().to_string())
    }

    /// Whether both credentials are present
    pub fn has_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.client_id) && present(&self.secret)
    }
}

/// Loaded configuration (simplified view of settings)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub demo_mode: bool,
    pub plaid: PlaidSettings,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Config {
    /// Load config from the data directory
    ///
    /// Demo mode can be enabled via:
    /// 1. Settings file (fi demo on)
    /// 2. Environment variable FININFO_DEMO_MODE (for CI/testing)
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw = if settings_path.exists() {
            std::fs::read_to_string(&settings_path)?
        } else {
            String::new()
        };

        Self::from_sources(&raw, |key| std::env::var(key).ok())
    }

    /// Build config from raw settings.json content and an environment lookup
    pub fn from_sources<F>(raw: &str, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: SettingsFile = if raw.trim().is_empty() {
            SettingsFile::default()
        } else {
            serde_json::from_str(raw).unwrap_or_default()
        };

        let demo_mode = match env("FININFO_DEMO_MODE").as_deref() {
            Some("true" | "1" | "yes" | "TRUE" | "YES") => true,
            Some("false" | "0" | "no" | "FALSE" | "NO") => false,
            _ => raw.app.demo_mode,
        };

        let mut plaid = raw.plaid.clone();
        if let Some(client_id) = env("PLAID_CLIENT_ID").filter(|v| !v.is_empty()) {
            plaid.client_id = Some(client_id);
        }
        if let Some(secret) = env("PLAID_SECRET").filter(|v| !v.is_empty()) {
            plaid.secret = Some(secret);
        }
        if let Some(environment) = env("PLAID_ENV").filter(|v| !v.is_empty()) {
            plaid.environment = environment.parse()?;
        }
        if let Some(base_url) = env("PLAID_BASE_URL").filter(|v| !v.is_empty()) {
            plaid.base_url = Some(base_url);
        }

        Ok(Self {
            demo_mode,
            plaid,
            _raw_settings: raw,
        })
    }

    /// Save config to the data directory
    ///
    /// Only `app.demoMode` is written back; Plaid credentials that came from
    /// the environment never reach the file.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join("settings.json");

        // Load existing settings to preserve fields we don't manage
        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).with_context(|| {
                format!(
                    "Refusing to overwrite unreadable settings file {}",
                    settings_path.display()
                )
            })?
        } else {
            self._raw_settings.clone()
        };

        settings.app.demo_mode = self.demo_mode;

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Enable demo mode
    pub fn enable_demo_mode(&mut self) {
        self.demo_mode = true;
    }

    /// Disable demo mode
    pub fn disable_demo_mode(&mut self) {
        self.demo_mode = false;
    }
}
