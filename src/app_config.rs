use anyhow::{Context, Result, anyhow};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::default::Default;
use std::path::Path;

use crate::language_utils::validate_locale;
use crate::placement::models::PolicyOverlay;
use crate::translation::exchange::FieldPath;

/// Application configuration module
/// This module handles loading, validating and saving the back-office settings:
/// placement policy overlays, translation requirements, and exchange defaults.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// SQLite settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Placement policy overlays
    #[serde(default)]
    pub placement: PlacementConfig,

    /// Publish-gate requirements
    #[serde(default)]
    pub translation_policy: TranslationPolicyConfig,

    /// Import/export defaults
    #[serde(default)]
    pub exchange: ExchangeConfig,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Database location
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// Path of the SQLite file; the platform data directory when absent
    #[serde(default)]
    pub path: Option<String>,
}

/// Placement policy overlays, lowest precedence first
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PlacementConfig {
    #[serde(default)]
    pub system_policy: PolicyOverlay,

    #[serde(default)]
    pub org_policies: BTreeMap<String, PolicyOverlay>,

    #[serde(default)]
    pub user_policies: BTreeMap<String, PolicyOverlay>,
}

/// Requirements for one `(entity, transition)` pair
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct TransitionRequirement {
    /// Per-environment locale override
    #[serde(default)]
    pub required_locales: BTreeMap<String, Vec<String>>,

    /// Field paths that must be non-blank on each locale's translation
    #[serde(default)]
    pub required_fields: BTreeMap<String, Vec<String>>,
}

/// Translation policy configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslationPolicyConfig {
    /// Required locales keyed by environment
    #[serde(default = "default_required_locales")]
    pub required_locales: BTreeMap<String, Vec<String>>,

    /// Environment used when a request names none
    #[serde(default = "default_environment")]
    pub default_environment: String,

    /// Overrides keyed by policy entity, then transition
    #[serde(default)]
    pub entities: BTreeMap<String, BTreeMap<String, TransitionRequirement>>,
}

impl Default for TranslationPolicyConfig {
    fn default() -> Self {
        Self {
            required_locales: default_required_locales(),
            default_environment: default_environment(),
            entities: BTreeMap::new(),
        }
    }
}

/// Translation exchange defaults
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExchangeConfig {
    #[serde(default = "default_target_locales")]
    pub default_target_locales: Vec<String>,

    #[serde(default = "default_field_paths")]
    pub default_field_paths: Vec<String>,

    #[serde(default = "default_workflow_status")]
    pub default_workflow_status: String,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            default_target_locales: default_target_locales(),
            default_field_paths: default_field_paths(),
            default_workflow_status: default_workflow_status(),
        }
    }
}

fn default_required_locales() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        ("staging".to_string(), vec!["en".to_string(), "es".to_string()]),
        (
            "production".to_string(),
            vec!["en".to_string(), "es".to_string(), "fr".to_string()],
        ),
    ])
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_target_locales() -> Vec<String> {
    vec!["es".to_string(), "fr".to_string()]
}

fn default_field_paths() -> Vec<String> {
    vec!["title".to_string()]
}

fn default_workflow_status() -> String {
    "draft".to_string()
}

impl Config {
    /// Read and parse a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load a configuration file, writing the defaults first when it is missing
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }

        let config = Config::default();
        config.save(path)?;
        info!("Created default configuration at {}", path.display());
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let overlays = std::iter::once(("system", &self.placement.system_policy))
            .chain(self.placement.org_policies.values().map(|o| ("org", o)))
            .chain(self.placement.user_policies.values().map(|o| ("user", o)));
        for (layer, overlay) in overlays {
            let w = &overlay.weights;
            if w.accuracy < 0.0 || w.cost < 0.0 || w.latency < 0.0 {
                return Err(anyhow!("Negative scoring weight in {} placement policy", layer));
            }
            if overlay.limits.max_budget < 0.0 {
                return Err(anyhow!("Negative budget in {} placement policy", layer));
            }
        }

        let policy = &self.translation_policy;
        if policy.default_environment.trim().is_empty() {
            return Err(anyhow!("translation_policy.default_environment must not be empty"));
        }
        for locales in policy.required_locales.values() {
            validate_locales(locales)?;
        }
        for (entity, transitions) in &policy.entities {
            for (transition, requirement) in transitions {
                for locales in requirement.required_locales.values() {
                    validate_locales(locales)?;
                }
                for (locale, fields) in &requirement.required_fields {
                    validate_locale(locale)?;
                    for field in fields {
                        if FieldPath::parse(field).is_none() {
                            return Err(anyhow!(
                                "Unknown field path '{}' required for {} {}",
                                field,
                                entity,
                                transition
                            ));
                        }
                    }
                }
            }
        }

        validate_locales(&self.exchange.default_target_locales)?;
        for field in &self.exchange.default_field_paths {
            if FieldPath::parse(field).is_none() {
                return Err(anyhow!("Unknown exchange field path: {}", field));
            }
        }

        Ok(())
    }
}

fn validate_locales(locales: &[String]) -> Result<()> {
    for locale in locales {
        validate_locale(locale)?;
    }
    Ok(())
}
