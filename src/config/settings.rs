//! Application settings loading from config.toml
//!
//! The file carries two things: the policy switches that decide how the cost engine
//! and the deletion guard behave, and the system-wide default catalog that is seeded
//! into the database on startup.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Config file used when `RAB_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Behavioral switches
    #[serde(default)]
    pub policy: PolicyConfig,
    /// System-wide default materials
    #[serde(default)]
    pub materials: Vec<CatalogSeed>,
    /// System-wide default labor types
    #[serde(default)]
    pub labor_types: Vec<CatalogSeed>,
}

/// What to do when cost calculation fails after the work item has been written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostFailurePolicy {
    /// Fail the whole work-item write; nothing is committed
    #[default]
    Strict,
    /// Keep the work item, log the failure and leave it with an empty snapshot
    Lenient,
}

/// How a delete treats rows that still reference the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Refuse while anything references the row
    Block,
    /// Delete the referencing rows along with the target
    Cascade,
}

/// Policy section of config.toml
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Failure handling for cost calculation on work-item writes
    pub cost_failure: CostFailurePolicy,
    /// Deleting a template that work items still use
    pub template_delete: DeletePolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            cost_failure: CostFailurePolicy::Strict,
            template_delete: DeletePolicy::Block,
        }
    }
}

/// One default catalog entry (material or labor type)
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSeed {
    /// Name of the entry
    pub name: String,
    /// Unit the price is quoted in
    pub unit: String,
    /// Unit price for materials, daily wage for labor
    pub price: f64,
}

/// Loads the configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A policy value is not one of the known variants
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    tracing::debug!("Loading configuration from {}", path_ref.display());
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })
}

/// Loads the configuration from `RAB_CONFIG`, or ./config.toml.
///
/// A missing file is not an error: defaults apply and no catalog is seeded.
pub fn load_default_config() -> Result<Config> {
    let path = std::env::var("RAB_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    if !Path::new(&path).exists() {
        tracing::warn!("No config file at {path}, using defaults");
        return Ok(Config::default());
    }
    load_config(path)
}
