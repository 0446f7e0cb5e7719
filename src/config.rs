//! Registry policy and instance settings.
//!
//! `RegistryPolicy` travels with a logic unit (it is part of what an upgrade
//! may change); `InstanceSettings` belongs to the host running an instance.
//! Both are plain serde structs with per-field defaults. Settings are read
//! from `<state_dir>/settings.json` and then overridden by `INVARIANCE_*`
//! environment variables.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppResult, RegistryError};
use crate::registry::Warning;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryPolicy {
    /// Cap on the warning list of a single entity.
    #[serde(default = "RegistryPolicy::default_max_warnings")]
    pub max_warnings: usize,
    /// Scores strictly above this raise `HighRiskDetected`.
    #[serde(default = "RegistryPolicy::default_high_risk_threshold")]
    pub high_risk_threshold: u8,
    /// Upper bound of a fraud-surface score.
    #[serde(default = "RegistryPolicy::default_max_score")]
    pub max_score: u8,
    #[serde(default = "RegistryPolicy::default_text_len")]
    pub max_message_len: usize,
    #[serde(default = "RegistryPolicy::default_text_len")]
    pub max_reference_len: usize,
}

impl RegistryPolicy {
    fn default_max_warnings() -> usize { 10 }
    fn default_high_risk_threshold() -> u8 { 80 }
    fn default_max_score() -> u8 { 100 }
    fn default_text_len() -> usize { 256 }

    /// Reject policies that could never admit a record.
    pub fn validate(&self) -> AppResult<()> {
        if self.max_warnings == 0 {
            return Err(RegistryError::invalid_input("policy.max_warnings", "must be at least 1"));
        }
        if self.high_risk_threshold > self.max_score {
            return Err(RegistryError::invalid_input(
                "policy.high_risk_threshold",
                format!("{} exceeds max_score {}", self.high_risk_threshold, self.max_score),
            ));
        }
        if self.max_message_len == 0 {
            return Err(RegistryError::invalid_input("policy.max_message_len", "must be at least 1"));
        }
        Ok(())
    }

    pub fn check_score(&self, fraud_surface: u8) -> AppResult<()> {
        if fraud_surface > self.max_score {
            return Err(RegistryError::invalid_input(
                "fraud_surface",
                format!("{} is above the maximum score {}", fraud_surface, self.max_score),
            ));
        }
        Ok(())
    }

    pub fn check_warning(&self, w: &Warning) -> AppResult<()> {
        if w.message.trim().is_empty() {
            return Err(RegistryError::invalid_input("warning.message", "must not be empty"));
        }
        if w.message.len() > self.max_message_len {
            return Err(RegistryError::invalid_input(
                "warning.message",
                format!("{} bytes exceeds {}", w.message.len(), self.max_message_len),
            ));
        }
        if let Some(r) = &w.reference {
            if r.len() > self.max_reference_len {
                return Err(RegistryError::invalid_input(
                    "warning.reference",
                    format!("{} bytes exceeds {}", r.len(), self.max_reference_len),
                ));
            }
        }
        Ok(())
    }

    pub fn is_high_risk(&self, fraud_surface: u8) -> bool { fraud_surface > self.high_risk_threshold }
}

impl Default for RegistryPolicy {
    fn default() -> Self {
        Self {
            max_warnings: Self::default_max_warnings(),
            high_risk_threshold: Self::default_high_risk_threshold(),
            max_score: Self::default_max_score(),
            max_message_len: Self::default_text_len(),
            max_reference_len: Self::default_text_len(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct InstanceSettings {
    /// How many role holders per role and how many records are re-read
    /// through the new logic after an upgrade.
    #[serde(default = "InstanceSettings::default_verification_sample")]
    pub verification_sample: usize,
    /// Capacity of the live notification channel. Slow subscribers lag, the
    /// persisted journal still holds every event.
    #[serde(default = "InstanceSettings::default_event_capacity")]
    pub event_capacity: usize,
    #[serde(default)]
    pub persistence: PersistenceSettings,
}

impl InstanceSettings {
    fn default_verification_sample() -> usize { 64 }
    fn default_event_capacity() -> usize { 256 }

    /// Load `<dir>/settings.json` if present, else defaults, then apply env overrides.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = crate::paths::settings_path(dir);
        let mut settings = if path.exists() {
            let bytes = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            serde_json::from_slice::<InstanceSettings>(&bytes).with_context(|| format!("parse {}", path.display()))?
        } else {
            InstanceSettings::default()
        };
        settings.apply_env();
        debug!(target: "invariance::config", "settings loaded from '{}': {:?}", path.display(), settings);
        Ok(settings)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = crate::paths::settings_path(dir);
        std::fs::create_dir_all(dir).ok();
        std::fs::write(&path, serde_json::to_vec_pretty(self)?).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn apply_env(&mut self) {
        if let Some(n) = parse_usize_env("INVARIANCE_VERIFICATION_SAMPLE") { self.verification_sample = n; }
        if let Some(n) = parse_usize_env("INVARIANCE_EVENT_CAPACITY") { self.event_capacity = n.max(1); }
        if let Some(b) = parse_bool_env("INVARIANCE_FSYNC") { self.persistence.fsync = b; }
    }
}

impl Default for InstanceSettings {
    fn default() -> Self {
        Self {
            verification_sample: Self::default_verification_sample(),
            event_capacity: Self::default_event_capacity(),
            persistence: PersistenceSettings::default(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct PersistenceSettings {
    /// fsync the snapshot file before renaming it into place
    #[serde(default = "PersistenceSettings::default_fsync")]
    pub fsync: bool,
}

impl PersistenceSettings {
    fn default_fsync() -> bool { true }
}

impl Default for PersistenceSettings {
    fn default() -> Self { Self { fsync: Self::default_fsync() } }
}

pub fn parse_bool_env(name: &str) -> Option<bool> {
    match std::env::var(name) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        },
        Err(_) => None,
    }
}

pub fn parse_usize_env(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<usize>().ok())
}
