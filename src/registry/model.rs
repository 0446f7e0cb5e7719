use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::ident::Address;

/// Caller-supplied risk tier. The registry stores it as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for RiskLevel {
    type Err = RegistryError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            "CRITICAL" => Ok(RiskLevel::Critical),
            other => Err(RegistryError::invalid_input("risk_level", format!("unknown tier '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCategory {
    Upgradable,
    Proxy,
    Ownership,
    Mintable,
    Pausable,
    Blacklist,
    ExternalCall,
    Other,
}

impl WarningCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCategory::Upgradable => "UPGRADABLE",
            WarningCategory::Proxy => "PROXY",
            WarningCategory::Ownership => "OWNERSHIP",
            WarningCategory::Mintable => "MINTABLE",
            WarningCategory::Pausable => "PAUSABLE",
            WarningCategory::Blacklist => "BLACKLIST",
            WarningCategory::ExternalCall => "EXTERNAL_CALL",
            WarningCategory::Other => "OTHER",
        }
    }
}

impl fmt::Display for WarningCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for WarningCategory {
    type Err = RegistryError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let c = match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "UPGRADABLE" | "UPGRADEABLE" => WarningCategory::Upgradable,
            "PROXY" => WarningCategory::Proxy,
            "OWNERSHIP" => WarningCategory::Ownership,
            "MINTABLE" => WarningCategory::Mintable,
            "PAUSABLE" => WarningCategory::Pausable,
            "BLACKLIST" => WarningCategory::Blacklist,
            "EXTERNAL_CALL" => WarningCategory::ExternalCall,
            "OTHER" => WarningCategory::Other,
            other => return Err(RegistryError::invalid_input("warning.category", format!("unknown category '{}'", other))),
        };
        Ok(c)
    }
}

/// One finding attached to an entity. Never edited after it is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub category: WarningCategory,
    pub message: String,
    #[serde(default)]
    pub reference: Option<String>,
}

impl Warning {
    pub fn new(category: WarningCategory, message: impl Into<String>) -> Self {
        Self { category, message: message.into(), reference: None }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub fraud_surface: u8,
    pub risk_level: RiskLevel,
    /// Unix seconds of the last `record_analysis`.
    pub timestamp: i64,
    pub analyzer: Address,
    pub warnings: Vec<Warning>,
}

/// Entity -> record. Keys are unique and records are never dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisTable {
    records: BTreeMap<Address, AnalysisRecord>,
}

impl AnalysisTable {
    pub fn get(&self, entity: &Address) -> Option<&AnalysisRecord> { self.records.get(entity) }
    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }
    pub fn entities(&self) -> Vec<Address> { self.records.keys().copied().collect() }
    pub fn warning_count(&self, entity: &Address) -> usize { self.records.get(entity).map(|r| r.warnings.len()).unwrap_or(0) }

    pub(super) fn get_mut(&mut self, entity: &Address) -> Option<&mut AnalysisRecord> { self.records.get_mut(entity) }

    pub(super) fn upsert(&mut self, entity: Address, fraud_surface: u8, risk_level: RiskLevel, timestamp: i64, analyzer: Address) -> &mut AnalysisRecord {
        let rec = self.records.entry(entity).or_insert_with(|| AnalysisRecord {
            fraud_surface,
            risk_level,
            timestamp,
            analyzer,
            warnings: Vec::new(),
        });
        rec.fraud_surface = fraud_surface;
        rec.risk_level = risk_level;
        rec.timestamp = timestamp;
        rec.analyzer = analyzer;
        rec
    }
}
