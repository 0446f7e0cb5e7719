//! Unified error model for the registry core.
//! Every core operation either commits fully or returns one of these kinds
//! with state untouched; all of them are recoverable by the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ident::{Address, RoleId};

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryError {
    #[error("account {account} is missing role {role}")]
    Unauthorized { account: Address, role: RoleId },
    #[error("instance is already initialized")]
    AlreadyInitialized,
    #[error("instance has not been initialized")]
    NotInitialized,
    #[error("invalid entity: {reason}")]
    InvalidEntity { reason: String },
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: String, reason: String },
    #[error("no analysis recorded for {entity}")]
    NotAnalyzed { entity: Address },
    #[error("warning limit exceeded for {entity}: {current} stored + {attempted} new > {max}")]
    WarningLimitExceeded { entity: Address, current: usize, attempted: usize, max: usize },
    #[error("cannot remove {account}: it is the last admin")]
    LastAdmin { account: Address },
    #[error("incompatible storage layout: {reason}")]
    IncompatibleLayout { reason: String },
    #[error("upgrade validation failed: {reason}")]
    UpgradeValidationFailed { reason: String },
    #[error("storage: {message}")]
    Storage { message: String },
}

impl RegistryError {
    pub fn code_str(&self) -> &'static str {
        match self {
            RegistryError::Unauthorized { .. } => "unauthorized",
            RegistryError::AlreadyInitialized => "already_initialized",
            RegistryError::NotInitialized => "not_initialized",
            RegistryError::InvalidEntity { .. } => "invalid_entity",
            RegistryError::InvalidInput { .. } => "invalid_input",
            RegistryError::NotAnalyzed { .. } => "not_analyzed",
            RegistryError::WarningLimitExceeded { .. } => "warning_limit_exceeded",
            RegistryError::LastAdmin { .. } => "last_admin",
            RegistryError::IncompatibleLayout { .. } => "incompatible_layout",
            RegistryError::UpgradeValidationFailed { .. } => "upgrade_validation_failed",
            RegistryError::Storage { .. } => "storage",
        }
    }

    pub fn invalid_entity<S: Into<String>>(reason: S) -> Self { RegistryError::InvalidEntity { reason: reason.into() } }
    pub fn invalid_input<F: Into<String>, S: Into<String>>(field: F, reason: S) -> Self {
        RegistryError::InvalidInput { field: field.into(), reason: reason.into() }
    }
    pub fn incompatible_layout<S: Into<String>>(reason: S) -> Self { RegistryError::IncompatibleLayout { reason: reason.into() } }
    pub fn validation_failed<S: Into<String>>(reason: S) -> Self { RegistryError::UpgradeValidationFailed { reason: reason.into() } }
    pub fn storage<S: Into<String>>(message: S) -> Self { RegistryError::Storage { message: message.into() } }

    /// Map to a sysexits-style process exit code for the operator CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            RegistryError::InvalidEntity { .. } | RegistryError::InvalidInput { .. } => 65, // EX_DATAERR
            RegistryError::NotAnalyzed { .. } => 66,                                          // EX_NOINPUT
            RegistryError::Storage { .. } => 74,                                              // EX_IOERR
            RegistryError::AlreadyInitialized
            | RegistryError::NotInitialized
            | RegistryError::WarningLimitExceeded { .. }
            | RegistryError::LastAdmin { .. } => 75,                                          // EX_TEMPFAIL
            RegistryError::IncompatibleLayout { .. } | RegistryError::UpgradeValidationFailed { .. } => 76, // EX_PROTOCOL
            RegistryError::Unauthorized { .. } => 77,                                         // EX_NOPERM
        }
    }
}

pub type AppResult<T> = Result<T, RegistryError>;

impl From<anyhow::Error> for RegistryError {
    fn from(err: anyhow::Error) -> Self {
        // Tooling and persistence errors surface as storage failures at the core boundary
        RegistryError::Storage { message: format!("{:#}", err) }
    }
}

impl From<bincode::Error> for RegistryError {
    fn from(err: bincode::Error) -> Self { RegistryError::Storage { message: err.to_string() } }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
