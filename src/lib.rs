//! Role-gated registry of risk analyses behind a stable address whose logic
//! unit can be replaced without moving or losing stored state.

pub mod access;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod ident;
pub mod instance;
pub mod logic;
pub mod paths;
pub mod registry;
pub mod storage;
pub mod tools;

pub use access::{ADMIN, ANALYZER};
pub use context::CallContext;
pub use error::{AppResult, RegistryError};
pub use ident::{Address, LogicId, RoleId};
pub use instance::Instance;
