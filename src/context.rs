use chrono::{DateTime, Utc};

use crate::ident::Address;

/// Who is calling and when. Supplied by the host for every mutating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub at: DateTime<Utc>,
}

impl CallContext {
    pub fn new(caller: Address) -> Self { Self { caller, at: Utc::now() } }

    pub fn at(caller: Address, at: DateTime<Utc>) -> Self { Self { caller, at } }

    /// Unix seconds, the resolution recorded on analysis records.
    pub fn timestamp(&self) -> i64 { self.at.timestamp() }
}
