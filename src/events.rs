//! Structured notifications
//! ------------------------
//! Components push `Notification`s into a per-call buffer. The instance
//! commits the buffer to its `Journal` only when the call succeeds, stamping
//! each entry with a sequence number, UTC time and the emitting stable
//! address. Observers either query the journal with an `EventFilter` or
//! follow the live `EventBus`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::RegistryError;
use crate::ident::{Address, LogicId, RoleId};
use crate::registry::RiskLevel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    Initialized { version: u64 },
    RoleGranted { role: RoleId, account: Address, sender: Address },
    RoleRevoked { role: RoleId, account: Address, sender: Address },
    ContractAnalyzed { entity: Address, fraud_surface: u8, risk_level: RiskLevel, timestamp: i64, analyzer: Address },
    HighRiskDetected { entity: Address, fraud_surface: u8 },
    WarningsUpdated { entity: Address, count: usize },
    Upgraded { logic: LogicId, version: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    Initialized,
    RoleGranted,
    RoleRevoked,
    ContractAnalyzed,
    HighRiskDetected,
    WarningsUpdated,
    Upgraded,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Initialized => "Initialized",
            NotificationKind::RoleGranted => "RoleGranted",
            NotificationKind::RoleRevoked => "RoleRevoked",
            NotificationKind::ContractAnalyzed => "ContractAnalyzed",
            NotificationKind::HighRiskDetected => "HighRiskDetected",
            NotificationKind::WarningsUpdated => "WarningsUpdated",
            NotificationKind::Upgraded => "Upgraded",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for NotificationKind {
    type Err = RegistryError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let k = match s.to_ascii_lowercase().replace(|c: char| c == '_' || c == '-', "").as_str() {
            "initialized" => NotificationKind::Initialized,
            "rolegranted" => NotificationKind::RoleGranted,
            "rolerevoked" => NotificationKind::RoleRevoked,
            "contractanalyzed" => NotificationKind::ContractAnalyzed,
            "highriskdetected" => NotificationKind::HighRiskDetected,
            "warningsupdated" => NotificationKind::WarningsUpdated,
            "upgraded" => NotificationKind::Upgraded,
            _ => return Err(RegistryError::invalid_input("event kind", format!("unknown kind '{}'", s))),
        };
        Ok(k)
    }
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::Initialized { .. } => NotificationKind::Initialized,
            Notification::RoleGranted { .. } => NotificationKind::RoleGranted,
            Notification::RoleRevoked { .. } => NotificationKind::RoleRevoked,
            Notification::ContractAnalyzed { .. } => NotificationKind::ContractAnalyzed,
            Notification::HighRiskDetected { .. } => NotificationKind::HighRiskDetected,
            Notification::WarningsUpdated { .. } => NotificationKind::WarningsUpdated,
            Notification::Upgraded { .. } => NotificationKind::Upgraded,
        }
    }

    /// The analysed entity or role holder the notification is about, if any.
    pub fn subject(&self) -> Option<Address> {
        match self {
            Notification::RoleGranted { account, .. } | Notification::RoleRevoked { account, .. } => Some(*account),
            Notification::ContractAnalyzed { entity, .. }
            | Notification::HighRiskDetected { entity, .. }
            | Notification::WarningsUpdated { entity, .. } => Some(*entity),
            Notification::Initialized { .. } | Notification::Upgraded { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub emitter: Address,
    pub notification: Notification,
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub kind: Option<NotificationKind>,
    pub subject: Option<Address>,
    /// Inclusive lower bound on the sequence number.
    pub from_seq: u64,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn kind(kind: NotificationKind) -> Self { Self { kind: Some(kind), ..Self::default() } }

    pub fn matches(&self, e: &Event) -> bool {
        if e.seq < self.from_seq { return false; }
        if let Some(k) = self.kind { if e.notification.kind() != k { return false; } }
        if let Some(s) = self.subject { if e.notification.subject() != Some(s) { return false; } }
        true
    }
}

/// Append-only, persisted history of committed notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    next_seq: u64,
    entries: Vec<Event>,
}

impl Journal {
    /// Stamp and append one call's worth of notifications.
    pub fn commit(&mut self, emitter: Address, at: DateTime<Utc>, batch: Vec<Notification>) -> Vec<Event> {
        let mut out = Vec::with_capacity(batch.len());
        for notification in batch {
            let e = Event { seq: self.next_seq, at, emitter, notification };
            self.next_seq += 1;
            self.entries.push(e.clone());
            out.push(e);
        }
        out
    }

    pub fn query(&self, filter: &EventFilter) -> Vec<Event> {
        // entries are sorted by seq, so skip straight to the lower bound
        let start = self.entries.partition_point(|e| e.seq < filter.from_seq);
        let it = self.entries[start..].iter().filter(|e| filter.matches(e)).cloned();
        match filter.limit {
            Some(n) => it.take(n).collect(),
            None => it.collect(),
        }
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn next_seq(&self) -> u64 { self.next_seq }
}

/// Live fan-out of committed events to in-process observers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> { self.tx.subscribe() }

    pub fn publish(&self, events: &[Event]) {
        for e in events {
            // no receivers is fine: the journal is the durable record
            let _ = self.tx.send(e.clone());
        }
    }
}
