use super::garment::ServiceId;
use super::money::Cents;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Restored,
    Completed,
    Reopened,
    QuantityChanged { from: u32, to: u32 },
    PriceChanged { from: Cents, to: Cents },
    Locked,
}

/// One entry in a garment's change history.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ChangeRecord {
    pub service: ServiceId,
    #[serde(flatten)]
    pub change: ChangeKind,
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ChangeRecord {
    pub fn new(service: ServiceId, change: ChangeKind, reason: Option<String>) -> Self {
        Self {
            service,
            change,
            reason,
            recorded_at: Utc::now(),
        }
    }
}
