use super::garment::{Garment, GarmentId, ServiceSummary};
use super::money::Cents;
use super::payment::Payment;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type OrderId = u32;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Client {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Client {
    pub fn new(name: &str, phone: Option<String>) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::validation("Client name is required"));
        }
        Ok(Self {
            name: name.to_string(),
            phone,
        })
    }
}

/// A client's order: every garment dropped off in one visit.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: OrderId,
    pub client: Client,
    #[serde(default)]
    pub garments: BTreeMap<GarmentId, Garment>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(id: OrderId, client: Client) -> Self {
        Self {
            id,
            client,
            garments: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn add_garment(&mut self, garment: Garment) -> Result<()> {
        if self.garments.contains_key(&garment.id) {
            return Err(LedgerError::Duplicate(format!(
                "garment {} on order {}",
                garment.id, self.id
            )));
        }
        self.garments.insert(garment.id, garment);
        Ok(())
    }

    pub fn garment_mut(&mut self, id: GarmentId) -> Result<&mut Garment> {
        let order = self.id;
        self.garments
            .get_mut(&id)
            .ok_or_else(|| LedgerError::NotFound(format!("garment {} on order {}", id, order)))
    }

    pub fn summary(&self) -> ServiceSummary {
        ServiceSummary::of(self.garments.values().flat_map(|g| g.services.iter()))
    }

    pub fn total(&self) -> Cents {
        self.summary().total
    }

    /// Order total minus what its settled payments still hold. Negative means credit.
    pub fn balance_due<'a>(&self, payments: impl IntoIterator<Item = &'a Payment>) -> Cents {
        self.total() - paid(self.id, payments)
    }

    pub fn lock_services(&mut self) {
        for garment in self.garments.values_mut() {
            garment.lock_services();
        }
    }
}

/// Net amount collected for an order across its payments.
pub fn paid<'a>(order: OrderId, payments: impl IntoIterator<Item = &'a Payment>) -> Cents {
    payments
        .into_iter()
        .filter(|p| p.order == order)
        .map(Payment::net_collected)
        .sum()
}
