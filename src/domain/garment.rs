use super::history::{ChangeKind, ChangeRecord};
use super::money::Cents;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type GarmentId = u32;
pub type ServiceId = u32;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Removal {
    pub reason: String,
    pub removed_at: DateTime<Utc>,
}

/// A priced line item on a garment, e.g. "hem trousers x2".
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct GarmentService {
    pub id: ServiceId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Cents,
    #[serde(default)]
    pub is_done: bool,
    /// Set once a payment on the order has been finalized.
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub removal: Option<Removal>,
}

/// Requested changes to a service's quantity and/or unit price.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ServiceEdit {
    pub quantity: Option<u32>,
    pub unit_price: Option<Cents>,
}

impl GarmentService {
    pub fn new(id: ServiceId, name: String, quantity: u32, unit_price: Cents) -> Result<Self> {
        validate_quantity(quantity)?;
        validate_price(unit_price)?;
        validate_line_total(quantity, unit_price)?;
        Ok(Self {
            id,
            name,
            quantity,
            unit_price,
            is_done: false,
            is_locked: false,
            removal: None,
        })
    }

    pub fn line_total(&self) -> Cents {
        self.unit_price * self.quantity
    }

    pub fn is_removed(&self) -> bool {
        self.removal.is_some()
    }

    /// Applies an edit and returns the history entries it produced.
    ///
    /// Locked or completed services only accept edits with `confirm_override`.
    pub fn update(&mut self, edit: ServiceEdit, confirm_override: bool) -> Result<Vec<ChangeKind>> {
        if self.is_removed() {
            return Err(LedgerError::validation(format!(
                "Service {} is removed and cannot be edited",
                self.id
            )));
        }
        if (self.is_locked || self.is_done) && !confirm_override {
            return Err(LedgerError::validation(format!(
                "Service {} is locked; confirm the override to edit it",
                self.id
            )));
        }
        if let Some(quantity) = edit.quantity {
            validate_quantity(quantity)?;
        }
        if let Some(price) = edit.unit_price {
            validate_price(price)?;
        }
        validate_line_total(
            edit.quantity.unwrap_or(self.quantity),
            edit.unit_price.unwrap_or(self.unit_price),
        )?;

        let mut changes = Vec::new();
        if let Some(quantity) = edit.quantity
            && quantity != self.quantity
        {
            changes.push(ChangeKind::QuantityChanged {
                from: self.quantity,
                to: quantity,
            });
            self.quantity = quantity;
        }
        if let Some(price) = edit.unit_price
            && price != self.unit_price
        {
            changes.push(ChangeKind::PriceChanged {
                from: self.unit_price,
                to: price,
            });
            self.unit_price = price;
        }
        Ok(changes)
    }

    pub fn remove(&mut self, reason: &str) -> Result<()> {
        if self.is_removed() {
            return Err(LedgerError::validation(format!(
                "Service {} is already removed",
                self.id
            )));
        }
        if reason.trim().is_empty() {
            return Err(LedgerError::validation("Removing a service requires a reason"));
        }
        self.removal = Some(Removal {
            reason: reason.trim().to_string(),
            removed_at: Utc::now(),
        });
        Ok(())
    }

    pub fn restore(&mut self) -> Result<()> {
        if self.removal.take().is_none() {
            return Err(LedgerError::validation(format!(
                "Service {} is not removed",
                self.id
            )));
        }
        Ok(())
    }

    pub fn set_done(&mut self, done: bool) -> Result<()> {
        if self.is_removed() {
            return Err(LedgerError::validation(format!(
                "Service {} is removed",
                self.id
            )));
        }
        self.is_done = done;
        Ok(())
    }
}

fn validate_quantity(quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(LedgerError::validation("Quantity must be at least 1"));
    }
    Ok(())
}

fn validate_price(price: Cents) -> Result<()> {
    if price.is_negative() {
        return Err(LedgerError::validation("Unit price cannot be negative"));
    }
    Ok(())
}

fn validate_line_total(quantity: u32, price: Cents) -> Result<()> {
    match price.checked_mul(quantity) {
        Some(total) if total <= Cents::MAX_AMOUNT => Ok(()),
        _ => Err(LedgerError::validation(format!(
            "Line total of {} x {} exceeds {}",
            quantity,
            price,
            Cents::MAX_AMOUNT
        ))),
    }
}

/// Totals and progress over the active (not removed) services.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSummary {
    pub active: usize,
    pub completed: usize,
    pub total: Cents,
    /// Rounded percentage of completed services; `None` when nothing is active.
    pub progress: Option<u8>,
}

impl ServiceSummary {
    pub fn of<'a>(services: impl IntoIterator<Item = &'a GarmentService>) -> Self {
        let mut summary = services
            .into_iter()
            .filter(|service| !service.is_removed())
            .fold(Self::default(), |mut acc, service| {
                acc.active += 1;
                acc.total += service.line_total();
                if service.is_done {
                    acc.completed += 1;
                }
                acc
            });
        summary.progress = percentage(summary.completed, summary.active);
        summary
    }
}

fn percentage(completed: usize, active: usize) -> Option<u8> {
    if active == 0 {
        return None;
    }
    // Round half up in integer arithmetic.
    Some(((completed * 200 + active) / (active * 2)) as u8)
}

/// A garment brought in by the client, with its services and change history.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Garment {
    pub id: GarmentId,
    pub description: String,
    #[serde(default)]
    pub services: Vec<GarmentService>,
    #[serde(default)]
    pub history: Vec<ChangeRecord>,
}

impl Garment {
    pub fn new(id: GarmentId, description: String) -> Self {
        Self {
            id,
            description,
            services: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn summary(&self) -> ServiceSummary {
        ServiceSummary::of(&self.services)
    }

    pub fn add_service(&mut self, service: GarmentService) -> Result<()> {
        if self.services.iter().any(|s| s.id == service.id) {
            return Err(LedgerError::Duplicate(format!(
                "service {} on garment {}",
                service.id, self.id
            )));
        }
        self.record(service.id, ChangeKind::Added, None);
        self.services.push(service);
        Ok(())
    }

    pub fn update_service(
        &mut self,
        id: ServiceId,
        edit: ServiceEdit,
        confirm_override: bool,
        reason: Option<String>,
    ) -> Result<()> {
        let changes = self.service_mut(id)?.update(edit, confirm_override)?;
        for change in changes {
            self.record(id, change, reason.clone());
        }
        Ok(())
    }

    pub fn remove_service(&mut self, id: ServiceId, reason: &str) -> Result<()> {
        self.service_mut(id)?.remove(reason)?;
        self.record(id, ChangeKind::Removed, Some(reason.trim().to_string()));
        Ok(())
    }

    pub fn restore_service(&mut self, id: ServiceId) -> Result<()> {
        self.service_mut(id)?.restore()?;
        self.record(id, ChangeKind::Restored, None);
        Ok(())
    }

    pub fn set_service_done(&mut self, id: ServiceId, done: bool) -> Result<()> {
        self.service_mut(id)?.set_done(done)?;
        let change = if done {
            ChangeKind::Completed
        } else {
            ChangeKind::Reopened
        };
        self.record(id, change, None);
        Ok(())
    }

    /// Locks every active service that is not locked yet.
    pub fn lock_services(&mut self) {
        let newly_locked: Vec<ServiceId> = self
            .services
            .iter_mut()
            .filter(|s| !s.is_removed() && !s.is_locked)
            .map(|s| {
                s.is_locked = true;
                s.id
            })
            .collect();
        for id in newly_locked {
            self.record(id, ChangeKind::Locked, None);
        }
    }

    fn service_mut(&mut self, id: ServiceId) -> Result<&mut GarmentService> {
        let garment = self.id;
        self.services
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| LedgerError::NotFound(format!("service {} on garment {}", id, garment)))
    }

    fn record(&mut self, service: ServiceId, change: ChangeKind, reason: Option<String>) {
        self.history.push(ChangeRecord::new(service, change, reason));
    }
}
