use super::garment::{GarmentId, ServiceId};
use super::order::OrderId;
use super::payment::{PaymentId, PaymentMethod};
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    OpenOrder,
    AddGarment,
    AddService,
    UpdateService,
    RemoveService,
    RestoreService,
    CompleteService,
    ReopenService,
    Charge,
    Confirm,
    Cancel,
    Refund,
    ManualRefund,
}

/// One row of shop activity. Which columns are required depends on `type`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Command {
    pub r#type: CommandType,
    #[serde(default)]
    pub order: Option<OrderId>,
    #[serde(default)]
    pub garment: Option<GarmentId>,
    #[serde(default)]
    pub service: Option<ServiceId>,
    #[serde(default)]
    pub payment: Option<PaymentId>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub method: Option<PaymentMethod>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub force: Option<bool>,
}

impl Command {
    pub fn new(r#type: CommandType) -> Self {
        Self {
            r#type,
            order: None,
            garment: None,
            service: None,
            payment: None,
            amount: None,
            quantity: None,
            method: None,
            name: None,
            reason: None,
            force: None,
        }
    }

    pub fn order(&self) -> Result<OrderId> {
        self.order.ok_or_else(|| missing(self.r#type, "order"))
    }

    pub fn garment(&self) -> Result<GarmentId> {
        self.garment.ok_or_else(|| missing(self.r#type, "garment"))
    }

    pub fn service(&self) -> Result<ServiceId> {
        self.service.ok_or_else(|| missing(self.r#type, "service"))
    }

    pub fn payment(&self) -> Result<PaymentId> {
        self.payment.ok_or_else(|| missing(self.r#type, "payment"))
    }

    pub fn amount(&self) -> Result<Decimal> {
        self.amount.ok_or_else(|| missing(self.r#type, "amount"))
    }

    pub fn method(&self) -> Result<PaymentMethod> {
        self.method.ok_or_else(|| missing(self.r#type, "method"))
    }

    pub fn name(&self) -> Result<&str> {
        self.name
            .as_deref()
            .ok_or_else(|| missing(self.r#type, "name"))
    }

    pub fn reason(&self) -> Result<&str> {
        self.reason
            .as_deref()
            .ok_or_else(|| missing(self.r#type, "reason"))
    }
}

fn missing(r#type: CommandType, field: &str) -> LedgerError {
    LedgerError::ValidationError(format!("{:?} requires a {} value", r#type, field))
}
