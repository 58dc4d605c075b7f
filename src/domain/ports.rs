use super::money::Cents;
use super::order::{Order, OrderId};
use super::payment::{Payment, PaymentId, PaymentMethod};
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Stores a new payment; fails with `Duplicate` when the id is taken.
    async fn insert(&self, payment: Payment) -> Result<()>;
    async fn get(&self, payment_id: PaymentId) -> Result<Option<Payment>>;
    /// Replaces the stored payment only if its version still equals `expected_version`.
    ///
    /// On success the stored version becomes `expected_version + 1`; otherwise
    /// the store returns `Conflict` and keeps the current record.
    async fn compare_and_swap(&self, payment: Payment, expected_version: u64) -> Result<()>;
    async fn all_payments(&self) -> Result<Vec<Payment>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn store(&self, order: Order) -> Result<()>;
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;
    async fn all_orders(&self) -> Result<Vec<Order>>;
}

/// The card processor. Amounts are in cents; references are opaque gateway ids.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges the card and returns the charge reference.
    async fn charge(&self, payment_id: PaymentId, amount: Cents, method: PaymentMethod)
    -> Result<String>;
    async fn cancel(&self, reference: &str) -> Result<()>;
    /// Refunds part of a charge and returns the refund reference.
    async fn refund(&self, reference: &str, amount: Cents) -> Result<String>;
}

pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type OrderStoreBox = Box<dyn OrderStore>;
pub type PaymentGatewayBox = Box<dyn PaymentGateway>;
