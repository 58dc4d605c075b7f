use crate::domain::money::Cents;
use crate::domain::payment::{PaymentId, PaymentMethod};
use crate::domain::ports::PaymentGateway;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChargeState {
    Captured,
    Cancelled,
}

#[derive(Debug, Clone)]
struct Charge {
    amount: Cents,
    refunded: Cents,
    state: ChargeState,
}

/// An in-process card processor.
///
/// Keeps its own view of every charge and refuses refunds beyond what was
/// captured, the way a hosted processor would. Charges above `decline_above`
/// are declined, and `refunds_offline` makes every refund fail.
#[derive(Default, Clone)]
pub struct SimulatedGateway {
    charges: Arc<RwLock<HashMap<String, Charge>>>,
    decline_above: Option<Cents>,
    refunds_offline: Arc<AtomicBool>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decline_above(mut self, limit: Cents) -> Self {
        self.decline_above = Some(limit);
        self
    }

    /// Toggles refund outages. Shared across clones.
    pub fn set_refunds_offline(&self, offline: bool) {
        self.refunds_offline.store(offline, Ordering::SeqCst);
    }

    /// Number of charges still captured, i.e. neither declined nor voided.
    pub async fn captured_charges(&self) -> usize {
        self.charges
            .read()
            .await
            .values()
            .filter(|c| c.state == ChargeState::Captured)
            .count()
    }

    /// Total refunded on a charge, as the processor sees it.
    pub async fn refunded(&self, reference: &str) -> Option<Cents> {
        self.charges.read().await.get(reference).map(|c| c.refunded)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(
        &self,
        payment_id: PaymentId,
        amount: Cents,
        method: PaymentMethod,
    ) -> Result<String> {
        if !method.uses_gateway() {
            return Err(LedgerError::GatewayError(format!(
                "{} payments are not processed by the gateway",
                method.as_str()
            )));
        }
        if let Some(limit) = self.decline_above
            && amount > limit
        {
            tracing::info!(payment = payment_id, %amount, "card declined");
            return Err(LedgerError::GatewayError(format!(
                "card declined for payment {}",
                payment_id
            )));
        }

        let reference = format!("ch_{}", Uuid::new_v4().simple());
        self.charges.write().await.insert(
            reference.clone(),
            Charge {
                amount,
                refunded: Cents::ZERO,
                state: ChargeState::Captured,
            },
        );
        Ok(reference)
    }

    async fn cancel(&self, reference: &str) -> Result<()> {
        let mut charges = self.charges.write().await;
        let charge = charges
            .get_mut(reference)
            .ok_or_else(|| LedgerError::GatewayError(format!("no such charge: {}", reference)))?;
        if charge.refunded.is_positive() {
            return Err(LedgerError::GatewayError(format!(
                "charge {} has refunds and cannot be cancelled",
                reference
            )));
        }
        charge.state = ChargeState::Cancelled;
        Ok(())
    }

    async fn refund(&self, reference: &str, amount: Cents) -> Result<String> {
        if self.refunds_offline.load(Ordering::SeqCst) {
            return Err(LedgerError::GatewayError(
                "refund service unavailable".to_string(),
            ));
        }
        let mut charges = self.charges.write().await;
        let charge = charges
            .get_mut(reference)
            .ok_or_else(|| LedgerError::GatewayError(format!("no such charge: {}", reference)))?;
        if charge.state != ChargeState::Captured {
            return Err(LedgerError::GatewayError(format!(
                "charge {} was cancelled",
                reference
            )));
        }
        if !amount.is_positive() || charge.refunded + amount > charge.amount {
            return Err(LedgerError::GatewayError(format!(
                "refund of {} exceeds captured amount on {}",
                amount, reference
            )));
        }
        charge.refunded += amount;
        Ok(format!("re_{}", Uuid::new_v4().simple()))
    }
}
