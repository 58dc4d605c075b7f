use super::money::Cents;
use super::order::OrderId;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type PaymentId = u32;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Cash,
    ExternalPos,
}

impl PaymentMethod {
    /// Only card payments are charged and refunded through the gateway.
    pub fn uses_gateway(&self) -> bool {
        matches!(self, PaymentMethod::Card)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Cash => "cash",
            PaymentMethod::ExternalPos => "external_pos",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Completed)
                | (Pending, Failed)
                | (Completed, PartiallyRefunded)
                | (Completed, Refunded)
                | (PartiallyRefunded, PartiallyRefunded)
                | (PartiallyRefunded, Refunded)
                // A payment marked refunded with a balance left may be corrected.
                | (Refunded, PartiallyRefunded)
                | (Refunded, Refunded)
        )
    }

    /// Statuses from which a refund may be issued.
    pub fn allows_refund(self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::PartiallyRefunded | PaymentStatus::Refunded
        )
    }

    /// Whether money for this payment was actually collected.
    pub fn is_settled(self) -> bool {
        self.allows_refund()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefundKind {
    /// Sent to the payment gateway. The reference is filled once the gateway accepts it.
    Gateway { reference: Option<String> },
    /// Recorded in the ledger only, e.g. cash handed back at the counter.
    Manual { reason: String },
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct RefundEntry {
    pub seq: u32,
    pub amount: Cents,
    pub kind: RefundKind,
    /// Voided entries stay for audit but do not count toward the refunded amount.
    #[serde(default)]
    pub voided: bool,
    pub recorded_at: DateTime<Utc>,
}

/// A charge attempt against an order and everything refunded from it since.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: PaymentId,
    pub order: OrderId,
    pub amount: Cents,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    #[serde(default)]
    pub refunded_amount: Cents,
    #[serde(default)]
    pub gateway_reference: Option<String>,
    #[serde(default)]
    pub refunds: Vec<RefundEntry>,
    /// Bumped by the store on every successful compare-and-swap.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(id: PaymentId, order: OrderId, amount: Cents, method: PaymentMethod) -> Result<Self> {
        if amount.is_negative() {
            return Err(LedgerError::validation("Payment amount cannot be negative"));
        }
        Ok(Self {
            id,
            order,
            amount,
            method,
            status: PaymentStatus::Pending,
            refunded_amount: Cents::ZERO,
            gateway_reference: None,
            refunds: Vec::new(),
            version: 0,
            created_at: Utc::now(),
        })
    }

    pub fn remaining_refundable(&self) -> Cents {
        self.amount - self.refunded_amount
    }

    /// Amount actually kept by the shop: zero unless the payment settled.
    pub fn net_collected(&self) -> Cents {
        if self.status.is_settled() {
            self.remaining_refundable()
        } else {
            Cents::ZERO
        }
    }

    pub fn is_refundable(&self) -> bool {
        self.status.allows_refund() && self.remaining_refundable().is_positive()
    }

    /// Checks a requested refund against the current balance without touching state.
    pub fn validate_refund(&self, requested: Cents) -> Result<()> {
        if !self.status.allows_refund() {
            return Err(LedgerError::validation(format!(
                "Payment {} is {} and cannot be refunded",
                self.id,
                self.status.as_str()
            )));
        }
        let remaining = self.remaining_refundable();
        if !remaining.is_positive() {
            return Err(LedgerError::validation(format!(
                "Payment {} has nothing left to refund",
                self.id
            )));
        }
        if !requested.is_positive() {
            return Err(LedgerError::validation("Refund amount must be positive"));
        }
        if requested > remaining {
            return Err(LedgerError::validation(format!(
                "Refund of {} exceeds remaining refundable {}",
                requested, remaining
            )));
        }
        Ok(())
    }

    /// Records a refund and returns its sequence number.
    pub fn apply_refund(&mut self, requested: Cents, kind: RefundKind) -> Result<u32> {
        self.validate_refund(requested)?;
        if let RefundKind::Manual { reason } = &kind
            && reason.trim().is_empty()
        {
            return Err(LedgerError::validation("Manual refunds require a reason"));
        }

        let next = self.refunded_status(self.refunded_amount + requested);
        self.transition(next)?;
        self.refunded_amount += requested;

        let seq = self.refunds.len() as u32;
        self.refunds.push(RefundEntry {
            seq,
            amount: requested,
            kind,
            voided: false,
            recorded_at: Utc::now(),
        });
        Ok(seq)
    }

    /// Stores the gateway's reference on a reserved gateway refund.
    pub fn settle_refund(&mut self, seq: u32, reference: String) -> Result<()> {
        let entry = self.refund_entry_mut(seq)?;
        if entry.voided {
            return Err(LedgerError::validation(format!(
                "Refund {} is voided",
                seq
            )));
        }
        match &mut entry.kind {
            RefundKind::Gateway { reference: slot } => {
                *slot = Some(reference);
                Ok(())
            }
            RefundKind::Manual { .. } => Err(LedgerError::validation(format!(
                "Refund {} is a manual refund",
                seq
            ))),
        }
    }

    /// Voids a refund entry and gives its amount back to the refundable balance.
    ///
    /// Status goes back to `completed` when nothing stays refunded, which is
    /// the one backwards move the ledger makes.
    pub fn void_refund(&mut self, seq: u32) -> Result<()> {
        let entry = self.refund_entry_mut(seq)?;
        if entry.voided {
            return Err(LedgerError::validation(format!(
                "Refund {} is already voided",
                seq
            )));
        }
        entry.voided = true;
        let amount = entry.amount;

        self.refunded_amount -= amount;
        self.status = if self.refunded_amount == Cents::ZERO {
            PaymentStatus::Completed
        } else {
            self.refunded_status(self.refunded_amount)
        };
        Ok(())
    }

    pub fn complete(&mut self, reference: Option<String>) -> Result<()> {
        self.transition(PaymentStatus::Completed)?;
        if reference.is_some() {
            self.gateway_reference = reference;
        }
        Ok(())
    }

    pub fn fail(&mut self) -> Result<()> {
        self.transition(PaymentStatus::Failed)
    }

    fn transition(&mut self, next: PaymentStatus) -> Result<()> {
        if self.status.can_transition_to(next) {
            self.status = next;
            Ok(())
        } else {
            Err(LedgerError::validation(format!(
                "Payment {} cannot move from {} to {}",
                self.id,
                self.status.as_str(),
                next.as_str()
            )))
        }
    }

    fn refunded_status(&self, refunded: Cents) -> PaymentStatus {
        if refunded >= self.amount {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        }
    }

    fn refund_entry_mut(&mut self, seq: u32) -> Result<&mut RefundEntry> {
        let id = self.id;
        self.refunds
            .iter_mut()
            .find(|entry| entry.seq == seq)
            .ok_or_else(|| LedgerError::NotFound(format!("refund {} on payment {}", seq, id)))
    }
}
