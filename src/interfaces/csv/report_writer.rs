use crate::domain::order::Order;
use crate::domain::payment::Payment;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct PaymentRow<'a> {
    payment: u32,
    order: u32,
    method: &'a str,
    status: &'a str,
    amount: Decimal,
    refunded: Decimal,
    remaining: Decimal,
}

#[derive(Serialize)]
struct OrderRow<'a> {
    order: u32,
    client: &'a str,
    active_services: usize,
    completed_services: usize,
    total: Decimal,
    progress: Option<u8>,
    paid: Decimal,
    balance_due: Decimal,
}

/// Writes end-of-run reports as CSV.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_payments(&mut self, payments: &[Payment]) -> Result<()> {
        // Header is emitted by the first serialize; an empty report still gets one.
        if payments.is_empty() {
            self.writer.write_record([
                "payment", "order", "method", "status", "amount", "refunded", "remaining",
            ])?;
        }
        for payment in payments {
            self.writer.serialize(PaymentRow {
                payment: payment.id,
                order: payment.order,
                method: payment.method.as_str(),
                status: payment.status.as_str(),
                amount: payment.amount.to_decimal(),
                refunded: payment.refunded_amount.to_decimal(),
                remaining: payment.remaining_refundable().to_decimal(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// One row per order; `payments` may include other orders' payments.
    pub fn write_orders(&mut self, orders: &[Order], payments: &[Payment]) -> Result<()> {
        if orders.is_empty() {
            self.writer.write_record([
                "order",
                "client",
                "active_services",
                "completed_services",
                "total",
                "progress",
                "paid",
                "balance_due",
            ])?;
        }
        for order in orders {
            let summary = order.summary();
            let paid = crate::domain::order::paid(order.id, payments);
            self.writer.serialize(OrderRow {
                order: order.id,
                client: &order.client.name,
                active_services: summary.active,
                completed_services: summary.completed,
                total: summary.total.to_decimal(),
                progress: summary.progress,
                paid: paid.to_decimal(),
                balance_due: (summary.total - paid).to_decimal(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
