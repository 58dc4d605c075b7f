//! Domain model of the shop: money, orders, garments and payments.
//!
//! Types here hold the business rules (refund limits, status transitions,
//! service locking) and know nothing about storage or the card processor,
//! which are reached through the traits in [`ports`].

pub mod command;
pub mod garment;
pub mod history;
pub mod money;
pub mod order;
pub mod payment;
pub mod ports;
