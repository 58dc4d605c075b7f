//! Application layer containing the shop's operations.
//!
//! This module defines the `ShopEngine`, the entry point for every order,
//! service and payment operation. It sequences calls to the stores and the
//! gateway and keeps refund bookkeeping consistent under concurrent use.

pub mod engine;
