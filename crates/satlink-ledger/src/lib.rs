//! Ledger access for satlink.
//!
//! The orchestrator only ever talks to a [`LedgerClient`]: submit a
//! creation, submit a call, wait for a receipt, read a balance. Transport
//! and key management live behind the trait.
//!
//! # Components
//!
//! - **`client`** — the `LedgerClient` trait, receipts, and `LedgerError`
//! - **`dev`** — `DevLedger`, an in-process ledger with fault injection

pub mod client;
pub mod dev;

pub use client::{
    Call, LedgerClient, LedgerError, LedgerFuture, LedgerResult, PendingCreation, Receipt,
    ReceiptStatus,
};
pub use dev::{DevLedger, FaultPlan};
