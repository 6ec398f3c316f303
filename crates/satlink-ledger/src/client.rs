//! The ledger client seam.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use satlink_core::{Address, Artifact, TxHash};

/// Errors surfaced by a ledger back-end.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Refused before inclusion: bad signature, insufficient balance,
    /// malformed call.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("unknown transaction {0}")]
    UnknownTransaction(TxHash),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Boxed future alias for ledger operations.
pub type LedgerFuture<'a, T> = Pin<Box<dyn Future<Output = LedgerResult<T>> + Send + 'a>>;

/// A method invocation against a deployed contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub method: String,
    pub args: Vec<Address>,
}

impl Call {
    pub const REGISTER: &'static str = "register";

    /// `register(satellite)` on a hub.
    pub fn register(satellite: Address) -> Self {
        Self {
            method: Self::REGISTER.to_string(),
            args: vec![satellite],
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.method)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

/// A creation transaction accepted into the pool. The address is known
/// up front but does not resolve until the transaction is included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCreation {
    pub address: Address,
    pub tx: TxHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Success,
    Reverted { reason: String },
}

/// Inclusion receipt for a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx: TxHash,
    pub block: u64,
    pub status: ReceiptStatus,
}

impl Receipt {
    pub fn succeeded(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// Capabilities the orchestrator needs from a ledger.
///
/// Every transaction is signed by the single identity returned from
/// [`LedgerClient::deployer`]. Callers are expected to wait for each
/// transaction's receipt before submitting the next one.
pub trait LedgerClient: Send + Sync {
    /// The signing identity.
    fn deployer(&self) -> Address;

    /// Current balance of `account`, in base units.
    fn balance<'a>(&'a self, account: &'a Address) -> LedgerFuture<'a, u128>;

    /// Submit a contract creation with no constructor arguments.
    fn submit_creation<'a>(&'a self, artifact: &'a Artifact) -> LedgerFuture<'a, PendingCreation>;

    /// Submit a method call against `target`.
    fn submit_call<'a>(&'a self, target: &'a Address, call: &'a Call) -> LedgerFuture<'a, TxHash>;

    /// Resolve once `tx` is included. Has no upper bound of its own.
    fn await_confirmation<'a>(&'a self, tx: &'a TxHash) -> LedgerFuture<'a, Receipt>;

    /// Whether code is resolvable at `address`.
    fn is_deployed<'a>(&'a self, address: &'a Address) -> LedgerFuture<'a, bool>;
}
