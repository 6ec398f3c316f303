//! Step and run failures.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use satlink_core::{Address, ArtifactError, DeployedInstance, RegistrationRecord, TxHash};
use satlink_ledger::LedgerError;

use crate::events::Phase;

/// Why a single step (one deployment, one registration) failed.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("template resolution failed: {0}")]
    Template(#[from] ArtifactError),

    /// The ledger refused the transaction before inclusion.
    #[error("submission rejected: {0}")]
    Submission(LedgerError),

    #[error("transaction {tx} not confirmed within {timeout:?}")]
    ConfirmationTimeout { tx: TxHash, timeout: Duration },

    #[error("transaction {tx} reverted: {reason}")]
    Reverted { tx: TxHash, reason: String },

    #[error("confirmation of {tx} failed: {source}")]
    Confirmation { tx: TxHash, source: LedgerError },

    #[error("{address} does not resolve after confirmation of {tx}")]
    NotResolvable { address: Address, tx: TxHash },

    #[error("ledger query failed: {0}")]
    Query(LedgerError),

    /// A registration was about to be sent without a confirmed hub.
    #[error("sequencing violation: {0}")]
    SequencingViolation(String),
}

impl StepError {
    /// The transaction the failure is attributed to, if one was assigned.
    pub fn tx(&self) -> Option<TxHash> {
        match self {
            StepError::ConfirmationTimeout { tx, .. }
            | StepError::Reverted { tx, .. }
            | StepError::Confirmation { tx, .. }
            | StepError::NotResolvable { tx, .. } => Some(*tx),
            _ => None,
        }
    }
}

/// What was on the ledger when a run stopped. Nothing here is rolled back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartialRun {
    pub deployer: Option<Address>,
    pub satellites: Vec<DeployedInstance>,
    pub hub: Option<DeployedInstance>,
    pub registrations: Vec<RegistrationRecord>,
}

impl PartialRun {
    /// Satellites with no confirmed registration.
    pub fn unregistered(&self) -> Vec<&DeployedInstance> {
        self.satellites
            .iter()
            .filter(|s| {
                !self
                    .registrations
                    .iter()
                    .any(|r| r.satellite == s.address && r.is_confirmed())
            })
            .collect()
    }
}

/// A run that ended before every satellite was registered.
#[derive(Debug, Error)]
#[error("{phase} failed at {item}: {source}")]
pub struct RunError {
    pub phase: Phase,
    /// Label, or label plus address for registrations.
    pub item: String,
    #[source]
    pub source: StepError,
    pub partial: PartialRun,
}
