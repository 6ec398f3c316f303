//! Progress events emitted while a run advances.
//!
//! The orchestrator never writes to stdout. It pushes [`ProgressEvent`]s
//! into an unbounded channel; the CLI renders them, tests collect them.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use satlink_core::{Address, TxHash};

/// The phases of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Preflight,
    SatelliteDeployment,
    HubDeployment,
    Settlement,
    Registration,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Preflight => "preflight",
            Phase::SatelliteDeployment => "satellite deployment",
            Phase::HubDeployment => "hub deployment",
            Phase::Settlement => "settlement",
            Phase::Registration => "registration",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Signing identity and its balance before anything is sent.
    Preflight { deployer: Address, balance: u128 },
    PhaseStarted { phase: Phase, items: usize },
    /// Transaction accepted by the ledger, not yet included.
    Submitted {
        phase: Phase,
        label: String,
        tx: TxHash,
        /// Known up front for creations.
        address: Option<Address>,
    },
    Deployed {
        phase: Phase,
        label: String,
        address: Address,
        tx: TxHash,
    },
    Settling { delay: Duration },
    Registered {
        label: String,
        satellite: Address,
        tx: TxHash,
    },
    StepFailed {
        phase: Phase,
        label: String,
        address: Option<Address>,
        tx: Option<TxHash>,
        error: String,
    },
}

/// Sending half of the progress stream. Cheap to clone; a disabled
/// handle drops every event.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl Progress {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emit an event. A closed receiver is not an error: nobody is
    /// listening any more.
    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
