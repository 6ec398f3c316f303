//! satlink orchestration — satellites, hub, settlement, registration.
//!
//! This crate drives the one fixed topology satlink knows: N satellite
//! contracts and one hub, linked by calling `register(satellite)` on the
//! hub for each satellite. Every ledger-mutating step is sequential and
//! waits for its receipt. The first failure ends the run.
//!
//! # Components
//!
//! - **`plan`** — what to deploy and the timing constants
//! - **`confirm`** — bounded wait for a transaction receipt
//! - **`step`** — deploy one unit, register one satellite
//! - **`orchestrator`** — the four-phase driving loop
//! - **`events`** — progress stream consumed by the CLI and by tests
//! - **`error`** — per-step and per-run failures

pub mod confirm;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod plan;
pub mod step;

pub use error::{PartialRun, RunError, StepError};
pub use events::{Phase, Progress, ProgressEvent};
pub use orchestrator::Orchestrator;
pub use plan::{DEFAULT_CONFIRMATION_TIMEOUT, DEFAULT_SETTLE_DELAY, RunPlan};
