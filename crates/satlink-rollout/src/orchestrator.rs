//! Orchestrator — drives the four phases of a run.
//!
//! 1. deploy every satellite, in plan order
//! 2. deploy the hub
//! 3. sleep for the settlement delay
//! 4. register every satellite with the hub, in deployment order
//!
//! Each step waits for its receipt before the next is submitted, since
//! one signing identity sends everything. The first failure stops the run
//! and nothing already on the ledger is undone.

use std::sync::Arc;

use tracing::{debug, info};

use satlink_core::{DeployedInstance, DeploymentSummary, RegistrationRecord, TemplateResolver};
use satlink_ledger::LedgerClient;

use crate::error::{PartialRun, RunError, StepError};
use crate::events::{Phase, Progress, ProgressEvent};
use crate::plan::RunPlan;
use crate::step::StepContext;

pub struct Orchestrator {
    ledger: Arc<dyn LedgerClient>,
    resolver: Arc<dyn TemplateResolver>,
    plan: RunPlan,
    progress: Progress,
}

impl Orchestrator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        resolver: Arc<dyn TemplateResolver>,
        plan: RunPlan,
    ) -> Self {
        Self {
            ledger,
            resolver,
            plan,
            progress: Progress::disabled(),
        }
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Execute the run. Consumes the orchestrator so the progress stream
    /// closes once the run is over.
    pub async fn run(self) -> Result<DeploymentSummary, RunError> {
        let ctx = StepContext {
            ledger: self.ledger.as_ref(),
            resolver: self.resolver.as_ref(),
            confirmation_timeout: self.plan.confirmation_timeout,
            progress: &self.progress,
        };
        let mut run = PartialRun::default();

        // Preflight.
        let deployer = self.ledger.deployer();
        run.deployer = Some(deployer);
        let balance = self.ledger.balance(&deployer).await.map_err(|e| {
            let err = StepError::Query(e);
            self.progress.emit(ProgressEvent::StepFailed {
                phase: Phase::Preflight,
                label: deployer.to_string(),
                address: Some(deployer),
                tx: None,
                error: err.to_string(),
            });
            abort(Phase::Preflight, deployer.to_string(), err, run.clone())
        })?;
        info!(%deployer, balance, "deploying");
        self.progress
            .emit(ProgressEvent::Preflight { deployer, balance });

        // Phase 1: satellites.
        self.progress.emit(ProgressEvent::PhaseStarted {
            phase: Phase::SatelliteDeployment,
            items: self.plan.satellites.len(),
        });
        for unit in &self.plan.satellites {
            match ctx.deploy_unit(Phase::SatelliteDeployment, unit).await {
                Ok(instance) => run.satellites.push(instance),
                Err(e) => return Err(abort(Phase::SatelliteDeployment, unit.label.clone(), e, run)),
            }
        }

        // Phase 2: hub.
        self.progress.emit(ProgressEvent::PhaseStarted {
            phase: Phase::HubDeployment,
            items: 1,
        });
        let hub = match ctx.deploy_unit(Phase::HubDeployment, &self.plan.hub).await {
            Ok(hub) => hub,
            Err(e) => return Err(abort(Phase::HubDeployment, self.plan.hub.label.clone(), e, run)),
        };
        run.hub = Some(hub.clone());

        // Phase 3: settle.
        self.settle().await;

        // Phase 4: registration.
        self.progress.emit(ProgressEvent::PhaseStarted {
            phase: Phase::Registration,
            items: run.satellites.len(),
        });
        register_all(&ctx, &mut run).await?;

        info!(
            satellites = run.satellites.len(),
            hub = %hub.address,
            "all satellites registered"
        );
        Ok(DeploymentSummary {
            deployer,
            hub,
            satellites: run.satellites,
            registrations: run.registrations,
        })
    }

    async fn settle(&self) {
        let delay = self.plan.settle_delay;
        self.progress.emit(ProgressEvent::Settling { delay });
        if delay.is_zero() {
            return;
        }
        debug!(?delay, "waiting for the network to settle");
        tokio::time::sleep(delay).await;
    }
}

/// Register every satellite in `run`, in order, stopping at the first
/// failure. The failed satellite gets a `Failed` record; later ones get
/// none.
async fn register_all(ctx: &StepContext<'_>, run: &mut PartialRun) -> Result<(), RunError> {
    let Some(hub) = run.hub.clone() else {
        let err = StepError::SequencingViolation(
            "registration requested before the hub was confirmed".into(),
        );
        return Err(abort(Phase::Registration, "hub".to_string(), err, run.clone()));
    };

    let satellites: Vec<DeployedInstance> = run.satellites.clone();
    for satellite in &satellites {
        match ctx.register_satellite(&hub, satellite).await {
            Ok(record) => run.registrations.push(record),
            Err(e) => {
                let mut record = RegistrationRecord::pending(satellite, e.tx());
                record.fail();
                run.registrations.push(record);
                let item = format!("{} ({})", satellite.label, satellite.address);
                return Err(abort(Phase::Registration, item, e, std::mem::take(run)));
            }
        }
    }
    Ok(())
}

fn abort(phase: Phase, item: String, source: StepError, partial: PartialRun) -> RunError {
    RunError {
        phase,
        item,
        source,
        partial,
    }
}
