//! Single steps: deploy one unit, register one satellite.
//!
//! Each step reports its own progress, including the failure event, so
//! the driving loop only has to decide whether to continue.

use std::time::Duration;

use tracing::{info, warn};

use satlink_core::{Address, DeployableUnit, DeployedInstance, RegistrationRecord, TemplateResolver, TxHash};
use satlink_ledger::{Call, LedgerClient};

use crate::confirm::wait_for_inclusion;
use crate::error::StepError;
use crate::events::{Phase, Progress, ProgressEvent};

/// Borrowed collaborators shared by every step of a run.
pub struct StepContext<'a> {
    pub ledger: &'a dyn LedgerClient,
    pub resolver: &'a dyn TemplateResolver,
    pub confirmation_timeout: Duration,
    pub progress: &'a Progress,
}

impl StepContext<'_> {
    fn failed(
        &self,
        phase: Phase,
        label: &str,
        address: Option<Address>,
        error: StepError,
    ) -> StepError {
        warn!(%phase, label, error = %error, "step failed");
        self.progress.emit(ProgressEvent::StepFailed {
            phase,
            label: label.to_string(),
            address,
            tx: error.tx(),
            error: error.to_string(),
        });
        error
    }

    /// Submit a creation for `unit`, wait for inclusion, and check the new
    /// address resolves.
    pub async fn deploy_unit(
        &self,
        phase: Phase,
        unit: &DeployableUnit,
    ) -> Result<DeployedInstance, StepError> {
        let artifact = self
            .resolver
            .resolve(&unit.template)
            .map_err(|e| self.failed(phase, &unit.label, None, e.into()))?;

        let pending = self
            .ledger
            .submit_creation(&artifact)
            .await
            .map_err(|e| self.failed(phase, &unit.label, None, StepError::Submission(e)))?;
        self.progress.emit(ProgressEvent::Submitted {
            phase,
            label: unit.label.clone(),
            tx: pending.tx,
            address: Some(pending.address),
        });

        wait_for_inclusion(self.ledger, &pending.tx, self.confirmation_timeout)
            .await
            .map_err(|e| self.failed(phase, &unit.label, Some(pending.address), e))?;

        let resolvable = self
            .ledger
            .is_deployed(&pending.address)
            .await
            .map_err(|e| self.failed(phase, &unit.label, Some(pending.address), StepError::Query(e)))?;
        if !resolvable {
            let err = StepError::NotResolvable {
                address: pending.address,
                tx: pending.tx,
            };
            return Err(self.failed(phase, &unit.label, Some(pending.address), err));
        }

        info!(
            %phase,
            label = %unit.label,
            address = %pending.address,
            tx = %pending.tx,
            template = %unit.template,
            "deployed"
        );
        self.progress.emit(ProgressEvent::Deployed {
            phase,
            label: unit.label.clone(),
            address: pending.address,
            tx: pending.tx,
        });
        Ok(DeployedInstance::new(unit, pending.address, pending.tx))
    }

    /// Call `register(satellite)` on `hub` and wait for inclusion.
    pub async fn register_satellite(
        &self,
        hub: &DeployedInstance,
        satellite: &DeployedInstance,
    ) -> Result<RegistrationRecord, StepError> {
        let phase = Phase::Registration;
        let call = Call::register(satellite.address);

        let tx: TxHash = self
            .ledger
            .submit_call(&hub.address, &call)
            .await
            .map_err(|e| {
                self.failed(phase, &satellite.label, Some(satellite.address), StepError::Submission(e))
            })?;
        self.progress.emit(ProgressEvent::Submitted {
            phase,
            label: satellite.label.clone(),
            tx,
            address: Some(satellite.address),
        });
        let mut record = RegistrationRecord::pending(satellite, Some(tx));

        wait_for_inclusion(self.ledger, &tx, self.confirmation_timeout)
            .await
            .map_err(|e| self.failed(phase, &satellite.label, Some(satellite.address), e))?;
        record.confirm();

        info!(
            label = %satellite.label,
            satellite = %satellite.address,
            hub = %hub.address,
            %tx,
            "registered"
        );
        self.progress.emit(ProgressEvent::Registered {
            label: satellite.label.clone(),
            satellite: satellite.address,
            tx,
        });
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satlink_core::{ArtifactError, BuiltinTemplates, RegistrationStatus, Role};
    use satlink_ledger::{DevLedger, FaultPlan};

    const RICH: u128 = u128::MAX / 2;

    struct NoTemplates;

    impl TemplateResolver for NoTemplates {
        fn resolve(&self, template: &str) -> Result<satlink_core::Artifact, ArtifactError> {
            Err(ArtifactError::InvalidTemplate(template.to_string()))
        }
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn deploy_unit_emits_submitted_then_deployed() {
        let ledger = DevLedger::new(RICH, Duration::ZERO);
        let (progress, mut rx) = Progress::channel();
        let ctx = StepContext {
            ledger: &ledger,
            resolver: &BuiltinTemplates,
            confirmation_timeout: Duration::from_secs(5),
            progress: &progress,
        };
        let unit = DeployableUnit::satellite("GameOutcomeAggregator", "Game 1", "G1");

        let instance = ctx.deploy_unit(Phase::SatelliteDeployment, &unit).await.unwrap();
        assert_eq!(instance.role, Role::Satellite);
        assert_eq!(instance.label, "Game 1");
        assert!(ledger.is_deployed(&instance.address).await.unwrap());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ProgressEvent::Submitted { address: Some(a), .. } if *a == instance.address));
        assert!(matches!(&events[1], ProgressEvent::Deployed { label, .. } if label == "Game 1"));
    }

    #[tokio::test]
    async fn unresolvable_template_reports_failure() {
        let ledger = DevLedger::new(RICH, Duration::ZERO);
        let (progress, mut rx) = Progress::channel();
        let ctx = StepContext {
            ledger: &ledger,
            resolver: &NoTemplates,
            confirmation_timeout: Duration::from_secs(5),
            progress: &progress,
        };
        let unit = DeployableUnit::hub("Missing", "Hub", "HUB");

        let err = ctx.deploy_unit(Phase::HubDeployment, &unit).await.unwrap_err();
        assert!(matches!(err, StepError::Template(_)));
        let events = drain(&mut rx);
        assert!(matches!(
            &events[..],
            [ProgressEvent::StepFailed { phase: Phase::HubDeployment, label, tx: None, .. }] if label == "Hub"
        ));
        assert_eq!(ledger.contract_count().await, 0);
    }

    #[tokio::test]
    async fn register_satellite_confirms_record() {
        let ledger = DevLedger::new(RICH, Duration::ZERO);
        let progress = Progress::disabled();
        let ctx = StepContext {
            ledger: &ledger,
            resolver: &BuiltinTemplates,
            confirmation_timeout: Duration::from_secs(5),
            progress: &progress,
        };
        let sat = ctx
            .deploy_unit(
                Phase::SatelliteDeployment,
                &DeployableUnit::satellite("Sat", "A", "A"),
            )
            .await
            .unwrap();
        let hub = ctx
            .deploy_unit(Phase::HubDeployment, &DeployableUnit::hub("Hub", "Hub", "HUB"))
            .await
            .unwrap();

        let record = ctx.register_satellite(&hub, &sat).await.unwrap();
        assert_eq!(record.status, RegistrationStatus::Confirmed);
        assert_eq!(record.satellite, sat.address);
        assert!(record.tx.is_some());
        assert_eq!(ledger.registered(&hub.address).await, vec![sat.address]);
    }

    #[tokio::test]
    async fn reverted_registration_carries_tx() {
        let ledger = DevLedger::new(RICH, Duration::ZERO).with_faults(FaultPlan::revert_call(1));
        let (progress, mut rx) = Progress::channel();
        let ctx = StepContext {
            ledger: &ledger,
            resolver: &BuiltinTemplates,
            confirmation_timeout: Duration::from_secs(5),
            progress: &progress,
        };
        let sat = ctx
            .deploy_unit(
                Phase::SatelliteDeployment,
                &DeployableUnit::satellite("Sat", "A", "A"),
            )
            .await
            .unwrap();
        let hub = ctx
            .deploy_unit(Phase::HubDeployment, &DeployableUnit::hub("Hub", "Hub", "HUB"))
            .await
            .unwrap();
        drain(&mut rx);

        let err = ctx.register_satellite(&hub, &sat).await.unwrap_err();
        assert!(matches!(err, StepError::Reverted { .. }));
        let events = drain(&mut rx);
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::StepFailed { phase: Phase::Registration, tx: Some(_), .. })
        ));
    }
}
