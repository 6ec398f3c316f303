//! Run plan — the units to deploy and the timing bounds.

use std::time::Duration;

use satlink_core::{ConfigError, DeployableUnit, Role, SatlinkConfig};

/// Grace period between hub confirmation and the first registration.
///
/// Some back-ends report inclusion before every observing node has the
/// hub's constructor state. Not exposed in satlink.toml or on the
/// command line.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(10_000);

/// Upper bound on waiting for any single receipt.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything the orchestrator needs to know before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    /// Deployed and registered in this order.
    pub satellites: Vec<DeployableUnit>,
    pub hub: DeployableUnit,
    pub settle_delay: Duration,
    pub confirmation_timeout: Duration,
}

impl RunPlan {
    pub fn new(satellites: Vec<DeployableUnit>, hub: DeployableUnit) -> Self {
        Self {
            satellites,
            hub,
            settle_delay: DEFAULT_SETTLE_DELAY,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    pub fn from_config(config: &SatlinkConfig) -> Result<Self, ConfigError> {
        let mut plan = Self::new(config.satellite_units()?, config.hub_unit());
        plan.confirmation_timeout = Duration::from_secs(config.ledger.confirmation_timeout_secs);
        plan.validate()?;
        Ok(plan)
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hub.role != Role::Hub {
            return Err(ConfigError::Invalid(format!(
                "{:?} is not a hub unit",
                self.hub.label
            )));
        }
        if let Some(unit) = self.satellites.iter().find(|u| u.role != Role::Satellite) {
            return Err(ConfigError::Invalid(format!(
                "{:?} is not a satellite unit",
                unit.label
            )));
        }
        if self.confirmation_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "confirmation timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}
