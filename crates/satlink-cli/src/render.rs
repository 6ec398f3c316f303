//! Human-readable progress and summary formatting.

use satlink_core::{DeploymentSummary, RegistrationStatus, Role};
use satlink_rollout::{Phase, ProgressEvent, RunError};

const RULE_WIDTH: usize = 60;

pub fn format_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Preflight { deployer, balance } => {
            let phase = Phase::Preflight;
            format!("[{phase}] Deploying with account: {deployer}\n[{phase}] Account balance: {balance}")
        }
        ProgressEvent::PhaseStarted { phase, items } => match phase {
            Phase::SatelliteDeployment => format!("\n📦 Deploying {items} satellite(s)..."),
            Phase::HubDeployment => "\n📦 Deploying hub...".to_string(),
            Phase::Registration => format!("\n📋 Registering {items} satellite(s) with the hub..."),
            other => format!("\n▶ {other}"),
        },
        ProgressEvent::Submitted {
            phase,
            label,
            tx,
            address,
        } => match address {
            Some(address) if *phase != Phase::Registration => {
                format!("  [{phase}] {label}: submitted {tx} (address {address})")
            }
            Some(address) => format!("  [{phase}] {label}: submitted {tx} for {address}"),
            None => format!("  [{phase}] {label}: submitted {tx}"),
        },
        ProgressEvent::Deployed {
            phase,
            label,
            address,
            tx,
        } => format!("✅ [{phase}] {label} deployed to {address} (tx {tx})"),
        ProgressEvent::Settling { delay } => {
            format!(
                "\n⏳ [{}] Waiting {:.1}s for the network to settle...",
                Phase::Settlement,
                delay.as_secs_f64()
            )
        }
        ProgressEvent::Registered {
            label,
            satellite,
            tx,
        } => format!("✅ [{}] {label} registered: {satellite} (tx {tx})", Phase::Registration),
        ProgressEvent::StepFailed {
            phase,
            label,
            address,
            tx,
            error,
        } => {
            let mut line = format!("❌ [{phase}] {label} failed");
            if let Some(address) = address {
                line.push_str(&format!(" (address {address})"));
            }
            if let Some(tx) = tx {
                line.push_str(&format!(" (tx {tx})"));
            }
            line.push_str(&format!(": {error}"));
            line
        }
    }
}

pub fn format_summary(summary: &DeploymentSummary) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    out.push_str("\n\n🎉 DEPLOYMENT COMPLETE!\n\n");
    out.push_str(&format!("{rule}\n"));
    out.push_str("\n📋 CONTRACT ADDRESSES:\n\n");
    out.push_str(&format!("{} ({}): {}\n", summary.hub.label, Role::Hub.label(), summary.hub.address));

    if !summary.satellites.is_empty() {
        out.push_str("\nSatellites:\n");
        for s in &summary.satellites {
            out.push_str(&format!("  {}: {}\n", s.label, s.address));
        }
    }

    out.push_str("\n\n📝 CONFIGURATION VALUES:\n\n");
    for line in summary.env_lines() {
        out.push_str(&format!("{line}\n"));
    }

    out.push_str(&format!("\n{rule}\n"));
    out.push_str(&format!(
        "\n✅ All {} satellite(s) are registered with {}.\n",
        summary.registrations.len(),
        summary.hub.label
    ));
    out
}

/// What is left on the ledger after a failed run.
pub fn format_failure(err: &RunError) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let partial = &err.partial;
    let mut out = String::new();

    out.push_str(&format!("\n\n❌ RUN ABORTED during {}\n\n", err.phase));
    out.push_str(&format!("{rule}\n"));

    if let Some(hub) = &partial.hub {
        out.push_str(&format!("\n{} ({}): {}\n", hub.label, Role::Hub.label(), hub.address));
    } else {
        out.push_str("\nHub: not deployed\n");
    }

    if partial.satellites.is_empty() {
        out.push_str("\nSatellites: none deployed\n");
    } else {
        out.push_str("\nSatellites deployed:\n");
        for s in &partial.satellites {
            let state = partial
                .registrations
                .iter()
                .find(|r| r.satellite == s.address)
                .map(|r| match r.status {
                    RegistrationStatus::Confirmed => "registered",
                    RegistrationStatus::Failed => "failed to register",
                    RegistrationStatus::Pending => "pending",
                })
                .unwrap_or("unregistered");
            out.push_str(&format!("  {}: {} ({state})\n", s.label, s.address));
        }
    }

    out.push_str(&format!("\n{rule}\n"));
    out
}
