//! Bounded wait for transaction inclusion.

use std::time::Duration;

use tracing::{debug, warn};

use satlink_core::TxHash;
use satlink_ledger::{LedgerClient, Receipt, ReceiptStatus};

use crate::error::StepError;

/// Wait until `tx` is included with a successful receipt.
///
/// The ledger's own wait is unbounded; `timeout` caps it. A reverted
/// receipt is a failure just like a timeout.
pub async fn wait_for_inclusion(
    ledger: &dyn LedgerClient,
    tx: &TxHash,
    timeout: Duration,
) -> Result<Receipt, StepError> {
    let receipt = match tokio::time::timeout(timeout, ledger.await_confirmation(tx)).await {
        Ok(Ok(receipt)) => receipt,
        Ok(Err(source)) => return Err(StepError::Confirmation { tx: *tx, source }),
        Err(_) => {
            warn!(%tx, ?timeout, "confirmation timed out");
            return Err(StepError::ConfirmationTimeout { tx: *tx, timeout });
        }
    };

    match &receipt.status {
        ReceiptStatus::Success => {
            debug!(%tx, block = receipt.block, "confirmed");
            Ok(receipt)
        }
        ReceiptStatus::Reverted { reason } => Err(StepError::Reverted {
            tx: *tx,
            reason: reason.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satlink_core::Artifact;
    use satlink_ledger::{Call, DevLedger, FaultPlan, LedgerError};

    const RICH: u128 = u128::MAX / 2;

    fn artifact() -> Artifact {
        Artifact {
            contract_name: "Sat".into(),
            bytecode: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn returns_successful_receipt() {
        let ledger = DevLedger::new(RICH, Duration::ZERO);
        let pending = ledger.submit_creation(&artifact()).await.unwrap();
        let receipt = wait_for_inclusion(&ledger, &pending.tx, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(receipt.tx, pending.tx);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_transaction_times_out() {
        let ledger = DevLedger::new(RICH, Duration::ZERO).with_faults(FaultPlan::stall_creation(1));
        let pending = ledger.submit_creation(&artifact()).await.unwrap();
        let err = wait_for_inclusion(&ledger, &pending.tx, Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::ConfirmationTimeout { tx, .. } if tx == pending.tx));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_block_beyond_bound_times_out() {
        let ledger = DevLedger::new(RICH, Duration::from_secs(90));
        let pending = ledger.submit_creation(&artifact()).await.unwrap();
        let err = wait_for_inclusion(&ledger, &pending.tx, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::ConfirmationTimeout { .. }));
    }

    #[tokio::test]
    async fn reverted_receipt_is_an_error() {
        let ledger = DevLedger::new(RICH, Duration::ZERO);
        let target = satlink_core::Address::from_bytes([7; 20]);
        let tx = ledger.submit_call(&target, &Call::register(target)).await.unwrap();
        let err = wait_for_inclusion(&ledger, &tx, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::Reverted { ref reason, .. } if reason.contains("no contract")));
    }

    #[tokio::test]
    async fn unknown_transaction_surfaces_ledger_error() {
        let ledger = DevLedger::new(RICH, Duration::ZERO);
        let tx = TxHash::from_bytes([4; 32]);
        let err = wait_for_inclusion(&ledger, &tx, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StepError::Confirmation {
                source: LedgerError::UnknownTransaction(_),
                ..
            }
        ));
    }
}
