//! In-process development ledger.
//!
//! Behaves like a single-signer chain with instant or fixed-latency
//! blocks. Addresses are derived from the deployer and its nonce, so a
//! fresh ledger always hands out the same addresses in the same order.
//! A [`FaultPlan`] makes selected submissions fail for testing.

use std::collections::HashMap;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use satlink_core::{Address, Artifact, TxHash};

use crate::client::{
    Call, LedgerClient, LedgerError, LedgerFuture, PendingCreation, Receipt, ReceiptStatus,
};

/// Price per unit of gas, in base units (1 gwei).
pub const GAS_PRICE: u128 = 1_000_000_000;
const CREATE_BASE_GAS: u128 = 53_000;
const CREATE_BYTE_GAS: u128 = 200;
const CALL_GAS: u128 = 50_000;

/// Which submissions to sabotage. Indices are 1-based and count every
/// submission of that kind, including rejected ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Reject the k-th creation at submission.
    pub reject_creation: Option<usize>,
    /// Accept the k-th creation but never include it.
    pub stall_creation: Option<usize>,
    /// Reject the k-th call at submission.
    pub reject_call: Option<usize>,
    /// Include the k-th call with a reverted receipt.
    pub revert_call: Option<usize>,
    /// Accept the k-th call but never include it.
    pub stall_call: Option<usize>,
}

impl FaultPlan {
    pub fn reject_creation(k: usize) -> Self {
        Self {
            reject_creation: Some(k),
            ..Default::default()
        }
    }

    pub fn stall_creation(k: usize) -> Self {
        Self {
            stall_creation: Some(k),
            ..Default::default()
        }
    }

    pub fn reject_call(k: usize) -> Self {
        Self {
            reject_call: Some(k),
            ..Default::default()
        }
    }

    pub fn revert_call(k: usize) -> Self {
        Self {
            revert_call: Some(k),
            ..Default::default()
        }
    }

    pub fn stall_call(k: usize) -> Self {
        Self {
            stall_call: Some(k),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct Contract {
    name: String,
    registered: Vec<Address>,
}

#[derive(Debug)]
enum TxKind {
    Create { address: Address, name: String },
    Call { target: Address, call: Call },
}

#[derive(Debug)]
struct PendingTx {
    kind: TxKind,
    stalled: bool,
    forced_revert: bool,
    receipt: Option<Receipt>,
}

#[derive(Debug, Default)]
struct ChainState {
    nonce: u64,
    balance: u128,
    block: u64,
    creations: usize,
    calls: usize,
    contracts: HashMap<Address, Contract>,
    txs: HashMap<TxHash, PendingTx>,
}

impl ChainState {
    fn charge(&mut self, gas: u128) -> Result<(), LedgerError> {
        let fee = gas * GAS_PRICE;
        if self.balance < fee {
            return Err(LedgerError::Rejected(format!(
                "insufficient funds: balance {} < fee {fee}",
                self.balance
            )));
        }
        self.balance -= fee;
        Ok(())
    }

    /// Include `tx` in a new block and apply its effects.
    fn include(&mut self, hash: &TxHash) -> Result<Receipt, LedgerError> {
        let pending = self
            .txs
            .get(hash)
            .ok_or(LedgerError::UnknownTransaction(*hash))?;
        let outcome = if pending.forced_revert {
            Err("execution reverted".to_string())
        } else {
            match &pending.kind {
                TxKind::Create { address, name } => Ok(Effect::Create(*address, name.clone())),
                TxKind::Call { target, call } => self.check_call(target, call),
            }
        };

        self.block += 1;
        let block = self.block;
        let status = match outcome {
            Ok(Effect::Create(address, name)) => {
                self.contracts.insert(
                    address,
                    Contract {
                        name,
                        registered: Vec::new(),
                    },
                );
                ReceiptStatus::Success
            }
            Ok(Effect::Register(target, satellite)) => {
                if let Some(contract) = self.contracts.get_mut(&target) {
                    contract.registered.push(satellite);
                }
                ReceiptStatus::Success
            }
            Err(reason) => ReceiptStatus::Reverted { reason },
        };

        let receipt = Receipt {
            tx: *hash,
            block,
            status,
        };
        if let Some(pending) = self.txs.get_mut(hash) {
            pending.receipt = Some(receipt.clone());
        }
        Ok(receipt)
    }

    fn check_call(&self, target: &Address, call: &Call) -> Result<Effect, String> {
        let contract = self
            .contracts
            .get(target)
            .ok_or_else(|| format!("no contract at {target}"))?;
        if call.method != Call::REGISTER {
            return Err(format!("{} has no method {}", contract.name, call.method));
        }
        let [satellite] = call.args.as_slice() else {
            return Err(format!("register expects 1 argument, got {}", call.args.len()));
        };
        if !self.contracts.contains_key(satellite) {
            return Err(format!("{satellite} is not a contract"));
        }
        if contract.registered.contains(satellite) {
            return Err(format!("{satellite} already registered"));
        }
        Ok(Effect::Register(*target, *satellite))
    }
}

enum Effect {
    Create(Address, String),
    Register(Address, Address),
}

/// Single-signer in-memory ledger.
#[derive(Debug)]
pub struct DevLedger {
    deployer: Address,
    block_time: Duration,
    faults: FaultPlan,
    state: Mutex<ChainState>,
}

impl DevLedger {
    /// A ledger whose deployer starts with `balance`, producing a block
    /// `block_time` after each confirmation request.
    pub fn new(balance: u128, block_time: Duration) -> Self {
        let deployer =
            Address::from_digest_tail(&Sha256::digest(b"satlink-dev-deployer"));
        Self {
            deployer,
            block_time,
            faults: FaultPlan::default(),
            state: Mutex::new(ChainState {
                balance,
                ..Default::default()
            }),
        }
    }

    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self
    }

    /// Satellites registered on the contract at `hub`, in order.
    pub async fn registered(&self, hub: &Address) -> Vec<Address> {
        let state = self.state.lock().await;
        state
            .contracts
            .get(hub)
            .map(|c| c.registered.clone())
            .unwrap_or_default()
    }

    /// Number of contracts whose creation has been included.
    pub async fn contract_count(&self) -> usize {
        self.state.lock().await.contracts.len()
    }

    fn contract_address(&self, nonce: u64) -> Address {
        let mut hasher = Sha256::new();
        hasher.update(self.deployer.as_bytes());
        hasher.update(nonce.to_be_bytes());
        Address::from_digest_tail(&hasher.finalize())
    }

    fn tx_hash(&self, nonce: u64, payload: &[u8]) -> TxHash {
        let mut hasher = Sha256::new();
        hasher.update(self.deployer.as_bytes());
        hasher.update(nonce.to_be_bytes());
        hasher.update(payload);
        TxHash::from_digest_tail(&hasher.finalize())
    }
}

impl LedgerClient for DevLedger {
    fn deployer(&self) -> Address {
        self.deployer
    }

    fn balance<'a>(&'a self, account: &'a Address) -> LedgerFuture<'a, u128> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(if *account == self.deployer {
                state.balance
            } else {
                0
            })
        })
    }

    fn submit_creation<'a>(&'a self, artifact: &'a Artifact) -> LedgerFuture<'a, PendingCreation> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.creations += 1;
            let index = state.creations;

            if self.faults.reject_creation == Some(index) {
                warn!(index, contract = %artifact.contract_name, "injected creation rejection");
                return Err(LedgerError::Rejected(format!(
                    "creation #{index} refused by fault plan"
                )));
            }
            if artifact.bytecode.is_empty() {
                return Err(LedgerError::Rejected("empty init code".to_string()));
            }
            state.charge(CREATE_BASE_GAS + CREATE_BYTE_GAS * artifact.bytecode.len() as u128)?;

            let nonce = state.nonce;
            state.nonce += 1;
            let address = self.contract_address(nonce);
            let tx = self.tx_hash(nonce, &artifact.bytecode);
            state.txs.insert(
                tx,
                PendingTx {
                    kind: TxKind::Create {
                        address,
                        name: artifact.contract_name.clone(),
                    },
                    stalled: self.faults.stall_creation == Some(index),
                    forced_revert: false,
                    receipt: None,
                },
            );
            debug!(%address, %tx, nonce, contract = %artifact.contract_name, "creation accepted");
            Ok(PendingCreation { address, tx })
        })
    }

    fn submit_call<'a>(&'a self, target: &'a Address, call: &'a Call) -> LedgerFuture<'a, TxHash> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.calls += 1;
            let index = state.calls;

            if self.faults.reject_call == Some(index) {
                warn!(index, %target, %call, "injected call rejection");
                return Err(LedgerError::Rejected(format!(
                    "call #{index} refused by fault plan"
                )));
            }
            if call.method.is_empty() {
                return Err(LedgerError::Rejected("malformed call: empty method".to_string()));
            }
            state.charge(CALL_GAS)?;

            let nonce = state.nonce;
            state.nonce += 1;
            let mut payload = call.method.as_bytes().to_vec();
            payload.extend_from_slice(target.as_bytes());
            for arg in &call.args {
                payload.extend_from_slice(arg.as_bytes());
            }
            let tx = self.tx_hash(nonce, &payload);
            state.txs.insert(
                tx,
                PendingTx {
                    kind: TxKind::Call {
                        target: *target,
                        call: call.clone(),
                    },
                    stalled: self.faults.stall_call == Some(index),
                    forced_revert: self.faults.revert_call == Some(index),
                    receipt: None,
                },
            );
            debug!(%target, %call, %tx, nonce, "call accepted");
            Ok(tx)
        })
    }

    fn await_confirmation<'a>(&'a self, tx: &'a TxHash) -> LedgerFuture<'a, Receipt> {
        Box::pin(async move {
            let stalled = {
                let state = self.state.lock().await;
                let pending = state
                    .txs
                    .get(tx)
                    .ok_or(LedgerError::UnknownTransaction(*tx))?;
                if let Some(receipt) = &pending.receipt {
                    return Ok(receipt.clone());
                }
                pending.stalled
            };

            if stalled {
                debug!(%tx, "transaction stalled by fault plan");
                std::future::pending::<()>().await;
            }
            if !self.block_time.is_zero() {
                tokio::time::sleep(self.block_time).await;
            }

            let mut state = self.state.lock().await;
            if let Some(receipt) = state.txs.get(tx).and_then(|p| p.receipt.clone()) {
                return Ok(receipt);
            }
            let receipt = state.include(tx)?;
            debug!(%tx, block = receipt.block, ok = receipt.succeeded(), "transaction included");
            Ok(receipt)
        })
    }

    fn is_deployed<'a>(&'a self, address: &'a Address) -> LedgerFuture<'a, bool> {
        Box::pin(async move { Ok(self.state.lock().await.contracts.contains_key(address)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RICH: u128 = 1_000_000_000_000_000_000_000;

    fn artifact(name: &str) -> Artifact {
        Artifact {
            contract_name: name.to_string(),
            bytecode: vec![0x60, 0x80, 0x60, 0x40],
        }
    }

    async fn deploy(ledger: &DevLedger, name: &str) -> Address {
        let pending = ledger.submit_creation(&artifact(name)).await.unwrap();
        let receipt = ledger.await_confirmation(&pending.tx).await.unwrap();
        assert!(receipt.succeeded());
        pending.address
    }

    #[tokio::test]
    async fn creation_resolves_only_after_inclusion() {
        let ledger = DevLedger::new(RICH, Duration::ZERO);
        let pending = ledger.submit_creation(&artifact("Sat")).await.unwrap();
        assert!(!ledger.is_deployed(&pending.address).await.unwrap());

        let receipt = ledger.await_confirmation(&pending.tx).await.unwrap();
        assert_eq!(receipt.block, 1);
        assert!(ledger.is_deployed(&pending.address).await.unwrap());

        // A second wait returns the cached receipt.
        let again = ledger.await_confirmation(&pending.tx).await.unwrap();
        assert_eq!(again, receipt);
    }

    #[tokio::test]
    async fn addresses_are_deterministic_and_distinct() {
        let a = DevLedger::new(RICH, Duration::ZERO);
        let b = DevLedger::new(RICH, Duration::ZERO);
        let a1 = deploy(&a, "Sat").await;
        let a2 = deploy(&a, "Sat").await;
        let b1 = deploy(&b, "Sat").await;
        assert_ne!(a1, a2);
        assert_eq!(a1, b1);
        assert!(!a1.is_zero());
    }

    #[tokio::test]
    async fn register_links_satellite_once() {
        let ledger = DevLedger::new(RICH, Duration::ZERO);
        let sat = deploy(&ledger, "Sat").await;
        let hub = deploy(&ledger, "Hub").await;

        let tx = ledger.submit_call(&hub, &Call::register(sat)).await.unwrap();
        assert!(ledger.await_confirmation(&tx).await.unwrap().succeeded());
        assert_eq!(ledger.registered(&hub).await, vec![sat]);

        let tx = ledger.submit_call(&hub, &Call::register(sat)).await.unwrap();
        let receipt = ledger.await_confirmation(&tx).await.unwrap();
        assert!(matches!(
            receipt.status,
            ReceiptStatus::Reverted { ref reason } if reason.contains("already registered")
        ));
        assert_eq!(ledger.registered(&hub).await.len(), 1);
    }

    #[tokio::test]
    async fn call_to_missing_contract_reverts() {
        let ledger = DevLedger::new(RICH, Duration::ZERO);
        let nowhere = Address::from_bytes([0x42; 20]);
        let tx = ledger
            .submit_call(&nowhere, &Call::register(nowhere))
            .await
            .unwrap();
        let receipt = ledger.await_confirmation(&tx).await.unwrap();
        assert!(!receipt.succeeded());
    }

    #[tokio::test]
    async fn fees_drain_balance_until_rejection() {
        let one_call = CALL_GAS * GAS_PRICE;
        let ledger = DevLedger::new(one_call, Duration::ZERO);
        let deployer = ledger.deployer();
        let target = Address::from_bytes([1; 20]);

        ledger
            .submit_call(&target, &Call::register(target))
            .await
            .unwrap();
        assert_eq!(ledger.balance(&deployer).await.unwrap(), 0);

        let err = ledger
            .submit_call(&target, &Call::register(target))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(ref m) if m.contains("insufficient funds")));
    }

    #[tokio::test]
    async fn balance_of_other_account_is_zero() {
        let ledger = DevLedger::new(RICH, Duration::ZERO);
        let other = Address::from_bytes([9; 20]);
        assert_eq!(ledger.balance(&other).await.unwrap(), 0);
        assert_eq!(ledger.balance(&ledger.deployer()).await.unwrap(), RICH);
    }

    #[tokio::test]
    async fn injected_creation_rejection_hits_kth_only() {
        let ledger = DevLedger::new(RICH, Duration::ZERO).with_faults(FaultPlan::reject_creation(2));
        ledger.submit_creation(&artifact("A")).await.unwrap();
        assert!(ledger.submit_creation(&artifact("B")).await.is_err());
        ledger.submit_creation(&artifact("C")).await.unwrap();
    }

    #[tokio::test]
    async fn injected_revert_marks_receipt() {
        let ledger = DevLedger::new(RICH, Duration::ZERO).with_faults(FaultPlan::revert_call(1));
        let sat = deploy(&ledger, "Sat").await;
        let hub = deploy(&ledger, "Hub").await;
        let tx = ledger.submit_call(&hub, &Call::register(sat)).await.unwrap();
        assert!(!ledger.await_confirmation(&tx).await.unwrap().succeeded());
        assert!(ledger.registered(&hub).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_transaction_never_confirms() {
        let ledger = DevLedger::new(RICH, Duration::ZERO).with_faults(FaultPlan::stall_creation(1));
        let pending = ledger.submit_creation(&artifact("A")).await.unwrap();
        let waited = tokio::time::timeout(
            Duration::from_secs(3600),
            ledger.await_confirmation(&pending.tx),
        )
        .await;
        assert!(waited.is_err());
        assert!(!ledger.is_deployed(&pending.address).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn block_time_delays_inclusion() {
        let ledger = DevLedger::new(RICH, Duration::from_millis(500));
        let start = tokio::time::Instant::now();
        deploy(&ledger, "Sat").await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn unknown_transaction_is_an_error() {
        let ledger = DevLedger::new(RICH, Duration::ZERO);
        let tx = TxHash::from_bytes([5; 32]);
        assert_eq!(
            ledger.await_confirmation(&tx).await.unwrap_err(),
            LedgerError::UnknownTransaction(tx)
        );
    }
}
