//! Per-wallet nonce sequencing.
//!
//! One [`WalletActor`] owns a wallet's nonce watermarks and its
//! append-only transaction records. Every operation serializes on the
//! actor's own mutex, so assignment, queue processing, and bootstrap can
//! never interleave for the same wallet, while different wallets proceed
//! fully independently.
//!
//! # Lifecycle
//!
//! `submit` assigns the next dense nonce and persists state plus record in
//! one batch before returning. A recurring wake-up then drives
//! `process_queue`, which refreshes the confirmed watermark, submits
//! records strictly in nonce order within the in-flight budget, and
//! resolves failures: transient ones defer the whole remainder to the
//! next wake-up, non-retriable ones consume the nonce with a zero-value
//! self-transfer so the sequence stays gapless.

use crate::abi;
use crate::chain::{ChainClient, TxParams};
use crate::error::{SequencerError, ValidationError};
use crate::types::{
    NonceState, SubmitRequest, SubmitResponse, TransactionRecord, TransactionView, TxStatus,
    WakeKey, WalletStatus,
};
use chrono::Utc;
use core_logic::store::{decode_json, encode_json, StateStore};
use core_logic::WakeScheduler;
use ethers::types::{Address, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct ActorConfig {
    /// Cap on submitted-but-unconfirmed transactions.
    pub max_in_flight: u64,
    /// Fixed interval between processing wake-ups.
    pub poll_interval: Duration,
    /// Applied when a submission does not name a gas limit.
    pub default_gas_limit: U256,
}

pub struct WalletActor {
    address: Address,
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn StateStore>,
    scheduler: Arc<WakeScheduler<WakeKey>>,
    config: ActorConfig,
    /// Cached watermarks; the persisted copy under `nonce:{address}` is
    /// authoritative across restarts. Guards every mutating operation.
    state: Mutex<Option<NonceState>>,
}

fn nonce_key(address: &Address) -> String {
    format!("nonce:{:#x}", address)
}

fn tx_key(address: &Address, nonce: u64) -> String {
    format!("tx:{:#x}:{}", address, nonce)
}

impl WalletActor {
    pub fn new(
        address: Address,
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn StateStore>,
        scheduler: Arc<WakeScheduler<WakeKey>>,
        config: ActorConfig,
    ) -> Self {
        Self {
            address,
            chain,
            store,
            scheduler,
            config,
            state: Mutex::new(None),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Validates the request, assigns the next nonce, and durably persists
    /// the new watermarks together with the record before returning.
    ///
    /// Downstream chain conditions never fail a submission; the only chain
    /// interaction here is the one-time bootstrap of a fresh wallet.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, SequencerError> {
        let to_raw = request.to.as_deref().ok_or(ValidationError::MissingTo)?;
        let to: Address = to_raw.parse().map_err(|_| ValidationError::InvalidTo {
            value: to_raw.to_string(),
        })?;
        let data = abi::derive_calldata(request)?;
        let value = parse_decimal(request.value.as_deref(), "value")?.unwrap_or_default();
        let gas_limit = parse_decimal(request.gas_limit.as_deref(), "gasLimit")?
            .unwrap_or(self.config.default_gas_limit);

        let mut guard = self.state.lock().await;
        if guard.is_none() {
            *guard = Some(self.load_or_bootstrap().await?);
        }
        let state = guard
            .as_mut()
            .ok_or_else(|| self.uninitialized())?;

        let nonce = state.assign();
        let record = TransactionRecord {
            to,
            value,
            data,
            gas_limit,
            hash: None,
            error: None,
            created_at: Utc::now().timestamp_millis(),
        };

        let state_key = nonce_key(&self.address);
        let record_key = tx_key(&self.address, nonce);
        self.store
            .put_batch(&[
                (state_key.clone(), encode_json(&state_key, state)?),
                (record_key.clone(), encode_json(&record_key, &record)?),
            ])
            .await?;

        self.scheduler
            .ensure_wake_after(WakeKey::Wallet(self.address), self.config.poll_interval)
            .await;

        debug!(
            "wallet {:#x}: queued nonce {} -> {:#x}",
            self.address, nonce, to
        );
        Ok(SubmitResponse {
            nonce,
            status: TxStatus::Pending,
        })
    }

    /// Drives the sequence forward; invoked by the wallet's wake-up.
    pub async fn process_queue(&self) -> Result<(), SequencerError> {
        let mut guard = self.state.lock().await;
        if guard.is_none() {
            *guard = self.load().await?;
        }
        let Some(state) = guard.as_mut() else {
            debug!("wallet {:#x}: wake with no nonce state", self.address);
            return Ok(());
        };

        // Step 1: refresh the confirmed watermark; it never regresses.
        match self.chain.confirmed_count(self.address).await {
            Ok(count) => {
                let confirmed = count as i64 - 1;
                if confirmed > state.confirmed_nonce {
                    state.confirmed_nonce = confirmed;
                }
                // The ledger confirming past our submitted watermark means
                // the local copy is behind (restart mid-loop); lift it so
                // the window math stays sound.
                if state.confirmed_nonce > state.submitted_nonce {
                    state.submitted_nonce = state.confirmed_nonce;
                }
            }
            Err(e) => {
                warn!(
                    "wallet {:#x}: confirmed-count query failed, deferring: {}",
                    self.address, e
                );
                self.reschedule_if_pending(state).await;
                return Ok(());
            }
        }

        // Step 2: the submission window under the in-flight cap.
        let budget = self.config.max_in_flight.saturating_sub(state.in_flight());
        let window_end = std::cmp::min(
            state.submitted_nonce + budget as i64,
            state.pending_nonce as i64 - 1,
        );

        // Step 3: strictly increasing order; never advance past a failure
        // that is still unresolved.
        while state.submitted_nonce < window_end {
            let nonce = (state.submitted_nonce + 1) as u64;
            let record_key = tx_key(&self.address, nonce);
            let raw = self.store.get(&record_key).await?.ok_or_else(|| {
                SequencerError::Store(core_logic::StoreError::Corrupt {
                    key: record_key.clone(),
                    msg: "missing transaction record inside the submission window".to_string(),
                })
            })?;
            let mut record: TransactionRecord = decode_json(&record_key, &raw)?;

            let params = TxParams {
                from: self.address,
                to: record.to,
                value: record.value,
                data: record.data.clone(),
                gas_limit: record.gas_limit,
            };

            match self.chain.submit(&params, nonce).await {
                Ok(hash) => {
                    record.hash = Some(hash);
                    state.submitted_nonce = nonce as i64;
                    self.persist_progress(state, &record_key, &record).await?;
                    debug!("wallet {:#x}: submitted nonce {} ({:#x})", self.address, nonce, hash);
                }
                Err(e) if e.is_transient() => {
                    debug!(
                        "wallet {:#x}: nonce {} deferred to next wake-up: {}",
                        self.address, nonce, e
                    );
                    break;
                }
                Err(e) => {
                    // Consume the nonce with a zero-value self-transfer;
                    // the ledger demands a gapless sequence per sender.
                    let skip = TxParams::self_transfer(self.address);
                    match self.chain.submit(&skip, nonce).await {
                        Ok(hash) => {
                            record.hash = Some(hash);
                            record.error = Some(format!("skipped: {}", e));
                            state.submitted_nonce = nonce as i64;
                            self.persist_progress(state, &record_key, &record).await?;
                            warn!(
                                "wallet {:#x}: nonce {} skipped via self-transfer: {}",
                                self.address, nonce, e
                            );
                        }
                        Err(skip_err) => {
                            warn!(
                                "wallet {:#x}: skip for nonce {} failed, retrying next wake-up: {}",
                                self.address, nonce, skip_err
                            );
                            break;
                        }
                    }
                }
            }
        }

        // Step 4: persist watermarks and keep polling while work remains.
        let state_key = nonce_key(&self.address);
        self.store
            .put(&state_key, &encode_json(&state_key, state)?)
            .await?;
        self.reschedule_if_pending(state).await;
        Ok(())
    }

    /// Watermarks and derived queue counters.
    pub async fn status(&self) -> Result<WalletStatus, SequencerError> {
        let mut guard = self.state.lock().await;
        if guard.is_none() {
            *guard = self.load().await?;
        }
        guard
            .map(WalletStatus::from)
            .ok_or_else(|| self.uninitialized())
    }

    /// The record for `nonce`, with its derived status.
    pub async fn transaction(&self, nonce: u64) -> Result<TransactionView, SequencerError> {
        let record_key = tx_key(&self.address, nonce);
        let raw = self.store.get(&record_key).await?.ok_or_else(|| {
            SequencerError::TransactionNotFound {
                address: format!("{:#x}", self.address),
                nonce,
            }
        })?;
        let record: TransactionRecord = decode_json(&record_key, &raw)?;

        let mut guard = self.state.lock().await;
        if guard.is_none() {
            *guard = self.load().await?;
        }
        let confirmed = guard.map(|s| s.confirmed_nonce).unwrap_or(-1);
        Ok(TransactionView::new(nonce, record, confirmed))
    }

    async fn load(&self) -> Result<Option<NonceState>, SequencerError> {
        let key = nonce_key(&self.address);
        match self.store.get(&key).await? {
            Some(raw) => Ok(Some(decode_json(&key, &raw)?)),
            None => Ok(None),
        }
    }

    /// First-submission bootstrap. The store-level exclusive section plus
    /// a re-read after acquiring it guarantee the chain's confirmed count
    /// is consulted exactly once per wallet, even across instances.
    async fn load_or_bootstrap(&self) -> Result<NonceState, SequencerError> {
        if let Some(state) = self.load().await? {
            return Ok(state);
        }

        let _section = self
            .store
            .lock_exclusive(&format!("init:{:#x}", self.address))
            .await;
        if let Some(state) = self.load().await? {
            return Ok(state);
        }

        let count = self
            .chain
            .confirmed_count(self.address)
            .await
            .map_err(|e| SequencerError::Bootstrap {
                address: format!("{:#x}", self.address),
                message: e.to_string(),
            })?;
        let state = NonceState::bootstrap(count);

        let key = nonce_key(&self.address);
        self.store.put(&key, &encode_json(&key, &state)?).await?;
        info!(
            "wallet {:#x}: nonce state seeded at confirmed count {}",
            self.address, count
        );
        Ok(state)
    }

    async fn persist_progress(
        &self,
        state: &NonceState,
        record_key: &str,
        record: &TransactionRecord,
    ) -> Result<(), SequencerError> {
        let state_key = nonce_key(&self.address);
        self.store
            .put_batch(&[
                (state_key.clone(), encode_json(&state_key, state)?),
                (record_key.to_string(), encode_json(record_key, record)?),
            ])
            .await?;
        Ok(())
    }

    async fn reschedule_if_pending(&self, state: &NonceState) {
        if state.confirmed_nonce < state.pending_nonce as i64 - 1 {
            self.scheduler
                .ensure_wake_after(WakeKey::Wallet(self.address), self.config.poll_interval)
                .await;
        }
    }

    fn uninitialized(&self) -> SequencerError {
        SequencerError::UninitializedWallet {
            address: format!("{:#x}", self.address),
        }
    }
}

fn parse_decimal(
    raw: Option<&str>,
    field: &'static str,
) -> Result<Option<U256>, ValidationError> {
    match raw {
        None => Ok(None),
        Some(raw) => U256::from_dec_str(raw)
            .map(Some)
            .map_err(|_| ValidationError::InvalidAmount {
                field,
                value: raw.to_string(),
            }),
    }
}
