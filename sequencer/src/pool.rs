//! Wallet selection and admission.
//!
//! The pool rotates through the enabled wallets with a persisted cursor,
//! so restarts continue the rotation instead of hammering the first
//! wallet. A recurring balance refresh disables wallets that fall under
//! the funding floor and re-enables them once topped up.

use crate::chain::ChainClient;
use crate::error::SequencerError;
use crate::types::WakeKey;
use core_logic::store::{decode_json, encode_json, StateStore};
use core_logic::WakeScheduler;
use ethers::types::{Address, U256};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const CURSOR_KEY: &str = "pool:cursor";
const DISABLED_KEY: &str = "pool:disabled";

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Wallets below this balance are withheld from rotation.
    pub min_balance_wei: U256,
    /// Interval between balance sweeps.
    pub refresh_interval: Duration,
}

/// Cursor and disabled set, both lazily loaded from the store. `None`
/// means not yet consulted this process lifetime.
#[derive(Debug, Default)]
struct PoolInner {
    cursor: Option<u64>,
    disabled: Option<HashSet<Address>>,
}

pub struct WalletPool {
    /// Stable source-order listing; rotation indexes into this.
    addresses: Vec<Address>,
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn StateStore>,
    scheduler: Arc<WakeScheduler<WakeKey>>,
    config: PoolConfig,
    inner: Mutex<PoolInner>,
}

impl WalletPool {
    pub fn new(
        addresses: Vec<Address>,
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn StateStore>,
        scheduler: Arc<WakeScheduler<WakeKey>>,
        config: PoolConfig,
    ) -> Self {
        Self {
            addresses,
            chain,
            store,
            scheduler,
            config,
            inner: Mutex::new(PoolInner::default()),
        }
    }

    /// All managed addresses, enabled or not, in stable order.
    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    /// Picks the next enabled wallet in rotation and advances the cursor.
    ///
    /// Selecting a wallet also arms the recurring balance refresh; the
    /// refresh itself never re-arms, so an idle pool goes quiet.
    pub async fn next_wallet(&self) -> Result<Address, SequencerError> {
        let mut inner = self.inner.lock().await;
        self.hydrate(&mut inner).await?;

        let disabled = inner.disabled.get_or_insert_with(HashSet::new);
        let enabled: Vec<Address> = self
            .addresses
            .iter()
            .filter(|a| !disabled.contains(a))
            .copied()
            .collect();
        if enabled.is_empty() {
            return Err(SequencerError::NoWalletsAvailable);
        }

        let cursor = match inner.cursor {
            Some(c) => c,
            // First use ever: seed at a random offset so concurrent
            // deployments sharing a funder do not all start at wallet 0.
            None => rand::thread_rng().gen_range(0..enabled.len() as u64),
        };
        let chosen = enabled[(cursor % enabled.len() as u64) as usize];

        let next = cursor.wrapping_add(1);
        inner.cursor = Some(next);
        self.store
            .put(CURSOR_KEY, &encode_json(CURSOR_KEY, &next)?)
            .await?;

        self.scheduler
            .ensure_wake_after(WakeKey::PoolRefresh, self.config.refresh_interval)
            .await;

        debug!("pool: selected wallet {:#x} (cursor {})", chosen, cursor);
        Ok(chosen)
    }

    /// Rebuilds the disabled set from live balances and returns it in
    /// stable source order. Previously disabled wallets that have been
    /// topped up re-enter rotation.
    ///
    /// A wallet whose balance query fails keeps its previous status; a
    /// flaky node must not flap the whole pool.
    pub async fn refresh(&self) -> Result<Vec<Address>, SequencerError> {
        let mut inner = self.inner.lock().await;
        self.hydrate(&mut inner).await?;
        let previous = inner.disabled.get_or_insert_with(HashSet::new);

        let mut disabled = HashSet::new();
        for address in &self.addresses {
            match self.chain.balance(*address).await {
                Ok(balance) => {
                    if balance < self.config.min_balance_wei {
                        disabled.insert(*address);
                    }
                }
                Err(e) => {
                    warn!(
                        "pool: balance query for {:#x} failed, keeping previous status: {}",
                        address, e
                    );
                    if previous.contains(address) {
                        disabled.insert(*address);
                    }
                }
            }
        }

        if disabled != *previous {
            info!(
                "pool: balance sweep, {} of {} wallets disabled",
                disabled.len(),
                self.addresses.len()
            );
        }
        self.store
            .put(DISABLED_KEY, &encode_json(DISABLED_KEY, &disabled)?)
            .await?;
        let listing = self
            .addresses
            .iter()
            .filter(|a| disabled.contains(a))
            .copied()
            .collect();
        inner.disabled = Some(disabled);
        Ok(listing)
    }

    /// Currently disabled addresses, in stable source order.
    pub async fn disabled_wallets(&self) -> Result<Vec<Address>, SequencerError> {
        let mut inner = self.inner.lock().await;
        self.hydrate(&mut inner).await?;
        let disabled = inner.disabled.get_or_insert_with(HashSet::new);
        Ok(self
            .addresses
            .iter()
            .filter(|a| disabled.contains(a))
            .copied()
            .collect())
    }

    async fn hydrate(&self, inner: &mut PoolInner) -> Result<(), SequencerError> {
        if inner.cursor.is_none() {
            if let Some(raw) = self.store.get(CURSOR_KEY).await? {
                inner.cursor = Some(decode_json(CURSOR_KEY, &raw)?);
            }
        }
        if inner.disabled.is_none() {
            inner.disabled = Some(match self.store.get(DISABLED_KEY).await? {
                Some(raw) => decode_json(DISABLED_KEY, &raw)?,
                None => HashSet::new(),
            });
        }
        Ok(())
    }
}
