//! Top-level facade wiring the pool, registry, and scheduler together.

use crate::actor::ActorConfig;
use crate::chain::ChainClient;
use crate::error::{SequencerError, ValidationError};
use crate::pool::{PoolConfig, WalletPool};
use crate::registry::WalletRegistry;
use crate::types::{SubmitRequest, SubmitResponse, TransactionView, WakeKey, WalletStatus};
use core_logic::store::StateStore;
use core_logic::{SequencerConfig, WakeScheduler};
use ethers::types::{Address, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Wake-ups waiting for dispatch; deliveries block the scheduler loop
/// only if this backs up.
const WAKE_CHANNEL_CAPACITY: usize = 256;

pub struct Sequencer {
    pool: Arc<WalletPool>,
    registry: Arc<WalletRegistry>,
    shutdown: CancellationToken,
}

impl Sequencer {
    /// Wires up the pool, registry, and scheduler, and spawns the wake-up
    /// dispatch loop. The returned handle is cheap to clone via `Arc`.
    pub fn start(
        config: &SequencerConfig,
        addresses: Vec<Address>,
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn StateStore>,
    ) -> Result<Arc<Self>, SequencerError> {
        let min_balance_wei = U256::from_dec_str(&config.min_balance_wei).map_err(|_| {
            ValidationError::InvalidAmount {
                field: "min_balance_wei",
                value: config.min_balance_wei.clone(),
            }
        })?;

        let (scheduler, wake_rx) = WakeScheduler::new(WAKE_CHANNEL_CAPACITY);
        let shutdown = CancellationToken::new();

        let pool = Arc::new(WalletPool::new(
            addresses,
            Arc::clone(&chain),
            Arc::clone(&store),
            Arc::clone(&scheduler),
            PoolConfig {
                min_balance_wei,
                refresh_interval: Duration::from_millis(config.balance_refresh_ms),
            },
        ));
        let registry = Arc::new(WalletRegistry::new(
            chain,
            store,
            Arc::clone(&scheduler),
            ActorConfig {
                max_in_flight: config.max_in_flight,
                poll_interval: Duration::from_millis(config.poll_interval_ms),
                default_gas_limit: U256::from(config.default_gas_limit),
            },
        ));

        tokio::spawn(Arc::clone(&scheduler).run(shutdown.clone()));
        tokio::spawn(dispatch_loop(
            wake_rx,
            Arc::clone(&pool),
            Arc::clone(&registry),
            shutdown.clone(),
        ));

        info!(
            "sequencer started: {} wallets, max {} in flight",
            pool.addresses().len(),
            config.max_in_flight
        );
        Ok(Arc::new(Self {
            pool,
            registry,
            shutdown,
        }))
    }

    /// Queues a transaction on `wallet`, or on the pool's next wallet in
    /// rotation when none is named.
    pub async fn submit(
        &self,
        wallet: Option<Address>,
        request: &SubmitRequest,
    ) -> Result<(Address, SubmitResponse), SequencerError> {
        let address = match wallet {
            Some(address) => {
                if !self.pool.addresses().contains(&address) {
                    return Err(SequencerError::UnknownWallet {
                        address: format!("{:#x}", address),
                    });
                }
                address
            }
            None => self.pool.next_wallet().await?,
        };

        let actor = self.registry.get_or_create(address).await;
        let response = actor.submit(request).await?;
        Ok((address, response))
    }

    pub async fn status(&self, address: Address) -> Result<WalletStatus, SequencerError> {
        self.registry.get_or_create(address).await.status().await
    }

    pub async fn transaction(
        &self,
        address: Address,
        nonce: u64,
    ) -> Result<TransactionView, SequencerError> {
        self.registry
            .get_or_create(address)
            .await
            .transaction(nonce)
            .await
    }

    pub fn addresses(&self) -> &[Address] {
        self.pool.addresses()
    }

    pub async fn disabled_wallets(&self) -> Result<Vec<Address>, SequencerError> {
        self.pool.disabled_wallets().await
    }

    /// Immediate balance sweep, outside the recurring schedule. Returns
    /// the resulting disabled set.
    pub async fn refresh_pool(&self) -> Result<Vec<Address>, SequencerError> {
        self.pool.refresh().await
    }

    pub async fn next_wallet(&self) -> Result<Address, SequencerError> {
        self.pool.next_wallet().await
    }

    /// Stops the scheduler and dispatch loop. Queued but unsubmitted
    /// transactions are durable and resume on the next start.
    pub fn shutdown(&self) {
        info!("sequencer shutting down");
        self.shutdown.cancel();
    }
}

/// Fans incoming wake-ups out to independent tasks, so a slow wallet
/// never delays another wallet's processing or the balance sweep.
async fn dispatch_loop(
    mut wake_rx: mpsc::Receiver<WakeKey>,
    pool: Arc<WalletPool>,
    registry: Arc<WalletRegistry>,
    shutdown: CancellationToken,
) {
    loop {
        let key = tokio::select! {
            _ = shutdown.cancelled() => break,
            key = wake_rx.recv() => match key {
                Some(key) => key,
                None => break,
            },
        };

        match key {
            WakeKey::Wallet(address) => {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let actor = registry.get_or_create(address).await;
                    if let Err(e) = actor.process_queue().await {
                        error!("wallet {:#x}: queue processing failed: {}", address, e);
                    }
                });
            }
            WakeKey::PoolRefresh => {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move {
                    if let Err(e) = pool.refresh().await {
                        warn!("pool: balance sweep failed: {}", e);
                    }
                });
            }
        }
    }
}
