//! Actor registry.
//!
//! One [`WalletActor`] per address for the life of the process. Creation
//! is double-checked under the registry lock so two concurrent callers
//! for the same fresh wallet always land on the same actor.

use crate::actor::{ActorConfig, WalletActor};
use crate::chain::ChainClient;
use crate::types::WakeKey;
use core_logic::store::StateStore;
use core_logic::WakeScheduler;
use ethers::types::Address;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

pub struct WalletRegistry {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn StateStore>,
    scheduler: Arc<WakeScheduler<WakeKey>>,
    config: ActorConfig,
    actors: RwLock<HashMap<Address, Arc<WalletActor>>>,
}

impl WalletRegistry {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn StateStore>,
        scheduler: Arc<WakeScheduler<WakeKey>>,
        config: ActorConfig,
    ) -> Self {
        Self {
            chain,
            store,
            scheduler,
            config,
            actors: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the actor for `address`, creating it on first use.
    pub async fn get_or_create(&self, address: Address) -> Arc<WalletActor> {
        {
            let actors = self.actors.read().await;
            if let Some(actor) = actors.get(&address) {
                return Arc::clone(actor);
            }
        }

        let mut actors = self.actors.write().await;
        // Another task may have created it between the two locks.
        if let Some(actor) = actors.get(&address) {
            return Arc::clone(actor);
        }

        debug!("registry: creating actor for {:#x}", address);
        let actor = Arc::new(WalletActor::new(
            address,
            Arc::clone(&self.chain),
            Arc::clone(&self.store),
            Arc::clone(&self.scheduler),
            self.config,
        ));
        actors.insert(address, Arc::clone(&actor));
        actor
    }

    /// The actor for `address` if one has been created.
    pub async fn get(&self, address: Address) -> Option<Arc<WalletActor>> {
        self.actors.read().await.get(&address).map(Arc::clone)
    }
}
