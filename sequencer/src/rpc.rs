//! Ethers-backed [`ChainClient`].
//!
//! One `SignerMiddleware` per managed wallet, all sharing a single HTTP
//! provider. Submissions set the nonce explicitly and return as soon as
//! the node accepts the transaction; confirmation is observed later
//! through `confirmed_count`.

use crate::chain::{ChainClient, ChainError, TxParams};
use crate::error::KeyError;
use crate::keys::KeyStore;
use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use std::collections::HashMap;
use std::fmt;

pub struct EthersChainClient {
    provider: Provider<Http>,
    signers: HashMap<Address, SignerMiddleware<Provider<Http>, LocalWallet>>,
}

impl EthersChainClient {
    pub fn new(rpc_url: &str, keys: &KeyStore) -> Result<Self, KeyError> {
        let provider = Provider::<Http>::try_from(rpc_url).map_err(|e| KeyError::Io {
            path: rpc_url.to_string(),
            msg: e.to_string(),
        })?;

        let mut signers = HashMap::new();
        for address in keys.addresses() {
            // KeyStore guarantees a signer for every listed address.
            if let Some(wallet) = keys.signer(address) {
                signers.insert(
                    *address,
                    SignerMiddleware::new(provider.clone(), wallet.clone()),
                );
            }
        }

        Ok(Self { provider, signers })
    }

    fn classify(err: impl fmt::Display) -> ChainError {
        ChainError::from_text(err.to_string())
    }
}

#[async_trait]
impl ChainClient for EthersChainClient {
    async fn confirmed_count(&self, address: Address) -> Result<u64, ChainError> {
        self.provider
            .get_transaction_count(address, Some(BlockNumber::Latest.into()))
            .await
            .map(|n| n.as_u64())
            .map_err(Self::classify)
    }

    async fn submit(&self, params: &TxParams, nonce: u64) -> Result<H256, ChainError> {
        let client = self.signers.get(&params.from).ok_or_else(|| {
            ChainError::non_retriable(format!("no signer for {:#x}", params.from))
        })?;

        let tx: TypedTransaction = Eip1559TransactionRequest::new()
            .from(params.from)
            .to(params.to)
            .value(params.value)
            .data(params.data.clone())
            .gas(params.gas_limit)
            .nonce(nonce)
            .into();

        let pending = client
            .send_transaction(tx, None)
            .await
            .map_err(Self::classify)?;

        Ok(pending.tx_hash())
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(Self::classify)
    }
}
