//! Shared test doubles for the integration suites.
#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use sequencer::chain::{ChainClient, ChainError, TxParams};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// One accepted submission, in acceptance order.
#[derive(Debug, Clone)]
pub struct Submission {
    pub nonce: u64,
    pub params: TxParams,
    pub hash: H256,
}

#[derive(Default)]
struct MockInner {
    confirmed: HashMap<Address, u64>,
    balances: HashMap<Address, U256>,
    balance_errors: HashMap<Address, ChainError>,
    /// Scripted failures per (sender, nonce); one entry is popped per
    /// attempt, so a skip attempt at the same nonce sees the next entry.
    failure_plans: HashMap<(Address, u64), VecDeque<ChainError>>,
    confirmed_errors: HashMap<Address, VecDeque<ChainError>>,
    submissions: Vec<Submission>,
    confirmed_queries: HashMap<Address, u64>,
    next_hash: u64,
}

/// Scriptable in-memory chain. Submissions succeed unless a failure has
/// been planned for that (sender, nonce) attempt.
#[derive(Default)]
pub struct MockChainClient {
    inner: Mutex<MockInner>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_confirmed_count(&self, address: Address, count: u64) {
        self.inner.lock().unwrap().confirmed.insert(address, count);
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.inner.lock().unwrap().balances.insert(address, balance);
        self.inner.lock().unwrap().balance_errors.remove(&address);
    }

    pub fn fail_balance(&self, address: Address, err: ChainError) {
        self.inner
            .lock()
            .unwrap()
            .balance_errors
            .insert(address, err);
    }

    /// Queues `err` for the next `confirmed_count` query for `address`.
    pub fn plan_confirmed_error(&self, address: Address, err: ChainError) {
        self.inner
            .lock()
            .unwrap()
            .confirmed_errors
            .entry(address)
            .or_default()
            .push_back(err);
    }

    /// Queues `err` for the next submission attempt at (address, nonce).
    pub fn plan_failure(&self, address: Address, nonce: u64, err: ChainError) {
        self.inner
            .lock()
            .unwrap()
            .failure_plans
            .entry((address, nonce))
            .or_default()
            .push_back(err);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.inner.lock().unwrap().submissions.clone()
    }

    pub fn submissions_for(&self, address: Address) -> Vec<Submission> {
        self.submissions()
            .into_iter()
            .filter(|s| s.params.from == address)
            .collect()
    }

    /// How many times `confirmed_count` has been queried for `address`.
    pub fn confirmed_query_count(&self, address: Address) -> u64 {
        self.inner
            .lock()
            .unwrap()
            .confirmed_queries
            .get(&address)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn confirmed_count(&self, address: Address) -> Result<u64, ChainError> {
        let mut inner = self.inner.lock().unwrap();
        *inner.confirmed_queries.entry(address).or_insert(0) += 1;
        if let Some(plan) = inner.confirmed_errors.get_mut(&address) {
            if let Some(err) = plan.pop_front() {
                return Err(err);
            }
        }
        Ok(inner.confirmed.get(&address).copied().unwrap_or(0))
    }

    async fn submit(&self, params: &TxParams, nonce: u64) -> Result<H256, ChainError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(plan) = inner.failure_plans.get_mut(&(params.from, nonce)) {
            if let Some(err) = plan.pop_front() {
                return Err(err);
            }
        }
        inner.next_hash += 1;
        let hash = H256::from_low_u64_be(inner.next_hash);
        inner.submissions.push(Submission {
            nonce,
            params: params.clone(),
            hash,
        });
        Ok(hash)
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        let inner = self.inner.lock().unwrap();
        if let Some(err) = inner.balance_errors.get(&address) {
            return Err(err.clone());
        }
        Ok(inner.balances.get(&address).copied().unwrap_or_default())
    }
}

pub fn test_address(n: u64) -> Address {
    Address::from_low_u64_be(n)
}
