//! Pool rotation and balance-based admission.

mod common;

use common::{test_address, MockChainClient};
use core_logic::{MemoryStore, WakeScheduler};
use ethers::types::{Address, U256};
use sequencer::chain::ChainError;
use sequencer::{PoolConfig, SequencerError, WakeKey, WalletPool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const MIN_BALANCE: u64 = 1_000;

struct Harness {
    chain: Arc<MockChainClient>,
    store: Arc<MemoryStore>,
    scheduler: Arc<WakeScheduler<WakeKey>>,
    pool: WalletPool,
}

fn wallets(n: u64) -> Vec<Address> {
    (1..=n).map(test_address).collect()
}

fn harness(addresses: Vec<Address>) -> Harness {
    let chain = Arc::new(MockChainClient::new());
    let store = Arc::new(MemoryStore::new());
    let (scheduler, _rx) = WakeScheduler::new(64);
    for address in &addresses {
        chain.set_balance(*address, U256::from(MIN_BALANCE * 10));
    }
    let pool = WalletPool::new(
        addresses,
        chain.clone(),
        store.clone(),
        scheduler.clone(),
        PoolConfig {
            min_balance_wei: U256::from(MIN_BALANCE),
            refresh_interval: Duration::from_millis(50),
        },
    );
    Harness {
        chain,
        store,
        scheduler,
        pool,
    }
}

fn rebuild_pool(h: &Harness, addresses: Vec<Address>) -> WalletPool {
    WalletPool::new(
        addresses,
        h.chain.clone(),
        h.store.clone(),
        h.scheduler.clone(),
        PoolConfig {
            min_balance_wei: U256::from(MIN_BALANCE),
            refresh_interval: Duration::from_millis(50),
        },
    )
}

#[tokio::test]
async fn test_rotation_is_fair() {
    let h = harness(wallets(3));

    let mut picks: HashMap<Address, u64> = HashMap::new();
    for _ in 0..9 {
        let address = h.pool.next_wallet().await.unwrap();
        *picks.entry(address).or_insert(0) += 1;
    }

    assert_eq!(picks.len(), 3);
    for address in wallets(3) {
        assert_eq!(picks[&address], 3, "uneven picks for {:#x}", address);
    }
}

#[tokio::test]
async fn test_cursor_survives_restart() {
    let h = harness(wallets(3));
    let first = h.pool.next_wallet().await.unwrap();

    // A new pool over the same store continues the rotation instead of
    // re-seeding it.
    let pool = rebuild_pool(&h, wallets(3));
    let second = pool.next_wallet().await.unwrap();
    let third = pool.next_wallet().await.unwrap();

    let mut all = vec![first, second, third];
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 3, "restart repeated a wallet within one cycle");
}

#[tokio::test]
async fn test_underfunded_wallets_leave_rotation() {
    let h = harness(wallets(3));
    h.chain.set_balance(test_address(2), U256::from(MIN_BALANCE - 1));

    let disabled = h.pool.refresh().await.unwrap();
    assert_eq!(disabled, vec![test_address(2)]);
    assert_eq!(h.pool.disabled_wallets().await.unwrap(), vec![test_address(2)]);

    for _ in 0..10 {
        assert_ne!(h.pool.next_wallet().await.unwrap(), test_address(2));
    }
}

#[tokio::test]
async fn test_topped_up_wallet_rejoins() {
    let h = harness(wallets(2));
    h.chain.set_balance(test_address(1), U256::zero());
    h.pool.refresh().await.unwrap();
    assert_eq!(h.pool.disabled_wallets().await.unwrap(), vec![test_address(1)]);

    h.chain
        .set_balance(test_address(1), U256::from(MIN_BALANCE));
    h.pool.refresh().await.unwrap();
    assert!(h.pool.disabled_wallets().await.unwrap().is_empty());

    let mut seen = vec![
        h.pool.next_wallet().await.unwrap(),
        h.pool.next_wallet().await.unwrap(),
    ];
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 2);
}

#[tokio::test]
async fn test_all_disabled_is_an_error() {
    let h = harness(wallets(2));
    for address in wallets(2) {
        h.chain.set_balance(address, U256::zero());
    }
    h.pool.refresh().await.unwrap();

    let err = h.pool.next_wallet().await.unwrap_err();
    assert!(matches!(err, SequencerError::NoWalletsAvailable));
}

#[tokio::test]
async fn test_balance_query_failure_keeps_previous_status() {
    let h = harness(wallets(3));
    h.chain.set_balance(test_address(2), U256::zero());
    h.pool.refresh().await.unwrap();
    assert_eq!(h.pool.disabled_wallets().await.unwrap(), vec![test_address(2)]);

    // Node flakes on both a disabled and an enabled wallet; neither
    // changes status.
    h.chain
        .fail_balance(test_address(2), ChainError::transient("timeout"));
    h.chain
        .fail_balance(test_address(3), ChainError::transient("timeout"));
    h.pool.refresh().await.unwrap();

    assert_eq!(h.pool.disabled_wallets().await.unwrap(), vec![test_address(2)]);
}

#[tokio::test]
async fn test_disabled_set_survives_restart() {
    let h = harness(wallets(3));
    h.chain.set_balance(test_address(1), U256::zero());
    h.pool.refresh().await.unwrap();

    let pool = rebuild_pool(&h, wallets(3));
    assert_eq!(pool.disabled_wallets().await.unwrap(), vec![test_address(1)]);
    for _ in 0..6 {
        assert_ne!(pool.next_wallet().await.unwrap(), test_address(1));
    }
}

#[tokio::test]
async fn test_only_selection_arms_the_refresh() {
    let h = harness(wallets(2));

    h.pool.refresh().await.unwrap();
    assert!(h
        .scheduler
        .scheduled_for(&WakeKey::PoolRefresh)
        .await
        .is_none());

    h.pool.next_wallet().await.unwrap();
    assert!(h
        .scheduler
        .scheduled_for(&WakeKey::PoolRefresh)
        .await
        .is_some());
}
