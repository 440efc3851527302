//! End-to-end persistence: snapshots written through the roadmap to sqlite
//! and recovered by a machine that never saw them in memory.

use std::sync::Arc;

use alloy::primitives::{I256, U256};
use clmm_replay::machine::roadmap::Roadmap;
use clmm_replay::storage::sqlite::SqliteSnapshotStore;
use clmm_replay::{ConfigurableCorePool, PoolConfig};

fn usdc_weth() -> PoolConfig {
    PoolConfig::new("USDC", "WETH", 3000, 60).unwrap()
}

fn spot_price() -> U256 {
    U256::from_str_radix("43efef20f018fdc58e7a5cf0416a", 16).unwrap()
}

#[tokio::test]
async fn snapshot_survives_the_database_round_trip() {
    let store = Arc::new(SqliteSnapshotStore::connect("sqlite::memory:").await.unwrap());

    let writer_roadmap = Roadmap::new();
    writer_roadmap.attach_store(store.clone());

    let mut writer = ConfigurableCorePool::with_roadmap(usdc_weth(), writer_roadmap.clone());
    writer.initialize(spot_price()).unwrap();
    writer.mint("seed", -887220, 887220, 10_860_507_277_202u128).unwrap();
    writer.swap(true, I256::exp10(6), None).unwrap();
    writer.take_snapshot("database round trip").unwrap();
    let snapshot_id = writer.persist_snapshot().await.unwrap();
    let expected = writer_roadmap
        .snapshot_in_memory(snapshot_id)
        .unwrap()
        .restore();

    // a roadmap with an empty in-memory tier must hit the store
    let reader_roadmap = Roadmap::new();
    reader_roadmap.attach_store(store);
    let mut reader = ConfigurableCorePool::with_roadmap(usdc_weth(), reader_roadmap);
    reader.recover(snapshot_id).await.unwrap();

    assert_eq!(*reader.state(), expected);
    assert_eq!(reader.state().id, snapshot_id);
}

#[tokio::test]
async fn persist_without_a_store_fails_cleanly() {
    let mut machine = ConfigurableCorePool::with_roadmap(usdc_weth(), Roadmap::new());
    machine.initialize(spot_price()).unwrap();
    machine.take_snapshot("unpersistable").unwrap();

    let state_before = machine.state().clone();
    assert!(machine.persist_snapshot().await.is_err());
    // in-memory state is unaffected by the persistence failure
    assert_eq!(*machine.state(), state_before);
}
