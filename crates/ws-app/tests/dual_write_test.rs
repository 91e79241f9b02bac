mod common;

use std::time::Duration;

use common::TestEnv;
use serde_json::json;
use ws_app::SaveOutcome;
use ws_core::{EntityType, LocalId, NotificationKind, RemoteId, SyncState};
use ws_infra::FaultMode;

fn diary() -> EntityType {
    EntityType::from("food_diary")
}

#[tokio::test(start_paused = true)]
async fn dual_write_test_hanging_remote_times_out_to_failed() {
    let env = TestEnv::new();
    env.gateway.set_fault(FaultMode::Hang);
    let sync = env.synchronizer();

    let pending = sync.save(diary(), LocalId::from("x"), json!({"a": 1}));
    assert_eq!(pending.record().sync_state, SyncState::PendingRemote);
    let visible = sync.get(&diary(), &LocalId::from("x")).expect("visible immediately");
    assert_eq!(visible.sync_state, SyncState::PendingRemote);
    assert_eq!(visible.payload, json!({"a": 1}));

    let started = tokio::time::Instant::now();
    let outcome = pending.settled().await;
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert!(matches!(outcome, SaveOutcome::Applied(SyncState::FailedRemote { .. })));

    let record = sync.get(&diary(), &LocalId::from("x")).unwrap();
    assert!(record.sync_state.is_failed());
    assert!(record.remote_id().is_none());
    assert_eq!(record.payload, json!({"a": 1}));
}

#[tokio::test(start_paused = true)]
async fn dual_write_test_record_visible_before_remote_resolves() {
    let env = TestEnv::new();
    env.gateway.set_latency(Duration::from_secs(2));
    let sync = env.synchronizer();

    let ok = sync.save(diary(), LocalId::from("ok"), json!({"kcal": 200}));
    assert!(sync.get(&diary(), &LocalId::from("ok")).is_some());
    assert!(matches!(
        ok.settled().await,
        SaveOutcome::Applied(SyncState::Synced { .. })
    ));

    env.gateway.set_fault(FaultMode::Unavailable);
    let failing = sync.save(diary(), LocalId::from("ko"), json!({"kcal": 300}));
    assert!(sync.get(&diary(), &LocalId::from("ko")).is_some());
    assert!(matches!(
        failing.settled().await,
        SaveOutcome::Applied(SyncState::FailedRemote { .. })
    ));
}

#[tokio::test]
async fn dual_write_test_outage_keeps_all_writes_readable() {
    let mut env = TestEnv::new();
    env.gateway.set_fault(FaultMode::Unavailable);
    let sync = env.synchronizer();

    let pending: Vec<_> = (0..10)
        .map(|i| sync.save(diary(), LocalId::from(format!("entry-{i}")), json!({"i": i})))
        .collect();
    for save in pending {
        save.settled().await;
    }

    let records = sync.records(&diary());
    assert_eq!(records.len(), 10);
    assert!(records.iter().all(|r| r.sync_state.is_failed()));

    // a fresh session sees the same ten records from the local mirror
    let reloaded = env.synchronizer();
    assert_eq!(reloaded.load(&diary()), 10);
    assert!(reloaded.records(&diary()).iter().all(|r| r.sync_state.is_failed()));

    let notifications = env.drain_notifications();
    assert_eq!(TestEnv::count_kind(&notifications, NotificationKind::Warning), 10);
    assert_eq!(TestEnv::count_kind(&notifications, NotificationKind::Error), 0);
}

#[tokio::test(start_paused = true)]
async fn dual_write_test_stale_response_is_discarded() {
    let env = TestEnv::new();
    env.gateway.set_latency(Duration::from_secs(1));
    let sync = env.synchronizer();

    let first = sync.save(diary(), LocalId::from("x"), json!({"v": 1}));
    let second = sync.save(diary(), LocalId::from("x"), json!({"v": 2}));

    assert_eq!(first.settled().await, SaveOutcome::Superseded);
    assert!(matches!(second.settled().await, SaveOutcome::Applied(_)));
    let record = sync.get(&diary(), &LocalId::from("x")).unwrap();
    assert_eq!(record.payload, json!({"v": 2}));
    assert!(record.sync_state.is_synced());
}

#[tokio::test]
async fn dual_write_test_resync_and_delete() {
    let env = TestEnv::new();
    env.gateway.set_fault(FaultMode::Unavailable);
    let sync = env.synchronizer();
    sync.save(diary(), LocalId::from("a"), json!({"kcal": 1}))
        .settled()
        .await;
    sync.save(diary(), LocalId::from("b"), json!({"kcal": 2}))
        .settled()
        .await;

    env.gateway.set_fault(FaultMode::Healthy);
    let retries = sync.resync_failed(&diary());
    assert_eq!(retries.len(), 2);
    for retry in retries {
        retry.settled().await;
    }
    assert!(sync.records(&diary()).iter().all(|r| r.sync_state.is_synced()));
    assert_eq!(env.gateway.record_count(&diary()), 2);

    let remote_id: RemoteId = sync
        .get(&diary(), &LocalId::from("a"))
        .and_then(|r| r.remote_id().cloned())
        .unwrap();
    let delete = sync.delete(&diary(), &LocalId::from("a"));
    assert!(delete.removed());
    assert_eq!(delete.settled().await, Ok(()));
    assert!(sync.get(&diary(), &LocalId::from("a")).is_none());
    assert_eq!(env.gateway.record_count(&diary()), 1);
    assert!(!remote_id.as_str().is_empty());

    let missing = sync.delete(&diary(), &LocalId::from("nope"));
    assert!(!missing.removed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dual_write_test_concurrent_saves_leave_a_complete_mirror() {
    let env = TestEnv::new();
    let sync = env.synchronizer();

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let sync = sync.clone();
            tokio::spawn(async move {
                let pending: Vec<_> = (0..25)
                    .map(|i| {
                        sync.save(diary(), LocalId::from(format!("w{w}-{i}")), json!({"i": i}))
                    })
                    .collect();
                for save in pending {
                    save.settled().await;
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    assert!(!env.persistence.is_degraded());
    let mirrored = env.stored("onboarding:user-1:records:food_diary").unwrap();
    let mirrored = mirrored.as_array().unwrap();
    assert_eq!(mirrored.len(), 100);
    assert!(mirrored.iter().all(|r| r["syncState"] == "synced"));

    let reloaded = env.synchronizer();
    assert_eq!(reloaded.load(&diary()), 100);
    assert!(reloaded.records(&diary()).iter().all(|r| r.sync_state.is_synced()));
}
