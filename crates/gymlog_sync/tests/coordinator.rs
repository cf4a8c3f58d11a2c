//! Upload coordination against an in-memory server.

use gymlog_testkit::prelude::*;
use std::sync::Arc;

type Coordinator = UploadCoordinator<Arc<FakeRemote>, Arc<ScriptedResolver>>;

fn coordinator(
    store: &TestStore,
    remote: &Arc<FakeRemote>,
    resolver: &Arc<ScriptedResolver>,
) -> Coordinator {
    UploadCoordinator::new(store.shared(), Arc::clone(remote), Arc::clone(resolver))
}

/// Brings a fresh replica to server version 3 with one synced workout.
async fn replica_at_version_3(remote: &Arc<FakeRemote>) -> (TestStore, Arc<ScriptedResolver>) {
    remote.remote_put(workout(1, "leg day"));
    remote.remote_put(measurement_set("2024-01-01", 80.0));
    remote.remote_put(measurement_set("2024-01-02", 79.5));

    let store = TestStore::in_memory();
    let resolver = Arc::new(ScriptedResolver::always(Resolution::Local));
    let outcome = coordinator(&store, remote, &resolver).pull_latest().await.unwrap();
    assert!(matches!(outcome, PullOutcome::Merged { version: 3, .. }));
    (store, resolver)
}

#[tokio::test]
async fn stale_upload_pulls_then_retries() {
    let remote = Arc::new(FakeRemote::new());
    let (store, resolver) = replica_at_version_3(&remote).await;

    store.stage_upsert(&workout(1, "leg day, heavier")).unwrap();
    remote.remote_put(measurement_set("2024-01-03", 79.0));
    assert_eq!(remote.version(), 4);

    let outcome = coordinator(&store, &remote, &resolver)
        .push_all()
        .await
        .unwrap();
    assert_eq!(outcome.pushed, 1);
    assert_eq!(outcome.pulls, 1);
    assert!(!outcome.declined);

    let route = format!("user/workout/{}", uuid(1));
    assert_eq!(
        remote.requests(),
        vec![
            Request::Pull { since: 0 },
            Request::Upload {
                route: route.clone(),
                version: 3,
                deletion: false
            },
            Request::Pull { since: 3 },
            Request::Upload {
                route,
                version: 4,
                deletion: false
            },
        ]
    );
    assert_eq!(store.version().unwrap(), 5);
    assert_eq!(remote.version(), 5);
    assert_eq!(store.staged_count().unwrap(), 0);
    assert_eq!(
        store.workout(&uuid(1)).unwrap(),
        Some(workout(1, "leg day, heavier"))
    );
    assert!(store
        .measurement_set(&date("2024-01-03"))
        .unwrap()
        .is_some());
    assert_eq!(resolver.call_count(), 0);
}

#[tokio::test]
async fn measurement_update_survives_a_version_conflict() {
    let remote = Arc::new(FakeRemote::new());
    let (store, resolver) = replica_at_version_3(&remote).await;

    let edited = measurement_set("2024-01-01", 78.2).with(MeasurementType::Height, 181.0);
    store.stage_upsert(&edited).unwrap();
    remote.remote_put(workout(2, "someone else's session"));

    let outcome = coordinator(&store, &remote, &resolver)
        .push_all()
        .await
        .unwrap();
    assert_eq!((outcome.pushed, outcome.pulls), (1, 1));
    assert_eq!(
        remote.get(EntityKind::MeasurementSet, "2024-01-01"),
        Some(RemoteEntity::MeasurementSet(edited.clone()))
    );
    assert_eq!(
        store.canonical::<MeasurementSet>(&date("2024-01-01")).unwrap(),
        Some(edited)
    );
    assert_eq!(store.version().unwrap(), 5);
}

#[tokio::test]
async fn deletions_upload_as_delete() {
    let remote = Arc::new(FakeRemote::new());
    let (store, resolver) = replica_at_version_3(&remote).await;

    store.stage_delete::<Workout>(&uuid(1)).unwrap();
    let outcome = coordinator(&store, &remote, &resolver)
        .push_all()
        .await
        .unwrap();

    assert_eq!(outcome.pushed, 1);
    assert_eq!(remote.get(EntityKind::Workout, &uuid(1).to_string()), None);
    assert!(matches!(
        remote.requests().last(),
        Some(Request::Upload { deletion: true, version: 3, .. })
    ));
    assert_eq!(store.workout(&uuid(1)).unwrap(), None);
    assert_eq!(store.staged_count().unwrap(), 0);
}

#[tokio::test]
async fn conflicting_edit_kept_locally_is_uploaded() {
    let remote = Arc::new(FakeRemote::new());
    let (store, resolver) = replica_at_version_3(&remote).await;

    store.stage_upsert(&workout(1, "mine")).unwrap();
    remote.remote_put(workout(1, "theirs"));

    let outcome = coordinator(&store, &remote, &resolver)
        .push_all()
        .await
        .unwrap();
    assert_eq!(outcome.pushed, 1);
    assert_eq!(outcome.conflicts_presented, 1);
    assert_eq!(resolver.call_count(), 1);

    let MergeConflict::Workout(conflict) = &resolver.calls()[0][0] else {
        panic!("expected a workout conflict");
    };
    assert_eq!(conflict.local, Staged::Value(workout(1, "mine")));
    assert_eq!(conflict.remote, Staged::Value(workout(1, "theirs")));
    assert_eq!(conflict.original, Staged::Value(workout(1, "leg day")));

    assert_eq!(
        remote.get(EntityKind::Workout, &uuid(1).to_string()),
        Some(RemoteEntity::Workout(workout(1, "mine")))
    );
    assert_eq!(store.version().unwrap(), 5);
}

#[tokio::test]
async fn conflicting_edit_dropped_for_remote() {
    let remote = Arc::new(FakeRemote::new());
    let (store, _) = replica_at_version_3(&remote).await;
    let resolver = Arc::new(ScriptedResolver::always(Resolution::Remote));

    store.stage_upsert(&workout(1, "mine")).unwrap();
    remote.remote_put(workout(1, "theirs"));

    let outcome = coordinator(&store, &remote, &resolver)
        .push_all()
        .await
        .unwrap();
    assert_eq!(outcome.pushed, 0);
    assert_eq!(outcome.pulls, 1);
    assert_eq!(store.workout(&uuid(1)).unwrap(), Some(workout(1, "theirs")));
    assert_eq!(store.staged_count().unwrap(), 0);
    assert_eq!(store.version().unwrap(), 4);
    assert_eq!(remote.upload_count(), 1);
}

#[tokio::test]
async fn declined_conflicts_leave_the_replica_alone() {
    let remote = Arc::new(FakeRemote::new());
    let (store, _) = replica_at_version_3(&remote).await;
    let resolver = Arc::new(ScriptedResolver::declining());

    store.stage_upsert(&workout(1, "mine")).unwrap();
    remote.remote_put(workout(1, "theirs"));

    let outcome = coordinator(&store, &remote, &resolver)
        .push_all()
        .await
        .unwrap();
    assert!(outcome.declined);
    assert_eq!(outcome.pushed, 0);
    assert_eq!(outcome.conflicts_presented, 1);
    assert_eq!(store.version().unwrap(), 3);
    assert_eq!(store.workout(&uuid(1)).unwrap(), Some(workout(1, "mine")));
    assert_eq!(
        store.canonical::<Workout>(&uuid(1)).unwrap(),
        Some(workout(1, "leg day"))
    );
    assert_eq!(store.staged_count().unwrap(), 1);
}

#[tokio::test]
async fn partial_answers_count_as_declined() {
    let remote = Arc::new(FakeRemote::new());
    let (store, _) = replica_at_version_3(&remote).await;
    let resolver = Arc::new(ScriptedResolver::scripted([Some(
        Resolutions::new().with(uuid(1).to_string(), Resolution::Local),
    )]));

    store.stage_upsert(&workout(1, "mine")).unwrap();
    store.stage_upsert(&workout(2, "also mine")).unwrap();
    remote.remote_put(workout(1, "theirs"));
    remote.remote_put(workout(2, "theirs too"));

    let outcome = coordinator(&store, &remote, &resolver)
        .pull_latest()
        .await
        .unwrap();
    assert_eq!(outcome, PullOutcome::Declined { conflicts: 2 });
    assert_eq!(store.version().unwrap(), 3);
}

#[tokio::test]
async fn conflict_retries_are_capped() {
    let remote = Arc::new(FakeRemote::new());
    let (store, resolver) = replica_at_version_3(&remote).await;
    store.stage_upsert(&workout(1, "mine")).unwrap();
    for _ in 0..3 {
        remote.fail_next_upload(Failure::Conflict);
    }

    let config = SyncConfig::default().with_max_conflict_retries(2);
    let err = coordinator(&store, &remote, &resolver)
        .with_config(&config)
        .push_all()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::ConflictRetriesExhausted { attempts: 3 }
    ));
    assert!(err.is_retryable());
    assert_eq!(remote.pull_count(), 3);
    assert_eq!(store.staged_count().unwrap(), 1);
}

#[tokio::test]
async fn refused_credentials_keep_changes_staged() {
    let remote = Arc::new(FakeRemote::new());
    let (store, resolver) = replica_at_version_3(&remote).await;
    store.stage_upsert(&workout(7, "offline")).unwrap();
    remote.fail_next_upload(Failure::Unauthenticated);

    let err = coordinator(&store, &remote, &resolver)
        .run_cycle()
        .await
        .unwrap_err();
    assert!(err.is_unauthenticated());
    assert_eq!(store.staged_count().unwrap(), 1);
    assert_eq!(store.version().unwrap(), 3);
    assert_eq!(remote.version(), 3);
}

#[tokio::test]
async fn idle_cycle_pulls_once() {
    let remote = Arc::new(FakeRemote::new());
    let (store, resolver) = replica_at_version_3(&remote).await;
    remote.remote_put(cardio_exercise(1, 10, 0, 5000));

    let report = coordinator(&store, &remote, &resolver)
        .run_cycle()
        .await
        .unwrap();
    assert_eq!(report.pushed, 0);
    assert_eq!(report.pulls, 1);
    assert_eq!(report.version, 4);
    assert_eq!(store.exercises_of_workout(&uuid(1)).unwrap().len(), 1);
}

#[tokio::test]
async fn staged_changes_drain_in_kind_order() {
    let remote = Arc::new(FakeRemote::new());
    let store = TestStore::in_memory();
    let resolver = Arc::new(ScriptedResolver::declining());

    store.stage_upsert(&lifting_exercise(5, 50, 0, 3)).unwrap();
    store.stage_upsert(&workout(5, "push day")).unwrap();
    store.stage_upsert(&measurement_set("2024-02-01", 81.0)).unwrap();

    let report = coordinator(&store, &remote, &resolver)
        .run_cycle()
        .await
        .unwrap();
    assert_eq!(report.pushed, 3);
    assert_eq!(report.version, 3);

    let routes: Vec<String> = remote
        .requests()
        .into_iter()
        .filter_map(|r| match r {
            Request::Upload { route, .. } => Some(route),
            Request::Pull { .. } => None,
        })
        .collect();
    assert_eq!(
        routes,
        vec![
            "user/measurement/2024-02-01".to_string(),
            format!("user/workout/{}", uuid(5)),
            format!("user/workout/{}/exercise/{}", uuid(5), uuid(50)),
        ]
    );
    assert_eq!(remote.entity_count(), 3);
}
