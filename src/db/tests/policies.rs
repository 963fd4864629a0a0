//! Shared tests for PolicyRepo implementations

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::{
    db::{StorageError, repos::PolicyRepo},
    models::ChannelPolicy,
};

// ============================================================================
// Test Input Helpers
// ============================================================================

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn policy(channel_id: &str, timeout_hours: f64, next_check_at: DateTime<Utc>) -> ChannelPolicy {
    ChannelPolicy {
        channel_id: channel_id.to_string(),
        timeout_hours,
        last_activity_at: base_time(),
        next_check_at,
    }
}

// ============================================================================
// Read Tests
// ============================================================================

async fn test_get_missing_is_none(repo: &dyn PolicyRepo) {
    let result = repo.get("nope").await.expect("get should succeed");
    assert!(result.is_none());
}

async fn test_upsert_then_get(repo: &dyn PolicyRepo) {
    let p = policy("100", 2.5, base_time() + Duration::hours(1));
    repo.upsert(&p).await.expect("upsert should succeed");

    let fetched = repo.get("100").await.unwrap().expect("policy should exist");
    assert_eq!(fetched, p);
}

async fn test_get_due_is_strict(repo: &dyn PolicyRepo) {
    let now = base_time();
    repo.upsert(&policy("past", 1.0, now - Duration::seconds(1)))
        .await
        .unwrap();
    repo.upsert(&policy("exact", 1.0, now)).await.unwrap();
    repo.upsert(&policy("future", 1.0, now + Duration::hours(1)))
        .await
        .unwrap();

    let due = repo.get_due(now).await.expect("get_due should succeed");
    let ids: Vec<_> = due.iter().map(|p| p.channel_id.as_str()).collect();
    assert_eq!(ids, vec!["past"]);
}

async fn test_get_due_ordered_by_next_check(repo: &dyn PolicyRepo) {
    let now = base_time();
    repo.upsert(&policy("b", 1.0, now - Duration::minutes(1)))
        .await
        .unwrap();
    repo.upsert(&policy("a", 1.0, now - Duration::hours(1)))
        .await
        .unwrap();

    let due = repo.get_due(now).await.unwrap();
    let ids: Vec<_> = due.iter().map(|p| p.channel_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

async fn test_list_all(repo: &dyn PolicyRepo) {
    assert!(repo.list_all().await.unwrap().is_empty());

    repo.upsert(&policy("2", 1.0, base_time())).await.unwrap();
    repo.upsert(&policy("1", 1.0, base_time() + Duration::days(3)))
        .await
        .unwrap();

    let all = repo.list_all().await.unwrap();
    let ids: Vec<_> = all.iter().map(|p| p.channel_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);
}

// ============================================================================
// Write Tests
// ============================================================================

async fn test_upsert_last_write_wins(repo: &dyn PolicyRepo) {
    repo.upsert(&policy("100", 2.0, base_time())).await.unwrap();
    repo.upsert(&policy("100", 6.0, base_time() + Duration::hours(6)))
        .await
        .unwrap();

    let fetched = repo.get("100").await.unwrap().unwrap();
    assert_eq!(fetched.timeout_hours, 6.0);
    assert_eq!(fetched.next_check_at, base_time() + Duration::hours(6));
    assert_eq!(repo.list_all().await.unwrap().len(), 1);
}

async fn test_upsert_rejects_invalid_timeout(repo: &dyn PolicyRepo) {
    let err = repo
        .upsert(&policy("100", 0.0, base_time()))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Validation(_)), "got {err:?}");
    assert!(repo.get("100").await.unwrap().is_none());
}

async fn test_upsert_rejects_out_of_range_timeout(repo: &dyn PolicyRepo) {
    for hours in [0.1, 720.5, 1.0e10] {
        let err = repo
            .upsert(&policy("100", hours, base_time()))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)), "got {err:?}");
    }
    assert!(repo.get("100").await.unwrap().is_none());

    // Both ends of the range are allowed.
    repo.upsert(&policy("min", 0.15, base_time())).await.unwrap();
    repo.upsert(&policy("max", 720.0, base_time())).await.unwrap();
}

async fn test_upsert_batch_writes_all(repo: &dyn PolicyRepo) {
    let batch = vec![
        policy("1", 1.0, base_time()),
        policy("2", 2.0, base_time()),
        policy("3", 3.0, base_time()),
    ];
    let written = repo.upsert_batch(&batch).await.unwrap();
    assert_eq!(written, 3);
    assert_eq!(repo.list_all().await.unwrap(), batch);
}

async fn test_upsert_batch_empty(repo: &dyn PolicyRepo) {
    assert_eq!(repo.upsert_batch(&[]).await.unwrap(), 0);
}

async fn test_upsert_batch_is_atomic(repo: &dyn PolicyRepo) {
    let original = policy("1", 1.0, base_time());
    repo.upsert(&original).await.unwrap();

    let batch = vec![
        policy("1", 9.0, base_time() + Duration::hours(9)),
        policy("2", 2.0, base_time()),
        policy("3", 1.0e10, base_time()),
    ];
    let err = repo.upsert_batch(&batch).await.unwrap_err();
    assert!(matches!(err, StorageError::Validation(_)), "got {err:?}");

    // Nothing from the failed batch is visible.
    assert_eq!(repo.get("1").await.unwrap(), Some(original));
    assert!(repo.get("2").await.unwrap().is_none());
}

async fn test_reschedule_batch_writes_schedule_only(repo: &dyn PolicyRepo) {
    repo.upsert(&policy("1", 2.0, base_time())).await.unwrap();

    let mut rescheduled = policy("1", 9.0, base_time() + Duration::hours(2));
    rescheduled.last_activity_at = base_time() + Duration::minutes(5);
    let updated = repo.reschedule_batch(&[rescheduled]).await.unwrap();
    assert_eq!(updated, 1);

    let fetched = repo.get("1").await.unwrap().unwrap();
    assert_eq!(fetched.timeout_hours, 2.0);
    assert_eq!(fetched.last_activity_at, base_time() + Duration::minutes(5));
    assert_eq!(fetched.next_check_at, base_time() + Duration::hours(2));
}

async fn test_reschedule_batch_skips_deleted_rows(repo: &dyn PolicyRepo) {
    repo.upsert(&policy("kept", 1.0, base_time())).await.unwrap();

    let batch = vec![
        policy("kept", 1.0, base_time() + Duration::hours(1)),
        policy("gone", 1.0, base_time() + Duration::hours(1)),
    ];
    assert_eq!(repo.reschedule_batch(&batch).await.unwrap(), 1);
    assert!(repo.get("gone").await.unwrap().is_none());
    assert_eq!(repo.list_all().await.unwrap().len(), 1);

    assert_eq!(repo.reschedule_batch(&[]).await.unwrap(), 0);
}

async fn test_delete_is_idempotent(repo: &dyn PolicyRepo) {
    repo.upsert(&policy("100", 1.0, base_time())).await.unwrap();

    assert!(repo.delete("100").await.unwrap());
    assert!(!repo.delete("100").await.unwrap());
    assert!(repo.get("100").await.unwrap().is_none());
}

async fn test_delete_batch(repo: &dyn PolicyRepo) {
    for id in ["1", "2", "3"] {
        repo.upsert(&policy(id, 1.0, base_time())).await.unwrap();
    }

    let removed = repo
        .delete_batch(&["1".to_string(), "3".to_string(), "missing".to_string()])
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let remaining = repo.list_all().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].channel_id, "2");

    assert_eq!(repo.delete_batch(&[]).await.unwrap(), 0);
}

async fn test_delete_batch_large(repo: &dyn PolicyRepo) {
    let batch: Vec<_> = (0..1200)
        .map(|i| policy(&i.to_string(), 1.0, base_time()))
        .collect();
    repo.upsert_batch(&batch).await.unwrap();

    let ids: Vec<_> = batch.iter().map(|p| p.channel_id.clone()).collect();
    assert_eq!(repo.delete_batch(&ids).await.unwrap(), 1200);
    assert!(repo.list_all().await.unwrap().is_empty());
}

// ============================================================================
// Concurrency Tests
// ============================================================================

async fn test_concurrent_readers_and_writers(repo: Arc<dyn PolicyRepo>) {
    let mut handles = Vec::new();
    for i in 0..20 {
        let repo = Arc::clone(&repo);
        handles.push(tokio::spawn(async move {
            let id = (i % 5).to_string();
            repo.upsert(&policy(&id, (i + 1) as f64, base_time()))
                .await
                .unwrap();
            repo.get_due(base_time() + Duration::seconds(1)).await.unwrap();
            repo.get(&id).await.unwrap()
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().is_some());
    }
    assert_eq!(repo.list_all().await.unwrap().len(), 5);
}

// ============================================================================
// SQLite Tests
// ============================================================================

mod sqlite_tests {
    use super::*;
    use crate::{
        config::RetentionConfig, db::tests::harness::create_db_pool, models::TimeoutBounds,
    };

    fn bounds() -> TimeoutBounds {
        RetentionConfig::default().timeout_bounds()
    }

    macro_rules! sqlite_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let db = create_db_pool().await;
                let repo = db.policies();
                super::$name(repo.as_ref()).await;
            }
        };
    }

    sqlite_test!(test_get_missing_is_none);
    sqlite_test!(test_upsert_then_get);
    sqlite_test!(test_get_due_is_strict);
    sqlite_test!(test_get_due_ordered_by_next_check);
    sqlite_test!(test_list_all);
    sqlite_test!(test_upsert_last_write_wins);
    sqlite_test!(test_upsert_rejects_invalid_timeout);
    sqlite_test!(test_upsert_rejects_out_of_range_timeout);
    sqlite_test!(test_upsert_batch_writes_all);
    sqlite_test!(test_upsert_batch_empty);
    sqlite_test!(test_upsert_batch_is_atomic);
    sqlite_test!(test_reschedule_batch_writes_schedule_only);
    sqlite_test!(test_reschedule_batch_skips_deleted_rows);
    sqlite_test!(test_delete_is_idempotent);
    sqlite_test!(test_delete_batch);
    sqlite_test!(test_delete_batch_large);

    #[tokio::test]
    async fn test_concurrent_readers_and_writers() {
        let db = create_db_pool().await;
        super::test_concurrent_readers_and_writers(db.policies()).await;
    }

    #[tokio::test]
    async fn test_health_check() {
        let db = create_db_pool().await;
        db.health_check().await.expect("health check should pass");
    }

    #[tokio::test]
    async fn test_from_config_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("channels.db");
        let config = crate::config::DatabaseConfig {
            path: path.to_string_lossy().into_owned(),
            ..Default::default()
        };

        let db = crate::db::DbPool::from_config(&config, bounds()).await.unwrap();
        db.run_migrations().await.unwrap();
        db.policies()
            .upsert(&policy("1", 1.0, base_time()))
            .await
            .unwrap();
        db.close().await;

        assert!(path.exists());

        let reopened = crate::db::DbPool::from_config(&config, bounds()).await.unwrap();
        reopened.run_migrations().await.unwrap();
        assert!(reopened.policies().get("1").await.unwrap().is_some());
    }
}
