//! Schema synchronizer integration tests
//!
//! Runs the synchronizer against an in-memory catalog and the in-process
//! engine.

use std::sync::Arc;
use std::time::Duration;

use signalhouse_core::RetryPolicy;
use signalhouse_metadata::{
    AssetConfig, AssetStatus, CategoryConfig, MetadataError, MetadataStore, SignalConfig, SignalDataType,
    SqliteMetadataStore,
};
use signalhouse_schema::{SchemaSynchronizer, SyncAction, SyncError};
use signalhouse_tsdb::{ColumnType, MemoryTsdb, TsdbClient, TsdbError};

struct Harness {
    metadata: Arc<SqliteMetadataStore>,
    engine: Arc<MemoryTsdb>,
    sync: SchemaSynchronizer,
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        attempt_timeout: Duration::from_secs(5),
    }
}

async fn harness() -> Harness {
    let metadata = Arc::new(SqliteMetadataStore::new_in_memory().await.unwrap());
    let engine = Arc::new(MemoryTsdb::new());
    let sync = SchemaSynchronizer::new(metadata.clone(), engine.clone())
        .with_retry_policy(fast_policy());
    Harness {
        metadata,
        engine,
        sync,
    }
}

async fn create_category(h: &Harness, code: &str) {
    h.metadata
        .create_category(CategoryConfig {
            code: code.to_string(),
            name: code.to_string(),
            industry: None,
            database: "plant".to_string(),
            stable_prefix: "raw".to_string(),
        })
        .await
        .unwrap();
}

async fn add_signal(h: &Harness, category: &str, code: &str, data_type: SignalDataType, order: i32) {
    let mut config = SignalConfig::stored(category, code, data_type);
    config.display_order = order;
    h.metadata.add_signal(config).await.unwrap();
}

fn asset(category: &str, code: &str) -> AssetConfig {
    AssetConfig {
        category_code: category.to_string(),
        code: code.to_string(),
        name: code.to_string(),
        attributes: Default::default(),
        status: AssetStatus::Active,
    }
}

/// Category `motor` with `current` (numeric) and `status` (string).
async fn motor(h: &Harness) {
    create_category(h, "motor").await;
    add_signal(h, "motor", "current", SignalDataType::Numeric, 1).await;
    add_signal(h, "motor", "status", SignalDataType::String, 2).await;
}

#[tokio::test]
async fn test_motor_scenario() {
    let h = harness().await;
    motor(&h).await;

    let result = h.sync.sync_category_schema("motor").await.unwrap();
    assert_eq!(result.action, SyncAction::Created);
    assert_eq!(result.super_table, "raw_motor");
    assert_eq!(result.added, vec!["current", "status"]);

    let schema = h.engine.describe("plant", "raw_motor").await.unwrap().unwrap();
    let columns: Vec<_> = schema
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.column_type))
        .collect();
    assert_eq!(
        columns,
        vec![
            ("ts", ColumnType::Timestamp),
            ("current", ColumnType::Double),
            ("status", ColumnType::Varchar(256)),
        ]
    );
    let tags: Vec<_> = schema.tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tags, vec!["asset_id", "asset_code"]);

    let created = h.sync.provision_asset(asset("motor", "MOTOR001")).await.unwrap();
    assert_eq!(created.child_table.as_deref(), Some("raw_motor_MOTOR001"));

    let child = h
        .engine
        .child_table("plant", "raw_motor_MOTOR001")
        .await
        .unwrap();
    assert_eq!(child.stable, "raw_motor");
    assert_eq!(child.tags, vec![created.id.to_string(), "MOTOR001".to_string()]);

    let category = h.metadata.get_category("motor").await.unwrap().unwrap();
    assert_eq!(category.schema_fingerprint.as_deref(), Some(result.fingerprint.as_str()));
    assert!(category.last_synced_at.is_some());
}

#[tokio::test]
async fn test_second_sync_issues_no_ddl() {
    let h = harness().await;
    motor(&h).await;

    h.sync.sync_category_schema("motor").await.unwrap();
    let statements = h.engine.statements().await.len();
    let describes = h.engine.describe_calls();

    let second = h.sync.sync_category_schema("motor").await.unwrap();
    assert_eq!(second.action, SyncAction::Unchanged);
    assert!(second.statements.is_empty());
    assert_eq!(h.engine.statements().await.len(), statements);
    assert_eq!(h.engine.describe_calls(), describes);

    // A forced resync inspects the engine but still changes nothing
    let forced = h.sync.resync_category_schema("motor").await.unwrap();
    assert_eq!(forced.action, SyncAction::Unchanged);
    assert_eq!(h.engine.statements().await.len(), statements);
    assert!(h.engine.describe_calls() > describes);
}

#[tokio::test]
async fn test_added_signal_becomes_column() {
    let h = harness().await;
    motor(&h).await;
    h.sync.sync_category_schema("motor").await.unwrap();

    add_signal(&h, "motor", "voltage", SignalDataType::Numeric, 3).await;
    let result = h.sync.sync_category_schema("motor").await.unwrap();
    assert_eq!(result.action, SyncAction::Altered);
    assert_eq!(result.added, vec!["voltage"]);
    assert_eq!(
        result.statements,
        vec!["ALTER STABLE `plant`.`raw_motor` ADD COLUMN `voltage` DOUBLE".to_string()]
    );

    let schema = h.engine.describe("plant", "raw_motor").await.unwrap().unwrap();
    assert_eq!(schema.column("voltage").unwrap().column_type, ColumnType::Double);
}

#[tokio::test]
async fn test_widening_applied() {
    let h = harness().await;
    create_category(&h, "pump").await;
    add_signal(&h, "pump", "rpm", SignalDataType::Integer, 0).await;
    h.sync.sync_category_schema("pump").await.unwrap();

    h.metadata
        .update_signal(SignalConfig::stored("pump", "rpm", SignalDataType::Numeric))
        .await
        .unwrap();
    let result = h.sync.sync_category_schema("pump").await.unwrap();
    assert_eq!(result.widened, vec!["rpm"]);

    let schema = h.engine.describe("plant", "raw_pump").await.unwrap().unwrap();
    assert_eq!(schema.column("rpm").unwrap().column_type, ColumnType::Double);
}

#[tokio::test]
async fn test_incompatible_signal_reported_without_aborting() {
    let h = harness().await;
    motor(&h).await;
    let first = h.sync.sync_category_schema("motor").await.unwrap();

    // Drift introduced outside the catalog
    h.engine
        .execute("ALTER STABLE `plant`.`raw_motor` ADD COLUMN `mode` BOOL")
        .await
        .unwrap();

    add_signal(&h, "motor", "mode", SignalDataType::Integer, 3).await;
    add_signal(&h, "motor", "voltage", SignalDataType::Numeric, 4).await;

    let result = h.sync.sync_category_schema("motor").await.unwrap();
    assert_eq!(result.added, vec!["voltage"]);
    assert_eq!(result.rejected.len(), 1);
    assert_eq!(result.rejected[0].signal, "mode");
    assert!(!result.is_complete());

    // The recorded fingerprint still describes the last clean sync
    let category = h.metadata.get_category("motor").await.unwrap().unwrap();
    assert_eq!(category.schema_fingerprint.as_deref(), Some(first.fingerprint.as_str()));

    let err = result.ensure_complete().unwrap_err();
    assert!(matches!(
        err,
        SyncError::Schema { signal: Some(ref s), .. } if s == "mode"
    ));
}

#[tokio::test]
async fn test_child_table_requires_super_table() {
    let h = harness().await;
    motor(&h).await;

    let err = h
        .sync
        .ensure_child_table("motor", "MOTOR001", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Precondition { .. }));

    h.sync.sync_category_schema("motor").await.unwrap();
    assert!(h.sync.ensure_child_table("motor", "MOTOR001", 1).await.unwrap());
    // Second call finds the table and issues nothing
    let before = h.engine.statements().await.len();
    assert!(h.sync.ensure_child_table("motor", "MOTOR001", 1).await.unwrap());
    assert_eq!(h.engine.statements().await.len(), before);
}

#[tokio::test]
async fn test_provision_requires_sync() {
    let h = harness().await;
    motor(&h).await;

    let err = h
        .sync
        .provision_asset(asset("motor", "MOTOR001"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Precondition { .. }));
    assert!(h.metadata.get_asset("MOTOR001").await.unwrap().is_none());
}

#[tokio::test]
async fn test_provision_rejects_unsafe_code() {
    let h = harness().await;
    motor(&h).await;
    h.sync.sync_category_schema("motor").await.unwrap();

    let err = h
        .sync
        .provision_asset(asset("motor", "MOTOR 1; DROP"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));
    assert!(h.metadata.list_assets("motor").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_provision_resumes_half_finished_asset() {
    let h = harness().await;
    motor(&h).await;
    h.sync.sync_category_schema("motor").await.unwrap();

    // Row written by an earlier attempt that never got its child table
    h.metadata.create_asset(asset("motor", "MOTOR001")).await.unwrap();

    let resumed = h.sync.provision_asset(asset("motor", "MOTOR001")).await.unwrap();
    assert_eq!(resumed.child_table.as_deref(), Some("raw_motor_MOTOR001"));
    assert!(h
        .engine
        .child_table("plant", "raw_motor_MOTOR001")
        .await
        .is_some());

    let err = h
        .sync
        .provision_asset(asset("motor", "MOTOR001"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Metadata(MetadataError::AssetAlreadyExists(_))
    ));
}

#[tokio::test]
async fn test_provision_engine_outage_writes_nothing() {
    let h = harness().await;
    motor(&h).await;
    h.sync.sync_category_schema("motor").await.unwrap();

    for _ in 0..3 {
        h.engine
            .fail_next(TsdbError::Transport("connection reset".into()))
            .await;
    }
    let err = h
        .sync
        .provision_asset(asset("motor", "MOTOR001"))
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert!(h.metadata.get_asset("MOTOR001").await.unwrap().is_none());
}

#[tokio::test]
async fn test_inactive_category_refuses_sync() {
    let h = harness().await;
    motor(&h).await;
    h.metadata.set_category_active("motor", false).await.unwrap();

    let err = h.sync.sync_category_schema("motor").await.unwrap_err();
    assert!(matches!(err, SyncError::CategoryInactive(_)));
    assert!(h.engine.statements().await.is_empty());
}

#[tokio::test]
async fn test_unknown_category() {
    let h = harness().await;
    let err = h.sync.sync_category_schema("ghost").await.unwrap_err();
    assert!(matches!(err, SyncError::CategoryNotFound(_)));
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let h = harness().await;
    motor(&h).await;

    h.engine
        .fail_next(TsdbError::Transport("connection refused".into()))
        .await;
    h.engine
        .fail_next(TsdbError::Transport("connection refused".into()))
        .await;

    let result = h.sync.sync_category_schema("motor").await.unwrap();
    assert_eq!(result.action, SyncAction::Created);
}

#[tokio::test]
async fn test_exhausted_retries_surface_transient_error() {
    let h = harness().await;
    motor(&h).await;

    for _ in 0..3 {
        h.engine
            .fail_next(TsdbError::Transport("connection refused".into()))
            .await;
    }

    let err = h.sync.sync_category_schema("motor").await.unwrap_err();
    match err {
        SyncError::Transient { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected transient error, got {}", other),
    }
    let category = h.metadata.get_category("motor").await.unwrap().unwrap();
    assert!(category.schema_fingerprint.is_none());
}

#[tokio::test]
async fn test_engine_timeout_is_transient() {
    let metadata = Arc::new(SqliteMetadataStore::new_in_memory().await.unwrap());
    let engine = Arc::new(MemoryTsdb::new());
    let sync = SchemaSynchronizer::new(metadata.clone(), engine.clone()).with_retry_policy(
        RetryPolicy {
            attempt_timeout: Duration::from_millis(50),
            ..fast_policy()
        },
    );
    let h = Harness {
        metadata,
        engine,
        sync,
    };
    motor(&h).await;
    h.engine.set_latency(Some(Duration::from_millis(500))).await;

    let err = h.sync.sync_category_schema("motor").await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_concurrent_syncs_create_once() {
    let h = harness().await;
    motor(&h).await;
    create_category(&h, "pump").await;
    add_signal(&h, "pump", "flow", SignalDataType::Numeric, 0).await;

    let sync = Arc::new(h.sync.clone());
    let mut handles = vec![];
    for i in 0..8 {
        let sync = sync.clone();
        let code = if i % 2 == 0 { "motor" } else { "pump" };
        handles.push(tokio::spawn(async move {
            sync.sync_category_schema(code).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let creates: Vec<_> = h
        .engine
        .statements()
        .await
        .into_iter()
        .filter(|s| s.starts_with("CREATE STABLE"))
        .collect();
    assert_eq!(creates.len(), 2);
}

#[tokio::test]
async fn test_sync_all_skips_inactive_categories() {
    let h = harness().await;
    motor(&h).await;
    create_category(&h, "pump").await;
    add_signal(&h, "pump", "flow", SignalDataType::Numeric, 0).await;
    create_category(&h, "valve").await;
    h.metadata.set_category_active("valve", false).await.unwrap();

    let results = h.sync.sync_all_categories().await.unwrap();
    let codes: Vec<&str> = results.iter().map(|(code, _)| code.as_str()).collect();
    assert_eq!(codes, vec!["motor", "pump"]);
    for (_, result) in &results {
        assert_eq!(result.as_ref().unwrap().action, SyncAction::Created);
    }
    assert!(h.engine.describe("plant", "raw_valve").await.unwrap().is_none());
}
