//! Integration tests for the SQLite metadata store
//!
//! These tests exercise the catalog through the `MetadataStore` trait object,
//! the way the synchronizer and stream manager use it.

use std::sync::Arc;

use signalhouse_metadata::{
    AssetConfig, AssetStatus, CategoryConfig, MetadataError, MetadataStore, NewStreamTask,
    SignalConfig, SignalDataType, SqliteMetadataStore, StreamStatus,
};

/// Helper to create a test category configuration
fn create_test_category(code: &str) -> CategoryConfig {
    CategoryConfig {
        code: code.to_string(),
        name: format!("{} category", code),
        industry: None,
        database: "plant".to_string(),
        stable_prefix: "raw".to_string(),
    }
}

fn create_test_asset(category: &str, code: &str) -> AssetConfig {
    AssetConfig {
        category_code: category.to_string(),
        code: code.to_string(),
        name: code.to_lowercase(),
        attributes: Default::default(),
        status: AssetStatus::Active,
    }
}

fn create_test_task(category: &str, feature: &str) -> NewStreamTask {
    NewStreamTask {
        category_code: category.to_string(),
        feature_name: feature.to_string(),
        generation: 1,
        stream_name: format!("fs_{}_{}_g1", category, feature),
        target_table: format!("feat_{}_{}", category, feature),
        sql: "CREATE STREAM IF NOT EXISTS ...".to_string(),
    }
}

// ============================================================================
// File-backed store
// ============================================================================

#[tokio::test]
async fn test_file_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metadata.db");

    {
        let store = SqliteMetadataStore::new(&path).await.unwrap();
        store.create_category(create_test_category("motor")).await.unwrap();
        store
            .add_signal(SignalConfig::stored("motor", "current", SignalDataType::Numeric))
            .await
            .unwrap();
        store
            .record_category_sync("motor", "deadbeef", 42)
            .await
            .unwrap();
    }

    let reopened = SqliteMetadataStore::new(&path).await.unwrap();
    let category = reopened.get_category("motor").await.unwrap().unwrap();
    assert_eq!(category.schema_fingerprint.as_deref(), Some("deadbeef"));
    assert_eq!(category.last_synced_at, Some(42));
    assert_eq!(reopened.list_signals("motor").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_connect_dispatches_memory() {
    let store = SqliteMetadataStore::connect(":memory:").await.unwrap();
    store.create_category(create_test_category("pump")).await.unwrap();
    assert_eq!(store.list_categories().await.unwrap().len(), 1);
}

// ============================================================================
// Trait-object workflow
// ============================================================================

#[tokio::test]
async fn test_full_catalog_workflow() {
    let store: Arc<dyn MetadataStore> = Arc::new(SqliteMetadataStore::new_in_memory().await.unwrap());

    store.create_category(create_test_category("motor")).await.unwrap();
    store.create_category(create_test_category("pump")).await.unwrap();

    let codes: Vec<_> = store
        .list_categories()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.code)
        .collect();
    assert_eq!(codes, vec!["motor", "pump"]);

    store
        .add_signal(SignalConfig::stored("motor", "current", SignalDataType::Numeric))
        .await
        .unwrap();
    // Signal codes are scoped per category
    store
        .add_signal(SignalConfig::stored("pump", "current", SignalDataType::Numeric))
        .await
        .unwrap();

    store.create_asset(create_test_asset("motor", "MOTOR001")).await.unwrap();
    store.create_asset(create_test_asset("motor", "MOTOR002")).await.unwrap();

    // Asset codes are globally unique
    let err = store
        .create_asset(create_test_asset("pump", "MOTOR001"))
        .await
        .unwrap_err();
    assert!(matches!(err, MetadataError::AssetAlreadyExists(_)));

    let motor = store.get_category("motor").await.unwrap().unwrap();
    assert_eq!(motor.asset_count, 2);
    assert_eq!(store.list_assets("pump").await.unwrap().len(), 0);

    store.set_category_active("motor", false).await.unwrap();
    assert!(!store.get_category("motor").await.unwrap().unwrap().is_active);
    store.set_category_active("motor", true).await.unwrap();

    // Pump has no assets and no live tasks, so it can go
    store.delete_category("pump").await.unwrap();
    assert!(store.get_category("pump").await.unwrap().is_none());
    assert!(store.list_signals("pump").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_category_blocked_by_live_task() {
    let store = SqliteMetadataStore::new_in_memory().await.unwrap();
    store.create_category(create_test_category("fan")).await.unwrap();

    let task = store
        .create_stream_task(create_test_task("fan", "avg_speed"))
        .await
        .unwrap();
    store
        .update_stream_task_status(&task.id, StreamStatus::Running, None)
        .await
        .unwrap();

    let err = store.delete_category("fan").await.unwrap_err();
    assert!(matches!(err, MetadataError::CategoryInUse { .. }));

    store
        .update_stream_task_status(&task.id, StreamStatus::Stopped, None)
        .await
        .unwrap();
    store.delete_category("fan").await.unwrap();
    assert!(store.get_stream_task(&task.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_stream_tasks_filter() {
    let store = SqliteMetadataStore::new_in_memory().await.unwrap();
    store.create_category(create_test_category("motor")).await.unwrap();
    store.create_category(create_test_category("pump")).await.unwrap();

    store.create_stream_task(create_test_task("motor", "a")).await.unwrap();
    store.create_stream_task(create_test_task("motor", "b")).await.unwrap();
    store.create_stream_task(create_test_task("pump", "c")).await.unwrap();

    assert_eq!(store.list_stream_tasks(None).await.unwrap().len(), 3);
    assert_eq!(store.list_stream_tasks(Some("motor")).await.unwrap().len(), 2);
    assert!(store.list_stream_tasks(Some("fan")).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_feature_lifecycle() {
    let store = SqliteMetadataStore::new_in_memory().await.unwrap();
    store.create_category(create_test_category("motor")).await.unwrap();

    let err = store
        .upsert_feature("pump", "x", serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, MetadataError::CategoryNotFound(_)));

    store
        .upsert_feature("motor", "avg_current", serde_json::json!({"window": "1h"}))
        .await
        .unwrap();
    store
        .upsert_feature("motor", "max_current", serde_json::json!({"window": "1h"}))
        .await
        .unwrap();

    let names: Vec<_> = store
        .list_features("motor")
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(names, vec!["avg_current", "max_current"]);

    store.delete_feature("motor", "max_current").await.unwrap();
    assert!(store.get_feature("motor", "max_current").await.unwrap().is_none());
    assert!(matches!(
        store.delete_feature("motor", "max_current").await.unwrap_err(),
        MetadataError::FeatureNotFound { .. }
    ));
}

#[tokio::test]
async fn test_concurrent_asset_creation() {
    let store = Arc::new(SqliteMetadataStore::new_in_memory().await.unwrap());
    store.create_category(create_test_category("motor")).await.unwrap();

    let mut handles = vec![];
    for i in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .create_asset(create_test_asset("motor", &format!("MOTOR{:03}", i)))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let assets = store.list_assets("motor").await.unwrap();
    assert_eq!(assets.len(), 10);
    let mut ids: Vec<_> = assets.iter().map(|a| a.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10);
}
