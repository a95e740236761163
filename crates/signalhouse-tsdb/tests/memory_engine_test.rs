//! Integration tests for the in-process engine through the client trait

use std::sync::Arc;
use std::time::Duration;

use signalhouse_tsdb::{connect, ColumnType, ErrorCode, TsdbClient, TsdbConfig, TsdbError};

async fn bootstrap(client: &dyn TsdbClient) {
    client
        .execute("CREATE DATABASE IF NOT EXISTS `plant`")
        .await
        .unwrap();
    client
        .execute(
            "CREATE STABLE IF NOT EXISTS `plant`.`raw_motor` \
             (`ts` TIMESTAMP, `current` DOUBLE) TAGS (`asset_id` BIGINT, `asset_code` VARCHAR(64))",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_connect_memory_backend() {
    let client = connect(&TsdbConfig::memory()).unwrap();
    bootstrap(client.as_ref()).await;

    let schema = client.describe("plant", "raw_motor").await.unwrap().unwrap();
    assert_eq!(schema.columns[0].column_type, ColumnType::Timestamp);
    assert_eq!(schema.tag("asset_code").unwrap().column_type, ColumnType::Varchar(64));
}

#[tokio::test]
async fn test_child_table_describes_as_parent() {
    let client = connect(&TsdbConfig::memory()).unwrap();
    bootstrap(client.as_ref()).await;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS `plant`.`raw_motor_M1` USING `plant`.`raw_motor` \
             TAGS (7, 'M1')",
        )
        .await
        .unwrap();

    assert!(client.table_exists("plant", "raw_motor_M1").await.unwrap());
    assert!(!client.table_exists("plant", "raw_motor_M2").await.unwrap());
    let parent = client.describe("plant", "raw_motor").await.unwrap();
    let child = client.describe("plant", "raw_motor_M1").await.unwrap();
    assert_eq!(parent, child);
}

#[tokio::test]
async fn test_tag_count_mismatch_rejected() {
    let client = connect(&TsdbConfig::memory()).unwrap();
    bootstrap(client.as_ref()).await;

    let err = client
        .execute("CREATE TABLE `plant`.`raw_motor_M1` USING `plant`.`raw_motor` TAGS (7)")
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::SYNTAX_ERROR));
}

#[tokio::test(start_paused = true)]
async fn test_latency_applies_to_every_call() {
    let engine = Arc::new(signalhouse_tsdb::MemoryTsdb::new());
    engine.set_latency(Some(Duration::from_secs(5))).await;

    let result = tokio::time::timeout(
        Duration::from_secs(1),
        engine.execute("CREATE DATABASE `plant`"),
    )
    .await;
    assert!(result.is_err());
    assert!(!engine.has_database("plant").await);

    engine.set_latency(None).await;
    engine.execute("CREATE DATABASE `plant`").await.unwrap();
    assert!(engine.has_database("plant").await);
}

#[tokio::test]
async fn test_injected_failure_hits_describe() {
    let engine = signalhouse_tsdb::MemoryTsdb::new();
    engine
        .fail_next(TsdbError::Timeout {
            operation: "describe".into(),
            after_ms: 10,
        })
        .await;
    assert!(engine.describe("plant", "raw_motor").await.is_err());
    assert!(engine.describe("plant", "raw_motor").await.unwrap().is_none());
    assert_eq!(engine.describe_calls(), 2);
}
