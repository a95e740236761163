use crate::error::Result;
use crate::schema::TableSchema;
use async_trait::async_trait;

/// Transport to the time-series engine.
///
/// Implementations are injected (`Arc<dyn TsdbClient>`) into the schema
/// synchronizer and the stream task manager. They perform exactly one engine
/// round trip per call; retries and timeouts are layered on by the caller.
#[async_trait]
pub trait TsdbClient: Send + Sync {
    /// Execute one statement, returning the number of affected rows.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Describe a super-table or child table.
    ///
    /// Returns `Ok(None)` when the table (or its database) does not exist.
    async fn describe(&self, database: &str, table: &str) -> Result<Option<TableSchema>>;

    /// Whether a table exists.
    async fn table_exists(&self, database: &str, table: &str) -> Result<bool> {
        Ok(self.describe(database, table).await?.is_some())
    }
}
