//! SQLite Metadata Store Implementation
//!
//! `SqliteMetadataStore` implements [`MetadataStore`] on top of an SQLx
//! connection pool.
//!
//! ## Usage
//!
//! ```ignore
//! // File-backed (creates the file if missing)
//! let store = SqliteMetadataStore::new("metadata.db").await?;
//!
//! // In-memory, for tests and dry runs
//! let store = SqliteMetadataStore::new_in_memory().await?;
//! ```
//!
//! ## Implementation Details
//!
//! - Runtime queries (`sqlx::query`) with explicit `.bind()`, so the crate
//!   builds without a `DATABASE_URL`
//! - Migrations embedded with `sqlx::migrate!` and run on open
//! - WAL journal mode for file databases
//! - The in-memory pool is pinned to a single connection that never expires;
//!   every connection to `:memory:` would otherwise see its own database
//! - JSON columns (attributes, validation rules, feature configs) are TEXT

use crate::{
    error::{is_unique_violation, MetadataError, Result},
    types::*,
    MetadataStore,
};
use async_trait::async_trait;
use signalhouse_core::ident::{
    validate_identifier, validate_signal_code, validate_table_name,
};
use signalhouse_core::ValidationError;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const CATEGORY_COLUMNS: &str = "c.code, c.name, c.industry, c.database_name, c.stable_prefix, \
     c.is_active, c.schema_fingerprint, c.last_synced_at, c.created_at, c.updated_at, \
     (SELECT COUNT(*) FROM assets a WHERE a.category_code = c.code) AS asset_count";

const SIGNAL_COLUMNS: &str = "id, category_code, code, name, data_type, unit, is_stored, \
     is_realtime, is_feature, min_value, max_value, validation_rule, display_order, \
     created_at, updated_at";

const ASSET_COLUMNS: &str =
    "id, category_code, code, name, attributes, status, child_table, created_at, updated_at";

const FEATURE_COLUMNS: &str =
    "id, category_code, name, config, generation, created_at, updated_at";

const TASK_COLUMNS: &str = "id, category_code, feature_name, generation, stream_name, \
     target_table, sql_text, status, last_error, created_at, updated_at";

/// SQLite-based metadata store implementation
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    /// Open (or create) a file-backed store.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", path.as_ref().display()))?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(5))
                .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create an in-memory database (for testing).
    pub async fn new_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Open a store from a location string: `:memory:` / `sqlite::memory:`
    /// or a file path (optionally prefixed with `sqlite://`).
    pub async fn connect(location: &str) -> Result<Self> {
        match location {
            ":memory:" | "sqlite::memory:" => Self::new_in_memory().await,
            other => Self::new(other.trim_start_matches("sqlite://")).await,
        }
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    async fn require_category(&self, code: &str) -> Result<AssetCategory> {
        self.get_category(code)
            .await?
            .ok_or_else(|| MetadataError::CategoryNotFound(code.to_string()))
    }

    async fn require_task(&self, id: &str) -> Result<StreamTask> {
        self.get_stream_task(id)
            .await?
            .ok_or_else(|| MetadataError::TaskNotFound(id.to_string()))
    }

    fn validate_signal(config: &SignalConfig) -> Result<()> {
        validate_signal_code(&config.code)?;
        if config.name.trim().is_empty() {
            return Err(ValidationError::invalid_field("name", "must not be empty").into());
        }
        if let (Some(min), Some(max)) = (config.min_value, config.max_value) {
            if min > max {
                return Err(ValidationError::invalid_field(
                    "min_value",
                    format!("min_value {} exceeds max_value {}", min, max),
                )
                .into());
            }
        }
        Ok(())
    }
}

// ============================================================
// ROW MAPPING
// ============================================================

fn category_from_row(r: &SqliteRow) -> Result<AssetCategory> {
    Ok(AssetCategory {
        code: r.try_get("code")?,
        name: r.try_get("name")?,
        industry: r.try_get("industry")?,
        database: r.try_get("database_name")?,
        stable_prefix: r.try_get("stable_prefix")?,
        is_active: r.try_get("is_active")?,
        asset_count: r.try_get::<i64, _>("asset_count")? as u64,
        schema_fingerprint: r.try_get("schema_fingerprint")?,
        last_synced_at: r.try_get("last_synced_at")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn signal_from_row(r: &SqliteRow) -> Result<SignalDefinition> {
    let data_type: String = r.try_get("data_type")?;
    let validation_rule: Option<String> = r.try_get("validation_rule")?;

    Ok(SignalDefinition {
        id: r.try_get("id")?,
        category_code: r.try_get("category_code")?,
        code: r.try_get("code")?,
        name: r.try_get("name")?,
        data_type: data_type.parse()?,
        unit: r.try_get("unit")?,
        is_stored: r.try_get("is_stored")?,
        is_realtime: r.try_get("is_realtime")?,
        is_feature: r.try_get("is_feature")?,
        min_value: r.try_get("min_value")?,
        max_value: r.try_get("max_value")?,
        validation_rule: validation_rule
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?,
        display_order: r.try_get("display_order")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn asset_from_row(r: &SqliteRow) -> Result<Asset> {
    let attributes: String = r.try_get("attributes")?;
    let status: String = r.try_get("status")?;

    Ok(Asset {
        id: r.try_get("id")?,
        category_code: r.try_get("category_code")?,
        code: r.try_get("code")?,
        name: r.try_get("name")?,
        attributes: serde_json::from_str(&attributes)?,
        status: status.parse()?,
        child_table: r.try_get("child_table")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn feature_from_row(r: &SqliteRow) -> Result<FeatureDefinition> {
    let config: String = r.try_get("config")?;

    Ok(FeatureDefinition {
        id: r.try_get("id")?,
        category_code: r.try_get("category_code")?,
        name: r.try_get("name")?,
        config: serde_json::from_str(&config)?,
        generation: r.try_get("generation")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn task_from_row(r: &SqliteRow) -> Result<StreamTask> {
    let status: String = r.try_get("status")?;

    Ok(StreamTask {
        id: r.try_get("id")?,
        category_code: r.try_get("category_code")?,
        feature_name: r.try_get("feature_name")?,
        generation: r.try_get("generation")?,
        stream_name: r.try_get("stream_name")?,
        target_table: r.try_get("target_table")?,
        sql: r.try_get("sql_text")?,
        status: status.parse()?,
        last_error: r.try_get("last_error")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn log_from_row(r: &SqliteRow) -> Result<TaskLogEntry> {
    let level: String = r.try_get("level")?;

    Ok(TaskLogEntry {
        id: r.try_get("id")?,
        task_id: r.try_get("task_id")?,
        level: level.parse()?,
        message: r.try_get("message")?,
        created_at: r.try_get("created_at")?,
    })
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    // ============================================================
    // CATEGORY OPERATIONS
    // ============================================================

    async fn create_category(&self, config: CategoryConfig) -> Result<AssetCategory> {
        validate_identifier("category", &config.code)?;
        validate_identifier("database", &config.database)?;
        validate_identifier("stable prefix", &config.stable_prefix)?;
        validate_table_name(&format!("{}_{}", config.stable_prefix, config.code))?;
        if config.name.trim().is_empty() {
            return Err(ValidationError::invalid_field("name", "must not be empty").into());
        }

        let now = Self::now_ms();
        sqlx::query(
            "INSERT INTO asset_categories
                (code, name, industry, database_name, stable_prefix, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(&config.code)
        .bind(&config.name)
        .bind(&config.industry)
        .bind(&config.database)
        .bind(&config.stable_prefix)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                MetadataError::CategoryAlreadyExists(config.code.clone())
            } else {
                MetadataError::from(e)
            }
        })?;

        self.require_category(&config.code).await
    }

    async fn get_category(&self, code: &str) -> Result<Option<AssetCategory>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM asset_categories c WHERE c.code = ?",
            CATEGORY_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(category_from_row).transpose()
    }

    async fn list_categories(&self) -> Result<Vec<AssetCategory>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM asset_categories c ORDER BY c.code",
            CATEGORY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(category_from_row).collect()
    }

    async fn set_category_active(&self, code: &str, active: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE asset_categories SET is_active = ?, updated_at = ? WHERE code = ?",
        )
        .bind(active)
        .bind(Self::now_ms())
        .bind(code)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::CategoryNotFound(code.to_string()));
        }
        Ok(())
    }

    async fn delete_category(&self, code: &str) -> Result<()> {
        let category = self.require_category(code).await?;
        if category.asset_count > 0 {
            return Err(MetadataError::CategoryInUse {
                code: code.to_string(),
                reason: format!("{} assets still reference it", category.asset_count),
            });
        }

        let live: i64 = sqlx::query(
            "SELECT COUNT(*) AS live FROM stream_tasks
             WHERE category_code = ? AND status IN ('running', 'paused')",
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await?
        .try_get("live")?;

        if live > 0 {
            return Err(MetadataError::CategoryInUse {
                code: code.to_string(),
                reason: format!("{} stream tasks are running or paused", live),
            });
        }

        sqlx::query("DELETE FROM asset_categories WHERE code = ?")
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_category_sync(
        &self,
        code: &str,
        fingerprint: &str,
        synced_at: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE asset_categories
             SET schema_fingerprint = ?, last_synced_at = ?, updated_at = ?
             WHERE code = ?",
        )
        .bind(fingerprint)
        .bind(synced_at)
        .bind(Self::now_ms())
        .bind(code)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::CategoryNotFound(code.to_string()));
        }
        Ok(())
    }

    // ============================================================
    // SIGNAL OPERATIONS
    // ============================================================

    async fn add_signal(&self, config: SignalConfig) -> Result<SignalDefinition> {
        Self::validate_signal(&config)?;
        self.require_category(&config.category_code).await?;

        let now = Self::now_ms();
        let validation_rule = config
            .validation_rule
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "INSERT INTO signal_definitions
                (category_code, code, name, data_type, unit, is_stored, is_realtime, is_feature,
                 min_value, max_value, validation_rule, display_order, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&config.category_code)
        .bind(&config.code)
        .bind(&config.name)
        .bind(config.data_type.as_str())
        .bind(&config.unit)
        .bind(config.is_stored)
        .bind(config.is_realtime)
        .bind(config.is_feature)
        .bind(config.min_value)
        .bind(config.max_value)
        .bind(validation_rule)
        .bind(config.display_order)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                MetadataError::SignalAlreadyExists {
                    category: config.category_code.clone(),
                    signal: config.code.clone(),
                }
            } else {
                MetadataError::from(e)
            }
        })?;

        self.get_signal(&config.category_code, &config.code)
            .await?
            .ok_or_else(|| MetadataError::SignalNotFound {
                category: config.category_code.clone(),
                signal: config.code.clone(),
            })
    }

    async fn get_signal(&self, category: &str, code: &str) -> Result<Option<SignalDefinition>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM signal_definitions WHERE category_code = ? AND code = ?",
            SIGNAL_COLUMNS
        ))
        .bind(category)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(signal_from_row).transpose()
    }

    async fn list_signals(&self, category: &str) -> Result<Vec<SignalDefinition>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM signal_definitions
             WHERE category_code = ?
             ORDER BY display_order, code",
            SIGNAL_COLUMNS
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(signal_from_row).collect()
    }

    async fn update_signal(&self, config: SignalConfig) -> Result<SignalDefinition> {
        Self::validate_signal(&config)?;
        let category = self.require_category(&config.category_code).await?;
        let existing = self
            .get_signal(&config.category_code, &config.code)
            .await?
            .ok_or_else(|| MetadataError::SignalNotFound {
                category: config.category_code.clone(),
                signal: config.code.clone(),
            })?;

        if category.is_synced()
            && existing.is_stored
            && !existing.data_type.can_widen_to(config.data_type)
        {
            return Err(ValidationError::IncompatibleRetype {
                signal: config.code.clone(),
                from: existing.data_type.to_string(),
                to: config.data_type.to_string(),
            }
            .into());
        }

        let validation_rule = config
            .validation_rule
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "UPDATE signal_definitions
             SET name = ?, data_type = ?, unit = ?, is_stored = ?, is_realtime = ?,
                 is_feature = ?, min_value = ?, max_value = ?, validation_rule = ?,
                 display_order = ?, updated_at = ?
             WHERE category_code = ? AND code = ?",
        )
        .bind(&config.name)
        .bind(config.data_type.as_str())
        .bind(&config.unit)
        .bind(config.is_stored)
        .bind(config.is_realtime)
        .bind(config.is_feature)
        .bind(config.min_value)
        .bind(config.max_value)
        .bind(validation_rule)
        .bind(config.display_order)
        .bind(Self::now_ms())
        .bind(&config.category_code)
        .bind(&config.code)
        .execute(&self.pool)
        .await?;

        self.get_signal(&config.category_code, &config.code)
            .await?
            .ok_or_else(|| MetadataError::SignalNotFound {
                category: config.category_code.clone(),
                signal: config.code.clone(),
            })
    }

    async fn remove_signal(&self, category: &str, code: &str) -> Result<()> {
        let result =
            sqlx::query("DELETE FROM signal_definitions WHERE category_code = ? AND code = ?")
                .bind(category)
                .bind(code)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::SignalNotFound {
                category: category.to_string(),
                signal: code.to_string(),
            });
        }
        Ok(())
    }

    // ============================================================
    // ASSET OPERATIONS
    // ============================================================

    async fn create_asset(&self, config: AssetConfig) -> Result<Asset> {
        validate_identifier("asset", &config.code)?;
        self.require_category(&config.category_code).await?;

        let now = Self::now_ms();
        let attributes = serde_json::to_string(&config.attributes)?;

        sqlx::query(
            "INSERT INTO assets
                (category_code, code, name, attributes, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&config.category_code)
        .bind(&config.code)
        .bind(&config.name)
        .bind(attributes)
        .bind(config.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                MetadataError::AssetAlreadyExists(config.code.clone())
            } else {
                MetadataError::from(e)
            }
        })?;

        self.get_asset(&config.code)
            .await?
            .ok_or_else(|| MetadataError::AssetNotFound(config.code.clone()))
    }

    async fn get_asset(&self, code: &str) -> Result<Option<Asset>> {
        let row = sqlx::query(&format!("SELECT {} FROM assets WHERE code = ?", ASSET_COLUMNS))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(asset_from_row).transpose()
    }

    async fn list_assets(&self, category: &str) -> Result<Vec<Asset>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM assets WHERE category_code = ? ORDER BY code",
            ASSET_COLUMNS
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(asset_from_row).collect()
    }

    async fn set_asset_child_table(&self, code: &str, child_table: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE assets SET child_table = ?, updated_at = ? WHERE code = ?")
                .bind(child_table)
                .bind(Self::now_ms())
                .bind(code)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::AssetNotFound(code.to_string()));
        }
        Ok(())
    }

    async fn set_asset_status(&self, code: &str, status: AssetStatus) -> Result<()> {
        let result = sqlx::query("UPDATE assets SET status = ?, updated_at = ? WHERE code = ?")
            .bind(status.as_str())
            .bind(Self::now_ms())
            .bind(code)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::AssetNotFound(code.to_string()));
        }
        Ok(())
    }

    // ============================================================
    // FEATURE OPERATIONS
    // ============================================================

    async fn upsert_feature(
        &self,
        category: &str,
        name: &str,
        config: serde_json::Value,
    ) -> Result<FeatureDefinition> {
        validate_identifier("feature", name)?;
        self.require_category(category).await?;

        let config_text = serde_json::to_string(&config)?;
        let now = Self::now_ms();
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(
            "SELECT config, generation FROM feature_definitions
             WHERE category_code = ? AND name = ?",
        )
        .bind(category)
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;

        match existing {
            None => {
                sqlx::query(
                    "INSERT INTO feature_definitions
                        (category_code, name, config, generation, created_at, updated_at)
                     VALUES (?, ?, ?, 1, ?, ?)",
                )
                .bind(category)
                .bind(name)
                .bind(&config_text)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            Some(row) => {
                let stored: String = row.try_get("config")?;
                if stored != config_text {
                    let generation: i64 = row.try_get("generation")?;
                    sqlx::query(
                        "UPDATE feature_definitions
                         SET config = ?, generation = ?, updated_at = ?
                         WHERE category_code = ? AND name = ?",
                    )
                    .bind(&config_text)
                    .bind(generation + 1)
                    .bind(now)
                    .bind(category)
                    .bind(name)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;

        self.get_feature(category, name)
            .await?
            .ok_or_else(|| MetadataError::FeatureNotFound {
                category: category.to_string(),
                feature: name.to_string(),
            })
    }

    async fn get_feature(&self, category: &str, name: &str) -> Result<Option<FeatureDefinition>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM feature_definitions WHERE category_code = ? AND name = ?",
            FEATURE_COLUMNS
        ))
        .bind(category)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(feature_from_row).transpose()
    }

    async fn list_features(&self, category: &str) -> Result<Vec<FeatureDefinition>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM feature_definitions WHERE category_code = ? ORDER BY name",
            FEATURE_COLUMNS
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(feature_from_row).collect()
    }

    async fn delete_feature(&self, category: &str, name: &str) -> Result<()> {
        let result =
            sqlx::query("DELETE FROM feature_definitions WHERE category_code = ? AND name = ?")
                .bind(category)
                .bind(name)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::FeatureNotFound {
                category: category.to_string(),
                feature: name.to_string(),
            });
        }
        Ok(())
    }

    // ============================================================
    // STREAM TASK OPERATIONS
    // ============================================================

    async fn create_stream_task(&self, task: NewStreamTask) -> Result<StreamTask> {
        self.require_category(&task.category_code).await?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Self::now_ms();

        sqlx::query(
            "INSERT INTO stream_tasks
                (id, category_code, feature_name, generation, stream_name, target_table,
                 sql_text, status, last_error, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 'created', NULL, ?, ?)",
        )
        .bind(&id)
        .bind(&task.category_code)
        .bind(&task.feature_name)
        .bind(task.generation)
        .bind(&task.stream_name)
        .bind(&task.target_table)
        .bind(&task.sql)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.require_task(&id).await
    }

    async fn get_stream_task(&self, id: &str) -> Result<Option<StreamTask>> {
        let row = sqlx::query(&format!("SELECT {} FROM stream_tasks WHERE id = ?", TASK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(task_from_row).transpose()
    }

    async fn list_stream_tasks(&self, category: Option<&str>) -> Result<Vec<StreamTask>> {
        let rows = match category {
            Some(category) => {
                sqlx::query(&format!(
                    "SELECT {} FROM stream_tasks WHERE category_code = ?
                     ORDER BY created_at, id",
                    TASK_COLUMNS
                ))
                .bind(category)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM stream_tasks ORDER BY created_at, id",
                    TASK_COLUMNS
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(task_from_row).collect()
    }

    async fn update_stream_task_status(
        &self,
        id: &str,
        status: StreamStatus,
        last_error: Option<&str>,
    ) -> Result<StreamTask> {
        let result = sqlx::query(
            "UPDATE stream_tasks SET status = ?, last_error = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(last_error)
        .bind(Self::now_ms())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::TaskNotFound(id.to_string()));
        }
        self.require_task(id).await
    }

    async fn delete_stream_task(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM stream_tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::TaskNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn append_task_log(
        &self,
        task_id: &str,
        level: TaskLogLevel,
        message: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO stream_task_logs (task_id, level, message, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(task_id)
        .bind(level.as_str())
        .bind(message)
        .bind(Self::now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_task_logs(&self, task_id: &str) -> Result<Vec<TaskLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, task_id, level, message, created_at
             FROM stream_task_logs WHERE task_id = ? ORDER BY id",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(log_from_row).collect()
    }
}
