//! Schema Synchronizer
//!
//! Reconciles the engine's super-tables and child tables with the catalog.
//!
//! ## Flow
//!
//! ```text
//! sync_category_schema("motor")
//!   ├─ lock("motor")                      (per-category critical section)
//!   ├─ load category + signals            (catalog, retried)
//!   ├─ render canonical DDL, fingerprint
//!   ├─ fingerprint == recorded? ──yes──► Unchanged, no engine call
//!   ├─ DESCRIBE super-table               (engine, retried)
//!   │    ├─ absent  → CREATE DATABASE, CREATE STABLE      → Created
//!   │    └─ present → diff → ADD / MODIFY COLUMN per signal → Altered | Unchanged
//!   └─ record fingerprint                 (only when nothing was rejected)
//! ```
//!
//! Operations on different categories run fully in parallel.
//!
//! ## Failures
//!
//! Engine calls are retried with bounded backoff. A structural rejection of a
//! single column is reported in [`SyncResult::rejected`] and does not abort
//! the rest of the sync; exhausted retries abort with [`SyncError::Transient`].

use crate::ddl::{
    child_table_name, render_add_column, render_child_table_ddl, render_database_ddl,
    render_modify_column, render_super_table_ddl, schema_fingerprint, stored_signals,
    super_table_name,
};
use crate::diff::{diff_signals, SchemaDiff};
use crate::error::{Result, SyncError};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use signalhouse_core::{now_ms, retry_with_backoff, KeyedLocks, RetryFailure, RetryPolicy};
use signalhouse_metadata::{Asset, AssetCategory, AssetConfig, MetadataError, MetadataStore};
use signalhouse_tsdb::{ColumnDef, TableSchema, TsdbClient, TsdbError};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Created,
    Altered,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedSignal {
    pub signal: String,
    pub reason: String,
}

/// Field-by-field outcome of one synchronization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub category: String,
    pub database: String,
    pub super_table: String,
    pub action: SyncAction,
    pub added: Vec<String>,
    pub widened: Vec<String>,
    pub rejected: Vec<RejectedSignal>,
    pub fingerprint: String,

    /// Statements issued during this sync, in order
    pub statements: Vec<String>,
}

impl SyncResult {
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Turn the first rejected signal into a `SyncError::Schema`.
    pub fn ensure_complete(self) -> Result<Self> {
        match self.rejected.first() {
            None => Ok(self),
            Some(rejected) => Err(SyncError::Schema {
                category: self.category.clone(),
                signal: Some(rejected.signal.clone()),
                reason: rejected.reason.clone(),
            }),
        }
    }
}

/// Keeps engine structures in lock-step with the catalog
#[derive(Clone)]
pub struct SchemaSynchronizer {
    metadata: Arc<dyn MetadataStore>,
    engine: Arc<dyn TsdbClient>,
    locks: KeyedLocks,
    policy: RetryPolicy,
}

impl SchemaSynchronizer {
    pub fn new(metadata: Arc<dyn MetadataStore>, engine: Arc<dyn TsdbClient>) -> Self {
        Self {
            metadata,
            engine,
            locks: KeyedLocks::new(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bring the category's super-table in line with its stored signals.
    pub async fn sync_category_schema(&self, code: &str) -> Result<SyncResult> {
        self.sync(code, false).await
    }

    /// Like [`Self::sync_category_schema`], but always inspects the engine
    /// even when the recorded fingerprint matches.
    pub async fn resync_category_schema(&self, code: &str) -> Result<SyncResult> {
        self.sync(code, true).await
    }

    /// Synchronize every active category concurrently.
    ///
    /// Each category is still serialized against other operations on the
    /// same code. One category failing does not stop the others.
    pub async fn sync_all_categories(&self) -> Result<Vec<(String, Result<SyncResult>)>> {
        let metadata = self.metadata.as_ref();
        let categories = self
            .catalog("list_categories", move || metadata.list_categories())
            .await?;

        let codes: Vec<String> = categories
            .into_iter()
            .filter(|c| c.is_active)
            .map(|c| c.code)
            .collect();
        let results = join_all(codes.iter().map(|code| self.sync_category_schema(code))).await;

        Ok(codes.into_iter().zip(results).collect())
    }

    async fn sync(&self, code: &str, force: bool) -> Result<SyncResult> {
        let _guard = self.locks.lock(code).await;

        let category = self.load_category(code).await?;
        if !category.is_active {
            return Err(SyncError::CategoryInactive(code.to_string()));
        }

        let metadata = self.metadata.as_ref();
        let signals = self
            .catalog("list_signals", move || metadata.list_signals(code))
            .await?;

        let ddl = render_super_table_ddl(&category, &signals)?;
        let fingerprint = schema_fingerprint(&ddl);

        let mut result = SyncResult {
            category: code.to_string(),
            database: category.database.clone(),
            super_table: super_table_name(&category),
            action: SyncAction::Unchanged,
            added: Vec::new(),
            widened: Vec::new(),
            rejected: Vec::new(),
            fingerprint: fingerprint.clone(),
            statements: Vec::new(),
        };

        if !force && category.schema_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            debug!(category = code, "Schema fingerprint unchanged, nothing to do");
            return Ok(result);
        }

        let existing = self
            .describe(code, &category.database, &result.super_table)
            .await?;

        match existing {
            None => {
                for statement in [render_database_ddl(&category.database)?, ddl] {
                    self.execute(&statement)
                        .await
                        .map_err(|f| SyncError::from_engine(code, "create super-table", f))?;
                    result.statements.push(statement);
                }
                result.action = SyncAction::Created;
                result.added = stored_signals(&signals)
                    .into_iter()
                    .map(|s| s.code.clone())
                    .collect();
                info!(
                    category = code,
                    super_table = %result.super_table,
                    columns = result.added.len(),
                    "Created super-table"
                );
            }
            Some(existing) => {
                let diff = diff_signals(&existing, &signals);
                self.apply_diff(&category, diff, &mut result).await?;
            }
        }

        if result.rejected.is_empty() {
            let fingerprint = fingerprint.as_str();
            self.catalog("record_category_sync", move || {
                metadata.record_category_sync(code, fingerprint, now_ms())
            })
            .await?;
        } else {
            warn!(
                category = code,
                rejected = result.rejected.len(),
                "Sync finished with rejected signals, fingerprint not recorded"
            );
        }

        Ok(result)
    }

    async fn apply_diff(
        &self,
        category: &AssetCategory,
        diff: SchemaDiff,
        result: &mut SyncResult,
    ) -> Result<()> {
        for column in diff.to_add {
            let statement = render_add_column(category, &column)?;
            match self.execute(&statement).await {
                Ok(()) => {
                    result.added.push(column.name);
                    result.statements.push(statement);
                }
                Err(failure) if failure.is_exhausted() => {
                    return Err(SyncError::from_engine(&category.code, "add column", failure));
                }
                Err(failure) => {
                    warn!(category = %category.code, signal = %column.name, error = %failure.error, "Engine rejected new column");
                    result.rejected.push(RejectedSignal {
                        signal: column.name,
                        reason: failure.error.to_string(),
                    });
                }
            }
        }

        for change in diff.to_widen {
            let statement = render_modify_column(category, &ColumnDef::new(change.name.clone(), change.to))?;
            match self.execute(&statement).await {
                Ok(()) => {
                    result.widened.push(change.name);
                    result.statements.push(statement);
                }
                Err(failure) if failure.is_exhausted() => {
                    return Err(SyncError::from_engine(&category.code, "modify column", failure));
                }
                Err(failure) => {
                    warn!(category = %category.code, signal = %change.name, error = %failure.error, "Engine rejected column widening");
                    result.rejected.push(RejectedSignal {
                        signal: change.name,
                        reason: failure.error.to_string(),
                    });
                }
            }
        }

        for incompatible in diff.incompatible {
            warn!(
                category = %category.code,
                signal = %incompatible.signal,
                reason = %incompatible.reason,
                "Incompatible signal change rejected"
            );
            result.rejected.push(RejectedSignal {
                signal: incompatible.signal,
                reason: incompatible.reason,
            });
        }

        if !result.statements.is_empty() {
            result.action = SyncAction::Altered;
            info!(
                category = %category.code,
                added = result.added.len(),
                widened = result.widened.len(),
                "Altered super-table"
            );
        }
        Ok(())
    }

    /// Make sure an asset's child table exists.
    ///
    /// Returns `Ok(true)` once the table exists, whether it was created now
    /// or already present. Fails fast with [`SyncError::Precondition`] when
    /// the category's super-table has not been created yet.
    pub async fn ensure_child_table(
        &self,
        category_code: &str,
        asset_code: &str,
        asset_id: i64,
    ) -> Result<bool> {
        let _guard = self.locks.lock(category_code).await;
        let category = self.load_category(category_code).await?;
        self.ensure_child_table_locked(&category, asset_code, asset_id)
            .await
    }

    async fn ensure_child_table_locked(
        &self,
        category: &AssetCategory,
        asset_code: &str,
        asset_id: i64,
    ) -> Result<bool> {
        let statement = render_child_table_ddl(category, asset_code, asset_id)?;
        let child = child_table_name(category, asset_code);

        self.require_super_table(category).await?;

        if self
            .describe(&category.code, &category.database, &child)
            .await?
            .is_some()
        {
            debug!(category = %category.code, table = %child, "Child table already exists");
            return Ok(true);
        }

        self.execute(&statement)
            .await
            .map_err(|f| SyncError::from_engine(&category.code, "create child table", f))?;
        info!(category = %category.code, table = %child, asset_id, "Created child table");
        Ok(true)
    }

    /// Register an asset and provision its child table.
    ///
    /// The category must be active and synchronized. The asset code is
    /// validated by rendering its DDL before anything is written. A previous
    /// provisioning that stopped before the child table existed is resumed.
    pub async fn provision_asset(&self, config: AssetConfig) -> Result<Asset> {
        let _guard = self.locks.lock(&config.category_code).await;

        let category = self.load_category(&config.category_code).await?;
        if !category.is_active {
            return Err(SyncError::CategoryInactive(category.code));
        }
        render_child_table_ddl(&category, &config.code, 0)?;
        if !category.is_synced() {
            return Err(SyncError::Precondition {
                category: category.code.clone(),
                reason: "category has not been synchronized".to_string(),
            });
        }
        self.require_super_table(&category).await?;

        let metadata = self.metadata.as_ref();
        let asset = match metadata.create_asset(config.clone()).await {
            Ok(asset) => asset,
            Err(MetadataError::AssetAlreadyExists(code)) => {
                let lookup = code.as_str();
                let existing = self
                    .catalog("get_asset", move || metadata.get_asset(lookup))
                    .await?;
                match existing {
                    Some(existing)
                        if existing.category_code == config.category_code
                            && existing.child_table.is_none() =>
                    {
                        info!(asset = %code, "Resuming asset provisioning");
                        existing
                    }
                    _ => return Err(MetadataError::AssetAlreadyExists(code).into()),
                }
            }
            Err(e) => return Err(e.into()),
        };

        self.ensure_child_table_locked(&category, &asset.code, asset.id)
            .await?;

        let child = child_table_name(&category, &asset.code);
        let (asset_code, child_ref) = (asset.code.as_str(), child.as_str());
        self.catalog("set_asset_child_table", move || {
            metadata.set_asset_child_table(asset_code, child_ref)
        })
        .await?;

        info!(category = %category.code, asset = %asset.code, table = %child, "Provisioned asset");

        self.catalog("get_asset", move || metadata.get_asset(asset_code))
            .await?
            .ok_or_else(|| MetadataError::AssetNotFound(asset.code.clone()).into())
    }

    // ============================================================
    // HELPERS
    // ============================================================

    async fn load_category(&self, code: &str) -> Result<AssetCategory> {
        let metadata = self.metadata.as_ref();
        self.catalog("get_category", move || metadata.get_category(code))
            .await?
            .ok_or_else(|| SyncError::CategoryNotFound(code.to_string()))
    }

    async fn require_super_table(&self, category: &AssetCategory) -> Result<()> {
        let super_table = super_table_name(category);
        if self
            .describe(&category.code, &category.database, &super_table)
            .await?
            .is_none()
        {
            return Err(SyncError::Precondition {
                category: category.code.clone(),
                reason: format!(
                    "super-table {} does not exist; synchronize the category first",
                    super_table
                ),
            });
        }
        Ok(())
    }

    async fn catalog<T, F, Fut>(&self, operation: &str, call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = signalhouse_metadata::Result<T>>,
    {
        retry_with_backoff(&self.policy, operation, call)
            .await
            .map_err(|f| SyncError::from_metadata(operation, f))
    }

    async fn describe(
        &self,
        category: &str,
        database: &str,
        table: &str,
    ) -> Result<Option<TableSchema>> {
        let engine = self.engine.as_ref();
        retry_with_backoff(&self.policy, "engine describe", move || {
            engine.describe(database, table)
        })
        .await
        .map_err(|f| SyncError::from_engine(category, "describe", f))
    }

    /// Execute one idempotent statement; "already exists" counts as success.
    async fn execute(&self, statement: &str) -> std::result::Result<(), RetryFailure<TsdbError>> {
        let engine = self.engine.as_ref();
        retry_with_backoff(&self.policy, "engine execute", move || async move {
            match engine.execute(statement).await {
                Ok(_) => Ok(()),
                Err(e) if e.is_already_exists() => {
                    debug!(statement, "Engine object already exists");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })
        .await
    }
}
