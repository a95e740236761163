//! Stream Task Manager
//!
//! Owns the path from a registered feature to a continuous query running on
//! the engine, and the lifecycle of that query afterwards.
//!
//! ## Flow
//!
//! ```text
//! register_feature(motor, {...})   parse → check signals → upsert (generation bump on change)
//! create_stream(motor, feature)    compile → persist task (created); nothing issued yet
//! deploy(task)                     CREATE STREAM IF NOT EXISTS → running | error
//! pause / resume / stop            PAUSE / RESUME / DROP STREAM → paused | running | stopped
//! acknowledge_error(task)          DROP STREAM IF EXISTS → created
//! ```
//!
//! Every transition and every engine failure appends a line to the task log.
//! Actions on the same task are serialized; different tasks proceed in
//! parallel. All generations of a feature write into one target table, so at
//! most one of them may be running or paused at a time.

use crate::compiler::{check_signals, generate_stream_sql, CompiledStream};
use crate::dsl::{parse_feature_config, to_canonical_json, FeatureConfig};
use crate::error::{Result, StreamError};
use crate::lifecycle::StreamAction;
use signalhouse_core::ident::quote_ident;
use signalhouse_core::{retry_with_backoff, KeyedLocks, RetryPolicy};
use signalhouse_metadata::{
    AssetCategory, FeatureDefinition, MetadataStore, NewStreamTask, StreamStatus, StreamTask,
    TaskLogEntry, TaskLogLevel,
};
use signalhouse_tsdb::TsdbClient;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Compiles features into stream tasks and drives their lifecycle
#[derive(Clone)]
pub struct StreamTaskManager {
    metadata: Arc<dyn MetadataStore>,
    engine: Arc<dyn TsdbClient>,
    locks: KeyedLocks,
    policy: RetryPolicy,
}

impl StreamTaskManager {
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

    // ============================================================
    // FEATURES
    // ============================================================

    /// Validate a raw feature config against the category and store its
    /// canonical form.
    pub async fn register_feature(
        &self,
        category_code: &str,
        raw: &serde_json::Value,
    ) -> Result<FeatureDefinition> {
        let (category, config) = self.validated(category_code, raw).await?;

        let metadata = self.metadata.as_ref();
        let canonical = to_canonical_json(&config)?;
        let name = config.name.as_str();
        let code = category.code.as_str();
        let feature = self
            .catalog("upsert_feature", move || {
                metadata.upsert_feature(code, name, canonical.clone())
            })
            .await?;

        info!(
            category = %feature.category_code,
            feature = %feature.name,
            generation = feature.generation,
            "Feature registered"
        );
        Ok(feature)
    }

    /// Compile a raw config without persisting anything.
    ///
    /// The generation is the one `register_feature` followed by
    /// `create_stream` would produce.
    pub async fn preview_stream(
        &self,
        category_code: &str,
        raw: &serde_json::Value,
    ) -> Result<CompiledStream> {
        let (category, config) = self.validated(category_code, raw).await?;

        let canonical = to_canonical_json(&config)?;
        let generation = match self.find_feature(&category.code, &config.name).await? {
            Some(existing) if existing.config == canonical => existing.generation,
            Some(existing) => existing.generation + 1,
            None => 1,
        };
        Ok(generate_stream_sql(&category, &config, generation)?)
    }

    /// Compile a registered feature's current generation.
    pub async fn compile_feature(
        &self,
        category_code: &str,
        feature_name: &str,
    ) -> Result<CompiledStream> {
        let category = self.load_category(category_code).await?;
        let feature = self
            .find_feature(category_code, feature_name)
            .await?
            .ok_or_else(|| StreamError::FeatureNotFound {
                category: category_code.to_string(),
                feature: feature_name.to_string(),
            })?;

        let config = parse_feature_config(&feature.config)?;
        self.check_against_catalog(&category, &config).await?;
        Ok(generate_stream_sql(&category, &config, feature.generation)?)
    }

    // ============================================================
    // TASKS
    // ============================================================

    /// Persist the feature's compiled query as a task in `created` state.
    ///
    /// Nothing is issued to the engine until [`Self::deploy`].
    pub async fn create_stream(
        &self,
        category_code: &str,
        feature_name: &str,
    ) -> Result<StreamTask> {
        let compiled = self.compile_feature(category_code, feature_name).await?;

        let _guard = self.locks.lock(&compiled.stream_name).await;

        let metadata = self.metadata.as_ref();
        let existing = self
            .catalog("list_stream_tasks", move || {
                metadata.list_stream_tasks(Some(category_code))
            })
            .await?;
        if let Some(task) = existing
            .iter()
            .find(|t| t.stream_name == compiled.stream_name && t.status != StreamStatus::Stopped)
        {
            return Err(StreamError::AlreadyExists {
                stream_name: compiled.stream_name,
                task_id: task.id.clone(),
            });
        }

        let new_task = NewStreamTask {
            category_code: category_code.to_string(),
            feature_name: feature_name.to_string(),
            generation: compiled.generation,
            stream_name: compiled.stream_name.clone(),
            target_table: compiled.target_table.clone(),
            sql: compiled.sql,
        };
        let task = self
            .catalog("create_stream_task", move || {
                metadata.create_stream_task(new_task.clone())
            })
            .await?;

        self.log(
            &task.id,
            TaskLogLevel::Info,
            &format!(
                "Created from feature {} generation {}",
                task.feature_name, task.generation
            ),
        )
        .await;
        info!(task_id = %task.id, stream = %task.stream_name, "Stream task created");
        Ok(task)
    }

    /// Issue the task's continuous query.
    ///
    /// Returns `true` when the query was issued now and `false` when the task
    /// was already running. Fails with [`StreamError::GenerationLive`] while
    /// another task of the same feature is running or paused.
    pub async fn deploy(&self, task_id: &str) -> Result<bool> {
        let _guard = self.locks.lock(task_id).await;
        let task = self.load_task(task_id).await?;

        if task.status == StreamStatus::Running {
            debug!(task_id, "Stream already running");
            return Ok(false);
        }
        self.check_transition(&task, StreamAction::Deploy)?;

        let _feature_guard = self
            .locks
            .lock(&feature_lock_key(&task.category_code, &task.feature_name))
            .await;
        self.ensure_no_live_generation(&task).await?;

        self.run_transition(&task, StreamAction::Deploy, &task.sql)
            .await?;
        Ok(true)
    }

    pub async fn pause(&self, task_id: &str) -> Result<StreamTask> {
        self.control(task_id, StreamAction::Pause).await
    }

    pub async fn resume(&self, task_id: &str) -> Result<StreamTask> {
        self.control(task_id, StreamAction::Resume).await
    }

    pub async fn stop(&self, task_id: &str) -> Result<StreamTask> {
        self.control(task_id, StreamAction::Stop).await
    }

    /// Clear an `error` task back to `created` so it can be redeployed.
    ///
    /// Any query left on the engine by the failed action is dropped first.
    pub async fn acknowledge_error(&self, task_id: &str) -> Result<StreamTask> {
        let _guard = self.locks.lock(task_id).await;
        let task = self.load_task(task_id).await?;
        self.check_transition(&task, StreamAction::Acknowledge)?;

        self.drop_stream(&task, StreamAction::Acknowledge).await?;
        let updated = self
            .set_status(&task.id, StreamStatus::Created, None)
            .await?;
        self.log(&task.id, TaskLogLevel::Info, "Error acknowledged; ready to redeploy")
            .await;
        info!(task_id, "Stream task error acknowledged");
        Ok(updated)
    }

    /// Delete a task that is not live on the engine.
    pub async fn delete_stream(&self, task_id: &str) -> Result<()> {
        let _guard = self.locks.lock(task_id).await;
        let task = self.load_task(task_id).await?;
        self.check_transition(&task, StreamAction::Delete)?;

        if task.status == StreamStatus::Error {
            self.drop_stream(&task, StreamAction::Delete).await?;
        }

        let metadata = self.metadata.as_ref();
        self.catalog("delete_stream_task", move || {
            metadata.delete_stream_task(task_id)
        })
        .await?;
        self.locks.remove(task_id).await;
        info!(task_id, stream = %task.stream_name, "Stream task deleted");
        Ok(())
    }

    pub async fn status(&self, task_id: &str) -> Result<StreamTask> {
        self.load_task(task_id).await
    }

    pub async fn logs(&self, task_id: &str) -> Result<Vec<TaskLogEntry>> {
        self.load_task(task_id).await?;
        let metadata = self.metadata.as_ref();
        self.catalog("list_task_logs", move || metadata.list_task_logs(task_id))
            .await
    }

    pub async fn list(&self, category_code: Option<&str>) -> Result<Vec<StreamTask>> {
        let metadata = self.metadata.as_ref();
        self.catalog("list_stream_tasks", move || {
            metadata.list_stream_tasks(category_code)
        })
        .await
    }

    // ============================================================
    // TRANSITIONS
    // ============================================================

    async fn control(&self, task_id: &str, action: StreamAction) -> Result<StreamTask> {
        let _guard = self.locks.lock(task_id).await;
        let task = self.load_task(task_id).await?;
        self.check_transition(&task, action)?;

        let stream = quote_ident(&task.stream_name);
        let statement = match action {
            StreamAction::Pause => format!("PAUSE STREAM {}", stream),
            StreamAction::Resume => format!("RESUME STREAM {}", stream),
            _ => format!("DROP STREAM IF EXISTS {}", stream),
        };
        self.run_transition(&task, action, &statement).await
    }

    fn check_transition(&self, task: &StreamTask, action: StreamAction) -> Result<StreamStatus> {
        action
            .next_status(task.status)
            .ok_or_else(|| StreamError::StateConflict {
                task_id: task.id.clone(),
                status: task.status,
                action,
            })
    }

    /// Issue `statement` and record the outcome.
    ///
    /// - success: the task moves to the action's next state
    /// - engine rejection: the task moves to `error` with the engine message
    /// - exhausted retries: the task keeps its state; the failure is logged
    async fn run_transition(
        &self,
        task: &StreamTask,
        action: StreamAction,
        statement: &str,
    ) -> Result<StreamTask> {
        let next = self.check_transition(task, action)?;
        let engine = self.engine.as_ref();
        let outcome = retry_with_backoff(&self.policy, action.as_str(), move || {
            engine.execute(statement)
        })
        .await;

        match outcome {
            Ok(_) => {
                let updated = self.set_status(&task.id, next, None).await?;
                self.log(
                    &task.id,
                    TaskLogLevel::Info,
                    &format!("{}: {} -> {}", action, task.status, next),
                )
                .await;
                info!(
                    task_id = %task.id,
                    stream = %task.stream_name,
                    from = %task.status,
                    to = %next,
                    "Stream task transitioned"
                );
                Ok(updated)
            }
            Err(failure) if failure.is_exhausted() => {
                let cause = failure.error.to_string();
                self.log(
                    &task.id,
                    TaskLogLevel::Warn,
                    &format!(
                        "{} failed after {} attempts: {}",
                        action, failure.attempts, cause
                    ),
                )
                .await;
                warn!(task_id = %task.id, %action, attempts = failure.attempts, %cause, "Stream action exhausted retries");
                Err(StreamError::Transient {
                    operation: format!("{} {}", action, task.stream_name),
                    attempts: failure.attempts,
                    cause,
                })
            }
            Err(failure) => {
                let message = failure.error.to_string();
                if action.fails_into_error() {
                    self.set_status(&task.id, StreamStatus::Error, Some(&message))
                        .await?;
                }
                self.log(
                    &task.id,
                    TaskLogLevel::Error,
                    &format!("{} rejected by engine: {}", action, message),
                )
                .await;
                error!(task_id = %task.id, %action, %message, "Engine rejected stream action");
                Err(StreamError::Engine {
                    task_id: task.id.clone(),
                    action,
                    message,
                })
            }
        }
    }

    /// Drop whatever query the task may have left on the engine.
    async fn drop_stream(&self, task: &StreamTask, action: StreamAction) -> Result<()> {
        let statement = format!("DROP STREAM IF EXISTS {}", quote_ident(&task.stream_name));
        let engine = self.engine.as_ref();
        let statement = statement.as_str();
        retry_with_backoff(&self.policy, "drop stream", move || {
            engine.execute(statement)
        })
        .await
        .map(|_| ())
        .map_err(|failure| {
            if failure.is_exhausted() {
                StreamError::Transient {
                    operation: format!("{} {}", action, task.stream_name),
                    attempts: failure.attempts,
                    cause: failure.error.to_string(),
                }
            } else {
                StreamError::Engine {
                    task_id: task.id.clone(),
                    action,
                    message: failure.error.to_string(),
                }
            }
        })
    }

    // ============================================================
    // HELPERS
    // ============================================================

    async fn ensure_no_live_generation(&self, task: &StreamTask) -> Result<()> {
        let metadata = self.metadata.as_ref();
        let category = task.category_code.as_str();
        let tasks = self
            .catalog("list_stream_tasks", move || {
                metadata.list_stream_tasks(Some(category))
            })
            .await?;

        match tasks.into_iter().find(|t| {
            t.id != task.id
                && t.feature_name == task.feature_name
                && matches!(t.status, StreamStatus::Running | StreamStatus::Paused)
        }) {
            Some(live) => {
                warn!(
                    task_id = %task.id,
                    live_task_id = %live.id,
                    generation = live.generation,
                    "Deploy blocked by a live generation"
                );
                Err(StreamError::GenerationLive {
                    task_id: task.id.clone(),
                    live_task_id: live.id,
                    generation: live.generation,
                })
            }
            None => Ok(()),
        }
    }

    async fn validated(
        &self,
        category_code: &str,
        raw: &serde_json::Value,
    ) -> Result<(AssetCategory, FeatureConfig)> {
        let category = self.load_category(category_code).await?;
        let config = parse_feature_config(raw)?;
        self.check_against_catalog(&category, &config).await?;
        Ok((category, config))
    }

    async fn check_against_catalog(
        &self,
        category: &AssetCategory,
        config: &FeatureConfig,
    ) -> Result<()> {
        let metadata = self.metadata.as_ref();
        let code = category.code.as_str();
        let signals = self
            .catalog("list_signals", move || metadata.list_signals(code))
            .await?;
        check_signals(category, config, &signals)?;
        Ok(())
    }

    async fn load_category(&self, code: &str) -> Result<AssetCategory> {
        let metadata = self.metadata.as_ref();
        self.catalog("get_category", move || metadata.get_category(code))
            .await?
            .ok_or_else(|| StreamError::CategoryNotFound(code.to_string()))
    }

    async fn find_feature(&self, category: &str, name: &str) -> Result<Option<FeatureDefinition>> {
        let metadata = self.metadata.as_ref();
        self.catalog("get_feature", move || metadata.get_feature(category, name))
            .await
    }

    async fn load_task(&self, task_id: &str) -> Result<StreamTask> {
        let metadata = self.metadata.as_ref();
        self.catalog("get_stream_task", move || metadata.get_stream_task(task_id))
            .await?
            .ok_or_else(|| StreamError::TaskNotFound(task_id.to_string()))
    }

    async fn set_status(
        &self,
        task_id: &str,
        status: StreamStatus,
        last_error: Option<&str>,
    ) -> Result<StreamTask> {
        let metadata = self.metadata.as_ref();
        self.catalog("update_stream_task_status", move || {
            metadata.update_stream_task_status(task_id, status, last_error)
        })
        .await
    }

    /// Append to the task log. A failed log write never fails the action.
    async fn log(&self, task_id: &str, level: TaskLogLevel, message: &str) {
        let metadata = self.metadata.as_ref();
        let written = self
            .catalog("append_task_log", move || {
                metadata.append_task_log(task_id, level, message)
            })
            .await;
        if let Err(e) = written {
            warn!(task_id, error = %e, "Failed to write task log");
        }
    }

    async fn catalog<T, F, Fut>(&self, operation: &str, call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = signalhouse_metadata::Result<T>>,
    {
        retry_with_backoff(&self.policy, operation, call)
            .await
            .map_err(|f| StreamError::from_metadata(operation, f))
    }
}

/// Lock key shared by every generation of one feature.
fn feature_lock_key(category_code: &str, feature_name: &str) -> String {
    format!("feature:{}/{}", category_code, feature_name)
}
