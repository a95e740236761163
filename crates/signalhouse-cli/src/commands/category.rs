//! Category command handlers

use super::App;
use crate::format::{print_json, print_success};
use anyhow::{anyhow, Result};
use clap::Subcommand;
use signalhouse_metadata::CategoryConfig;

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Create a new asset category
    Create {
        /// Category code (immutable)
        code: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Target time-series database
        #[arg(short, long)]
        database: String,

        /// Industry tag
        #[arg(short, long)]
        industry: Option<String>,

        /// Super-table name prefix
        #[arg(long, default_value = "raw")]
        prefix: String,
    },

    /// Show one category
    Show { code: String },

    /// List all categories
    List,

    /// Synchronize the category's super-table with its signals
    Sync {
        #[arg(required_unless_present = "all")]
        code: Option<String>,

        /// Synchronize every active category in parallel
        #[arg(long, conflicts_with_all = ["code", "force"])]
        all: bool,

        /// Inspect the engine even if the recorded fingerprint matches
        #[arg(long)]
        force: bool,
    },

    /// Soft-disable a category
    Disable { code: String },

    /// Re-enable a disabled category
    Enable { code: String },

    /// Delete a category with no assets
    Delete { code: String },
}

pub async fn handle_category_command(app: &App, command: CategoryCommands) -> Result<()> {
    match command {
        CategoryCommands::Create {
            code,
            name,
            database,
            industry,
            prefix,
        } => {
            let category = app
                .metadata
                .create_category(CategoryConfig {
                    code,
                    name,
                    industry,
                    database,
                    stable_prefix: prefix,
                })
                .await?;
            print_json(&category)
        }
        CategoryCommands::Show { code } => {
            let category = app
                .metadata
                .get_category(&code)
                .await?
                .ok_or_else(|| anyhow!("Category not found: {}", code))?;
            print_json(&category)
        }
        CategoryCommands::List => print_json(&app.metadata.list_categories().await?),
        CategoryCommands::Sync { all: true, .. } => {
            let mut failed = 0;
            let mut report = serde_json::Map::new();
            for (code, outcome) in app.sync.sync_all_categories().await? {
                let entry = match outcome {
                    Ok(result) if result.is_complete() => serde_json::to_value(&result)?,
                    Ok(result) => {
                        failed += 1;
                        serde_json::to_value(&result)?
                    }
                    Err(e) => {
                        failed += 1;
                        serde_json::json!({ "error": e.to_string() })
                    }
                };
                report.insert(code, entry);
            }
            print_json(&report)?;
            if failed > 0 {
                return Err(anyhow!("{} category sync(s) did not complete", failed));
            }
            Ok(())
        }
        CategoryCommands::Sync { code, force, .. } => {
            let code = code.ok_or_else(|| anyhow!("A category code or --all is required"))?;
            let result = if force {
                app.sync.resync_category_schema(&code).await?
            } else {
                app.sync.sync_category_schema(&code).await?
            };
            print_json(&result)?;
            if !result.is_complete() {
                return Err(anyhow!(
                    "{} signal(s) of {} were rejected",
                    result.rejected.len(),
                    code
                ));
            }
            Ok(())
        }
        CategoryCommands::Disable { code } => {
            app.metadata.set_category_active(&code, false).await?;
            print_success(&format!("Category {} disabled", code));
            Ok(())
        }
        CategoryCommands::Enable { code } => {
            app.metadata.set_category_active(&code, true).await?;
            print_success(&format!("Category {} enabled", code));
            Ok(())
        }
        CategoryCommands::Delete { code } => {
            app.metadata.delete_category(&code).await?;
            print_success(&format!("Category {} deleted", code));
            Ok(())
        }
    }
}
