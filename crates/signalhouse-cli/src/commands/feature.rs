//! Feature command handlers

use super::{read_json, App};
use crate::format::print_json;
use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum FeatureCommands {
    /// Register (or update) a feature from a JSON file, `-` for stdin
    Register { category: String, file: PathBuf },

    /// List a category's features
    List { category: String },

    /// Show the stream SQL for a registered feature, or preview a file
    Compile {
        category: String,

        /// Registered feature name
        #[arg(required_unless_present = "file")]
        name: Option<String>,

        /// Preview an unregistered config instead
        #[arg(long, conflicts_with = "name")]
        file: Option<PathBuf>,
    },
}

pub async fn handle_feature_command(app: &App, command: FeatureCommands) -> Result<()> {
    match command {
        FeatureCommands::Register { category, file } => {
            let raw = read_json(&file)?;
            print_json(&app.streams.register_feature(&category, &raw).await?)
        }
        FeatureCommands::List { category } => {
            print_json(&app.metadata.list_features(&category).await?)
        }
        FeatureCommands::Compile {
            category,
            name,
            file,
        } => {
            let compiled = match (name, file) {
                (_, Some(file)) => {
                    let raw = read_json(&file)?;
                    app.streams.preview_stream(&category, &raw).await?
                }
                (Some(name), None) => app.streams.compile_feature(&category, &name).await?,
                (None, None) => anyhow::bail!("Either a feature name or --file is required"),
            };
            print_json(&compiled)
        }
    }
}
