//! Asset command handlers

use super::App;
use crate::format::print_json;
use anyhow::{anyhow, Result};
use clap::Subcommand;
use signalhouse_metadata::{AssetConfig, AssetStatus};
use std::collections::BTreeMap;

#[derive(Subcommand)]
pub enum AssetCommands {
    /// Provision an asset and its child table
    Create {
        category: String,
        code: String,

        #[arg(short, long)]
        name: Option<String>,

        /// Attribute as key=value (value parsed as JSON when possible)
        #[arg(short, long = "attr")]
        attributes: Vec<String>,
    },

    /// List a category's assets
    List { category: String },
}

/// Parse `key=value` pairs into an attribute bag.
pub fn parse_attributes(pairs: &[String]) -> Result<BTreeMap<String, serde_json::Value>> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("Attribute '{}' is not key=value", pair))?;
            let value = serde_json::from_str(value)
                .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
            Ok((key.trim().to_string(), value))
        })
        .collect()
}

pub async fn handle_asset_command(app: &App, command: AssetCommands) -> Result<()> {
    match command {
        AssetCommands::Create {
            category,
            code,
            name,
            attributes,
        } => {
            let asset = app
                .sync
                .provision_asset(AssetConfig {
                    category_code: category,
                    name: name.unwrap_or_else(|| code.clone()),
                    code,
                    attributes: parse_attributes(&attributes)?,
                    status: AssetStatus::Active,
                })
                .await?;
            print_json(&asset)
        }
        AssetCommands::List { category } => print_json(&app.metadata.list_assets(&category).await?),
    }
}
