//! Signal command handlers

use super::App;
use crate::format::print_json;
use anyhow::Result;
use clap::Subcommand;
use signalhouse_metadata::{SignalConfig, SignalDataType};

#[derive(Subcommand)]
pub enum SignalCommands {
    /// Add a signal to a category
    Add {
        category: String,
        code: String,

        /// numeric, integer, boolean, string or timestamp
        #[arg(short = 't', long = "type")]
        data_type: SignalDataType,

        /// Display name (defaults to the code)
        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        unit: Option<String>,

        /// Keep the signal out of the super-table
        #[arg(long)]
        not_stored: bool,

        #[arg(long)]
        realtime: bool,

        #[arg(long)]
        feature: bool,

        #[arg(long)]
        min: Option<f64>,

        #[arg(long)]
        max: Option<f64>,

        /// Column position
        #[arg(long, default_value = "0")]
        order: i32,
    },

    /// List a category's signals
    List { category: String },
}

pub async fn handle_signal_command(app: &App, command: SignalCommands) -> Result<()> {
    match command {
        SignalCommands::Add {
            category,
            code,
            data_type,
            name,
            unit,
            not_stored,
            realtime,
            feature,
            min,
            max,
            order,
        } => {
            let mut config = SignalConfig::stored(category, code, data_type);
            if let Some(name) = name {
                config.name = name;
            }
            config.unit = unit;
            config.is_stored = !not_stored;
            config.is_realtime = realtime;
            config.is_feature = feature;
            config.min_value = min;
            config.max_value = max;
            config.display_order = order;

            print_json(&app.metadata.add_signal(config).await?)
        }
        SignalCommands::List { category } => {
            print_json(&app.metadata.list_signals(&category).await?)
        }
    }
}
