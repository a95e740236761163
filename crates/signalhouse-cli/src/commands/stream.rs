//! Stream task command handlers

use super::App;
use crate::format::{print_json, print_success};
use anyhow::Result;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum StreamCommands {
    /// Create a task from a registered feature (not yet deployed)
    Create { category: String, feature: String },

    /// Issue the task's continuous query
    Deploy { id: String },

    Pause { id: String },

    Resume { id: String },

    /// Drop the continuous query (terminal)
    Stop { id: String },

    /// Acknowledge an error so the task can be redeployed
    Ack { id: String },

    /// Delete a task that is not running or paused
    Delete { id: String },

    Status { id: String },

    Logs { id: String },

    List {
        #[arg(short, long)]
        category: Option<String>,
    },
}

pub async fn handle_stream_command(app: &App, command: StreamCommands) -> Result<()> {
    let streams = &app.streams;
    match command {
        StreamCommands::Create { category, feature } => {
            print_json(&streams.create_stream(&category, &feature).await?)
        }
        StreamCommands::Deploy { id } => {
            if streams.deploy(&id).await? {
                print_success(&format!("Stream task {} deployed", id));
            } else {
                print_success(&format!("Stream task {} already running", id));
            }
            print_json(&streams.status(&id).await?)
        }
        StreamCommands::Pause { id } => print_json(&streams.pause(&id).await?),
        StreamCommands::Resume { id } => print_json(&streams.resume(&id).await?),
        StreamCommands::Stop { id } => print_json(&streams.stop(&id).await?),
        StreamCommands::Ack { id } => print_json(&streams.acknowledge_error(&id).await?),
        StreamCommands::Delete { id } => {
            streams.delete_stream(&id).await?;
            print_success(&format!("Stream task {} deleted", id));
            Ok(())
        }
        StreamCommands::Status { id } => print_json(&streams.status(&id).await?),
        StreamCommands::Logs { id } => print_json(&streams.logs(&id).await?),
        StreamCommands::List { category } => print_json(&streams.list(category.as_deref()).await?),
    }
}
