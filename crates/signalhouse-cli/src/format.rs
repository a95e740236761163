//! Output formatting for signalctl
//!
//! Results go to stdout as pretty JSON so they can be piped into `jq`;
//! status lines go to stderr.

use anyhow::Result;
use serde::Serialize;

/// Print a result as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a status line.
pub fn print_success(message: &str) {
    eprintln!("✅ {}", message);
}
