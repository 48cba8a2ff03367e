pub mod doctor;
pub mod history;

use anyhow::Result;
use serde::Serialize;

/// Print a command result as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
