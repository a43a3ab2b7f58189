//! JSON Report Generator
//!
//! Generates machine-readable JSON reports.

use anyhow::Result;
use serde::Serialize;

/// Generate pretty-printed JSON for any report
pub fn generate<T: Serialize>(report: &T) -> Result<String> {
    let json = serde_json::to_string_pretty(report)?;
    Ok(json)
}
