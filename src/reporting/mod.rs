//! Report Generation Module
//!
//! Renders test results and dashboard statistics in various formats:
//! - Text (terminal)
//! - Markdown (documentation-friendly)
//! - JSON (machine-readable)

pub mod formats;

use anyhow::Result;
use chrono::{DateTime, Month, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::http::models::{DashboardData, RiskLevels};
use crate::http::{ConfidenceLevel, TestResult};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Markdown,
    Json,
}

impl OutputFormat {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str())? {
            "md" | "markdown" => Some(OutputFormat::Markdown),
            "json" => Some(OutputFormat::Json),
            "txt" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Report title
    pub title: String,
    /// Tested API URL, when known
    pub target: Option<String>,
    /// Client version
    pub client_version: String,
    /// Report generation time
    pub generated_at: DateTime<Utc>,
}

impl Default for ReportMetadata {
    fn default() -> Self {
        Self {
            title: "API Security Test Results".to_string(),
            target: None,
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
        }
    }
}

impl ReportMetadata {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Summary statistics for a result set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Number of tests run
    pub total: usize,
    /// Tests that found a vulnerability
    pub vulnerable: usize,
    /// Tests that found nothing
    pub secure: usize,
    /// Vulnerable results bucketed by confidence
    pub risk_levels: RiskLevels,
}

impl ReportSummary {
    /// Calculate summary from results
    pub fn from_results(results: &[TestResult]) -> Self {
        let mut risk_levels = RiskLevels {
            critical: 0,
            high: 0,
            medium: 0,
            low: 0,
        };

        for result in results.iter().filter(|r| r.vulnerable) {
            let bucket = match result.confidence.level() {
                ConfidenceLevel::Critical => &mut risk_levels.critical,
                ConfidenceLevel::High => &mut risk_levels.high,
                ConfidenceLevel::Medium => &mut risk_levels.medium,
                ConfidenceLevel::Low => &mut risk_levels.low,
            };
            *bucket += 1;
        }

        let vulnerable = results.iter().filter(|r| r.vulnerable).count();
        Self {
            total: results.len(),
            vulnerable,
            secure: results.len() - vulnerable,
            risk_levels,
        }
    }
}

/// Results of one submission or of the stored history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultReport {
    pub metadata: ReportMetadata,
    pub summary: ReportSummary,
    pub results: Vec<TestResult>,
}

impl ResultReport {
    pub fn new(results: Vec<TestResult>, metadata: ReportMetadata) -> Self {
        let summary = ReportSummary::from_results(&results);
        Self {
            metadata,
            summary,
            results,
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Text => formats::text::results(self),
            OutputFormat::Markdown => formats::markdown::results(self),
            OutputFormat::Json => formats::json::generate(self),
        }
    }

    /// Save report to file, choosing the format from the extension
    pub fn save(&self, path: &Path) -> Result<()> {
        let format = OutputFormat::from_path(path).unwrap_or(OutputFormat::Json);
        std::fs::write(path, self.render(format)?)?;
        Ok(())
    }
}

/// Dashboard statistics as returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    pub metadata: ReportMetadata,
    pub data: DashboardData,
}

impl DashboardReport {
    pub fn new(data: DashboardData, metadata: ReportMetadata) -> Self {
        Self { metadata, data }
    }

    /// Categories with the most vulnerabilities first, ties by name
    pub fn categories(&self) -> Vec<(&str, u64)> {
        let mut categories: Vec<(&str, u64)> = self
            .data
            .categories
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        categories
    }

    /// Timeline in calendar order
    ///
    /// Keys are month names; anything that is not a month sorts last.
    pub fn timeline(&self) -> Vec<(&str, u64)> {
        timeline_in_month_order(&self.data.timeline)
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Text => formats::text::dashboard(self),
            OutputFormat::Markdown => formats::markdown::dashboard(self),
            OutputFormat::Json => formats::json::generate(self),
        }
    }
}

fn timeline_in_month_order(timeline: &BTreeMap<String, u64>) -> Vec<(&str, u64)> {
    let mut entries: Vec<(Option<u32>, &str, u64)> = timeline
        .iter()
        .map(|(key, count)| {
            let month = key.parse::<Month>().ok().map(|m| m.number_from_month());
            (month, key.as_str(), *count)
        })
        .collect();

    entries.sort_by(|a, b| match (a.0, b.0) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.1.cmp(b.1),
    });

    entries.into_iter().map(|(_, key, count)| (key, count)).collect()
}
