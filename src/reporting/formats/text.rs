//! Plain text Report Generator
//!
//! Terminal output; no colors so it can be piped.

use anyhow::Result;

use crate::reporting::{DashboardReport, ResultReport};

/// Generate text for a result report
pub fn results(report: &ResultReport) -> Result<String> {
    let mut out = String::new();
    let summary = &report.summary;

    if let Some(target) = &report.metadata.target {
        out.push_str(&format!("Target: {}\n", target));
    }
    out.push_str(&format!(
        "{} tests run, {} vulnerable, {} secure\n",
        summary.total, summary.vulnerable, summary.secure
    ));

    if report.results.is_empty() {
        out.push_str("\nNo results.\n");
        return Ok(out);
    }

    for result in &report.results {
        let status = if result.vulnerable { "Vulnerable" } else { "Secure" };
        out.push_str(&format!("\n{} — {}\n", result.test_name, status));
        out.push_str(&format!("  Confidence:     {}\n", result.confidence));
        out.push_str(&format!("  Description:    {}\n", result.description));
        if let Some(payload) = result.payload.as_deref().filter(|p| !p.is_empty()) {
            out.push_str(&format!("  Payload:        {}\n", payload));
        }
        out.push_str(&format!("  Recommendation: {}\n", result.recommendation));
    }

    Ok(out)
}

/// Generate text for dashboard statistics
pub fn dashboard(report: &DashboardReport) -> Result<String> {
    let mut out = String::new();
    let data = &report.data;

    out.push_str("Statistics\n");
    out.push_str(&format!("  Total tests:     {}\n", data.stats.total_tests));
    out.push_str(&format!("  Vulnerabilities: {}\n", data.stats.vulnerabilities));
    out.push_str(&format!("  Tests:           {}\n", data.stats.tests));
    out.push_str(&format!("  Workflows:       {}\n", data.stats.workflows));

    out.push_str("\nRisk levels\n");
    out.push_str(&format!("  Critical: {}\n", data.risk_levels.critical));
    out.push_str(&format!("  High:     {}\n", data.risk_levels.high));
    out.push_str(&format!("  Medium:   {}\n", data.risk_levels.medium));
    out.push_str(&format!("  Low:      {}\n", data.risk_levels.low));

    let categories = report.categories();
    if !categories.is_empty() {
        let width = categories.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
        out.push_str("\nVulnerabilities by category\n");
        for (name, count) in categories {
            out.push_str(&format!("  {:<width$}  {}\n", name, count, width = width));
        }
    }

    let timeline = report.timeline();
    if !timeline.is_empty() {
        let width = timeline.iter().map(|(month, _)| month.len()).max().unwrap_or(0);
        out.push_str("\nTimeline\n");
        for (month, count) in timeline {
            out.push_str(&format!("  {:<width$}  {}\n", month, count, width = width));
        }
    }

    Ok(out)
}
