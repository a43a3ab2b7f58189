//! Markdown Report Generator
//!
//! Generates documentation-friendly Markdown reports.

use anyhow::Result;

use crate::http::{ConfidenceLevel, TestResult};
use crate::reporting::{DashboardReport, ReportMetadata, ResultReport};

/// Generate Markdown for a result report
pub fn results(report: &ResultReport) -> Result<String> {
    let mut md = String::new();

    md.push_str(&format!("# {}\n\n", report.metadata.title));
    push_metadata(&mut md, &report.metadata);

    // Summary
    md.push_str("## Summary\n\n");
    md.push_str("| Metric | Value |\n|--------|-------|\n");
    md.push_str(&format!("| Tests Run | {} |\n", report.summary.total));
    md.push_str(&format!("| Vulnerable | {} |\n", report.summary.vulnerable));
    md.push_str(&format!("| Secure | {} |\n\n", report.summary.secure));

    let levels = &report.summary.risk_levels;
    md.push_str("### Vulnerabilities by Confidence\n\n");
    md.push_str("| Level | Count |\n|-------|-------|\n");
    for (level, count) in [
        (ConfidenceLevel::Critical, levels.critical),
        (ConfidenceLevel::High, levels.high),
        (ConfidenceLevel::Medium, levels.medium),
        (ConfidenceLevel::Low, levels.low),
    ] {
        md.push_str(&format!("| {} {} | {} |\n", level_emoji(level), level.as_str(), count));
    }
    md.push('\n');

    // Overview table
    md.push_str("## Results Overview\n\n");
    md.push_str("| # | Test | Status | Confidence |\n");
    md.push_str("|---|------|--------|------------|\n");
    for (idx, result) in report.results.iter().enumerate() {
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            idx + 1,
            md_escape(&result.test_name),
            status(result),
            result.confidence
        ));
    }
    md.push('\n');

    // Details
    md.push_str("## Detailed Results\n\n");
    for (idx, result) in report.results.iter().enumerate() {
        push_result(&mut md, idx, result);
    }

    push_footer(&mut md, &report.metadata);
    Ok(md)
}

/// Generate Markdown for dashboard statistics
pub fn dashboard(report: &DashboardReport) -> Result<String> {
    let mut md = String::new();
    let data = &report.data;

    md.push_str(&format!("# {}\n\n", report.metadata.title));
    push_metadata(&mut md, &report.metadata);

    md.push_str("## Statistics\n\n");
    md.push_str("| Metric | Value |\n|--------|-------|\n");
    md.push_str(&format!("| Total Tests | {} |\n", data.stats.total_tests));
    md.push_str(&format!("| Vulnerabilities | {} |\n", data.stats.vulnerabilities));
    md.push_str(&format!("| Tests | {} |\n", data.stats.tests));
    md.push_str(&format!("| Workflows | {} |\n\n", data.stats.workflows));

    md.push_str("## Risk Levels\n\n");
    md.push_str("| Level | Count |\n|-------|-------|\n");
    for (level, count) in [
        (ConfidenceLevel::Critical, data.risk_levels.critical),
        (ConfidenceLevel::High, data.risk_levels.high),
        (ConfidenceLevel::Medium, data.risk_levels.medium),
        (ConfidenceLevel::Low, data.risk_levels.low),
    ] {
        md.push_str(&format!("| {} {} | {} |\n", level_emoji(level), level.as_str(), count));
    }
    md.push('\n');

    md.push_str("## Vulnerabilities by Category\n\n");
    let categories = report.categories();
    if categories.is_empty() {
        md.push_str("_No vulnerabilities recorded._\n\n");
    } else {
        md.push_str("| Category | Count |\n|----------|-------|\n");
        for (name, count) in categories {
            md.push_str(&format!("| {} | {} |\n", md_escape(name), count));
        }
        md.push('\n');
    }

    md.push_str("## Timeline\n\n");
    let timeline = report.timeline();
    if timeline.is_empty() {
        md.push_str("_No tests recorded._\n\n");
    } else {
        md.push_str("| Month | Vulnerabilities |\n|-------|-----------------|\n");
        for (month, count) in timeline {
            md.push_str(&format!("| {} | {} |\n", md_escape(month), count));
        }
        md.push('\n');
    }

    push_footer(&mut md, &report.metadata);
    Ok(md)
}

fn push_metadata(md: &mut String, metadata: &ReportMetadata) {
    if let Some(target) = &metadata.target {
        md.push_str(&format!("- **Target:** `{}`\n", target));
    }
    md.push_str(&format!(
        "- **Generated:** {}\n\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
}

fn push_result(md: &mut String, idx: usize, result: &TestResult) {
    md.push_str(&format!(
        "### {} {}: {}\n\n",
        idx + 1,
        md_escape(&result.test_name),
        status(result)
    ));

    md.push_str(&format!("**Confidence:** {}\n\n", result.confidence));

    if !result.description.is_empty() {
        md.push_str("**Description:**\n\n");
        md.push_str(&format!("{}\n\n", result.description));
    }

    if let Some(payload) = result.payload.as_deref().filter(|p| !p.is_empty()) {
        md.push_str("**Payload:**\n\n```\n");
        md.push_str(payload);
        md.push_str("\n```\n\n");
    }

    if !result.recommendation.is_empty() {
        md.push_str("**Recommendation:**\n\n");
        md.push_str(&format!("{}\n\n", result.recommendation));
    }

    md.push_str("---\n\n");
}

fn push_footer(md: &mut String, metadata: &ReportMetadata) {
    md.push_str(&format!(
        "\n*Report generated by apiprobe v{} on {}*\n",
        metadata.client_version,
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
}

fn status(result: &TestResult) -> &'static str {
    if result.vulnerable {
        "Vulnerable"
    } else {
        "Secure"
    }
}

fn level_emoji(level: ConfidenceLevel) -> &'static str {
    match level {
        ConfidenceLevel::Critical => "🔴",
        ConfidenceLevel::High => "🟠",
        ConfidenceLevel::Medium => "🟡",
        ConfidenceLevel::Low => "🟢",
    }
}

/// Escape special Markdown characters
fn md_escape(s: &str) -> String {
    s.replace('|', "\\|")
        .replace('[', "\\[")
        .replace(']', "\\]")
        .replace('*', "\\*")
        .replace('_', "\\_")
}
