//! Markdown report generation.
//!
//! Each report is built from small section functions that return owned
//! strings, so sections can be tested on their own.

use crate::analysis::{direction, CorrelationStrength};
use crate::api::query::location_name;
use crate::models::{
    CorrelationReport, DocumentSummary, DocumentsReport, ReportMetadata, TagCount, TrendSummary,
    TrendsReport, User, YearBucket, YearDrilldown,
};
use anyhow::Result;
use serde::Serialize;

/// Generate the yearly trends report.
pub fn generate_trends_markdown(report: &TrendsReport, include_documents: bool) -> String {
    let mut output = String::new();

    output.push_str("# Climate-Economic Trends\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary, report.skipped_documents));
    output.push_str(&generate_buckets_section(&report.buckets));

    if let Some(ref drilldown) = report.drilldown {
        output.push_str(&generate_drilldown_section(drilldown, include_documents));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the document listing report.
pub fn generate_documents_markdown(report: &DocumentsReport) -> String {
    let mut output = String::new();

    output.push_str("# Climate Documents\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));

    if !report.per_year.is_empty() {
        output.push_str("## Documents per Year\n\n");
        output.push_str("| Year | Documents |\n");
        output.push_str("|:---|:---:|\n");
        for (year, count) in &report.per_year {
            output.push_str(&format!("| {} | {} |\n", year, count));
        }
        output.push('\n');
    }

    if !report.top_topics.is_empty() {
        output.push_str("## Top Topics\n\n");
        output.push_str(&generate_tag_table("Topic", &report.top_topics));
    }

    output.push_str("## Documents\n\n");
    output.push_str(&generate_document_table(&report.documents));
    output.push_str(&generate_footer());

    output
}

/// Generate the temperature vs. economic score report.
pub fn generate_correlation_markdown(report: &CorrelationReport, max_rows: usize) -> String {
    let mut output = String::new();

    output.push_str("# Temperature vs. Economic Score\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));

    let location = location_name(&report.location_id)
        .map(|name| format!("{} (`{}`)", name, report.location_id))
        .unwrap_or_else(|| format!("`{}`", report.location_id));
    output.push_str(&format!("**Location:** {}\n\n", location));

    output.push_str(&generate_correlation_section(report.coefficient));
    output.push_str(&generate_points_table(report, max_rows));
    output.push_str(&generate_footer());

    output
}

/// Generate a user listing.
pub fn generate_users_markdown(users: &[User]) -> String {
    let mut output = String::new();

    output.push_str("# Users\n\n");
    if users.is_empty() {
        output.push_str("No users found.\n");
        return output;
    }

    output.push_str("| Name | Email | Role | Created | ID |\n");
    output.push_str("|:---|:---|:---:|:---|:---|\n");
    for user in users {
        output.push_str(&format!(
            "| {} | {} | {} | {} | `{}` |\n",
            escape_cell(&user.name),
            escape_cell(&user.email),
            user.role,
            user.created_at.as_deref().unwrap_or("N/A"),
            user.id
        ));
    }
    output.push('\n');

    output
}

/// Serialize any report as pretty JSON.
pub fn generate_json_report<T: Serialize>(report: &T) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **API:** {}\n", metadata.api_url));
    section.push_str(&format!("- **Query:** {}\n", metadata.query));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(ref email) = metadata.requested_by {
        section.push_str(&format!("- **Requested By:** {}\n", email));
    }
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn generate_summary_section(summary: &TrendSummary, skipped: usize) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Documents | Risk | Economic | Mitigation | Risk Assessment Rate |\n");
    section.push_str("|:---:|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} | {}% |\n\n",
        summary.total_documents,
        summary.risk_mentions,
        summary.economic_mentions,
        summary.mitigation_mentions,
        summary.risk_assessment_rate
    ));

    if skipped > 0 {
        section.push_str(&format!(
            "> {} document(s) without a readable publication date were skipped.\n\n",
            skipped
        ));
    }

    section
}

fn generate_buckets_section(buckets: &[YearBucket]) -> String {
    let mut section = String::new();

    section.push_str("## By Year\n\n");

    if buckets.is_empty() {
        section.push_str("No documents matched the query.\n\n");
        return section;
    }

    section.push_str("| Year | Documents | Risk | Economic | Mitigation |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|\n");
    for bucket in buckets {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            bucket.year,
            bucket.document_count,
            bucket.risk_mention_count,
            bucket.economic_mention_count,
            bucket.mitigation_mention_count
        ));
    }
    section.push('\n');

    section
}

fn generate_drilldown_section(drilldown: &YearDrilldown, include_documents: bool) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {} in Detail\n\n", drilldown.year));

    if !drilldown.top_topics.is_empty() {
        section.push_str("### Top Topics\n\n");
        section.push_str(&generate_tag_table("Topic", &drilldown.top_topics));
    }

    if !drilldown.top_risk_types.is_empty() {
        section.push_str("### Top Risk Types\n\n");
        section.push_str(&generate_tag_table("Risk Type", &drilldown.top_risk_types));
    }

    if include_documents {
        section.push_str("### Documents\n\n");
        section.push_str(&generate_document_table(&drilldown.documents));
    }

    section
}

fn generate_tag_table(heading: &str, tags: &[TagCount]) -> String {
    let mut table = String::new();

    table.push_str(&format!("| {} | Count |\n", heading));
    table.push_str("|:---|:---:|\n");
    for tag in tags {
        table.push_str(&format!("| {} | {} |\n", escape_cell(&tag.label), tag.count));
    }
    table.push('\n');

    table
}

fn generate_document_table(documents: &[DocumentSummary]) -> String {
    if documents.is_empty() {
        return "No documents.\n\n".to_string();
    }

    let mut table = String::new();

    table.push_str("| Date | Title | Topics | Type |\n");
    table.push_str("|:---|:---|:---|:---|\n");
    for doc in documents {
        let title = match doc.pdf_url {
            Some(ref url) => format!("[{}]({})", escape_cell(&doc.title), url),
            None => escape_cell(&doc.title),
        };
        let doc_type = if doc.document_type.is_empty() {
            "N/A"
        } else {
            doc.document_type.as_str()
        };
        table.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            doc.display_date(),
            title,
            escape_cell(&doc.topic_preview()),
            escape_cell(doc_type)
        ));
    }
    table.push('\n');

    table
}

fn generate_correlation_section(coefficient: Option<f64>) -> String {
    let mut section = String::new();

    section.push_str("## Correlation\n\n");

    match coefficient {
        Some(r) if r == 0.0 => {
            section.push_str("**Correlation:** 0.0%\n\n");
            section.push_str(
                "There is no linear correlation between temperature and the economic score \
                 of documents.\n\n",
            );
        }
        Some(r) => {
            let strength = CorrelationStrength::from(r);
            section.push_str(&format!("**Correlation:** {:.1}%\n\n", r * 100.0));
            section.push_str(&format!(
                "There is a {} {} correlation between temperature and the economic score \
                 of documents, suggesting a {} economic impact.\n\n",
                strength,
                direction(r),
                strength.impact()
            ));
        }
        None => {
            section.push_str("**Correlation:** N/A\n\n");
            section.push_str(
                "Not enough variation in the data to compute a correlation.\n\n",
            );
        }
    }

    section
}

fn generate_points_table(report: &CorrelationReport, max_rows: usize) -> String {
    let mut section = String::new();

    section.push_str("## Data\n\n");
    section.push_str("| Date | Temperature | Economic Score |\n");
    section.push_str("|:---|:---:|:---:|\n");

    for point in report.points.iter().take(max_rows) {
        let score = point
            .economic_score
            .map(|s| format!("{:.1}", s))
            .unwrap_or_else(|| "N/A".to_string());
        section.push_str(&format!(
            "| {} | {:.1} | {} |\n",
            point.date, point.temperature, score
        ));
    }

    if report.points.len() > max_rows {
        section.push_str(&format!(
            "\n*Showing {} of {} data points.*\n",
            max_rows,
            report.points.len()
        ));
    }
    section.push('\n');

    section
}

/// Keep table cells on one line and free of column separators.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by climadash v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}
