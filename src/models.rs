//! Data models for the climate dashboard.
//!
//! This module contains the core data structures used throughout the
//! application: documents and temperature samples as fetched from the API,
//! the aggregates derived from them, users, and the report envelopes.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum characters kept for a topic label in document listings.
pub const TOPIC_LABEL_MAX: usize = 30;

/// Parse a publication or sample date.
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DDTHH:MM:SS[.fff]`,
/// `YYYY-MM-DD HH:MM:SS` and plain `YYYY-MM-DD`. Returns `None` for
/// anything else.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }

    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Split a comma-separated tag list, trimming entries and dropping empties.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// A climate document as returned by the documents endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDocument")]
pub struct Document {
    /// Document identifier (falls back to the response map key).
    pub id: String,
    /// Publication date exactly as received; parsed on demand.
    pub publication_date: String,
    /// Display title.
    pub title: String,
    /// Topic tags, in source order.
    pub topic_tags: Vec<String>,
    /// Subtopic tags, in source order.
    pub subtopic_tags: Vec<String>,
    /// Document type (report, brief, ...).
    pub document_type: String,
    /// Link to the PDF rendition, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

/// Wire shape of a document.
#[derive(Debug, Default, Deserialize)]
struct RawDocument {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, alias = "publication_date")]
    docdt: Option<String>,
    #[serde(default, alias = "title")]
    display_title: Option<String>,
    #[serde(default)]
    teratopic: Option<String>,
    #[serde(default)]
    subtopic: Option<String>,
    #[serde(default, alias = "document_type")]
    docty: Option<String>,
    #[serde(default, alias = "pdf_url")]
    pdfurl: Option<String>,
}

impl From<RawDocument> for Document {
    fn from(raw: RawDocument) -> Self {
        Self {
            id: raw.id.unwrap_or_default(),
            publication_date: raw.docdt.unwrap_or_default(),
            title: raw.display_title.unwrap_or_default(),
            topic_tags: raw.teratopic.as_deref().map(split_tags).unwrap_or_default(),
            subtopic_tags: raw.subtopic.as_deref().map(split_tags).unwrap_or_default(),
            document_type: raw.docty.unwrap_or_default(),
            pdf_url: raw.pdfurl.filter(|u| !u.trim().is_empty()),
        }
    }
}

impl Document {
    /// Parsed publication date, or `None` if it cannot be understood.
    pub fn published_on(&self) -> Option<NaiveDate> {
        parse_date(&self.publication_date)
    }

    /// Lowercased title, tags and document type used for keyword rules.
    pub fn keyword_text(&self) -> String {
        let mut parts = self.scoring_parts();
        if !self.document_type.is_empty() {
            parts.push(self.document_type.clone());
        }
        parts.join(" ").to_lowercase()
    }

    /// Lowercased title and tags used for the economic score.
    pub fn scoring_text(&self) -> String {
        self.scoring_parts().join(" ").to_lowercase()
    }

    fn scoring_parts(&self) -> Vec<String> {
        [
            self.title.clone(),
            self.topic_tags.join(", "),
            self.subtopic_tags.join(", "),
        ]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect()
    }
}

/// Per-calendar-year aggregate of documents and keyword mentions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearBucket {
    pub year: i32,
    pub document_count: usize,
    pub risk_mention_count: usize,
    pub economic_mention_count: usize,
    pub mitigation_mention_count: usize,
    /// Topic tag -> number of documents carrying it.
    pub topic_frequency: BTreeMap<String, usize>,
    /// Subtopic tag -> number of risk-mentioning documents carrying it.
    pub risk_type_frequency: BTreeMap<String, usize>,
}

impl YearBucket {
    /// Creates an empty bucket for `year`.
    pub fn new(year: i32) -> Self {
        Self {
            year,
            ..Self::default()
        }
    }
}

/// Totals across all year buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub years: usize,
    pub total_documents: usize,
    pub risk_mentions: usize,
    pub economic_mentions: usize,
    pub mitigation_mentions: usize,
    /// Share of documents mentioning risk, rounded to a whole percent.
    pub risk_assessment_rate: u32,
}

impl TrendSummary {
    /// Creates a summary from a list of buckets.
    pub fn from_buckets(buckets: &[YearBucket]) -> Self {
        let mut summary = Self {
            years: buckets.len(),
            ..Self::default()
        };

        for bucket in buckets {
            summary.total_documents += bucket.document_count;
            summary.risk_mentions += bucket.risk_mention_count;
            summary.economic_mentions += bucket.economic_mention_count;
            summary.mitigation_mentions += bucket.mitigation_mention_count;
        }

        if summary.total_documents > 0 {
            let rate = summary.risk_mentions as f64 / summary.total_documents as f64 * 100.0;
            summary.risk_assessment_rate = rate.round() as u32;
        }

        summary
    }
}

/// A label with its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub label: String,
    pub count: usize,
}

/// Condensed view of a document for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub date: Option<NaiveDate>,
    pub topics: Vec<String>,
    pub document_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            date: doc.published_on(),
            topics: doc.topic_tags.clone(),
            document_type: doc.document_type.clone(),
            pdf_url: doc.pdf_url.clone(),
        }
    }
}

impl DocumentSummary {
    /// First two topics, with an ellipsis when more exist.
    pub fn topic_preview(&self) -> String {
        if self.topics.is_empty() {
            return "N/A".to_string();
        }
        let mut preview = self
            .topics
            .iter()
            .take(2)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if self.topics.len() > 2 {
            preview.push_str("...");
        }
        preview
    }

    /// Date formatted for display, `N/A` when unknown.
    pub fn display_date(&self) -> String {
        self.date
            .map(|d| d.format("%b %-d, %Y").to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// Detailed breakdown of a single year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearDrilldown {
    pub year: i32,
    pub top_topics: Vec<TagCount>,
    pub top_risk_types: Vec<TagCount>,
    pub documents: Vec<DocumentSummary>,
}

/// A single temperature observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureSample {
    pub date: NaiveDate,
    pub value: f64,
    pub unit: String,
}

impl TemperatureSample {
    /// Calendar (year, month) key used to join with documents.
    pub fn month_key(&self) -> (i32, u32) {
        (self.date.year(), self.date.month())
    }
}

/// Temperature joined with the mean economic score of its month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedPoint {
    pub date: NaiveDate,
    pub temperature: f64,
    /// Mean economic score of documents published in the same month.
    pub economic_score: Option<f64>,
}

/// Role assigned to an account by the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    SuperAdmin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::SuperAdmin => write!(f, "super_admin"),
        }
    }
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(
        default,
        rename = "createdAt",
        alias = "created_at",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<String>,
}

impl User {
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

/// Metadata common to every report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Base URL of the API that served the data.
    pub api_url: String,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Human-readable description of the query filters.
    pub query: String,
    /// Email of the signed-in user, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    /// Duration of fetch and analysis in seconds.
    pub duration_seconds: f64,
}

/// Yearly climate-economic trends report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendsReport {
    pub metadata: ReportMetadata,
    pub summary: TrendSummary,
    pub buckets: Vec<YearBucket>,
    /// Documents discarded because their date could not be parsed.
    pub skipped_documents: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drilldown: Option<YearDrilldown>,
}

/// Document listing report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsReport {
    pub metadata: ReportMetadata,
    /// Document count per publication year, ascending.
    pub per_year: Vec<(i32, usize)>,
    pub top_topics: Vec<TagCount>,
    pub documents: Vec<DocumentSummary>,
}

/// Temperature vs. economic score correlation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub metadata: ReportMetadata,
    pub location_id: String,
    pub points: Vec<CombinedPoint>,
    /// `None` when the series is degenerate.
    pub coefficient: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2021, 5, 1).unwrap();
        assert_eq!(parse_date("2021-05-01"), Some(expected));
        assert_eq!(parse_date("2021-05-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_date("2021-05-01T10:30:00"), Some(expected));
        assert_eq!(parse_date("2021-05-01T10:30:00.250"), Some(expected));
        assert_eq!(parse_date("2021-05-01 10:30:00"), Some(expected));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2021-13-01"), None);
    }

    #[test]
    fn test_split_tags() {
        assert_eq!(
            split_tags("Climate Change, Energy ,,Water"),
            vec!["Climate Change", "Energy", "Water"]
        );
        assert!(split_tags("").is_empty());
        assert!(split_tags(" , ").is_empty());
    }

    #[test]
    fn test_document_from_wire_json() {
        let json = r#"{
            "id": "D123",
            "docdt": "2021-05-01T00:00:00Z",
            "display_title": "Climate Risk Report",
            "teratopic": "Climate Change,Environment",
            "subtopic": "Flood Risk, Drought",
            "docty": "Report",
            "pdfurl": "https://example.org/d123.pdf"
        }"#;

        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.id, "D123");
        assert_eq!(doc.title, "Climate Risk Report");
        assert_eq!(doc.topic_tags, vec!["Climate Change", "Environment"]);
        assert_eq!(doc.subtopic_tags, vec!["Flood Risk", "Drought"]);
        assert_eq!(doc.document_type, "Report");
        assert_eq!(doc.pdf_url.as_deref(), Some("https://example.org/d123.pdf"));
        assert_eq!(
            doc.published_on(),
            NaiveDate::from_ymd_opt(2021, 5, 1)
        );
    }

    #[test]
    fn test_document_missing_fields() {
        let doc: Document = serde_json::from_str("{}").unwrap();
        assert!(doc.id.is_empty());
        assert!(doc.topic_tags.is_empty());
        assert!(doc.published_on().is_none());
        assert!(doc.keyword_text().is_empty());
    }

    #[test]
    fn test_keyword_text_includes_document_type() {
        let doc: Document = serde_json::from_str(
            r#"{"display_title": "GDP Outlook", "teratopic": "Economic", "docty": "Policy Brief"}"#,
        )
        .unwrap();
        assert_eq!(doc.keyword_text(), "gdp outlook economic policy brief");
        assert_eq!(doc.scoring_text(), "gdp outlook economic");
    }

    #[test]
    fn test_trend_summary() {
        let buckets = vec![
            YearBucket {
                document_count: 3,
                risk_mention_count: 1,
                economic_mention_count: 2,
                ..YearBucket::new(2021)
            },
            YearBucket {
                document_count: 1,
                risk_mention_count: 1,
                mitigation_mention_count: 1,
                ..YearBucket::new(2022)
            },
        ];

        let summary = TrendSummary::from_buckets(&buckets);
        assert_eq!(summary.years, 2);
        assert_eq!(summary.total_documents, 4);
        assert_eq!(summary.economic_mentions, 2);
        assert_eq!(summary.mitigation_mentions, 1);
        assert_eq!(summary.risk_assessment_rate, 50);

        assert_eq!(TrendSummary::from_buckets(&[]).risk_assessment_rate, 0);
    }

    #[test]
    fn test_topic_preview() {
        let mut summary = DocumentSummary {
            id: "1".to_string(),
            title: "T".to_string(),
            date: None,
            topics: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            document_type: String::new(),
            pdf_url: None,
        };
        assert_eq!(summary.topic_preview(), "A, B...");
        assert_eq!(summary.display_date(), "N/A");

        summary.topics.truncate(1);
        summary.date = NaiveDate::from_ymd_opt(2023, 3, 9);
        assert_eq!(summary.topic_preview(), "A");
        assert_eq!(summary.display_date(), "Mar 9, 2023");

        summary.topics.clear();
        assert_eq!(summary.topic_preview(), "N/A");
    }

    #[test]
    fn test_user_accepts_mongo_id() {
        let user: User = serde_json::from_str(
            r#"{"_id": "abc", "name": "Ada", "email": "ada@example.org", "role": "super_admin", "createdAt": "2024-01-01"}"#,
        )
        .unwrap();
        assert_eq!(user.id, "abc");
        assert!(user.is_super_admin());
        assert_eq!(user.created_at.as_deref(), Some("2024-01-01"));

        let plain: User =
            serde_json::from_str(r#"{"id": "u1", "name": "Bo", "email": "bo@example.org"}"#)
                .unwrap();
        assert_eq!(plain.role, Role::User);
        assert!(!plain.is_super_admin());
    }
}
