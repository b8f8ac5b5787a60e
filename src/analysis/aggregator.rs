//! Document aggregation and statistics.
//!
//! This module buckets documents by publication year, counts keyword
//! mentions through a configurable rule list, and builds the topic and
//! risk-type frequency tables used by the trends report.

use crate::models::{Document, DocumentSummary, TagCount, YearBucket, YearDrilldown, TOPIC_LABEL_MAX};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Number of entries shown in drilldown rankings.
pub const DRILLDOWN_TOP_N: usize = 5;

/// Counter a keyword rule increments on a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionCounter {
    /// Also tallies the document's subtopics as risk types.
    Risk,
    Economic,
    Mitigation,
}

/// A keyword set mapped to the counter it increments.
///
/// A rule matches when any keyword is a substring of the document's
/// lowercased text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub counter: MentionCounter,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new(counter: MentionCounter, keywords: &[&str]) -> Self {
        Self {
            counter,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Check the rule against already-lowercased text.
    pub fn matches(&self, text: &str) -> bool {
        self.keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && text.contains(&k))
    }
}

/// The stock rule set: risk, economic and mitigation mentions.
pub fn default_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new(MentionCounter::Risk, &["risk"]),
        KeywordRule::new(MentionCounter::Economic, &["economic", "gdp", "growth"]),
        KeywordRule::new(MentionCounter::Mitigation, &["mitigation", "adaptation"]),
    ]
}

/// Counters hit by a document. Each counter is reported once even when
/// several rules for it match.
pub fn matched_counters(doc: &Document, rules: &[KeywordRule]) -> BTreeSet<MentionCounter> {
    let text = doc.keyword_text();
    rules
        .iter()
        .filter(|rule| rule.matches(&text))
        .map(|rule| rule.counter)
        .collect()
}

/// Aggregate documents into yearly buckets, ascending by year.
///
/// Documents without a parseable publication date are skipped.
pub fn aggregate(documents: &[Document], rules: &[KeywordRule]) -> Vec<YearBucket> {
    let mut buckets: BTreeMap<i32, YearBucket> = BTreeMap::new();

    for doc in documents {
        let Some(date) = doc.published_on() else {
            warn!(
                "Skipping document {:?} with unparseable date {:?}",
                doc.id, doc.publication_date
            );
            continue;
        };

        let year = chrono::Datelike::year(&date);
        let bucket = buckets.entry(year).or_insert_with(|| YearBucket::new(year));
        bucket.document_count += 1;

        for counter in matched_counters(doc, rules) {
            match counter {
                MentionCounter::Risk => {
                    bucket.risk_mention_count += 1;
                    for tag in &doc.subtopic_tags {
                        *bucket.risk_type_frequency.entry(tag.clone()).or_default() += 1;
                    }
                }
                MentionCounter::Economic => bucket.economic_mention_count += 1,
                MentionCounter::Mitigation => bucket.mitigation_mention_count += 1,
            }
        }

        for tag in &doc.topic_tags {
            *bucket
                .topic_frequency
                .entry(tag.trim().to_string())
                .or_default() += 1;
        }
    }

    debug!(
        "Aggregated {} documents into {} year buckets",
        documents.len(),
        buckets.len()
    );

    buckets.into_values().collect()
}

/// Rank a frequency table by count (highest first), ties by label.
pub fn rank_frequencies(freq: &BTreeMap<String, usize>, n: usize) -> Vec<TagCount> {
    let mut ranked: Vec<TagCount> = freq
        .iter()
        .map(|(label, count)| TagCount {
            label: label.clone(),
            count: *count,
        })
        .collect();

    // BTreeMap iteration is already label-ordered, so a stable sort keeps ties by label.
    ranked.sort_by_key(|t| std::cmp::Reverse(t.count));
    ranked.truncate(n);
    ranked
}

/// Documents whose publication year is `year`.
pub fn documents_in_year(documents: &[Document], year: i32) -> Vec<&Document> {
    documents
        .iter()
        .filter(|d| d.published_on().map(|date| chrono::Datelike::year(&date)) == Some(year))
        .collect()
}

/// Build the drilldown for a single year, or `None` if the year has no documents.
pub fn drilldown(documents: &[Document], rules: &[KeywordRule], year: i32) -> Option<YearDrilldown> {
    let in_year: Vec<Document> = documents_in_year(documents, year)
        .into_iter()
        .cloned()
        .collect();

    let bucket = aggregate(&in_year, rules).into_iter().next()?;

    Some(YearDrilldown {
        year,
        top_topics: rank_frequencies(&bucket.topic_frequency, DRILLDOWN_TOP_N),
        top_risk_types: rank_frequencies(&bucket.risk_type_frequency, DRILLDOWN_TOP_N),
        documents: in_year.iter().map(DocumentSummary::from).collect(),
    })
}

/// Count documents per publication year, ascending.
pub fn documents_per_year(documents: &[Document]) -> Vec<(i32, usize)> {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for doc in documents {
        if let Some(date) = doc.published_on() {
            *counts.entry(chrono::Datelike::year(&date)).or_default() += 1;
        }
    }
    counts.into_iter().collect()
}

/// Most frequent topics across all documents, labels shortened for display.
pub fn top_topics(documents: &[Document], n: usize) -> Vec<TagCount> {
    let mut freq: BTreeMap<String, usize> = BTreeMap::new();
    for tag in documents.iter().flat_map(|d| &d.topic_tags) {
        *freq.entry(tag.clone()).or_default() += 1;
    }

    rank_frequencies(&freq, n)
        .into_iter()
        .map(|t| TagCount {
            label: shorten_label(&t.label, TOPIC_LABEL_MAX),
            count: t.count,
        })
        .collect()
}

fn shorten_label(label: &str, max: usize) -> String {
    if label.chars().count() > max {
        let head: String = label.chars().take(max).collect();
        format!("{}...", head)
    } else {
        label.to_string()
    }
}
