//! Temperature / economic score correlation.
//!
//! Documents are scored by how much of a fixed economic vocabulary they
//! mention, scores are averaged per calendar month, joined with daily
//! temperature samples, and Pearson's r is computed over the joined series.

use crate::analysis::AnalysisError;
use crate::models::{CombinedPoint, Document, TemperatureSample};
use chrono::Datelike;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// The stock economic vocabulary.
pub const DEFAULT_ECONOMIC_VOCABULARY: [&str; 7] = [
    "economic growth",
    "gdp",
    "economy",
    "financial",
    "market",
    "investment",
    "development",
];

pub fn default_vocabulary() -> Vec<String> {
    DEFAULT_ECONOMIC_VOCABULARY
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Percentage (0-100) of `vocabulary` found in the document's title and tags.
pub fn score(document: &Document, vocabulary: &[String]) -> f64 {
    if vocabulary.is_empty() {
        return 0.0;
    }

    let text = document.scoring_text();
    let matched = vocabulary
        .iter()
        .filter(|k| text.contains(&k.to_lowercase()))
        .count();

    (matched as f64 / vocabulary.len() as f64) * 100.0
}

/// Join temperature samples with the mean economic score of their month.
///
/// Samples whose month has no documents are dropped. The result is sorted
/// ascending by date; an empty result is reported as
/// [`AnalysisError::NoMatchingData`].
pub fn combine(
    samples: &[TemperatureSample],
    documents: &[Document],
    vocabulary: &[String],
) -> Result<Vec<CombinedPoint>, AnalysisError> {
    // (year, month) -> (score sum, document count)
    let mut monthly: HashMap<(i32, u32), (f64, usize)> = HashMap::new();

    for doc in documents {
        match doc.published_on() {
            Some(date) => {
                let entry = monthly.entry((date.year(), date.month())).or_default();
                entry.0 += score(doc, vocabulary);
                entry.1 += 1;
            }
            None => warn!(
                "Ignoring document {:?} with unparseable date {:?}",
                doc.id, doc.publication_date
            ),
        }
    }

    let mut points: Vec<CombinedPoint> = samples
        .iter()
        .map(|sample| CombinedPoint {
            date: sample.date,
            temperature: sample.value,
            economic_score: monthly
                .get(&sample.month_key())
                .map(|(sum, count)| sum / *count as f64),
        })
        .filter(|p| p.economic_score.is_some())
        .collect();

    points.sort_by_key(|p| p.date);

    debug!(
        "Combined {} temperature samples with {} scored months into {} points",
        samples.len(),
        monthly.len(),
        points.len()
    );

    if points.is_empty() {
        return Err(AnalysisError::NoMatchingData);
    }

    Ok(points)
}

/// Pearson correlation between temperature and economic score.
///
/// Deviations are `sqrt(Σ(x - x̄)²)` without dividing by N; with equal-length
/// series the N factors cancel, so this is the standard coefficient.
/// Points without a score are ignored. Fewer than two points yields `0.0`.
pub fn correlate(points: &[CombinedPoint]) -> Result<f64, AnalysisError> {
    let (temps, scores): (Vec<f64>, Vec<f64>) = points
        .iter()
        .filter_map(|p| p.economic_score.map(|s| (p.temperature, s)))
        .unzip();

    if temps.len() < 2 {
        return Ok(0.0);
    }

    let n = temps.len() as f64;
    let temp_mean = temps.iter().sum::<f64>() / n;
    let score_mean = scores.iter().sum::<f64>() / n;

    let numerator: f64 = temps
        .iter()
        .zip(&scores)
        .map(|(t, s)| (t - temp_mean) * (s - score_mean))
        .sum();

    let temp_dev = temps
        .iter()
        .map(|t| (t - temp_mean).powi(2))
        .sum::<f64>()
        .sqrt();
    let score_dev = scores
        .iter()
        .map(|s| (s - score_mean).powi(2))
        .sum::<f64>()
        .sqrt();

    if temp_dev == 0.0 || score_dev == 0.0 {
        return Err(AnalysisError::DivisionByZero);
    }

    Ok(numerator / (temp_dev * score_dev))
}

/// Coefficient fit for presentation, or `None` when the series cannot
/// support one: fewer than two scored points, or no variation.
pub fn reportable_coefficient(points: &[CombinedPoint]) -> Option<f64> {
    let scored = points.iter().filter(|p| p.economic_score.is_some()).count();
    if scored < 2 {
        warn!("Only {} scored data point(s); correlation is undefined", scored);
        return None;
    }

    match correlate(points) {
        Ok(r) if r.is_finite() => Some(r),
        Ok(r) => {
            warn!("Correlation evaluated to {}; reporting it as undefined", r);
            None
        }
        Err(e) => {
            warn!("Correlation is undefined: {}", e);
            None
        }
    }
}

/// Qualitative strength of a correlation coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationStrength {
    Weak,
    Moderate,
    Strong,
}

impl From<f64> for CorrelationStrength {
    fn from(r: f64) -> Self {
        let magnitude = r.abs();
        if magnitude > 0.7 {
            CorrelationStrength::Strong
        } else if magnitude > 0.4 {
            CorrelationStrength::Moderate
        } else {
            CorrelationStrength::Weak
        }
    }
}

impl CorrelationStrength {
    /// How much economic impact the strength suggests.
    pub fn impact(&self) -> &'static str {
        match self {
            CorrelationStrength::Strong => "significant",
            CorrelationStrength::Moderate => "moderate",
            CorrelationStrength::Weak => "limited",
        }
    }
}

impl fmt::Display for CorrelationStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationStrength::Weak => write!(f, "weak"),
            CorrelationStrength::Moderate => write!(f, "moderate"),
            CorrelationStrength::Strong => write!(f, "strong"),
        }
    }
}

/// Direction word for a coefficient.
pub fn direction(r: f64) -> &'static str {
    if r > 0.0 {
        "positive"
    } else if r < 0.0 {
        "negative"
    } else {
        "neutral"
    }
}
