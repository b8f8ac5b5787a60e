//! Query parameters for the climate endpoints.

use chrono::{Datelike, Days, NaiveDate};

/// Named monitoring stations accepted by `--city`.
pub const KNOWN_LOCATIONS: [(&str, &str, &str); 3] = [
    ("nyc", "CITY:US370001", "New York, US"),
    ("la", "CITY:US060001", "Los Angeles, US"),
    ("chicago", "CITY:US170001", "Chicago, US"),
];

/// Map a city alias to its location id; anything else passes through.
pub fn resolve_location(input: &str) -> String {
    let needle = input.trim().to_lowercase();
    KNOWN_LOCATIONS
        .iter()
        .find(|(alias, _, _)| *alias == needle)
        .map(|(_, id, _)| id.to_string())
        .unwrap_or_else(|| input.trim().to_string())
}

/// Display name for a location id, if it is a known one.
pub fn location_name(location_id: &str) -> Option<&'static str> {
    KNOWN_LOCATIONS
        .iter()
        .find(|(_, id, _)| *id == location_id)
        .map(|(_, _, name)| *name)
}

/// Filters for `GET /climate/documents`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilters {
    pub topic: Option<String>,
    pub region: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

impl DocumentFilters {
    /// Filters covering the `years` years up to and including `today`'s year.
    ///
    /// Returns `None` when the start year would fall outside the calendar
    /// range `chrono` supports.
    pub fn last_years(
        topic: Option<String>,
        region: Option<String>,
        years: u32,
        today: NaiveDate,
    ) -> Option<Self> {
        let end_year = today.year();
        let start_year = i32::try_from(years)
            .ok()
            .and_then(|years| end_year.checked_sub(years))
            .filter(|year| NaiveDate::from_ymd_opt(*year, 1, 1).is_some())?;

        Some(Self {
            topic,
            region,
            start_year: Some(start_year),
            end_year: Some(end_year),
        })
    }

    /// Query pairs in wire order. Unset filters are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref topic) = self.topic {
            pairs.push(("topic", topic.clone()));
        }
        if let Some(ref region) = self.region {
            pairs.push(("admreg_exact", region.clone()));
        }
        if let Some(start) = self.start_year {
            pairs.push(("startYear", start.to_string()));
        }
        if let Some(end) = self.end_year {
            pairs.push(("endYear", end.to_string()));
        }
        pairs
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref topic) = self.topic {
            parts.push(format!("topic \"{}\"", topic));
        }
        if let Some(ref region) = self.region {
            parts.push(format!("region {}", region));
        }
        match (self.start_year, self.end_year) {
            (Some(s), Some(e)) => parts.push(format!("years {}-{}", s, e)),
            (Some(s), None) => parts.push(format!("from {}", s)),
            (None, Some(e)) => parts.push(format!("until {}", e)),
            (None, None) => {}
        }
        if parts.is_empty() {
            "all documents".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Filters for `GET /climate/temperature`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemperatureFilters {
    pub location_id: String,
    pub datatype: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub units: Option<String>,
}

impl TemperatureFilters {
    /// Filters covering the `days` days ending at `today`.
    ///
    /// Returns `None` when the window reaches past the earliest date
    /// `chrono` can represent.
    pub fn last_days(
        location_id: String,
        datatype: String,
        days: u32,
        today: NaiveDate,
        units: Option<String>,
    ) -> Option<Self> {
        let start_date = today.checked_sub_days(Days::new(days.into()))?;

        Some(Self {
            location_id,
            datatype,
            start_date,
            end_date: today,
            units,
        })
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("locationId", self.location_id.clone()),
            ("datatypeid", self.datatype.clone()),
            ("startdate", self.start_date.format("%Y-%m-%d").to_string()),
            ("enddate", self.end_date.format("%Y-%m-%d").to_string()),
        ];
        if let Some(ref units) = self.units {
            pairs.push(("units", units.clone()));
        }
        pairs
    }

    pub fn describe(&self) -> String {
        let location = location_name(&self.location_id)
            .map(|name| format!("{} ({})", name, self.location_id))
            .unwrap_or_else(|| self.location_id.clone());
        format!(
            "{} at {}, {} to {}",
            self.datatype, location, self.start_date, self.end_date
        )
    }

    /// Document filters spanning the same calendar years.
    pub fn matching_documents(&self, topic: Option<String>) -> DocumentFilters {
        DocumentFilters {
            topic,
            region: None,
            start_year: Some(self.start_date.year()),
            end_year: Some(self.end_date.year()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_resolve_location() {
        assert_eq!(resolve_location("NYC"), "CITY:US370001");
        assert_eq!(resolve_location("chicago"), "CITY:US170001");
        assert_eq!(resolve_location(" CITY:XX000001 "), "CITY:XX000001");
        assert_eq!(location_name("CITY:US060001"), Some("Los Angeles, US"));
        assert_eq!(location_name("CITY:XX000001"), None);
    }

    #[test]
    fn test_document_filters() {
        let filters = DocumentFilters::last_years(
            Some("climate change".to_string()),
            Some("WLD".to_string()),
            5,
            day(2024, 6, 1),
        )
        .unwrap();

        assert_eq!(
            filters.query_pairs(),
            vec![
                ("topic", "climate change".to_string()),
                ("admreg_exact", "WLD".to_string()),
                ("startYear", "2019".to_string()),
                ("endYear", "2024".to_string()),
            ]
        );
        assert_eq!(
            filters.describe(),
            "topic \"climate change\", region WLD, years 2019-2024"
        );
        assert!(DocumentFilters::default().query_pairs().is_empty());
        assert_eq!(DocumentFilters::default().describe(), "all documents");
    }

    #[test]
    fn test_temperature_filters() {
        let filters = TemperatureFilters::last_days(
            "CITY:US370001".to_string(),
            "TMAX".to_string(),
            90,
            day(2024, 3, 31),
            Some("metric".to_string()),
        )
        .unwrap();

        assert_eq!(filters.start_date, day(2024, 1, 1));
        let pairs = filters.query_pairs();
        assert_eq!(pairs[2], ("startdate", "2024-01-01".to_string()));
        assert_eq!(pairs[3], ("enddate", "2024-03-31".to_string()));
        assert_eq!(pairs[4], ("units", "metric".to_string()));
        assert!(filters.describe().contains("New York, US"));

        let docs = filters.matching_documents(None);
        assert_eq!(docs.start_year, Some(2024));
        assert_eq!(docs.end_year, Some(2024));
    }

    #[test]
    fn test_windows_out_of_calendar_range() {
        let today = day(2024, 6, 1);

        assert!(TemperatureFilters::last_days(
            "nyc".to_string(),
            "TMAX".to_string(),
            4_000_000_000,
            today,
            None,
        )
        .is_none());
        assert!(DocumentFilters::last_years(None, None, u32::MAX, today).is_none());
        assert!(DocumentFilters::last_years(None, None, 1_000_000, today).is_none());

        let widest = TemperatureFilters::last_days(
            "nyc".to_string(),
            "TMAX".to_string(),
            crate::cli::MAX_DAYS,
            today,
            None,
        )
        .unwrap();
        assert_eq!(widest.start_date.year(), 1924);
    }
}
