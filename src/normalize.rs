//! Record normalization: dates, ages, nutrition labels and village names

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;

use crate::data::RawRecord;

/// Nutrition status of one child measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum NutritionStatus {
    /// Gizi Buruk
    Poor,
    /// Gizi Baik
    Good,
    /// Gizi Kurang
    Under,
    /// Gizi Lebih
    Over,
    /// Statistical outlier; never counted
    Outlier,
}

impl NutritionStatus {
    /// The four categories that appear in aggregates, in report column order
    pub const COUNTED: [NutritionStatus; 4] = [
        NutritionStatus::Poor,
        NutritionStatus::Good,
        NutritionStatus::Under,
        NutritionStatus::Over,
    ];

    /// Label used in the source data
    pub fn source_label(self) -> &'static str {
        match self {
            NutritionStatus::Poor => "Gizi Buruk",
            NutritionStatus::Good => "Gizi Baik",
            NutritionStatus::Under => "Gizi Kurang",
            NutritionStatus::Over => "Gizi Lebih",
            NutritionStatus::Outlier => "Outlier",
        }
    }

    pub fn is_counted(self) -> bool {
        self != NutritionStatus::Outlier
    }
}

impl fmt::Display for NutritionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source_label())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown nutrition status label `{0}`")]
pub struct ParseStatusError(pub String);

impl FromStr for NutritionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        match label.as_str() {
            "gizi buruk" | "poor" => Ok(NutritionStatus::Poor),
            "gizi baik" | "good" => Ok(NutritionStatus::Good),
            "gizi kurang" | "under" => Ok(NutritionStatus::Under),
            "gizi lebih" | "over" => Ok(NutritionStatus::Over),
            "outlier" => Ok(NutritionStatus::Outlier),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// A child measurement after cleaning
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildRecord {
    pub row_number: usize,
    /// Uppercased village name; empty when the source cell was blank
    pub village: String,
    pub measurement_date: Option<NaiveDate>,
    pub age_years: Option<u32>,
    pub nutrition_status: Option<NutritionStatus>,
}

impl ChildRecord {
    /// Whether this record feeds aggregates for the given year
    pub fn is_eligible(&self, target_year: i32) -> bool {
        !self.village.is_empty()
            && self.measurement_date.map(|d| d.year()) == Some(target_year)
            && self.nutrition_status.is_some_and(NutritionStatus::is_counted)
    }
}

/// Row counts gathered while normalizing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationSummary {
    pub rows_read: usize,
    pub eligible: usize,
    pub invalid_date: usize,
    pub other_year: usize,
    pub outliers: usize,
    pub unknown_status: usize,
    pub missing_village: usize,
    pub invalid_age: usize,
}

/// Every normalized record plus the year aggregates are computed for
#[derive(Debug, Clone)]
pub struct NormalizedRecords {
    pub records: Vec<ChildRecord>,
    pub target_year: Option<i32>,
    pub summary: NormalizationSummary,
}

impl NormalizedRecords {
    /// Records that feed aggregation and clustering
    pub fn eligible(&self) -> impl Iterator<Item = &ChildRecord> {
        let year = self.target_year;
        self.records
            .iter()
            .filter(move |r| year.is_some_and(|y| r.is_eligible(y)))
    }
}

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

/// Parse a measurement timestamp into its calendar date
pub fn parse_measurement_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        })
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}

/// Extract whole years from a free-text age such as `"2 Tahun - 3 Bulan"`.
///
/// Returns `None` when the text has no `Tahun` token or the part before it is
/// not a non-negative number. A leading `+` is accepted.
pub fn extract_years(text: Option<&str>) -> Option<u32> {
    let text = text?;
    let (years, _) = text.split_once("Tahun")?;
    years.trim().parse().ok()
}

/// Default target year: the most recent year with complete data.
///
/// The latest year counts as complete once it has a December measurement;
/// otherwise the previous year is used if it has data.
pub fn default_target_year<'a>(dates: impl IntoIterator<Item = &'a NaiveDate>) -> Option<i32> {
    let dates: Vec<&NaiveDate> = dates.into_iter().collect();
    let latest = dates.iter().max()?;
    let latest_year = latest.year();

    if latest.month() == 12 {
        return Some(latest_year);
    }
    let previous = latest_year - 1;
    if dates.iter().any(|d| d.year() == previous) {
        Some(previous)
    } else {
        Some(latest_year)
    }
}

/// Normalize raw rows.
///
/// Nothing is dropped: rows with bad dates or labels stay in `records` and are
/// only left out of [`NormalizedRecords::eligible`].
pub fn normalize_records(raw: &[RawRecord], target_year: Option<i32>) -> NormalizedRecords {
    let mut summary = NormalizationSummary {
        rows_read: raw.len(),
        ..Default::default()
    };

    let records: Vec<ChildRecord> = raw
        .iter()
        .map(|row| {
            let measurement_date = row.measured_at.as_deref().and_then(parse_measurement_date);
            if measurement_date.is_none() {
                log::debug!(
                    "Row {}: unparseable measurement date {:?}",
                    row.row_number,
                    row.measured_at
                );
                summary.invalid_date += 1;
            }

            let age_years = extract_years(row.age.as_deref());
            if age_years.is_none() && row.age.is_some() {
                summary.invalid_age += 1;
            }

            let nutrition_status = match row.status.as_deref().map(str::parse::<NutritionStatus>) {
                Some(Ok(status)) => Some(status),
                Some(Err(e)) => {
                    log::debug!("Row {}: {}", row.row_number, e);
                    summary.unknown_status += 1;
                    None
                }
                None => {
                    summary.unknown_status += 1;
                    None
                }
            };
            if nutrition_status == Some(NutritionStatus::Outlier) {
                summary.outliers += 1;
            }

            let village = row
                .village
                .as_deref()
                .map(|v| v.trim().to_uppercase())
                .unwrap_or_default();
            if village.is_empty() {
                summary.missing_village += 1;
            }

            ChildRecord {
                row_number: row.row_number,
                village,
                measurement_date,
                age_years,
                nutrition_status,
            }
        })
        .collect();

    let target_year =
        target_year.or_else(|| default_target_year(records.iter().filter_map(|r| r.measurement_date.as_ref())));

    if let Some(year) = target_year {
        summary.other_year = records
            .iter()
            .filter(|r| r.measurement_date.is_some_and(|d| d.year() != year))
            .count();
        summary.eligible = records.iter().filter(|r| r.is_eligible(year)).count();
    }

    log::info!(
        "Normalized {} rows for year {}: {} eligible, {} invalid dates, {} other years, {} outliers",
        summary.rows_read,
        target_year.map_or_else(|| "-".to_string(), |y| y.to_string()),
        summary.eligible,
        summary.invalid_date,
        summary.other_year,
        summary.outliers
    );

    NormalizedRecords {
        records,
        target_year,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(village: &str, date: &str, age: &str, status: &str) -> RawRecord {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        RawRecord {
            row_number: 0,
            village: opt(village),
            measured_at: opt(date),
            age: opt(age),
            status: opt(status),
        }
    }

    #[test]
    fn test_extract_years() {
        assert_eq!(extract_years(Some("5 Tahun")), Some(5));
        assert_eq!(extract_years(Some("  2 Tahun - 3 Bulan - 10 Hari")), Some(2));
        assert_eq!(extract_years(Some("lima tahun")), None);
        assert_eq!(extract_years(Some("lima Tahun")), None);
        assert_eq!(extract_years(Some("8 Bulan")), None);
        assert_eq!(extract_years(Some("+5 Tahun")), Some(5));
        assert_eq!(extract_years(Some("-1 Tahun")), None);
        assert_eq!(extract_years(None), None);
    }

    #[test]
    fn test_parse_status_labels() {
        assert_eq!("Gizi Buruk".parse::<NutritionStatus>(), Ok(NutritionStatus::Poor));
        assert_eq!(" gizi  baik ".parse::<NutritionStatus>(), Ok(NutritionStatus::Good));
        assert_eq!("GIZI KURANG".parse::<NutritionStatus>(), Ok(NutritionStatus::Under));
        assert_eq!("Gizi Lebih".parse::<NutritionStatus>(), Ok(NutritionStatus::Over));
        assert_eq!("Outlier".parse::<NutritionStatus>(), Ok(NutritionStatus::Outlier));
        assert!("Gizi Sedang".parse::<NutritionStatus>().is_err());
    }

    #[test]
    fn test_parse_measurement_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 8, 15);
        assert_eq!(parse_measurement_date("2023-08-15 09:12:00"), expected);
        assert_eq!(parse_measurement_date("2023-08-15T09:12:00"), expected);
        assert_eq!(parse_measurement_date("2023-08-15"), expected);
        assert_eq!(parse_measurement_date("15/08/2023"), expected);
        assert_eq!(parse_measurement_date("2023-08-15T09:12:00+07:00"), expected);
        assert_eq!(parse_measurement_date("kemarin"), None);
        assert_eq!(parse_measurement_date(""), None);
    }

    #[test]
    fn test_default_target_year() {
        let d = |y, m| NaiveDate::from_ymd_opt(y, m, 1).unwrap();

        let dates = [d(2022, 5), d(2023, 12), d(2023, 1)];
        assert_eq!(default_target_year(dates.iter()), Some(2023));

        let dates = [d(2022, 5), d(2023, 3)];
        assert_eq!(default_target_year(dates.iter()), Some(2022));

        let dates = [d(2024, 2)];
        assert_eq!(default_target_year(dates.iter()), Some(2024));

        let empty: [NaiveDate; 0] = [];
        assert_eq!(default_target_year(empty.iter()), None);
    }

    #[test]
    fn test_normalize_keeps_invalid_rows_but_excludes_them() {
        let rows = vec![
            raw("paoman", "2023-03-01 08:00:00", "3 Tahun", "Gizi Buruk"),
            raw("Paoman", "bukan tanggal", "3 Tahun", "Gizi Baik"),
            raw("dukuh", "2023-04-01 08:00:00", "lima tahun", "Outlier"),
            raw("dukuh", "2022-04-01 08:00:00", "1 Tahun", "Gizi Kurang"),
            raw("singa", "2023-04-01 08:00:00", "", "Gizi Sedang"),
            raw("", "2023-04-01 08:00:00", "2 Tahun", "Gizi Lebih"),
        ];

        let normalized = normalize_records(&rows, Some(2023));
        assert_eq!(normalized.records.len(), 6);
        assert_eq!(normalized.records[0].village, "PAOMAN");
        assert_eq!(normalized.records[1].measurement_date, None);
        assert_eq!(normalized.records[2].age_years, None);

        let eligible: Vec<_> = normalized.eligible().collect();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].village, "PAOMAN");

        let s = normalized.summary;
        assert_eq!(s.rows_read, 6);
        assert_eq!(s.eligible, 1);
        assert_eq!(s.invalid_date, 1);
        assert_eq!(s.other_year, 1);
        assert_eq!(s.outliers, 1);
        assert_eq!(s.unknown_status, 1);
        assert_eq!(s.missing_village, 1);
        assert_eq!(s.invalid_age, 1);
    }

    #[test]
    fn test_normalize_without_any_dates_has_no_target_year() {
        let rows = vec![raw("paoman", "", "1 Tahun", "Gizi Baik")];
        let normalized = normalize_records(&rows, None);
        assert_eq!(normalized.target_year, None);
        assert_eq!(normalized.eligible().count(), 0);
    }
}
