//! Ranked priority list and the recommendation sentence

use std::cmp::Ordering;

use serde::Serialize;

use crate::model::{PriorityModel, Tier};

/// One row of the ranked list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    /// 1-based position
    pub rank: usize,
    pub village: String,
    pub severity_feature: f64,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedReport {
    pub tier: Tier,
    pub entries: Vec<RankedEntry>,
    pub recommendation: String,
}

/// What to rank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    pub tier: Tier,
    /// Keep only the first N entries; `None` keeps all
    pub top_n: Option<usize>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            tier: Tier::High,
            top_n: None,
        }
    }
}

/// Build the ranked list for one tier.
///
/// Villages are sorted by severity descending, then by name ascending.
/// The recommendation names the most severe village of the whole tier, so
/// `top_n` only shortens the list. `has_data` is false when no measurement
/// qualified for the target year, in which case the recommendation says so
/// instead of ranking zeros.
pub fn rank(model: &PriorityModel, options: &ReportOptions, has_data: bool, year: Option<i32>) -> RankedReport {
    let mut selected: Vec<_> = model
        .tiers
        .iter()
        .filter(|t| t.tier == options.tier)
        .collect();
    selected.sort_by(|a, b| {
        b.severity_feature
            .partial_cmp(&a.severity_feature)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.village.cmp(&b.village))
    });

    let recommendation = if !has_data {
        match year {
            Some(year) => format!("No data: no qualifying measurements for {year}."),
            None => "No data: no qualifying measurements.".to_string(),
        }
    } else {
        match selected.first() {
            Some(top) if top.severity_feature > 0.0 => format!(
                "Prioritize intervention in {}: {} {} ({} priority).",
                top.village,
                format_count(top.severity_feature),
                model.feature.describe(),
                top.tier
            ),
            Some(top) => format!(
                "No {} recorded; {} priority villages need routine monitoring only.",
                model.feature.describe(),
                top.tier.to_string().to_lowercase()
            ),
            None => format!(
                "No {} priority intervention is indicated.",
                options.tier.to_string().to_lowercase()
            ),
        }
    };

    let entries: Vec<RankedEntry> = selected
        .into_iter()
        .take(options.top_n.unwrap_or(usize::MAX))
        .enumerate()
        .map(|(i, t)| RankedEntry {
            rank: i + 1,
            village: t.village.clone(),
            severity_feature: t.severity_feature,
            tier: t.tier,
        })
        .collect();

    RankedReport {
        tier: options.tier,
        entries,
        recommendation,
    }
}

/// Counts are whole numbers; print them without a fractional part
fn format_count(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}
