//! Per-village counts of nutrition categories

use std::collections::BTreeMap;

use serde::Serialize;

use crate::geo::Coordinate;
use crate::normalize::{ChildRecord, NutritionStatus};

/// Counts for the four counted categories
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub poor: usize,
    pub good: usize,
    pub under: usize,
    pub over: usize,
}

impl CategoryCounts {
    pub fn get(&self, status: NutritionStatus) -> usize {
        match status {
            NutritionStatus::Poor => self.poor,
            NutritionStatus::Good => self.good,
            NutritionStatus::Under => self.under,
            NutritionStatus::Over => self.over,
            NutritionStatus::Outlier => 0,
        }
    }

    /// Count one record; outliers are ignored
    pub fn add(&mut self, status: NutritionStatus) {
        match status {
            NutritionStatus::Poor => self.poor += 1,
            NutritionStatus::Good => self.good += 1,
            NutritionStatus::Under => self.under += 1,
            NutritionStatus::Over => self.over += 1,
            NutritionStatus::Outlier => {}
        }
    }

    pub fn total(&self) -> usize {
        self.poor + self.good + self.under + self.over
    }
}

/// Share of measured children per counted category, in percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CategoryShares {
    pub poor: f64,
    pub good: f64,
    pub under: f64,
    pub over: f64,
}

impl CategoryShares {
    pub fn get(&self, status: NutritionStatus) -> f64 {
        match status {
            NutritionStatus::Poor => self.poor,
            NutritionStatus::Good => self.good,
            NutritionStatus::Under => self.under,
            NutritionStatus::Over => self.over,
            NutritionStatus::Outlier => 0.0,
        }
    }
}

/// Aggregate for one village
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VillageAggregate {
    pub village: String,
    pub counts: CategoryCounts,
    pub total: usize,
    /// Filled in by the geo-join; `None` means not mappable
    pub coordinate: Option<Coordinate>,
}

impl VillageAggregate {
    pub fn empty(village: impl Into<String>) -> Self {
        Self {
            village: village.into(),
            counts: CategoryCounts::default(),
            total: 0,
            coordinate: None,
        }
    }

    fn record(&mut self, status: NutritionStatus) {
        if status.is_counted() {
            self.counts.add(status);
            self.total += 1;
        }
    }

    /// Share of measured children in `status`, in percent
    pub fn percentage(&self, status: NutritionStatus) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.counts.get(status) as f64 / self.total as f64 * 100.0
    }

    pub fn shares(&self) -> CategoryShares {
        CategoryShares {
            poor: self.percentage(NutritionStatus::Poor),
            good: self.percentage(NutritionStatus::Good),
            under: self.percentage(NutritionStatus::Under),
            over: self.percentage(NutritionStatus::Over),
        }
    }
}

/// Village aggregates keyed and ordered by uppercase village name
pub type Aggregates = BTreeMap<String, VillageAggregate>;

/// Count eligible records per village and category.
///
/// Every village of `universe` appears in the output even without records;
/// villages observed in the data but missing from the universe are added too.
/// Without a universe the observed villages are used.
pub fn aggregate<'a>(
    records: impl IntoIterator<Item = &'a ChildRecord>,
    universe: Option<&[String]>,
) -> Aggregates {
    let mut aggregates: Aggregates = universe
        .unwrap_or_default()
        .iter()
        .map(|v| {
            let key = v.trim().to_uppercase();
            (key.clone(), VillageAggregate::empty(key))
        })
        .collect();

    for record in records {
        let Some(status) = record.nutrition_status.filter(|s| s.is_counted()) else {
            continue;
        };
        if record.village.is_empty() {
            continue;
        }
        aggregates
            .entry(record.village.clone())
            .or_insert_with(|| VillageAggregate::empty(record.village.clone()))
            .record(status);
    }

    log::info!(
        "Aggregated {} children across {} villages",
        aggregates.values().map(|a| a.total).sum::<usize>(),
        aggregates.len()
    );
    aggregates
}
