//! End-to-end run: normalize, aggregate, geo-join, classify, rank

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use crate::aggregate::{aggregate, CategoryCounts, CategoryShares};
use crate::data::{load_records, load_village_universe, RawRecord};
use crate::geo::{geo_join, load_features, Coordinate, VillageFeature};
use crate::model::{classify, ClusterConfig, ClusterSummary, SeverityFeature, Tier};
use crate::normalize::{normalize_records, NormalizationSummary};
use crate::report::{rank, RankedReport, ReportOptions};
use crate::schema::ColumnMapping;

/// Settings for one run
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Year to aggregate; `None` picks the most recent complete year
    pub target_year: Option<i32>,
    pub feature: SeverityFeature,
    pub cluster: ClusterConfig,
    pub report: ReportOptions,
    /// Every village that must appear in the output, even without data
    pub universe: Option<Vec<String>>,
    pub columns: ColumnMapping,
}

/// Everything the presentation layer needs for one village
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VillageReport {
    pub village: String,
    pub counts: CategoryCounts,
    /// Percent of `total` per category
    pub percentages: CategoryShares,
    pub total: usize,
    pub coordinate: Option<Coordinate>,
    pub severity_feature: f64,
    pub cluster_id: usize,
    pub tier: Tier,
}

/// Output of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub target_year: Option<i32>,
    pub feature: SeverityFeature,
    pub summary: NormalizationSummary,
    /// Alphabetical by village
    pub villages: Vec<VillageReport>,
    pub clusters: Vec<ClusterSummary>,
    pub inertia: f64,
    pub ranking: RankedReport,
    pub unmapped: Vec<String>,
}

impl PipelineOutput {
    /// Villages that can be drawn on a map
    pub fn mappable(&self) -> impl Iterator<Item = (&VillageReport, Coordinate)> {
        self.villages
            .iter()
            .filter_map(|v| v.coordinate.map(|c| (v, c)))
    }

    pub fn village(&self, name: &str) -> Option<&VillageReport> {
        self.villages.iter().find(|v| v.village == name)
    }

    /// Number of villages per tier, Low to High
    pub fn tier_sizes(&self) -> [(Tier, usize); 3] {
        let count = |tier| self.villages.iter().filter(|v| v.tier == tier).count();
        [
            (Tier::Low, count(Tier::Low)),
            (Tier::Medium, count(Tier::Medium)),
            (Tier::High, count(Tier::High)),
        ]
    }
}

/// Run every stage over already-loaded inputs.
///
/// Pure apart from logging: the same rows, features and config always give
/// the same output.
pub fn run(
    raw: &[RawRecord],
    features: &[VillageFeature],
    config: &PipelineConfig,
) -> crate::Result<PipelineOutput> {
    let normalized = normalize_records(raw, config.target_year);

    let mut aggregates = aggregate(normalized.eligible(), config.universe.as_deref());
    let unmapped = geo_join(&mut aggregates, features);

    let model = classify(&aggregates, config.feature, &config.cluster)?;

    let has_data = normalized.summary.eligible > 0;
    let ranking = rank(&model, &config.report, has_data, normalized.target_year);

    let villages = aggregates
        .values()
        .zip(model.tiers.iter())
        .map(|(agg, priority)| VillageReport {
            village: agg.village.clone(),
            counts: agg.counts,
            percentages: agg.shares(),
            total: agg.total,
            coordinate: agg.coordinate,
            severity_feature: priority.severity_feature,
            cluster_id: priority.cluster_id,
            tier: priority.tier,
        })
        .collect();

    Ok(PipelineOutput {
        target_year: normalized.target_year,
        feature: config.feature,
        summary: normalized.summary,
        villages,
        clusters: model.clusters,
        inertia: model.inertia,
        ranking,
        unmapped,
    })
}

/// Input files for [`run_from_paths`]
#[derive(Debug, Clone)]
pub struct InputPaths {
    pub measurements: PathBuf,
    pub geojson: PathBuf,
    pub villages: Option<PathBuf>,
}

/// Load the input files and run the pipeline
pub fn run_from_paths(paths: &InputPaths, config: &PipelineConfig) -> crate::Result<PipelineOutput> {
    let raw = load_records(&paths.measurements, &config.columns)?;
    let features = load_features(&paths.geojson)?;

    let mut config = config.clone();
    if let Some(villages) = paths.villages.as_deref() {
        config.universe = Some(load_village_universe(villages)?);
    }

    run(&raw, &features, &config)
}

/// Write the output as pretty JSON
pub fn write_json(output: &PipelineOutput, path: &Path) -> crate::Result<()> {
    let json = serde_json::to_string_pretty(output)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write pipeline output: {}", path.display()))?;
    log::info!("Pipeline output written to {}", path.display());
    Ok(())
}
