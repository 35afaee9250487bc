//! K-Means priority classification of villages over one severity feature

use std::fmt;

use clap::ValueEnum;
use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::aggregate::{Aggregates, VillageAggregate};
use crate::error::PipelineError;

/// Number of ordinal tiers, and so the largest usable cluster count
pub const MAX_CLUSTERS: usize = 3;

/// Ordinal intervention priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ValueEnum)]
pub enum Tier {
    Low,
    Medium,
    High,
}

impl Tier {
    /// Tier for the cluster at `rank` (0 = lowest mean) out of `n_ranks`.
    ///
    /// Ranks are aligned to the top so the most severe cluster is always High.
    fn from_rank(rank: usize, n_ranks: usize) -> Tier {
        match n_ranks - 1 - rank {
            0 => Tier::High,
            1 => Tier::Medium,
            _ => Tier::Low,
        }
    }

    /// Indonesian label used on the dashboard
    pub fn label_id(self) -> &'static str {
        match self {
            Tier::Low => "Rendah",
            Tier::Medium => "Sedang",
            Tier::High => "Tinggi",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Low => "Low",
            Tier::Medium => "Medium",
            Tier::High => "High",
        };
        f.write_str(name)
    }
}

/// Scalar used to cluster and rank villages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
pub enum SeverityFeature {
    /// Number of children with Gizi Buruk
    #[default]
    #[value(name = "poor")]
    PoorCount,
    /// Number of children measured
    #[value(name = "total")]
    TotalMeasured,
}

impl SeverityFeature {
    pub fn extract(self, aggregate: &VillageAggregate) -> f64 {
        match self {
            SeverityFeature::PoorCount => aggregate.counts.poor as f64,
            SeverityFeature::TotalMeasured => aggregate.total as f64,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            SeverityFeature::PoorCount => "children with severe malnutrition (Gizi Buruk)",
            SeverityFeature::TotalMeasured => "children measured",
        }
    }
}

/// Clustering parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterConfig {
    pub n_clusters: usize,
    pub max_iters: usize,
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            n_clusters: 3,
            max_iters: 300,
            tolerance: 1e-4,
            seed: 42,
        }
    }
}

/// Priority of one village
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityTier {
    pub village: String,
    pub severity_feature: f64,
    /// Raw label from the clustering run; carries no ordering
    pub cluster_id: usize,
    pub tier: Tier,
}

/// One cluster after ordering by mean severity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster_id: usize,
    pub tier: Tier,
    pub size: usize,
    pub mean_severity: f64,
}

/// Result of classifying every village
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityModel {
    /// Cluster count actually used after reducing to the distinct values
    pub n_clusters: usize,
    pub feature: SeverityFeature,
    /// One entry per village, in village order
    pub tiers: Vec<PriorityTier>,
    /// Clusters that received villages, lowest tier first
    pub clusters: Vec<ClusterSummary>,
    /// Within-cluster sum of squares around the cluster means
    pub inertia: f64,
}

impl PriorityModel {
    fn empty(feature: SeverityFeature) -> Self {
        Self {
            n_clusters: 0,
            feature,
            tiers: Vec::new(),
            clusters: Vec::new(),
            inertia: 0.0,
        }
    }

    pub fn tier_of(&self, village: &str) -> Option<&PriorityTier> {
        self.tiers.iter().find(|t| t.village == village)
    }
}

/// Classify villages into ordinal priority tiers
///
/// # Arguments
/// * `aggregates` - Village aggregates, one point per village
/// * `feature` - Severity scalar to cluster on
/// * `config` - Cluster count (1..=3), iteration limits and RNG seed
///
/// # Returns
/// * `PriorityModel` whose tiers follow cluster mean severity, so High is
///   always the most severe cluster whatever label the algorithm gave it
pub fn classify(
    aggregates: &Aggregates,
    feature: SeverityFeature,
    config: &ClusterConfig,
) -> crate::Result<PriorityModel> {
    if !(1..=MAX_CLUSTERS).contains(&config.n_clusters) {
        return Err(PipelineError::InvalidClusterCount {
            requested: config.n_clusters,
            max: MAX_CLUSTERS,
        }
        .into());
    }

    if aggregates.is_empty() {
        return Ok(PriorityModel::empty(feature));
    }

    let villages: Vec<&str> = aggregates.keys().map(String::as_str).collect();
    let values: Vec<f64> = aggregates.values().map(|a| feature.extract(a)).collect();

    let n_clusters = config.n_clusters.min(count_distinct(&values));
    let labels = if n_clusters == 1 {
        vec![0; values.len()]
    } else {
        fit_labels(&values, n_clusters, config)?
    };

    let clusters = rank_clusters(&values, &labels);
    let inertia = compute_inertia(&values, &labels, &clusters);

    let tiers = villages
        .iter()
        .zip(values.iter())
        .zip(labels.iter())
        .map(|((village, &value), &label)| {
            let tier = clusters
                .iter()
                .find(|c| c.cluster_id == label)
                .map(|c| c.tier)
                .unwrap_or(Tier::High);
            PriorityTier {
                village: village.to_string(),
                severity_feature: value,
                cluster_id: label,
                tier,
            }
        })
        .collect();

    log::info!(
        "Classified {} villages into {} clusters on {:?}",
        villages.len(),
        clusters.len(),
        feature
    );

    Ok(PriorityModel {
        n_clusters,
        feature,
        tiers,
        clusters,
        inertia,
    })
}

/// Run seeded K-Means over the 1-D feature and return a label per village
fn fit_labels(values: &[f64], n_clusters: usize, config: &ClusterConfig) -> crate::Result<Vec<usize>> {
    let features = Array2::from_shape_vec((values.len(), 1), values.to_vec())?;
    let dataset = DatasetBase::from(features.clone());

    let rng = StdRng::seed_from_u64(config.seed);
    let model = KMeans::params_with(n_clusters, rng, L2Dist)
        .max_n_iterations(config.max_iters.max(1) as u64)
        .tolerance(config.tolerance)
        .fit(&dataset)?;

    let labels: Array1<usize> = model.predict(&features);
    Ok(labels.to_vec())
}

/// Order the clusters that received points by (mean, raw label) and assign tiers
fn rank_clusters(values: &[f64], labels: &[usize]) -> Vec<ClusterSummary> {
    let n_labels = labels.iter().copied().max().map_or(0, |m| m + 1);
    let mut sums = vec![0.0; n_labels];
    let mut sizes = vec![0usize; n_labels];
    for (&value, &label) in values.iter().zip(labels) {
        sums[label] += value;
        sizes[label] += 1;
    }

    let mut clusters: Vec<(usize, usize, f64)> = (0..n_labels)
        .filter(|&label| sizes[label] > 0)
        .map(|label| (label, sizes[label], sums[label] / sizes[label] as f64))
        .collect();
    clusters.sort_by(|a, b| a.2.total_cmp(&b.2).then(a.0.cmp(&b.0)));

    let n_ranks = clusters.len();
    clusters
        .into_iter()
        .enumerate()
        .map(|(rank, (cluster_id, size, mean_severity))| ClusterSummary {
            cluster_id,
            tier: Tier::from_rank(rank, n_ranks),
            size,
            mean_severity,
        })
        .collect()
}

fn count_distinct(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(values: &[f64], labels: &[usize], clusters: &[ClusterSummary]) -> f64 {
    values
        .iter()
        .zip(labels)
        .filter_map(|(&value, &label)| {
            clusters
                .iter()
                .find(|c| c.cluster_id == label)
                .map(|c| (value - c.mean_severity).powi(2))
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::CategoryCounts;

    fn aggregates_with_poor(poor: &[(&str, usize)]) -> Aggregates {
        poor.iter()
            .map(|&(village, count)| {
                let mut agg = VillageAggregate::empty(village);
                agg.counts = CategoryCounts {
                    poor: count,
                    good: 2,
                    ..Default::default()
                };
                agg.total = agg.counts.total();
                (village.to_string(), agg)
            })
            .collect()
    }

    #[test]
    fn test_three_clear_groups() {
        let aggregates = aggregates_with_poor(&[
            ("A", 0),
            ("B", 1),
            ("C", 10),
            ("D", 11),
            ("E", 30),
            ("F", 31),
        ]);
        let model = classify(&aggregates, SeverityFeature::PoorCount, &ClusterConfig::default()).unwrap();

        assert_eq!(model.n_clusters, 3);
        assert_eq!(model.tiers.len(), 6);
        let tier = |v: &str| model.tier_of(v).unwrap().tier;
        assert_eq!(tier("A"), Tier::Low);
        assert_eq!(tier("B"), Tier::Low);
        assert_eq!(tier("C"), Tier::Medium);
        assert_eq!(tier("D"), Tier::Medium);
        assert_eq!(tier("E"), Tier::High);
        assert_eq!(tier("F"), Tier::High);
    }

    #[test]
    fn test_tier_means_are_ordered() {
        let aggregates = aggregates_with_poor(&[
            ("A", 3),
            ("B", 7),
            ("C", 2),
            ("D", 15),
            ("E", 9),
            ("F", 0),
            ("G", 4),
        ]);
        let model = classify(&aggregates, SeverityFeature::PoorCount, &ClusterConfig::default()).unwrap();

        let means: Vec<f64> = model.clusters.iter().map(|c| c.mean_severity).collect();
        assert!(means.windows(2).all(|w| w[0] <= w[1]));
        let tiers: Vec<Tier> = model.clusters.iter().map(|c| c.tier).collect();
        assert_eq!(tiers, vec![Tier::Low, Tier::Medium, Tier::High]);
        assert_eq!(model.tier_of("D").unwrap().tier, Tier::High);
    }

    #[test]
    fn test_labels_do_not_drive_tiers() {
        let aggregates = aggregates_with_poor(&[("A", 40), ("B", 41), ("C", 0), ("D", 1), ("E", 20)]);
        let model = classify(&aggregates, SeverityFeature::PoorCount, &ClusterConfig::default()).unwrap();

        let high = model.tier_of("A").unwrap();
        assert_eq!(high.tier, Tier::High);
        let high_cluster = model.clusters.iter().find(|c| c.tier == Tier::High).unwrap();
        assert_eq!(high_cluster.cluster_id, high.cluster_id);
        assert_eq!(model.tier_of("C").unwrap().tier, Tier::Low);
    }

    #[test]
    fn test_cluster_count_reduced_to_distinct_values() {
        let aggregates = aggregates_with_poor(&[("A", 1), ("B", 1)]);
        let model = classify(&aggregates, SeverityFeature::PoorCount, &ClusterConfig::default()).unwrap();
        assert_eq!(model.n_clusters, 1);
        assert!(model.tiers.iter().all(|t| t.tier == Tier::High));

        let aggregates = aggregates_with_poor(&[("A", 1), ("B", 5), ("C", 5)]);
        let model = classify(&aggregates, SeverityFeature::PoorCount, &ClusterConfig::default()).unwrap();
        assert_eq!(model.n_clusters, 2);
        assert_eq!(model.tier_of("A").unwrap().tier, Tier::Medium);
        assert_eq!(model.tier_of("B").unwrap().tier, Tier::High);
    }

    #[test]
    fn test_single_village() {
        let aggregates = aggregates_with_poor(&[("A", 4)]);
        let model = classify(&aggregates, SeverityFeature::PoorCount, &ClusterConfig::default()).unwrap();
        assert_eq!(model.tiers.len(), 1);
        assert_eq!(model.tiers[0].tier, Tier::High);
        assert_eq!(model.inertia, 0.0);
    }

    #[test]
    fn test_empty_input() {
        let model = classify(&Aggregates::new(), SeverityFeature::PoorCount, &ClusterConfig::default()).unwrap();
        assert!(model.tiers.is_empty());
        assert!(model.clusters.is_empty());
    }

    #[test]
    fn test_invalid_cluster_count() {
        let aggregates = aggregates_with_poor(&[("A", 1), ("B", 2)]);
        for n_clusters in [0, 4] {
            let config = ClusterConfig {
                n_clusters,
                ..Default::default()
            };
            let err = classify(&aggregates, SeverityFeature::PoorCount, &config).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<PipelineError>(),
                Some(PipelineError::InvalidClusterCount { .. })
            ));
        }
    }

    #[test]
    fn test_deterministic_with_seed() {
        let aggregates = aggregates_with_poor(&[
            ("A", 2),
            ("B", 5),
            ("C", 6),
            ("D", 9),
            ("E", 12),
            ("F", 13),
            ("G", 3),
        ]);
        let first = classify(&aggregates, SeverityFeature::PoorCount, &ClusterConfig::default()).unwrap();
        let second = classify(&aggregates, SeverityFeature::PoorCount, &ClusterConfig::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_total_measured_feature() {
        let aggregates = aggregates_with_poor(&[("A", 0), ("B", 3)]);
        let model = classify(&aggregates, SeverityFeature::TotalMeasured, &ClusterConfig::default()).unwrap();
        assert_eq!(model.tier_of("A").unwrap().severity_feature, 2.0);
        assert_eq!(model.tier_of("B").unwrap().severity_feature, 5.0);
    }

    #[test]
    fn test_rank_clusters_tie_breaks_on_label() {
        let clusters = rank_clusters(&[5.0, 5.0, 1.0], &[2, 0, 1]);
        let order: Vec<(usize, Tier)> = clusters.iter().map(|c| (c.cluster_id, c.tier)).collect();
        assert_eq!(order, vec![(1, Tier::Low), (0, Tier::Medium), (2, Tier::High)]);
    }

    #[test]
    fn test_inertia() {
        let values = [1.0, 3.0, 10.0];
        let labels = [0, 0, 1];
        let clusters = rank_clusters(&values, &labels);
        assert_eq!(compute_inertia(&values, &labels, &clusters), 2.0);
    }
}
