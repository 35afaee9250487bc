//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::model::{ClusterConfig, SeverityFeature, Tier};
use crate::pipeline::{InputPaths, PipelineConfig};
use crate::report::ReportOptions;

/// Village child-nutrition priority ranking using K-Means
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the measurement file (.csv, .xlsx, .xls or .ods)
    #[arg(short, long, default_value = "data_gizi.csv")]
    pub input: PathBuf,

    /// Path to the GeoJSON file with one named point per village
    #[arg(short, long, default_value = "indramayu.geojson")]
    pub geo: PathBuf,

    /// Optional list of every village to report, one name per line
    #[arg(long)]
    pub villages: Option<PathBuf>,

    /// Year to aggregate (default: most recent complete year in the data)
    #[arg(short, long)]
    pub year: Option<i32>,

    /// Number of clusters for K-Means (1 to 3)
    #[arg(short = 'k', long, default_value = "3")]
    pub clusters: usize,

    /// Severity feature to cluster and rank on
    #[arg(short, long, value_enum, default_value_t = SeverityFeature::PoorCount)]
    pub feature: SeverityFeature,

    /// Tier to list in the ranked report
    #[arg(long, value_enum, default_value_t = Tier::High)]
    pub tier: Tier,

    /// Only list the first N villages of the ranked report
    #[arg(short, long)]
    pub top: Option<usize>,

    /// Seed for the K-Means initialisation
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Maximum iterations for K-Means algorithm
    #[arg(long, default_value = "300")]
    pub max_iters: usize,

    /// Tolerance for K-Means convergence
    #[arg(long, default_value = "1e-4")]
    pub tolerance: f64,

    /// Write the full pipeline output as JSON to this path
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Write an SVG marker map to this path (plus a `_tiers.svg` chart)
    #[arg(short, long)]
    pub map: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn input_paths(&self) -> InputPaths {
        InputPaths {
            measurements: self.input.clone(),
            geojson: self.geo.clone(),
            villages: self.villages.clone(),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            target_year: self.year,
            feature: self.feature,
            cluster: ClusterConfig {
                n_clusters: self.clusters,
                max_iters: self.max_iters,
                tolerance: self.tolerance,
                seed: self.seed,
            },
            report: ReportOptions {
                tier: self.tier,
                top_n: self.top,
            },
            ..Default::default()
        }
    }
}
