//! GiziForge: village child-nutrition aggregation and intervention priority ranking
//!
//! This library turns per-child nutrition measurements into per-village
//! category counts, places villages on a map by name, groups them into Low /
//! Medium / High priority tiers with K-Means, and ranks the villages that
//! need intervention first.

pub mod aggregate;
pub mod cli;
pub mod data;
pub mod error;
pub mod geo;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod viz;

// Re-export public items for easier access
pub use aggregate::{aggregate, Aggregates, CategoryCounts, CategoryShares, VillageAggregate};
pub use cli::Args;
pub use data::{load_records, RawRecord};
pub use error::PipelineError;
pub use geo::{geo_join, load_features, parse_features, Coordinate, VillageFeature};
pub use model::{classify, ClusterConfig, PriorityModel, PriorityTier, SeverityFeature, Tier};
pub use normalize::{extract_years, normalize_records, ChildRecord, NutritionStatus};
pub use pipeline::{run, run_from_paths, InputPaths, PipelineConfig, PipelineOutput};
pub use report::{rank, RankedReport, ReportOptions};
pub use schema::ColumnMapping;

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
