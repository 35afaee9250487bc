//! GiziForge: village nutrition priority ranking CLI
//!
//! This is the main entrypoint that orchestrates data loading, aggregation,
//! clustering, ranking and the optional JSON and chart outputs.

use anyhow::Result;
use clap::Parser;
use giziforge::{pipeline, run_from_paths, viz, Args, NutritionStatus, PipelineOutput};
use std::time::Instant;

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    println!("=== Village Nutrition Priority Pipeline ===\n");
    let start_time = Instant::now();

    let output = run_from_paths(&args.input_paths(), &args.pipeline_config())?;

    print_village_table(&output);
    print_cluster_summary(&output);
    print_ranking(&output);

    if let Some(json_path) = &args.json {
        pipeline::write_json(&output, json_path)?;
        println!("\nPipeline output saved to: {}", json_path.display());
    }

    if let Some(map_path) = &args.map {
        viz::generate_visualization_report(&output, map_path)?;
        println!("Marker map saved to: {}", map_path);
    }

    println!("\nTotal processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

fn print_village_table(output: &PipelineOutput) {
    let year = output
        .target_year
        .map_or_else(|| "-".to_string(), |y| y.to_string());
    println!(
        "Year {}: {} of {} rows used ({} outliers, {} invalid dates, {} other years)",
        year,
        output.summary.eligible,
        output.summary.rows_read,
        output.summary.outliers,
        output.summary.invalid_date,
        output.summary.other_year
    );

    println!("\n=== Villages ===");
    print!("  {:<20}", "Village");
    for status in NutritionStatus::COUNTED {
        print!(" | {:>16}", status.source_label());
    }
    println!(" | {:>5} | {:<6} | Mapped", "Total", "Tier");

    for v in &output.villages {
        print!("  {:<20}", v.village);
        for status in NutritionStatus::COUNTED {
            let cell = format!("{} ({:.1}%)", v.counts.get(status), v.percentages.get(status));
            print!(" | {:>16}", cell);
        }
        println!(
            " | {:>5} | {:<6} | {}",
            v.total,
            v.tier.to_string(),
            if v.coordinate.is_some() { "yes" } else { "no" }
        );
    }

    if !output.unmapped.is_empty() {
        println!("\nNot mappable: {}", output.unmapped.join(", "));
    }
}

fn print_cluster_summary(output: &PipelineOutput) {
    println!("\n=== Cluster Statistics ===");
    for cluster in &output.clusters {
        println!(
            "Cluster {} -> {:<6} ({}): {} villages, mean severity {:.2}",
            cluster.cluster_id,
            cluster.tier.to_string(),
            cluster.tier.label_id(),
            cluster.size,
            cluster.mean_severity
        );
    }
    println!("Within-cluster sum of squares: {:.2}", output.inertia);
}

fn print_ranking(output: &PipelineOutput) {
    println!("\n=== {} Priority Villages ===", output.ranking.tier);
    for entry in &output.ranking.entries {
        println!(
            "  {:>2}. {:<20} {:>6.0}",
            entry.rank, entry.village, entry.severity_feature
        );
    }
    println!("\n{}", output.ranking.recommendation);
}
