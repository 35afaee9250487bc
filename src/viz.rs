//! Static SVG charts using Plotters: a village marker map and tier sizes

use plotters::prelude::*;

use crate::model::Tier;
use crate::pipeline::PipelineOutput;

/// Map centre used when no village could be placed (Indramayu regency)
const DEFAULT_CENTER: (f64, f64) = (108.3626961, -6.454198);

const LOW_COLOR: RGBColor = RGBColor(46, 160, 67);
const MEDIUM_COLOR: RGBColor = RGBColor(245, 140, 30);
const HIGH_COLOR: RGBColor = RGBColor(214, 39, 40);

pub fn tier_color(tier: Tier) -> RGBColor {
    match tier {
        Tier::Low => LOW_COLOR,
        Tier::Medium => MEDIUM_COLOR,
        Tier::High => HIGH_COLOR,
    }
}

/// Draw mapped villages at their (longitude, latitude), colored by tier.
///
/// Villages without a coordinate are left off the map.
pub fn create_marker_map(output: &PipelineOutput, output_path: &str, plot_title: Option<&str>) -> crate::Result<()> {
    let title = plot_title.unwrap_or("Villages by Intervention Priority");
    let points: Vec<_> = output.mappable().collect();

    let (x_range, y_range) = if points.is_empty() {
        let (lon, lat) = DEFAULT_CENTER;
        ((lon - 0.5)..(lon + 0.5), (lat - 0.5)..(lat + 0.5))
    } else {
        let lon_min = points.iter().map(|(_, c)| c.longitude).fold(f64::INFINITY, f64::min);
        let lon_max = points.iter().map(|(_, c)| c.longitude).fold(f64::NEG_INFINITY, f64::max);
        let lat_min = points.iter().map(|(_, c)| c.latitude).fold(f64::INFINITY, f64::min);
        let lat_max = points.iter().map(|(_, c)| c.latitude).fold(f64::NEG_INFINITY, f64::max);
        let pad_x = ((lon_max - lon_min) * 0.1).max(0.01);
        let pad_y = ((lat_max - lat_min) * 0.1).max(0.01);
        (
            (lon_min - pad_x)..(lon_max + pad_x),
            (lat_min - pad_y)..(lat_max + pad_y),
        )
    };

    let root = SVGBackend::new(output_path, (900, 700)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 26))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc("Longitude")
        .y_desc("Latitude")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for tier in [Tier::Low, Tier::Medium, Tier::High] {
        let color = tier_color(tier);
        let markers: Vec<_> = points
            .iter()
            .filter(|(v, _)| v.tier == tier)
            .map(|(_, c)| (c.longitude, c.latitude))
            .collect();

        chart
            .draw_series(
                markers
                    .into_iter()
                    .map(move |p| Circle::new(p, 9, color.filled())),
            )?
            .label(format!("{} ({})", tier, tier.label_id()))
            .legend(move |(x, y)| Circle::new((x + 5, y), 5, color.filled()));
    }

    chart.draw_series(points.iter().map(|(v, c)| {
        Text::new(
            v.village.clone(),
            (c.longitude, c.latitude),
            ("sans-serif", 11).into_font(),
        )
    }))?;

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    log::info!(
        "Marker map saved to {} ({} of {} villages mapped)",
        output_path,
        points.len(),
        output.villages.len()
    );

    Ok(())
}

/// Bar chart of how many villages fell into each tier
pub fn create_tier_size_chart(output: &PipelineOutput, output_path: &str) -> crate::Result<()> {
    let sizes = output.tier_sizes();
    let max_size = sizes.iter().map(|&(_, size)| size).max().unwrap_or(0).max(1) as f64;

    let root = SVGBackend::new(output_path, (600, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Villages per Priority Tier", ("sans-serif", 26))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..3f64, 0f64..(max_size * 1.1))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(3)
        .x_label_formatter(&|x| {
            let idx = x.floor() as usize;
            sizes.get(idx).map(|(t, _)| t.to_string()).unwrap_or_default()
        })
        .y_desc("Number of Villages")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(sizes.iter().enumerate().map(|(i, &(tier, size))| {
        let x = i as f64;
        Rectangle::new([(x + 0.1, 0.0), (x + 0.9, size as f64)], tier_color(tier).filled())
    }))?;

    root.present()?;
    log::info!("Tier size chart saved to {}", output_path);

    Ok(())
}

/// Write both charts; the size chart goes next to the map as `<stem>_tiers.svg`
pub fn generate_visualization_report(output: &PipelineOutput, base_output_path: &str) -> crate::Result<()> {
    create_marker_map(output, base_output_path, None)?;

    let size_chart_path = match base_output_path.strip_suffix(".svg") {
        Some(stem) => format!("{stem}_tiers.svg"),
        None => format!("{base_output_path}_tiers.svg"),
    };
    create_tier_size_chart(output, &size_chart_path)?;

    Ok(())
}
