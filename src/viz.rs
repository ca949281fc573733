//! Feature-importance reporting: console table and Plotters bar chart

use crate::error::{ChurnError, Result};
use crate::scorer::FeatureWeight;
use plotters::prelude::*;
use std::path::Path;
use tracing::info;

/// Bar colour for the smallest weight
const LOW_COLOR: RGBColor = RGBColor(33, 102, 172);
/// Bar colour for the largest weight
const HIGH_COLOR: RGBColor = RGBColor(178, 24, 43);

fn chart_error<E: std::fmt::Display>(e: E) -> ChurnError {
    ChurnError::Chart(e.to_string())
}

/// Linear blend between the two end colours, `t` in [0, 1]
fn blend(t: f64) -> RGBColor {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    RGBColor(
        mix(LOW_COLOR.0, HIGH_COLOR.0),
        mix(LOW_COLOR.1, HIGH_COLOR.1),
        mix(LOW_COLOR.2, HIGH_COLOR.2),
    )
}

/// Horizontal bar chart of importances, one bar per schema column.
///
/// Expects the weights in display order (ascending), so the most important
/// column ends up at the top.
pub fn create_importance_chart(weights: &[FeatureWeight], output_path: &Path) -> Result<()> {
    if weights.is_empty() {
        return Err(ChurnError::Chart("no feature weights to plot".to_string()));
    }

    let max_weight = weights
        .iter()
        .map(|w| w.weight)
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON);
    let n = weights.len();
    let height = (120 + 22 * n).max(400) as u32;

    let root = BitMapBackend::new(output_path, (900, height)).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;

    let names: Vec<&str> = weights.iter().map(|w| w.column.as_str()).collect();
    let label_for = |y: &f64| -> String {
        let idx = y.round();
        if idx >= 0.0 && (idx - y).abs() < 1e-6 {
            names.get(idx as usize).map(|s| s.to_string()).unwrap_or_default()
        } else {
            String::new()
        }
    };

    let mut chart = ChartBuilder::on(&root)
        .caption("Feature importance", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(260)
        .build_cartesian_2d(0f64..(max_weight * 1.1), -0.5f64..(n as f64 - 0.5))
        .map_err(chart_error)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .y_label_formatter(&label_for)
        .x_desc("Importance")
        .axis_desc_style(("sans-serif", 15))
        .draw()
        .map_err(chart_error)?;

    chart
        .draw_series(weights.iter().enumerate().map(|(i, w)| {
            let y = i as f64;
            Rectangle::new(
                [(0.0, y - 0.4), (w.weight, y + 0.4)],
                blend(w.weight / max_weight).filled(),
            )
        }))
        .map_err(chart_error)?;

    root.present().map_err(chart_error)?;
    info!(path = %output_path.display(), "feature importance chart saved");

    Ok(())
}

/// Print importances as an aligned two-column table
pub fn print_feature_importance(weights: &[FeatureWeight]) {
    let width = weights
        .iter()
        .map(|w| w.column.len())
        .max()
        .unwrap_or(7)
        .max(7);

    println!("\n=== Feature Importance ===");
    println!("{:<width$} | Importance", "Feature", width = width);
    println!("{}-|-----------", "-".repeat(width));
    for w in weights {
        println!("{:<width$} | {:>10.4}", w.column, w.weight, width = width);
    }
}
