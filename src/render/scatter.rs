//! Property-vs-property scatter plots coloured by cluster label.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;

use super::{chart_err, draw_err, finish, padded, png_canvas, PlotError, Result, CAPTION_FONT, LABEL_FONT};
use crate::color::ColorMap;
use crate::config::PlotSettings;
use crate::data::model::Value;
use crate::stats::min_max;

/// File name a scatter titled `title` is saved under.
pub fn scatter_file_name(title: &str) -> String {
    format!("{}.png", title.replace(' ', "_"))
}

#[allow(clippy::too_many_arguments)]
pub fn draw_cluster_scatter<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    points: &[(f64, f64)],
    labels: &[Value],
    colors: &ColorMap,
    title: &str,
    x_label: &str,
    y_label: &str,
) -> Result<()> {
    if points.len() != labels.len() {
        return Err(PlotError::InvalidData(format!(
            "{} points but {} labels",
            points.len(),
            labels.len()
        )));
    }
    let kept: Vec<(&(f64, f64), &Value)> = points
        .iter()
        .zip(labels)
        .filter(|((x, y), _)| x.is_finite() && y.is_finite())
        .collect();
    let xs: Vec<f64> = kept.iter().map(|(p, _)| p.0).collect();
    let ys: Vec<f64> = kept.iter().map(|(p, _)| p.1).collect();
    let ((x0, x1), (y0, y1)) = min_max(&xs)
        .zip(min_max(&ys))
        .ok_or_else(|| PlotError::InvalidData("no finite points to plot".into()))?;

    let mut chart = ChartBuilder::on(area)
        .caption(title, CAPTION_FONT)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(padded(x0, x1), padded(y0, y1))
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .label_style(LABEL_FONT)
        .draw()
        .map_err(draw_err)?;

    let groups: BTreeSet<&Value> = kept.iter().map(|(_, l)| *l).collect();
    for label in groups {
        let color = colors.color_for(label);
        chart
            .draw_series(
                kept.iter()
                    .filter(|(_, l)| *l == label)
                    .map(|(p, _)| Circle::new(**p, 4, color.filled())),
            )
            .map_err(draw_err)?
            .label(format!("Cluster {label}"))
            .legend(move |(x, y)| Circle::new((x + 5, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(LABEL_FONT)
        .draw()
        .map_err(draw_err)?;
    Ok(())
}

/// Save a cluster scatter into `output_dir` as `<title with underscores>.png`
/// and return the written path.
#[allow(clippy::too_many_arguments)]
pub fn save_cluster_scatter(
    points: &[(f64, f64)],
    labels: &[Value],
    colors: &ColorMap,
    settings: &PlotSettings,
    output_dir: &Path,
    title: &str,
    x_label: &str,
    y_label: &str,
) -> Result<PathBuf> {
    let path = output_dir.join(scatter_file_name(title));
    let root = png_canvas(&path, (settings.width, settings.height))?;
    draw_cluster_scatter(&root, points, labels, colors, title, x_label, y_label)?;
    finish(root, "Scatter plot", &path)?;
    Ok(path)
}
