//! Heat map of an AFM height scan over centered coordinates.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use super::{
    chart_err, draw_color_bar, draw_err, finish, png_canvas, span, split_color_bar, PlotError,
    Result, CAPTION_FONT, LABEL_FONT,
};
use crate::color::viridis;
use crate::config::PlotSettings;
use crate::data::afm::{AfmScan, CenteredGrid};

/// Draw `scan` with each cell centred on its coordinate in `centered`,
/// y increasing upwards. NaN cells are left blank.
pub fn draw_afm_heatmap<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    scan: &AfmScan,
    centered: &CenteredGrid,
) -> Result<()> {
    if centered.x.len() != scan.cols() || centered.y.len() != scan.rows() {
        return Err(PlotError::InvalidData(format!(
            "grid is {} × {} but the scan is {} × {}",
            centered.y.len(),
            centered.x.len(),
            scan.rows(),
            scan.cols()
        )));
    }
    let (lo, hi) = scan
        .value_range()
        .ok_or_else(|| PlotError::InvalidData("AFM scan has no finite heights".into()))?;

    let (hx, hy) = (scan.x_step.abs() / 2.0, scan.y_step.abs() / 2.0);
    let (x0, x1, y0, y1) = centered.extent();
    let unit = scan.header.lateral_unit.as_deref().unwrap_or("px");
    let value_label = match &scan.header.value_unit {
        Some(u) => format!("Height ({u})"),
        None => "Height".to_string(),
    };

    let (main, bar) = split_color_bar(area);
    let mut chart = ChartBuilder::on(&main)
        .caption("AFM Data Centered on Minimum Z Value", CAPTION_FONT)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(span(x0 - hx, x1 + hx), span(y0 - hy, y1 + hy))
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(format!("X ({unit})"))
        .y_desc(format!("Y ({unit})"))
        .label_style(LABEL_FONT)
        .draw()
        .map_err(draw_err)?;

    let range = hi - lo;
    chart
        .draw_series((0..scan.rows()).flat_map(|r| (0..scan.cols()).map(move |c| (r, c))).filter_map(
            |(r, c)| {
                let v = scan.get(r, c).filter(|v| v.is_finite())?;
                let (x, y) = centered.coordinate(r, c);
                let t = if range > 0.0 { (v - lo) / range } else { 0.5 };
                Some(Rectangle::new([(x - hx, y - hy), (x + hx, y + hy)], viridis(t).filled()))
            },
        ))
        .map_err(draw_err)?;

    draw_color_bar(&bar, lo, hi, &value_label, None)
}

pub fn save_afm_heatmap(
    scan: &AfmScan,
    centered: &CenteredGrid,
    settings: &PlotSettings,
    path: &Path,
) -> Result<()> {
    let root = png_canvas(path, (settings.width, settings.height))?;
    draw_afm_heatmap(&root, scan, centered)?;
    finish(root, "AFM heat map", path)
}
