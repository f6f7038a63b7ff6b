//! Square-pixel maps of a categorical label (typically the cluster) over a
//! regular indentation grid.
//!
//! Cells are drawn in grid-index space with row 0 (the largest y) at the
//! top, like an image.

use std::collections::BTreeSet;
use std::path::Path;

use image::{Rgb, RgbImage};
use plotters::coord::Shift;
use plotters::prelude::*;

use super::{chart_err, draw_err, finish, png_canvas, Result, CAPTION_FONT, LABEL_FONT};
use crate::color::ColorMap;
use crate::config::PlotSettings;
use crate::data::grid::PixelGrid;
use crate::data::model::Value;

/// Space around the cells for caption, axes and margins.
const FRAME: (u32, u32) = (110, 150);

pub fn draw_pixel_map<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    grid: &PixelGrid<Value>,
    colors: &ColorMap,
    title: &str,
    x_label: &str,
    y_label: &str,
) -> Result<()> {
    let (rows, cols) = (grid.rows(), grid.cols());
    let mut chart = ChartBuilder::on(area)
        .caption(title, CAPTION_FONT)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..cols as f64, 0.0..rows as f64)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .y_label_formatter(&|v| format!("{:.0}", rows as f64 - v))
        .label_style(LABEL_FONT)
        .draw()
        .map_err(draw_err)?;

    let labels: BTreeSet<&Value> = grid.iter().map(|(_, _, v)| v).collect();
    for label in labels {
        let color = colors.color_for(label);
        chart
            .draw_series(grid.iter().filter(|(_, _, v)| *v == label).map(|(r, c, _)| {
                let top = (rows - r) as f64;
                Rectangle::new([(c as f64, top - 1.0), (c as f64 + 1.0, top)], color.filled())
            }))
            .map_err(draw_err)?
            .label(format!("Cluster {label}"))
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
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

/// Draw the grid to a PNG sized so that every cell is square and fits in
/// the configured figure size.
#[allow(clippy::too_many_arguments)]
pub fn save_pixel_map(
    grid: &PixelGrid<Value>,
    colors: &ColorMap,
    title: &str,
    x_label: &str,
    y_label: &str,
    settings: &PlotSettings,
    path: &Path,
) -> Result<()> {
    let (rows, cols) = (grid.rows() as u32, grid.cols() as u32);
    let cell = (settings.width.saturating_sub(FRAME.0) / cols)
        .min(settings.height.saturating_sub(FRAME.1) / rows)
        .max(1);
    let size = (cols * cell + FRAME.0, rows * cell + FRAME.1);

    let root = png_canvas(path, size)?;
    draw_pixel_map(&root, grid, colors, title, x_label, y_label)?;
    finish(root, "Pixel map plot", path)
}

/// Write the grid as a bare image, `scale × scale` pixels per cell, with no
/// axes or legend.
pub fn save_raw_raster(grid: &PixelGrid<Value>, colors: &ColorMap, scale: u32, path: &Path) -> Result<()> {
    let scale = scale.max(1);
    let img = RgbImage::from_fn(grid.cols() as u32 * scale, grid.rows() as u32 * scale, |px, py| {
        let RGBColor(r, g, b) = grid
            .get((py / scale) as usize, (px / scale) as usize)
            .map_or(WHITE, |v| colors.color_for(v));
        Rgb([r, g, b])
    });
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    img.save(path)?;
    log::info!("Raw pixel map saved to {}", path.display());
    Ok(())
}
