//! Chart rendering to PNG with the [`plotters`] bitmap backend.
//!
//! Every chart has two entry points: a `draw_*` function that renders onto
//! any drawing area (so charts can be composed side by side), and a
//! `save_*` function that creates the PNG, draws, and logs the saved path.
//!
//! Text (captions, axis labels, legend entries) is only rasterised when the
//! `fonts` feature is enabled; otherwise charts are drawn without glyphs,
//! which keeps rendering working in headless containers without fontconfig.

pub mod contour;
pub mod distribution;
pub mod heatmap;
pub mod pixel;
pub mod scatter;

use std::ops::Range;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use thiserror::Error;

use crate::color::{viridis, viridis_band};
use crate::data::grid::GridError;
use crate::stats::FitError;

/// Errors that can occur during plot generation
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("Failed to create drawing area: {0}")]
    DrawingArea(String),

    #[error("Failed to configure chart: {0}")]
    ChartConfig(String),

    #[error("Failed to draw chart elements: {0}")]
    Drawing(String),

    #[error("Failed to save plot to file: {0}")]
    FileSave(#[from] std::io::Error),

    #[error("Failed to encode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Fit failed: {0}")]
    Fit(#[from] FitError),

    #[error("Cannot build grid: {0}")]
    Grid(#[from] GridError),
}

pub type Result<T> = core::result::Result<T, PlotError>;

pub(crate) const CAPTION_FONT: (&str, i32) = ("sans-serif", 24);
pub(crate) const LABEL_FONT: (&str, i32) = ("sans-serif", 16);
pub(crate) const LIGHT_GRAY: RGBColor = RGBColor(211, 211, 211);

/// Width reserved for a colour bar at the right of a map.
const COLOR_BAR_WIDTH: i32 = 110;

pub(crate) fn area_err(e: impl std::fmt::Display) -> PlotError {
    PlotError::DrawingArea(e.to_string())
}

pub(crate) fn chart_err(e: impl std::fmt::Display) -> PlotError {
    PlotError::ChartConfig(e.to_string())
}

pub(crate) fn draw_err(e: impl std::fmt::Display) -> PlotError {
    PlotError::Drawing(e.to_string())
}

/// Create a white PNG canvas at `path`, creating parent directories.
pub(crate) fn png_canvas(path: &Path, size: (u32, u32)) -> Result<DrawingArea<BitMapBackend<'_>, Shift>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(area_err)?;
    Ok(root)
}

/// `[lo, hi]` widened by 5 % on each side; a zero-width range becomes `lo ± 0.5`.
pub(crate) fn padded(lo: f64, hi: f64) -> Range<f64> {
    if hi > lo {
        let pad = (hi - lo) * 0.05;
        (lo - pad)..(hi + pad)
    } else {
        (lo - 0.5)..(hi + 0.5)
    }
}

/// `[lo, hi]` as a drawable range; a zero-width range becomes `lo ± 0.5`.
pub(crate) fn span(lo: f64, hi: f64) -> Range<f64> {
    if hi > lo {
        lo..hi
    } else {
        (lo - 0.5)..(hi + 0.5)
    }
}

/// Split off a colour-bar strip on the right of `area`.
pub(crate) fn split_color_bar<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
) -> (DrawingArea<DB, Shift>, DrawingArea<DB, Shift>) {
    let width = area.dim_in_pixel().0 as i32;
    area.split_horizontally((width - COLOR_BAR_WIDTH).max(width / 2))
}

/// Vertical viridis colour bar spanning `[lo, hi]`, optionally in discrete bands.
pub(crate) fn draw_color_bar<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    lo: f64,
    hi: f64,
    label: &str,
    levels: Option<usize>,
) -> Result<()> {
    let range = span(lo, hi);
    let mut chart = ChartBuilder::on(area)
        .margin_top(40)
        .margin_bottom(50)
        .margin_right(10)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..1.0, range.clone())
        .map_err(chart_err)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_desc(label)
        .label_style(LABEL_FONT)
        .draw()
        .map_err(draw_err)?;

    let steps = levels.unwrap_or(100).max(1);
    let height = range.end - range.start;
    chart
        .draw_series((0..steps).map(|i| {
            let a = range.start + height * i as f64 / steps as f64;
            let b = range.start + height * (i + 1) as f64 / steps as f64;
            let color = match levels {
                Some(l) => viridis_band(i, l),
                None => viridis((i as f64 + 0.5) / steps as f64),
            };
            Rectangle::new([(0.0, a), (1.0, b)], color.filled())
        }))
        .map_err(draw_err)?;
    Ok(())
}

/// Present the canvas and log where it went.
pub(crate) fn finish<DB: DrawingBackend>(root: DrawingArea<DB, Shift>, what: &str, path: &Path) -> Result<()> {
    root.present().map_err(draw_err)?;
    log::info!("{what} saved to {}", path.display());
    Ok(())
}
