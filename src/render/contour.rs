//! Filled contour maps of a scalar property over scattered indentation
//! positions.
//!
//! The scattered points are Delaunay-triangulated and z is interpolated
//! linearly inside each triangle onto a regular raster. Raster cells are then
//! quantized into equal-width bands and drawn with the viridis map.

use std::path::Path;

use delaunator::{triangulate, Point};
use plotters::coord::Shift;
use plotters::prelude::*;

use super::{
    chart_err, draw_color_bar, draw_err, finish, png_canvas, span, split_color_bar, PlotError,
    Result, CAPTION_FONT, LABEL_FONT,
};
use crate::color::viridis_band;
use crate::config::PlotSettings;
use crate::data::filter::finite_triples;
use crate::stats::{linspace, min_max};

/// Barycentric weights below this are still counted as inside a triangle, so
/// raster nodes on a shared edge are not lost to rounding.
const EDGE_EPS: f64 = 1e-9;

/// Interpolated values on a regular `nx × ny` raster.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarRaster {
    /// Node x coordinates, ascending.
    pub x: Vec<f64>,
    /// Node y coordinates, ascending.
    pub y: Vec<f64>,
    /// `values[j * nx + i]` is the value at `(x[i], y[j])`; `None` outside
    /// the convex hull of the samples.
    pub values: Vec<Option<f64>>,
}

impl ScalarRaster {
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i < self.x.len() && j < self.y.len() {
            self.values[j * self.x.len() + i]
        } else {
            None
        }
    }

    /// Node spacing along x and y.
    pub fn steps(&self) -> (f64, f64) {
        let step = |v: &[f64]| match v {
            [a, b, ..] => b - a,
            _ => 1.0,
        };
        (step(&self.x), step(&self.y))
    }
}

/// Linearly interpolate scattered `(x, y, z)` onto an `nx × ny` raster
/// spanning the bounding box of the points.
pub fn triangulated_raster(x: &[f64], y: &[f64], z: &[f64], nx: usize, ny: usize) -> Result<ScalarRaster> {
    if x.len() != y.len() || x.len() != z.len() {
        return Err(PlotError::InvalidData(format!(
            "x, y and z lengths differ ({}, {}, {})",
            x.len(),
            y.len(),
            z.len()
        )));
    }
    if x.len() < 3 {
        return Err(PlotError::InvalidData(format!(
            "need at least 3 points to triangulate, got {}",
            x.len()
        )));
    }
    if nx < 2 || ny < 2 {
        return Err(PlotError::InvalidData("raster needs at least 2 × 2 nodes".into()));
    }

    let points: Vec<Point> = x.iter().zip(y).map(|(&x, &y)| Point { x, y }).collect();
    let tri = triangulate(&points);
    if tri.triangles.is_empty() {
        return Err(PlotError::InvalidData(
            "points are collinear; no triangles to interpolate over".into(),
        ));
    }
    log::debug!("Triangulated {} points into {} triangles", points.len(), tri.len());

    let (x0, x1) = min_max(x).unwrap_or((0.0, 1.0));
    let (y0, y1) = min_max(y).unwrap_or((0.0, 1.0));
    let gx = linspace(x0, x1, nx);
    let gy = linspace(y0, y1, ny);
    let dx = (x1 - x0) / (nx - 1) as f64;
    let dy = (y1 - y0) / (ny - 1) as f64;
    // Degeneracy is judged against the bounding box, so nanometre pitches
    // stored in metres still triangulate.
    let min_det = f64::EPSILON * (x1 - x0) * (y1 - y0);
    let mut values = vec![None; nx * ny];

    for t in tri.triangles.chunks_exact(3) {
        let (a, b, c) = (t[0], t[1], t[2]);
        let (ax, ay, bx, by, cx, cy) = (x[a], y[a], x[b], y[b], x[c], y[c]);
        let det = (by - cy) * (ax - cx) + (cx - bx) * (ay - cy);
        if det.abs() <= min_det {
            continue;
        }

        let (lo_x, hi_x) = (ax.min(bx).min(cx), ax.max(bx).max(cx));
        let (lo_y, hi_y) = (ay.min(by).min(cy), ay.max(by).max(cy));
        let i_range = node_range(lo_x, hi_x, x0, dx, nx);
        let j_range = node_range(lo_y, hi_y, y0, dy, ny);

        for j in j_range {
            for i in i_range.clone() {
                let (px, py) = (gx[i], gy[j]);
                let l1 = ((by - cy) * (px - cx) + (cx - bx) * (py - cy)) / det;
                let l2 = ((cy - ay) * (px - cx) + (ax - cx) * (py - cy)) / det;
                let l3 = 1.0 - l1 - l2;
                if l1 >= -EDGE_EPS && l2 >= -EDGE_EPS && l3 >= -EDGE_EPS {
                    values[j * nx + i] = Some(l1 * z[a] + l2 * z[b] + l3 * z[c]);
                }
            }
        }
    }

    if values.iter().all(Option::is_none) {
        return Err(PlotError::InvalidData(format!(
            "no raster node fell inside the {} triangles",
            tri.len()
        )));
    }
    Ok(ScalarRaster { x: gx, y: gy, values })
}

/// Raster node indices whose coordinate may fall in `[lo, hi]`.
fn node_range(lo: f64, hi: f64, origin: f64, step: f64, n: usize) -> std::ops::Range<usize> {
    if step <= 0.0 {
        return 0..n;
    }
    let start = ((lo - origin) / step).floor().max(0.0) as usize;
    let end = (((hi - origin) / step).ceil() as usize + 1).min(n);
    start.min(n)..end
}

/// Band index of `value` among `levels` equal bands over `[lo, hi]`.
pub fn quantize(value: f64, lo: f64, hi: f64, levels: usize) -> usize {
    if levels <= 1 || hi <= lo {
        return 0;
    }
    let t = ((value - lo) / (hi - lo)).clamp(0.0, 1.0);
    ((t * levels as f64) as usize).min(levels - 1)
}

/// Filled contour map of `z` over the scattered `(x, y)` positions, with a
/// colour bar labelled `title`. Samples with any non-finite coordinate are
/// dropped first.
#[allow(clippy::too_many_arguments)]
pub fn draw_scalar_map<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    x: &[f64],
    y: &[f64],
    z: &[f64],
    title: &str,
    x_label: &str,
    y_label: &str,
    settings: &PlotSettings,
) -> Result<ScalarRaster> {
    let samples = finite_triples(x, y, z);
    let n = settings.contour_resolution;
    let raster = triangulated_raster(&samples.x, &samples.y, &samples.z, n, n)?;
    let (z_lo, z_hi) = min_max(&samples.z).unwrap_or((0.0, 1.0));
    let levels = settings.contour_levels;

    let (main, bar) = split_color_bar(area);
    let (dx, dy) = raster.steps();
    let x_range = span(raster.x[0] - dx / 2.0, raster.x[raster.x.len() - 1] + dx / 2.0);
    let y_range = span(raster.y[0] - dy / 2.0, raster.y[raster.y.len() - 1] + dy / 2.0);

    let mut chart = ChartBuilder::on(&main)
        .caption(title, CAPTION_FONT)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .label_style(LABEL_FONT)
        .draw()
        .map_err(draw_err)?;

    let nx = raster.x.len();
    chart
        .draw_series(raster.values.iter().enumerate().filter_map(|(idx, v)| {
            let v = (*v)?;
            let (cx, cy) = (raster.x[idx % nx], raster.y[idx / nx]);
            let band = quantize(v, z_lo, z_hi, levels);
            Some(Rectangle::new(
                [(cx - dx / 2.0, cy - dy / 2.0), (cx + dx / 2.0, cy + dy / 2.0)],
                viridis_band(band, levels).filled(),
            ))
        }))
        .map_err(draw_err)?;

    draw_color_bar(&bar, z_lo, z_hi, title, Some(levels))?;
    Ok(raster)
}

#[allow(clippy::too_many_arguments)]
pub fn save_scalar_map(
    path: &Path,
    x: &[f64],
    y: &[f64],
    z: &[f64],
    title: &str,
    x_label: &str,
    y_label: &str,
    settings: &PlotSettings,
) -> Result<()> {
    let root = png_canvas(path, (settings.width, settings.height))?;
    draw_scalar_map(&root, x, y, z, title, x_label, y_label, settings)?;
    finish(root, "Contour plot", path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn plane_is_reproduced_exactly() {
        // z = x + 2y is linear, so any triangulation interpolates it exactly.
        let x = [0.0, 4.0, 0.0, 4.0, 2.0];
        let y = [0.0, 0.0, 4.0, 4.0, 2.0];
        let z: Vec<f64> = x.iter().zip(&y).map(|(x, y)| x + 2.0 * y).collect();
        let r = triangulated_raster(&x, &y, &z, 5, 5).unwrap();
        assert_eq!(r.x, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        for j in 0..5 {
            for i in 0..5 {
                let v = r.get(i, j).unwrap();
                assert_relative_eq!(v, r.x[i] + 2.0 * r.y[j], epsilon = 1e-9);
            }
        }
        assert_eq!(r.steps(), (1.0, 1.0));
    }

    #[test]
    fn outside_the_hull_is_empty() {
        let x = [0.0, 2.0, 0.0];
        let y = [0.0, 0.0, 2.0];
        let z = [1.0, 1.0, 1.0];
        let r = triangulated_raster(&x, &y, &z, 3, 3).unwrap();
        assert_eq!(r.get(0, 0), Some(1.0));
        assert_eq!(r.get(1, 1), Some(1.0));
        assert_eq!(r.get(2, 2), None);
        assert_eq!(r.get(2, 1), None);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert!(matches!(
            triangulated_raster(&[0.0, 1.0], &[0.0, 1.0], &[1.0, 2.0], 4, 4),
            Err(PlotError::InvalidData(_))
        ));
        assert!(matches!(
            triangulated_raster(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0], &[1.0, 2.0, 3.0], 4, 4),
            Err(PlotError::InvalidData(_))
        ));
    }

    #[test]
    fn nanometre_pitch_in_metres_is_filled() {
        let pitch = 2e-9;
        let (mut x, mut y, mut z) = (Vec::new(), Vec::new(), Vec::new());
        for i in 0..5 {
            for j in 0..5 {
                x.push(i as f64 * pitch);
                y.push(j as f64 * pitch);
                z.push((i + j) as f64);
            }
        }
        let r = triangulated_raster(&x, &y, &z, 10, 10).unwrap();
        assert!(r.values.iter().all(Option::is_some));
        assert_relative_eq!(r.get(9, 9).unwrap(), 8.0, epsilon = 1e-6);
        assert_relative_eq!(r.get(0, 0).unwrap(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn quantize_bands() {
        assert_eq!(quantize(0.0, 0.0, 14.0, 14), 0);
        assert_eq!(quantize(13.5, 0.0, 14.0, 14), 13);
        assert_eq!(quantize(14.0, 0.0, 14.0, 14), 13);
        assert_eq!(quantize(-3.0, 0.0, 14.0, 14), 0);
        assert_eq!(quantize(5.0, 5.0, 5.0, 14), 0);
    }

    #[test]
    fn map_skips_missing_samples_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hardness_map.png");
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut z = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                x.push(i as f64 * 5.0);
                y.push(j as f64 * 5.0);
                z.push(3.0 + (i * j) as f64 * 0.1);
            }
        }
        z[7] = f64::NAN;
        let settings = PlotSettings {
            width: 400,
            height: 300,
            contour_resolution: 40,
            ..PlotSettings::default()
        };
        save_scalar_map(&path, &x, &y, &z, "Hardness (GPa)", "X (µm)", "Y (µm)", &settings).unwrap();
        assert!(path.exists());
    }
}
