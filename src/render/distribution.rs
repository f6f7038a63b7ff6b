//! Distribution charts for a single property column: the histogram with its
//! Gaussian-mixture deconvolution, and the empirical CDF with a Weibull fit.

use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use super::{chart_err, draw_err, finish, padded, png_canvas, PlotError, Result, CAPTION_FONT, LABEL_FONT, LIGHT_GRAY};
use crate::color::generate_palette;
use crate::config::PlotSettings;
use crate::stats::ecdf::empirical_cdf;
use crate::stats::gmm::{GaussianMixture, MixtureFit};
use crate::stats::histogram::density_histogram;
use crate::stats::min_max;
use crate::stats::weibull::{fit_weibull, WeibullFit};

fn finite_values(column: &str, values: &[f64]) -> Result<(Vec<f64>, f64, f64)> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let (lo, hi) = min_max(&finite)
        .ok_or_else(|| PlotError::InvalidData(format!("column '{column}' has no finite values")))?;
    Ok((finite, lo, hi))
}

fn legend_line(color: RGBColor) -> impl Fn((i32, i32)) -> PathElement<(i32, i32)> {
    move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
}

/// Density histogram of `values` overlaid with a `k`-component mixture fit.
///
/// Missing (non-finite) values are dropped before fitting. Returns the fit so
/// callers can report the component parameters.
pub fn draw_mixture_overlay<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    column: &str,
    values: &[f64],
    k: usize,
    settings: &PlotSettings,
) -> Result<MixtureFit> {
    let (finite, lo, hi) = finite_values(column, values)?;
    let fit = GaussianMixture::new(k).fit(&finite)?;
    log::info!(
        "GMM fit of {column}: means {:?}, weights {:?}",
        fit.means(),
        fit.weights()
    );

    let bins = density_histogram(&finite, settings.histogram_bins);
    let curves = fit.curves(lo, hi, settings.curve_points);

    let x_range = padded(
        bins.first().map_or(lo, |b| b.left),
        bins.last().map_or(hi, |b| b.right),
    );
    let y_max = bins
        .iter()
        .map(|b| b.density)
        .chain(curves.total.iter().copied())
        .fold(0.0, f64::max);
    let y_max = if y_max > 0.0 { y_max * 1.1 } else { 1.0 };

    let mut chart = ChartBuilder::on(area)
        .caption(format!("PDF and GMM Deconvolution of {column}"), CAPTION_FONT)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, 0.0..y_max)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_desc(column)
        .y_desc("Density")
        .label_style(LABEL_FONT)
        .draw()
        .map_err(draw_err)?;

    chart
        .draw_series(
            bins.iter()
                .map(|b| Rectangle::new([(b.left, 0.0), (b.right, b.density)], LIGHT_GRAY.filled())),
        )
        .map_err(draw_err)?;
    chart
        .draw_series(
            bins.iter()
                .map(|b| Rectangle::new([(b.left, 0.0), (b.right, b.density)], BLACK.stroke_width(1))),
        )
        .map_err(draw_err)?;

    for (i, (curve, color)) in curves
        .components
        .iter()
        .zip(generate_palette(fit.num_components()))
        .enumerate()
    {
        chart
            .draw_series(LineSeries::new(
                curves.x.iter().copied().zip(curve.iter().copied()),
                color.stroke_width(2),
            ))
            .map_err(draw_err)?
            .label(format!("Component {}", i + 1))
            .legend(legend_line(color));
    }

    chart
        .draw_series(LineSeries::new(
            curves.x.iter().copied().zip(curves.total.iter().copied()),
            BLACK.stroke_width(2),
        ))
        .map_err(draw_err)?
        .label("GMM Total")
        .legend(legend_line(BLACK));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(LABEL_FONT)
        .draw()
        .map_err(draw_err)?;

    Ok(fit)
}

/// Empirical CDF of `values` (blue staircase) with a fitted Weibull CDF (red).
pub fn draw_cdf_overlay<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    column: &str,
    values: &[f64],
    settings: &PlotSettings,
) -> Result<WeibullFit> {
    let (finite, lo, hi) = finite_values(column, values)?;
    let cdf = empirical_cdf(&finite);
    let fit = fit_weibull(&finite)?;
    log::info!(
        "Weibull fit of {column}: shape {:.4}, scale {:.4}",
        fit.shape,
        fit.scale
    );

    let mut chart = ChartBuilder::on(area)
        .caption(format!("CDF and Weibull Fit of {column}"), CAPTION_FONT)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(padded(lo, hi), 0.0..1.05)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_desc(column)
        .y_desc("Cumulative probability")
        .label_style(LABEL_FONT)
        .draw()
        .map_err(draw_err)?;

    chart
        .draw_series(LineSeries::new(cdf.step_points(), BLUE.stroke_width(2)))
        .map_err(draw_err)?
        .label("Empirical CDF")
        .legend(legend_line(BLUE));

    chart
        .draw_series(LineSeries::new(
            fit.curve(lo, hi, settings.curve_points),
            RED.stroke_width(2),
        ))
        .map_err(draw_err)?
        .label("Weibull Fit")
        .legend(legend_line(RED));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font(LABEL_FONT)
        .draw()
        .map_err(draw_err)?;

    Ok(fit)
}

pub fn save_mixture_overlay(
    path: &Path,
    column: &str,
    values: &[f64],
    k: usize,
    settings: &PlotSettings,
) -> Result<MixtureFit> {
    let root = png_canvas(path, (settings.width, settings.height))?;
    let fit = draw_mixture_overlay(&root, column, values, k, settings)?;
    finish(root, "GMM deconvolution plot", path)?;
    Ok(fit)
}

pub fn save_cdf_overlay(
    path: &Path,
    column: &str,
    values: &[f64],
    settings: &PlotSettings,
) -> Result<WeibullFit> {
    let root = png_canvas(path, (settings.width, settings.height))?;
    let fit = draw_cdf_overlay(&root, column, values, settings)?;
    finish(root, "CDF plot", path)?;
    Ok(fit)
}

/// PDF deconvolution (left) and CDF fit (right) in one figure twice as wide
/// as the configured size.
pub fn save_distribution_summary(
    path: &Path,
    column: &str,
    values: &[f64],
    k: usize,
    settings: &PlotSettings,
) -> Result<(MixtureFit, WeibullFit)> {
    let root = png_canvas(path, (settings.width * 2, settings.height))?;
    let panels = root.split_evenly((1, 2));
    let mixture = draw_mixture_overlay(&panels[0], column, values, k, settings)?;
    let weibull = draw_cdf_overlay(&panels[1], column, values, settings)?;
    finish(root, "Distribution summary plot", path)?;
    Ok((mixture, weibull))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SimpleRng;
    use crate::stats::FitError;

    fn bimodal() -> Vec<f64> {
        let mut rng = SimpleRng::new(3);
        let mut v: Vec<f64> = (0..200).map(|_| rng.gauss(4.0, 0.4)).collect();
        v.extend((0..200).map(|_| rng.gauss(9.0, 0.6)));
        v.push(f64::NAN);
        v
    }

    fn small_settings() -> PlotSettings {
        PlotSettings {
            width: 400,
            height: 300,
            curve_points: 200,
            ..PlotSettings::default()
        }
    }

    #[test]
    fn mixture_overlay_draws_into_memory() {
        let settings = small_settings();
        let mut buf = vec![0u8; 400 * 300 * 3];
        let fit = {
            let root = BitMapBackend::with_buffer(&mut buf, (400, 300)).into_drawing_area();
            root.fill(&WHITE).unwrap();
            let fit = draw_mixture_overlay(&root, "H", &bimodal(), 2, &settings).unwrap();
            root.present().unwrap();
            fit
        };
        assert_eq!(fit.num_components(), 2);
        assert!((fit.means()[0] - 4.0).abs() < 0.3);
        assert!((fit.means()[1] - 9.0).abs() < 0.3);
        // Something other than the white background was drawn.
        assert!(buf.iter().any(|&b| b != 255));
    }

    #[test]
    fn summary_and_single_plots_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let settings = small_settings();
        let values: Vec<f64> = bimodal();

        let summary = dir.path().join("summary.png");
        let (mixture, weibull) =
            save_distribution_summary(&summary, "H", &values, 2, &settings).unwrap();
        assert_eq!(mixture.num_components(), 2);
        assert!(weibull.shape > 0.0);
        assert!(summary.exists());

        let cdf = dir.path().join("cdf.png");
        save_cdf_overlay(&cdf, "H", &values, &settings).unwrap();
        assert!(cdf.exists());
    }

    #[test]
    fn fit_errors_surface_as_plot_errors() {
        let dir = tempfile::tempdir().unwrap();
        let settings = small_settings();
        let err = save_cdf_overlay(&dir.path().join("x.png"), "E", &[0.0, 1.0, 2.0], &settings)
            .unwrap_err();
        assert!(matches!(err, PlotError::Fit(FitError::NonPositive)));

        let err = save_mixture_overlay(&dir.path().join("y.png"), "E", &[f64::NAN], 2, &settings)
            .unwrap_err();
        assert!(matches!(err, PlotError::InvalidData(_)));
    }
}
