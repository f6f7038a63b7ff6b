use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::color::{parse_hex, ColorMap};
use crate::data::loader::guess_value_type;

/// Rendering and fitting settings, loadable from a JSON file.
///
/// Every field is optional in the file:
///
/// ```json
/// { "width": 1200, "histogram_bins": 40, "cluster_colors": { "0": "#1f77b4" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlotSettings {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Histogram bars under the mixture overlay.
    pub histogram_bins: usize,
    /// Evaluation points for fitted curves.
    pub curve_points: usize,
    /// Filled bands in scalar contour maps.
    pub contour_levels: usize,
    /// Raster cells per axis when interpolating scattered data.
    pub contour_resolution: usize,
    /// k-means++ restarts.
    pub kmeans_restarts: usize,
    /// Seed for k-means++.
    pub seed: u64,
    /// Z-score features before clustering.
    pub standardize: bool,
    /// Output pixels per grid cell for raw pixel-map rasters.
    pub raw_pixel_scale: u32,
    /// Fixed colours for labels, `label → #rrggbb`.
    pub cluster_colors: BTreeMap<String, String>,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 600,
            histogram_bins: 30,
            curve_points: 1000,
            contour_levels: 14,
            contour_resolution: 200,
            kmeans_restarts: 10,
            seed: 0,
            standardize: true,
            raw_pixel_scale: 10,
            cluster_colors: BTreeMap::new(),
        }
    }
}

impl PlotSettings {
    /// Load settings from a JSON file; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        let settings: PlotSettings = serde_json::from_str(&text)
            .with_context(|| format!("parsing settings {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check the settings make a drawable figure.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.width >= 100 && self.height >= 100, "figure must be at least 100×100 px");
        anyhow::ensure!(self.histogram_bins > 0, "histogram_bins must be positive");
        anyhow::ensure!(self.curve_points >= 2, "curve_points must be at least 2");
        anyhow::ensure!(self.contour_levels > 0, "contour_levels must be positive");
        anyhow::ensure!(self.contour_resolution >= 2, "contour_resolution must be at least 2");
        anyhow::ensure!(self.raw_pixel_scale > 0, "raw_pixel_scale must be positive");
        for (label, hex) in &self.cluster_colors {
            anyhow::ensure!(
                parse_hex(hex).is_some(),
                "cluster_colors[{label}]: '{hex}' is not a #rrggbb colour"
            );
        }
        Ok(())
    }

    /// Apply the configured colour overrides to a label colour map.
    pub fn apply_colors(&self, mut map: ColorMap) -> ColorMap {
        for (label, hex) in &self.cluster_colors {
            if let Some(color) = parse_hex(hex) {
                map = map.with_override(guess_value_type(label), color);
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Value;
    use plotters::style::RGBColor;
    use std::io::Write;

    fn write_json(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
        (dir, path)
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let (_dir, path) = write_json(r#"{ "width": 1200, "histogram_bins": 40 }"#);
        let s = PlotSettings::load(&path).unwrap();
        assert_eq!(s.width, 1200);
        assert_eq!(s.histogram_bins, 40);
        assert_eq!(s.height, PlotSettings::default().height);
        assert_eq!(s.contour_levels, 14);
    }

    #[test]
    fn unknown_field_rejected() {
        let (_dir, path) = write_json(r#"{ "widht": 1200 }"#);
        assert!(PlotSettings::load(&path).is_err());
    }

    #[test]
    fn invalid_values_rejected() {
        let (_dir, path) = write_json(r#"{ "histogram_bins": 0 }"#);
        assert!(PlotSettings::load(&path).is_err());
        let (_dir, path) = write_json(r##"{ "cluster_colors": { "0": "blue" } }"##);
        assert!(PlotSettings::load(&path).is_err());
    }

    #[test]
    fn colour_overrides_apply_to_integer_labels() {
        let (_dir, path) = write_json(r##"{ "cluster_colors": { "2": "#000000" } }"##);
        let s = PlotSettings::load(&path).unwrap();
        let cm = s.apply_colors(ColorMap::for_clusters(3));
        assert_eq!(cm.color_for(&Value::Integer(2)), RGBColor(0, 0, 0));
    }
}
