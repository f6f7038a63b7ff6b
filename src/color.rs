use std::collections::{BTreeMap, BTreeSet};

use palette::{Hsl, IntoColor, LinSrgb, Mix, Srgb};
use plotters::style::RGBColor;

use crate::data::model::Value;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<RGBColor> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            to_rgb(rgb)
        })
        .collect()
}

fn to_rgb(rgb: Srgb) -> RGBColor {
    RGBColor(
        (rgb.red.clamp(0.0, 1.0) * 255.0).round() as u8,
        (rgb.green.clamp(0.0, 1.0) * 255.0).round() as u8,
        (rgb.blue.clamp(0.0, 1.0) * 255.0).round() as u8,
    )
}

// ---------------------------------------------------------------------------
// Sequential colour map for scalar fields
// ---------------------------------------------------------------------------

/// Anchor colours of the viridis map, sampled at equal spacing.
const VIRIDIS: [(u8, u8, u8); 9] = [
    (68, 1, 84),
    (71, 44, 122),
    (59, 81, 139),
    (44, 113, 142),
    (33, 144, 141),
    (39, 173, 129),
    (92, 200, 99),
    (170, 220, 50),
    (253, 231, 37),
];

/// Viridis colour at `t` in `[0, 1]` (clamped; NaN maps to the low end).
///
/// Anchors are blended in linear RGB so the ramp stays perceptually smooth.
pub fn viridis(t: f64) -> RGBColor {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let pos = t * (VIRIDIS.len() - 1) as f64;
    let i = (pos.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = (pos - i as f64) as f32;

    let anchor = |(r, g, b): (u8, u8, u8)| -> LinSrgb {
        Srgb::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0).into_linear()
    };
    let mixed = anchor(VIRIDIS[i]).mix(anchor(VIRIDIS[i + 1]), frac);
    to_rgb(Srgb::from_linear(mixed))
}

/// Colour of band `level` out of `levels` equal bands (contour fills).
pub fn viridis_band(level: usize, levels: usize) -> RGBColor {
    if levels <= 1 {
        return viridis(0.5);
    }
    viridis(level as f64 / (levels - 1) as f64)
}

// ---------------------------------------------------------------------------
// Color mapping: label value → RGBColor
// ---------------------------------------------------------------------------

/// Maps the unique values of a label column to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<Value, RGBColor>,
    default_color: RGBColor,
}

impl ColorMap {
    /// Build a colour map from a column's unique values.
    pub fn new(unique_values: &BTreeSet<Value>) -> Self {
        let palette = generate_palette(unique_values.len());
        let mapping: BTreeMap<Value, RGBColor> = unique_values
            .iter()
            .cloned()
            .zip(palette)
            .collect();

        ColorMap {
            mapping,
            default_color: RGBColor(128, 128, 128),
        }
    }

    /// Build a colour map for integer cluster labels `0..k`.
    pub fn for_clusters(k: usize) -> Self {
        let labels: BTreeSet<Value> = (0..k as i64).map(Value::Integer).collect();
        Self::new(&labels)
    }

    /// Use caller-chosen colours for specific labels, e.g. to keep a phase
    /// the same colour across figures.
    pub fn with_override(mut self, value: Value, color: RGBColor) -> Self {
        self.mapping.insert(value, color);
        self
    }

    /// Look up the colour for a given label value.
    pub fn color_for(&self, value: &Value) -> RGBColor {
        self.mapping
            .get(value)
            .copied()
            .unwrap_or(self.default_color)
    }
}

/// Parse a `#rrggbb` (or `#rgb`) hex colour.
pub fn parse_hex(s: &str) -> Option<RGBColor> {
    let rgb: Srgb<u8> = s.trim().parse().ok()?;
    Some(RGBColor(rgb.red, rgb.green, rgb.blue))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_colours_are_distinct() {
        let p = generate_palette(5);
        assert_eq!(p.len(), 5);
        for i in 0..p.len() {
            for j in i + 1..p.len() {
                assert_ne!(p[i], p[j]);
            }
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn viridis_endpoints() {
        assert_eq!(viridis(0.0), RGBColor(68, 1, 84));
        assert_eq!(viridis(1.0), RGBColor(253, 231, 37));
        assert_eq!(viridis(-3.0), viridis(0.0));
        assert_eq!(viridis(f64::NAN), viridis(0.0));
        assert_eq!(viridis_band(13, 14), viridis(1.0));
    }

    #[test]
    fn colour_map_lookup_and_override() {
        let cm = ColorMap::for_clusters(3).with_override(Value::Integer(1), RGBColor(0, 0, 0));
        assert_eq!(cm.color_for(&Value::Integer(1)), RGBColor(0, 0, 0));
        assert_eq!(cm.color_for(&Value::Integer(7)), RGBColor(128, 128, 128));
        assert_ne!(cm.color_for(&Value::Integer(0)), RGBColor(0, 0, 0));
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(parse_hex("#1f77b4"), Some(RGBColor(0x1f, 0x77, 0xb4)));
        assert_eq!(parse_hex("ff0000"), Some(RGBColor(255, 0, 0)));
        assert_eq!(parse_hex("#12345"), None);
        assert_eq!(parse_hex("#zz0000"), None);
        assert_eq!(parse_hex("#fff"), Some(RGBColor(255, 255, 255)));
        assert_eq!(parse_hex("blue"), None);
    }
}
