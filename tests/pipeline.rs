use std::fs;
use std::path::Path;

use mech_maps::color::ColorMap;
use mech_maps::config::PlotSettings;
use mech_maps::data::afm::{load_afm, DEFAULT_HEADER_LINES};
use mech_maps::data::filter::complete_rows;
use mech_maps::data::grid::{GridError, PixelGrid};
use mech_maps::data::loader::{load_table, write_csv, LoadOptions};
use mech_maps::data::model::Value;
use mech_maps::render::{contour, distribution, heatmap, pixel, scatter};
use mech_maps::stats::kmeans::KMeans;

const GRID: usize = 6;
const PITCH: f64 = 5.0;

fn settings() -> PlotSettings {
    PlotSettings {
        width: 500,
        height: 400,
        curve_points: 200,
        contour_resolution: 40,
        ..PlotSettings::default()
    }
}

/// Soft phase on the left half of the grid, hard phase on the right.
fn write_grid_csv(path: &Path) {
    let mut text = String::from("# exported by the indenter\nX,Y,H,E\n");
    for j in 0..GRID {
        for i in 0..GRID {
            let (h, e) = if i < GRID / 2 { (2.0, 90.0) } else { (8.0, 210.0) };
            let jitter = (i * GRID + j) as f64 * 0.01;
            text.push_str(&format!(
                "{},{},{},{}\n",
                i as f64 * PITCH,
                j as f64 * PITCH,
                h + jitter,
                e + jitter * 10.0
            ));
        }
    }
    fs::write(path, text).unwrap();
}

#[test]
fn csv_to_clusters_to_every_chart() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("grid.csv");
    write_grid_csv(&csv);
    let settings = settings();

    let mut table = load_table(&csv, &LoadOptions { skip_lines: 1 }).unwrap();
    assert_eq!(table.len(), GRID * GRID);

    let h = table.numeric("H").unwrap();
    let e = table.numeric("E").unwrap();
    let rows = complete_rows(&[h.clone(), e.clone()]);
    assert_eq!(rows.len(), table.len());
    let points: Vec<Vec<f64>> = rows.iter().map(|&r| vec![h[r], e[r]]).collect();

    let fit = KMeans::new(2).with_seed(settings.seed).fit(&points).unwrap();
    assert_eq!(fit.cluster_sizes(), vec![GRID * GRID / 2, GRID * GRID / 2]);
    let labels: Vec<Value> = fit.labels.iter().map(|&l| Value::Integer(l as i64)).collect();
    table.add_column("Cluster", labels.clone(), false).unwrap();

    let clustered = dir.path().join("out").join("grid_clustered.csv");
    fs::create_dir_all(clustered.parent().unwrap()).unwrap();
    write_csv(&table, &clustered).unwrap();
    let reloaded = load_table(&clustered, &LoadOptions::default()).unwrap();
    assert_eq!(reloaded.column_names(), vec!["X", "Y", "H", "E", "Cluster"]);

    let x = reloaded.numeric("X").unwrap();
    let y = reloaded.numeric("Y").unwrap();
    let grid = PixelGrid::pivot(&x, &y, &reloaded.column("Cluster").unwrap().values).unwrap();
    assert_eq!((grid.rows(), grid.cols()), (GRID, GRID));
    // Left column is the soft phase, which sorts first.
    assert_eq!(grid.get(0, 0), Some(&Value::Integer(0)));
    assert_eq!(grid.get(0, GRID - 1), Some(&Value::Integer(1)));

    let colors = settings.apply_colors(ColorMap::for_clusters(2));
    let out = dir.path().join("out");

    let hv: Vec<(f64, f64)> = h.iter().copied().zip(e.iter().copied()).collect();
    let scatter_path =
        scatter::save_cluster_scatter(&hv, &labels, &colors, &settings, &out, "H vs E", "H", "E")
            .unwrap();
    assert_eq!(scatter_path.file_name().unwrap(), "H_vs_E.png");

    pixel::save_pixel_map(&grid, &colors, "Cluster map", "X", "Y", &settings, &out.join("pixel_map.png"))
        .unwrap();
    pixel::save_raw_raster(&grid, &colors, settings.raw_pixel_scale, &out.join("pixel_map_raw.png"))
        .unwrap();
    contour::save_scalar_map(&out.join("hardness.png"), &x, &y, &h, "H", "X", "Y", &settings).unwrap();
    distribution::save_distribution_summary(&out.join("summary.png"), "H", &h, 2, &settings).unwrap();

    for name in [
        "grid_clustered.csv",
        "H_vs_E.png",
        "pixel_map.png",
        "pixel_map_raw.png",
        "hardness.png",
        "summary.png",
    ] {
        assert!(out.join(name).exists(), "{name} missing");
    }
}

#[test]
fn incomplete_grid_fails_loudly() {
    let x = [0.0, 1.0, 0.0];
    let y = [0.0, 0.0, 1.0];
    let z = [Value::Integer(0), Value::Integer(1), Value::Integer(0)];
    let err = PixelGrid::pivot(&x, &y, &z).unwrap_err();
    assert_eq!(
        err,
        GridError::Incomplete {
            missing: 1,
            total: 4,
            x: 1.0,
            y: 1.0
        }
    );
}

#[test]
fn afm_file_to_centered_heatmap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.txt");
    let mut text = String::from("# Channel: Height\n# Width: 4.000 µm\n# Height: 3.000 µm\n# Value units: m\n");
    for r in 0..3 {
        let row: Vec<String> = (0..4)
            .map(|c| {
                let v = if (r, c) == (2, 1) { -5e-9 } else { (r + c) as f64 * 1e-9 };
                format!("{v:e}")
            })
            .collect();
        text.push_str(&row.join(" "));
        text.push('\n');
    }
    fs::write(&path, text).unwrap();

    let scan = load_afm(&path, DEFAULT_HEADER_LINES).unwrap();
    assert_eq!((scan.rows(), scan.cols()), (3, 4));
    assert_eq!(scan.header.lateral_unit.as_deref(), Some("µm"));
    assert_eq!(scan.header.value_unit.as_deref(), Some("m"));

    let centered = scan.center_on_minimum().unwrap();
    assert_eq!(centered.min_index, (2, 1));
    assert_eq!(centered.coordinate(2, 1), (0.0, 0.0));
    assert_eq!(centered.coordinate(0, 0), (-1.0, -2.0));

    let out = dir.path().join("afm.png");
    heatmap::save_afm_heatmap(&scan, &centered, &settings(), &out).unwrap();
    assert!(out.exists());

    let cropped = scan.crop(1..3, 0..2).unwrap();
    let centered = cropped.center_on_minimum().unwrap();
    assert_eq!(centered.min_index, (1, 1));
}

#[test]
fn afm_with_wrong_header_length_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.txt");
    fs::write(&path, "# Channel: Height\n# Width: 4 µm\n1 2\n3 4\n").unwrap();
    // Only one header line skipped, so "# Width: ..." is parsed as data.
    assert!(load_afm(&path, 1).is_err());
    assert!(load_afm(&path, 2).is_ok());
}
