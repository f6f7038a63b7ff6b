use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use mech_maps::color::ColorMap;
use mech_maps::config::PlotSettings;
use mech_maps::data::afm::{load_afm, DEFAULT_HEADER_LINES};
use mech_maps::data::filter::complete_rows;
use mech_maps::data::grid::PixelGrid;
use mech_maps::data::loader::{load_table, write_csv, LoadOptions};
use mech_maps::data::model::{Table, Value};
use mech_maps::render::{contour, distribution, heatmap, pixel, scatter};
use mech_maps::stats::kmeans::KMeans;

/// Nanoindentation and AFM map analysis
#[derive(Parser)]
#[command(name = "mech-maps", version)]
#[command(about = "Deconvolve, fit, cluster and map nanoindentation and AFM data")]
struct Cli {
    /// JSON file with plot and fit settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct InputArgs {
    /// Table to read (.csv, .tsv, .txt, .dat, .json, .parquet)
    #[arg(short, long)]
    input: PathBuf,

    /// Lines of preamble before the header row
    #[arg(long, default_value_t = 0)]
    skip_lines: usize,
}

impl InputArgs {
    fn load(&self) -> Result<Table> {
        load_table(
            &self.input,
            &LoadOptions {
                skip_lines: self.skip_lines,
            },
        )
    }
}

#[derive(Subcommand)]
enum Command {
    /// Histogram with Gaussian-mixture deconvolution
    Deconvolve {
        #[command(flatten)]
        input: InputArgs,
        #[arg(short, long)]
        column: String,
        #[arg(short = 'k', long, default_value_t = 2)]
        components: usize,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Empirical CDF with a Weibull fit
    Weibull {
        #[command(flatten)]
        input: InputArgs,
        #[arg(short, long)]
        column: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Deconvolution and CDF side by side
    Summary {
        #[command(flatten)]
        input: InputArgs,
        #[arg(short, long)]
        column: String,
        #[arg(short = 'k', long, default_value_t = 2)]
        components: usize,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// K-means clustering, clustered table, scatter and optional pixel maps
    Cluster {
        #[command(flatten)]
        input: InputArgs,
        /// Feature columns, comma separated; the first two are plotted
        #[arg(short, long, value_delimiter = ',', required = true)]
        features: Vec<String>,
        #[arg(short, long, default_value_t = 3)]
        k: usize,
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Grid x column for the pixel map
        #[arg(long, requires = "y")]
        x: Option<String>,
        /// Grid y column for the pixel map
        #[arg(long, requires = "x")]
        y: Option<String>,
        /// Scatter caption; also names the scatter file
        #[arg(long)]
        title: Option<String>,
    },
    /// Triangulated contour map of a scalar column
    Map {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        x: String,
        #[arg(long)]
        y: String,
        #[arg(long)]
        z: String,
        /// Caption and colour-bar label (defaults to the z column)
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Square-pixel map of a label column on a regular grid
    PixelMap {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long)]
        x: String,
        #[arg(long)]
        y: String,
        #[arg(short, long)]
        label: String,
        #[arg(short, long)]
        output: PathBuf,
        /// Also write a bare raster without axes
        #[arg(long)]
        raw: Option<PathBuf>,
    },
    /// AFM height scan centered on its minimum
    Afm {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long, default_value_t = DEFAULT_HEADER_LINES)]
        header_lines: usize,
        /// Sub-rectangle `r0,r1,c0,c1` (end-exclusive)
        #[arg(long, value_parser = parse_crop)]
        crop: Option<Crop>,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Crop {
    rows: Range<usize>,
    cols: Range<usize>,
}

fn parse_crop(s: &str) -> std::result::Result<Crop, String> {
    let parts: Vec<usize> = s
        .split(',')
        .map(|p| p.trim().parse::<usize>().map_err(|e| format!("'{p}': {e}")))
        .collect::<std::result::Result<_, _>>()?;
    match parts[..] {
        [r0, r1, c0, c1] if r0 < r1 && c0 < c1 => Ok(Crop {
            rows: r0..r1,
            cols: c0..c1,
        }),
        [_, _, _, _] => Err("crop ranges must be non-empty (r0 < r1, c0 < c1)".into()),
        _ => Err(format!("expected r0,r1,c0,c1, got {} values", parts.len())),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let settings = match &cli.config {
        Some(path) => PlotSettings::load(path)?,
        None => PlotSettings::default(),
    };

    run(cli.command, &settings)
}

fn run(command: Command, settings: &PlotSettings) -> Result<()> {
    match command {
        Command::Deconvolve {
            input,
            column,
            components,
            output,
        } => {
            let values = input.load()?.numeric(&column)?;
            let fit = distribution::save_mixture_overlay(&output, &column, &values, components, settings)?;
            log::info!(
                "{components} components: BIC {:.2}, AIC {:.2}, converged {}",
                fit.bic(),
                fit.aic(),
                fit.converged()
            );
        }
        Command::Weibull {
            input,
            column,
            output,
        } => {
            let values = input.load()?.numeric(&column)?;
            distribution::save_cdf_overlay(&output, &column, &values, settings)?;
        }
        Command::Summary {
            input,
            column,
            components,
            output,
        } => {
            let values = input.load()?.numeric(&column)?;
            distribution::save_distribution_summary(&output, &column, &values, components, settings)?;
        }
        Command::Cluster {
            input,
            features,
            k,
            output_dir,
            x,
            y,
            title,
        } => {
            let mut table = input.load()?;
            let stem = input
                .input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("data")
                .to_string();
            let grid_columns = x.zip(y);
            run_cluster(
                &mut table,
                &features,
                k,
                &output_dir,
                &stem,
                grid_columns,
                title.as_deref(),
                settings,
            )?;
        }
        Command::Map {
            input,
            x,
            y,
            z,
            title,
            output,
        } => {
            let table = input.load()?;
            let title = title.unwrap_or_else(|| z.clone());
            contour::save_scalar_map(
                &output,
                &table.numeric(&x)?,
                &table.numeric(&y)?,
                &table.numeric(&z)?,
                &title,
                &x,
                &y,
                settings,
            )?;
        }
        Command::PixelMap {
            input,
            x,
            y,
            label,
            output,
            raw,
        } => {
            let table = input.load()?;
            let grid = label_grid(&table, &x, &y, &label)?;
            let colors = settings.apply_colors(ColorMap::new(&grid.iter().map(|(_, _, v)| v.clone()).collect()));
            pixel::save_pixel_map(&grid, &colors, &format!("{label} map"), &x, &y, settings, &output)?;
            if let Some(raw) = raw {
                pixel::save_raw_raster(&grid, &colors, settings.raw_pixel_scale, &raw)?;
            }
        }
        Command::Afm {
            input,
            header_lines,
            crop,
            output,
        } => {
            let mut scan = load_afm(&input, header_lines)?;
            if let Some(Crop { rows, cols }) = crop {
                scan = scan.crop(rows, cols)?;
            }
            let centered = scan.center_on_minimum()?;
            log::info!(
                "Minimum height at row {}, column {} of a {} × {} scan",
                centered.min_index.0,
                centered.min_index.1,
                scan.rows(),
                scan.cols()
            );
            heatmap::save_afm_heatmap(&scan, &centered, settings, &output)?;
        }
    }
    Ok(())
}

/// Default scatter caption for the first two feature columns.
fn scatter_title(a: &str, b: &str) -> String {
    format!("KMeans Clustering of {a} and {b}")
}

#[allow(clippy::too_many_arguments)]
fn run_cluster(
    table: &mut Table,
    features: &[String],
    k: usize,
    output_dir: &Path,
    stem: &str,
    grid_columns: Option<(String, String)>,
    title: Option<&str>,
    settings: &PlotSettings,
) -> Result<()> {
    let columns = features
        .iter()
        .map(|f| table.numeric(f))
        .collect::<Result<Vec<_>>>()?;
    let rows = complete_rows(&columns);
    if rows.len() < table.len() {
        log::warn!(
            "{} of {} rows have missing features and are left unclustered",
            table.len() - rows.len(),
            table.len()
        );
    }
    let points: Vec<Vec<f64>> = rows
        .iter()
        .map(|&r| columns.iter().map(|c| c[r]).collect())
        .collect();

    let fit = KMeans::new(k)
        .with_restarts(settings.kmeans_restarts)
        .with_seed(settings.seed)
        .with_standardize(settings.standardize)
        .fit(&points)
        .context("clustering")?;
    log::info!("Cluster sizes {:?}, inertia {:.4}", fit.cluster_sizes(), fit.inertia);
    for (i, c) in fit.centroids.iter().enumerate() {
        log::info!("Cluster {i} centroid {c:?}");
    }

    let mut labels = vec![Value::Null; table.len()];
    for (&r, &l) in rows.iter().zip(&fit.labels) {
        labels[r] = Value::Integer(l as i64);
    }
    table.add_column("Cluster", labels, true)?;
    let csv_path = output_dir.join(format!("{stem}_clustered.csv"));
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    write_csv(table, &csv_path)?;
    log::info!("Clustered table saved to {}", csv_path.display());

    let colors = settings.apply_colors(ColorMap::for_clusters(k));
    let point_labels: Vec<Value> = fit.labels.iter().map(|&l| Value::Integer(l as i64)).collect();

    if let [a, b, ..] = features {
        let xy: Vec<(f64, f64)> = points.iter().map(|p| (p[0], p[1])).collect();
        scatter::save_cluster_scatter(
            &xy,
            &point_labels,
            &colors,
            settings,
            output_dir,
            &title.map_or_else(|| scatter_title(a, b), str::to_string),
            a,
            b,
        )?;
    }

    if let Some((x, y)) = grid_columns {
        let grid = label_grid(table, &x, &y, "Cluster")?;
        pixel::save_pixel_map(
            &grid,
            &colors,
            "Cluster map",
            &x,
            &y,
            settings,
            &output_dir.join("pixel_map.png"),
        )?;
        pixel::save_raw_raster(
            &grid,
            &colors,
            settings.raw_pixel_scale,
            &output_dir.join("pixel_map_raw.png"),
        )?;
    }
    Ok(())
}

/// Pivot a label column over grid columns, keeping rows with finite
/// coordinates and a non-missing label.
fn label_grid(table: &Table, x: &str, y: &str, label: &str) -> Result<PixelGrid<Value>> {
    let xs = table.numeric(x)?;
    let ys = table.numeric(y)?;
    let labels = &table.column(label)?.values;

    let keep: Vec<usize> = (0..table.len())
        .filter(|&i| xs[i].is_finite() && ys[i].is_finite() && !labels[i].is_null())
        .collect();
    if keep.is_empty() {
        bail!("no rows with finite '{x}', '{y}' and a '{label}' value");
    }
    let grid = PixelGrid::pivot(
        &keep.iter().map(|&i| xs[i]).collect::<Vec<_>>(),
        &keep.iter().map(|&i| ys[i]).collect::<Vec<_>>(),
        &keep.iter().map(|&i| labels[i].clone()).collect::<Vec<_>>(),
    )
    .with_context(|| format!("pivoting '{label}' over '{x}' × '{y}'"))?;
    Ok(grid)
}
