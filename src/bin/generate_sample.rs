use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;

use mech_maps::data::loader::write_csv;
use mech_maps::data::model::{Column, Table, Value};
use mech_maps::rng::SimpleRng;

/// Write synthetic nanoindentation and AFM sample files
#[derive(Parser)]
#[command(name = "generate-sample")]
struct Args {
    /// Directory to write the sample files into
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Indents per side of the square grid
    #[arg(long, default_value_t = 20)]
    grid: usize,

    /// Grid pitch in µm
    #[arg(long, default_value_t = 5.0)]
    pitch: f64,
}

/// Mean hardness and modulus (GPa) with their spreads, one row per phase.
const PHASES: [(f64, f64, f64, f64); 3] = [
    (3.0, 0.25, 150.0, 8.0), // matrix
    (8.0, 0.6, 220.0, 12.0), // precipitate
    (1.5, 0.2, 80.0, 6.0),   // soft inclusion
];

/// Phase under an indent: two round precipitates and a soft band.
fn phase_at(x: f64, y: f64, extent: f64) -> usize {
    let r = extent * 0.18;
    let in_circle = |cx: f64, cy: f64| (x - cx).powi(2) + (y - cy).powi(2) < r * r;
    if in_circle(extent * 0.3, extent * 0.3) || in_circle(extent * 0.7, extent * 0.65) {
        1
    } else if (y - x * 0.5 - extent * 0.55).abs() < extent * 0.06 {
        2
    } else {
        0
    }
}

fn indentation_grid(args: &Args, rng: &mut SimpleRng) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
    let extent = (args.grid.saturating_sub(1)) as f64 * args.pitch;
    let (mut xs, mut ys, mut hs, mut es) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
    for j in 0..args.grid {
        for i in 0..args.grid {
            let (x, y) = (i as f64 * args.pitch, j as f64 * args.pitch);
            let (h, h_sd, e, e_sd) = PHASES[phase_at(x, y, extent)];
            xs.push(x);
            ys.push(y);
            hs.push(rng.gauss(h, h_sd).max(0.05));
            es.push(rng.gauss(e, e_sd).max(1.0));
        }
    }
    (xs, ys, hs, es)
}

fn write_parquet(path: &Path, columns: &[(&str, &[f64])]) -> Result<()> {
    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(name, _)| Field::new(*name, DataType::Float64, false))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|(_, values)| Arc::new(Float64Array::from(values.to_vec())) as ArrayRef)
        .collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Gwyddion-style export of a residual indent imprint: a rounded pit with
/// its deepest point off centre, on a gently tilted surface.
fn write_afm(path: &Path, rng: &mut SimpleRng) -> Result<()> {
    const N: usize = 64;
    const SIZE_UM: f64 = 20.0;
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "# Channel: Height")?;
    writeln!(out, "# Width: {SIZE_UM:.3} µm")?;
    writeln!(out, "# Height: {SIZE_UM:.3} µm")?;
    writeln!(out, "# Value units: m")?;

    let (cx, cy) = (N as f64 * 0.55, N as f64 * 0.45);
    for r in 0..N {
        let line: Vec<String> = (0..N)
            .map(|c| {
                let d2 = (c as f64 - cx).powi(2) + (r as f64 - cy).powi(2);
                let pit = -150e-9 * (-d2 / 60.0).exp();
                let tilt = 2e-10 * (c as f64 + 0.5 * r as f64);
                format!("{:.6e}", pit + tilt + rng.gauss(0.0, 1e-9))
            })
            .collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;
    let mut rng = SimpleRng::new(args.seed);

    let (xs, ys, hs, es) = indentation_grid(&args, &mut rng);
    let float_column = |name: &str, values: &[f64]| Column {
        name: name.to_string(),
        values: values.iter().map(|&v| Value::Float(v)).collect(),
    };
    let table = Table::from_columns(vec![
        float_column("X", &xs),
        float_column("Y", &ys),
        float_column("H", &hs),
        float_column("E", &es),
    ])?;

    let csv_path = args.output_dir.join("indentation_grid.csv");
    write_csv(&table, &csv_path)?;
    let parquet_path = args.output_dir.join("indentation_grid.parquet");
    write_parquet(
        &parquet_path,
        &[("X", xs.as_slice()), ("Y", ys.as_slice()), ("H", hs.as_slice()), ("E", es.as_slice())],
    )?;
    log::info!(
        "Wrote {} indents to {} and {}",
        table.len(),
        csv_path.display(),
        parquet_path.display()
    );

    let afm_path = args.output_dir.join("afm_scan.txt");
    write_afm(&afm_path, &mut rng)?;
    log::info!("Wrote AFM scan to {}", afm_path.display());
    Ok(())
}
