//! AFM height scans exported as plain text.
//!
//! The expected layout is a Gwyddion-style ASCII export: a fixed number of
//! `#`-prefixed header lines followed by a whitespace-separated matrix of
//! heights, one scan line per text line.
//!
//! ```text
//! # Channel: Height
//! # Width: 20.000 µm
//! # Height: 20.000 µm
//! # Value units: m
//! 1.2e-09 1.3e-09 ...
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Header lines in a standard Gwyddion export.
pub const DEFAULT_HEADER_LINES: usize = 4;

/// Read the first `num_lines` lines of a file, trimmed.
pub fn read_header(path: &Path, num_lines: usize) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    BufReader::new(file)
        .lines()
        .take(num_lines)
        .map(|l| l.map(|s| s.trim().to_string()).context("reading header"))
        .collect()
}

/// Physical extents declared in the header, when present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AfmHeader {
    pub lines: Vec<String>,
    /// Scan width in `lateral_unit`.
    pub width: Option<f64>,
    /// Scan height in `lateral_unit`.
    pub height: Option<f64>,
    pub lateral_unit: Option<String>,
    pub value_unit: Option<String>,
}

impl AfmHeader {
    /// Pick out `Width`, `Height` and `Value units` from `# Key: value unit` lines.
    /// Unrecognised lines are kept but otherwise ignored.
    pub fn parse(lines: Vec<String>) -> Self {
        let mut header = AfmHeader::default();
        for line in &lines {
            let Some((key, rest)) = line.trim_start_matches('#').split_once(':') else {
                continue;
            };
            let mut parts = rest.split_whitespace();
            match key.trim().to_ascii_lowercase().as_str() {
                "width" => {
                    header.width = parts.next().and_then(|v| v.parse().ok());
                    header.lateral_unit = parts.next().map(str::to_string);
                }
                "height" => {
                    header.height = parts.next().and_then(|v| v.parse().ok());
                    if header.lateral_unit.is_none() {
                        header.lateral_unit = parts.next().map(str::to_string);
                    }
                }
                "value units" => header.value_unit = parts.next().map(str::to_string),
                _ => {}
            }
        }
        header.lines = lines;
        header
    }
}

/// A rectangular AFM height matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct AfmScan {
    pub header: AfmHeader,
    rows: usize,
    cols: usize,
    /// Row-major heights; row 0 is the first scan line in the file.
    heights: Vec<f64>,
    /// Lateral pixel pitch along x.
    pub x_step: f64,
    /// Lateral pixel pitch along y.
    pub y_step: f64,
}

/// Load an AFM scan, skipping `header_lines` lines before the numeric body.
///
/// Parse failures are logged before being returned, so a batch run leaves a
/// trace of which file and line broke.
pub fn load_afm(path: &Path, header_lines: usize) -> Result<AfmScan> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut lines = BufReader::new(file).lines().enumerate();

    let mut header_text = Vec::with_capacity(header_lines);
    for _ in 0..header_lines {
        match lines.next() {
            Some((_, line)) => header_text.push(line.context("reading header")?.trim().to_string()),
            None => bail!(
                "{}: file ended inside the {header_lines}-line header",
                path.display()
            ),
        }
    }

    let mut heights = Vec::new();
    let mut cols = 0usize;
    let mut rows = 0usize;
    for (line_no, line) in lines {
        let line = line.with_context(|| format!("reading line {}", line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: Result<Vec<f64>> = line
            .split_whitespace()
            .enumerate()
            .map(|(col, tok)| {
                tok.parse::<f64>().with_context(|| {
                    format!("line {}, column {}: '{tok}' is not a number", line_no + 1, col + 1)
                })
            })
            .collect();
        let values = match parsed {
            Ok(v) => v,
            Err(e) => {
                log::error!("Error loading data from {}: {e:#}", path.display());
                return Err(e.context(format!(
                    "parsing {} (is the header really {header_lines} lines?)",
                    path.display()
                )));
            }
        };
        if rows == 0 {
            cols = values.len();
        } else if values.len() != cols {
            bail!(
                "{}: line {} has {} values, expected {cols}",
                path.display(),
                line_no + 1,
                values.len()
            );
        }
        heights.extend(values);
        rows += 1;
    }

    if rows == 0 {
        bail!("{}: no data after the header", path.display());
    }

    let header = AfmHeader::parse(header_text);
    let x_step = header.width.map_or(1.0, |w| w / cols as f64);
    let y_step = header.height.map_or(1.0, |h| h / rows as f64);
    log::debug!(
        "Loaded AFM scan {} ({rows} × {cols}, step {x_step} × {y_step})",
        path.display()
    );

    Ok(AfmScan {
        header,
        rows,
        cols,
        heights,
        x_step,
        y_step,
    })
}

/// Axis coordinates after re-origining on the minimum height.
#[derive(Debug, Clone, PartialEq)]
pub struct CenteredGrid {
    /// One x coordinate per column.
    pub x: Vec<f64>,
    /// One y coordinate per row.
    pub y: Vec<f64>,
    /// `(row, col)` of the minimum height.
    pub min_index: (usize, usize),
}

impl CenteredGrid {
    /// Coordinate of cell `(row, col)`.
    pub fn coordinate(&self, row: usize, col: usize) -> (f64, f64) {
        (self.x[col], self.y[row])
    }

    /// `(x_min, x_max, y_min, y_max)` of the centered coordinates.
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        let (x0, x1) = min_max(&self.x);
        let (y0, y1) = min_max(&self.y);
        (x0, x1, y0, y1)
    }
}

fn min_max(v: &[f64]) -> (f64, f64) {
    v.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        })
}

impl AfmScan {
    /// Build a scan directly from a row-major matrix.
    pub fn from_rows(rows: Vec<Vec<f64>>, x_step: f64, y_step: f64) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if cols == 0 {
            bail!("AFM scan must have at least one row and one column");
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != cols) {
            bail!("row {bad} has {} values, expected {cols}", rows[bad].len());
        }
        Ok(AfmScan {
            header: AfmHeader::default(),
            rows: rows.len(),
            cols,
            heights: rows.into_iter().flatten().collect(),
            x_step,
            y_step,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.rows && col < self.cols).then(|| self.heights[row * self.cols + col])
    }

    /// Uncentered grid: x = col · x_step, y = row · y_step.
    pub fn grid(&self) -> CenteredGrid {
        CenteredGrid {
            x: (0..self.cols).map(|c| c as f64 * self.x_step).collect(),
            y: (0..self.rows).map(|r| r as f64 * self.y_step).collect(),
            min_index: (0, 0),
        }
    }

    /// Finite `(min, max)` of the heights, ignoring NaN.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let (lo, hi) = min_max(
            &self
                .heights
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .collect::<Vec<_>>(),
        );
        (lo <= hi).then_some((lo, hi))
    }

    /// Index of the smallest height, ignoring NaN.
    pub fn argmin(&self) -> Option<(usize, usize)> {
        self.heights
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nan())
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| (i / self.cols, i % self.cols))
    }

    /// Shift the coordinate grid so that the minimum height sits at (0, 0).
    pub fn center_on_minimum(&self) -> Result<CenteredGrid> {
        let (r, c) = self
            .argmin()
            .context("cannot center an AFM scan that is entirely NaN")?;
        let grid = self.grid();
        let (min_x, min_y) = grid.coordinate(r, c);
        Ok(CenteredGrid {
            x: grid.x.iter().map(|x| x - min_x).collect(),
            y: grid.y.iter().map(|y| y - min_y).collect(),
            min_index: (r, c),
        })
    }

    /// Copy out the sub-rectangle `rows × cols`.
    pub fn crop(&self, rows: Range<usize>, cols: Range<usize>) -> Result<AfmScan> {
        if rows.is_empty() || cols.is_empty() || rows.end > self.rows || cols.end > self.cols {
            bail!(
                "crop {rows:?} × {cols:?} is outside the {} × {} scan",
                self.rows,
                self.cols
            );
        }
        let heights = rows
            .clone()
            .flat_map(|r| {
                let start = r * self.cols;
                self.heights[start + cols.start..start + cols.end].iter().copied()
            })
            .collect();
        Ok(AfmScan {
            header: self.header.clone(),
            rows: rows.len(),
            cols: cols.len(),
            heights,
            x_step: self.x_step,
            y_step: self.y_step,
        })
    }
}
