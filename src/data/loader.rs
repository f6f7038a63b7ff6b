use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Column, Table, Value};

/// Options shared by the text loaders.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Number of preamble lines to skip before the header row.
    pub skip_lines: usize,
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`          – comma-delimited, header row
/// * `.tsv`          – tab-delimited, header row
/// * `.txt` / `.dat` – whitespace-separated, header row
/// * `.json`         – `[{ "HARDNESS_GPa": 4.1, "X": 0.0, ... }, ...]`
/// * `.parquet`      – scalar columns
pub fn load_table(path: &Path, options: &LoadOptions) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_delimited(path, b',', options),
        "tsv" => load_delimited(path, b'\t', options),
        "txt" | "dat" => load_whitespace(path, options),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    log::debug!(
        "Loaded {} rows × {} columns from {}",
        table.len(),
        table.columns().len(),
        path.display()
    );
    Ok(table)
}

/// Write a table as comma-delimited text with a header row.
pub fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer
        .write_record(table.column_names())
        .context("writing CSV header")?;
    for row in 0..table.len() {
        let record: Vec<String> = table
            .columns()
            .iter()
            .map(|c| c.values[row].to_string())
            .collect();
        writer
            .write_record(&record)
            .with_context(|| format!("writing CSV row {row}"))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Delimited text loaders
// ---------------------------------------------------------------------------

/// Read the file, dropping the first `skip` lines.
fn read_after_preamble(path: &Path, skip: usize) -> Result<String> {
    let text = std::fs::read_to_string(path).context("reading text file")?;
    if skip == 0 {
        return Ok(text);
    }
    let mut lines = text.split_inclusive('\n');
    for i in 0..skip {
        if lines.next().is_none() {
            bail!("File has only {i} lines but {skip} preamble lines were requested");
        }
    }
    Ok(lines.collect())
}

fn load_delimited(path: &Path, delimiter: u8, options: &LoadOptions) -> Result<Table> {
    let body = read_after_preamble(path, options.skip_lines)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("reading header row")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("row {row_no}"))?;
        for (col_idx, cells) in columns.iter_mut().enumerate() {
            cells.push(guess_value_type(record.get(col_idx).unwrap_or("")));
        }
    }

    Table::from_columns(zip_columns(headers, columns))
}

fn load_whitespace(path: &Path, options: &LoadOptions) -> Result<Table> {
    let file = std::fs::File::open(path).context("opening text file")?;
    let mut lines = BufReader::new(file)
        .lines()
        .enumerate()
        .skip(options.skip_lines);

    let headers: Vec<String> = loop {
        match lines.next() {
            Some((_, line)) => {
                let line = line.context("reading header row")?;
                if !line.trim().is_empty() {
                    break line.split_whitespace().map(str::to_string).collect();
                }
            }
            None => bail!("No header row after {} preamble lines", options.skip_lines),
        }
    };

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for (line_no, line) in lines {
        let line = line.with_context(|| format!("reading line {}", line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != headers.len() {
            bail!(
                "Line {}: expected {} fields, found {}",
                line_no + 1,
                headers.len(),
                tokens.len()
            );
        }
        for (cells, tok) in columns.iter_mut().zip(tokens) {
            cells.push(guess_value_type(tok));
        }
    }

    Table::from_columns(zip_columns(headers, columns))
}

fn zip_columns(headers: Vec<String>, columns: Vec<Vec<Value>>) -> Vec<Column> {
    headers
        .into_iter()
        .zip(columns)
        .map(|(name, values)| Column { name, values })
        .collect()
}

/// Type a text cell: integer, then float, then bool, then string.
pub(crate) fn guess_value_type(s: &str) -> Value {
    let s = s.trim();
    if s.is_empty() || matches!(s, "nan" | "NaN" | "NAN" | "NA" | "N/A" | "null") {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::Float(f);
    }
    if s == "true" || s == "false" {
        return Value::Bool(s == "true");
    }
    Value::String(s.to_string())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "X": 0.0, "Y": 0.0, "HARDNESS_GPa": 4.1, "MODULUS_GPa": 180.2 },
///   ...
/// ]
/// ```
///
/// Column order follows first appearance; rows lacking a key get `Null`.
fn load_json(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut names: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !names.contains(key) {
                names.push(key.clone());
            }
        }
    }

    let columns = names
        .into_iter()
        .map(|name| {
            let values = records
                .iter()
                .map(|rec| rec.get(&name).map_or(Value::Null, json_to_value))
                .collect();
            Column { name, values }
        })
        .collect();

    Table::from_columns(columns)
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        other => Value::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of scalar columns (strings, ints, floats, bools).
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for (col_idx, cells) in columns.iter_mut().enumerate() {
            let col_array = batch.column(col_idx);
            for row in 0..batch.num_rows() {
                cells.push(extract_value(col_array, row));
            }
        }
    }

    Table::from_columns(zip_columns(names, columns))
}

/// Extract a single scalar from an Arrow column at a given row.
fn extract_value(col: &Arc<dyn Array>, row: usize) -> Value {
    if col.is_null(row) {
        return Value::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map_or(Value::Null, |s| Value::String(s.value(row).to_string())),
        DataType::LargeUtf8 => Value::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map_or(Value::Null, |a| Value::Integer(a.value(row) as i64)),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map_or(Value::Null, |a| Value::Integer(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map_or(Value::Null, |a| float_value(a.value(row) as f64)),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map_or(Value::Null, |a| float_value(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map_or(Value::Null, |a| Value::Bool(a.value(row))),
        other => Value::String(format!("{other:?}")),
    }
}

/// Pandas stores missing floats as NaN rather than null.
fn float_value(v: f64) -> Value {
    if v.is_nan() {
        Value::Null
    } else {
        Value::Float(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn csv_with_preamble_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "grid.csv",
            "instrument: G200\ndate: 2024-01-01\nX,Y,HARDNESS_GPa\n0,0,4.5\n0,1,\n1,0,nan\n",
        );
        let table = load_table(&path, &LoadOptions { skip_lines: 2 }).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.column_names(), vec!["X", "Y", "HARDNESS_GPa"]);
        assert_eq!(table.numeric_dropna("HARDNESS_GPa").unwrap(), vec![4.5]);
    }

    #[test]
    fn preamble_longer_than_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "short.csv", "a,b\n");
        assert!(load_table(&path, &LoadOptions { skip_lines: 5 }).is_err());
    }

    #[test]
    fn whitespace_text_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "map.txt", "X   Y  Z\n0.0 0.0 1.5\n\n1.0 0.0   2.5\n");
        let table = load_table(&path, &LoadOptions::default()).unwrap();
        assert_eq!(table.numeric("Z").unwrap(), vec![1.5, 2.5]);
    }

    #[test]
    fn whitespace_ragged_row_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "bad.dat", "X Y Z\n0 0 1\n0 1\n");
        let err = format!("{:#}", load_table(&path, &LoadOptions::default()).unwrap_err());
        assert!(err.contains("Line 3"), "{err}");
    }

    #[test]
    fn json_records_fill_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "data.json",
            r#"[{"H": 4.0, "phase": "a"}, {"H": 5, "E": 200.5}]"#,
        );
        let table = load_table(&path, &LoadOptions::default()).unwrap();
        assert_eq!(table.column_names(), vec!["H", "phase", "E"]);
        assert_eq!(table.numeric("H").unwrap(), vec![4.0, 5.0]);
        assert!(table.numeric("E").unwrap()[0].is_nan());
    }

    #[test]
    fn unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "data.xlsx", "");
        assert!(load_table(&path, &LoadOptions::default()).is_err());
    }

    #[test]
    fn csv_roundtrip_keeps_labels() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_file(&dir, "in.csv", "H,E\n4.0,180\n5.5,\n");
        let mut table = load_table(&src, &LoadOptions::default()).unwrap();
        table
            .add_column("Cluster", vec![Value::Integer(1), Value::Integer(0)], false)
            .unwrap();
        let out = dir.path().join("out.csv");
        write_csv(&table, &out).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(text, "H,E,Cluster\n4,180,1\n5.5,,0\n");
    }

    #[test]
    fn parquet_scalar_columns() {
        use arrow::array::ArrayRef;
        use arrow::datatypes::{Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.parquet");
        let schema = Arc::new(Schema::new(vec![
            Field::new("H", DataType::Float64, true),
            Field::new("phase", DataType::Utf8, true),
            Field::new("Cluster", DataType::Int64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Float64Array::from(vec![4.0, f64::NAN])) as ArrayRef,
                Arc::new(StringArray::from(vec![Some("ferrite"), None])) as ArrayRef,
                Arc::new(Int64Array::from(vec![Some(1), None])) as ArrayRef,
            ],
        )
        .unwrap();
        let mut writer = ArrowWriter::try_new(std::fs::File::create(&path).unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_table(&path, &LoadOptions::default()).unwrap();
        assert_eq!(table.column_names(), vec!["H", "phase", "Cluster"]);
        assert_eq!(table.numeric_dropna("H").unwrap(), vec![4.0]);
        assert_eq!(
            table.column("phase").unwrap().values,
            vec![Value::String("ferrite".into()), Value::Null]
        );
        assert_eq!(
            table.column("Cluster").unwrap().values,
            vec![Value::Integer(1), Value::Null]
        );
    }

    #[test]
    fn guess_types() {
        assert_eq!(guess_value_type("3"), Value::Integer(3));
        assert_eq!(guess_value_type("3.5"), Value::Float(3.5));
        assert_eq!(guess_value_type("true"), Value::Bool(true));
        assert_eq!(guess_value_type(" NA "), Value::Null);
        assert_eq!(guess_value_type("ferrite"), Value::String("ferrite".into()));
    }
}
