use std::collections::BTreeSet;
use std::fmt;

use anyhow::{bail, Context, Result};

// ---------------------------------------------------------------------------
// Value – a single cell in a table column
// ---------------------------------------------------------------------------

/// A dynamically-typed table cell.
/// Unique label sets live in `BTreeSet`s downstream, so `Value` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Missing cell (empty, `nan`, `NA`).
    Null,
}

// -- Manual Eq/Ord so we can put Value in BTreeSet --

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => Ok(()),
        }
    }
}

impl Value {
    /// Interpret the value as an `f64`. `Null` and non-numeric cells yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) if !v.is_nan() => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Table – column-oriented dataset
// ---------------------------------------------------------------------------

/// A named column of cells.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

/// A column-oriented dataset: measured properties plus any derived columns.
///
/// All columns share the same length. Loaded data is never mutated; the only
/// way to change a table is appending (or explicitly replacing) a column.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Build a table from columns, checking that all lengths agree.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let len = first.values.len();
            for col in &columns {
                if col.values.len() != len {
                    bail!(
                        "Column '{}' has {} rows but '{}' has {len}",
                        col.name,
                        col.values.len(),
                        first.name
                    );
                }
            }
        }
        let mut seen = BTreeSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                bail!("Duplicate column name '{}'", col.name);
            }
        }
        Ok(Table { columns })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ordered column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .with_context(|| {
                format!(
                    "No column named '{name}' (available: {})",
                    self.column_names().join(", ")
                )
            })
    }

    /// A numeric column with one entry per row; missing or non-numeric cells are `NaN`.
    ///
    /// Fails if a cell holds text that is not a number, since that almost
    /// always means the wrong column was selected.
    pub fn numeric(&self, name: &str) -> Result<Vec<f64>> {
        let col = self.column(name)?;
        col.values
            .iter()
            .enumerate()
            .map(|(row, v)| match v {
                Value::Null => Ok(f64::NAN),
                Value::String(s) => bail!("Column '{name}', row {row}: '{s}' is not numeric"),
                Value::Bool(_) => bail!("Column '{name}', row {row}: boolean is not numeric"),
                other => Ok(other.as_f64().unwrap_or(f64::NAN)),
            })
            .collect()
    }

    /// The non-missing values of a numeric column, in row order (`dropna`).
    pub fn numeric_dropna(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self
            .numeric(name)?
            .into_iter()
            .filter(|v| v.is_finite())
            .collect())
    }

    /// Sorted set of unique values in a column.
    pub fn unique_values(&self, name: &str) -> Result<BTreeSet<Value>> {
        Ok(self.column(name)?.values.iter().cloned().collect())
    }

    /// Append a derived column (e.g. cluster labels).
    ///
    /// An existing column of the same name is only overwritten when `replace` is set.
    pub fn add_column(&mut self, name: &str, values: Vec<Value>, replace: bool) -> Result<()> {
        if !self.columns.is_empty() && values.len() != self.len() {
            bail!(
                "Column '{name}' has {} values but the table has {} rows",
                values.len(),
                self.len()
            );
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) if replace => existing.values = values,
            Some(_) => bail!("Column '{name}' already exists"),
            None => self.columns.push(Column {
                name: name.to_string(),
                values,
            }),
        }
        Ok(())
    }
}
