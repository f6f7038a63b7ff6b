use thiserror::Error;

/// Why a set of (x, y, z) samples could not be pivoted into a grid.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("x, y and z lengths differ ({x}, {y}, {z})")]
    LengthMismatch { x: usize, y: usize, z: usize },

    #[error("non-finite coordinate at sample {index}")]
    NonFinite { index: usize },

    #[error("no samples to pivot")]
    Empty,

    #[error("duplicate sample at (x={x}, y={y})")]
    Duplicate { x: f64, y: f64 },

    #[error("grid is not rectangular: {missing} of {total} cells missing, first at (x={x}, y={y})")]
    Incomplete {
        missing: usize,
        total: usize,
        x: f64,
        y: f64,
    },
}

/// A dense, fully populated grid built by pivoting (x, y, z) samples.
///
/// Rows are ordered by descending y (top row is the largest y, as drawn on
/// screen); columns by ascending x.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelGrid<T> {
    /// Unique x values, ascending. One per column.
    pub xs: Vec<f64>,
    /// Unique y values, descending. One per row.
    pub ys: Vec<f64>,
    cells: Vec<T>,
}

impl<T: Clone> PixelGrid<T> {
    /// Pivot scattered samples into a grid.
    ///
    /// Every (x, y) pair must appear exactly once and every combination of
    /// unique x and unique y must be present; a gap is an error, never a
    /// default value.
    pub fn pivot(x: &[f64], y: &[f64], z: &[T]) -> Result<Self, GridError> {
        if x.len() != y.len() || x.len() != z.len() {
            return Err(GridError::LengthMismatch {
                x: x.len(),
                y: y.len(),
                z: z.len(),
            });
        }
        if x.is_empty() {
            return Err(GridError::Empty);
        }
        if let Some(index) = x
            .iter()
            .zip(y)
            .position(|(a, b)| !a.is_finite() || !b.is_finite())
        {
            return Err(GridError::NonFinite { index });
        }

        let xs = unique_sorted(x, false);
        let ys = unique_sorted(y, true);
        let cols = xs.len();

        let mut slots: Vec<Option<T>> = vec![None; xs.len() * ys.len()];
        for ((&xi, &yi), zi) in x.iter().zip(y).zip(z) {
            let c = locate(&xs, xi, false);
            let r = locate(&ys, yi, true);
            let slot = &mut slots[r * cols + c];
            if slot.is_some() {
                return Err(GridError::Duplicate { x: xi, y: yi });
            }
            *slot = Some(zi.clone());
        }

        let missing = slots.iter().filter(|s| s.is_none()).count();
        if missing > 0 {
            let first = slots.iter().position(Option::is_none).unwrap_or(0);
            return Err(GridError::Incomplete {
                missing,
                total: slots.len(),
                x: xs[first % cols],
                y: ys[first / cols],
            });
        }

        let cells = slots.into_iter().flatten().collect();
        Ok(PixelGrid { xs, ys, cells })
    }
}

impl<T> PixelGrid<T> {
    pub fn rows(&self) -> usize {
        self.ys.len()
    }

    pub fn cols(&self) -> usize {
        self.xs.len()
    }

    /// Cell at `row` (0 = largest y) and `col` (0 = smallest x).
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows() && col < self.cols() {
            self.cells.get(row * self.cols() + col)
        } else {
            None
        }
    }

    /// Iterate `(row, col, value)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> + '_ {
        let cols = self.cols();
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, v)| (i / cols, i % cols, v))
    }
}

// `+ 0.0` folds -0.0 into 0.0 so both land in the same column.
fn unique_sorted(values: &[f64], descending: bool) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().map(|v| v + 0.0).collect();
    out.sort_by(|a, b| {
        if descending {
            b.total_cmp(a)
        } else {
            a.total_cmp(b)
        }
    });
    out.dedup();
    out
}

fn locate(axis: &[f64], v: f64, descending: bool) -> usize {
    let v = v + 0.0;
    let found = axis.binary_search_by(|candidate| {
        let ord = candidate.total_cmp(&v);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
    // Every value came from the axis itself.
    match found {
        Ok(i) | Err(i) => i.min(axis.len().saturating_sub(1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pivots_complete_grid_with_y_descending() {
        let x = [0.0, 1.0, 0.0, 1.0];
        let y = [0.0, 0.0, 1.0, 1.0];
        let z = ["a", "b", "c", "d"];
        let g = PixelGrid::pivot(&x, &y, &z).unwrap();
        assert_eq!(g.xs, vec![0.0, 1.0]);
        assert_eq!(g.ys, vec![1.0, 0.0]);
        // Top row is y = 1.
        assert_eq!(g.get(0, 0), Some(&"c"));
        assert_eq!(g.get(0, 1), Some(&"d"));
        assert_eq!(g.get(1, 0), Some(&"a"));
        assert_eq!(g.get(1, 1), Some(&"b"));
        assert_eq!(g.get(2, 0), None);
        assert_eq!(g.iter().count(), 4);
    }

    #[test]
    fn missing_corner_is_reported_not_zeroed() {
        // z given for (0,0), (0,1), (1,0) but not (1,1).
        let x = [0.0, 0.0, 1.0];
        let y = [0.0, 1.0, 0.0];
        let z = [10, 11, 12];
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
    fn duplicate_pair_rejected() {
        let err = PixelGrid::pivot(&[0.0, 0.0], &[1.0, 1.0], &[1, 2]).unwrap_err();
        assert_eq!(err, GridError::Duplicate { x: 0.0, y: 1.0 });
    }

    #[test]
    fn non_finite_and_length_errors() {
        assert_eq!(
            PixelGrid::pivot(&[0.0, f64::NAN], &[0.0, 0.0], &[1, 2]).unwrap_err(),
            GridError::NonFinite { index: 1 }
        );
        assert!(matches!(
            PixelGrid::pivot(&[0.0], &[0.0, 1.0], &[1]).unwrap_err(),
            GridError::LengthMismatch { .. }
        ));
        assert_eq!(
            PixelGrid::<i32>::pivot(&[], &[], &[]).unwrap_err(),
            GridError::Empty
        );
    }

    #[test]
    fn unordered_input_still_pivots() {
        let x = [2.0, 0.0, 1.0, 2.0, 1.0, 0.0];
        let y = [5.0, 5.0, 5.0, 7.5, 7.5, 7.5];
        let z = [3, 1, 2, 6, 5, 4];
        let g = PixelGrid::pivot(&x, &y, &z).unwrap();
        let row0: Vec<i32> = (0..3).map(|c| *g.get(0, c).unwrap()).collect();
        let row1: Vec<i32> = (0..3).map(|c| *g.get(1, c).unwrap()).collect();
        assert_eq!(row0, vec![4, 5, 6]);
        assert_eq!(row1, vec![1, 2, 3]);
    }
}
