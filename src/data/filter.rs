// ---------------------------------------------------------------------------
// Finite-value masks
// ---------------------------------------------------------------------------

/// Scattered (x, y, z) samples that survived the finite mask.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triples {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl Triples {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Keep only the indices where x, y and z are all finite.
///
/// Inputs of different lengths are truncated to the shortest.
pub fn finite_triples(x: &[f64], y: &[f64], z: &[f64]) -> Triples {
    let mut out = Triples::default();
    for ((&xi, &yi), &zi) in x.iter().zip(y).zip(z) {
        if xi.is_finite() && yi.is_finite() && zi.is_finite() {
            out.x.push(xi);
            out.y.push(yi);
            out.z.push(zi);
        }
    }
    out
}

/// Row indices at which every given column is finite.
///
/// Used to build feature matrices for clustering while remembering which
/// table rows the features came from.
pub fn complete_rows(columns: &[Vec<f64>]) -> Vec<usize> {
    let n = columns.iter().map(Vec::len).min().unwrap_or(0);
    (0..n)
        .filter(|&row| columns.iter().all(|c| c[row].is_finite()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_any_non_finite_component() {
        let x = [0.0, 1.0, f64::NAN, 3.0];
        let y = [0.0, f64::INFINITY, 2.0, 3.0];
        let z = [5.0, 6.0, 7.0, f64::NAN];
        let t = finite_triples(&x, &y, &z);
        assert_eq!(t.x, vec![0.0]);
        assert_eq!(t.z, vec![5.0]);
    }

    #[test]
    fn complete_rows_requires_all_columns() {
        let cols = vec![vec![1.0, f64::NAN, 3.0], vec![1.0, 2.0, f64::NAN]];
        assert_eq!(complete_rows(&cols), vec![0]);
        assert!(complete_rows(&[]).is_empty());
    }
}
