//! Euclidean distance in latent space.

/// Squared Euclidean distance. Callers guarantee equal lengths.
pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "dimension mismatch");
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

/// Full symmetric distance matrix over `points`, row-major.
pub fn distance_matrix(points: &[&[f64]]) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut m = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = euclidean(points[i], points[j]);
            m[i][j] = d;
            m[j][i] = d;
        }
    }
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_four_five() {
        assert_eq!(euclidean(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(squared_euclidean(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
    }

    #[test]
    fn matrix_is_symmetric_with_zero_diagonal() {
        let a = [0.0, 0.0];
        let b = [1.0, 0.0];
        let c = [0.0, 2.0];
        let m = distance_matrix(&[&a, &b, &c]);
        for (i, row) in m.iter().enumerate() {
            assert_eq!(row[i], 0.0);
            for (j, &v) in row.iter().enumerate() {
                assert_eq!(v, m[j][i]);
            }
        }
        assert!((m[1][2] - 5.0_f64.sqrt()).abs() < 1e-12);
    }
}
