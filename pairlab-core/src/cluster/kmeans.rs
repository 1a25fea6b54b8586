//! Lloyd's k-means with k-means++ seeding.
//!
//! Points arrive in instrument order; every tie-break below resolves to the
//! lowest index, which is the lowest instrument id.

use rand::rngs::StdRng;
use rand::Rng;

use crate::distance::squared_euclidean;

/// Outcome of a single seeded k-means run.
#[derive(Debug, Clone)]
pub(crate) struct KMeansRun {
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
    pub iterations: usize,
}

/// k-means++ initialization. Requires `points.len() >= k >= 1`.
pub(crate) fn init_plus_plus(points: &[&[f64]], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut chosen: Vec<usize> = Vec::with_capacity(k);
    chosen.push(rng.gen_range(0..n));

    let mut min_sq: Vec<f64> = points
        .iter()
        .map(|p| squared_euclidean(p, points[chosen[0]]))
        .collect();

    while chosen.len() < k {
        let total: f64 = min_sq.iter().sum();
        let next = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut pick = None;
            let mut last_positive = None;
            for (i, &d) in min_sq.iter().enumerate() {
                if d <= 0.0 {
                    continue;
                }
                last_positive = Some(i);
                cumulative += d;
                if cumulative > target {
                    pick = Some(i);
                    break;
                }
            }
            // Rounding can leave `target` at the very end of the mass.
            pick.or(last_positive)
        } else {
            None
        };

        // All remaining points coincide with a center: take the lowest unused index.
        let next = match next {
            Some(i) => i,
            None => (0..n).find(|i| !chosen.contains(i)).unwrap_or(0),
        };

        chosen.push(next);
        for (i, p) in points.iter().enumerate() {
            let d = squared_euclidean(p, points[next]);
            if d < min_sq[i] {
                min_sq[i] = d;
            }
        }
    }

    chosen.into_iter().map(|i| points[i].to_vec()).collect()
}

/// Index of the nearest centroid; equal distances go to the lowest index.
pub(crate) fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (j, c) in centroids.iter().enumerate() {
        let d = squared_euclidean(point, c);
        if d < best_d {
            best_d = d;
            best = j;
        }
    }
    (best, best_d)
}

fn assign(points: &[&[f64]], centroids: &[Vec<f64>]) -> (Vec<usize>, Vec<f64>) {
    points.iter().map(|p| nearest(p, centroids)).unzip()
}

/// Run Lloyd iterations from the given initial centroids.
pub(crate) fn lloyd(
    points: &[&[f64]],
    mut centroids: Vec<Vec<f64>>,
    max_iterations: usize,
    tolerance: f64,
) -> KMeansRun {
    let k = centroids.len();
    let dim = centroids.first().map_or(0, Vec::len);
    let mut iterations = 0;

    for _ in 0..max_iterations.max(1) {
        iterations += 1;
        let (mut labels, dists) = assign(points, &centroids);

        // Empty clusters take the point farthest from its centroid.
        let mut counts = vec![0usize; k];
        for &l in &labels {
            counts[l] += 1;
        }
        let mut reseeded: Vec<usize> = Vec::new();
        for j in 0..k {
            if counts[j] > 0 {
                continue;
            }
            let mut far: Option<(usize, f64)> = None;
            for (i, &d) in dists.iter().enumerate() {
                if reseeded.contains(&i) || counts[labels[i]] <= 1 {
                    continue;
                }
                if far.map_or(true, |(_, fd)| d > fd) {
                    far = Some((i, d));
                }
            }
            if let Some((i, _)) = far {
                counts[labels[i]] -= 1;
                labels[i] = j;
                counts[j] = 1;
                reseeded.push(i);
            }
        }

        let mut sums = vec![vec![0.0; dim]; k];
        for (p, &l) in points.iter().zip(&labels) {
            for (s, x) in sums[l].iter_mut().zip(p.iter()) {
                *s += x;
            }
        }
        let new_centroids: Vec<Vec<f64>> = sums
            .into_iter()
            .zip(&counts)
            .zip(&centroids)
            .map(|((sum, &count), old)| {
                if count == 0 {
                    old.clone()
                } else {
                    sum.into_iter().map(|s| s / count as f64).collect()
                }
            })
            .collect();

        let shift: f64 = centroids
            .iter()
            .zip(&new_centroids)
            .map(|(a, b)| squared_euclidean(a, b))
            .sum();
        centroids = new_centroids;

        if shift <= tolerance {
            break;
        }
    }

    let (labels, dists) = assign(points, &centroids);
    KMeansRun {
        labels,
        centroids,
        inertia: dists.iter().sum(),
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn pts(raw: &[[f64; 2]]) -> Vec<Vec<f64>> {
        raw.iter().map(|p| p.to_vec()).collect()
    }

    #[test]
    fn nearest_ties_go_to_lowest_index() {
        let centroids = vec![vec![-1.0, 0.0], vec![1.0, 0.0]];
        assert_eq!(nearest(&[0.0, 0.0], &centroids).0, 0);
    }

    #[test]
    fn plus_plus_picks_distinct_points() {
        let owned = pts(&[[0.0, 0.0], [0.0, 0.0], [10.0, 10.0]]);
        let points: Vec<&[f64]> = owned.iter().map(Vec::as_slice).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let centers = init_plus_plus(&points, 2, &mut rng);
        assert_ne!(centers[0], centers[1]);
    }

    #[test]
    fn plus_plus_handles_all_identical_points() {
        let owned = pts(&[[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]]);
        let points: Vec<&[f64]> = owned.iter().map(Vec::as_slice).collect();
        let mut rng = StdRng::seed_from_u64(9);
        let centers = init_plus_plus(&points, 3, &mut rng);
        assert_eq!(centers.len(), 3);
    }

    #[test]
    fn lloyd_separates_two_blobs() {
        let owned = pts(&[[0.0, 0.0], [0.1, 0.0], [10.0, 10.0], [10.1, 10.0]]);
        let points: Vec<&[f64]> = owned.iter().map(Vec::as_slice).collect();
        let run = lloyd(&points, vec![vec![0.0, 0.0], vec![0.1, 0.0]], 100, 1e-9);
        assert_eq!(run.labels[0], run.labels[1]);
        assert_eq!(run.labels[2], run.labels[3]);
        assert_ne!(run.labels[0], run.labels[2]);
        assert!(run.inertia < 0.1);
    }

    #[test]
    fn lloyd_refills_empty_cluster() {
        // Both initial centroids sit on the left blob; the duplicate starts empty.
        let owned = pts(&[[0.0, 0.0], [0.0, 1.0], [50.0, 50.0]]);
        let points: Vec<&[f64]> = owned.iter().map(Vec::as_slice).collect();
        let run = lloyd(&points, vec![vec![0.0, 0.5], vec![0.0, 0.5]], 50, 1e-12);
        let mut distinct = run.labels.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), 2);
    }
}
