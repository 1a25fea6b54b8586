//! Pair selector: ranks intra-cluster pairs by latent distance.
//!
//! Per cluster: full pairwise Euclidean distance matrix, ascending sort with
//! lexicographic `(instrument_a, instrument_b)` tie-break, first `top_n` kept.
//! Output is grouped by cluster id ascending, then rank.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::cluster::Assignment;
use crate::distance::distance_matrix;
use crate::domain::{ClusterId, InstrumentId, LatentSet, Pair};

#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error(
        "empty cluster: cluster {cluster} references {instrument}, which has no latent vector"
    )]
    EmptyCluster {
        cluster: ClusterId,
        instrument: InstrumentId,
    },
}

/// Select up to `top_n` closest pairs per cluster.
pub fn select_pairs(
    vectors: &LatentSet,
    assignment: &Assignment,
    top_n: usize,
) -> Result<Vec<Pair>, SelectionError> {
    let mut members: BTreeMap<ClusterId, Vec<&InstrumentId>> = BTreeMap::new();
    for (id, &cluster) in assignment {
        if !vectors.contains(id) {
            return Err(SelectionError::EmptyCluster {
                cluster,
                instrument: id.clone(),
            });
        }
        members.entry(cluster).or_default().push(id);
    }

    let mut selected = Vec::new();
    for (cluster, ids) in &members {
        let ranked = rank_cluster(vectors, *cluster, ids);
        log::debug!(
            "cluster {cluster}: {} members, {} candidate pairs, keeping {}",
            ids.len(),
            ranked.len(),
            ranked.len().min(top_n)
        );
        selected.extend(ranked.into_iter().take(top_n));
    }

    log::info!(
        "selected {} pairs from {} clusters (top_n={top_n})",
        selected.len(),
        members.len()
    );
    Ok(selected)
}

/// All pairs of one cluster, ranked. `ids` must be in instrument order.
fn rank_cluster(vectors: &LatentSet, cluster: ClusterId, ids: &[&InstrumentId]) -> Vec<Pair> {
    if ids.len() < 2 {
        return Vec::new();
    }

    let points: Vec<&[f64]> = ids
        .iter()
        .filter_map(|id| vectors.get(id))
        .map(|v| v.values.as_slice())
        .collect();
    let matrix = distance_matrix(&points);

    let mut pairs: Vec<Pair> = Vec::with_capacity(ids.len() * (ids.len() - 1) / 2);
    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            if let Some(p) = Pair::new(ids[i].clone(), ids[j].clone(), cluster, matrix[i][j]) {
                pairs.push(p);
            }
        }
    }

    pairs.sort_by(|x, y| {
        x.distance
            .total_cmp(&y.distance)
            .then_with(|| x.instrument_a.cmp(&y.instrument_a))
            .then_with(|| x.instrument_b.cmp(&y.instrument_b))
    });
    pairs
}
