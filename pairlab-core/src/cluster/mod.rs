//! Distance & clustering engine: partitions latent vectors into K groups.
//!
//! Deterministic k-means: k-means++ seeding from the RNG hierarchy, a fixed
//! iteration cap and tolerance, and lowest-index tie-breaks throughout. The
//! same vectors, `k`, and seed always produce the same assignment.

mod kmeans;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::{ClusterId, InstrumentId, LatentSet};
use crate::rng::RngHierarchy;

/// Mapping from instrument to its cluster.
pub type Assignment = BTreeMap<InstrumentId, ClusterId>;

#[derive(Debug, Error, PartialEq)]
pub enum ClusterError {
    #[error("insufficient data: {instruments} instruments for {k} clusters")]
    InsufficientData { instruments: usize, k: usize },

    #[error("k must be at least 1")]
    ZeroClusters,
}

/// One cluster from a clustering pass. Regenerated on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    /// Members in instrument order.
    pub members: Vec<InstrumentId>,
    pub centroid: Vec<f64>,
}

/// Full result of a clustering pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clustering {
    pub k: usize,
    pub seed: u64,
    /// Non-empty clusters, ordered by id.
    pub clusters: Vec<Cluster>,
    pub assignment: Assignment,
    /// Sum of squared distances to assigned centroids.
    pub inertia: f64,
    pub iterations: usize,
    /// Index of the restart that produced this result.
    pub restart: usize,
}

impl Clustering {
    pub fn cluster_of(&self, id: &InstrumentId) -> Option<ClusterId> {
        self.assignment.get(id).copied()
    }
}

/// k-means parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeans {
    pub k: usize,
    pub seed: u64,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub restarts: usize,
}

impl KMeans {
    pub fn new(k: usize, seed: u64) -> Self {
        Self {
            k,
            seed,
            max_iterations: 300,
            tolerance: 1e-4,
            restarts: 10,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_restarts(mut self, restarts: usize) -> Self {
        self.restarts = restarts;
        self
    }

    /// Fit the model. Input vectors are only read.
    pub fn fit(&self, vectors: &LatentSet) -> Result<Clustering, ClusterError> {
        if self.k == 0 {
            return Err(ClusterError::ZeroClusters);
        }
        if vectors.len() < self.k {
            return Err(ClusterError::InsufficientData {
                instruments: vectors.len(),
                k: self.k,
            });
        }

        let ids: Vec<&InstrumentId> = vectors.ids().collect();
        let points: Vec<&[f64]> = vectors.iter().map(|v| v.values.as_slice()).collect();
        let hierarchy = RngHierarchy::new(self.seed);

        let run_once = |restart: usize| {
            let mut rng = hierarchy.rng_for("kmeans", restart as u64);
            let init = kmeans::init_plus_plus(&points, self.k, &mut rng);
            let run = kmeans::lloyd(&points, init, self.max_iterations, self.tolerance);
            log::debug!(
                "k-means restart {restart}: inertia={:.6} iterations={}",
                run.inertia,
                run.iterations
            );
            run
        };

        // Strict `<` keeps the earliest restart on equal inertia.
        let (mut restart, mut run) = (0, run_once(0));
        for r in 1..self.restarts.max(1) {
            let candidate = run_once(r);
            if candidate.inertia < run.inertia {
                restart = r;
                run = candidate;
            }
        }

        let clustering = canonicalize(self, &ids, run, restart);
        log::info!(
            "clustered {} instruments into {} clusters (k={}, inertia={:.6}, restart {})",
            ids.len(),
            clustering.clusters.len(),
            self.k,
            clustering.inertia,
            restart
        );
        Ok(clustering)
    }
}

/// Renumber clusters by their smallest member so ids do not depend on
/// centroid initialization order.
fn canonicalize(
    params: &KMeans,
    ids: &[&InstrumentId],
    run: kmeans::KMeansRun,
    restart: usize,
) -> Clustering {
    let mut remap: BTreeMap<usize, ClusterId> = BTreeMap::new();
    for &label in &run.labels {
        let next = ClusterId(remap.len());
        remap.entry(label).or_insert(next);
    }

    let mut clusters: Vec<Cluster> = remap
        .iter()
        .map(|(&label, &id)| Cluster {
            id,
            members: Vec::new(),
            centroid: run.centroids[label].clone(),
        })
        .collect();
    clusters.sort_by_key(|c| c.id);

    let mut assignment = Assignment::new();
    for (&id, label) in ids.iter().zip(&run.labels) {
        let cid = remap[label];
        clusters[cid.0].members.push(id.clone());
        assignment.insert(id.clone(), cid);
    }

    Clustering {
        k: params.k,
        seed: params.seed,
        clusters,
        assignment,
        inertia: run.inertia,
        iterations: run.iterations,
        restart,
    }
}

/// Cluster `vectors` into `k` groups with default iteration settings.
pub fn cluster(vectors: &LatentSet, k: usize, seed: u64) -> Result<Assignment, ClusterError> {
    KMeans::new(k, seed).fit(vectors).map(|c| c.assignment)
}
