//! PairLab Core: latent clustering, pair selection, and the pair simulation engine.
//!
//! This crate contains the deterministic heart of the pipeline:
//! - Domain types (instrument ids, bars, time series, latent vectors, pairs)
//! - Euclidean distance and seeded k-means clustering
//! - Intra-cluster pair selection with deterministic tie-breaks
//! - Two-leg time alignment with carry-forward
//! - Day-by-day simulation engine with an append-only ledger
//! - Policy trait and built-in reference policies

pub mod cluster;
pub mod data;
pub mod distance;
pub mod domain;
pub mod engine;
pub mod policies;
pub mod rng;
pub mod selection;

pub use cluster::{cluster, Assignment, Cluster, ClusterError, Clustering, KMeans};
pub use engine::{simulate, Ledger, Policy, SimulationConfig, SimulationError};
pub use selection::{select_pairs, SelectionError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types crossing worker threads are Send + Sync.
    ///
    /// Pairs are simulated on a rayon pool; if any of these fails the build
    /// breaks immediately.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::TimeSeries>();
        require_sync::<domain::TimeSeries>();
        require_send::<domain::LatentSet>();
        require_sync::<domain::LatentSet>();
        require_send::<domain::Pair>();
        require_sync::<domain::Pair>();

        // Clustering
        require_send::<cluster::Clustering>();
        require_sync::<cluster::Clustering>();
        require_send::<rng::RngHierarchy>();
        require_sync::<rng::RngHierarchy>();

        // Engine types
        require_send::<engine::SimulationConfig>();
        require_sync::<engine::SimulationConfig>();
        require_send::<engine::Ledger>();
        require_sync::<engine::Ledger>();
        require_send::<engine::SimulationError>();

        // Policies
        require_send::<policies::NeutralPolicy>();
        require_sync::<policies::NeutralPolicy>();
        require_send::<policies::FixedWeights>();
        require_sync::<policies::FixedWeights>();
        require_send::<policies::SpreadReversion>();
        require_sync::<policies::SpreadReversion>();
        require_send::<Box<dyn engine::Policy>>();
        require_sync::<Box<dyn engine::Policy>>();
    }

    /// Architecture contract: a policy only sees what the engine hands it.
    ///
    /// `decide()` takes an `Observation` and nothing else. The observation
    /// borrows rows up to the current day, so a policy has no path to the
    /// full series or to the ledger.
    #[test]
    fn policy_trait_sees_observation_only() {
        fn _check_trait_object_builds(
            policy: &dyn engine::Policy,
            observation: &engine::Observation<'_>,
        ) -> Result<engine::Action, engine::PolicyError> {
            policy.decide(observation)
        }
    }
}
