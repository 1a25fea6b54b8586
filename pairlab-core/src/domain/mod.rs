//! Domain types for PairLab

pub mod bar;
pub mod ids;
pub mod latent;
pub mod pair;
pub mod series;

pub use bar::Bar;
pub use ids::{ClusterId, InstrumentId};
pub use latent::{LatentError, LatentSet, LatentVector, LatentWindow};
pub use pair::Pair;
pub use series::{SeriesError, TimeSeries};
