//! Data alignment for pair simulation

pub mod align;

pub use align::{align_pair, AlignedPair, AlignedRow, AlignmentError};
