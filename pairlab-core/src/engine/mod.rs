//! Simulation engine: day-by-day replay of one pair against a policy.
//!
//! The engine consumes the two legs' time series, aligns them onto a common
//! timeline, then walks it one day at a time:
//!
//! 1. Build the observation from rows dated on or before today
//! 2. Query the policy (cadence days only)
//! 3. Execute the target at today's close
//! 4. Append the marked ledger entry

pub mod config;
pub mod cost_model;
pub mod frequency;
pub mod ledger;
pub mod loop_runner;
pub mod policy;

pub use config::SimulationConfig;
pub use cost_model::CostModel;
pub use frequency::{FrequencyError, TradeFrequency};
pub use ledger::{Ledger, LedgerEntry, LedgerError, LedgerStatus, Leg, LegFill, PolicyFailure};
pub use loop_runner::{simulate, SimulationError};
pub use policy::{Action, FnPolicy, Observation, Policy, PolicyError, PositionSnapshot};
