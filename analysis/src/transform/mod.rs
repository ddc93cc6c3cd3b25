//! Transformation module.
//!
//! Turns the wide source table into clustered long-format observations:
//! - Reshape: wide table to long observations, date window
//! - Index: growth relative to each location's baseline
//! - Matrix: location × date pivot and missing-value policy
//! - Join: cluster labels back onto observations
//! - Pipeline: the whole run, end to end

pub mod index;
pub mod join;
pub mod matrix;
pub mod pipeline;
pub mod reshape;

pub use index::{price_index, BASELINE_INDEX};
pub use join::{attach_labels, cluster_profiles, ClusterProfile, ClusteredObservation, JoinResult};
pub use matrix::{FeatureMatrix, MissingPolicy};
pub use pipeline::*;
pub use reshape::{filter_dates, parse_period, parse_price, wide_to_long, NotAPrice};
