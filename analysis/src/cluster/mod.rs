//! Clustering of the location × date matrix.
//!
//! - [`kmeans`]: `linfa-clustering` k-means and the elbow curve
//! - [`hierarchical`]: `kodama` linkage and dendrogram cut
//!
//! Both return labels 1..=k in matrix row order; [`assign`] turns them into
//! a [`ClusterAssignment`] keyed by local-authority code.

pub mod hierarchical;
pub mod kmeans;

pub use hierarchical::{condensed_distances, cut_tree, dendrogram, hierarchical, HierarchicalOutcome};
pub use kmeans::{elbow, kmeans, ElbowPoint, KMeansOutcome};

use crate::error::ClusterResult;
use crate::models::{Algorithm, ClusterAssignment, Linkage};
use crate::transform::matrix::FeatureMatrix;

/// Run k-means on a feature matrix and key the labels by code.
pub fn assign_kmeans(matrix: &FeatureMatrix, k: usize, seed: u64) -> ClusterResult<(ClusterAssignment, KMeansOutcome)> {
    let outcome = kmeans(&matrix.values, k, seed)?;
    Ok((assign(matrix, Algorithm::KMeans, k, &outcome.labels), outcome))
}

/// Run hierarchical clustering on a feature matrix and key the labels by code.
pub fn assign_hierarchical(
    matrix: &FeatureMatrix,
    k: usize,
    method: Linkage,
) -> ClusterResult<(ClusterAssignment, HierarchicalOutcome)> {
    let outcome = hierarchical(&matrix.values, k, method)?;
    Ok((assign(matrix, Algorithm::Hierarchical, k, &outcome.labels), outcome))
}

/// Key row-ordered labels by the matrix's local-authority codes.
pub fn assign(matrix: &FeatureMatrix, algorithm: Algorithm, k: usize, labels: &[usize]) -> ClusterAssignment {
    ClusterAssignment::from_rows(algorithm, k, &matrix.codes(), labels)
}
