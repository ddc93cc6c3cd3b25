//! K-means partitioning via `linfa-clustering`.
//!
//! The library does the fitting (k-means++ initialisation, several runs,
//! best inertia kept). This module only wraps the call, renumbers labels
//! and computes the within-cluster sum of squares used for the elbow plot.

use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use ndarray::{Array2, Axis};
use rand::SeedableRng;
use rand_isaac::Isaac64Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, ClusterResult};
use crate::models::relabel_by_first_appearance;

const MAX_ITERATIONS: u64 = 300;
const TOLERANCE: f64 = 1e-6;
const N_RUNS: usize = 10;

/// Labels and fit quality of one k-means run.
#[derive(Debug, Clone, Serialize)]
pub struct KMeansOutcome {
    /// Label per row, 1..=k, renumbered by first appearance
    pub labels: Vec<usize>,
    /// Within-cluster sum of squared distances to the centroids
    pub wcss: f64,
}

/// One point on the elbow curve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ElbowPoint {
    pub k: usize,
    pub wcss: f64,
}

/// Run k-means with `k` clusters on the rows of `records`.
pub fn kmeans(records: &Array2<f64>, k: usize, seed: u64) -> ClusterResult<KMeansOutcome> {
    let rows = records.nrows();
    if rows == 0 || records.ncols() == 0 {
        return Err(ClusterError::EmptyMatrix);
    }
    if k == 0 || k > rows {
        return Err(ClusterError::InvalidK { k, rows });
    }

    let rng = Isaac64Rng::seed_from_u64(seed);
    let dataset = DatasetBase::from(records.clone());

    let model = KMeans::params_with_rng(k, rng)
        .n_runs(N_RUNS)
        .max_n_iterations(MAX_ITERATIONS)
        .tolerance(TOLERANCE)
        .fit(&dataset)
        .map_err(|e| ClusterError::KMeans(e.to_string()))?;

    let raw: Vec<usize> = model.predict(records).to_vec();
    let centroids = model.centroids();

    let wcss: f64 = records
        .axis_iter(Axis(0))
        .zip(raw.iter())
        .map(|(row, &c)| {
            row.iter()
                .zip(centroids.row(c).iter())
                .map(|(x, m)| (x - m).powi(2))
                .sum::<f64>()
        })
        .sum();

    Ok(KMeansOutcome {
        labels: relabel_by_first_appearance(&raw),
        wcss,
    })
}

/// Within-cluster sum of squares for k = 1..=max_k.
///
/// `max_k` is capped at the number of distinct rows: beyond that k-means++
/// has no distinct point left to seed a centroid.
pub fn elbow(records: &Array2<f64>, max_k: usize, distinct_rows: usize, seed: u64) -> ClusterResult<Vec<ElbowPoint>> {
    let upper = max_k.min(distinct_rows).max(1);
    (1..=upper)
        .map(|k| kmeans(records, k, seed).map(|o| ElbowPoint { k, wcss: o.wcss }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_two_obvious_groups() {
        let records = array![
            [100.0, 110.0, 120.0],
            [100.0, 111.0, 121.0],
            [100.0, 300.0, 500.0],
            [100.0, 301.0, 499.0],
        ];
        let out = kmeans(&records, 2, 42).unwrap();

        assert_eq!(out.labels, vec![1, 1, 2, 2]);
        assert!(out.wcss < 5.0);
    }

    #[test]
    fn test_single_cluster_wcss() {
        let records = array![[0.0, 0.0], [2.0, 0.0]];
        let out = kmeans(&records, 1, 7).unwrap();

        assert_eq!(out.labels, vec![1, 1]);
        // centroid (1, 0): two squared distances of 1
        assert!((out.wcss - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_k() {
        let records = array![[1.0], [2.0]];
        assert!(matches!(kmeans(&records, 0, 1), Err(ClusterError::InvalidK { k: 0, rows: 2 })));
        assert!(matches!(kmeans(&records, 3, 1), Err(ClusterError::InvalidK { k: 3, rows: 2 })));
    }

    #[test]
    fn test_elbow_is_non_increasing_and_capped() {
        let records = array![[0.0, 0.0], [0.0, 1.0], [10.0, 10.0], [10.0, 11.0], [30.0, 0.0]];
        let curve = elbow(&records, 10, 5, 42).unwrap();

        assert_eq!(curve.len(), 5);
        assert_eq!(curve[0].k, 1);
        assert!(curve[0].wcss > curve[2].wcss);
        assert!(curve[4].wcss < 1e-9);
    }
}
