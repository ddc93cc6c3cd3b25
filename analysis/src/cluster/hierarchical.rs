//! Agglomerative clustering via `kodama`.
//!
//! `kodama::linkage` builds the merge tree from a condensed pairwise
//! distance matrix. Cutting the tree into k groups replays the first
//! n - k merges.

use kodama::{linkage, Dendrogram};
use ndarray::Array2;
use serde::Serialize;

use crate::error::{ClusterError, ClusterResult};
use crate::models::{relabel_by_first_appearance, Linkage};

/// Labels of a dendrogram cut plus the merge heights.
#[derive(Debug, Clone, Serialize)]
pub struct HierarchicalOutcome {
    /// Label per row, 1..=k, renumbered by first appearance
    pub labels: Vec<usize>,
    /// Dissimilarity of each merge, in merge order
    pub merge_heights: Vec<f64>,
}

/// Upper triangle of the pairwise Euclidean distance matrix, row-major.
pub fn condensed_distances(records: &Array2<f64>) -> Vec<f64> {
    let n = records.nrows();
    let mut condensed = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        let a = records.row(i);
        for j in (i + 1)..n {
            let b = records.row(j);
            let d2: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
            condensed.push(d2.sqrt());
        }
    }
    condensed
}

/// Build the merge tree for the rows of `records`.
pub fn dendrogram(records: &Array2<f64>, method: Linkage) -> ClusterResult<Dendrogram<f64>> {
    let n = records.nrows();
    if n == 0 || records.ncols() == 0 {
        return Err(ClusterError::EmptyMatrix);
    }
    let mut condensed = condensed_distances(records);
    Ok(linkage(&mut condensed, n, method.method()))
}

/// Cut a dendrogram over `n` observations into `k` groups.
///
/// Returns the raw group id of each observation (the id of the tree node
/// it ended up in).
pub fn cut_tree(dendrogram: &Dendrogram<f64>, n: usize, k: usize) -> Vec<usize> {
    // observations are nodes 0..n, merge i creates node n + i
    let mut parent: Vec<usize> = (0..(2 * n).saturating_sub(1).max(n)).collect();
    for (i, step) in dendrogram.steps().iter().take(n.saturating_sub(k)).enumerate() {
        parent[step.cluster1] = n + i;
        parent[step.cluster2] = n + i;
    }

    (0..n)
        .map(|obs| {
            let mut node = obs;
            while parent[node] != node {
                node = parent[node];
            }
            node
        })
        .collect()
}

/// Cluster rows into `k` groups with the given linkage.
pub fn hierarchical(records: &Array2<f64>, k: usize, method: Linkage) -> ClusterResult<HierarchicalOutcome> {
    let rows = records.nrows();
    if rows == 0 || records.ncols() == 0 {
        return Err(ClusterError::EmptyMatrix);
    }
    if k == 0 || k > rows {
        return Err(ClusterError::InvalidK { k, rows });
    }
    if rows == 1 {
        return Ok(HierarchicalOutcome { labels: vec![1], merge_heights: Vec::new() });
    }

    let tree = dendrogram(records, method)?;
    let raw = cut_tree(&tree, rows, k);

    Ok(HierarchicalOutcome {
        labels: relabel_by_first_appearance(&raw),
        merge_heights: tree.steps().iter().map(|s| s.dissimilarity).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_condensed_distances() {
        let records = array![[0.0, 0.0], [3.0, 4.0], [0.0, 1.0]];
        assert_eq!(condensed_distances(&records), vec![5.0, 1.0, 18.0_f64.sqrt()]);
    }

    #[test]
    fn test_complete_linkage_cut() {
        let records = array![[0.0], [1.0], [10.0], [11.0], [50.0]];
        let out = hierarchical(&records, 3, Linkage::Complete).unwrap();

        assert_eq!(out.labels, vec![1, 1, 2, 2, 3]);
        assert_eq!(out.merge_heights.len(), 4);
        // first two merges join the tight pairs
        assert_eq!(out.merge_heights[0], 1.0);
        assert_eq!(out.merge_heights[1], 1.0);
    }

    #[test]
    fn test_cut_extremes() {
        let records = array![[0.0], [1.0], [10.0]];
        assert_eq!(hierarchical(&records, 1, Linkage::Complete).unwrap().labels, vec![1, 1, 1]);
        assert_eq!(hierarchical(&records, 3, Linkage::Complete).unwrap().labels, vec![1, 2, 3]);
    }

    #[test]
    fn test_single_row() {
        let records = array![[5.0, 6.0]];
        let out = hierarchical(&records, 1, Linkage::Average).unwrap();
        assert_eq!(out.labels, vec![1]);
        assert!(out.merge_heights.is_empty());
    }

    #[test]
    fn test_invalid_k() {
        let records = array![[0.0], [1.0]];
        assert!(matches!(
            hierarchical(&records, 3, Linkage::Complete),
            Err(ClusterError::InvalidK { k: 3, rows: 2 })
        ));
    }
}
