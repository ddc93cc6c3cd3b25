//! Join cluster labels back onto the long-format observations.
//!
//! ```text
//! Long observations           Assignments                 Clustered observations
//! ┌──────┬──────┬───────┐     ┌──────┬────┬────┐          ┌──────┬──────┬───────┬────┬────┐
//! │ code │ date │ index │  ⋈  │ code │ km │ hc │    →     │ code │ date │ index │ km │ hc │
//! └──────┴──────┴───────┘     └──────┴────┴────┘          └──────┴──────┴───────┴────┴────┘
//! ```
//!
//! Inner join on local-authority code. Unlabelled locations are not
//! dropped silently: the join reports them.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::logs::{log_success, log_warning};
use crate::models::{ClusterAssignment, IndexedObservation};
use crate::transform::matrix::FeatureMatrix;

/// An indexed observation with both cluster labels.
#[derive(Debug, Clone, Serialize)]
pub struct ClusteredObservation {
    pub region_code: String,
    pub region_name: String,
    pub code: String,
    pub name: String,
    pub date: NaiveDate,
    pub price: f64,
    pub index: f64,
    pub kmeans: usize,
    pub hierarchical: usize,
}

/// Outcome of the label join.
#[derive(Debug, Clone, Serialize)]
pub struct JoinResult {
    pub rows: Vec<ClusteredObservation>,
    /// Codes present in the observations but missing from an assignment
    pub unlabelled: Vec<String>,
}

impl JoinResult {
    /// Distinct codes that made it through the join.
    pub fn location_count(&self) -> usize {
        self.rows.iter().map(|r| r.code.as_str()).collect::<BTreeSet<_>>().len()
    }
}

/// Attach k-means and hierarchical labels to every observation.
pub fn attach_labels(
    indexed: &[IndexedObservation],
    kmeans: &ClusterAssignment,
    hierarchical: &ClusterAssignment,
) -> JoinResult {
    let mut rows = Vec::with_capacity(indexed.len());
    let mut unlabelled: BTreeSet<String> = BTreeSet::new();

    for obs in indexed {
        let code = obs.code();
        match (kmeans.label(code), hierarchical.label(code)) {
            (Some(km), Some(hc)) => {
                let loc = &obs.observation.location;
                rows.push(ClusteredObservation {
                    region_code: loc.region_code.clone(),
                    region_name: loc.region_name.clone(),
                    code: loc.code.clone(),
                    name: loc.name.clone(),
                    date: obs.date(),
                    price: obs.observation.price,
                    index: obs.index,
                    kmeans: km,
                    hierarchical: hc,
                });
            }
            _ => {
                unlabelled.insert(code.to_string());
            }
        }
    }

    let result = JoinResult {
        rows,
        unlabelled: unlabelled.into_iter().collect(),
    };

    log_success(format!(
        "Joined labels onto {} observations ({} local authorities)",
        result.rows.len(),
        result.location_count()
    ));
    if !result.unlabelled.is_empty() {
        log_warning(format!("{} local authorities have no cluster label", result.unlabelled.len()));
    }

    result
}

/// Summary of one cluster: size and mean trajectory.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterProfile {
    pub label: usize,
    pub members: usize,
    /// Mean feature value per matrix date
    pub mean: Vec<f64>,
}

/// Member count and mean trajectory for each label of an assignment.
pub fn cluster_profiles(matrix: &FeatureMatrix, assignment: &ClusterAssignment) -> Vec<ClusterProfile> {
    let mut sums: BTreeMap<usize, (usize, Vec<f64>)> = BTreeMap::new();

    for (i, loc) in matrix.locations.iter().enumerate() {
        let Some(label) = assignment.label(&loc.code) else {
            continue;
        };
        let entry = sums.entry(label).or_insert_with(|| (0, vec![0.0; matrix.ncols()]));
        entry.0 += 1;
        for (acc, v) in entry.1.iter_mut().zip(matrix.row(i).iter()) {
            *acc += v;
        }
    }

    sums.into_iter()
        .map(|(label, (members, totals))| ClusterProfile {
            label,
            members,
            mean: totals.into_iter().map(|t| t / members as f64).collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Algorithm, FeatureKind, Location, Observation};

    fn indexed(code: &str, month: u32, index: f64) -> IndexedObservation {
        IndexedObservation {
            observation: Observation {
                location: Location {
                    region_code: "R".into(),
                    region_name: "Region".into(),
                    code: code.into(),
                    name: code.to_lowercase(),
                },
                date: NaiveDate::from_ymd_opt(2010, month, 1).unwrap(),
                price: index,
            },
            baseline: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            index,
        }
    }

    fn assignment(algorithm: Algorithm, pairs: &[(&str, usize)]) -> ClusterAssignment {
        let codes: Vec<String> = pairs.iter().map(|(c, _)| c.to_string()).collect();
        let labels: Vec<usize> = pairs.iter().map(|(_, l)| *l).collect();
        ClusterAssignment::from_rows(algorithm, 2, &codes, &labels)
    }

    #[test]
    fn test_attach_labels() {
        let obs = vec![indexed("E1", 1, 100.0), indexed("E1", 2, 110.0), indexed("E2", 1, 100.0)];
        let km = assignment(Algorithm::KMeans, &[("E1", 1), ("E2", 2)]);
        let hc = assignment(Algorithm::Hierarchical, &[("E1", 2), ("E2", 1)]);

        let joined = attach_labels(&obs, &km, &hc);
        assert_eq!(joined.rows.len(), 3);
        assert_eq!(joined.location_count(), 2);
        assert!(joined.unlabelled.is_empty());
        assert_eq!(joined.rows[1].kmeans, 1);
        assert_eq!(joined.rows[1].hierarchical, 2);
        assert_eq!(joined.rows[1].index, 110.0);
    }

    #[test]
    fn test_unlabelled_locations_reported() {
        let obs = vec![indexed("E1", 1, 100.0), indexed("E3", 1, 100.0)];
        let km = assignment(Algorithm::KMeans, &[("E1", 1)]);
        let hc = assignment(Algorithm::Hierarchical, &[("E1", 1), ("E3", 2)]);

        let joined = attach_labels(&obs, &km, &hc);
        assert_eq!(joined.location_count(), 1);
        assert_eq!(joined.unlabelled, vec!["E3"]);
    }

    #[test]
    fn test_cluster_profiles() {
        let obs = vec![
            indexed("E1", 1, 100.0),
            indexed("E1", 2, 110.0),
            indexed("E2", 1, 100.0),
            indexed("E2", 2, 130.0),
            indexed("E3", 1, 100.0),
            indexed("E3", 2, 200.0),
        ];
        let matrix = FeatureMatrix::pivot(&obs, FeatureKind::Index).unwrap();
        let km = assignment(Algorithm::KMeans, &[("E1", 1), ("E2", 1), ("E3", 2)]);

        let profiles = cluster_profiles(&matrix, &km);
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].members, 2);
        assert_eq!(profiles[0].mean, vec![100.0, 120.0]);
        assert_eq!(profiles[1].mean, vec![100.0, 200.0]);
    }
}
