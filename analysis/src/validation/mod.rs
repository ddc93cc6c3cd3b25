//! Data-integrity checks run between pipeline stages.
//!
//! Each check returns the first violation it finds:
//!
//! - [`check_baseline`] - index is exactly 100 at every location's baseline
//! - [`check_location_count`] - no local authority lost between stages
//! - [`check_complete`] - clustering matrix has no gaps
//! - [`check_label_count`] - an assignment uses exactly k labels

use crate::error::{IntegrityError, IntegrityResult};
use crate::models::{ClusterAssignment, IndexedObservation};
use crate::transform::index::BASELINE_INDEX;
use crate::transform::matrix::FeatureMatrix;

/// Every baseline observation carries index 100.
pub fn check_baseline(indexed: &[IndexedObservation]) -> IntegrityResult<()> {
    match indexed
        .iter()
        .find(|o| o.is_baseline() && o.index != BASELINE_INDEX)
    {
        Some(o) => Err(IntegrityError::Baseline {
            code: o.code().to_string(),
            date: o.date().to_string(),
            value: o.index,
        }),
        None => Ok(()),
    }
}

/// Distinct location count is unchanged at `stage`.
pub fn check_location_count(stage: &str, expected: usize, actual: usize) -> IntegrityResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(IntegrityError::LocationCount {
            stage: stage.to_string(),
            expected,
            actual,
        })
    }
}

/// No NaN left in the matrix passed to clustering.
pub fn check_complete(matrix: &FeatureMatrix) -> IntegrityResult<()> {
    match matrix.gaps().first() {
        Some((row, _)) => Err(IntegrityError::IncompleteRow {
            code: matrix.locations[*row].code.clone(),
        }),
        None => Ok(()),
    }
}

/// The assignment uses exactly `k` distinct labels.
pub fn check_label_count(assignment: &ClusterAssignment, k: usize) -> IntegrityResult<()> {
    let actual = assignment.distinct_labels().len();
    if actual == k {
        Ok(())
    } else {
        Err(IntegrityError::LabelCount {
            algorithm: assignment.algorithm.to_string(),
            expected: k,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Algorithm, FeatureKind, Location, Observation};
    use chrono::NaiveDate;

    fn indexed(code: &str, month: u32, index: f64) -> IndexedObservation {
        IndexedObservation {
            observation: Observation {
                location: Location {
                    region_code: "R".into(),
                    region_name: "Region".into(),
                    code: code.into(),
                    name: code.into(),
                },
                date: NaiveDate::from_ymd_opt(2005, month, 1).unwrap(),
                price: index,
            },
            baseline: NaiveDate::from_ymd_opt(2005, 1, 1).unwrap(),
            index,
        }
    }

    #[test]
    fn test_baseline_check() {
        assert!(check_baseline(&[indexed("E1", 1, 100.0), indexed("E1", 2, 140.0)]).is_ok());

        let err = check_baseline(&[indexed("E1", 1, 99.999)]).unwrap_err();
        assert!(err.to_string().contains("E1"));
    }

    #[test]
    fn test_location_count_check() {
        assert!(check_location_count("join", 348, 348).is_ok());
        let err = check_location_count("join", 348, 347).unwrap_err();
        assert!(err.to_string().contains("348"));
        assert!(err.to_string().contains("join"));
    }

    #[test]
    fn test_complete_check() {
        let full = FeatureMatrix::pivot(&[indexed("E1", 1, 100.0), indexed("E2", 1, 100.0)], FeatureKind::Index).unwrap();
        assert!(check_complete(&full).is_ok());

        let gappy = FeatureMatrix::pivot(&[indexed("E1", 1, 100.0), indexed("E2", 2, 100.0)], FeatureKind::Index).unwrap();
        assert!(matches!(check_complete(&gappy), Err(IntegrityError::IncompleteRow { .. })));
    }

    #[test]
    fn test_label_count_check() {
        let codes: Vec<String> = (1..=5).map(|i| format!("E{}", i)).collect();
        let a = ClusterAssignment::from_rows(Algorithm::Hierarchical, 4, &codes, &[1, 2, 3, 4, 4]);
        assert!(check_label_count(&a, 4).is_ok());

        let b = ClusterAssignment::from_rows(Algorithm::KMeans, 4, &codes, &[1, 2, 3, 3, 3]);
        let err = check_label_count(&b, 4).unwrap_err();
        assert!(matches!(err, IntegrityError::LabelCount { expected: 4, actual: 3, .. }));
    }
}
