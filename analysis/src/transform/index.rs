//! Growth index relative to each location's baseline date.
//!
//! The baseline is the earliest retained date for the location, so after a
//! date-window filter the index restarts at 100 on the first date kept.

use std::collections::BTreeMap;

use crate::error::{ReshapeError, ReshapeResult};
use crate::models::{IndexedObservation, Observation};

/// Value of the index at every location's baseline.
pub const BASELINE_INDEX: f64 = 100.0;

/// Compute `price / baseline price * 100` for every observation.
///
/// Output keeps the input order.
pub fn price_index(observations: &[Observation]) -> ReshapeResult<Vec<IndexedObservation>> {
    if observations.is_empty() {
        return Err(ReshapeError::NoObservations);
    }

    let mut baselines: BTreeMap<&str, &Observation> = BTreeMap::new();
    for obs in observations {
        baselines
            .entry(obs.code())
            .and_modify(|b| {
                if obs.date < b.date {
                    *b = obs;
                }
            })
            .or_insert(obs);
    }

    for base in baselines.values() {
        if base.price <= 0.0 {
            return Err(ReshapeError::BadBaseline {
                code: base.code().to_string(),
                date: base.date.to_string(),
                price: base.price,
            });
        }
    }

    Ok(observations
        .iter()
        .map(|obs| {
            let base = baselines[obs.code()];
            let index = if obs.date == base.date {
                BASELINE_INDEX
            } else {
                obs.price / base.price * BASELINE_INDEX
            };
            IndexedObservation {
                observation: obs.clone(),
                baseline: base.date,
                index,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;
    use chrono::NaiveDate;

    fn obs(code: &str, year: i32, price: f64) -> Observation {
        Observation {
            location: Location {
                region_code: "R".into(),
                region_name: "Region".into(),
                code: code.into(),
                name: code.into(),
            },
            date: NaiveDate::from_ymd_opt(year, 1, 1).unwrap(),
            price,
        }
    }

    #[test]
    fn test_index_relative_to_earliest_date() {
        // deliberately out of order
        let input = vec![obs("E1", 2001, 150.0), obs("E1", 2000, 100.0), obs("E2", 2000, 80.0), obs("E2", 2001, 40.0)];
        let indexed = price_index(&input).unwrap();

        assert_eq!(indexed[0].index, 150.0);
        assert_eq!(indexed[1].index, 100.0);
        assert!(indexed[1].is_baseline());
        assert_eq!(indexed[3].index, 50.0);
        assert_eq!(indexed[3].baseline, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
    }

    #[test]
    fn test_baseline_is_exactly_100() {
        let input = vec![obs("E1", 2000, 123_456.789), obs("E1", 2001, 130_000.0)];
        let indexed = price_index(&input).unwrap();
        assert_eq!(indexed[0].index, 100.0);
    }

    #[test]
    fn test_non_positive_baseline_fails() {
        let input = vec![obs("E1", 2000, 0.0), obs("E1", 2001, 10.0)];
        assert!(matches!(price_index(&input), Err(ReshapeError::BadBaseline { .. })));
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(matches!(price_index(&[]), Err(ReshapeError::NoObservations)));
    }
}
