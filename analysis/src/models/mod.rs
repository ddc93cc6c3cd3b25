//! Domain models for the house-price clustering pipeline.
//!
//! - [`Location`] - Local authority and the region it belongs to
//! - [`Observation`] - One median price for one location and date
//! - [`IndexedObservation`] - Observation with its growth index
//! - [`FeatureKind`] - Which value feeds the clustering matrix
//! - [`Algorithm`] / [`Linkage`] - Clustering method selection
//! - [`ClusterAssignment`] - Local authority → cluster label mapping

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Location
// =============================================================================

/// A local authority with its parent region.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub region_code: String,
    pub region_name: String,
    pub code: String,
    pub name: String,
}

// =============================================================================
// Observations
// =============================================================================

/// Median price for one local authority at one date.
///
/// Identity is `(location.code, date)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub location: Location,
    pub date: NaiveDate,
    pub price: f64,
}

impl Observation {
    pub fn code(&self) -> &str {
        &self.location.code
    }
}

/// An observation with its price index relative to the location's baseline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedObservation {
    pub observation: Observation,
    /// Date of the location's baseline price.
    pub baseline: NaiveDate,
    /// Price / baseline price * 100.
    pub index: f64,
}

impl IndexedObservation {
    pub fn code(&self) -> &str {
        self.observation.code()
    }

    pub fn date(&self) -> NaiveDate {
        self.observation.date
    }

    pub fn is_baseline(&self) -> bool {
        self.observation.date == self.baseline
    }
}

// =============================================================================
// Clustering selection
// =============================================================================

/// Value used for each location's feature vector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// Price index (baseline = 100).
    #[default]
    Index,
    /// Raw median price.
    Price,
}

impl FeatureKind {
    pub fn value_of(&self, obs: &IndexedObservation) -> f64 {
        match self {
            FeatureKind::Index => obs.index,
            FeatureKind::Price => obs.observation.price,
        }
    }
}

impl std::str::FromStr for FeatureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "index" => Ok(FeatureKind::Index),
            "price" => Ok(FeatureKind::Price),
            other => Err(format!("unknown feature '{}' (expected index or price)", other)),
        }
    }
}

/// Clustering algorithm that produced an assignment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    KMeans,
    Hierarchical,
}

impl Algorithm {
    /// Short name used in file names and column headers.
    pub fn slug(&self) -> &'static str {
        match self {
            Algorithm::KMeans => "kmeans",
            Algorithm::Hierarchical => "hierarchical",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::KMeans => write!(f, "k-means"),
            Algorithm::Hierarchical => write!(f, "hierarchical"),
        }
    }
}

/// Linkage criterion for hierarchical clustering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    Single,
    #[default]
    Complete,
    Average,
    Weighted,
    Ward,
}

impl Linkage {
    pub fn method(&self) -> kodama::Method {
        match self {
            Linkage::Single => kodama::Method::Single,
            Linkage::Complete => kodama::Method::Complete,
            Linkage::Average => kodama::Method::Average,
            Linkage::Weighted => kodama::Method::Weighted,
            Linkage::Ward => kodama::Method::Ward,
        }
    }
}

impl std::str::FromStr for Linkage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Linkage::Single),
            "complete" => Ok(Linkage::Complete),
            "average" => Ok(Linkage::Average),
            "weighted" => Ok(Linkage::Weighted),
            "ward" => Ok(Linkage::Ward),
            other => Err(format!(
                "unknown linkage '{}' (expected single, complete, average, weighted or ward)",
                other
            )),
        }
    }
}

// =============================================================================
// Cluster assignment
// =============================================================================

/// Cluster label per local-authority code for one algorithm.
///
/// Labels are small positive integers (1..=k) with no ordinal meaning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterAssignment {
    pub algorithm: Algorithm,
    pub k: usize,
    pub labels: BTreeMap<String, usize>,
}

impl ClusterAssignment {
    /// Build from codes and labels in matching row order.
    pub fn from_rows(algorithm: Algorithm, k: usize, codes: &[String], labels: &[usize]) -> Self {
        let labels = codes
            .iter()
            .cloned()
            .zip(labels.iter().copied())
            .collect();
        Self { algorithm, k, labels }
    }

    pub fn label(&self, code: &str) -> Option<usize> {
        self.labels.get(code).copied()
    }

    /// Distinct labels in ascending order.
    pub fn distinct_labels(&self) -> Vec<usize> {
        let mut labels: Vec<usize> = self.labels.values().copied().collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// Codes grouped by label.
    pub fn members(&self) -> BTreeMap<usize, Vec<String>> {
        let mut members: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for (code, label) in &self.labels {
            members.entry(*label).or_default().push(code.clone());
        }
        members
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Renumber arbitrary cluster ids to 1..=k in order of first appearance.
pub fn relabel_by_first_appearance(raw: &[usize]) -> Vec<usize> {
    let mut seen: Vec<usize> = Vec::new();
    raw.iter()
        .map(|id| match seen.iter().position(|s| s == id) {
            Some(pos) => pos + 1,
            None => {
                seen.push(*id);
                seen.len()
            }
        })
        .collect()
}
