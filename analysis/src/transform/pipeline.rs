//! High-level pipeline API: spreadsheet in, clusters, charts and maps out.
//!
//! [`run`] chains every step and writes outputs; [`analyze_table`] is the
//! in-memory part (reshape → index → pivot → cluster → join) for callers
//! that already hold a [`WideTable`].
//!
//! # Example
//!
//! ```rust,ignore
//! use houseprice::{run, AnalysisOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = AnalysisOptions {
//!         input: Some("medianpricepaidbylocalauthority.xlsx".into()),
//!         ..Default::default()
//!     };
//!     let result = run(&options)?;
//!     println!("{} local authorities clustered", result.summary.counts.matrix_locations);
//!     Ok(())
//! }
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cluster::{assign_hierarchical, assign_kmeans, elbow, ElbowPoint, HierarchicalOutcome, KMeansOutcome};
use crate::error::{ClusterError, PipelineError, PipelineResult};
use crate::geo::{join_boundaries, load_boundaries, write_map, GeoJoinStats, DEFAULT_CODE_FIELD};
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::models::{Algorithm, ClusterAssignment, FeatureKind, IndexedObservation, Linkage};
use crate::parser::{read_table, SourceSpec, WideTable, DEFAULT_SHEET, DEFAULT_SKIP_ROWS};
use crate::report::{
    assignment_rows, facets_by_cluster, facets_by_region, render_elbow, render_facets, write_assignments, write_json,
    write_observations,
};
use crate::transform::index::price_index;
use crate::transform::join::{attach_labels, cluster_profiles, ClusterProfile, JoinResult};
use crate::transform::matrix::{FeatureMatrix, MissingPolicy};
use crate::transform::reshape::{distinct_codes, filter_dates, wide_to_long};
use crate::validation::{check_baseline, check_complete, check_label_count, check_location_count};

/// Options for a full analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Source workbook or CSV export
    pub input: Option<PathBuf>,

    /// Sheet holding the wide table (workbooks only)
    pub sheet: String,

    /// Rows above the header row
    pub skip_rows: usize,

    /// First date kept (inclusive)
    pub from: Option<NaiveDate>,

    /// Last date kept (inclusive)
    pub to: Option<NaiveDate>,

    /// Value clustered per location and date
    pub feature: FeatureKind,

    /// Number of clusters for both algorithms
    pub k: usize,

    /// Largest k on the elbow curve
    pub max_k: usize,

    /// k-means RNG seed
    pub seed: u64,

    /// Hierarchical linkage criterion
    pub linkage: Linkage,

    /// What to do with locations that have gaps
    pub missing: MissingPolicy,

    /// GeoJSON boundaries for the choropleth maps
    pub boundaries: Option<PathBuf>,

    /// Boundary property holding the local-authority code
    pub code_field: String,

    /// Directory receiving every output file
    pub out_dir: PathBuf,

    /// Skip SVG charts
    pub no_charts: bool,

    /// Skip choropleth maps even when boundaries are given
    pub no_map: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            input: None,
            sheet: DEFAULT_SHEET.to_string(),
            skip_rows: DEFAULT_SKIP_ROWS,
            from: None,
            to: None,
            feature: FeatureKind::Index,
            k: 4,
            max_k: 10,
            seed: 42,
            linkage: Linkage::Complete,
            missing: MissingPolicy::Fail,
            boundaries: None,
            code_field: DEFAULT_CODE_FIELD.to_string(),
            out_dir: PathBuf::from("out"),
            no_charts: false,
            no_map: false,
        }
    }
}

impl AnalysisOptions {
    /// Load options from a JSON file; absent fields take their defaults.
    pub fn from_json_file(path: &Path) -> PipelineResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| PipelineError::Options(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content).map_err(|e| PipelineError::Options(format!("{}: {}", path.display(), e)))
    }

    pub fn source(&self) -> SourceSpec {
        SourceSpec {
            sheet: self.sheet.clone(),
            skip_rows: self.skip_rows,
        }
    }
}

/// Distinct locations and observations after each stage.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StageCounts {
    pub input_rows: usize,
    pub input_locations: usize,
    pub observations: usize,
    pub window_observations: usize,
    pub window_locations: usize,
    pub dates: usize,
    pub matrix_locations: usize,
    /// Locations removed on purpose (no prices, or gaps under `drop_incomplete`)
    pub dropped: Vec<String>,
    pub joined_locations: usize,
    pub joined_observations: usize,
}

/// Everything computed in memory by [`analyze_table`].
#[derive(Debug, Clone)]
pub struct Analysis {
    pub indexed: Vec<IndexedObservation>,
    pub matrix: FeatureMatrix,
    pub elbow: Vec<ElbowPoint>,
    pub kmeans: ClusterAssignment,
    pub kmeans_outcome: KMeansOutcome,
    pub hierarchical: ClusterAssignment,
    pub hierarchical_outcome: HierarchicalOutcome,
    pub joined: JoinResult,
    pub profiles: BTreeMap<Algorithm, Vec<ClusterProfile>>,
    pub counts: StageCounts,
}

impl Analysis {
    pub fn assignment(&self, algorithm: Algorithm) -> &ClusterAssignment {
        match algorithm {
            Algorithm::KMeans => &self.kmeans,
            Algorithm::Hierarchical => &self.hierarchical,
        }
    }
}

/// Serialized as `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub options: AnalysisOptions,
    pub counts: StageCounts,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub elbow: Vec<ElbowPoint>,
    pub kmeans_wcss: f64,
    pub profiles: BTreeMap<Algorithm, Vec<ClusterProfile>>,
    pub geo: BTreeMap<Algorithm, GeoJoinStats>,
    pub outputs: Vec<PathBuf>,
}

/// Result of a complete run
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub analysis: Analysis,
    pub summary: Summary,
}

/// Read the source, analyze it and write every output.
pub fn run(options: &AnalysisOptions) -> PipelineResult<AnalysisResult> {
    let input = options
        .input
        .as_deref()
        .ok_or_else(|| PipelineError::Options("no input file given".to_string()))?;

    log_info(format!("Reading {}", input.display()));
    let table = read_table(input, &options.source())?;
    log_success(format!(
        "Read {} rows × {} columns ({})",
        table.rows.len(),
        table.headers.len(),
        table.encoding
    ));

    let analysis = analyze_table(&table, options)?;
    let summary = write_outputs(&analysis, options)?;

    log_success(format!(
        "Done: {} files written to {}",
        summary.outputs.len(),
        options.out_dir.display()
    ));
    Ok(AnalysisResult { analysis, summary })
}

/// Indexed observations and the complete feature matrix, ready to cluster.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub indexed: Vec<IndexedObservation>,
    pub matrix: FeatureMatrix,
    pub counts: StageCounts,
}

/// Reshape, filter, index and pivot a wide table, checking integrity at each stage.
pub fn prepare_matrix(table: &WideTable, options: &AnalysisOptions) -> PipelineResult<Prepared> {
    let mut counts = StageCounts {
        input_rows: table.rows.len(),
        ..Default::default()
    };
    let input_codes = distinct_codes(table.rows.iter().map(|r| r[2].trim()).filter(|c| !c.is_empty()));
    counts.input_locations = input_codes.len();

    // 1. Wide → long
    let observations = wide_to_long(table)?;
    counts.observations = observations.len();
    let long_codes = distinct_codes(observations.iter().map(|o| o.code()));

    let priceless: Vec<String> = input_codes.difference(&long_codes).cloned().collect();
    if !priceless.is_empty() {
        match options.missing {
            MissingPolicy::Fail => {
                check_location_count("reshape", input_codes.len(), long_codes.len())?;
            }
            MissingPolicy::DropIncomplete => {
                log_warning(format!("{} local authorities have no prices at all", priceless.len()));
                for code in &priceless {
                    log_info_indent(code.clone(), 1);
                }
                counts.dropped.extend(priceless);
            }
        }
    }

    // 2. Date window
    let observations = filter_dates(observations, options.from, options.to)?;
    counts.window_observations = observations.len();
    counts.window_locations = distinct_codes(observations.iter().map(|o| o.code())).len();
    check_location_count("date filter", long_codes.len(), counts.window_locations)?;

    // 3. Index
    let indexed = price_index(&observations)?;
    check_baseline(&indexed)?;
    log_success(format!("Indexed {} observations to baseline 100", indexed.len()));

    // 4. Pivot
    let matrix = FeatureMatrix::pivot(&indexed, options.feature)?;
    counts.dates = matrix.ncols();
    let before: BTreeSet<String> = matrix.codes().into_iter().collect();
    let matrix = matrix.ensure_complete(options.missing)?;
    check_complete(&matrix)?;
    counts.matrix_locations = matrix.nrows();

    let kept: BTreeSet<String> = matrix.codes().into_iter().collect();
    let gappy: Vec<String> = before.difference(&kept).cloned().collect();
    check_location_count("pivot", counts.window_locations, counts.matrix_locations + gappy.len())?;
    counts.dropped.extend(gappy);

    let indexed = indexed.into_iter().filter(|o| kept.contains(o.code())).collect();
    Ok(Prepared { indexed, matrix, counts })
}

/// Reshape, index, pivot, cluster and join an in-memory wide table.
///
/// Every integrity check runs here; any violation aborts the analysis.
pub fn analyze_table(table: &WideTable, options: &AnalysisOptions) -> PipelineResult<Analysis> {
    let Prepared { indexed, matrix, mut counts } = prepare_matrix(table, options)?;

    // 5. Cluster
    log_info(format!(
        "Clustering {} local authorities on {} dates (k = {})",
        matrix.nrows(),
        matrix.ncols(),
        options.k
    ));
    let distinct = matrix.distinct_rows();
    if options.k == 0 || options.k > matrix.nrows() {
        return Err(ClusterError::InvalidK { k: options.k, rows: matrix.nrows() }.into());
    }
    if options.k > distinct {
        return Err(ClusterError::TooFewDistinct { k: options.k, distinct }.into());
    }

    let elbow_curve = elbow(&matrix.values, options.max_k, distinct, options.seed)?;
    for point in &elbow_curve {
        log_info_indent(format!("k = {:>2}  WCSS = {:.1}", point.k, point.wcss), 1);
    }

    let (kmeans, kmeans_outcome) = assign_kmeans(&matrix, options.k, options.seed)?;
    check_label_count(&kmeans, options.k)?;
    log_success(format!("k-means: {} clusters, WCSS {:.1}", options.k, kmeans_outcome.wcss));

    let (hierarchical, hierarchical_outcome) = assign_hierarchical(&matrix, options.k, options.linkage)?;
    check_label_count(&hierarchical, options.k)?;
    log_success(format!("hierarchical ({:?} linkage): {} clusters", options.linkage, options.k));

    // 6. Join labels back onto the observations
    let joined = attach_labels(&indexed, &kmeans, &hierarchical);
    counts.joined_locations = joined.location_count();
    counts.joined_observations = joined.rows.len();
    check_location_count("join", counts.matrix_locations, counts.joined_locations)?;

    let mut profiles = BTreeMap::new();
    profiles.insert(Algorithm::KMeans, cluster_profiles(&matrix, &kmeans));
    profiles.insert(Algorithm::Hierarchical, cluster_profiles(&matrix, &hierarchical));

    Ok(Analysis {
        indexed,
        matrix,
        elbow: elbow_curve,
        kmeans,
        kmeans_outcome,
        hierarchical,
        hierarchical_outcome,
        joined,
        profiles,
        counts,
    })
}

/// Write exports, charts and maps for an analysis into `options.out_dir`.
pub fn write_outputs(analysis: &Analysis, options: &AnalysisOptions) -> PipelineResult<Summary> {
    let out = options.out_dir.as_path();
    fs::create_dir_all(out).map_err(crate::error::ReportError::from)?;
    let mut outputs = Vec::new();

    // Exports
    let path = out.join("assignments.csv");
    write_assignments(&path, &assignment_rows(&analysis.matrix, &analysis.kmeans, &analysis.hierarchical))?;
    outputs.push(path);

    let path = out.join("observations.csv");
    write_observations(&path, &analysis.joined.rows)?;
    outputs.push(path);

    // Charts
    if !options.no_charts {
        let by_region = [
            (FeatureKind::Price, "price_by_region.svg", "Median price paid by local authority", "£"),
            (FeatureKind::Index, "index_by_region.svg", "Price index by local authority", "index"),
        ];
        for (feature, file, title, y_desc) in by_region {
            let path = out.join(file);
            render_facets(&path, title, y_desc, &facets_by_region(&analysis.indexed, feature))?;
            outputs.push(path);
        }

        let y_desc = match analysis.matrix.feature {
            FeatureKind::Index => "index",
            FeatureKind::Price => "£",
        };
        for algorithm in [Algorithm::KMeans, Algorithm::Hierarchical] {
            let assignment = analysis.assignment(algorithm);
            let profiles = analysis.profiles.get(&algorithm).map(Vec::as_slice).unwrap_or_default();
            let path = out.join(format!("clusters_{}.svg", algorithm.slug()));
            let title = format!("{} clusters (k = {})", algorithm, assignment.k);
            render_facets(&path, &title, y_desc, &facets_by_cluster(&analysis.matrix, assignment, profiles))?;
            outputs.push(path);
        }

        let path = out.join("elbow.svg");
        render_elbow(&path, &analysis.elbow)?;
        outputs.push(path);
        log_success("Charts rendered");
    }

    // Maps
    let mut geo = BTreeMap::new();
    match (&options.boundaries, options.no_map) {
        (Some(boundaries), false) => {
            log_info(format!("Loading boundaries {}", boundaries.display()));
            let set = load_boundaries(boundaries, &options.code_field)?;
            let names: BTreeMap<String, String> = analysis
                .matrix
                .locations
                .iter()
                .map(|l| (l.code.clone(), l.name.clone()))
                .collect();

            for algorithm in [Algorithm::KMeans, Algorithm::Hierarchical] {
                let assignment = analysis.assignment(algorithm);
                let (collection, stats) = join_boundaries(&set, assignment, &names);
                let title = format!("{} clusters (k = {})", algorithm, assignment.k);
                let (html, geojson) = write_map(out, algorithm.slug(), &collection, &title, assignment.k)?;
                outputs.push(html);
                outputs.push(geojson);
                geo.insert(algorithm, stats);
            }
        }
        (None, false) => log_info("No boundaries given, skipping maps"),
        (_, true) => {}
    }

    let mut summary = Summary {
        options: options.clone(),
        counts: analysis.counts.clone(),
        first_date: analysis.matrix.dates.first().copied(),
        last_date: analysis.matrix.dates.last().copied(),
        elbow: analysis.elbow.clone(),
        kmeans_wcss: analysis.kmeans_outcome.wcss,
        profiles: analysis.profiles.clone(),
        geo,
        outputs,
    };
    let path = out.join("summary.json");
    summary.outputs.push(path.clone());
    write_json(&path, &summary)?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(&str, [&str; 3])]) -> WideTable {
        let headers = ["Region code", "Region name", "Local authority code", "Local authority name"]
            .iter()
            .map(|s| s.to_string())
            .chain(["Year ending Mar 2000", "Year ending Mar 2001", "Year ending Mar 2002"].iter().map(|s| s.to_string()))
            .collect();
        let rows = rows
            .iter()
            .map(|(code, prices)| {
                ["E12000001", "North East", *code, *code]
                    .iter()
                    .chain(prices.iter())
                    .map(|s| s.to_string())
                    .collect()
            })
            .collect();
        WideTable::from_cells(headers, rows, "utf-8", Some(',')).unwrap()
    }

    fn options(k: usize) -> AnalysisOptions {
        AnalysisOptions {
            k,
            max_k: 3,
            no_charts: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_options_defaults_and_json() {
        let defaults = AnalysisOptions::default();
        assert_eq!(defaults.k, 4);
        assert_eq!(defaults.max_k, 10);
        assert_eq!(defaults.seed, 42);
        assert_eq!(defaults.sheet, "2a");
        assert_eq!(defaults.skip_rows, 6);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        fs::write(&path, r#"{"k": 6, "linkage": "ward", "from": "2005-03-01"}"#).unwrap();
        let loaded = AnalysisOptions::from_json_file(&path).unwrap();
        assert_eq!(loaded.k, 6);
        assert_eq!(loaded.linkage, Linkage::Ward);
        assert_eq!(loaded.from, NaiveDate::from_ymd_opt(2005, 3, 1));
        assert_eq!(loaded.seed, 42);

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(AnalysisOptions::from_json_file(&path), Err(PipelineError::Options(_))));
    }

    #[test]
    fn test_analyze_table_counts() {
        let t = table(&[
            ("E1", ["100", "110", "120"]),
            ("E2", ["200", "220", "240"]),
            ("E3", ["100", "300", "900"]),
        ]);
        let analysis = analyze_table(&t, &options(2)).unwrap();

        assert_eq!(analysis.counts.input_locations, 3);
        assert_eq!(analysis.counts.matrix_locations, 3);
        assert_eq!(analysis.counts.joined_locations, 3);
        assert_eq!(analysis.counts.joined_observations, 9);
        assert!(analysis.counts.dropped.is_empty());
        assert_eq!(analysis.kmeans.label("E1"), analysis.kmeans.label("E2"));
        assert_ne!(analysis.kmeans.label("E1"), analysis.kmeans.label("E3"));
        // E1 and E2 share a trajectory, so only two distinct rows
        assert_eq!(analysis.elbow.len(), 2);
    }

    #[test]
    fn test_gap_fails_or_drops() {
        let t = table(&[
            ("E1", ["100", "110", "120"]),
            ("E2", ["100", "..", "130"]),
            ("E3", ["100", "300", "900"]),
        ]);
        let err = analyze_table(&t, &options(2)).unwrap_err();
        assert!(matches!(err, PipelineError::Cluster(_)));

        let dropping = AnalysisOptions {
            missing: MissingPolicy::DropIncomplete,
            ..options(2)
        };
        let mut rx = crate::logs::LOG_BROADCASTER.subscribe();
        let analysis = analyze_table(&t, &dropping).unwrap();
        assert_eq!(analysis.counts.dropped, vec!["E2"]);

        let warnings = crate::logs::drain(&mut rx);
        assert!(warnings
            .iter()
            .any(|e| e.level == crate::logs::LogLevel::Warning && e.indent == 1 && e.message.starts_with("E2 ")));
        assert_eq!(analysis.counts.matrix_locations, 2);
        assert_eq!(analysis.counts.joined_locations, 2);
    }

    #[test]
    fn test_k_larger_than_locations() {
        let t = table(&[("E1", ["100", "110", "120"]), ("E2", ["100", "120", "140"])]);
        let err = analyze_table(&t, &options(4)).unwrap_err();
        assert!(matches!(err, PipelineError::Cluster(ClusterError::InvalidK { k: 4, rows: 2 })));
    }

    #[test]
    fn test_k_larger_than_distinct_trajectories() {
        // six locations, but only three growth paths
        let t = table(&[
            ("E1", ["100", "110", "120"]),
            ("E2", ["200", "220", "240"]),
            ("E3", ["100", "150", "200"]),
            ("E4", ["300", "450", "600"]),
            ("E5", ["100", "300", "900"]),
            ("E6", ["50", "150", "450"]),
        ]);
        let err = analyze_table(&t, &options(4)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Cluster(ClusterError::TooFewDistinct { k: 4, distinct: 3 })
        ));
        assert!(err.to_string().contains("3 distinct"));

        assert!(analyze_table(&t, &options(3)).is_ok());
    }

    #[test]
    fn test_run_requires_input() {
        assert!(matches!(run(&AnalysisOptions::default()), Err(PipelineError::Options(_))));
    }

    #[test]
    fn test_write_outputs_without_charts() {
        let t = table(&[
            ("E1", ["100", "110", "120"]),
            ("E2", ["200", "220", "240"]),
            ("E3", ["100", "300", "900"]),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let opts = AnalysisOptions {
            out_dir: dir.path().to_path_buf(),
            ..options(2)
        };
        let analysis = analyze_table(&t, &opts).unwrap();
        let summary = write_outputs(&analysis, &opts).unwrap();

        assert_eq!(summary.outputs.len(), 3);
        assert!(dir.path().join("assignments.csv").exists());
        assert!(dir.path().join("observations.csv").exists());
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("summary.json")).unwrap()).unwrap();
        assert_eq!(json["counts"]["matrix_locations"], 3);
        assert_eq!(json["options"]["k"], 2);
        assert_eq!(json["first_date"], "2000-03-01");
    }
}
