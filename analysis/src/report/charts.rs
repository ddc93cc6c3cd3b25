//! SVG line charts: price and index trajectories faceted by region or
//! cluster, and the elbow curve.

use chrono::{Datelike, NaiveDate};
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

use crate::cluster::ElbowPoint;
use crate::error::{ReportError, ReportResult};
use crate::models::{ClusterAssignment, FeatureKind, IndexedObservation};
use crate::transform::join::ClusterProfile;
use crate::transform::matrix::FeatureMatrix;

const PANEL_WIDTH: usize = 420;
const PANEL_HEIGHT: usize = 300;
const TITLE_HEIGHT: usize = 40;

/// One line on a chart.
#[derive(Debug, Clone)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

/// One panel of a faceted chart.
#[derive(Debug, Clone)]
pub struct Facet {
    pub title: String,
    pub series: Vec<Series>,
    /// Drawn on top in black, e.g. the cluster mean
    pub highlight: Option<Series>,
}

/// Date as a fractional year for the x axis.
pub fn decimal_year(date: NaiveDate) -> f64 {
    date.year() as f64 + date.ordinal0() as f64 / 365.25
}

/// One facet per region, one line per local authority.
pub fn facets_by_region(indexed: &[IndexedObservation], feature: FeatureKind) -> Vec<Facet> {
    let mut regions: BTreeMap<&str, BTreeMap<&str, Series>> = BTreeMap::new();
    for obs in indexed {
        let loc = &obs.observation.location;
        regions
            .entry(loc.region_name.as_str())
            .or_default()
            .entry(loc.code.as_str())
            .or_insert_with(|| Series {
                label: loc.name.clone(),
                points: Vec::new(),
            })
            .points
            .push((decimal_year(obs.date()), feature.value_of(obs)));
    }

    regions
        .into_iter()
        .map(|(region, locations)| Facet {
            title: region.to_string(),
            series: locations
                .into_values()
                .map(|mut s| {
                    s.points.sort_by(|a, b| a.0.total_cmp(&b.0));
                    s
                })
                .collect(),
            highlight: None,
        })
        .collect()
}

/// One facet per cluster label, one line per member, cluster mean highlighted.
pub fn facets_by_cluster(matrix: &FeatureMatrix, assignment: &ClusterAssignment, profiles: &[ClusterProfile]) -> Vec<Facet> {
    let xs: Vec<f64> = matrix.dates.iter().map(|d| decimal_year(*d)).collect();
    let members = assignment.members();

    profiles
        .iter()
        .map(|profile| {
            let codes = members.get(&profile.label).cloned().unwrap_or_default();
            let series = matrix
                .locations
                .iter()
                .enumerate()
                .filter(|(_, loc)| codes.contains(&loc.code))
                .map(|(i, loc)| Series {
                    label: loc.name.clone(),
                    points: xs.iter().copied().zip(matrix.row(i).iter().copied()).collect(),
                })
                .collect();

            Facet {
                title: format!("Cluster {} ({} local authorities)", profile.label, profile.members),
                series,
                highlight: Some(Series {
                    label: "mean".to_string(),
                    points: xs.iter().copied().zip(profile.mean.iter().copied()).collect(),
                }),
            }
        })
        .collect()
}

/// Axis ranges covering every point of a facet, padded when degenerate.
fn bounds(facet: &Facet) -> (Range<f64>, Range<f64>) {
    let points = facet
        .series
        .iter()
        .chain(facet.highlight.iter())
        .flat_map(|s| s.points.iter())
        .filter(|(_, y)| y.is_finite());

    let (mut x0, mut x1, mut y0, mut y1) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    for (x, y) in points {
        x0 = x0.min(*x);
        x1 = x1.max(*x);
        y0 = y0.min(*y);
        y1 = y1.max(*y);
    }
    if x0 > x1 {
        return (0.0..1.0, 0.0..1.0);
    }
    if x1 - x0 < f64::EPSILON {
        x0 -= 0.5;
        x1 += 0.5;
    }
    let pad = ((y1 - y0) * 0.05).max(1.0);
    (x0..x1, (y0 - pad)..(y1 + pad))
}

/// Render facets into a grid of panels in one SVG file.
pub fn render_facets(path: &Path, title: &str, y_desc: &str, facets: &[Facet]) -> ReportResult<()> {
    draw_facets(path, title, y_desc, facets).map_err(|e| ReportError::Render(e.to_string()))
}

fn draw_facets(path: &Path, title: &str, y_desc: &str, facets: &[Facet]) -> Result<(), Box<dyn std::error::Error>> {
    let cols = ((facets.len() as f64).sqrt().ceil() as usize).max(1);
    let rows = facets.len().div_ceil(cols).max(1);
    let size = ((cols * PANEL_WIDTH) as u32, (rows * PANEL_HEIGHT + TITLE_HEIGHT) as u32);

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 24))?;

    for (panel, facet) in root.split_evenly((rows, cols)).iter().zip(facets) {
        let (x_range, y_range) = bounds(facet);
        let mut chart = ChartBuilder::on(panel)
            .caption(&facet.title, ("sans-serif", 15))
            .margin(8)
            .x_label_area_size(28)
            .y_label_area_size(52)
            .build_cartesian_2d(x_range, y_range)?;

        chart
            .configure_mesh()
            .x_labels(5)
            .y_labels(5)
            .x_label_formatter(&|x| format!("{:.0}", x))
            .y_label_formatter(&|y| format!("{:.0}", y))
            .y_desc(y_desc)
            .draw()?;

        for (i, series) in facet.series.iter().enumerate() {
            chart.draw_series(LineSeries::new(
                series.points.iter().copied(),
                &Palette99::pick(i).mix(0.6),
            ))?;
        }
        if let Some(highlight) = &facet.highlight {
            chart.draw_series(LineSeries::new(highlight.points.iter().copied(), BLACK.stroke_width(3)))?;
        }
    }

    root.present()?;
    Ok(())
}

/// Render the within-cluster sum of squares against k.
pub fn render_elbow(path: &Path, curve: &[ElbowPoint]) -> ReportResult<()> {
    draw_elbow(path, curve).map_err(|e| ReportError::Render(e.to_string()))
}

fn draw_elbow(path: &Path, curve: &[ElbowPoint]) -> Result<(), Box<dyn std::error::Error>> {
    let max_k = curve.iter().map(|p| p.k).max().unwrap_or(1) as f64;
    let max_wcss = curve.iter().map(|p| p.wcss).fold(0.0, f64::max).max(1.0);

    let root = SVGBackend::new(path, (640, 420)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Elbow: within-cluster sum of squares", ("sans-serif", 20))
        .margin(12)
        .x_label_area_size(36)
        .y_label_area_size(80)
        .build_cartesian_2d(0.5..(max_k + 0.5), 0.0..(max_wcss * 1.05))?;

    chart
        .configure_mesh()
        .x_labels(curve.len().max(2))
        .x_label_formatter(&|x| format!("{:.0}", x))
        .x_desc("k")
        .y_desc("WCSS")
        .draw()?;

    let points: Vec<(f64, f64)> = curve.iter().map(|p| (p.k as f64, p.wcss)).collect();
    chart.draw_series(LineSeries::new(points.iter().copied(), &BLUE))?;
    chart.draw_series(points.iter().map(|&(x, y)| Circle::new((x, y), 4, BLUE.filled())))?;

    root.present()?;
    Ok(())
}
