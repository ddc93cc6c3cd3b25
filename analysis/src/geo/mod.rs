//! Boundary join and choropleth rendering.
//!
//! Boundaries are a GeoJSON FeatureCollection whose features carry the
//! local-authority code in a property (e.g. `LAD21CD`). Geometry is passed
//! through untouched; it only matters to the map.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GeoError, GeoResult};
use crate::logs::{log_success, log_warning};
use crate::models::ClusterAssignment;

/// Property holding the local-authority code in ONS boundary files.
pub const DEFAULT_CODE_FIELD: &str = "LAD21CD";

/// Categorical colours, one per cluster label (cycled past ten).
const PALETTE: [&str; 10] = [
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f",
    "#edc948", "#b07aa1", "#ff9da7", "#9c755f", "#bab0ac",
];

/// Boundary features keyed by code property.
#[derive(Debug, Clone)]
pub struct BoundarySet {
    pub code_field: String,
    pub features: Vec<Value>,
}

impl BoundarySet {
    /// Code of a feature, if it has one.
    pub fn code_of<'a>(&self, feature: &'a Value) -> Option<&'a str> {
        feature
            .get("properties")
            .and_then(|p| p.get(&self.code_field))
            .and_then(|v| v.as_str())
    }
}

/// Counts from joining boundaries to an assignment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GeoJoinStats {
    pub matched: usize,
    /// Boundary features with no cluster label (not drawn)
    pub unmatched_features: usize,
    /// Labelled local authorities with no boundary
    pub unmatched_locations: Vec<String>,
}

/// Colour for a cluster label.
pub fn cluster_colour(label: usize) -> &'static str {
    PALETTE[label.saturating_sub(1) % PALETTE.len()]
}

/// Load a GeoJSON boundary file.
pub fn load_boundaries<P: AsRef<Path>>(path: P, code_field: &str) -> GeoResult<BoundarySet> {
    let content = fs::read_to_string(path)?;
    parse_boundaries(&content, code_field)
}

/// Parse a GeoJSON FeatureCollection.
pub fn parse_boundaries(content: &str, code_field: &str) -> GeoResult<BoundarySet> {
    let doc: Value = serde_json::from_str(content)?;
    if doc.get("type").and_then(|t| t.as_str()) != Some("FeatureCollection") {
        return Err(GeoError::NotFeatureCollection);
    }
    let features = match doc.get("features") {
        Some(Value::Array(features)) => features.clone(),
        _ => return Err(GeoError::NotFeatureCollection),
    };

    let set = BoundarySet {
        code_field: code_field.to_string(),
        features,
    };
    if !set.features.is_empty() && set.features.iter().all(|f| set.code_of(f).is_none()) {
        return Err(GeoError::MissingCodeField(code_field.to_string()));
    }
    Ok(set)
}

/// Keep labelled features and annotate them with code, name, cluster and colour.
pub fn join_boundaries(
    boundaries: &BoundarySet,
    assignment: &ClusterAssignment,
    names: &BTreeMap<String, String>,
) -> (Value, GeoJoinStats) {
    let mut stats = GeoJoinStats::default();
    let mut drawn: BTreeSet<&str> = BTreeSet::new();
    let mut features = Vec::new();

    for feature in &boundaries.features {
        let Some(code) = boundaries.code_of(feature) else {
            stats.unmatched_features += 1;
            continue;
        };
        let Some(label) = assignment.label(code) else {
            stats.unmatched_features += 1;
            continue;
        };

        let mut props = Map::new();
        props.insert("code".to_string(), json!(code));
        props.insert("name".to_string(), json!(names.get(code).map(String::as_str).unwrap_or(code)));
        props.insert("cluster".to_string(), json!(label));
        props.insert("colour".to_string(), json!(cluster_colour(label)));

        features.push(json!({
            "type": "Feature",
            "properties": props,
            "geometry": feature.get("geometry").cloned().unwrap_or(Value::Null),
        }));
        stats.matched += 1;
        if let Some((key, _)) = assignment.labels.get_key_value(code) {
            drawn.insert(key.as_str());
        }
    }

    stats.unmatched_locations = assignment
        .labels
        .keys()
        .filter(|c| !drawn.contains(c.as_str()))
        .cloned()
        .collect();

    log_success(format!("{} boundaries matched to {} labels", stats.matched, assignment.algorithm));
    if stats.unmatched_features > 0 {
        log_warning(format!("{} boundary features without a cluster label", stats.unmatched_features));
    }
    if !stats.unmatched_locations.is_empty() {
        log_warning(format!(
            "{} labelled local authorities have no boundary",
            stats.unmatched_locations.len()
        ));
    }

    (json!({ "type": "FeatureCollection", "features": features }), stats)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const MAP_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{TITLE}}</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>
  html, body, #map { height: 100%; margin: 0; }
  .legend { background: white; padding: 6px 10px; font: 13px sans-serif; line-height: 20px; }
  .legend i { width: 14px; height: 14px; float: left; margin: 3px 6px 0 0; }
</style>
</head>
<body>
<div id="map"></div>
<script>
const data = {{DATA}};
const legend = {{LEGEND}};
const map = L.map('map');
L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
  attribution: '&copy; OpenStreetMap contributors'
}).addTo(map);
const layer = L.geoJSON(data, {
  style: f => ({ fillColor: f.properties.colour, color: '#444', weight: 0.5, fillOpacity: 0.75 }),
  onEachFeature: (f, l) => {
    const div = document.createElement('div');
    const name = document.createElement('b');
    name.textContent = f.properties.name;
    div.appendChild(name);
    div.appendChild(document.createElement('br'));
    div.appendChild(document.createTextNode('Cluster ' + f.properties.cluster));
    l.bindPopup(div);
  }
}).addTo(map);
if (data.features.length) { map.fitBounds(layer.getBounds()); } else { map.setView([52.5, -1.5], 6); }
const control = L.control({ position: 'bottomright' });
control.onAdd = () => {
  const div = L.DomUtil.create('div', 'legend');
  div.innerHTML = '<b>{{TITLE}}</b><br>' +
    legend.map(e => '<i style="background:' + e.colour + '"></i>Cluster ' + e.label).join('<br>');
  return div;
};
control.addTo(map);
</script>
</body>
</html>
"#;

/// Standalone Leaflet page for an annotated FeatureCollection.
pub fn render_choropleth(collection: &Value, title: &str, k: usize) -> GeoResult<String> {
    let legend: Vec<Value> = (1..=k)
        .map(|label| json!({ "label": label, "colour": cluster_colour(label) }))
        .collect();

    // keep "</script>" inside names from closing the tag
    let data = serde_json::to_string(collection)?.replace("</", "<\\/");
    let legend = serde_json::to_string(&legend)?;

    Ok(MAP_TEMPLATE
        .replace("{{TITLE}}", &escape_html(title))
        .replace("{{LEGEND}}", &legend)
        .replace("{{DATA}}", &data))
}

/// Write `map_<slug>.html` and `map_<slug>.geojson` into `dir`.
pub fn write_map(dir: &Path, slug: &str, collection: &Value, title: &str, k: usize) -> GeoResult<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)?;
    let html_path = dir.join(format!("map_{}.html", slug));
    let json_path = dir.join(format!("map_{}.geojson", slug));

    fs::write(&html_path, render_choropleth(collection, title, k)?)?;
    fs::write(&json_path, serde_json::to_string(collection)?)?;

    Ok((html_path, json_path))
}
