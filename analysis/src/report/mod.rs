//! Run outputs: SVG charts and CSV/JSON exports.

pub mod charts;
pub mod export;

pub use charts::{facets_by_cluster, facets_by_region, render_elbow, render_facets, Facet, Series};
pub use export::{
    assignment_rows, write_assignments, write_json, write_long_table, write_observations, AssignmentRow,
};
