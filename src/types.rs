use geo::MultiPolygon;
use serde::Serialize;
use std::collections::HashMap;

/// One polygon's demographic attributes, extracted from feature properties.
///
/// Category counts are not required to sum to `total`: census categories
/// overlap, and no consistency is enforced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemographicRecord {
    /// Total population. `None` when the source field is absent or not numeric.
    pub total: Option<f64>,
    /// Raw count per category field. Missing fields read as zero.
    pub counts: HashMap<String, f64>,
}

impl DemographicRecord {
    pub fn count(&self, category: &str) -> f64 {
        self.counts.get(category).copied().unwrap_or(0.0)
    }
}

/// A (category, count) pair produced by ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub category: String,
    pub count: f64,
}

/// One census polygon joined with its demographic record.
#[derive(Debug, Clone)]
pub struct BlockGroup {
    pub id: String,
    pub geometry: MultiPolygon<f64>,
    pub record: DemographicRecord,
}
