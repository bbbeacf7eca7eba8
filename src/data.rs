use crate::config::{AppConfig, ClassificationConfig};
use crate::types::{BlockGroup, DemographicRecord};
use anyhow::{anyhow, Context, Result};
use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection, GeoJson};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;

/// Loads a GeoJSON FeatureCollection from a local path or an http(s) URL.
pub async fn load_feature_collection(source: &str) -> Result<FeatureCollection> {
    let text = if source.starts_with("http://") || source.starts_with("https://") {
        tracing::info!("Fetching {}", source);
        reqwest::get(source)
            .await
            .with_context(|| format!("Failed to fetch {}", source))?
            .error_for_status()
            .with_context(|| format!("Bad response from {}", source))?
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", source))?
    } else {
        fs::read_to_string(source)
            .with_context(|| format!("Failed to read GeoJSON file: {}", source))?
    };

    let geojson: GeoJson = text
        .parse()
        .with_context(|| format!("Failed to parse GeoJSON from {}", source))?;

    match geojson {
        GeoJson::FeatureCollection(fc) => Ok(fc),
        _ => Err(anyhow!("{} must be a FeatureCollection", source)),
    }
}

/// Joins polygon geometry with extracted demographic records. Features
/// without polygon geometry are skipped.
pub fn block_groups(fc: &FeatureCollection, config: &AppConfig) -> Vec<BlockGroup> {
    let mut areas = Vec::new();

    for (index, feature) in fc.features.iter().enumerate() {
        let geometry = match polygon_geometry(feature) {
            Some(mp) => mp,
            None => continue,
        };

        areas.push(BlockGroup {
            id: feature_id(feature, config.input.id_field.as_deref(), index),
            geometry,
            record: record_from_properties(feature.properties.as_ref(), &config.classification),
        });
    }

    tracing::info!("Joined {} of {} features as block groups", areas.len(), fc.features.len());
    areas
}

/// Extracts a demographic record from feature properties using the
/// configured field names.
///
/// Never fails: a missing or non-numeric total becomes `None`, and a missing
/// or non-numeric count becomes zero. Numeric strings are accepted since the
/// upstream data mixes number and string encodings.
pub fn record_from_properties(
    props: Option<&geojson::JsonObject>,
    cfg: &ClassificationConfig,
) -> DemographicRecord {
    let total = props.and_then(|p| numeric(p.get(&cfg.total_field)));

    let mut counts = HashMap::new();
    if let Some(p) = props {
        for cat in &cfg.categories {
            counts.insert(cat.field.clone(), numeric(p.get(&cat.field)).unwrap_or(0.0));
        }
    }

    DemographicRecord { total, counts }
}

fn numeric(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// The configured id property, or the feature index when it is missing.
pub fn feature_id(feature: &Feature, id_field: Option<&str>, index: usize) -> String {
    id_field
        .and_then(|f| feature.properties.as_ref().and_then(|p| p.get(f)))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| index.to_string())
}

fn polygon_geometry(feature: &Feature) -> Option<MultiPolygon<f64>> {
    let geometry = feature.geometry.as_ref()?;
    let geo: geo::Geometry<f64> = geometry.value.clone().try_into().ok()?;
    match geo {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        _ => None,
    }
}
