use crate::annotate::{self, LegendEntry};
use crate::classify::{classify, top_n};
use crate::config::AppConfig;
use crate::types::BlockGroup;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use geo::{BoundingRect, Contains, Point, Rect};
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

// Wrapper for RTree indexing
struct AreaIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for AreaIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

pub struct AppState {
    pub areas: Vec<BlockGroup>,
    pub tree: RTree<AreaIndex>,
    pub config: AppConfig,
}

#[derive(Deserialize)]
pub struct QueryParams {
    lat: f64,
    lon: f64,
}

/// What a popup needs for the polygon under the cursor. The caller keeps
/// track of which feature is selected via `id`.
#[derive(Debug, Serialize, PartialEq)]
pub struct QueryResponse {
    pub id: String,
    pub classification: String,
    pub color: String,
    pub top_categories: Vec<Value>,
}

pub async fn start_server(config: AppConfig, areas: Vec<BlockGroup>) -> Result<()> {
    tracing::info!("Building spatial index for {} areas", areas.len());
    let tree = build_index(&areas);

    let port = config.server.port;
    let output_dir = config.output.dir.clone();

    let state = Arc::new(AppState { areas, tree, config });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("Starting server on http://{}", addr);

    let app = Router::new()
        .route("/api/query", get(query_handler))
        .route("/api/legend", get(legend_handler))
        .nest_service("/", ServeDir::new(output_dir))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_index(areas: &[BlockGroup]) -> RTree<AreaIndex> {
    let items: Vec<AreaIndex> = areas
        .iter()
        .enumerate()
        .map(|(index, area)| {
            let rect = area.geometry.bounding_rect().unwrap_or(Rect::new(
                geo::Coord { x: 0.0, y: 0.0 },
                geo::Coord { x: 0.0, y: 0.0 },
            ));
            AreaIndex {
                index,
                aabb: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            }
        })
        .collect();

    RTree::bulk_load(items)
}

/// Classification and ranking for the polygon containing the point, computed
/// on demand from the area's record.
fn lookup(state: &AppState, lat: f64, lon: f64) -> Option<QueryResponse> {
    let point = Point::new(lon, lat);
    let envelope = AABB::from_point([lon, lat]);
    let cls = &state.config.classification;

    for candidate in state.tree.locate_in_envelope_intersecting(&envelope) {
        let area = match state.areas.get(candidate.index) {
            Some(area) => area,
            None => continue,
        };
        if !area.geometry.contains(&point) {
            continue;
        }

        let class = classify(&area.record, cls.compare_keys());
        let ranked = top_n(&area.record, &cls.rank_keys(), cls.top_n);
        let top_categories = ranked
            .iter()
            .map(|entry| {
                let label = cls
                    .category(&entry.category)
                    .map(|c| c.label.as_str())
                    .unwrap_or(entry.category.as_str());
                serde_json::json!({ "category": entry.category, "label": label, "count": entry.count })
            })
            .collect();

        return Some(QueryResponse {
            id: area.id.clone(),
            classification: annotate::class_label(cls, &class),
            color: annotate::fill_color(cls, &class).to_string(),
            top_categories,
        });
    }

    None
}

async fn query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Json<Option<QueryResponse>> {
    Json(lookup(&state, params.lat, params.lon))
}

async fn legend_handler(State(state): State<Arc<AppState>>) -> Json<Vec<LegendEntry>> {
    Json(annotate::legend(&state.config.classification))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CategoryConfig, ClassificationConfig, InputConfig, OutputConfig, ServerConfig,
    };
    use crate::types::DemographicRecord;
    use geo::{polygon, MultiPolygon};

    fn state() -> AppState {
        let config = AppConfig {
            input: InputConfig {
                demographics: "unused".into(),
                facilities: vec![],
                id_field: None,
            },
            classification: ClassificationConfig {
                total_field: "B03002_001".to_string(),
                compare: vec!["White".into(), "AA".into(), "Hispanic".into()],
                top_n: 3,
                no_data_color: "#808080".to_string(),
                no_majority_color: "#808080".to_string(),
                categories: vec![
                    CategoryConfig { field: "White".into(), label: "White".into(), color: "#32127A".into() },
                    CategoryConfig { field: "AA".into(), label: "Black".into(), color: "#FA8072".into() },
                    CategoryConfig { field: "Hispanic".into(), label: "Hispanic".into(), color: "#800080".into() },
                ],
            },
            output: OutputConfig { dir: "out".into() },
            server: ServerConfig { port: 0 },
        };

        let unit_square = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ];

        let areas = vec![BlockGroup {
            id: "26163501100".to_string(),
            geometry: MultiPolygon::new(vec![unit_square]),
            record: DemographicRecord {
                total: Some(100.0),
                counts: [
                    ("White".to_string(), 10.0),
                    ("AA".to_string(), 50.0),
                    ("Hispanic".to_string(), 30.0),
                ]
                .into_iter()
                .collect(),
            },
        }];

        let tree = build_index(&areas);
        AppState { areas, tree, config }
    }

    #[test]
    fn point_inside_polygon_resolves() {
        let state = state();
        let response = lookup(&state, 0.5, 0.5).unwrap();
        assert_eq!(response.id, "26163501100");
        assert_eq!(response.classification, "Majority Black");
        assert_eq!(response.color, "#FA8072");
        assert_eq!(response.top_categories.len(), 3);
        assert_eq!(response.top_categories[0]["label"], "Black");
    }

    #[test]
    fn point_outside_every_polygon_is_none() {
        let state = state();
        assert!(lookup(&state, 5.0, 5.0).is_none());
    }
}
