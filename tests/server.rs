//! HTTP surface, driven through the router without binding a socket.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use occupati_map::config::{InputConfig, ViewConfig};
use occupati_map::data::parse_geometry;
use occupati_map::server::{router, AppState};
use occupati_map::{ColorScale, MapOrchestrator, SimulatedSource, StatisticRecord};
use tower::ServiceExt;

const REGIONS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {"type": "Feature", "properties": {"reg_name": "Lazio", "reg_istat_code_num": 12},
         "geometry": {"type": "Polygon", "coordinates": [[[11.5,41.0],[14.0,41.0],[14.0,42.8],[11.5,42.8],[11.5,41.0]]]}},
        {"type": "Feature", "properties": {"reg_name": "Campania", "reg_istat_code_num": 15},
         "geometry": {"type": "Polygon", "coordinates": [[[13.8,40.0],[15.8,40.0],[15.8,41.5],[13.8,41.5],[13.8,40.0]]]}}
    ]
}"#;

fn app() -> axum::Router {
    let input = InputConfig {
        geojson: "unused".into(),
        region_code_property: "reg_istat_code_num".into(),
        region_name_property: "reg_name".into(),
        coordinates: None,
    };
    let geometry = parse_geometry(REGIONS, &input).unwrap();
    let source = SimulatedSource::from_dataset(HashMap::from([(
        "Medico".to_string(),
        vec![StatisticRecord::new("12", 30_000.0), StatisticRecord::new("15", 10_000.0)],
    )]));
    let state = Arc::new(AppState {
        orchestrator: MapOrchestrator::new(Arc::new(geometry), source, ColorScale::default()),
        view: ViewConfig::default(),
    });
    router(state, Path::new("."))
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn render_returns_coloured_feature_collection() {
    let (status, body) = get_json(app(), "/api/render?profession=Medico&mode=percentage").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "FeatureCollection");
    assert_eq!(body["status"]["kind"], "data");
    assert_eq!(body["frequency_mode"], "percentage");
    assert_eq!(body["features"][0]["properties"]["display_value"], 75.0);
    assert_eq!(body["features"][1]["properties"]["display_value"], 25.0);
    assert_eq!(
        body["features"][0]["properties"]["label"],
        "<b>Lazio</b><br>Occupati (Medico): 75%"
    );
}

#[tokio::test]
async fn render_without_profession_is_neutral() {
    let (status, body) = get_json(app(), "/api/render").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["kind"], "neutral");
    assert_eq!(body["features"][0]["properties"]["fill_color"], "#cccccc");
}

#[tokio::test]
async fn layer_reflects_last_render() {
    let app = app();
    let (_, initial) = get_json(app.clone(), "/api/layer").await;
    assert_eq!(initial["sequence"], 0);

    get_json(app.clone(), "/api/render?profession=Medico").await;
    let (_, layer) = get_json(app, "/api/layer").await;
    assert_eq!(layer["sequence"], 1);
    assert_eq!(layer["features"][0]["properties"]["display_value"], 30_000.0);
}

#[tokio::test]
async fn locate_and_view() {
    let (_, target) = get_json(app(), "/api/locate?q=campania").await;
    assert_eq!(target["code"], "15");
    assert_eq!(target["name"], "Campania");

    let (_, missing) = get_json(app(), "/api/locate?q=Narnia").await;
    assert!(missing.is_null());

    let (_, view) = get_json(app(), "/api/view").await;
    assert_eq!(view["zoom"], 6);
    assert_eq!(view["center"][0], 41.9);
}
