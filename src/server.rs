use crate::config::{AppConfig, ViewConfig};
use crate::orchestrator::MapOrchestrator;
use crate::source::StatisticsSource;
use crate::types::{FrequencyMode, Selection};
use crate::view::{locate, ViewTarget};
use anyhow::{Context, Result};
use geojson::FeatureCollection;
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub struct AppState<S> {
    pub orchestrator: MapOrchestrator<S>,
    pub view: ViewConfig,
}

#[derive(Deserialize)]
pub struct RenderParams {
    profession: Option<String>,
    #[serde(default)]
    mode: FrequencyMode,
}

#[derive(Deserialize)]
pub struct LocateParams {
    q: String,
}

pub fn router<S>(state: Arc<AppState<S>>, static_dir: &std::path::Path) -> Router
where
    S: StatisticsSource + 'static,
{
    Router::new()
        .route("/api/render", get(render_handler::<S>))
        .route("/api/layer", get(layer_handler::<S>))
        .route("/api/locate", get(locate_handler::<S>))
        .route("/api/view", get(view_handler::<S>))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server<S>(config: AppConfig, orchestrator: MapOrchestrator<S>) -> Result<()>
where
    S: StatisticsSource + 'static,
{
    let state = Arc::new(AppState {
        orchestrator,
        view: config.view.clone(),
    });

    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    tracing::info!(%addr, "starting server");

    let app = router(state, &config.server.static_dir);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Runs an update for the requested selection. When a newer request has
/// already superseded this one, the layer published by that request is
/// returned instead.
async fn render_handler<S: StatisticsSource>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<RenderParams>,
) -> Json<FeatureCollection> {
    let selection = Selection {
        profession: params.profession,
        region_codes: Vec::new(),
        frequency_mode: params.mode,
    };
    let layer = match state.orchestrator.update(&selection).await {
        Some(layer) => layer,
        None => state.orchestrator.current(),
    };
    Json(layer.to_feature_collection())
}

async fn layer_handler<S: StatisticsSource>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<FeatureCollection> {
    Json(state.orchestrator.current().to_feature_collection())
}

async fn locate_handler<S: StatisticsSource>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<LocateParams>,
) -> Json<Option<ViewTarget>> {
    Json(locate(state.orchestrator.geometry(), &params.q))
}

async fn view_handler<S: StatisticsSource>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<ViewConfig> {
    Json(state.view.clone())
}
