//! HTTP adapter over the core operations.
//!
//! A thin binding: every route calls one service operation and maps the
//! error taxonomy onto status codes. The core never depends on anything
//! in here.

use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::info;

use crate::{
    actions::GameService,
    error::GameError,
    grid::Coord,
    model::{BuildingId, CompanyId, MapId, TileId},
    store::{MemoryStore, Store},
};

pub struct WebServerConfig {
    pub host: String,
    pub port: u16,
}

struct AppState {
    service: Arc<GameService<MemoryStore>>,
}

pub async fn run(config: WebServerConfig, service: Arc<GameService<MemoryStore>>) -> Result<()> {
    let state = Arc::new(AppState { service });

    let router = Router::new()
        .route("/api/maps", get(list_maps))
        .route("/api/maps/:id/recompute", post(recompute))
        .route("/api/maps/:id/accrue", post(accrue))
        .route("/api/companies/:id/level", get(level_status))
        .route("/api/companies/:id/buy-land", post(buy_land))
        .route("/api/companies/:id/build", post(build))
        .route("/api/companies/:id/demolish", post(demolish))
        .route("/api/companies/:id/pay-fine", post(pay_fine))
        .route("/api/preview/:tile/:kind", get(preview))
        .route("/api/events", get(stream_events))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid address: {e}"))?;

    info!("magnate API listening on http://{addr}");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}

struct ApiError(GameError);

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GameError::Validation(_) => StatusCode::BAD_REQUEST,
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::Conflict(_) => StatusCode::CONFLICT,
            GameError::Precondition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GameError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn list_maps(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let maps = state
        .service
        .store()
        .load_maps()
        .await
        .map_err(GameError::from)?;
    Ok(Json(maps))
}

async fn recompute(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let count = state.service.recompute(MapId::new(id)).await?;
    Ok(Json(json!({ "count": count })))
}

async fn accrue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let total = state.service.accrue_income(MapId::new(id)).await?;
    Ok(Json(json!({ "total": total })))
}

async fn level_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state.service.level_status(CompanyId::new(id)).await?;
    Ok(Json(status))
}

#[derive(Deserialize)]
struct BuyLandRequest {
    x: i32,
    y: i32,
}

async fn buy_land(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(req): Json<BuyLandRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state
        .service
        .buy_land(CompanyId::new(id), Coord::new(req.x, req.y))
        .await?;
    Ok(Json(receipt))
}

#[derive(Deserialize)]
struct BuildRequest {
    tile: u64,
    kind: String,
}

async fn build(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(req): Json<BuildRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state
        .service
        .build(CompanyId::new(id), TileId::new(req.tile), &req.kind)
        .await?;
    Ok(Json(receipt))
}

#[derive(Deserialize)]
struct DemolishRequest {
    building: u64,
}

async fn demolish(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(req): Json<DemolishRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .service
        .demolish(CompanyId::new(id), BuildingId::new(req.building))
        .await?;
    Ok(Json(json!({ "ok": true })))
}

async fn pay_fine(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state.service.pay_fine(CompanyId::new(id)).await?;
    Ok(Json(receipt))
}

async fn preview(
    State(state): State<Arc<AppState>>,
    Path((tile, kind)): Path<(u64, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let quote = state
        .service
        .preview_profit(TileId::new(tile), &kind)
        .await?;
    Ok(Json(quote))
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.service.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(entry) => serde_json::to_string(&entry)
            .ok()
            .map(|payload| Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}
