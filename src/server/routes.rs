//! HTTP routes
//!
//! | Method | Path          | Body          | Response                        |
//! |--------|---------------|---------------|---------------------------------|
//! | GET    | `/`           |               | liveness text                   |
//! | GET    | `/ws`         |               | WebSocket upgrade               |
//! | GET    | `/stats`      |               | pipeline and hub counters       |
//! | POST   | `/messages`   | `{room, key}` | room history, 403, 500          |
//! | POST   | `/rooms`      | `{key}`       | room, 403                       |
//! | POST   | `/createRoom` | `{name, key}` | room, 409, 500                  |

use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::error::Result;
use super::socket::handle_socket;
use super::state::AppState;
use crate::rooms::{ChatMessage, Room};
use crate::stats::{HubSnapshot, PipelineSnapshot};

/// Liveness response body
pub const LIVENESS_TEXT: &str = "Server is running...";

/// Build the router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/ws", get(upgrade))
        .route("/stats", get(stats))
        .route("/messages", post(messages))
        .route("/rooms", post(find_room))
        .route("/createRoom", post(create_room))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct HistoryRequest {
    pub room: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct FindRoomRequest {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub key: String,
}

/// `GET /stats` body
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub pipeline: PipelineSnapshot,
    pub hub: HubSnapshot,
}

async fn liveness() -> &'static str {
    LIVENESS_TEXT
}

async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        pipeline: state.stats.snapshot(),
        hub: state.hub.snapshot().await,
    })
}

async fn messages(
    State(state): State<AppState>,
    Json(req): Json<HistoryRequest>,
) -> Result<Json<Vec<ChatMessage>>> {
    let history = state.gateway.history(&req.room, &req.key).await?;
    Ok(Json(history))
}

async fn find_room(
    State(state): State<AppState>,
    Json(req): Json<FindRoomRequest>,
) -> Result<Json<Room>> {
    let room = state.gateway.find_room(&req.key).await?;
    Ok(Json(room))
}

async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<Json<Room>> {
    let room = state.gateway.create_room(&req.name, &req.key).await?;
    Ok(Json(room))
}
