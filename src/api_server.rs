use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use anyhow::{anyhow, Result};
use chrono::Local;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::error::ScheduleError;
use crate::event::{Event, EventSet};
use crate::scheduler::Scheduler;
use crate::time_format;

// API state shared across handlers. The mutex serializes every writer to the
// event set, so requests apply start-to-finish.
pub struct ApiState {
    pub scheduler: Scheduler,
    pub events: Mutex<EventSet>,
}

/// Inbound scheduling request. Older clients send `message` instead of
/// `prompt`; both are accepted.
#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub prompt: Option<String>,
    pub message: Option<String>,
}

impl ScheduleRequest {
    fn text(&self) -> Option<&str> {
        self.prompt.as_deref().or(self.message.as_deref()).map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Wire form of an event: the date as YYYY-MM-DD and both times in the
/// 12-hour labeled format the calendar widget renders.
#[derive(Debug, Serialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub name: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

impl TaskRecord {
    fn from_event(event: &Event) -> Self {
        Self {
            id: event.id,
            name: event.title.clone(),
            date: event.date.format("%Y-%m-%d").to_string(),
            start_time: time_format::format_12_hour(event.start),
            end_time: time_format::format_12_hour(event.end),
        }
    }
}

#[derive(Serialize)]
pub struct ScheduleResponse {
    pub success: bool,
    pub message: String,
    pub events: Vec<TaskRecord>,
    pub evicted: Vec<TaskRecord>,
    pub rejected: Vec<TaskRecord>,
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub success: bool,
    pub events: Vec<TaskRecord>,
}

// General API response
#[derive(Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

// Process a scheduling request
async fn schedule_handler(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<ScheduleResponse>, (StatusCode, Json<ApiResponse>)> {
    let text = request.text().ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse {
                success: false,
                message: "Request must carry a non-empty 'prompt' or 'message'".to_string(),
            }),
        )
    })?;

    info!("Received scheduling request: {}", text);

    let reference_now = Local::now().naive_local();
    let mut events = state.events.lock().await;
    match state.scheduler.schedule(text, reference_now, &mut events).await {
        Ok(outcome) => {
            let message = if outcome.used_fallback {
                "Scheduled via rule-based extraction".to_string()
            } else {
                "Scheduled".to_string()
            };
            Ok(Json(ScheduleResponse {
                success: true,
                message,
                events: outcome.scheduled.iter().map(TaskRecord::from_event).collect(),
                evicted: outcome.evicted.iter().map(TaskRecord::from_event).collect(),
                rejected: outcome.rejected.iter().map(TaskRecord::from_event).collect(),
            }))
        }
        Err(err) => Err(error_response(err)),
    }
}

fn error_response(err: ScheduleError) -> (StatusCode, Json<ApiResponse>) {
    match err {
        ScheduleError::Extraction(_) | ScheduleError::TimeFormat(_) => {
            info!("Request not understood: {}", err);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiResponse {
                    success: false,
                    message: "Couldn't schedule that — please rephrase".to_string(),
                }),
            )
        }
        ScheduleError::Upstream(_) => {
            error!("Unrecovered upstream failure: {}", err);
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiResponse { success: false, message: format!("Provider failure: {}", err) }),
            )
        }
    }
}

// List the current event set
async fn list_events_handler(State(state): State<Arc<ApiState>>) -> Json<EventsResponse> {
    let events = state.events.lock().await;
    Json(EventsResponse {
        success: true,
        events: events.iter().map(TaskRecord::from_event).collect(),
    })
}

// Cancel an event by id
async fn cancel_event_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse>, (StatusCode, Json<ApiResponse>)> {
    let mut events = state.events.lock().await;
    match events.remove(id) {
        Some(event) => {
            info!("Cancelled event '{}' ({})", event.title, event.id);
            Ok(Json(ApiResponse {
                success: true,
                message: format!("Cancelled \"{}\"", event.title),
            }))
        }
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ApiResponse { success: false, message: format!("No event with id {}", id) }),
        )),
    }
}

// Health check endpoint
async fn health_check() -> &'static str {
    "planchat API is running"
}

/// Build the router so tests can drive handlers without binding a socket.
pub fn build_router(state: Arc<ApiState>) -> Router {
    // Configure CORS for the browser front-end
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/schedule", post(schedule_handler))
        .route("/events", get(list_events_handler))
        .route("/events/{id}", delete(cancel_event_handler))
        .layer(cors)
        .with_state(state)
}

// Create and start the API server
pub async fn start_api_server(state: Arc<ApiState>, port: u16) -> Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("API server starting on http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow!("Failed to bind to address: {}", e))?;

    info!("API server successfully bound to {}. Waiting for connections...", addr);

    axum::serve(listener, app).await.map_err(|e| anyhow!("Failed to start API server: {}", e))?;

    Ok(())
}
