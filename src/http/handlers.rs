use super::state::{AppState, SpeakingSession};
use crate::content::{AppMode, FLASHCARD_TOPICS, PRACTICE_CHARACTERS};
use crate::session::BridgeStatus;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FlashcardRequest {
    pub topic: String,
}

#[derive(Debug, Deserialize)]
pub struct IllustrationRequest {
    pub word: String,
}

#[derive(Debug, Deserialize)]
pub struct HandwritingRequest {
    /// PNG as base64, optionally with a data-URL header
    pub image: String,
    /// Character the child tried to write
    pub target: String,
}

#[derive(Debug, Serialize)]
pub struct ModeInfo {
    pub mode: AppMode,
    pub title: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModesResponse {
    pub modes: Vec<ModeInfo>,
    pub topics: Vec<&'static str>,
    pub characters: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct StartSpeakingResponse {
    pub session_id: String,
    pub status: BridgeStatus,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> axum::response::Response {
    (status, Json(ErrorResponse { error })).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /modes
/// Learning modes plus the topic and character pickers
pub async fn list_modes() -> impl IntoResponse {
    let modes = AppMode::LEARNING
        .iter()
        .map(|&mode| ModeInfo {
            mode,
            title: mode.title(),
            description: mode.description(),
        })
        .collect();

    Json(ModesResponse {
        modes,
        topics: FLASHCARD_TOPICS.to_vec(),
        characters: PRACTICE_CHARACTERS.to_vec(),
    })
}

/// POST /speaking/start
/// Acquire audio devices and open a Live session
pub async fn start_speaking(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(response) = active_session_conflict(&state).await {
        return response;
    }

    let mut bridge = match state.create_bridge() {
        Ok(bridge) => bridge,
        Err(e) => {
            error!("Failed to create speaking session: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to create speaking session: {}", e),
            );
        }
    };

    // Devices and the session are acquired without holding the session lock
    if let Err(e) = bridge.connect().await {
        error!("Failed to start speaking session: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to start speaking session: {}", e),
        );
    }

    let mut speaking = state.speaking.lock().await;
    if speaking.as_ref().is_some_and(|session| session.is_active()) {
        bridge.disconnect().await;
        return conflict(speaking.as_ref().map(|s| s.snapshot().session_id));
    }

    let session_id = bridge.session_id().to_string();
    let status = bridge.status();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        bridge
            .run(async move {
                let _ = shutdown_rx.await;
            })
            .await;
    });

    let snapshot = status.borrow().clone();
    *speaking = Some(SpeakingSession {
        status,
        shutdown: Some(shutdown_tx),
        task: Some(task),
    });

    info!("Speaking session started: {}", session_id);

    (
        StatusCode::OK,
        Json(StartSpeakingResponse {
            session_id,
            status: snapshot,
        }),
    )
        .into_response()
}

async fn active_session_conflict(state: &AppState) -> Option<axum::response::Response> {
    let speaking = state.speaking.lock().await;
    match speaking.as_ref() {
        Some(session) if session.is_active() => Some(conflict(Some(session.snapshot().session_id))),
        _ => None,
    }
}

fn conflict(session_id: Option<String>) -> axum::response::Response {
    error_response(
        StatusCode::CONFLICT,
        format!(
            "Speaking session {} is already active",
            session_id.unwrap_or_default()
        ),
    )
}

/// POST /speaking/stop
/// Disconnect the speaking session
pub async fn stop_speaking(State(state): State<AppState>) -> impl IntoResponse {
    let mut speaking = state.speaking.lock().await;

    match speaking.as_mut() {
        Some(session) => {
            session.shutdown().await;
            let status = session.snapshot();
            info!("Speaking session stopped: {}", status.session_id);
            (StatusCode::OK, Json(status)).into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, "No speaking session".to_string()),
    }
}

/// GET /speaking/status
/// Status of the current or most recent speaking session
pub async fn speaking_status(State(state): State<AppState>) -> impl IntoResponse {
    let speaking = state.speaking.lock().await;

    match speaking.as_ref() {
        Some(session) => (StatusCode::OK, Json(session.snapshot())).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "No speaking session".to_string()),
    }
}

/// POST /reading/flashcard
/// Flashcard for a topic, with its illustration; `null` when generation fails
pub async fn generate_flashcard(
    State(state): State<AppState>,
    Json(req): Json<FlashcardRequest>,
) -> impl IntoResponse {
    Json(state.lessons.illustrated_flashcard(&req.topic).await)
}

/// POST /reading/illustration
/// `data:` URL for a word; `null` when generation fails
pub async fn generate_illustration(
    State(state): State<AppState>,
    Json(req): Json<IllustrationRequest>,
) -> impl IntoResponse {
    Json(state.lessons.generate_illustration(&req.word).await)
}

/// POST /listening/story
pub async fn generate_story(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.lessons.generate_story().await)
}

/// POST /writing/check
pub async fn check_handwriting(
    State(state): State<AppState>,
    Json(req): Json<HandwritingRequest>,
) -> impl IntoResponse {
    Json(state.lessons.check_handwriting(&req.image, &req.target).await)
}
