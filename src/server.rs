//! HTTP and WebSocket transport for frame analysis.
//!
//! This module provides a server that:
//! - Accepts per-frame perceptual reports over a WebSocket per interview
//! - Answers every frame with the (possibly empty) list of raised events
//! - Forwards non-empty batches to the recording backend in the background
//!
//! # Architecture
//!
//! ```text
//! Candidate client ──→ WS /stream/{id} ──→ proctor-agent ──→ recording backend
//!                                               ↓
//!                                      [Session engine]
//! ```

use crate::audit::{create_shared_log, create_shared_log_with_persistence, SharedAuditLog};
use crate::config::DetectionConfig;
use crate::core::{ProctorEngine, ProctorEvent, SessionStats};
use crate::perception::FrameReport;
use crate::recorder::{RecorderClient, RecorderConfig};
use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: IpAddr,
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Detector thresholds
    pub detection: DetectionConfig,
    /// Recording backend, or `None` to keep events local
    pub recorder: Option<RecorderConfig>,
    /// Where audit counters are persisted on shutdown
    pub audit_path: Option<PathBuf>,
}

impl ServerConfig {
    /// Create a new server configuration on localhost with default thresholds
    pub fn new(port: u16, recorder: Option<RecorderConfig>) -> Self {
        Self {
            bind_address: IpAddr::from([127, 0, 0, 1]),
            port,
            detection: DetectionConfig::default(),
            recorder,
            audit_path: None,
        }
    }
}

/// Shared server state
pub struct ServerState {
    engine: ProctorEngine,
    recorder: Option<RecorderClient>,
    audit: SharedAuditLog,
}

impl ServerState {
    /// Create new server state
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let recorder = match &config.recorder {
            Some(recorder_config) => Some(RecorderClient::new(recorder_config.clone())?),
            None => None,
        };
        let audit = match &config.audit_path {
            Some(path) => create_shared_log_with_persistence(path.clone()),
            None => create_shared_log(),
        };

        Ok(Self {
            engine: ProctorEngine::new(config.detection.clone()),
            recorder,
            audit,
        })
    }

    /// Run the engine on one frame and hand the events to the recorder.
    fn analyze(
        &self,
        interview_id: &str,
        report: &FrameReport,
        at: DateTime<Utc>,
    ) -> Vec<ProctorEvent> {
        let events = self.engine.analyze_report(interview_id, report, at);
        self.audit.record_frame(&events);
        self.forward(interview_id, &events);
        events
    }

    /// Deliver a batch in the background; delivery never blocks the caller.
    fn forward(&self, interview_id: &str, events: &[ProctorEvent]) {
        let Some(recorder) = self.recorder.clone() else {
            return;
        };
        if events.is_empty() {
            return;
        }

        let interview_id = interview_id.to_string();
        let events = events.to_vec();
        let audit = self.audit.clone();
        tokio::spawn(async move {
            let report = recorder.deliver(&interview_id, &events).await;
            audit.record_deliveries(report.delivered, report.failed);
        });
    }

    /// Open a session. Its timers start at its first frame, on whatever
    /// clock the client stamps frames with.
    fn start_session(&self, interview_id: &str) {
        self.engine.open_session(interview_id);
        self.audit.record_session_started();
    }

    fn end_session(&self, interview_id: &str) -> bool {
        let removed = self.engine.end_session(interview_id);
        if removed {
            self.audit.record_session_ended();
        }
        removed
    }
}

/// One frame on the stream
#[derive(Debug, Clone, Deserialize)]
pub struct FrameMessage {
    #[serde(flatten)]
    pub report: FrameReport,
    /// Capture time in Unix seconds; defaults to arrival time
    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// Request body of POST /analyze_frame
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub interview_id: String,
    #[serde(flatten)]
    pub report: FrameReport,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// Response from analyze endpoint
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub events: Vec<ProctorEvent>,
    pub timestamp: f64,
}

/// Reply to every frame received on the stream
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamReply {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub events: Vec<ProctorEvent>,
    pub timestamp: f64,
    pub frame_processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Health check response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_sessions: usize,
}

/// Session lifecycle response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub interview_id: String,
    pub active: bool,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: String) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error,
            code: code.to_string(),
        }),
    )
}

/// Resolve a caller-supplied Unix timestamp, falling back to now.
fn frame_time(timestamp: Option<f64>) -> DateTime<Utc> {
    timestamp
        .filter(|secs| secs.is_finite())
        .and_then(|secs| DateTime::<Utc>::from_timestamp_millis((secs * 1000.0).round() as i64))
        .unwrap_or_else(Utc::now)
}

fn unix_seconds(at: DateTime<Utc>) -> f64 {
    crate::core::event::unix_seconds::to_f64(&at)
}

/// GET /health
async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_sessions: state.engine.sessions().len(),
    })
}

/// POST /sessions/{id}
async fn start_session(
    State(state): State<Arc<ServerState>>,
    Path(interview_id): Path<String>,
) -> Json<SessionResponse> {
    state.start_session(&interview_id);
    Json(SessionResponse {
        interview_id,
        active: true,
    })
}

/// DELETE /sessions/{id}
async fn end_session(
    State(state): State<Arc<ServerState>>,
    Path(interview_id): Path<String>,
) -> Json<SessionResponse> {
    state.end_session(&interview_id);
    Json(SessionResponse {
        interview_id,
        active: false,
    })
}

/// GET /sessions/{id}/stats
async fn session_stats(
    State(state): State<Arc<ServerState>>,
    Path(interview_id): Path<String>,
) -> Result<Json<SessionStats>, ApiError> {
    state
        .engine
        .session_stats(&interview_id)
        .map(Json)
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                "UNKNOWN_SESSION",
                format!("No active session for interview {interview_id}"),
            )
        })
}

/// POST /analyze_frame
///
/// Analyzes one frame's perceptual report for the given interview.
async fn analyze_frame(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_FRAME",
            format!("Invalid frame data: {}", e.body_text()),
        )
    })?;

    if request.interview_id.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "MISSING_INTERVIEW_ID",
            "interviewId must not be empty".to_string(),
        ));
    }

    let at = frame_time(request.timestamp);
    let events = state.analyze(&request.interview_id, &request.report, at);

    Ok(Json(AnalyzeResponse {
        success: true,
        events,
        timestamp: unix_seconds(at),
    }))
}

/// GET /stream/{id}
async fn stream(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
    Path(interview_id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| handle_stream(socket, interview_id, state))
}

/// Drive one interview's stream. Frames are handled strictly in order.
async fn handle_stream(mut socket: WebSocket, interview_id: String, state: Arc<ServerState>) {
    state.start_session(&interview_id);

    while let Some(message) = socket.recv().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(interview_id = %interview_id, "Stream receive error: {}", e);
                break;
            }
        };

        let reply = match serde_json::from_str::<FrameMessage>(&text) {
            Ok(frame) => {
                let at = frame_time(frame.timestamp);
                let events = state.analyze(&interview_id, &frame.report, at);
                StreamReply {
                    kind: "events",
                    events,
                    timestamp: unix_seconds(at),
                    frame_processed: true,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(interview_id = %interview_id, "Malformed frame: {}", e);
                StreamReply {
                    kind: "events",
                    events: Vec::new(),
                    timestamp: unix_seconds(Utc::now()),
                    frame_processed: false,
                    error: Some(e.to_string()),
                }
            }
        };

        let payload = match serde_json::to_string(&reply) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to serialize stream reply: {}", e);
                continue;
            }
        };

        if socket.send(Message::Text(payload)).await.is_err() {
            break;
        }
    }

    tracing::info!(interview_id = %interview_id, "Stream closed");
    state.end_session(&interview_id);
}

/// Build the router over shared state.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analyze_frame", post(analyze_frame))
        .route("/sessions/:interview_id", post(start_session).delete(end_session))
        .route("/sessions/:interview_id/stats", get(session_stats))
        .route("/stream/:interview_id", get(stream))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config)?);

    if let Some(ref recorder) = state.recorder {
        match recorder.test_connection().await {
            Ok(true) => tracing::info!(
                agent_id = recorder.agent_id(),
                "Recording backend reachable at {}",
                recorder.config().base_url
            ),
            Ok(false) => tracing::warn!("Recording backend health check failed"),
            Err(e) => tracing::warn!("Could not reach recording backend: {}", e),
        }
    }

    let app = router(state.clone());

    let addr = SocketAddr::new(config.bind_address, config.port);
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Proctoring agent listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }

        if let Err(e) = state.audit.save() {
            tracing::warn!("Failed to save audit log: {}", e);
        }
        tracing::info!("{}", state.audit.summary());
    });

    Ok((actual_addr, shutdown_tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EventKind, EventMetadata};

    fn local_state() -> ServerState {
        ServerState::new(&ServerConfig::new(0, None)).unwrap()
    }

    fn missing_for(event: &ProctorEvent) -> f64 {
        match event.metadata {
            EventMetadata::Duration { duration } => duration,
            ref other => panic!("unexpected metadata {other:?}"),
        }
    }

    #[test]
    fn test_client_clock_ahead_of_server() {
        let state = local_state();
        state.start_session("iv-ahead");
        let ahead = unix_seconds(Utc::now()) + 15.0;

        let empty = FrameReport::default();
        assert!(state.analyze("iv-ahead", &empty, frame_time(Some(ahead))).is_empty());
        assert!(state
            .analyze("iv-ahead", &empty, frame_time(Some(ahead + 9.0)))
            .is_empty());

        let events = state.analyze("iv-ahead", &empty, frame_time(Some(ahead + 10.5)));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventKind::FaceMissing);
        assert!((missing_for(&events[0]) - 10.5).abs() < 0.01);
    }

    #[test]
    fn test_client_clock_behind_server() {
        let state = local_state();
        state.start_session("iv-behind");
        let behind = unix_seconds(Utc::now()) - 60.0;

        let mut missing = Vec::new();
        for step in 0..=30 {
            let at = frame_time(Some(behind + step as f64));
            missing.extend(state.analyze("iv-behind", &FrameReport::default(), at));
        }

        assert!(!missing.is_empty());
        assert!(missing.iter().all(|e| e.event_type == EventKind::FaceMissing));
        assert_eq!(missing[0].timestamp, frame_time(Some(behind + 11.0)));
        assert!((missing_for(&missing[0]) - 11.0).abs() < 0.01);
    }

    #[test]
    fn test_stats_follow_frame_clock() {
        let state = local_state();
        state.start_session("iv-stats");
        let behind = unix_seconds(Utc::now()) - 300.0;

        let empty = FrameReport::default();
        state.analyze("iv-stats", &empty, frame_time(Some(behind)));
        state.analyze("iv-stats", &empty, frame_time(Some(behind + 4.0)));

        let stats = state.engine.session_stats("iv-stats").unwrap();
        assert!((stats.session_duration - 4.0).abs() < 0.01);
        assert!((stats.last_face_seen - 4.0).abs() < 0.01);
    }

    #[test]
    fn test_frame_time_uses_supplied_seconds() {
        let at = frame_time(Some(1_700_000_000.25));
        assert_eq!(at.timestamp_millis(), 1_700_000_000_250);
    }

    #[test]
    fn test_frame_time_ignores_garbage() {
        let before = Utc::now();
        let at = frame_time(Some(f64::NAN));
        assert!(at >= before);
    }

    #[test]
    fn test_frame_message_parses_flattened_report() {
        let frame: FrameMessage = serde_json::from_value(serde_json::json!({
            "faces": [{}, {}],
            "detections": [{"label": "book", "confidence": 0.4, "bounding_box": [0, 0, 5, 5]}],
            "timestamp": 12.5
        }))
        .unwrap();
        assert_eq!(frame.report.face_count(), 2);
        assert_eq!(frame.report.detections.len(), 1);
        assert_eq!(frame.timestamp, Some(12.5));
    }

    #[test]
    fn test_stream_reply_shape() {
        let reply = StreamReply {
            kind: "events",
            events: Vec::new(),
            timestamp: 1.0,
            frame_processed: true,
            error: None,
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "events");
        assert_eq!(json["frameProcessed"], true);
        assert!(json.get("error").is_none());
    }
}
