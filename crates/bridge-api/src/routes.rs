use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bridge_model::Protocol;
use chrono::Utc;
use prometheus::TextEncoder;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::auth::extract_api_key;
use crate::params::{parse_priority, parse_protocol};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/alert/send", post(send_alert))
        .route("/alert/acknowledge", post(acknowledge_alert))
        .route("/alerts/active", get(active_alerts))
        .route("/alerts/escalated", get(escalated_alerts))
        .route("/alert/:id", get(get_alert))
        .route("/message/send", post(send_message))
        .route("/status", get(status))
        .route("/stats", get(stats))
        .route("/nodes", get(nodes))
        .route("/nodes/connected", get(connected_nodes))
        .route("/node/:id", get(get_node))
        .route("/queue/status", get(queue_status))
        .route("/queue/retry-failed", post(retry_failed))
        .route("/isp/status", get(isp_status))
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .with_state(state)
}

fn unauthorised(state: &AppState, headers: &HeaderMap, scope: &str) -> Option<Response> {
    let api_key = extract_api_key(headers);
    if state.authoriser.authorise(api_key.as_deref(), scope) {
        None
    } else {
        Some(StatusCode::UNAUTHORIZED.into_response())
    }
}

#[derive(Debug, Deserialize)]
struct SendAlertRequest {
    title: String,
    message: String,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default = "default_source")]
    source: String,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    target_nodes: Vec<String>,
    #[serde(default)]
    metadata: serde_json::Value,
}

fn default_source() -> String {
    "api".to_string()
}

fn default_category() -> String {
    "general".to_string()
}

#[derive(Debug, Serialize)]
struct SendAlertResponse {
    alert_id: Uuid,
    status: &'static str,
}

async fn send_alert(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SendAlertRequest>,
) -> Response {
    if let Some(resp) = unauthorised(&state, &headers, "alert") {
        return resp;
    }
    let priority = match req.priority.as_deref() {
        Some(raw) => match parse_priority(raw) {
            Some(p) => p,
            None => return bad_request(&format!("unknown priority: {raw}")),
        },
        None => bridge_model::AlertPriority::default(),
    };
    let id = state.alerts.send_alert(
        req.title,
        req.message,
        priority,
        req.source,
        req.category,
        req.target_nodes,
        req.metadata,
    );
    Json(SendAlertResponse { alert_id: id, status: "queued" }).into_response()
}

#[derive(Debug, Deserialize)]
struct AcknowledgeRequest {
    alert_id: Uuid,
    #[serde(default = "default_unknown")]
    acknowledged_by: String,
}

fn default_unknown() -> String {
    "unknown".to_string()
}

#[derive(Debug, Serialize)]
struct AcknowledgeResponse {
    acknowledged: bool,
}

async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<AcknowledgeRequest>,
) -> Response {
    if let Some(resp) = unauthorised(&state, &headers, "alert") {
        return resp;
    }
    let acknowledged = state.alerts.acknowledge_alert(req.alert_id, req.acknowledged_by);
    Json(AcknowledgeResponse { acknowledged }).into_response()
}

async fn active_alerts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.alerts.active_alerts())
}

async fn escalated_alerts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.alerts.escalated_alerts())
}

async fn get_alert(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match state.alerts.alert(id) {
        Some(alert) => Json(alert).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    message: String,
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    protocol: String,
}

#[derive(Debug, Serialize)]
struct SendMessageResponse {
    sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Response {
    if let Some(resp) = unauthorised(&state, &headers, "message") {
        return resp;
    }
    let priority = match req.priority.as_deref() {
        Some(raw) => match parse_priority(raw) {
            Some(p) => p,
            None => return bad_request(&format!("unknown priority: {raw}")),
        },
        None => bridge_model::AlertPriority::default(),
    };
    let protocol = match parse_protocol(&req.protocol) {
        Some(p) => p,
        None => return bad_request(&format!("unknown protocol: {}", req.protocol)),
    };
    if matches!(protocol, Protocol::Secure | Protocol::Both) && req.destination.is_none() {
        return Json(SendMessageResponse {
            sent: false,
            message_id: None,
            error: Some("secure routing requires a destination".to_string()),
        })
        .into_response();
    }

    let id = state.queue.enqueue(req.message, req.destination, priority, protocol, serde_json::json!({}));
    Json(SendMessageResponse { sent: true, message_id: Some(id), error: None }).into_response()
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    mesh_connected: bool,
    secure_connected: bool,
    isp_online: bool,
    timestamp: chrono::DateTime<Utc>,
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    use bridge_transport::Transport;
    Json(StatusResponse {
        mesh_connected: state.mesh.is_connected(),
        secure_connected: state.secure.is_connected(),
        isp_online: state.connectivity.status().is_online,
        timestamp: Utc::now(),
    })
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    alerts: bridge_alerts::AlertStats,
    queue: bridge_queue::QueueStatus,
    mesh: bridge_transport::TransportCounterSnapshot,
    secure: bridge_transport::TransportCounterSnapshot,
    relay: bridge_relay::RelayStats,
    isp: bridge_model::ConnectivityState,
}

async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    use bridge_transport::Transport;
    Json(StatsResponse {
        alerts: state.alerts.stats(),
        queue: state.queue.status(),
        mesh: state.mesh.stats(),
        secure: state.secure.stats(),
        relay: state.relay.stats(),
        isp: state.connectivity.status(),
    })
}

async fn nodes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.mesh.nodes())
}

async fn connected_nodes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.mesh.connected_nodes())
}

async fn get_node(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.mesh.node(&id) {
        Some(node) => Json(node).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn queue_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.queue.status())
}

#[derive(Debug, Serialize)]
struct RetryResponse {
    retried: usize,
}

async fn retry_failed(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(resp) = unauthorised(&state, &headers, "queue") {
        return resp;
    }
    let retried = state.queue.retry_all_failed();
    Json(RetryResponse { retried }).into_response()
}

async fn isp_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.connectivity.status())
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let families = state.registry.gather();
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&families) {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(err) => {
            warn!(error = %err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": message}))).into_response()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bridge_alerts::AlertManager;
    use bridge_common::config::{AlertConfig, MeshConfig, QueueConfig, SecureConfig};
    use bridge_connectivity::ConnectivityMonitor;
    use bridge_mesh::MeshSupervisor;
    use bridge_queue::DurableQueue;
    use bridge_relay::MessageRelay;
    use bridge_secure::SecureSupervisor;
    use reqwest::StatusCode as ReqStatus;
    use serde_json::json;

    use super::*;
    use crate::auth::StaticApiKeyAuthoriser;

    async fn test_state(authoriser: StaticApiKeyAuthoriser) -> (Arc<AppState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let queue = DurableQueue::new(
            QueueConfig {
                max_queue_size: 100,
                batch_size: 10,
                flush_interval: Duration::from_millis(20),
                persistence_path: dir.path().to_string_lossy().to_string(),
            },
            3,
        );
        let mesh = MeshSupervisor::new(MeshConfig {
            device_path: "/dev/null".to_string(),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 1,
            reconnect_backoff_multiplier: 1.0,
            message_timeout: Duration::from_secs(5),
        });
        let secure = SecureSupervisor::new(SecureConfig {
            identity_path: None,
            storage_path: dir.path().join("secure").to_string_lossy().to_string(),
            announce_interval: Duration::from_secs(300),
        })
        .unwrap();
        let connectivity = ConnectivityMonitor::new(&AlertConfig {
            escalation_timeout: Duration::from_secs(300),
            max_retries: 3,
            isp_check_interval: Duration::from_secs(60),
            isp_check_hosts: vec!["8.8.8.8".to_string()],
        });
        let relay = Arc::new(MessageRelay::new(mesh.clone(), secure.clone()));
        let alerts = AlertManager::new(queue.clone(), connectivity.clone());
        let registry = bridge_metrics::new_registry();

        let state = Arc::new(AppState {
            queue,
            mesh,
            secure,
            connectivity,
            relay,
            alerts,
            registry,
            authoriser,
            ready: Arc::new(std::sync::atomic::AtomicBool::new(true)),
        });
        (state, dir)
    }

    #[tokio::test]
    async fn alert_round_trip_through_http() {
        let (state, _dir) = test_state(StaticApiKeyAuthoriser::default()).await;
        let app = router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let base = format!("http://{addr}");
        let client = reqwest::Client::new();

        let sent: serde_json::Value = client
            .post(format!("{base}/alert/send"))
            .json(&json!({
                "title": "disk full",
                "message": "disk usage at 95%",
                "priority": "critical",
                "source": "monitoring",
                "category": "storage",
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let alert_id = sent["alert_id"].as_str().unwrap().to_string();

        let active: Vec<serde_json::Value> = client
            .get(format!("{base}/alerts/active"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(active.len(), 1);

        let ack: serde_json::Value = client
            .post(format!("{base}/alert/acknowledge"))
            .json(&json!({"alert_id": alert_id, "acknowledged_by": "operator"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(ack["acknowledged"], true);

        let active_after: Vec<serde_json::Value> = client
            .get(format!("{base}/alerts/active"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(active_after.is_empty());
    }

    #[tokio::test]
    async fn unknown_priority_is_rejected() {
        let (state, _dir) = test_state(StaticApiKeyAuthoriser::default()).await;
        let app = router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let base = format!("http://{addr}");
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/alert/send"))
            .json(&json!({
                "title": "x",
                "message": "y",
                "priority": "urgent",
                "source": "monitoring",
                "category": "storage",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), ReqStatus::BAD_REQUEST);
    }

    #[tokio::test]
    async fn scoped_key_rejects_unauthorised_requests() {
        let authoriser =
            StaticApiKeyAuthoriser::new([("secret".to_string(), vec!["alert".to_string()])]);
        let (state, _dir) = test_state(authoriser).await;
        let app = router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let base = format!("http://{addr}");
        let client = reqwest::Client::new();

        let forbidden = client
            .post(format!("{base}/alert/send"))
            .json(&json!({"title": "x", "message": "y"}))
            .send()
            .await
            .unwrap();
        assert_eq!(forbidden.status(), ReqStatus::UNAUTHORIZED);

        let allowed = client
            .post(format!("{base}/alert/send"))
            .header("x-api-key", "secret")
            .json(&json!({"title": "x", "message": "y"}))
            .send()
            .await
            .unwrap();
        assert_eq!(allowed.status(), ReqStatus::OK);
    }
}
