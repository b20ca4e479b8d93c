use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use lanshare_shared::api::{
    CheckPermissionRequest, FileRegistered, LogTransferRequest, PermissionResponse,
    RegisterPeerRequest, ServiceStatus, StatusAck, UnregisterPeerRequest,
};
use lanshare_store::{NewFile, Peer, TransferHistoryItem};

use crate::config::ServerConfig;
use crate::directory::DirectoryService;
use crate::error::ServerError;

#[derive(Clone)]
pub struct AppState {
    pub directory: DirectoryService,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/api/status", get(status))
        .route("/api/register", post(register_peer))
        .route("/api/unregister", post(unregister_peer))
        .route("/api/peers", get(list_peers))
        .route("/api/peers/online", get(list_online_peers))
        .route("/api/peer/:name", get(get_peer))
        .route("/api/file/register", post(register_file))
        .route("/api/file/:id/check", post(check_permission))
        .route("/api/transfer/log", post(log_transfer))
        .route("/api/files/sent/:peer", get(sent_history))
        .route("/api/files/received/:peer", get(received_history))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct PeerList {
    peers: Vec<Peer>,
    count: usize,
}

#[derive(Serialize)]
struct History {
    peer: String,
    transfers: Vec<TransferHistoryItem>,
    count: usize,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn status(State(state): State<AppState>) -> Result<Json<ServiceStatus>, ServerError> {
    let (peers_total, peers_online) = state.directory.peer_counts().await?;
    Ok(Json(ServiceStatus {
        status: "running".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        peers_total,
        peers_online,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

// ---------------------------------------------------------------------------
// Peers
// ---------------------------------------------------------------------------

async fn register_peer(
    State(state): State<AppState>,
    payload: Result<Json<RegisterPeerRequest>, JsonRejection>,
) -> Result<Json<Peer>, ServerError> {
    let Json(req) = payload?;
    let peer = state
        .directory
        .register(req.name, req.address, req.port)
        .await?;
    Ok(Json(peer))
}

async fn unregister_peer(
    State(state): State<AppState>,
    payload: Result<Json<UnregisterPeerRequest>, JsonRejection>,
) -> Result<Json<StatusAck>, ServerError> {
    let Json(req) = payload?;
    state.directory.unregister(req.name).await?;
    Ok(Json(StatusAck::new("unregistered")))
}

async fn list_peers(State(state): State<AppState>) -> Result<Json<PeerList>, ServerError> {
    let peers = state.directory.list_peers(false).await?;
    Ok(Json(PeerList {
        count: peers.len(),
        peers,
    }))
}

async fn list_online_peers(State(state): State<AppState>) -> Result<Json<PeerList>, ServerError> {
    let peers = state.directory.list_peers(true).await?;
    Ok(Json(PeerList {
        count: peers.len(),
        peers,
    }))
}

async fn get_peer(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Peer>, ServerError> {
    state
        .directory
        .get_peer(name.clone())
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("peer {name}")))
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

async fn register_file(
    State(state): State<AppState>,
    payload: Result<Json<NewFile>, JsonRejection>,
) -> Result<Json<FileRegistered>, ServerError> {
    let Json(file) = payload?;
    let owner = file.owner.clone();
    let file_id = state.directory.register_file(file).await?;

    info!(file_id, owner = %owner, "File registered via API");

    Ok(Json(FileRegistered { file_id }))
}

async fn check_permission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<CheckPermissionRequest>, JsonRejection>,
) -> Result<Json<PermissionResponse>, ServerError> {
    let Json(req) = payload?;
    let allowed = state.directory.check_permission(id, req.peer_name).await?;
    Ok(Json(PermissionResponse { allowed }))
}

// ---------------------------------------------------------------------------
// Transfer log
// ---------------------------------------------------------------------------

async fn log_transfer(
    State(state): State<AppState>,
    payload: Result<Json<LogTransferRequest>, JsonRejection>,
) -> Result<Json<StatusAck>, ServerError> {
    let Json(req) = payload?;
    state
        .directory
        .log_transfer(req.file_id, req.from_peer, req.to_peer, req.outcome)
        .await?;
    Ok(Json(StatusAck::new("logged")))
}

async fn sent_history(
    State(state): State<AppState>,
    Path(peer): Path<String>,
) -> Result<Json<History>, ServerError> {
    let transfers = state.directory.sent_history(peer.clone()).await?;
    Ok(Json(History {
        peer,
        count: transfers.len(),
        transfers,
    }))
}

async fn received_history(
    State(state): State<AppState>,
    Path(peer): Path<String>,
) -> Result<Json<History>, ServerError> {
    let transfers = state.directory.received_history(peer.clone()).await?;
    Ok(Json(History {
        peer,
        count: transfers.len(),
        transfers,
    }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_on(state, listener).await
}

/// Serve on an already bound listener.
pub async fn serve_on(state: AppState, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %listener.local_addr()?, "Starting HTTP API server");

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use lanshare_store::Database;

    use super::*;

    fn app() -> Router {
        let config = ServerConfig {
            max_file_size: 1_000_000,
            ..Default::default()
        };
        build_router(AppState {
            directory: DirectoryService::new(Database::open_in_memory().unwrap(), config.max_file_size),
            config: Arc::new(config),
        })
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(app: &Router, name: &str, address: &str, port: u16) -> Value {
        let (status, body) = call(
            app,
            "POST",
            "/api/register",
            Some(json!({ "name": name, "address": address, "port": port })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_private_file_scenario() {
        let app = app();
        register(&app, "A", "10.0.0.1", 5001).await;
        register(&app, "B", "10.0.0.2", 5001).await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/file/register",
            Some(json!({
                "filename": "report.pdf",
                "size": 10_000,
                "checksum": "deadbeef",
                "owner": "A",
                "visibility": "private",
                "recipients": ["B"],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let id = body["file_id"].as_i64().unwrap();

        let uri = format!("/api/file/{id}/check");
        let (_, allowed) = call(&app, "POST", &uri, Some(json!({ "peer_name": "B" }))).await;
        assert_eq!(allowed["allowed"], true);
        let (_, allowed) = call(&app, "POST", &uri, Some(json!({ "peer_name": "C" }))).await;
        assert_eq!(allowed["allowed"], false);

        let (_, allowed) = call(&app, "POST", "/api/file/999/check", Some(json!({ "peer_name": "B" }))).await;
        assert_eq!(allowed["allowed"], false);
    }

    #[tokio::test]
    async fn test_reregistration_updates_single_row() {
        let app = app();
        register(&app, "A", "10.0.0.1", 5001).await;
        call(&app, "POST", "/api/unregister", Some(json!({ "name": "A" }))).await;
        let peer = register(&app, "A", "10.0.0.9", 6001).await;

        assert_eq!(peer["address"], "10.0.0.9");
        assert_eq!(peer["port"], 6001);
        assert_eq!(peer["status"], "online");

        let (_, list) = call(&app, "GET", "/api/peers", None).await;
        assert_eq!(list["count"], 1);

        let (status, fetched) = call(&app, "GET", "/api/peer/A", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["address"], "10.0.0.9");
    }

    #[tokio::test]
    async fn test_online_listing_excludes_unregistered() {
        let app = app();
        register(&app, "A", "10.0.0.1", 5001).await;
        register(&app, "B", "10.0.0.2", 5001).await;
        let (status, ack) = call(&app, "POST", "/api/unregister", Some(json!({ "name": "B" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["status"], "unregistered");

        let (_, online) = call(&app, "GET", "/api/peers/online", None).await;
        assert_eq!(online["count"], 1);
        assert_eq!(online["peers"][0]["name"], "A");

        let (_, status_body) = call(&app, "GET", "/api/status", None).await;
        assert_eq!(status_body["peers_total"], 2);
        assert_eq!(status_body["peers_online"], 1);
    }

    #[tokio::test]
    async fn test_unknown_peer_is_404() {
        let (status, body) = call(&app(), "GET", "/api/peer/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn test_unknown_recipient_rejected_with_reason() {
        let app = app();
        register(&app, "A", "10.0.0.1", 5001).await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/file/register",
            Some(json!({
                "filename": "x.bin",
                "size": 1,
                "checksum": "00",
                "owner": "A",
                "visibility": "shared",
                "recipients": ["nobody"],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("nobody"));
    }

    #[tokio::test]
    async fn test_validation_failures_are_400() {
        let app = app();
        register(&app, "A", "10.0.0.1", 5001).await;

        // Missing fields.
        let (status, _) = call(&app, "POST", "/api/register", Some(json!({ "name": "B" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Port zero.
        let (status, _) = call(
            &app,
            "POST",
            "/api/register",
            Some(json!({ "name": "B", "address": "10.0.0.2", "port": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Declared size over the limit.
        let (status, _) = call(
            &app,
            "POST",
            "/api/file/register",
            Some(json!({
                "filename": "huge.iso",
                "size": 5_000_000,
                "checksum": "00",
                "owner": "A",
                "visibility": "public",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_transfer_log_and_history() {
        let app = app();
        register(&app, "A", "10.0.0.1", 5001).await;
        register(&app, "B", "10.0.0.2", 5001).await;

        let (_, body) = call(
            &app,
            "POST",
            "/api/file/register",
            Some(json!({
                "filename": "notes.txt",
                "size": 12,
                "checksum": "aa",
                "owner": "A",
                "visibility": "public",
            })),
        )
        .await;
        let id = body["file_id"].as_i64().unwrap();

        for outcome in ["success", "failed"] {
            let (status, ack) = call(
                &app,
                "POST",
                "/api/transfer/log",
                Some(json!({ "file_id": id, "from_peer": "A", "to_peer": "B", "outcome": outcome })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(ack["status"], "logged");
        }

        let (_, sent) = call(&app, "GET", "/api/files/sent/A", None).await;
        assert_eq!(sent["count"], 2);
        assert_eq!(sent["transfers"][0]["filename"], "notes.txt");

        let (_, received) = call(&app, "GET", "/api/files/received/B", None).await;
        assert_eq!(received["count"], 2);

        let (status, _) = call(
            &app,
            "POST",
            "/api/transfer/log",
            Some(json!({ "file_id": 999, "from_peer": "A", "to_peer": "B", "outcome": "success" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
