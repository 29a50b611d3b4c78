use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use repolink_core::test_utils::canonical;
use repolink_core::{
    BackendProject, ConflictResolution, HttpSyncBackend, SyncBackend, SyncError, SyncRequest,
    SyncSettings,
};
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct Seen {
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn sync_projects(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if auth != "Bearer good-token" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid or expired session"})),
        );
    }
    if body["conflictResolution"] == json!("keep-local") {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "keep-local is not supported"})),
        );
    }

    seen.bodies.lock().expect("lock").push(body.clone());
    let echoed = body["localProjects"].clone();
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "updatedProjects": echoed,
            "conflicts": [{
                "project": {"remoteId": "abc"},
                "conflictKind": "branch-mismatch",
                "message": "server has dev"
            }],
            "deletedProjects": ["old"]
        })),
    )
}

async fn spawn_server() -> (SocketAddr, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route("/sync-projects", post(sync_projects))
        .route(
            "/broken/sync-projects",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        )
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (addr, seen)
}

fn backend(base: String) -> HttpSyncBackend {
    HttpSyncBackend::new(&SyncSettings {
        server_url: base,
        request_timeout_secs: 5,
        connect_timeout_secs: 2,
        ..SyncSettings::default()
    })
    .expect("client")
}

fn request(resolution: ConflictResolution) -> SyncRequest {
    SyncRequest {
        local_projects: vec![BackendProject::from(&canonical("abc", "site", "main"))],
        last_sync_timestamp: None,
        conflict_resolution: resolution,
    }
}

#[tokio::test]
async fn posts_request_and_decodes_response() {
    let (addr, seen) = spawn_server().await;
    let backend = backend(format!("http://{addr}/"));
    assert_eq!(backend.endpoint(), format!("http://{addr}/sync-projects"));

    let response = backend
        .sync_projects(&request(ConflictResolution::AutoResolve), "good-token")
        .await
        .expect("sync");

    assert!(response.success);
    assert_eq!(response.updated_projects.len(), 1);
    assert_eq!(response.updated_projects[0].repo_name, "site");
    assert_eq!(response.conflicts[0].conflict_kind, "branch-mismatch");
    assert_eq!(response.deleted_projects, vec!["old".to_string()]);

    let bodies = seen.bodies.lock().expect("lock").clone();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["conflictResolution"], json!("auto-resolve"));
    assert_eq!(bodies[0]["localProjects"][0]["remoteId"], json!("abc"));
    assert!(bodies[0]["localProjects"][0].get("id").is_none());
}

#[tokio::test]
async fn unauthorized_surfaces_server_message() {
    let (addr, _seen) = spawn_server().await;
    let err = backend(format!("http://{addr}"))
        .sync_projects(&request(ConflictResolution::AutoResolve), "stale")
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    match err {
        SyncError::Server { message, .. } => assert_eq!(message, "Invalid or expired session"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn error_body_message_is_kept() {
    let (addr, _seen) = spawn_server().await;
    let err = backend(format!("http://{addr}"))
        .sync_projects(&request(ConflictResolution::KeepLocal), "good-token")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Server { status: 422, ref message } if message == "keep-local is not supported"
    ));
}

#[tokio::test]
async fn non_json_error_falls_back_to_body() {
    let (addr, _seen) = spawn_server().await;
    let err = backend(format!("http://{addr}/broken"))
        .sync_projects(&request(ConflictResolution::AutoResolve), "good-token")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Server { status: 502, ref message } if message == "upstream down"
    ));
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = backend(format!("http://{addr}"))
        .sync_projects(&request(ConflictResolution::AutoResolve), "good-token")
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Network(_)));
}
