use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use waha_gateway::{
    Client, Config, EngineTransport, ErrorKind, HttpTransport, Method, QrFormat, SessionConfig,
    SessionState, TransportError,
};

const KEY: &str = "test-secret";

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("x-api-key").and_then(|v| v.to_str().ok()) == Some(KEY)
}

async fn session_status(headers: HeaderMap, Path(name): Path<String>) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Unauthorized"})));
    }
    match name.as_str() {
        "demo" => (StatusCode::OK, Json(json!({"name": "demo", "status": "SCAN_QR_CODE"}))),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"}))),
        _ => (StatusCode::NOT_FOUND, Json(json!({"error": "no session"}))),
    }
}

async fn start(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    if body["name"].as_str().unwrap_or("").is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"message": "name is required"})),
        );
    }
    (
        StatusCode::CREATED,
        Json(json!({"name": body["name"], "status": "STARTING", "config": body["config"]})),
    )
}

async fn qr_image() -> impl IntoResponse {
    Json(json!({"image": "data:image/png;base64,iVBORw0KGgo="}))
}

async fn echo_query(Query(q): Query<Vec<(String, String)>>) -> impl IntoResponse {
    Json(json!({ "query": q }))
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({}))
}

async fn spawn_engine() -> SocketAddr {
    let app = Router::new()
        .route("/api/sessions/start", post(start))
        .route(
            "/api/sessions/:name",
            get(session_status).delete(|| async { Json(json!({})) }),
        )
        .route("/api/sessions/:name/qr-image", get(qr_image))
        .route("/echo", get(echo_query))
        .route("/slow", get(slow));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config(addr: SocketAddr, key: Option<&str>) -> Config {
    let mut cfg = Config::new(format!("http://{addr}/"), key.map(str::to_string));
    cfg.timeout = Duration::from_millis(500);
    cfg
}

#[tokio::test]
async fn attaches_api_key_header() {
    let addr = spawn_engine().await;
    let t = HttpTransport::new(&config(addr, Some(KEY))).unwrap();
    let resp = t
        .execute(Method::Get, "/api/sessions/demo", None, &[])
        .await
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["status"], json!("SCAN_QR_CODE"));
}

#[tokio::test]
async fn missing_key_is_auth_error() {
    let addr = spawn_engine().await;
    let client = Client::new(&config(addr, None)).unwrap();
    let err = client.get_status("demo").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthError);
}

#[tokio::test]
async fn non_2xx_keeps_body_verbatim() {
    let addr = spawn_engine().await;
    let t = HttpTransport::new(&config(addr, Some(KEY))).unwrap();
    let err = t
        .execute(Method::Get, "/api/sessions/broken", None, &[])
        .await
        .unwrap_err();
    match err {
        TransportError::HttpStatus { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, r#"{"error":"boom"}"#);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn query_parameters_are_encoded() {
    let addr = spawn_engine().await;
    let t = HttpTransport::new(&config(addr, Some(KEY))).unwrap();
    let resp = t
        .execute(Method::Get, "/echo", None, &[("limit", "10".to_string())])
        .await
        .unwrap();
    assert_eq!(resp.body["query"], json!([["limit", "10"]]));
}

#[tokio::test]
async fn timeout_is_network_failure() {
    let addr = spawn_engine().await;
    let t = HttpTransport::new(&config(addr, Some(KEY))).unwrap();
    let err = t.execute(Method::Get, "/slow", None, &[]).await.unwrap_err();
    assert!(matches!(err, TransportError::Network(_)));
}

#[tokio::test]
async fn refused_connection_is_engine_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = Client::new(&config(addr, Some(KEY))).unwrap();
    let err = client.get_status("demo").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EngineUnavailable);
    assert!(!client.ping().await);
}

#[tokio::test]
async fn lifecycle_against_http_engine() {
    let addr = spawn_engine().await;
    let client = Client::new(&config(addr, Some(KEY))).unwrap();

    let created = client
        .create_session("demo", SessionConfig::new().with("debug", json!(true)))
        .await
        .unwrap();
    assert_eq!(created.state, SessionState::Starting);
    assert_eq!(created.engine_metadata["config"]["debug"], json!(true));

    let qr = client.get_pairing("demo", QrFormat::Image).await.unwrap();
    assert_eq!(qr.data, "iVBORw0KGgo=");

    client.stop_and_delete("demo").await.unwrap();
    assert!(client.registry().get("demo").is_none());

    let missing = client.get_status("nobody").await.unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn validation_rejection_is_invalid_request() {
    let addr = spawn_engine().await;
    let client = Client::new(&config(addr, Some(KEY))).unwrap();
    let err = client
        .create_session("", SessionConfig::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert_eq!(client.registry().get("").unwrap().state, SessionState::Failed);
}
