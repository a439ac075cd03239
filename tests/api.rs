#![cfg(feature = "web")]

use axum::body::{Body, to_bytes};
use axum::extract::Multipart;
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;

use sheetview::app::{AppState, router};
use sheetview::config::Settings;

const BOUNDARY: &str = "sheetview-test-boundary";

fn app(settings: Settings) -> Router {
    router(Arc::new(AppState::new(settings)))
}

fn multipart_body(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Body {
    let mut body = Vec::new();
    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    Body::from(body)
}

fn post_form(uri: &str, token: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::post(uri)
        .header(header::HOST, "localhost:3000")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header("x-csrf-token", token);
    }
    builder.body(body).unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::HOST, "localhost:3000")
        .body(Body::empty())
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

async fn fetch_token(app: &Router) -> String {
    let response = app.clone().oneshot(get_request("/api/csrf")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["csrf"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn csrf_token_is_32_hex_chars() {
    let app = app(Settings::default());
    let token = fetch_token(&app).await;
    assert_eq!(token.len(), 32);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn foreign_origin_is_forbidden() {
    let request = Request::get("/api/csrf")
        .header(header::HOST, "localhost:3000")
        .header(header::ORIGIN, "http://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app(Settings::default()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(response).await, "Forbidden origin");
}

#[tokio::test]
async fn origin_must_match_host_exactly() {
    for origin in ["http://localhost:3000.evil.example", "https://localhost:30001"] {
        let request = Request::get("/api/csrf")
            .header(header::HOST, "localhost:3000")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap();
        let response = app(Settings::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "origin {}", origin);
    }
}

#[tokio::test]
async fn same_origin_is_allowed() {
    let request = Request::get("/api/csrf")
        .header(header::HOST, "localhost:3000")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app(Settings::default()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn only_get_and_post_are_allowed() {
    let request = Request::delete("/api/csrf")
        .header(header::HOST, "localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app(Settings::default()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_text(response).await, "Method not allowed");
}

#[tokio::test]
async fn preview_renders_every_sheet() {
    let csv = b"Reporte de flota\n,,\nTIPO,MOD,NO.SERIE\nTRACTO,2021,00012345\nDOLLY,n/a\n";
    let request = post_form("/api/preview", None, multipart_body(Some(("flota.csv", csv)), &[]));
    let response = app(Settings::default()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["file_name"], "flota.csv");
    assert_eq!(json["sheet_names"], serde_json::json!(["flota"]));

    let table = &json["sheets"][0]["table"];
    assert_eq!(table["header"], serde_json::json!(["TIPO", "MOD", "NO.SERIE"]));
    assert_eq!(table["header_row"], 1);
    assert_eq!(
        table["body"],
        serde_json::json!([["TRACTO", "2.021", "12.345"], ["DOLLY", "N/A", ""]])
    );
}

#[tokio::test]
async fn preview_without_file_is_rejected() {
    let request = post_form("/api/preview", None, multipart_body(None, &[("sheet_name", "x")]));
    let response = app(Settings::default()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No file data received");
}

#[tokio::test]
async fn preview_of_unsupported_file_is_rejected() {
    let request = post_form(
        "/api/preview",
        None,
        multipart_body(Some(("notes.txt", b"hello")), &[]),
    );
    let response = app(Settings::default()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn export_requires_an_issued_token() {
    let app = app(Settings::default());
    let body = multipart_body(Some(("fleet.xlsx", b"PK")), &[("sheet_name", "Hoja1")]);

    let response = app
        .clone()
        .oneshot(post_form("/api/export", None, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = multipart_body(Some(("fleet.xlsx", b"PK")), &[("sheet_name", "Hoja1")]);
    let response = app
        .oneshot(post_form("/api/export", Some("deadbeef"), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(response).await, "Invalid CSRF token");
}

#[tokio::test]
async fn export_without_backend_configuration() {
    let app = app(Settings::default());
    let token = fetch_token(&app).await;

    let body = multipart_body(Some(("fleet.xlsx", b"PK")), &[("sheet_name", "Hoja1")]);
    let response = app
        .oneshot(post_form("/api/export", Some(&token), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await["error"],
        "Missing BACKEND_URL or BACKEND_API_KEY"
    );
}

fn unreachable_backend() -> Settings {
    Settings {
        backend_url: Some("http://127.0.0.1:9".into()),
        backend_api_key: Some("key".into()),
        backend_timeout_secs: 5,
        ..Settings::default()
    }
}

#[tokio::test]
async fn export_requires_sheet_name() {
    let app = app(unreachable_backend());
    let token = fetch_token(&app).await;

    let body = multipart_body(Some(("fleet.xlsx", b"PK")), &[]);
    let response = app
        .oneshot(post_form("/api/export", Some(&token), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing sheet_name");
}

#[tokio::test]
async fn export_reports_unreachable_backend() {
    let app = app(unreachable_backend());
    let token = fetch_token(&app).await;

    let body = multipart_body(Some(("fleet.xlsx", b"PK")), &[("sheet_name", "Hoja1")]);
    let response = app
        .oneshot(post_form("/api/export", Some(&token), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn sample_data_without_backend_configuration() {
    let response = app(Settings::default())
        .oneshot(get_request("/api/sample-data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

/// Stand-in for the enrichment service. `/export` echoes what it received;
/// sheet `typed` answers with its own content type and file name.
async fn stub_export(headers: HeaderMap, mut multipart: Multipart) -> Response {
    let api_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let mut sheet_name = String::new();
    let mut file_name = String::new();
    let mut file_len = 0;

    while let Some(field) = multipart.next_field().await.unwrap() {
        match field.name().map(str::to_string).as_deref() {
            Some("file") => {
                file_name = field.file_name().unwrap_or_default().to_string();
                file_len = field.bytes().await.unwrap().len();
            }
            Some("sheet_name") => sheet_name = field.text().await.unwrap(),
            _ => {}
        }
    }

    let echo = format!("{}|{}|{}|{}", api_key, sheet_name, file_name, file_len);
    let mut builder = Response::builder().status(StatusCode::CREATED);
    if sheet_name == "typed" {
        builder = builder
            .header(header::CONTENT_TYPE, "text/csv")
            .header(header::CONTENT_DISPOSITION, "attachment; filename=\"out.csv\"");
    }
    builder.body(Body::from(echo)).unwrap()
}

async fn stub_sample_data(headers: HeaderMap) -> Response {
    if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some("secret") {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    Json(json!({
        "coberturas_por_tipo": {
            "TRACTOS": {
                "tipo_cobertura": "AMPLIA",
                "coberturas": {"ROBO TOTAL": {"LIMITES": "VALOR COMERCIAL", "DEDUCIBLES": "10%"}}
            }
        },
        "reglas_asignacion": {"columnas_a_agregar": ["ROBO TOTAL LIMITES"]}
    }))
    .into_response()
}

async fn stub_backend(api_key: &str) -> Settings {
    let stub = Router::new()
        .route("/export", post(stub_export))
        .route("/sample-data", get(stub_sample_data));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, stub).await.unwrap() });

    Settings {
        backend_url: Some(format!("http://{}", addr)),
        backend_api_key: Some(api_key.into()),
        backend_timeout_secs: 5,
        ..Settings::default()
    }
}

#[tokio::test]
async fn export_forwards_file_and_relays_reply() {
    let app = app(stub_backend("secret").await);
    let token = fetch_token(&app).await;

    let body = multipart_body(Some(("fleet.xlsx", b"PK\x03\x04")), &[("sheet_name", "Hoja1")]);
    let response = app
        .oneshot(post_form("/api/export", Some(&token), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"modified_fleet.xlsx\""
    );
    assert_eq!(body_text(response).await, "secret|Hoja1|fleet.xlsx|4");
}

#[tokio::test]
async fn export_keeps_upstream_headers() {
    let app = app(stub_backend("secret").await);
    let token = fetch_token(&app).await;

    let body = multipart_body(Some(("fleet.xlsx", b"PK")), &[("sheet_name", "typed")]);
    let response = app
        .oneshot(post_form("/api/export", Some(&token), body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"out.csv\""
    );
}

#[tokio::test]
async fn sample_data_is_relayed() {
    let response = app(stub_backend("secret").await)
        .oneshot(get_request("/api/sample-data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let json = body_json(response).await;
    assert_eq!(json["coberturas_por_tipo"]["TRACTOS"]["tipo_cobertura"], "AMPLIA");
}

#[tokio::test]
async fn sample_data_passes_upstream_errors_through() {
    let response = app(stub_backend("wrong").await)
        .oneshot(get_request("/api/sample-data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await, "bad key");
}

#[tokio::test]
async fn rules_are_explained() {
    let response = app(stub_backend("secret").await)
        .oneshot(get_request("/api/sample-data/explain"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["download_name"], "enrichment_rules.json");
    let summary = &json["summary"];
    assert_eq!(summary["reference_column"], "TIPO DE UNIDAD");
    assert_eq!(summary["columns_to_add"], json!(["ROBO TOTAL LIMITES"]));
    assert_eq!(summary["coverage_by_type"][0]["unit_type"], "TRACTOS");
    assert_eq!(summary["coverage_by_type"][0]["coverages"][0]["deductibles"], "10%");
    assert!(json["json"].as_str().unwrap().contains("\"ROBO TOTAL\""));
}
