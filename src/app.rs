use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Request, State},
    http::{HeaderMap, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::backend::{BackendClient, BackendError, JSON_MIME, UpstreamResponse, XLSX_MIME, modified_file_name};
use crate::config::Settings;
use crate::csrf::{CSRF_HEADER, TokenStore};
use crate::loader::{self, RenderedSheet};
use crate::rules::{RULES_DOWNLOAD_NAME, RulesSummary, pretty_json};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub struct AppState {
    settings: Settings,
    tokens: TokenStore,
    backend: Option<BackendClient>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let backend = match BackendClient::from_settings(&settings) {
            Ok(client) => Some(client),
            Err(BackendError::NotConfigured) => {
                warn!("BACKEND_URL or BACKEND_API_KEY not set; export and sample-data are disabled");
                None
            }
            Err(e) => {
                error!("cannot build backend client: {}", e);
                None
            }
        };

        AppState {
            settings,
            tokens: TokenStore::new(),
            backend,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

#[derive(Serialize)]
struct PreviewResponse {
    file_name: String,
    sheet_names: Vec<String>,
    sheets: Vec<RenderedSheet>,
}

/// An uploaded file field.
struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let static_dir = ServeDir::new(&state.settings.static_dir);

    Router::new()
        .route("/api/csrf", get(issue_csrf))
        .route("/api/preview", post(preview))
        .route(
            "/api/export",
            post(export).layer(middleware::from_fn_with_state(state.clone(), csrf_guard)),
        )
        .route("/api/sample-data", get(sample_data))
        .route("/api/sample-data/explain", get(explain_rules))
        .nest_service("/static", static_dir)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(middleware::from_fn(api_guard))
        .with_state(state)
}

pub async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = settings.bind_addr.clone();
    let app = router(Arc::new(AppState::new(settings)));

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn plain_response(status: StatusCode, message: &'static str) -> Response {
    (status, message).into_response()
}

/// Reject cross-origin calls and unexpected methods on the API.
async fn api_guard(req: Request, next: Next) -> Response {
    if !req.uri().path().starts_with("/api/") {
        return next.run(req).await;
    }

    if let Some(origin) = req.headers().get(header::ORIGIN) {
        let origin = origin.to_str().unwrap_or_default();
        if !is_same_origin(origin, req.headers()) {
            warn!("rejected {} {} from origin {:?}", req.method(), req.uri().path(), origin);
            return plain_response(StatusCode::FORBIDDEN, "Forbidden origin");
        }
    }

    if req.method() != Method::GET && req.method() != Method::POST {
        warn!("rejected method {} on {}", req.method(), req.uri().path());
        return plain_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
    }

    next.run(req).await
}

fn is_same_origin(origin: &str, headers: &HeaderMap) -> bool {
    let Some(host) = headers.get(header::HOST).and_then(|h| h.to_str().ok()) else {
        return false;
    };
    origin == format!("http://{}", host) || origin == format!("https://{}", host)
}

/// Mutating calls must carry a token previously issued by `/api/csrf`.
async fn csrf_guard(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let token = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !state.tokens.is_valid(token) {
        warn!("rejected {} without a valid CSRF token", req.uri().path());
        return plain_response(StatusCode::FORBIDDEN, "Invalid CSRF token");
    }
    next.run(req).await
}

async fn issue_csrf(State(state): State<Arc<AppState>>) -> Response {
    match state.tokens.issue() {
        Ok(token) => Json(json!({ "csrf": token })).into_response(),
        Err(e) => {
            error!("cannot generate CSRF token: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Cannot generate token")
        }
    }
}

/// Collect the `file` upload and any text fields of a multipart form.
async fn read_form(
    multipart: &mut Multipart,
) -> Result<(Option<Upload>, Vec<(String, String)>), Response> {
    let mut upload = None;
    let mut fields = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(error_response(StatusCode::BAD_REQUEST, e.body_text())),
        };

        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload.xlsx").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.body_text()))?;
            upload = Some(Upload {
                file_name,
                bytes: bytes.to_vec(),
            });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.body_text()))?;
            fields.push((name, text));
        }
    }

    Ok((upload, fields))
}

async fn preview(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let upload = match read_form(&mut multipart).await {
        Ok((Some(upload), _)) if !upload.bytes.is_empty() => upload,
        Ok(_) => return error_response(StatusCode::BAD_REQUEST, "No file data received"),
        Err(response) => return response,
    };

    // Decoding a large workbook is CPU bound.
    let decoded =
        tokio::task::spawn_blocking(move || loader::from_bytes(&upload.file_name, &upload.bytes))
            .await;
    let book = match decoded {
        Ok(Ok(book)) => book,
        Ok(Err(e)) => {
            warn!("cannot decode upload: {}", e);
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
        Err(e) => {
            error!("decoding task failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Cannot decode file");
        }
    };

    info!(
        "previewing {:?}: {} sheet(s)",
        book.file_name,
        book.sheets.len()
    );
    Json(PreviewResponse {
        sheet_names: book.sheet_names().into_iter().map(str::to_string).collect(),
        sheets: book.render(&state.settings.view),
        file_name: book.file_name,
    })
    .into_response()
}

fn backend(state: &AppState) -> Result<&BackendClient, Response> {
    state.backend.as_ref().ok_or_else(|| {
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            BackendError::NotConfigured.to_string(),
        )
    })
}

fn relay_response(upstream: UpstreamResponse, default_type: &str, attachment: Option<&str>) -> Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream.content_type.unwrap_or_else(|| default_type.to_string());

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type);

    let disposition = upstream
        .content_disposition
        .or_else(|| attachment.map(|name| format!("attachment; filename=\"{}\"", name)));
    if let Some(disposition) = disposition {
        builder = builder.header(header::CONTENT_DISPOSITION, disposition);
    }

    builder
        .body(Body::from(upstream.body))
        .unwrap_or_else(|e| error_response(StatusCode::BAD_GATEWAY, e.to_string()))
}

async fn export(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let client = match backend(&state) {
        Ok(client) => client,
        Err(response) => return response,
    };

    let (upload, fields) = match read_form(&mut multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };
    let Some(upload) = upload.filter(|u| !u.bytes.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "No file data received");
    };
    let Some(sheet_name) = fields
        .into_iter()
        .find(|(name, value)| name == "sheet_name" && !value.is_empty())
        .map(|(_, value)| value)
    else {
        return error_response(StatusCode::BAD_REQUEST, "Missing sheet_name");
    };

    let download_name = modified_file_name(&upload.file_name);
    match client.export(&upload.file_name, upload.bytes, &sheet_name).await {
        Ok(upstream) => {
            info!("export of {:?} answered {}", upload.file_name, upstream.status);
            relay_response(upstream, XLSX_MIME, Some(&download_name))
        }
        Err(e) => {
            error!("export of {:?} failed: {}", upload.file_name, e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

async fn sample_data(State(state): State<Arc<AppState>>) -> Response {
    let client = match backend(&state) {
        Ok(client) => client,
        Err(response) => return response,
    };

    match client.sample_data().await {
        Ok(upstream) => relay_response(upstream, JSON_MIME, None),
        Err(e) => {
            error!("sample-data request failed: {}", e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

async fn explain_rules(State(state): State<Arc<AppState>>) -> Response {
    let client = match backend(&state) {
        Ok(client) => client,
        Err(response) => return response,
    };

    let upstream = match client.sample_data().await {
        Ok(upstream) if (200..300).contains(&upstream.status) => upstream,
        Ok(upstream) => return relay_response(upstream, JSON_MIME, None),
        Err(e) => {
            error!("sample-data request failed: {}", e);
            return error_response(StatusCode::BAD_GATEWAY, e.to_string());
        }
    };

    let rules: Value = serde_json::from_slice(&upstream.body).unwrap_or(Value::Null);
    Json(json!({
        "summary": RulesSummary::from_value(&rules),
        "json": pretty_json(&rules),
        "download_name": RULES_DOWNLOAD_NAME,
    }))
    .into_response()
}
