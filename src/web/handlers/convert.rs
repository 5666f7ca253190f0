use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::auth::{AuthError, Identity};
use crate::task::{KeyMode, Language, StatusView, SubmitError, TaskInput};
use crate::{AppContext, DATA_PATH};

pub fn conversion_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/convert", post(convert))
        .route("/status", get(status))
        .route("/reset", get(reset))
        .with_state(ctx)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct ConvertResponse {
    message: String,
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct ConvertBody {
    url: Option<String>,
    lang: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

fn error_response(code: StatusCode, message: impl Into<String>) -> Response {
    (
        code,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

async fn authenticate(ctx: &AppContext, headers: &HeaderMap) -> Result<Identity, Response> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match ctx.auth.verify(authorization).await {
        Ok(identity) => Ok(identity),
        Err(AuthError::RateLimitExceeded) => Err(error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests",
        )),
        Err(e) => {
            info!("Rejected request: {}", e);
            Err(error_response(
                StatusCode::UNAUTHORIZED,
                "Authentication required",
            ))
        }
    }
}

/// The key the caller's task lives under. In owner mode the identity is
/// the key; task ids are never read from the request, so one user cannot
/// poll another's task. In task-id mode the id returned by `/convert`
/// comes back via the `X-Task-ID` header.
fn task_key(ctx: &AppContext, identity: &Identity, headers: &HeaderMap) -> Result<String, Response> {
    match ctx.controller.key_mode() {
        KeyMode::Owner => Ok(identity.subject.clone()),
        KeyMode::TaskId => headers
            .get("X-Task-ID")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                error_response(StatusCode::BAD_REQUEST, "Invalid request: missing X-Task-ID")
            }),
    }
}

fn parse_language(raw: Option<&str>) -> Result<Language, Response> {
    raw.unwrap_or("en").parse().map_err(|code: String| {
        error_response(StatusCode::BAD_REQUEST, format!("Invalid language: {}", code))
    })
}

fn sanitize_file_name(raw: &str) -> String {
    Path::new(raw)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string()
}

async fn convert(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let identity = match authenticate(&ctx, &headers).await {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let (input, lang) = if content_type.starts_with("application/json") {
        let body: ConvertBody = match serde_json::from_slice(&body) {
            Ok(body) => body,
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
            }
        };

        let Some(url) = body.url.filter(|u| !u.is_empty()) else {
            return error_response(StatusCode::BAD_REQUEST, "Invalid request: missing url");
        };
        let lang = match parse_language(body.lang.as_deref()) {
            Ok(lang) => lang,
            Err(response) => return response,
        };
        (TaskInput::Url { url }, lang)
    } else if content_type.starts_with("application/octet-stream") {
        let file_name = headers
            .get("X-File-Name")
            .and_then(|v| v.to_str().ok())
            .map(sanitize_file_name)
            .filter(|n| !n.is_empty());
        let Some(file_name) = file_name else {
            return error_response(StatusCode::BAD_REQUEST, "Invalid request: missing X-File-Name");
        };
        let lang = match parse_language(headers.get("X-Language").and_then(|v| v.to_str().ok())) {
            Ok(lang) => lang,
            Err(response) => return response,
        };

        let dest = Path::new(DATA_PATH.as_str()).join(&file_name);
        if let Err(e) = tokio::fs::write(&dest, &body).await {
            error!("Failed to store upload {}: {}", file_name, e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store uploaded file",
            );
        }
        (TaskInput::Upload { file_name }, lang)
    } else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid content type");
    };

    match ctx.controller.submit(&identity, input, lang).await {
        Ok(task_id) => (
            StatusCode::OK,
            Json(ConvertResponse {
                message: "Conversion started".to_string(),
                task_id,
            }),
        )
            .into_response(),
        Err(SubmitError::AlreadyRunning) => {
            error_response(StatusCode::BAD_REQUEST, "Conversion already in progress")
        }
        Err(e) => {
            error!("Failed to create task: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create task")
        }
    }
}

async fn status(State(ctx): State<Arc<AppContext>>, headers: HeaderMap) -> Response {
    let identity = match authenticate(&ctx, &headers).await {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    let key = match task_key(&ctx, &identity, &headers) {
        Ok(key) => key,
        Err(response) => return response,
    };

    match ctx.controller.status(&key).await {
        Ok(view) => {
            let body = match view {
                StatusView::Idle => StatusResponse {
                    status: "idle",
                    error: None,
                    warning: None,
                },
                StatusView::InProgress => StatusResponse {
                    status: "in_progress",
                    error: None,
                    warning: None,
                },
                StatusView::Done { warning } => StatusResponse {
                    status: "done",
                    error: None,
                    warning,
                },
                StatusView::Failed { error } => StatusResponse {
                    status: "failed",
                    error: Some(error),
                    warning: None,
                },
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            error!("Failed to read task status for {}: {}", key, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read task status")
        }
    }
}

async fn reset(State(ctx): State<Arc<AppContext>>, headers: HeaderMap) -> Response {
    let identity = match authenticate(&ctx, &headers).await {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    let key = match task_key(&ctx, &identity, &headers) {
        Ok(key) => key,
        Err(response) => return response,
    };

    match ctx.controller.reset(&key).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Session reset".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to reset task {}: {}", key, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to reset task")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::sanitize_file_name;

    #[test]
    fn sanitize_file_name_strips_directories() {
        assert_eq!(sanitize_file_name("talk.mp3"), "talk.mp3");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("/var/tmp/a.wav"), "a.wav");
    }

    #[test]
    fn sanitize_file_name_rejects_empty_names() {
        assert_eq!(sanitize_file_name(""), "");
        assert_eq!(sanitize_file_name(".."), "");
    }
}
