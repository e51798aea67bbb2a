//! HTTP routes for submitting documents and collecting their results

use super::state::{AppState, Submission};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hyperion_engine::{DocumentFormat, DocumentReader, DocumentResult};
use tracing::{info, warn};
use uuid::Uuid;

/// Build the document routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/documents", post(submit_handler))
        .route("/documents/:id", get(result_handler))
        .with_state(state)
}

fn format_of(headers: &HeaderMap) -> DocumentFormat {
    let json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("json"))
        .unwrap_or(false);
    if json {
        DocumentFormat::Json
    } else {
        DocumentFormat::Yaml
    }
}

/// POST /documents - read the body as a document and run it in the background.
///
/// Accepts repeated `tag` query parameters and a `timeout` in minutes.
/// Responds with the id to poll. A document that cannot be read is stored
/// as a failed result under that id.
async fn submit_handler(
    State(state): State<AppState>,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let mut parameters = (*state.parameters).clone();
    let mut tags = Vec::new();
    for (key, value) in query {
        match key.as_str() {
            "tag" => tags.push(value),
            "timeout" => match value.parse::<u64>() {
                Ok(minutes) => parameters = parameters.with_timeout_minutes(minutes),
                Err(_) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        format!("Invalid timeout '{}', expected minutes", value),
                    )
                        .into_response();
                }
            },
            _ => {}
        }
    }
    if !tags.is_empty() {
        parameters = parameters.with_tags(tags);
    }

    let id = Uuid::new_v4().to_string();
    match DocumentReader::default().read_str(&body, format_of(&headers)) {
        Ok(document) => {
            info!(id = %id, "document accepted");
            state.insert(&id, Submission::Running);

            let state = state.clone();
            let key = id.clone();
            tokio::spawn(async move {
                let result = document.execute(&parameters).await;
                info!(id = %key, success = result.success(), "document finished");
                state.insert(&key, Submission::Finished(result));
            });
        }
        Err(e) => {
            warn!(id = %id, "document rejected: {}", e.message);
            state.insert(&id, Submission::Finished(DocumentResult::failed()));
        }
    }

    (StatusCode::OK, id).into_response()
}

/// GET /documents/:id - 200 with the result once finished, 202 while running
async fn result_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.take(&id) {
        Some(Submission::Finished(result)) => (StatusCode::OK, Json(result)).into_response(),
        Some(Submission::Running) => StatusCode::ACCEPTED.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
