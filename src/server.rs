//! HTTP admin surface.
//!
//! Exposes the two-phase bulk-translation workflow: phase one stashes a
//! selection of entity ids under a handle, phase two confirms the handle
//! with a language pair and runs the processor. A confirmed handle is
//! cleared after the run; a handle that fails validation survives so the
//! operator can resubmit with corrected languages.

use crate::config::Config;
use crate::i18n::{
    ensure_in_catalog, validate_language_choice, LanguageCode, LanguageRegistry,
};
use crate::notify;
use crate::processor::{process_batch, EntityId, FieldSnapshot, OutcomeTally};
use crate::report;
use crate::security::api_key_matches;
use crate::store::{EntityStore, SelectionHandle};
use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub store: EntityStore,
    pub config: Arc<Config>,
    pub http: reqwest::Client,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/languages", get(list_languages))
        .route("/entities", post(create_entity))
        .route("/entities/:id", get(get_entity))
        .route("/selections", post(create_selection))
        .route("/selections/:handle", delete(delete_selection))
        .route("/selections/:handle/translate", post(translate_selection))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ==================== Errors ====================

enum ApiError {
    /// Input the operator can correct; tied to a field for form-style UIs.
    Validation {
        field: &'static str,
        message: String,
    },
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation { field, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": message, "field": field })),
            )
                .into_response(),
            Self::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            Self::Internal(err) => {
                warn!("internal error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

// ==================== Auth ====================

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let presented = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    if api_key_matches(state.config.api_key.as_deref(), presented) {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid API key" })),
        )
            .into_response()
    }
}

// ==================== Handlers ====================

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Serialize)]
struct LanguageDto {
    code: &'static str,
    name: &'static str,
    native_name: &'static str,
}

async fn list_languages() -> Json<Vec<LanguageDto>> {
    let languages = LanguageRegistry::get()
        .list_enabled()
        .into_iter()
        .map(|lang| LanguageDto {
            code: lang.code,
            name: lang.name,
            native_name: lang.native_name,
        })
        .collect();
    Json(languages)
}

#[derive(Debug, Deserialize)]
struct CreateEntityRequest {
    label: String,
    language: LanguageCode,
    #[serde(default)]
    fields: FieldSnapshot,
}

async fn create_entity(
    State(state): State<AppState>,
    Json(body): Json<CreateEntityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_in_catalog(&body.language).map_err(|e| ApiError::Validation {
        field: "language",
        message: e.to_string(),
    })?;

    let id = state
        .store
        .create_entity(&body.label, &body.language, &body.fields)?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[derive(Debug, Serialize)]
struct EntityDto {
    id: EntityId,
    label: String,
    translations: BTreeMap<String, FieldSnapshot>,
}

async fn get_entity(
    State(state): State<AppState>,
    Path(id): Path<EntityId>,
) -> Result<Json<EntityDto>, ApiError> {
    let entity = state
        .store
        .load_entity(id)?
        .ok_or_else(|| ApiError::NotFound(format!("no entity with id {id}")))?;

    Ok(Json(EntityDto {
        id,
        label: entity.label().to_string(),
        translations: entity
            .translations()
            .iter()
            .map(|(lang, fields)| (lang.to_string(), fields.clone()))
            .collect(),
    }))
}

#[derive(Debug, Deserialize)]
struct CreateSelectionRequest {
    owner: String,
    entity_ids: Vec<EntityId>,
}

async fn create_selection(
    State(state): State<AppState>,
    Json(body): Json<CreateSelectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = state
        .store
        .create_selection(&body.owner, &body.entity_ids)?;
    let count = state.store.selection_size(handle)?.unwrap_or(0);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "handle": handle, "count": count })),
    ))
}

async fn delete_selection(
    State(state): State<AppState>,
    Path(handle): Path<SelectionHandle>,
) -> Result<StatusCode, ApiError> {
    if state.store.clear_selection(handle)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("no selection {handle}")))
    }
}

#[derive(Debug, Deserialize)]
struct TranslateRequest {
    from: LanguageCode,
    to: LanguageCode,
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Serialize)]
struct TranslateResponse {
    tally: OutcomeTally,
    notices: Vec<String>,
}

async fn translate_selection(
    State(state): State<AppState>,
    Path(handle): Path<SelectionHandle>,
    Json(body): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    validate_language_choice(&body.from, &body.to).map_err(|e| ApiError::Validation {
        field: "to",
        message: e.to_string(),
    })?;
    ensure_in_catalog(&body.from).map_err(|e| ApiError::Validation {
        field: "from",
        message: e.to_string(),
    })?;
    ensure_in_catalog(&body.to).map_err(|e| ApiError::Validation {
        field: "to",
        message: e.to_string(),
    })?;

    let mut batch = state
        .store
        .load_selection(handle)?
        .ok_or_else(|| ApiError::NotFound(format!("no selection {handle}")))?;

    let tally = process_batch(&mut batch, &body.from, &body.to, body.force);
    let notices = report::report(&tally, &body.from, &body.to);

    if let Some(webhook_url) = &state.config.notify_webhook_url {
        if let Err(e) = notify::send_notices(
            &state.http,
            webhook_url,
            &body.from,
            &body.to,
            &tally,
            &notices,
        )
        .await
        {
            // Notification delivery never fails the batch run
            warn!("failed to deliver notices: {e:#}");
        }
    }

    // The confirming caller owns the handle: a completed run clears it
    state.store.clear_selection(handle)?;

    Ok(Json(TranslateResponse { tally, notices }))
}
