//! Axum route handlers for the chargen HTTP server.
//!
//! # Routes
//!
//! - `GET    /health`
//! - `POST   /api/fix-json`              : `{content}` → `{character}`
//! - `POST   /api/generate-character`    : `{prompt, model}` + `X-API-Key`
//! - `POST   /api/refine-character`      : `{prompt, model, currentCharacter}` + `X-API-Key`
//! - `POST   /api/process-files`         : multipart `files` → `{knowledge}`
//! - `POST   /api/build-character`       : `{form, knowledge?}` → `{character}`
//! - `GET    /api/backups`               : newest first
//! - `POST   /api/backups`               : `{name?, character?}`
//! - `GET    /api/backups/:name`
//! - `DELETE /api/backups/:name`
//! - `POST   /api/backups/:name/rename`  : `{name}`

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use chargen_core::knowledge::is_text_file;
use chargen_core::schema;
use chargen_core::{CharacterForm, CharacterService, GeneratedCharacter, KnowledgeFile, PdfConverter};
use chargen_provider::TextGenerator;
use chargen_shared::{Backup, CharacterDocument, ChargenError};
use chargen_storage::BackupStore;

use crate::error::{ApiError, ApiResult};

/// Header carrying the caller's provider credential.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Upload ceiling for `/api/process-files`.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared application state for the HTTP server.
pub struct AppState<G, P, S> {
    pub service: Arc<CharacterService<G, P>>,
    pub store: Arc<S>,
    /// The document the autosaver snapshots.
    working: Arc<watch::Sender<Option<CharacterDocument>>>,
    /// Model used when a request leaves `model` blank.
    default_model: String,
    /// Credential used when a request carries no `X-API-Key`.
    fallback_credential: Option<String>,
}

impl<G, P, S> Clone for AppState<G, P, S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            store: Arc::clone(&self.store),
            working: Arc::clone(&self.working),
            default_model: self.default_model.clone(),
            fallback_credential: self.fallback_credential.clone(),
        }
    }
}

impl<G, P, S> AppState<G, P, S> {
    pub fn new(service: CharacterService<G, P>, store: Arc<S>) -> Self {
        let (working, _) = watch::channel(None);
        Self {
            service: Arc::new(service),
            store,
            working: Arc::new(working),
            default_model: String::new(),
            fallback_credential: None,
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_fallback_credential(mut self, credential: Option<String>) -> Self {
        self.fallback_credential = credential.filter(|c| !c.trim().is_empty());
        self
    }

    /// Receiver for the working document.
    pub fn subscribe(&self) -> watch::Receiver<Option<CharacterDocument>> {
        self.working.subscribe()
    }

    fn set_working(&self, doc: &CharacterDocument) {
        self.working.send_replace(Some(doc.clone()));
    }

    fn model<'a>(&'a self, requested: &'a str) -> &'a str {
        if requested.trim().is_empty() {
            &self.default_model
        } else {
            requested
        }
    }

    fn credential<'a>(&'a self, headers: &'a HeaderMap) -> &'a str {
        headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .or(self.fallback_credential.as_deref())
            .unwrap_or_default()
    }
}

/// Build the axum router with all routes.
pub fn app_router<G, P, S>(state: AppState<G, P, S>) -> Router
where
    G: TextGenerator + 'static,
    P: PdfConverter + 'static,
    S: BackupStore + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/fix-json", post(fix_json_handler::<G, P, S>))
        .route("/api/generate-character", post(generate_handler::<G, P, S>))
        .route("/api/refine-character", post(refine_handler::<G, P, S>))
        .route(
            "/api/process-files",
            post(process_files_handler::<G, P, S>).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/build-character", post(build_handler::<G, P, S>))
        .route(
            "/api/backups",
            get(list_backups_handler::<G, P, S>).post(save_backup_handler::<G, P, S>),
        )
        .route(
            "/api/backups/:name",
            get(load_backup_handler::<G, P, S>).delete(delete_backup_handler::<G, P, S>),
        )
        .route("/api/backups/:name/rename", post(rename_backup_handler::<G, P, S>))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FixJsonRequest {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GenerateRequest {
    prompt: String,
    model: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RefineRequest {
    prompt: String,
    model: String,
    current_character: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BuildRequest {
    form: CharacterForm,
    knowledge: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SaveBackupRequest {
    name: Option<String>,
    character: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RenameRequest {
    name: String,
}

/// Accept any JSON object as a document, filling gaps with defaults.
fn document_from(value: Option<Value>, field: &str) -> Result<CharacterDocument, ChargenError> {
    match value {
        Some(Value::Object(map)) => Ok(schema::normalize(&map, None)),
        _ => Err(ChargenError::missing_input(field)),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health: liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "chargen",
    }))
}

async fn fix_json_handler<G, P, S>(
    State(state): State<AppState<G, P, S>>,
    Json(body): Json<FixJsonRequest>,
) -> ApiResult<Json<Value>>
where
    G: TextGenerator + 'static,
    P: PdfConverter + 'static,
    S: BackupStore + 'static,
{
    let character = chargen_core::fix_json(&body.content)?;
    state.set_working(&character);
    Ok(Json(json!({ "character": character })))
}

async fn generate_handler<G, P, S>(
    State(state): State<AppState<G, P, S>>,
    headers: HeaderMap,
    Json(body): Json<GenerateRequest>,
) -> ApiResult<Json<GeneratedCharacter>>
where
    G: TextGenerator + 'static,
    P: PdfConverter + 'static,
    S: BackupStore + 'static,
{
    let generated = state
        .service
        .generate_character(&body.prompt, state.model(&body.model), state.credential(&headers))
        .await?;
    state.set_working(&generated.character);
    Ok(Json(generated))
}

async fn refine_handler<G, P, S>(
    State(state): State<AppState<G, P, S>>,
    headers: HeaderMap,
    Json(body): Json<RefineRequest>,
) -> ApiResult<Json<GeneratedCharacter>>
where
    G: TextGenerator + 'static,
    P: PdfConverter + 'static,
    S: BackupStore + 'static,
{
    let previous = document_from(body.current_character, "currentCharacter")?;
    let refined = state
        .service
        .refine_character(
            &body.prompt,
            state.model(&body.model),
            state.credential(&headers),
            &previous,
        )
        .await?;
    state.set_working(&refined.character);
    Ok(Json(refined))
}

async fn process_files_handler<G, P, S>(
    State(state): State<AppState<G, P, S>>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>>
where
    G: TextGenerator + 'static,
    P: PdfConverter + 'static,
    S: BackupStore + 'static,
{
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ChargenError::Conversion(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ChargenError::Conversion(format!("failed to read {name}: {e}")))?
            .to_vec();

        let file = match mime_type {
            Some(mime_type) if mime_type != "application/octet-stream" || is_text_file(&name) => {
                KnowledgeFile {
                    name,
                    mime_type,
                    bytes,
                }
            }
            _ => KnowledgeFile::from_path_bytes(name, bytes),
        };
        files.push(file);
    }

    let knowledge = state.service.extract_knowledge(&files).await?;
    Ok(Json(json!({ "knowledge": knowledge })))
}

async fn build_handler<G, P, S>(
    State(state): State<AppState<G, P, S>>,
    Json(body): Json<BuildRequest>,
) -> ApiResult<Json<Value>>
where
    G: TextGenerator + 'static,
    P: PdfConverter + 'static,
    S: BackupStore + 'static,
{
    let character = chargen_core::build_character(&body.form, &body.knowledge);
    state.set_working(&character);
    Ok(Json(json!({ "character": character })))
}

async fn list_backups_handler<G, P, S>(
    State(state): State<AppState<G, P, S>>,
) -> ApiResult<Json<Value>>
where
    G: TextGenerator + 'static,
    P: PdfConverter + 'static,
    S: BackupStore + 'static,
{
    let backups = state.store.list().await?;
    Ok(Json(json!({ "backups": backups })))
}

/// POST /api/backups: snapshot the given character, or the working one.
async fn save_backup_handler<G, P, S>(
    State(state): State<AppState<G, P, S>>,
    Json(body): Json<SaveBackupRequest>,
) -> ApiResult<Json<Backup>>
where
    G: TextGenerator + 'static,
    P: PdfConverter + 'static,
    S: BackupStore + 'static,
{
    let working = state.working.borrow().clone();
    let character = match body.character {
        Some(value) => document_from(Some(value), "character")?,
        None => working.ok_or_else(|| ChargenError::missing_input("character"))?,
    };

    let backup = state
        .store
        .save(body.name.as_deref().unwrap_or_default(), &character)
        .await?;
    info!(name = %backup.name, "backup saved");
    Ok(Json(backup))
}

/// GET /api/backups/:name: also makes the restored document the working one.
async fn load_backup_handler<G, P, S>(
    State(state): State<AppState<G, P, S>>,
    Path(name): Path<String>,
) -> ApiResult<Json<Backup>>
where
    G: TextGenerator + 'static,
    P: PdfConverter + 'static,
    S: BackupStore + 'static,
{
    let backup = state
        .store
        .load(&name)
        .await?
        .ok_or_else(|| ChargenError::NotFound(format!("backup {name}")))?;
    state.set_working(&backup.data);
    Ok(Json(backup))
}

async fn delete_backup_handler<G, P, S>(
    State(state): State<AppState<G, P, S>>,
    Path(name): Path<String>,
) -> ApiResult<Json<Value>>
where
    G: TextGenerator + 'static,
    P: PdfConverter + 'static,
    S: BackupStore + 'static,
{
    if state.store.delete(&name).await? {
        Ok(Json(json!({ "deleted": name })))
    } else {
        Err(ApiError(ChargenError::NotFound(format!("backup {name}"))))
    }
}

async fn rename_backup_handler<G, P, S>(
    State(state): State<AppState<G, P, S>>,
    Path(old): Path<String>,
    Json(body): Json<RenameRequest>,
) -> ApiResult<Json<Value>>
where
    G: TextGenerator + 'static,
    P: PdfConverter + 'static,
    S: BackupStore + 'static,
{
    if body.name.trim().is_empty() {
        return Err(ChargenError::missing_input("name").into());
    }
    if state.store.rename(&old, &body.name).await? {
        return Ok(Json(json!({ "renamed": true, "name": body.name.trim() })));
    }
    if state.store.load(&old).await?.is_none() {
        return Err(ChargenError::NotFound(format!("backup {old}")).into());
    }
    Ok(Json(json!({ "renamed": false, "name": old })))
}
