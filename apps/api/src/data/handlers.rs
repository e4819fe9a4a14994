use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::auth::AuthUser;
use crate::data::chunker::split_lines;
use crate::data::extract::{load_file, FileContent};
use crate::data::upload::{create_unique_file, save_field, validate_content_type, UploadRejection};
use crate::data::{project_dir, store};
use crate::errors::AppError;
use crate::extractors::{AppJson, AppMultipart, AppPath};
use crate::models::chunk::NewChunk;
use crate::models::project::ProjectRow;
use crate::projects::store as project_store;
use crate::state::AppState;

fn default_chunk_size() -> usize {
    100
}

fn default_overlap_size() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub file_id: Option<String>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap_size")]
    pub overlap_size: usize,
    #[serde(default)]
    pub do_reset: i32,
}

impl From<UploadRejection> for AppError {
    fn from(rejection: UploadRejection) -> Self {
        AppError::BadRequest(rejection.signal())
    }
}

/// Ids above what the sequence has handed out are never created here, so a
/// later `nextval` cannot land on them.
fn can_create_project(project_id: i32, last_allocated: i64) -> bool {
    project_id >= 1 && i64::from(project_id) <= last_allocated
}

fn owned_by(project: ProjectRow, caller: &AuthUser) -> Result<ProjectRow, AppError> {
    if caller.can_act_on(project.user_id) {
        Ok(project)
    } else {
        Err(AppError::Forbidden("forbidden"))
    }
}

/// Fetches the project, recreating it for the caller when its id was handed
/// out but the row is gone.
async fn resolve_project(
    state: &AppState,
    caller: &AuthUser,
    project_id: i32,
) -> Result<ProjectRow, AppError> {
    if let Some(project) = project_store::find_by_id(&state.db, project_id).await? {
        return owned_by(project, caller);
    }

    let last_allocated = project_store::last_allocated_id(&state.db).await?;
    if !can_create_project(project_id, last_allocated) {
        return Err(AppError::NotFound("project_not_found"));
    }

    info!(
        "Creating project {project_id} on the fly for user {}",
        caller.user_id
    );
    let project = project_store::insert_with_id(&state.db, project_id, caller.user_id).await?;
    // Someone else may have claimed the id in between.
    owned_by(project, caller)
}

/// Turns extracted content into rows. Slides are kept whole; text goes
/// through the line splitter. Orders are 1-based.
fn build_chunks(
    content: FileContent,
    asset_name: &str,
    chunk_size: usize,
    project_id: i32,
    asset_id: i32,
) -> Vec<NewChunk> {
    let pieces: Vec<(String, Value)> = match content {
        FileContent::Slides(slides) => slides
            .into_iter()
            .map(|slide| {
                let metadata = json!({
                    "source": asset_name,
                    "slide_title": slide.title,
                    "page": slide.number,
                    "format": "powerpoint",
                });
                (slide.text, metadata)
            })
            .collect(),
        FileContent::Text(texts) => split_lines(&texts, chunk_size)
            .into_iter()
            .map(|text| (text, json!({ "source": asset_name })))
            .collect(),
    };

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, (text, metadata))| NewChunk {
            text,
            metadata,
            order: i as i32 + 1,
            project_id,
            asset_id,
        })
        .collect()
}

// ─── Handlers ────────────────────────────────────────────────────────────────

/// GET /api/v1/data/assets/:project_id
pub async fn handle_list_assets(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(project_id): AppPath<i32>,
) -> Result<Json<Value>, AppError> {
    let project = resolve_project(&state, &caller, project_id).await?;
    let assets: Vec<Value> = store::list_file_assets(&state.db, project.project_id)
        .await?
        .into_iter()
        .map(|asset| {
            json!({
                "asset_id": asset.asset_id,
                "asset_name": asset.asset_name,
                "asset_size": asset.asset_size,
                "created_at": asset.created_at,
            })
        })
        .collect();

    Ok(Json(json!({ "signal": "assets_list_success", "assets": assets })))
}

/// POST /api/v1/data/upload/:project_id
pub async fn handle_upload(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(project_id): AppPath<i32>,
    AppMultipart(mut multipart): AppMultipart,
) -> Result<Json<Value>, AppError> {
    let project = resolve_project(&state, &caller, project_id).await?;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(AppError::BadRequest("file_upload_failed")),
            Err(e) => {
                error!("Malformed multipart body: {e}");
                return Err(AppError::BadRequest("file_upload_failed"));
            }
        };
        if field.name() != Some("file") {
            continue;
        }

        validate_content_type(&state.config, field.content_type())?;
        let content_type = field.content_type().unwrap_or_default().to_string();
        let original_name = field.file_name().unwrap_or("file").to_string();

        let dir = project_dir(&state.config.files_dir, project.project_id);
        tokio::fs::create_dir_all(&dir).await?;
        let (file, path, asset_name) = create_unique_file(&dir, &original_name).await?;

        let size = save_field(&state.config, field, file, &path).await?;

        let asset = store::insert_asset(
            &state.db,
            project.project_id,
            &asset_name,
            size as i64,
            Some(json!({ "content_type": content_type, "original_name": original_name })),
        )
        .await?;
        info!(
            "Stored {asset_name} ({size} bytes) for project {}",
            project.project_id
        );

        return Ok(Json(json!({
            "signal": "file_upload_success",
            "file_id": asset.asset_id.to_string(),
            "asset_name": asset.asset_name,
        })));
    }
}

/// POST /api/v1/data/process/:project_id
pub async fn handle_process(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(project_id): AppPath<i32>,
    AppJson(req): AppJson<ProcessRequest>,
) -> Result<Json<Value>, AppError> {
    let project = resolve_project(&state, &caller, project_id).await?;
    debug!(
        "Processing project {project_id}: chunk_size={}, overlap_size={}, do_reset={}",
        req.chunk_size, req.overlap_size, req.do_reset
    );

    let assets = match req.file_id.as_deref() {
        Some(file_id) => vec![store::find_asset(&state.db, project.project_id, file_id)
            .await?
            .ok_or(AppError::BadRequest("file_id_error"))?],
        None => store::list_file_assets(&state.db, project.project_id).await?,
    };
    if assets.is_empty() {
        return Err(AppError::BadRequest("no_files_error"));
    }

    if req.do_reset == 1 {
        state.vectors.delete_collection(project.project_id).await?;
        let removed = store::delete_project_chunks(&state.db, project.project_id).await?;
        info!("Reset project {project_id}: {removed} chunks removed");
    }

    let dir = project_dir(&state.config.files_dir, project.project_id);
    let mut inserted_chunks = 0u64;
    let mut processed_files = 0u64;

    for asset in assets {
        let path = dir.join(&asset.asset_name);
        let content = match tokio::task::spawn_blocking(move || load_file(&path))
            .await
            .map_err(|e| AppError::Internal(e.into()))?
        {
            Ok(content) => content,
            Err(e) => {
                error!("Error while processing file {}: {e}", asset.asset_name);
                continue;
            }
        };

        let chunks = build_chunks(
            content,
            &asset.asset_name,
            req.chunk_size,
            project.project_id,
            asset.asset_id,
        );
        if chunks.is_empty() {
            return Err(AppError::BadRequest("processing_failed"));
        }

        inserted_chunks += store::insert_chunks(&state.db, &chunks).await?;
        processed_files += 1;
    }

    Ok(Json(json!({
        "signal": "processing_success",
        "inserted_chunks": inserted_chunks,
        "processed_files": processed_files,
    })))
}

/// DELETE /api/v1/data/asset/:project_id/:asset_name
pub async fn handle_delete_asset(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath((project_id, asset_name)): AppPath<(i32, String)>,
) -> Result<Json<Value>, AppError> {
    let project = resolve_project(&state, &caller, project_id).await?;
    let asset = store::find_asset(&state.db, project.project_id, &asset_name)
        .await?
        .ok_or(AppError::BadRequest("file_id_error"))?;

    let chunk_ids = store::chunk_ids_for_asset(&state.db, asset.asset_id).await?;
    state
        .vectors
        .delete_vectors(project.project_id, &chunk_ids)
        .await?;
    store::delete_asset_chunks(&state.db, asset.asset_id).await?;
    store::delete_asset(&state.db, asset.asset_id).await?;

    let path = project_dir(&state.config.files_dir, project.project_id).join(&asset.asset_name);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            error!("Error deleting asset file {}: {e}", path.display());
        }
    }
    info!("Deleted asset {} of project {project_id}", asset.asset_name);

    Ok(Json(json!({
        "signal": "asset_delete_success",
        "asset_name": asset.asset_name,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::extract::Slide;
    use crate::models::user::UserRole;

    #[test]
    fn test_process_request_defaults() {
        let req: ProcessRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.chunk_size, 100);
        assert_eq!(req.overlap_size, 20);
        assert_eq!(req.do_reset, 0);
        assert!(req.file_id.is_none());
    }

    #[test]
    fn test_text_chunks_are_numbered_from_one() {
        let content = FileContent::Text(vec!["first line\nsecond line".to_string()]);
        let chunks = build_chunks(content, "notes.txt", 5, 3, 9);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].order, 1);
        assert_eq!(chunks[1].order, 2);
        assert_eq!(chunks[1].text, "second line");
        assert_eq!(chunks[0].project_id, 3);
        assert_eq!(chunks[0].asset_id, 9);
        assert_eq!(chunks[0].metadata["source"], "notes.txt");
    }

    #[test]
    fn test_slides_become_chunks_as_is() {
        let content = FileContent::Slides(vec![
            Slide {
                number: 1,
                title: "Intro".to_string(),
                text: "Slide Number : 1\nSlide Title : Intro".to_string(),
            },
            Slide {
                number: 2,
                title: String::new(),
                text: "Slide Number : 2\nSlide Title : ".to_string(),
            },
        ]);
        let chunks = build_chunks(content, "deck.pptx", 5, 1, 1);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata["format"], "powerpoint");
        assert_eq!(chunks[0].metadata["slide_title"], "Intro");
        assert_eq!(chunks[1].metadata["page"], 2);
        assert!(chunks[0].text.starts_with("Slide Number : 1"));
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunks = build_chunks(FileContent::Text(vec![String::new()]), "e.txt", 100, 1, 1);
        assert!(chunks.is_empty());
    }

    fn project(project_id: i32, user_id: i32) -> ProjectRow {
        ProjectRow {
            project_id,
            project_uuid: uuid::Uuid::new_v4(),
            nom_projet: None,
            description_projet: None,
            visibility: "private".to_string(),
            user_id,
            created_at: chrono::Utc::now(),
            updated_at: None,
        }
    }

    fn caller(user_id: i32, role: UserRole) -> AuthUser {
        AuthUser { user_id, role }
    }

    #[test]
    fn test_only_handed_out_ids_are_created() {
        assert!(can_create_project(3, 10));
        assert!(can_create_project(10, 10));
        assert!(!can_create_project(11, 10));
        assert!(!can_create_project(i32::MAX, 10));
        assert!(!can_create_project(1, 0));
        assert!(!can_create_project(0, 10));
        assert!(!can_create_project(-5, 10));
    }

    #[test]
    fn test_project_of_someone_else_is_forbidden() {
        let err = owned_by(project(4, 2), &caller(7, UserRole::User)).unwrap_err();
        assert_eq!(err.signal(), "forbidden");

        assert_eq!(owned_by(project(4, 7), &caller(7, UserRole::User)).unwrap().project_id, 4);
        assert!(owned_by(project(4, 2), &caller(1, UserRole::Admin)).is_ok());
    }

    #[test]
    fn test_upload_rejection_maps_to_bad_request() {
        let err: AppError = UploadRejection::TypeNotSupported.into();
        assert_eq!(err.signal(), "file_type_not_supported");
    }
}
