use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::conversations::store;
use crate::errors::AppError;
use crate::extractors::{AppJson, AppPath, AppQuery};
use crate::models::conversation::ConversationRow;
use crate::models::project::ProjectRow;
use crate::pagination::PageQuery;
use crate::projects::store as project_store;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub conversation_title: Option<String>,
    pub conversation_description: Option<String>,
    pub conversation_project_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConversationRequest {
    pub conversation_title: Option<String>,
    pub conversation_description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListConversationsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub project_id: Option<i32>,
}

fn required_title(title: Option<&str>) -> Result<&str, AppError> {
    title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::BadRequest("conversation_title_required"))
}

/// Conversations are private to their author, admins included.
fn check_author(conversation: &ConversationRow, caller: &AuthUser) -> Result<(), AppError> {
    if conversation.conversation_user_id == caller.user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden("forbidden"))
    }
}

/// A conversation can be opened on a public project or on one the caller owns.
fn check_project_readable(project: &ProjectRow, caller: &AuthUser) -> Result<(), AppError> {
    if project.is_public() || caller.can_act_on(project.user_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden("forbidden"))
    }
}

/// Loads a conversation owned by the caller.
pub(crate) async fn owned_conversation(
    state: &AppState,
    caller: &AuthUser,
    conversation_id: i32,
) -> Result<ConversationRow, AppError> {
    let conversation = store::find_by_id(&state.db, conversation_id)
        .await?
        .ok_or(AppError::NotFound("conversation_not_found"))?;
    check_author(&conversation, caller)?;
    Ok(conversation)
}

/// POST /api/v1/conversations
pub async fn handle_create_conversation(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(req): AppJson<CreateConversationRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let title = required_title(req.conversation_title.as_deref())?;

    let project = project_store::find_by_id(&state.db, req.conversation_project_id)
        .await?
        .ok_or(AppError::NotFound("project_not_found"))?;
    check_project_readable(&project, &caller)?;

    let conversation = store::insert(
        &state.db,
        title,
        req.conversation_description.as_deref(),
        project.project_id,
        caller.user_id,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "conversation_id": conversation.conversation_id })),
    ))
}

/// GET /api/v1/conversations/:id
pub async fn handle_get_conversation(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(conversation_id): AppPath<i32>,
) -> Result<Json<ConversationRow>, AppError> {
    Ok(Json(
        owned_conversation(&state, &caller, conversation_id).await?,
    ))
}

/// GET /api/v1/conversations?page=&page_size=&project_id=
pub async fn handle_list_conversations(
    State(state): State<AppState>,
    caller: AuthUser,
    AppQuery(query): AppQuery<ListConversationsQuery>,
) -> Result<Json<Vec<ConversationRow>>, AppError> {
    let page = PageQuery {
        page: query.page,
        page_size: query.page_size,
    }
    .resolve(DEFAULT_PAGE_SIZE);

    let conversations = store::list_by_user(
        &state.db,
        caller.user_id,
        query.project_id,
        page.offset(),
        page.limit(),
    )
    .await?;
    Ok(Json(conversations))
}

/// PUT /api/v1/conversations/:id
pub async fn handle_update_conversation(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(conversation_id): AppPath<i32>,
    AppJson(req): AppJson<UpdateConversationRequest>,
) -> Result<Json<Value>, AppError> {
    let title = match req.conversation_title.as_deref() {
        Some(title) => Some(required_title(Some(title))?),
        None => None,
    };
    owned_conversation(&state, &caller, conversation_id).await?;

    let updated = store::update(
        &state.db,
        conversation_id,
        title,
        req.conversation_description.as_deref(),
    )
    .await?
    .ok_or(AppError::NotFound("conversation_not_found"))?;

    Ok(Json(json!({
        "signal": "conversation_update_success",
        "conversation_id": updated.conversation_id,
    })))
}

/// DELETE /api/v1/conversations/:id
pub async fn handle_delete_conversation(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(conversation_id): AppPath<i32>,
) -> Result<StatusCode, AppError> {
    owned_conversation(&state, &caller, conversation_id).await?;
    if !store::delete(&state.db, conversation_id).await? {
        return Err(AppError::NotFound("conversation_not_found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
