use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::conversations::handlers::owned_conversation;
use crate::errors::AppError;
use crate::extractors::{AppJson, AppPath, AppQuery};
use crate::messages::store;
use crate::models::message::MessageRow;
use crate::pagination::PageQuery;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub message_content: Option<String>,
    pub message_sender: Option<String>,
    pub message_conversation_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMessageRequest {
    pub message_content: Option<String>,
    pub message_sender: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListMessagesQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub conversation_id: Option<i32>,
}

async fn authored_message(
    state: &AppState,
    caller: &AuthUser,
    message_id: i32,
) -> Result<MessageRow, AppError> {
    let message = store::find_by_id(&state.db, message_id)
        .await?
        .ok_or(AppError::NotFound("message_not_found"))?;
    if message.message_user_id != caller.user_id {
        return Err(AppError::Forbidden("forbidden"));
    }
    Ok(message)
}

fn non_empty_content(content: Option<&str>) -> Result<&str, AppError> {
    content
        .filter(|c| !c.trim().is_empty())
        .ok_or(AppError::BadRequest("message_content_required"))
}

/// POST /api/v1/messages
pub async fn handle_create_message(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(req): AppJson<CreateMessageRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let content = non_empty_content(req.message_content.as_deref())?;
    let conversation = owned_conversation(&state, &caller, req.message_conversation_id).await?;

    let message = store::insert(
        &state.db,
        content,
        req.message_sender.as_deref(),
        conversation.conversation_id,
        caller.user_id,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message_id": message.message_id })),
    ))
}

/// GET /api/v1/messages/:id
pub async fn handle_get_message(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(message_id): AppPath<i32>,
) -> Result<Json<MessageRow>, AppError> {
    Ok(Json(authored_message(&state, &caller, message_id).await?))
}

/// GET /api/v1/messages?page=&page_size=&conversation_id=
pub async fn handle_list_messages(
    State(state): State<AppState>,
    caller: AuthUser,
    AppQuery(query): AppQuery<ListMessagesQuery>,
) -> Result<Json<Vec<MessageRow>>, AppError> {
    if let Some(conversation_id) = query.conversation_id {
        owned_conversation(&state, &caller, conversation_id).await?;
    }
    let page = PageQuery {
        page: query.page,
        page_size: query.page_size,
    }
    .resolve(DEFAULT_PAGE_SIZE);

    let messages = store::list_by_user(
        &state.db,
        caller.user_id,
        query.conversation_id,
        page.offset(),
        page.limit(),
    )
    .await?;
    Ok(Json(messages))
}

/// PUT /api/v1/messages/:id
pub async fn handle_update_message(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(message_id): AppPath<i32>,
    AppJson(req): AppJson<UpdateMessageRequest>,
) -> Result<Json<Value>, AppError> {
    authored_message(&state, &caller, message_id).await?;

    let content = match req.message_content.as_deref() {
        Some(content) => Some(non_empty_content(Some(content))?),
        None => None,
    };
    let updated = store::update(
        &state.db,
        message_id,
        content,
        req.message_sender.as_deref(),
    )
    .await?
    .ok_or(AppError::NotFound("message_not_found"))?;

    Ok(Json(json!({
        "signal": "message_update_success",
        "message_id": updated.message_id,
    })))
}

/// DELETE /api/v1/messages/:id
pub async fn handle_delete_message(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(message_id): AppPath<i32>,
) -> Result<StatusCode, AppError> {
    authored_message(&state, &caller, message_id).await?;
    if !store::delete(&state.db, message_id).await? {
        return Err(AppError::NotFound("message_not_found"));
    }
    Ok(StatusCode::NO_CONTENT)
}
