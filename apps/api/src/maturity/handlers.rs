use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::auth::AuthUser;
use crate::data::extract::extension_of;
use crate::errors::AppError;
use crate::extractors::{AppMultipart, AppQuery};
use crate::maturity::analyzer::{build_report, normalize_evaluation_type, ParsedSheet};
use crate::maturity::recommendations::recommend;
use crate::state::AppState;

const SPREADSHEET_EXTENSIONS: [&str; 2] = [".xlsx", ".csv"];

#[derive(Debug, Deserialize)]
pub struct AnalyzeQuery {
    #[serde(rename = "type")]
    pub evaluation_type: Option<String>,
}

fn check_extension(file_name: &str) -> Result<(), AppError> {
    if SPREADSHEET_EXTENSIONS.contains(&extension_of(file_name).as_str()) {
        Ok(())
    } else {
        Err(AppError::detailed(
            StatusCode::BAD_REQUEST,
            "invalid_file_format",
            "The file must be a .xlsx or .csv spreadsheet",
        ))
    }
}

/// Pulls the `file` field out of the form, as (file name, bytes).
async fn read_spreadsheet(
    state: &AppState,
    multipart: &mut Multipart,
) -> Result<(String, Bytes), AppError> {
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

        let file_name = field.file_name().unwrap_or_default().to_string();
        check_extension(&file_name)?;

        let bytes = field.bytes().await.map_err(|e| {
            error!("Could not read uploaded spreadsheet {file_name}: {e}");
            AppError::BadRequest("file_upload_failed")
        })?;
        if bytes.len() as u64 > state.config.max_file_bytes() {
            return Err(AppError::BadRequest("file_size_exceeded"));
        }
        return Ok((file_name, bytes));
    }
}

/// POST /api/v1/maturity/analyze?type=devsecops|architecture
pub async fn handle_analyze(
    State(state): State<AppState>,
    caller: AuthUser,
    AppQuery(query): AppQuery<AnalyzeQuery>,
    AppMultipart(mut multipart): AppMultipart,
) -> Result<Json<Value>, AppError> {
    let evaluation_type = normalize_evaluation_type(query.evaluation_type.as_deref());
    let (file_name, bytes) = read_spreadsheet(&state, &mut multipart).await?;
    info!(
        "User {} submitted {file_name} ({} bytes) for a {evaluation_type} assessment",
        caller.user_id,
        bytes.len()
    );

    let parse_name = file_name.clone();
    let parsed = tokio::task::spawn_blocking(move || ParsedSheet::from_upload(&parse_name, &bytes))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| {
            error!("Could not parse {file_name}: {e}");
            AppError::detailed(StatusCode::BAD_REQUEST, "maturity_parse_error", e.to_string())
        })?;

    if parsed.axes.is_empty() {
        return Err(AppError::detailed(
            StatusCode::BAD_REQUEST,
            "maturity_no_axes_found",
            "No assessment axis was found in the spreadsheet",
        ));
    }

    let opportunities = parsed.opportunities();
    let recommendations = recommend(state.llm.as_ref(), &opportunities).await;
    let report = build_report(evaluation_type, parsed, opportunities, recommendations);
    info!(
        "Maturity analysis of {file_name}: global score {}, {} record(s)",
        report.global_score,
        report.flat_records.len()
    );

    Ok(Json(json!({
        "signal": "success",
        "data": report,
    })))
}
