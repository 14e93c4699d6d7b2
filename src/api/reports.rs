//! Report API endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use super::{body, created, require, success, ApiResult, Empty};
use crate::errors::AppError;
use crate::models::{
    AddCommentRequest, CreateReportRequest, ReportPayload, ReportsPayload, UpdateStatusRequest,
};
use crate::AppState;

/// POST /api/reports - Create a new report.
pub async fn create_report(
    State(state): State<AppState>,
    payload: Result<Json<CreateReportRequest>, JsonRejection>,
) -> ApiResult<ReportPayload> {
    let request = body(payload)?;
    require(&request.user_id, "userId")?;
    require(&request.issue_type, "issueType")?;
    require(&request.description, "description")?;

    if let Some(location) = request.location {
        if !location.is_valid() {
            return Err(AppError::Validation(format!(
                "Location out of range: {}",
                location
            )));
        }
    }

    let report = state.repo.create_report(&request).await?;
    tracing::info!(
        report_id = %report.id,
        user_id = %report.user_id,
        photos = report.photos.len(),
        "Report created"
    );
    created(ReportPayload { report })
}

/// GET /api/reports/user/:user_id - List reports submitted by one user.
pub async fn list_user_reports(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<ReportsPayload> {
    let reports = state.repo.list_user_reports(&user_id).await?;
    success(ReportsPayload { reports })
}

/// GET /api/reports - List all reports.
pub async fn list_reports(State(state): State<AppState>) -> ApiResult<ReportsPayload> {
    let reports = state.repo.list_reports().await?;
    success(ReportsPayload { reports })
}

/// PUT /api/reports/:id/status - Change the status of a report.
pub async fn update_report_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> ApiResult<Empty> {
    let request = body(payload)?;
    state.repo.update_status(&id, request.status).await?;
    tracing::info!(report_id = %id, status = %request.status, "Report status updated");
    success(Empty {})
}

/// POST /api/reports/:id/comment - Append an admin comment.
pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AddCommentRequest>, JsonRejection>,
) -> ApiResult<Empty> {
    let request = body(payload)?;
    require(&request.comment, "comment")?;

    let comment = state.repo.add_comment(&id, &request).await?;
    tracing::info!(report_id = %id, comment_id = %comment.id, "Comment added");
    created(Empty {})
}

/// DELETE /api/reports/:id - Delete a report.
pub async fn delete_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Empty> {
    state.repo.delete_report(&id).await?;
    tracing::info!(report_id = %id, "Report deleted");
    success(Empty {})
}
