use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use time::Date;
use tracing::{error, instrument};

use super::dto::{
    AiSummaryResponse, ClearedResponse, DayStatus, ListQuery, RangeQuery, UserQuery,
    VerifyRequest, VerifyResponse,
};
use super::repo::{self, AttendanceRecord};
use super::services::{self, ExportError, SummaryError, VerifyError};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/attendance/verify", post(verify))
        .route("/attendance", get(list_records))
        .route("/attendance/today", get(todays_records).delete(clear_today))
        .route("/attendance/summary", get(weekly_summary))
        .route("/attendance/summary/ai", get(ai_summary))
        .route("/attendance/export", get(export_csv))
        // one camera frame arrives base64-encoded in the verify body
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
}

#[instrument(skip(state, body))]
async fn verify(
    State(state): State<AppState>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, (StatusCode, String)> {
    match services::verify_and_mark(&state, &body.image).await {
        Ok(outcome) => Ok(Json(VerifyResponse {
            matched: outcome.user.is_some(),
            user_id: outcome.user.as_ref().map(|u| u.id),
            name: outcome.user.map(|u| u.name),
            already_marked: outcome.already_marked,
            record: outcome.record,
            message: outcome.message,
        })),
        Err(e @ VerifyError::InvalidImage(_)) => Err((StatusCode::BAD_REQUEST, e.to_string())),
        Err(VerifyError::Storage(e)) => Err(internal(e)),
    }
}

#[instrument(skip(state))]
async fn list_records(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<AttendanceRecord>>, (StatusCode, String)> {
    let from = parse_optional_date(q.from.as_deref())?;
    let to = parse_optional_date(q.to.as_deref())?;
    let records = repo::list_filtered(&state.store, q.user_id, from, to).await;
    Ok(Json(records))
}

#[instrument(skip(state))]
async fn todays_records(State(state): State<AppState>) -> Json<Vec<AttendanceRecord>> {
    Json(services::today(&state).await)
}

#[instrument(skip(state))]
async fn clear_today(
    State(state): State<AppState>,
) -> Result<Json<ClearedResponse>, (StatusCode, String)> {
    let removed = services::clear_today(&state).await.map_err(internal)?;
    Ok(Json(ClearedResponse {
        removed,
        message: "Today's attendance records have been cleared.".into(),
    }))
}

#[instrument(skip(state))]
async fn weekly_summary(
    State(state): State<AppState>,
    Query(q): Query<UserQuery>,
) -> Result<Json<Vec<DayStatus>>, (StatusCode, String)> {
    match services::weekly_summary(&state, q.user_id).await {
        Some(summary) => Ok(Json(summary)),
        None => Err((StatusCode::NOT_FOUND, "User not found".into())),
    }
}

#[instrument(skip(state))]
async fn ai_summary(
    State(state): State<AppState>,
    Query(q): Query<RangeQuery>,
) -> Result<Json<AiSummaryResponse>, (StatusCode, String)> {
    let (from, to) = parse_range(&q)?;
    match services::ai_summary(&state, q.user_id, from, to).await {
        Ok(summary) => Ok(Json(AiSummaryResponse { summary })),
        Err(e @ SummaryError::UnknownUser) => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(e @ SummaryError::InvalidRange) => Err((StatusCode::BAD_REQUEST, e.to_string())),
    }
}

#[instrument(skip(state))]
async fn export_csv(
    State(state): State<AppState>,
    Query(q): Query<RangeQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let (from, to) = parse_range(&q)?;
    match services::export_csv(&state, q.user_id, from, to).await {
        Ok(csv) => Ok((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"attendance.csv\"",
                ),
            ],
            csv,
        )),
        Err(e @ ExportError::NoRecords) => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(e @ ExportError::UnknownUser) => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(e @ ExportError::InvalidRange) => Err((StatusCode::BAD_REQUEST, e.to_string())),
        Err(ExportError::Format(e)) => Err(internal(e.into())),
    }
}

fn parse_range(q: &RangeQuery) -> Result<(Date, Date), (StatusCode, String)> {
    let from = parse_date(&q.from)?;
    let to = parse_date(&q.to)?;
    Ok((from, to))
}

fn parse_date(raw: &str) -> Result<Date, (StatusCode, String)> {
    services::parse_date(raw).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("invalid date (expected YYYY-MM-DD): {raw}"),
        )
    })
}

fn parse_optional_date(raw: Option<&str>) -> Result<Option<Date>, (StatusCode, String)> {
    raw.map(parse_date).transpose()
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "attendance handler failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".into(),
    )
}
