use axum::{extract::State, http::StatusCode, routing::delete, Json, Router};
use serde::Serialize;
use tracing::{error, instrument};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ClearAllResponse {
    pub users_removed: usize,
    pub records_removed: usize,
    pub message: String,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/admin/data", delete(clear_all))
}

/// Wipe both collections. Registrations and records are gone for good; the
/// client is expected to confirm with the operator first.
#[instrument(skip(state))]
async fn clear_all(
    State(state): State<AppState>,
) -> Result<Json<ClearAllResponse>, (StatusCode, String)> {
    let result = state
        .store
        .update_all(|users, attendance| {
            let counts = (users.len(), attendance.len());
            users.clear();
            attendance.clear();
            Ok(counts)
        })
        .await;

    match result {
        Ok((users_removed, records_removed)) => {
            tracing::info!(users_removed, records_removed, "all application data cleared");
            Ok(Json(ClearAllResponse {
                users_removed,
                records_removed,
                message: "All application data has been successfully cleared.".into(),
            }))
        }
        Err(e) => {
            error!(error = %e, "clear all failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".into(),
            ))
        }
    }
}
