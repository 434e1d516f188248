use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use tracing::{error, instrument};
use uuid::Uuid;

use super::dto::{DeletedUserResponse, RegisterUserRequest, UserResponse};
use super::repo;
use super::services::{self, RegisterError};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register_user).get(list_users))
        .route("/users/:id", delete(delete_user))
        // three camera frames arrive base64-encoded in one body
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
}

#[instrument(skip(state, body))]
async fn register_user(
    State(state): State<AppState>,
    Json(body): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), (StatusCode, String)> {
    match services::register(&state, body).await {
        Ok(user) => Ok((StatusCode::CREATED, Json(UserResponse::from(user)))),
        Err(e @ RegisterError::NameTaken) => Err((StatusCode::CONFLICT, e.to_string())),
        Err(e @ (RegisterError::InvalidName | RegisterError::InvalidImage { .. })) => {
            Err((StatusCode::BAD_REQUEST, e.to_string()))
        }
        Err(RegisterError::Storage(e)) => Err(internal(e)),
    }
}

#[instrument(skip(state))]
async fn list_users(State(state): State<AppState>) -> Json<Vec<UserResponse>> {
    let users = repo::list(&state.store).await;
    Json(users.into_iter().map(UserResponse::from).collect())
}

#[instrument(skip(state))]
async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedUserResponse>, (StatusCode, String)> {
    match services::delete(&state, id).await {
        Ok(Some((user, records_removed))) => Ok(Json(DeletedUserResponse {
            id: user.id,
            name: user.name,
            records_removed,
        })),
        Ok(None) => Err((StatusCode::NOT_FOUND, "User not found".into())),
        Err(e) => Err(internal(e)),
    }
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "users handler failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".into(),
    )
}
