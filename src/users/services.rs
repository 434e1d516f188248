use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::RegisterUserRequest;
use super::repo::{self, ReferenceImages, User};
use crate::images::services::{parse_data_url, ImageError};
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("Please enter a valid name.")]
    InvalidName,
    #[error("This name is already registered. Please choose a different one.")]
    NameTaken,
    #[error("invalid {pose} image: {source}")]
    InvalidImage {
        pose: &'static str,
        #[source]
        source: ImageError,
    },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Validate and store a new user. Names are rejected when blank or when they
/// duplicate an existing name case-insensitively, and all three reference
/// images must be valid data-URLs; nothing is persisted until every check
/// passes.
pub async fn register(state: &AppState, req: RegisterUserRequest) -> Result<User, RegisterError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(RegisterError::InvalidName);
    }
    if repo::name_taken(&state.store, name).await {
        return Err(RegisterError::NameTaken);
    }

    let images = ReferenceImages {
        front: req.images.front,
        left: req.images.left,
        right: req.images.right,
    };
    for (pose, payload) in images.poses() {
        parse_data_url(payload).map_err(|source| RegisterError::InvalidImage { pose, source })?;
    }

    let user = User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        images,
        registered_at: OffsetDateTime::now_utc(),
    };
    let user = repo::create(&state.store, user).await?;
    tracing::info!(user_id = %user.id, name = %user.name, "user registered");
    Ok(user)
}

/// Delete a user and cascade to their attendance records.
pub async fn delete(state: &AppState, id: Uuid) -> anyhow::Result<Option<(User, usize)>> {
    let removed = repo::delete_cascade(&state.store, id).await?;
    if let Some((user, records)) = &removed {
        tracing::info!(user_id = %user.id, name = %user.name, cascaded = records, "user deleted");
    }
    Ok(removed)
}
