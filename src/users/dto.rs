use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::User;

#[derive(Debug, Deserialize)]
pub struct RegisterImages {
    pub front: String,
    pub left: String,
    pub right: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub name: String,
    pub images: RegisterImages,
}

/// User as returned by the API; image payloads stay server-side.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub registered_at: OffsetDateTime,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            registered_at: user.registered_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedUserResponse {
    pub id: Uuid,
    pub name: String,
    pub records_removed: usize,
}
