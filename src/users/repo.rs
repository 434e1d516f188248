use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::Store;

/// The three reference images captured at registration, stored as data-URLs
/// and never updated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceImages {
    pub front: String,
    pub left: String,
    pub right: String,
}

impl ReferenceImages {
    /// Pose label + payload pairs, in capture order.
    pub fn poses(&self) -> [(&'static str, &str); 3] {
        [
            ("front", self.front.as_str()),
            ("left", self.left.as_str()),
            ("right", self.right.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub images: ReferenceImages,
    #[serde(with = "time::serde::rfc3339")]
    pub registered_at: OffsetDateTime,
}

pub async fn list(store: &Store) -> Vec<User> {
    store.users().await
}

pub async fn find(store: &Store, id: Uuid) -> Option<User> {
    store.users().await.into_iter().find(|u| u.id == id)
}

/// Case-insensitive name lookup; the only uniqueness check in the system,
/// applied at write time rather than by the storage layer.
pub async fn name_taken(store: &Store, name: &str) -> bool {
    let needle = name.to_lowercase();
    store
        .users()
        .await
        .iter()
        .any(|u| u.name.to_lowercase() == needle)
}

pub async fn create(store: &Store, user: User) -> anyhow::Result<User> {
    store
        .update_users(move |users| {
            users.push(user.clone());
            Ok(user)
        })
        .await
}

/// Remove the user and every attendance record pointing at them. Returns the
/// removed user and the number of cascaded records, or `None` for an unknown
/// id.
pub async fn delete_cascade(store: &Store, id: Uuid) -> anyhow::Result<Option<(User, usize)>> {
    store
        .update_all(move |users, attendance| {
            let Some(pos) = users.iter().position(|u| u.id == id) else {
                return Ok(None);
            };
            let user = users.remove(pos);
            let before = attendance.len();
            attendance.retain(|r| r.user_id != id);
            Ok(Some((user, before - attendance.len())))
        })
        .await
}
