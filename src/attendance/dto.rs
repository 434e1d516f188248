use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo::AttendanceRecord;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Captured frame as a data-URL.
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub matched: bool,
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub already_marked: bool,
    pub record: Option<AttendanceRecord>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: Option<Uuid>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub user_id: Uuid,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize)]
pub struct DayStatus {
    pub day: String,
    pub present: bool,
}

#[derive(Debug, Serialize)]
pub struct AiSummaryResponse {
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub removed: usize,
    pub message: String,
}
