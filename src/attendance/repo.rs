use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Denormalized display name; listings and exports need no join.
    pub name: String,
    /// Weekday label at marking time, e.g. "Monday".
    pub day: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub status: AttendanceStatus,
}

impl AttendanceRecord {
    pub fn date(&self) -> Date {
        self.timestamp.date()
    }
}

pub async fn list(store: &Store) -> Vec<AttendanceRecord> {
    store.attendance().await
}

/// Records filtered by optional user and inclusive date range.
pub async fn list_filtered(
    store: &Store,
    user_id: Option<Uuid>,
    from: Option<Date>,
    to: Option<Date>,
) -> Vec<AttendanceRecord> {
    store
        .attendance()
        .await
        .into_iter()
        .filter(|r| user_id.map_or(true, |id| r.user_id == id))
        .filter(|r| from.map_or(true, |d| r.date() >= d))
        .filter(|r| to.map_or(true, |d| r.date() <= d))
        .collect()
}

/// The write-time "one Present record per user per day" check.
pub async fn find_for_day(store: &Store, user_id: Uuid, date: Date) -> Option<AttendanceRecord> {
    store
        .attendance()
        .await
        .into_iter()
        .find(|r| r.user_id == user_id && r.date() == date)
}

pub async fn create(store: &Store, record: AttendanceRecord) -> anyhow::Result<AttendanceRecord> {
    store
        .update_attendance(move |records| {
            records.push(record.clone());
            Ok(record)
        })
        .await
}

/// Delete all records dated `date`; returns how many were removed.
pub async fn clear_day(store: &Store, date: Date) -> anyhow::Result<usize> {
    store
        .update_attendance(move |records| {
            let before = records.len();
            records.retain(|r| r.date() != date);
            Ok(before - records.len())
        })
        .await
}
