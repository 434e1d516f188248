use std::collections::HashSet;

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::dto::DayStatus;
use super::repo::{self, AttendanceRecord, AttendanceStatus};
use crate::images::services::{parse_data_url, ImageError};
use crate::state::AppState;
use crate::users::repo as users_repo;
use crate::users::repo::User;
use crate::vision::{matcher, JudgeError, DISABLED_MESSAGE};

/// Weekday labels shown in the weekly summary, matching the labels stored on
/// records.
pub const WEEK_DAYS: [&str; 5] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];

pub const CSV_HEADER: &str = "Date,Day,Name,Status,Timestamp";

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid captured image: {0}")]
    InvalidImage(#[from] ImageError),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// What a verification attempt came to. A no-match is an outcome, not an
/// error.
#[derive(Debug)]
pub struct VerifyOutcome {
    pub user: Option<User>,
    pub record: Option<AttendanceRecord>,
    pub already_marked: bool,
    pub message: String,
}

impl VerifyOutcome {
    fn no_match(message: impl Into<String>) -> Self {
        Self {
            user: None,
            record: None,
            already_marked: false,
            message: message.into(),
        }
    }
}

/// Run the matching policy over all registered users and, on a match, mark
/// attendance for the current UTC day. Marking is idempotent per day: a
/// second successful verification reports the existing record instead of
/// creating another.
pub async fn verify_and_mark(state: &AppState, image: &str) -> Result<VerifyOutcome, VerifyError> {
    let captured = parse_data_url(image)?;

    let users = users_repo::list(&state.store).await;
    if users.is_empty() {
        return Ok(VerifyOutcome::no_match(
            "No users registered. Please register first.",
        ));
    }

    let matched = matcher::find_match(
        state.judge.as_ref(),
        &captured,
        &users,
        state.config.match_quorum,
    )
    .await;
    let Some(user) = matched else {
        return Ok(VerifyOutcome::no_match(
            "Verification failed. Face not recognized.",
        ));
    };

    let now = OffsetDateTime::now_utc();
    if let Some(existing) = repo::find_for_day(&state.store, user.id, now.date()).await {
        let message = format!("{} has already marked attendance today.", user.name);
        return Ok(VerifyOutcome {
            user: Some(user),
            record: Some(existing),
            already_marked: true,
            message,
        });
    }

    let record = AttendanceRecord {
        id: Uuid::new_v4(),
        user_id: user.id,
        name: user.name.clone(),
        day: now.weekday().to_string(),
        timestamp: now,
        status: AttendanceStatus::Present,
    };
    let record = repo::create(&state.store, record).await?;
    tracing::info!(user_id = %user.id, name = %user.name, "attendance marked");

    let message = format!("Welcome, {}! Attendance marked.", user.name);
    Ok(VerifyOutcome {
        user: Some(user),
        record: Some(record),
        already_marked: false,
        message,
    })
}

/// Today's records, newest first, deduplicated to one entry per user.
pub async fn today(state: &AppState) -> Vec<AttendanceRecord> {
    let today = OffsetDateTime::now_utc().date();
    let mut records: Vec<_> = repo::list(&state.store)
        .await
        .into_iter()
        .filter(|r| r.date() == today)
        .collect();
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let mut seen = HashSet::new();
    records.retain(|r| seen.insert(r.user_id));
    records
}

pub async fn clear_today(state: &AppState) -> anyhow::Result<usize> {
    let removed = repo::clear_day(&state.store, OffsetDateTime::now_utc().date()).await?;
    tracing::info!(removed, "cleared today's attendance");
    Ok(removed)
}

/// Presence per weekday label for one user, or `None` for an unknown user.
pub async fn weekly_summary(state: &AppState, user_id: Uuid) -> Option<Vec<DayStatus>> {
    users_repo::find(&state.store, user_id).await?;
    let records = repo::list_filtered(&state.store, Some(user_id), None, None).await;
    Some(
        WEEK_DAYS
            .iter()
            .map(|day| DayStatus {
                day: day.to_string(),
                present: records.iter().any(|r| r.day == *day),
            })
            .collect(),
    )
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("User not found")]
    UnknownUser,
    #[error("Invalid date range: Start date cannot be after end date.")]
    InvalidRange,
}

/// Build per-day Present/Absent facts for the inclusive range and ask the
/// judge for a one-sentence summary. Judge failures degrade to fixed
/// messages rather than errors.
pub async fn ai_summary(
    state: &AppState,
    user_id: Uuid,
    from: Date,
    to: Date,
) -> Result<String, SummaryError> {
    let user = users_repo::find(&state.store, user_id)
        .await
        .ok_or(SummaryError::UnknownUser)?;
    if from > to {
        return Err(SummaryError::InvalidRange);
    }

    let records = repo::list_filtered(&state.store, Some(user_id), Some(from), Some(to)).await;
    let present: HashSet<Date> = records.iter().map(|r| r.date()).collect();

    let mut entries = Vec::new();
    let mut date = from;
    loop {
        let status = if present.contains(&date) { "Present" } else { "Absent" };
        entries.push(format!("{}: {status}", format_date(date)));
        if date == to {
            break;
        }
        match date.next_day() {
            Some(next) => date = next,
            None => break,
        }
    }

    let prompt = format!(
        "User {}'s attendance from {} to {} is as follows: {}. \
         Write a short, one-sentence summary of their attendance for this period. \
         Be encouraging if attendance is good, and gently motivational if it's not.",
        user.name,
        format_date(from),
        format_date(to),
        entries.join(", ")
    );

    match state.judge.summarize(&prompt).await {
        Ok(text) => Ok(text),
        Err(JudgeError::Disabled) => Ok(DISABLED_MESSAGE.to_string()),
        Err(e) => {
            tracing::error!(error = %e, "summary generation failed");
            Ok("Could not generate AI summary. Please try again later.".to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("User not found")]
    UnknownUser,
    #[error("Invalid date range: Start date cannot be after end date.")]
    InvalidRange,
    #[error("No attendance records found in the selected date range.")]
    NoRecords,
    #[error(transparent)]
    Format(#[from] time::error::Format),
}

/// Render one user's records in the inclusive range as CSV, oldest first.
/// An empty range is an [`ExportError::NoRecords`] notice, not a file.
pub async fn export_csv(
    state: &AppState,
    user_id: Uuid,
    from: Date,
    to: Date,
) -> Result<String, ExportError> {
    users_repo::find(&state.store, user_id)
        .await
        .ok_or(ExportError::UnknownUser)?;
    if from > to {
        return Err(ExportError::InvalidRange);
    }

    let mut records = repo::list_filtered(&state.store, Some(user_id), Some(from), Some(to)).await;
    if records.is_empty() {
        return Err(ExportError::NoRecords);
    }
    records.sort_by_key(|r| r.timestamp);

    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for r in &records {
        let timestamp = r.timestamp.format(&Rfc3339)?;
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            format_date(r.date()),
            csv_field(&r.day),
            csv_field(&r.name),
            r.status.as_str(),
            timestamp
        ));
    }
    Ok(out)
}

/// Quote a field when it contains a comma, quote or newline.
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

pub(crate) fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

pub(crate) fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::services::InlineImage;
    use crate::state::AppState;
    use crate::store::Store;
    use crate::vision::FaceJudge;
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use std::sync::{Arc, Mutex};
    use time::macros::datetime;
    use time::Duration;

    /// Always answers the same verdict; records summary prompts.
    struct StaticJudge {
        verdict: bool,
        last_prompt: Mutex<Option<String>>,
    }

    impl StaticJudge {
        fn yes() -> Arc<Self> {
            Arc::new(Self {
                verdict: true,
                last_prompt: Mutex::new(None),
            })
        }

        fn no() -> Arc<Self> {
            Arc::new(Self {
                verdict: false,
                last_prompt: Mutex::new(None),
            })
        }

        fn last_prompt(&self) -> Option<String> {
            self.last_prompt.lock().expect("prompt poisoned").clone()
        }
    }

    #[async_trait]
    impl FaceJudge for StaticJudge {
        async fn same_person(
            &self,
            _a: &InlineImage,
            _b: &InlineImage,
        ) -> Result<bool, JudgeError> {
            Ok(self.verdict)
        }

        async fn summarize(&self, prompt: &str) -> Result<String, JudgeError> {
            *self.last_prompt.lock().expect("prompt poisoned") = Some(prompt.to_string());
            Ok("Great attendance this week!".to_string())
        }
    }

    fn image_url(tag: &str) -> String {
        format!("data:image/jpeg;base64,{}", STANDARD.encode(tag.as_bytes()))
    }

    async fn register(state: &AppState, name: &str) -> User {
        use crate::users::repo::ReferenceImages;
        users_repo::create(
            &state.store,
            User {
                id: Uuid::new_v4(),
                name: name.to_string(),
                images: ReferenceImages {
                    front: image_url("front"),
                    left: image_url("left"),
                    right: image_url("right"),
                },
                registered_at: OffsetDateTime::now_utc(),
            },
        )
        .await
        .expect("create user")
    }

    async fn insert_record(store: &Store, user: &User, timestamp: OffsetDateTime) {
        repo::create(
            store,
            AttendanceRecord {
                id: Uuid::new_v4(),
                user_id: user.id,
                name: user.name.clone(),
                day: timestamp.weekday().to_string(),
                timestamp,
                status: AttendanceStatus::Present,
            },
        )
        .await
        .expect("create record");
    }

    #[tokio::test]
    async fn verify_with_no_users_is_a_no_match() {
        let state = AppState::fake_with_judge(StaticJudge::yes());
        let outcome = verify_and_mark(&state, &image_url("capture"))
            .await
            .expect("verify");
        assert!(outcome.user.is_none());
        assert!(outcome.message.contains("No users registered"));
    }

    #[tokio::test]
    async fn verify_match_creates_present_record() {
        let state = AppState::fake_with_judge(StaticJudge::yes());
        let user = register(&state, "Ada").await;

        let outcome = verify_and_mark(&state, &image_url("capture"))
            .await
            .expect("verify");
        assert_eq!(outcome.user.as_ref().expect("matched").id, user.id);
        assert!(!outcome.already_marked);
        let record = outcome.record.expect("record created");
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.name, "Ada");
        assert_eq!(record.day, record.timestamp.weekday().to_string());
        assert_eq!(repo::list(&state.store).await.len(), 1);
    }

    #[tokio::test]
    async fn second_verification_same_day_is_idempotent() {
        let state = AppState::fake_with_judge(StaticJudge::yes());
        register(&state, "Ada").await;

        verify_and_mark(&state, &image_url("capture"))
            .await
            .expect("first verify");
        let second = verify_and_mark(&state, &image_url("capture"))
            .await
            .expect("second verify");

        assert!(second.already_marked);
        assert!(second.message.contains("already marked"));
        assert_eq!(repo::list(&state.store).await.len(), 1);
    }

    #[tokio::test]
    async fn verify_no_match_stores_nothing() {
        let state = AppState::fake_with_judge(StaticJudge::no());
        register(&state, "Ada").await;

        let outcome = verify_and_mark(&state, &image_url("capture"))
            .await
            .expect("verify");
        assert!(outcome.user.is_none());
        assert!(outcome.message.contains("not recognized"));
        assert!(repo::list(&state.store).await.is_empty());
    }

    #[tokio::test]
    async fn verify_rejects_malformed_capture() {
        let state = AppState::fake_with_judge(StaticJudge::yes());
        register(&state, "Ada").await;
        let err = verify_and_mark(&state, "not an image").await.unwrap_err();
        assert!(matches!(err, VerifyError::InvalidImage(_)));
    }

    #[tokio::test]
    async fn verify_with_disabled_judge_degrades_to_no_match() {
        let state = AppState::fake();
        register(&state, "Ada").await;
        let outcome = verify_and_mark(&state, &image_url("capture"))
            .await
            .expect("verify");
        assert!(outcome.user.is_none());
        assert!(repo::list(&state.store).await.is_empty());
    }

    #[tokio::test]
    async fn today_dedupes_and_sorts_newest_first() {
        let state = AppState::fake();
        let ada = register(&state, "Ada").await;
        let grace = register(&state, "Grace").await;

        // offsets in seconds so the records stay on today's date
        let now = OffsetDateTime::now_utc();
        insert_record(&state.store, &ada, now - Duration::seconds(30)).await;
        insert_record(&state.store, &ada, now - Duration::seconds(10)).await;
        insert_record(&state.store, &grace, now - Duration::seconds(20)).await;
        insert_record(&state.store, &grace, now - Duration::days(1)).await;

        let listed = today(&state).await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].user_id, ada.id);
        assert_eq!(listed[1].user_id, grace.id);
    }

    #[tokio::test]
    async fn clear_today_spares_other_days() {
        let state = AppState::fake();
        let ada = register(&state, "Ada").await;
        let now = OffsetDateTime::now_utc();
        insert_record(&state.store, &ada, now).await;
        insert_record(&state.store, &ada, now - Duration::days(1)).await;

        let removed = clear_today(&state).await.expect("clear");
        assert_eq!(removed, 1);
        let left = repo::list(&state.store).await;
        assert_eq!(left.len(), 1);
        assert_ne!(left[0].date(), now.date());
    }

    #[tokio::test]
    async fn weekly_summary_reflects_day_labels() {
        let state = AppState::fake();
        let ada = register(&state, "Ada").await;
        // 2026-01-05 is a Monday
        insert_record(&state.store, &ada, datetime!(2026-01-05 9:00 UTC)).await;

        let summary = weekly_summary(&state, ada.id).await.expect("known user");
        assert_eq!(summary.len(), WEEK_DAYS.len());
        assert!(summary[0].present, "Monday should be present");
        assert!(!summary[1].present, "Tuesday should be absent");

        assert!(weekly_summary(&state, Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn ai_summary_builds_per_day_facts() {
        let judge = StaticJudge::yes();
        let state = AppState::fake_with_judge(judge.clone());
        let ada = register(&state, "Ada").await;
        insert_record(&state.store, &ada, datetime!(2026-01-05 9:00 UTC)).await;

        let summary = ai_summary(
            &state,
            ada.id,
            datetime!(2026-01-05 0:00 UTC).date(),
            datetime!(2026-01-07 0:00 UTC).date(),
        )
        .await
        .expect("summary");
        assert_eq!(summary, "Great attendance this week!");

        let prompt = judge.last_prompt().expect("prompt sent");
        assert!(prompt.contains("User Ada's attendance from 2026-01-05 to 2026-01-07"));
        assert!(prompt.contains("2026-01-05: Present"));
        assert!(prompt.contains("2026-01-06: Absent"));
        assert!(prompt.contains("2026-01-07: Absent"));
    }

    #[tokio::test]
    async fn ai_summary_rejects_reversed_range() {
        let state = AppState::fake_with_judge(StaticJudge::yes());
        let ada = register(&state, "Ada").await;
        let err = ai_summary(
            &state,
            ada.id,
            datetime!(2026-01-07 0:00 UTC).date(),
            datetime!(2026-01-05 0:00 UTC).date(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SummaryError::InvalidRange));
    }

    #[tokio::test]
    async fn ai_summary_without_key_reports_disabled() {
        let state = AppState::fake();
        let ada = register(&state, "Ada").await;
        let summary = ai_summary(
            &state,
            ada.id,
            datetime!(2026-01-05 0:00 UTC).date(),
            datetime!(2026-01-05 0:00 UTC).date(),
        )
        .await
        .expect("summary");
        assert_eq!(summary, DISABLED_MESSAGE);
    }

    #[tokio::test]
    async fn csv_row_count_matches_range() {
        let state = AppState::fake();
        let ada = register(&state, "Ada").await;
        insert_record(&state.store, &ada, datetime!(2026-01-05 9:00 UTC)).await;
        insert_record(&state.store, &ada, datetime!(2026-01-06 9:00 UTC)).await;
        insert_record(&state.store, &ada, datetime!(2026-01-12 9:00 UTC)).await;

        let csv = export_csv(
            &state,
            ada.id,
            datetime!(2026-01-05 0:00 UTC).date(),
            datetime!(2026-01-09 0:00 UTC).date(),
        )
        .await
        .expect("export");

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines.len(), 3, "header plus two in-range records");
        assert!(lines[1].starts_with("2026-01-05,Monday,Ada,Present,"));
        assert!(lines[2].starts_with("2026-01-06,Tuesday,Ada,Present,"));
    }

    #[tokio::test]
    async fn csv_escapes_awkward_names() {
        let state = AppState::fake();
        let user = register(&state, "Lovelace, Ada \"The First\"").await;
        insert_record(&state.store, &user, datetime!(2026-01-05 9:00 UTC)).await;

        let csv = export_csv(
            &state,
            user.id,
            datetime!(2026-01-05 0:00 UTC).date(),
            datetime!(2026-01-05 0:00 UTC).date(),
        )
        .await
        .expect("export");
        assert!(csv.contains("\"Lovelace, Ada \"\"The First\"\"\""));
    }

    #[tokio::test]
    async fn csv_outside_range_is_a_notice() {
        let state = AppState::fake();
        let ada = register(&state, "Ada").await;
        insert_record(&state.store, &ada, datetime!(2026-01-05 9:00 UTC)).await;

        let err = export_csv(
            &state,
            ada.id,
            datetime!(2026-02-01 0:00 UTC).date(),
            datetime!(2026-02-07 0:00 UTC).date(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ExportError::NoRecords));
    }

    #[tokio::test]
    async fn csv_rejects_unknown_user_and_reversed_range() {
        let state = AppState::fake();
        let err = export_csv(
            &state,
            Uuid::new_v4(),
            datetime!(2026-01-05 0:00 UTC).date(),
            datetime!(2026-01-06 0:00 UTC).date(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ExportError::UnknownUser));

        let ada = register(&state, "Ada").await;
        let err = export_csv(
            &state,
            ada.id,
            datetime!(2026-01-06 0:00 UTC).date(),
            datetime!(2026-01-05 0:00 UTC).date(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ExportError::InvalidRange));
    }

    #[test]
    fn date_parsing_roundtrip() {
        let date = parse_date("2026-01-05").expect("parse");
        assert_eq!(format_date(date), "2026-01-05");
        assert!(parse_date("05/01/2026").is_none());
        assert!(parse_date("not a date").is_none());
    }
}
