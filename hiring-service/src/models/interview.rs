use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewType {
    Phone,
    #[default]
    Video,
    Onsite,
    Technical,
}

impl InterviewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewType::Phone => "phone",
            InterviewType::Video => "video",
            InterviewType::Onsite => "onsite",
            InterviewType::Technical => "technical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl InterviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::Scheduled => "scheduled",
            InterviewStatus::Completed => "completed",
            InterviewStatus::Cancelled => "cancelled",
        }
    }
}

/// Row in `interviews`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Interview {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub interview_type: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_duration() -> i32 {
    60
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewInterview {
    pub scheduled_at: DateTime<Utc>,
    #[validate(range(min = 15, max = 480, message = "duration_minutes must be between 15 and 480"))]
    #[serde(default = "default_duration")]
    pub duration_minutes: i32,
    #[serde(rename = "type", default)]
    pub interview_type: InterviewType,
    #[validate(length(max = 2000, message = "notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

impl NewInterview {
    pub fn starts_after(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at > now
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InterviewChanges {
    pub status: InterviewStatus,
    #[validate(length(max = 2000, message = "notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}
