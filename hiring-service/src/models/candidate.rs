use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Hiring pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    Applied,
    Screening,
    Interview,
    Offered,
    Hired,
    Rejected,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Applied => "applied",
            CandidateStatus::Screening => "screening",
            CandidateStatus::Interview => "interview",
            CandidateStatus::Offered => "offered",
            CandidateStatus::Hired => "hired",
            CandidateStatus::Rejected => "rejected",
        }
    }
}

/// Row in `candidates`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Candidate {
    pub id: Uuid,
    pub job_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub cover_letter: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Candidate {
    pub fn new(
        job_id: Uuid,
        full_name: String,
        email: String,
        phone: Option<String>,
        cover_letter: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_id,
            full_name,
            email: email.to_lowercase(),
            phone: phone.filter(|p| !p.is_empty()),
            cover_letter,
            status: CandidateStatus::Applied.as_str().to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CandidateWithInterviews {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub candidate: Candidate,
    pub interview_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_application_starts_applied() {
        let candidate = Candidate::new(
            Uuid::new_v4(),
            "Lee Park".to_string(),
            "Lee@Example.com".to_string(),
            Some(String::new()),
            None,
        );
        assert_eq!(candidate.status, "applied");
        assert_eq!(candidate.email, "lee@example.com");
        assert!(candidate.phone.is_none());
    }
}
