use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    #[default]
    FullTime,
    PartTime,
    Contract,
    Internship,
    Remote,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FullTime => "full-time",
            JobType::PartTime => "part-time",
            JobType::Contract => "contract",
            JobType::Internship => "internship",
            JobType::Remote => "remote",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Active,
    Closed,
    #[default]
    Draft,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Closed => "closed",
            JobStatus::Draft => "draft",
        }
    }
}

/// Row in `jobs`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub description: String,
    pub requirements: Option<String>,
    pub location: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub job_type: String,
    pub salary_min: Option<i32>,
    pub salary_max: Option<i32>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn is_accepting_applications(&self) -> bool {
        self.status == JobStatus::Active.as_str()
    }
}

/// Job listing row with application counters.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobWithCounts {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub job: Job,
    pub candidate_count: i64,
    pub new_applications: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    #[serde(rename = "type")]
    pub job_type: Option<JobType>,
}

fn check_salary_range(min: Option<i32>, max: Option<i32>) -> Result<(), ValidationError> {
    match (min, max) {
        (Some(min), Some(max)) if max < min => {
            let mut err = ValidationError::new("salary_range");
            err.message = Some("salary_max must be greater than or equal to salary_min".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

fn validate_new_job_salary(job: &NewJob) -> Result<(), ValidationError> {
    check_salary_range(job.salary_min, job.salary_max)
}

fn validate_job_changes_salary(changes: &JobChanges) -> Result<(), ValidationError> {
    check_salary_range(changes.salary_min, changes.salary_max)
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_new_job_salary", skip_on_field_errors = false))]
pub struct NewJob {
    #[validate(length(min = 2, max = 255, message = "title must be 2 to 255 characters"))]
    pub title: String,
    #[validate(length(min = 10, message = "description must be at least 10 characters"))]
    pub description: String,
    pub requirements: Option<String>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    #[serde(rename = "type", default)]
    pub job_type: JobType,
    #[validate(range(min = 0, message = "salary_min must be non-negative"))]
    pub salary_min: Option<i32>,
    #[validate(range(min = 0, message = "salary_max must be non-negative"))]
    pub salary_max: Option<i32>,
    #[serde(default)]
    pub status: JobStatus,
}

/// Partial job update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_job_changes_salary", skip_on_field_errors = false))]
pub struct JobChanges {
    #[validate(length(min = 2, max = 255, message = "title must be 2 to 255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 10, message = "description must be at least 10 characters"))]
    pub description: Option<String>,
    pub requirements: Option<String>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<JobType>,
    #[validate(range(min = 0, message = "salary_min must be non-negative"))]
    pub salary_min: Option<i32>,
    #[validate(range(min = 0, message = "salary_max must be non-negative"))]
    pub salary_max: Option<i32>,
    pub status: Option<JobStatus>,
}

impl JobChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.requirements.is_none()
            && self.location.is_none()
            && self.job_type.is_none()
            && self.salary_min.is_none()
            && self.salary_max.is_none()
            && self.status.is_none()
    }

    /// Salary bounds after applying these changes to `job`.
    pub fn salary_range_valid_for(&self, job: &Job) -> bool {
        check_salary_range(
            self.salary_min.or(job.salary_min),
            self.salary_max.or(job.salary_max),
        )
        .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&JobType::FullTime).unwrap(),
            "\"full-time\""
        );
        let parsed: JobType = serde_json::from_str("\"part-time\"").unwrap();
        assert_eq!(parsed.as_str(), "part-time");
    }

    #[test]
    fn new_job_defaults_to_full_time_draft() {
        let job: NewJob = serde_json::from_value(serde_json::json!({
            "title": "Backend Engineer",
            "description": "Build and run the hiring APIs."
        }))
        .unwrap();

        assert!(job.validate().is_ok());
        assert_eq!(job.job_type, JobType::FullTime);
        assert_eq!(job.status, JobStatus::Draft);
    }

    #[test]
    fn inverted_salary_range_is_invalid() {
        let job: NewJob = serde_json::from_value(serde_json::json!({
            "title": "Backend Engineer",
            "description": "Build and run the hiring APIs.",
            "salary_min": 90000,
            "salary_max": 50000
        }))
        .unwrap();

        assert!(job.validate().is_err());
    }

    #[test]
    fn changes_are_checked_against_stored_salary() {
        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            title: "Backend Engineer".to_string(),
            description: "Build and run the hiring APIs.".to_string(),
            requirements: None,
            location: None,
            job_type: "full-time".to_string(),
            salary_min: Some(50000),
            salary_max: Some(80000),
            status: "active".to_string(),
            created_at: now,
            updated_at: now,
        };

        let lower_max = JobChanges {
            salary_max: Some(40000),
            ..Default::default()
        };
        assert!(lower_max.validate().is_ok());
        assert!(!lower_max.salary_range_valid_for(&job));

        let raise_both = JobChanges {
            salary_min: Some(90000),
            salary_max: Some(120000),
            ..Default::default()
        };
        assert!(raise_both.salary_range_valid_for(&job));
        assert!(JobChanges::default().is_empty());
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(serde_json::from_str::<JobStatus>("\"archived\"").is_err());
        assert_eq!(JobStatus::default(), JobStatus::Draft);
    }
}
