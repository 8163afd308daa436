use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::utils::validation::{OPTIONAL_PHONE_RE, OPTIONAL_URL_RE, TEAM_SIZE_RE, YEAR_RE};

/// Row in `company_profiles`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Company {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub company_name: String,
    pub about_us: Option<String>,
    pub organization_type: Option<String>,
    pub company_type: Option<String>,
    pub team_size: Option<String>,
    pub year_established: Option<String>,
    pub website: Option<String>,
    pub vision: Option<String>,
    pub logo_url: Option<String>,
    pub banner_url: Option<String>,
    pub facebook_url: Option<String>,
    pub twitter_url: Option<String>,
    pub instagram_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub youtube_url: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub contact_person: Option<String>,
    pub contact_title: Option<String>,
    pub registration_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Company joined with its owner's contact details.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CompanyWithOwner {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub company: Company,
    pub owner_name: String,
    pub owner_email: String,
    pub owner_mobile: String,
}

/// Optional filters for the public company listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyFilter {
    pub city: Option<String>,
    pub organization_type: Option<String>,
    pub company_type: Option<String>,
    pub team_size: Option<String>,
}

#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct DashboardStats {
    pub total_jobs: i64,
    pub active_jobs: i64,
    pub total_candidates: i64,
    pub new_applications: i64,
    pub total_interviews: i64,
    pub upcoming_interviews: i64,
    pub team_members: i64,
}

/// One group in a platform-wide breakdown. `value` is null for companies that
/// left the field blank.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StatBucket {
    pub value: Option<String>,
    pub count: i64,
}

/// Public platform overview.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyStats {
    pub total_companies: i64,
    pub by_type: Vec<StatBucket>,
    pub by_size: Vec<StatBucket>,
    /// Ten most common countries, largest first.
    pub by_country: Vec<StatBucket>,
}

/// Optional profile fields shared by create and update.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CompanyProfileFields {
    #[validate(length(max = 5000, message = "about_us must be at most 5000 characters"))]
    pub about_us: Option<String>,
    #[validate(length(max = 100))]
    pub organization_type: Option<String>,
    #[validate(length(max = 100))]
    pub company_type: Option<String>,
    #[validate(regex(path = *TEAM_SIZE_RE, message = "team_size must be one of 1-10, 11-50, 51-200, 201-500, 500+"))]
    pub team_size: Option<String>,
    #[validate(regex(path = *YEAR_RE, message = "year_established must be a 4 digit year"))]
    pub year_established: Option<String>,
    #[validate(regex(path = *OPTIONAL_URL_RE, message = "website must be a valid URL"))]
    pub website: Option<String>,
    #[validate(length(max = 1000))]
    pub vision: Option<String>,
    #[validate(regex(path = *OPTIONAL_URL_RE, message = "logo_url must be a valid URL"))]
    pub logo_url: Option<String>,
    #[validate(regex(path = *OPTIONAL_URL_RE, message = "banner_url must be a valid URL"))]
    pub banner_url: Option<String>,
    #[validate(regex(path = *OPTIONAL_URL_RE, message = "facebook_url must be a valid URL"))]
    pub facebook_url: Option<String>,
    #[validate(regex(path = *OPTIONAL_URL_RE, message = "twitter_url must be a valid URL"))]
    pub twitter_url: Option<String>,
    #[validate(regex(path = *OPTIONAL_URL_RE, message = "instagram_url must be a valid URL"))]
    pub instagram_url: Option<String>,
    #[validate(regex(path = *OPTIONAL_URL_RE, message = "linkedin_url must be a valid URL"))]
    pub linkedin_url: Option<String>,
    #[validate(regex(path = *OPTIONAL_URL_RE, message = "youtube_url must be a valid URL"))]
    pub youtube_url: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub state: Option<String>,
    #[validate(length(max = 20))]
    pub zip_code: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
    #[validate(regex(path = *OPTIONAL_PHONE_RE, message = "phone must be a valid phone number"))]
    pub phone: Option<String>,
    #[validate(length(max = 255))]
    pub contact_person: Option<String>,
    #[validate(length(max = 255))]
    pub contact_title: Option<String>,
}

impl CompanyProfileFields {
    /// Column name and value for every profile field, in table order.
    pub fn columns(&self) -> [(&'static str, &Option<String>); 22] {
        [
            ("about_us", &self.about_us),
            ("organization_type", &self.organization_type),
            ("company_type", &self.company_type),
            ("team_size", &self.team_size),
            ("year_established", &self.year_established),
            ("website", &self.website),
            ("vision", &self.vision),
            ("logo_url", &self.logo_url),
            ("banner_url", &self.banner_url),
            ("facebook_url", &self.facebook_url),
            ("twitter_url", &self.twitter_url),
            ("instagram_url", &self.instagram_url),
            ("linkedin_url", &self.linkedin_url),
            ("youtube_url", &self.youtube_url),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("zip_code", &self.zip_code),
            ("country", &self.country),
            ("phone", &self.phone),
            ("contact_person", &self.contact_person),
            ("contact_title", &self.contact_title),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.columns().iter().all(|(_, value)| value.is_none())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCompany {
    #[validate(length(min = 2, max = 255, message = "company_name must be 2 to 255 characters"))]
    pub company_name: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub profile: CompanyProfileFields,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCompany {
    #[validate(length(min = 2, max = 255, message = "company_name must be 2 to 255 characters"))]
    pub company_name: Option<String>,
    #[serde(flatten)]
    #[validate(nested)]
    pub profile: CompanyProfileFields,
}

impl UpdateCompany {
    pub fn is_empty(&self) -> bool {
        self.company_name.is_none() && self.profile.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_accepts_empty_optional_urls() {
        let input: CreateCompany = serde_json::from_value(json!({
            "company_name": "Acme Corp",
            "website": "",
            "phone": "",
            "team_size": "11-50",
            "year_established": "2015"
        }))
        .unwrap();

        assert!(input.validate().is_ok());
        assert_eq!(input.profile.team_size.as_deref(), Some("11-50"));
    }

    #[test]
    fn create_rejects_bad_profile_fields() {
        let input: CreateCompany = serde_json::from_value(json!({
            "company_name": "A",
            "website": "acme",
            "team_size": "12",
            "year_established": "15"
        }))
        .unwrap();

        let errors = input.validate().unwrap_err().to_string();
        assert!(errors.contains("company_name"));
        assert!(errors.contains("website"));
        assert!(errors.contains("team_size"));
        assert!(errors.contains("year_established"));
    }

    #[test]
    fn update_detects_empty_body() {
        let empty: UpdateCompany = serde_json::from_value(json!({})).unwrap();
        assert!(empty.is_empty());

        let renamed: UpdateCompany =
            serde_json::from_value(json!({"company_name": "Acme Two"})).unwrap();
        assert!(!renamed.is_empty());
    }
}
