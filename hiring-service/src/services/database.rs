//! PostgreSQL access for hiring-service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde_json::Value;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::models::{
    Candidate, CandidateStatus, CandidateWithInterviews, Company, CompanyFilter, CompanyStats,
    CompanyWithOwner, CreateCompany, DashboardStats, Interview, InterviewChanges, Job, JobChanges,
    JobFilter, JobWithCounts, Membership, NewInterview, NewJob, PermissionMap, StatBucket,
    TeamMember, TeamMemberChanges, TeamMemberWithUser, UpdateCompany, User, VerificationChannel,
    VerificationCode,
};
use crate::services::access::AccessStore;
use crate::services::metrics::QueryTimer;
use crate::utils::Pagination;

const SEARCH_RESULT_LIMIT: i64 = 50;
const TOP_COUNTRIES: i64 = 10;

/// Connection pool wrapper. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

#[derive(FromRow)]
struct CompanyStatsRow {
    total_companies: i64,
    by_type: Json<Vec<StatBucket>>,
    by_size: Json<Vec<StatBucket>>,
    by_country: Json<Vec<StatBucket>>,
}

/// `%term%` with LIKE metacharacters escaped.
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

impl Database {
    #[instrument(skip(config))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .idle_timeout(Duration::from_secs(600))
            .connect(config.url.expose_secret())
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let _timer = QueryTimer::start("health_check");
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let _timer = QueryTimer::start("find_user_by_id");
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    pub async fn find_user_by_mobile(&self, mobile_number: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE mobile_number = $1")
            .bind(mobile_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    /// Another user already holding `email` or `mobile_number`.
    pub async fn find_conflicting_user(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        mobile_number: Option<&str>,
    ) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE id <> $1 AND (LOWER(email) = LOWER($2) OR mobile_number = $3)
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(email)
        .bind(mobile_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        let _timer = QueryTimer::start("insert_user");
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, full_name, gender, mobile_number, signup_type,
                               is_email_verified, is_mobile_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.gender)
        .bind(&user.mobile_number)
        .bind(&user.signup_type)
        .bind(user.is_email_verified)
        .bind(user.is_mobile_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        info!(user_id = %user.id, "User registered");
        Ok(())
    }

    /// Partial profile update. A changed email or mobile loses its verified flag.
    #[instrument(skip(self, email, full_name, mobile_number))]
    pub async fn update_user_profile(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        full_name: Option<&str>,
        gender: Option<&str>,
        mobile_number: Option<&str>,
    ) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                full_name = COALESCE($3, full_name),
                gender = COALESCE($4, gender),
                mobile_number = COALESCE($5, mobile_number),
                is_email_verified = CASE
                    WHEN $2 IS NOT NULL AND LOWER($2) <> LOWER(email) THEN FALSE
                    ELSE is_email_verified END,
                is_mobile_verified = CASE
                    WHEN $5 IS NOT NULL AND $5 <> mobile_number THEN FALSE
                    ELSE is_mobile_verified END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(email)
        .bind(full_name)
        .bind(gender)
        .bind(mobile_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)
    }

    #[instrument(skip(self, password_hash))]
    pub async fn update_password(&self, user_id: Uuid, password_hash: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Verification codes
    // =========================================================================

    #[instrument(skip(self, code), fields(user_id = %code.user_id, channel = %code.channel))]
    pub async fn insert_verification_code(&self, code: &VerificationCode) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO verification_codes (id, user_id, channel, destination, code_hash,
                                            expires_at, attempt_count, attempt_max, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(code.id)
        .bind(code.user_id)
        .bind(&code.channel)
        .bind(&code.destination)
        .bind(&code.code_hash)
        .bind(code.expires_at)
        .bind(code.attempt_count)
        .bind(code.attempt_max)
        .bind(code.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_codes_sent_since(
        &self,
        user_id: Uuid,
        channel: VerificationChannel,
        since: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM verification_codes
            WHERE user_id = $1 AND channel = $2 AND created_at > $3
            "#,
        )
        .bind(user_id)
        .bind(channel.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)
    }

    /// Newest unconsumed code for the channel. Older open codes are superseded.
    pub async fn find_latest_open_code(
        &self,
        user_id: Uuid,
        channel: VerificationChannel,
    ) -> Result<Option<VerificationCode>, AppError> {
        sqlx::query_as::<_, VerificationCode>(
            r#"
            SELECT * FROM verification_codes
            WHERE user_id = $1 AND channel = $2 AND consumed_at IS NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(channel.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)
    }

    pub async fn record_failed_code_attempt(&self, code_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE verification_codes SET attempt_count = attempt_count + 1 WHERE id = $1")
            .bind(code_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Consumes the code and sets the channel's verified flag in one
    /// transaction. Every other open code for the channel is voided too.
    /// Returns `None` when the code was consumed concurrently.
    #[instrument(skip(self))]
    pub async fn consume_code_and_verify(
        &self,
        code_id: Uuid,
        user_id: Uuid,
        channel: VerificationChannel,
    ) -> Result<Option<User>, AppError> {
        let _timer = QueryTimer::start("consume_verification_code");
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query(
            r#"
            UPDATE verification_codes SET consumed_at = NOW()
            WHERE id = $1 AND user_id = $2 AND consumed_at IS NULL
            "#,
        )
        .bind(code_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query(
            r#"
            UPDATE verification_codes SET consumed_at = NOW()
            WHERE user_id = $1 AND channel = $2 AND consumed_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(channel.as_str())
        .execute(&mut *tx)
        .await?;

        let sql = match channel {
            VerificationChannel::Email => {
                "UPDATE users SET is_email_verified = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *"
            }
            VerificationChannel::Mobile => {
                "UPDATE users SET is_mobile_verified = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *"
            }
        };
        let user = sqlx::query_as::<_, User>(sql)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    // =========================================================================
    // Companies
    // =========================================================================

    pub async fn find_company_by_owner(&self, owner_id: Uuid) -> Result<Option<Company>, AppError> {
        sqlx::query_as::<_, Company>("SELECT * FROM company_profiles WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    /// Case-insensitive name check, optionally ignoring one company.
    pub async fn company_name_taken(
        &self,
        company_name: &str,
        exclude_company_id: Option<Uuid>,
    ) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM company_profiles
                WHERE LOWER(company_name) = LOWER($1) AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(company_name)
        .bind(exclude_company_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)
    }

    #[instrument(skip(self, input), fields(company_name = %input.company_name))]
    pub async fn insert_company(
        &self,
        owner_id: Uuid,
        input: &CreateCompany,
    ) -> Result<Company, AppError> {
        let _timer = QueryTimer::start("insert_company");
        let columns = input.profile.columns();

        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO company_profiles (id, owner_id, company_name");
        for (column, _) in columns.iter() {
            query.push(", ").push(*column);
        }
        query
            .push(") VALUES (")
            .push_bind(Uuid::new_v4())
            .push(", ")
            .push_bind(owner_id)
            .push(", ")
            .push_bind(input.company_name.trim().to_string());
        for (_, value) in columns.iter() {
            query.push(", ").push_bind((*value).clone());
        }
        query.push(") RETURNING *");

        let company = query
            .build_query_as::<Company>()
            .fetch_one(&self.pool)
            .await?;

        info!(company_id = %company.id, owner_id = %owner_id, "Company created");
        Ok(company)
    }

    /// Registration-complete companies, newest first.
    #[instrument(skip(self))]
    pub async fn list_companies(
        &self,
        filter: &CompanyFilter,
        page: &Pagination,
    ) -> Result<(Vec<Company>, i64), AppError> {
        let _timer = QueryTimer::start("list_companies");

        let mut count: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) FROM company_profiles WHERE registration_complete = TRUE",
        );
        push_company_filters(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM company_profiles WHERE registration_complete = TRUE");
        push_company_filters(&mut query, filter);
        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let companies = query
            .build_query_as::<Company>()
            .fetch_all(&self.pool)
            .await?;

        Ok((companies, total))
    }

    #[instrument(skip(self))]
    pub async fn search_companies(&self, term: &str) -> Result<Vec<Company>, AppError> {
        let _timer = QueryTimer::start("search_companies");
        sqlx::query_as::<_, Company>(
            r#"
            SELECT * FROM company_profiles
            WHERE registration_complete = TRUE
              AND (company_name ILIKE $1 OR about_us ILIKE $1 OR city ILIKE $1)
            ORDER BY company_name
            LIMIT $2
            "#,
        )
        .bind(contains_pattern(term))
        .bind(SEARCH_RESULT_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }

    pub async fn find_company_with_owner(
        &self,
        company_id: Uuid,
    ) -> Result<Option<CompanyWithOwner>, AppError> {
        sqlx::query_as::<_, CompanyWithOwner>(
            r#"
            SELECT cp.*, u.full_name AS owner_name, u.email AS owner_email,
                   u.mobile_number AS owner_mobile
            FROM company_profiles cp
            JOIN users u ON u.id = cp.owner_id
            WHERE cp.id = $1
            "#,
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)
    }

    /// Writes only the fields present in `changes`.
    #[instrument(skip(self, changes))]
    pub async fn update_company(
        &self,
        company_id: Uuid,
        changes: &UpdateCompany,
    ) -> Result<Option<Company>, AppError> {
        let _timer = QueryTimer::start("update_company");

        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE company_profiles SET updated_at = NOW()");
        if let Some(name) = &changes.company_name {
            query.push(", company_name = ").push_bind(name.trim().to_string());
        }
        for (column, value) in changes.profile.columns() {
            if let Some(value) = value {
                query.push(", ").push(column).push(" = ").push_bind(value.clone());
            }
        }
        query
            .push(" WHERE id = ")
            .push_bind(company_id)
            .push(" RETURNING *");

        query
            .build_query_as::<Company>()
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    pub async fn complete_registration(&self, company_id: Uuid) -> Result<Option<Company>, AppError> {
        sqlx::query_as::<_, Company>(
            r#"
            UPDATE company_profiles SET registration_complete = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)
    }

    #[instrument(skip(self))]
    pub async fn dashboard_stats(&self, company_id: Uuid) -> Result<DashboardStats, AppError> {
        let _timer = QueryTimer::start("dashboard_stats");
        sqlx::query_as::<_, DashboardStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM jobs WHERE company_id = $1) AS total_jobs,
                (SELECT COUNT(*) FROM jobs WHERE company_id = $1 AND status = 'active') AS active_jobs,
                (SELECT COUNT(*) FROM candidates c JOIN jobs j ON j.id = c.job_id
                    WHERE j.company_id = $1) AS total_candidates,
                (SELECT COUNT(*) FROM candidates c JOIN jobs j ON j.id = c.job_id
                    WHERE j.company_id = $1 AND c.status = 'applied') AS new_applications,
                (SELECT COUNT(*) FROM interviews i
                    JOIN candidates c ON c.id = i.candidate_id
                    JOIN jobs j ON j.id = c.job_id
                    WHERE j.company_id = $1) AS total_interviews,
                (SELECT COUNT(*) FROM interviews i
                    JOIN candidates c ON c.id = i.candidate_id
                    JOIN jobs j ON j.id = c.job_id
                    WHERE j.company_id = $1 AND i.status = 'scheduled'
                      AND i.scheduled_at > NOW()) AS upcoming_interviews,
                (SELECT COUNT(*) FROM team_members
                    WHERE company_id = $1 AND is_active = TRUE) AS team_members
            "#,
        )
        .bind(company_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)
    }

    /// Platform-wide company counts in a single round trip.
    #[instrument(skip(self))]
    pub async fn company_stats_overview(&self) -> Result<CompanyStats, AppError> {
        let _timer = QueryTimer::start("company_stats_overview");
        let row = sqlx::query_as::<_, CompanyStatsRow>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM company_profiles) AS total_companies,
                (SELECT COALESCE(json_agg(t ORDER BY t.count DESC, t.value), '[]'::json) FROM (
                    SELECT company_type AS value, COUNT(*) AS count
                    FROM company_profiles GROUP BY company_type
                ) t) AS by_type,
                (SELECT COALESCE(json_agg(t ORDER BY t.count DESC, t.value), '[]'::json) FROM (
                    SELECT team_size AS value, COUNT(*) AS count
                    FROM company_profiles GROUP BY team_size
                ) t) AS by_size,
                (SELECT COALESCE(json_agg(t ORDER BY t.count DESC, t.value), '[]'::json) FROM (
                    SELECT country AS value, COUNT(*) AS count
                    FROM company_profiles
                    WHERE country IS NOT NULL AND country <> ''
                    GROUP BY country
                    ORDER BY count DESC, country
                    LIMIT $1
                ) t) AS by_country
            "#,
        )
        .bind(TOP_COUNTRIES)
        .fetch_one(&self.pool)
        .await?;

        Ok(CompanyStats {
            total_companies: row.total_companies,
            by_type: row.by_type.0,
            by_size: row.by_size.0,
            by_country: row.by_country.0,
        })
    }

    /// Deletes the company and everything hanging off it in one transaction.
    /// Returns false if the company did not exist.
    #[instrument(skip(self))]
    pub async fn delete_company(&self, company_id: Uuid) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("delete_company");
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM team_members WHERE company_id = $1")
            .bind(company_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            DELETE FROM interviews WHERE candidate_id IN (
                SELECT c.id FROM candidates c JOIN jobs j ON j.id = c.job_id
                WHERE j.company_id = $1
            )
            "#,
        )
        .bind(company_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM candidates WHERE job_id IN (SELECT id FROM jobs WHERE company_id = $1)",
        )
        .bind(company_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM jobs WHERE company_id = $1")
            .bind(company_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM company_profiles WHERE id = $1")
            .bind(company_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if deleted > 0 {
            info!(company_id = %company_id, "Company deleted");
        }
        Ok(deleted > 0)
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn insert_job(&self, company_id: Uuid, input: &NewJob) -> Result<Job, AppError> {
        let _timer = QueryTimer::start("insert_job");
        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (id, company_id, title, description, requirements, location, type,
                              salary_min, salary_max, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.requirements)
        .bind(&input.location)
        .bind(input.job_type.as_str())
        .bind(input.salary_min)
        .bind(input.salary_max)
        .bind(input.status.as_str())
        .fetch_one(&self.pool)
        .await?;

        info!(job_id = %job.id, company_id = %company_id, "Job created");
        Ok(job)
    }

    #[instrument(skip(self))]
    pub async fn list_jobs(
        &self,
        company_id: Uuid,
        filter: &JobFilter,
        page: &Pagination,
    ) -> Result<(Vec<JobWithCounts>, i64), AppError> {
        let _timer = QueryTimer::start("list_jobs");

        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM jobs j WHERE j.company_id = ");
        count.push_bind(company_id);
        push_job_filters(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT j.*,
                   COUNT(c.id) AS candidate_count,
                   COUNT(c.id) FILTER (WHERE c.status = 'applied') AS new_applications
            FROM jobs j
            LEFT JOIN candidates c ON c.job_id = j.id
            WHERE j.company_id = "#,
        );
        query.push_bind(company_id);
        push_job_filters(&mut query, filter);
        query
            .push(" GROUP BY j.id ORDER BY j.created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let jobs = query
            .build_query_as::<JobWithCounts>()
            .fetch_all(&self.pool)
            .await?;

        Ok((jobs, total))
    }

    /// The job, only if it belongs to `company_id`.
    pub async fn find_job(&self, company_id: Uuid, job_id: Uuid) -> Result<Option<Job>, AppError> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1 AND company_id = $2")
            .bind(job_id)
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    pub async fn find_job_by_id(&self, job_id: Uuid) -> Result<Option<Job>, AppError> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    #[instrument(skip(self, changes))]
    pub async fn update_job(
        &self,
        company_id: Uuid,
        job_id: Uuid,
        changes: &JobChanges,
    ) -> Result<Option<Job>, AppError> {
        let _timer = QueryTimer::start("update_job");

        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE jobs SET updated_at = NOW()");
        if let Some(title) = &changes.title {
            query.push(", title = ").push_bind(title.clone());
        }
        if let Some(description) = &changes.description {
            query.push(", description = ").push_bind(description.clone());
        }
        if let Some(requirements) = &changes.requirements {
            query.push(", requirements = ").push_bind(requirements.clone());
        }
        if let Some(location) = &changes.location {
            query.push(", location = ").push_bind(location.clone());
        }
        if let Some(job_type) = changes.job_type {
            query.push(", type = ").push_bind(job_type.as_str());
        }
        if let Some(salary_min) = changes.salary_min {
            query.push(", salary_min = ").push_bind(salary_min);
        }
        if let Some(salary_max) = changes.salary_max {
            query.push(", salary_max = ").push_bind(salary_max);
        }
        if let Some(status) = changes.status {
            query.push(", status = ").push_bind(status.as_str());
        }
        query
            .push(" WHERE id = ")
            .push_bind(job_id)
            .push(" AND company_id = ")
            .push_bind(company_id)
            .push(" RETURNING *");

        query
            .build_query_as::<Job>()
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)
    }

    /// Deletes the job with its candidates and interviews. Returns false if
    /// the job does not exist under `company_id`.
    #[instrument(skip(self))]
    pub async fn delete_job(&self, company_id: Uuid, job_id: Uuid) -> Result<bool, AppError> {
        let _timer = QueryTimer::start("delete_job");
        let mut tx = self.pool.begin().await?;

        let owned = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM jobs WHERE id = $1 AND company_id = $2 FOR UPDATE",
        )
        .bind(job_id)
        .bind(company_id)
        .fetch_optional(&mut *tx)
        .await?;

        if owned.is_none() {
            return Ok(false);
        }

        sqlx::query(
            "DELETE FROM interviews WHERE candidate_id IN (SELECT id FROM candidates WHERE job_id = $1)",
        )
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM candidates WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(job_id = %job_id, company_id = %company_id, "Job deleted");
        Ok(true)
    }

    // =========================================================================
    // Candidates
    // =========================================================================

    #[instrument(skip(self, candidate), fields(job_id = %candidate.job_id))]
    pub async fn insert_candidate(&self, candidate: &Candidate) -> Result<Candidate, AppError> {
        sqlx::query_as::<_, Candidate>(
            r#"
            INSERT INTO candidates (id, job_id, full_name, email, phone, cover_letter, status,
                                    created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(candidate.id)
        .bind(candidate.job_id)
        .bind(&candidate.full_name)
        .bind(&candidate.email)
        .bind(&candidate.phone)
        .bind(&candidate.cover_letter)
        .bind(&candidate.status)
        .bind(candidate.created_at)
        .bind(candidate.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)
    }

    pub async fn list_candidates_for_job(
        &self,
        job_id: Uuid,
    ) -> Result<Vec<CandidateWithInterviews>, AppError> {
        sqlx::query_as::<_, CandidateWithInterviews>(
            r#"
            SELECT c.*, COUNT(i.id) AS interview_count
            FROM candidates c
            LEFT JOIN interviews i ON i.candidate_id = c.id
            WHERE c.job_id = $1
            GROUP BY c.id
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }

    #[instrument(skip(self))]
    pub async fn update_candidate_status(
        &self,
        job_id: Uuid,
        candidate_id: Uuid,
        status: CandidateStatus,
    ) -> Result<Option<Candidate>, AppError> {
        sqlx::query_as::<_, Candidate>(
            r#"
            UPDATE candidates SET status = $3, updated_at = NOW()
            WHERE id = $1 AND job_id = $2
            RETURNING *
            "#,
        )
        .bind(candidate_id)
        .bind(job_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)
    }

    // =========================================================================
    // Interviews
    // =========================================================================

    /// Schedules an interview for a candidate of `job_id`, which must belong
    /// to `company_id`. Returns `None` if the candidate is not found there.
    #[instrument(skip(self, input))]
    pub async fn insert_interview(
        &self,
        company_id: Uuid,
        job_id: Uuid,
        candidate_id: Uuid,
        input: &NewInterview,
    ) -> Result<Option<Interview>, AppError> {
        sqlx::query_as::<_, Interview>(
            r#"
            INSERT INTO interviews (id, candidate_id, scheduled_at, duration_minutes, type,
                                    status, notes)
            SELECT $1, c.id, $5, $6, $7, 'scheduled', $8
            FROM candidates c
            JOIN jobs j ON j.id = c.job_id
            WHERE c.id = $4 AND c.job_id = $3 AND j.company_id = $2
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(job_id)
        .bind(candidate_id)
        .bind(input.scheduled_at)
        .bind(input.duration_minutes)
        .bind(input.interview_type.as_str())
        .bind(&input.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)
    }

    pub async fn list_interviews_for_candidate(
        &self,
        company_id: Uuid,
        job_id: Uuid,
        candidate_id: Uuid,
    ) -> Result<Vec<Interview>, AppError> {
        sqlx::query_as::<_, Interview>(
            r#"
            SELECT i.* FROM interviews i
            JOIN candidates c ON c.id = i.candidate_id
            JOIN jobs j ON j.id = c.job_id
            WHERE c.id = $3 AND c.job_id = $2 AND j.company_id = $1
            ORDER BY i.scheduled_at
            "#,
        )
        .bind(company_id)
        .bind(job_id)
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }

    #[instrument(skip(self, changes))]
    pub async fn update_interview(
        &self,
        company_id: Uuid,
        interview_id: Uuid,
        changes: &InterviewChanges,
    ) -> Result<Option<Interview>, AppError> {
        sqlx::query_as::<_, Interview>(
            r#"
            UPDATE interviews i SET
                status = $3,
                notes = COALESCE($4, i.notes),
                updated_at = NOW()
            FROM candidates c
            JOIN jobs j ON j.id = c.job_id
            WHERE i.id = $2 AND c.id = i.candidate_id AND j.company_id = $1
            RETURNING i.*
            "#,
        )
        .bind(company_id)
        .bind(interview_id)
        .bind(changes.status.as_str())
        .bind(&changes.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)
    }

    // =========================================================================
    // Team members
    // =========================================================================

    pub async fn list_team_members(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<TeamMemberWithUser>, AppError> {
        sqlx::query_as::<_, TeamMemberWithUser>(
            r#"
            SELECT tm.*, u.full_name, u.email
            FROM team_members tm
            JOIN users u ON u.id = tm.user_id
            WHERE tm.company_id = $1 AND tm.is_active = TRUE
            ORDER BY tm.created_at
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)
    }

    /// Inserts the membership, or rewrites and reactivates an existing row for
    /// the same user.
    #[instrument(skip(self, permissions))]
    pub async fn upsert_team_member(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        role: &str,
        department: Option<&str>,
        permissions: PermissionMap,
    ) -> Result<TeamMember, AppError> {
        let _timer = QueryTimer::start("upsert_team_member");
        let member = sqlx::query_as::<_, TeamMember>(
            r#"
            INSERT INTO team_members (id, company_id, user_id, role, department, permissions)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT ON CONSTRAINT team_members_company_user_key DO UPDATE SET
                role = EXCLUDED.role,
                department = EXCLUDED.department,
                permissions = EXCLUDED.permissions,
                is_active = TRUE,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(user_id)
        .bind(role)
        .bind(department)
        .bind(permissions.into_value())
        .fetch_one(&self.pool)
        .await?;

        info!(company_id = %company_id, user_id = %user_id, role = %member.role, "Team member added");
        Ok(member)
    }

    /// Updates an active membership; `None` if there is none.
    #[instrument(skip(self, changes))]
    pub async fn update_team_member(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        changes: &TeamMemberChanges,
    ) -> Result<Option<TeamMember>, AppError> {
        let permissions: Option<Value> = changes
            .permissions
            .clone()
            .map(|p| PermissionMap::from(p).into_value());

        sqlx::query_as::<_, TeamMember>(
            r#"
            UPDATE team_members SET
                role = COALESCE($3, role),
                department = COALESCE($4, department),
                permissions = COALESCE($5, permissions),
                updated_at = NOW()
            WHERE company_id = $1 AND user_id = $2 AND is_active = TRUE
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(user_id)
        .bind(&changes.role)
        .bind(&changes.department)
        .bind(permissions)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)
    }

    /// Marks the membership inactive. The row is kept.
    #[instrument(skip(self))]
    pub async fn deactivate_team_member(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE team_members SET is_active = FALSE, updated_at = NOW()
            WHERE company_id = $1 AND user_id = $2 AND is_active = TRUE
            "#,
        )
        .bind(company_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn push_company_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &CompanyFilter) {
    if let Some(city) = filter.city.as_deref().filter(|c| !c.is_empty()) {
        query.push(" AND city ILIKE ").push_bind(contains_pattern(city));
    }
    if let Some(org_type) = filter.organization_type.as_deref().filter(|t| !t.is_empty()) {
        query.push(" AND organization_type = ").push_bind(org_type.to_string());
    }
    if let Some(company_type) = filter.company_type.as_deref().filter(|t| !t.is_empty()) {
        query.push(" AND company_type = ").push_bind(company_type.to_string());
    }
    if let Some(team_size) = filter.team_size.as_deref().filter(|t| !t.is_empty()) {
        query.push(" AND team_size = ").push_bind(team_size.to_string());
    }
}

fn push_job_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &JobFilter) {
    if let Some(status) = filter.status {
        query.push(" AND j.status = ").push_bind(status.as_str());
    }
    if let Some(job_type) = filter.job_type {
        query.push(" AND j.type = ").push_bind(job_type.as_str());
    }
}

#[async_trait]
impl AccessStore for Database {
    #[instrument(skip(self))]
    async fn company_owned_by(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, anyhow::Error> {
        let _timer = QueryTimer::start("company_owned_by");
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM company_profiles WHERE id = $1 AND owner_id = $2)",
        )
        .bind(company_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(anyhow::Error::new)
    }

    #[instrument(skip(self))]
    async fn find_membership(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, anyhow::Error> {
        let _timer = QueryTimer::start("find_membership");
        sqlx::query_as::<_, Membership>(
            "SELECT role, permissions, is_active FROM team_members WHERE company_id = $1 AND user_id = $2",
        )
        .bind(company_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(anyhow::Error::new)
    }
}
