pub mod candidate;
pub mod company;
pub mod interview;
pub mod job;
pub mod team_member;
pub mod user;
pub mod verification;

pub use candidate::{Candidate, CandidateStatus, CandidateWithInterviews};
pub use company::{
    Company, CompanyFilter, CompanyProfileFields, CompanyStats, CompanyWithOwner, CreateCompany,
    DashboardStats, StatBucket, UpdateCompany,
};
pub use interview::{Interview, InterviewChanges, InterviewStatus, InterviewType, NewInterview};
pub use job::{Job, JobChanges, JobFilter, JobStatus, JobType, JobWithCounts, NewJob};
pub use team_member::{
    Membership, NewTeamMember, PermissionMap, TeamMember, TeamMemberChanges, TeamMemberWithUser,
};
pub use user::{Gender, SignupType, User, UserResponse};
pub use verification::{VerificationChannel, VerificationCode};
