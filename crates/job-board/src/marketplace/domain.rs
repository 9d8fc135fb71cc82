use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Storage and display format for every persisted timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Identifier wrapper for registered users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

/// Identifier wrapper for posted jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a stored or submitted label matches no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized {kind} '{value}'")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownLabel {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Account type chosen at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Seeker,
    Provider,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            UserRole::Seeker => "seeker",
            UserRole::Provider => "provider",
        }
    }
}

impl FromStr for UserRole {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "seeker" | "job seeker" => Ok(Self::Seeker),
            "provider" | "job provider" => Ok(Self::Provider),
            _ => Err(UnknownLabel::new("user role", value)),
        }
    }
}

/// Employment arrangement advertised on a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    #[serde(rename = "Full-time")]
    FullTime,
    #[serde(rename = "Part-time")]
    PartTime,
    Contract,
    Internship,
    Remote,
}

impl JobType {
    pub const ALL: [JobType; 5] = [
        JobType::FullTime,
        JobType::PartTime,
        JobType::Contract,
        JobType::Internship,
        JobType::Remote,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            JobType::FullTime => "Full-time",
            JobType::PartTime => "Part-time",
            JobType::Contract => "Contract",
            JobType::Internship => "Internship",
            JobType::Remote => "Remote",
        }
    }
}

impl FromStr for JobType {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|job_type| job_type.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownLabel::new("job type", value))
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Review stage of an application. Declaration order doubles as the dashboard ordering.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Reviewing,
    Interview,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Reviewing,
        ApplicationStatus::Interview,
        ApplicationStatus::Accepted,
        ApplicationStatus::Rejected,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "Pending",
            ApplicationStatus::Reviewing => "Reviewing",
            ApplicationStatus::Interview => "Interview",
            ApplicationStatus::Accepted => "Accepted",
            ApplicationStatus::Rejected => "Rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Accepted | ApplicationStatus::Rejected
        )
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownLabel::new("application status", value))
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which status changes a store accepts.
///
/// `Permissive` lets any status replace any other. `Strict` walks the review pipeline forward
/// only: Pending may move to Reviewing, Interview, or Rejected; Reviewing to Interview, Accepted,
/// or Rejected; Interview to Accepted or Rejected. Accepted and Rejected are final. Re-applying
/// the current status is always allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    #[default]
    Permissive,
    Strict,
}

impl TransitionPolicy {
    pub fn allows(self, from: ApplicationStatus, to: ApplicationStatus) -> bool {
        use ApplicationStatus::*;

        if from == to {
            return true;
        }

        match self {
            TransitionPolicy::Permissive => true,
            TransitionPolicy::Strict if from.is_terminal() => false,
            TransitionPolicy::Strict => matches!(
                (from, to),
                (Pending, Reviewing | Interview | Rejected)
                    | (Reviewing, Interview | Accepted | Rejected)
                    | (Interview, Accepted | Rejected)
            ),
        }
    }
}

impl FromStr for TransitionPolicy {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "strict" => Ok(Self::Strict),
            _ => Err(UnknownLabel::new("transition policy", value)),
        }
    }
}

/// Registered account, without its credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: UserRole,
    pub name: String,
    pub email: String,
    #[serde(with = "timestamp")]
    pub registered_at: NaiveDateTime,
}

/// Registration form as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: UserRole,
    pub name: String,
    pub email: String,
}

/// Outcome of a registration attempt. A taken username is an expected answer, not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created(UserId),
    UsernameTaken,
}

/// Job posting form as submitted by a provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewJob {
    pub provider_id: UserId,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub salary: Option<f64>,
    pub job_type: JobType,
    #[serde(default)]
    pub description: String,
}

/// A listing joined with its provider's contact details and the number of applications received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: JobId,
    pub provider_id: UserId,
    pub title: String,
    pub company: String,
    pub salary: Option<f64>,
    pub job_type: JobType,
    pub description: String,
    #[serde(with = "timestamp")]
    pub posted_at: NaiveDateTime,
    pub provider_name: String,
    pub provider_email: String,
    pub application_count: u64,
}

impl JobPosting {
    pub fn salary_label(&self) -> String {
        format_salary(self.salary)
    }
}

/// Outcome of an application attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Submitted(ApplicationId),
    AlreadyApplied,
}

impl ApplyOutcome {
    pub const fn message(self) -> &'static str {
        match self {
            ApplyOutcome::Submitted(_) => "Application submitted successfully",
            ApplyOutcome::AlreadyApplied => "You have already applied for this job",
        }
    }

    pub const fn is_submitted(self) -> bool {
        matches!(self, ApplyOutcome::Submitted(_))
    }
}

/// An application joined with the job it targets and the applicant's contact details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationView {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub seeker_id: UserId,
    pub provider_id: UserId,
    pub job_title: String,
    pub company: String,
    pub applicant_name: String,
    pub applicant_email: String,
    #[serde(with = "timestamp")]
    pub applied_at: NaiveDateTime,
    pub status: ApplicationStatus,
    pub cover_letter: String,
}

/// Result of asking the store to overwrite an application's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StatusChange {
    Updated {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    Rejected {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    NotFound,
}

/// Dashboard counters for a user. `total_jobs` is only reported for providers.
///
/// Providers also get the latest applications received; seekers get the latest postings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_jobs: Option<u64>,
    pub total_applications: u64,
    pub status_counts: BTreeMap<ApplicationStatus, u64>,
    pub recent_jobs: Vec<JobPosting>,
    pub recent_applications: Vec<ApplicationView>,
}

/// Renders a salary the way listing tables show it, e.g. `$80,000.00`.
pub fn format_salary(salary: Option<f64>) -> String {
    let Some(amount) = salary.filter(|value| value.is_finite()) else {
        return "—".to_string();
    };

    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}

/// Serde adapter keeping timestamps in their persisted `YYYY-MM-DD HH:MM:SS` form.
pub mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
            .map_err(|err| serde::de::Error::custom(format!("invalid timestamp '{raw}': {err}")))
    }
}
