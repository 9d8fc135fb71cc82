//! Structured filter sets for the listing queries.
//!
//! Every recognized option maps to one fixed SQL clause with a bound parameter, so caller text
//! never reaches the statement itself. Options are optional and combine with `AND`. A `limit`
//! bounds the listing query only; counts ignore it.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, ApplicationStatus, JobId, JobType, UnknownLabel, UserId};

/// Job type option of a listing search, where `All` disables the predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum JobTypeSelection {
    #[default]
    All,
    Only(JobType),
}

impl FromStr for JobTypeSelection {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        trimmed.parse().map(Self::Only)
    }
}

impl TryFrom<String> for JobTypeSelection {
    type Error = UnknownLabel;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JobTypeSelection> for String {
    fn from(value: JobTypeSelection) -> Self {
        value.to_string()
    }
}

impl From<JobType> for JobTypeSelection {
    fn from(value: JobType) -> Self {
        Self::Only(value)
    }
}

impl fmt::Display for JobTypeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobTypeSelection::All => f.write_str("All"),
            JobTypeSelection::Only(job_type) => f.write_str(job_type.label()),
        }
    }
}

/// Options accepted by the job listing query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobFilter {
    pub title: Option<String>,
    pub company: Option<String>,
    pub job_type: JobTypeSelection,
    pub min_salary: Option<f64>,
    pub max_salary: Option<f64>,
    pub provider_id: Option<UserId>,
    pub limit: Option<u32>,
}

impl JobFilter {
    pub fn for_provider(provider_id: UserId) -> Self {
        Self {
            provider_id: Some(provider_id),
            ..Self::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn job_type(mut self, job_type: impl Into<JobTypeSelection>) -> Self {
        self.job_type = job_type.into();
        self
    }

    pub fn salary_between(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_salary = min;
        self.max_salary = max;
        self
    }

    /// Keeps only the first `limit` rows of the newest-first listing.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Options accepted by the application listing query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationFilter {
    pub application_id: Option<ApplicationId>,
    pub job_id: Option<JobId>,
    pub seeker_id: Option<UserId>,
    pub provider_id: Option<UserId>,
    pub status: Option<ApplicationStatus>,
    pub limit: Option<u32>,
}

impl ApplicationFilter {
    pub fn for_application(application_id: ApplicationId) -> Self {
        Self {
            application_id: Some(application_id),
            ..Self::default()
        }
    }

    pub fn for_job(job_id: JobId) -> Self {
        Self {
            job_id: Some(job_id),
            ..Self::default()
        }
    }

    pub fn for_seeker(seeker_id: UserId) -> Self {
        Self {
            seeker_id: Some(seeker_id),
            ..Self::default()
        }
    }

    pub fn for_provider(provider_id: UserId) -> Self {
        Self {
            provider_id: Some(provider_id),
            ..Self::default()
        }
    }

    pub fn status(mut self, status: ApplicationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// `AND`-combined predicate list with positional parameters, plus an optional row limit.
#[derive(Debug, Default)]
pub(crate) struct Predicates {
    clauses: Vec<&'static str>,
    params: Vec<Value>,
    limit: Option<Value>,
}

impl Predicates {
    pub(crate) fn push(&mut self, clause: &'static str, value: impl Into<Value>) {
        self.clauses.push(clause);
        self.params.push(value.into());
    }

    /// Empty when no option is set, otherwise ` WHERE a AND b`.
    pub(crate) fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub(crate) fn set_limit(&mut self, limit: Option<u32>) {
        self.limit = limit.map(|rows| Value::Integer(i64::from(rows)));
    }

    /// ` LIMIT ?` when a limit is set; goes after the `ORDER BY`.
    pub(crate) fn limit_clause(&self) -> &'static str {
        if self.limit.is_some() {
            " LIMIT ?"
        } else {
            ""
        }
    }

    /// Parameters for the `WHERE` clause alone, as count queries bind them.
    pub(crate) fn params(&self) -> rusqlite::ParamsFromIter<std::slice::Iter<'_, Value>> {
        rusqlite::params_from_iter(self.params.iter())
    }

    /// Parameters for a listing: the `WHERE` values followed by the limit, if any.
    pub(crate) fn paged_params(
        &self,
    ) -> rusqlite::ParamsFromIter<impl Iterator<Item = &Value> + '_> {
        rusqlite::params_from_iter(self.params.iter().chain(self.limit.iter()))
    }

    #[cfg(test)]
    pub(crate) fn clauses(&self) -> &[&'static str] {
        &self.clauses
    }
}

/// Filters that know how to express themselves as predicates over a fixed query shape.
pub(crate) trait FilterSet {
    fn predicates(&self) -> Predicates;
}

impl FilterSet for JobFilter {
    fn predicates(&self) -> Predicates {
        let mut predicates = Predicates::default();

        if let Some(title) = non_blank(self.title.as_deref()) {
            predicates.push("j.title LIKE ? ESCAPE '\\'", contains_pattern(title));
        }
        if let Some(company) = non_blank(self.company.as_deref()) {
            predicates.push("j.company LIKE ? ESCAPE '\\'", contains_pattern(company));
        }
        if let JobTypeSelection::Only(job_type) = self.job_type {
            predicates.push("j.job_type = ?", job_type.label().to_string());
        }
        if let Some(min) = self.min_salary {
            predicates.push("j.salary >= ?", min);
        }
        if let Some(max) = self.max_salary {
            predicates.push("j.salary <= ?", max);
        }
        if let Some(provider_id) = self.provider_id {
            predicates.push("j.provider_id = ?", provider_id.0);
        }
        predicates.set_limit(self.limit);

        predicates
    }
}

impl FilterSet for ApplicationFilter {
    fn predicates(&self) -> Predicates {
        let mut predicates = Predicates::default();

        if let Some(application_id) = self.application_id {
            predicates.push("a.id = ?", application_id.0);
        }
        if let Some(job_id) = self.job_id {
            predicates.push("a.job_id = ?", job_id.0);
        }
        if let Some(seeker_id) = self.seeker_id {
            predicates.push("a.seeker_id = ?", seeker_id.0);
        }
        if let Some(provider_id) = self.provider_id {
            predicates.push("j.provider_id = ?", provider_id.0);
        }
        if let Some(status) = self.status {
            predicates.push("a.status = ?", status.label().to_string());
        }
        predicates.set_limit(self.limit);

        predicates
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|trimmed| !trimmed.is_empty())
}

/// Wraps the needle in `%…%`, escaping the caller's own wildcards.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filters_produce_no_where_clause() {
        assert_eq!(JobFilter::default().predicates().where_clause(), "");
        assert_eq!(ApplicationFilter::default().predicates().where_clause(), "");
    }

    #[test]
    fn all_job_type_is_the_same_as_no_filter() {
        let filter = JobFilter::default().job_type(JobTypeSelection::All);
        assert!(filter.predicates().clauses().is_empty());
        assert_eq!("All".parse::<JobTypeSelection>(), Ok(JobTypeSelection::All));
        assert_eq!(
            "remote".parse::<JobTypeSelection>(),
            Ok(JobTypeSelection::Only(JobType::Remote))
        );
    }

    #[test]
    fn blank_text_options_are_ignored() {
        let filter = JobFilter::default().title("   ").company("");
        assert!(filter.predicates().clauses().is_empty());
    }

    #[test]
    fn job_options_combine_with_and() {
        let filter = JobFilter::for_provider(UserId(7))
            .title("engineer")
            .job_type(JobType::FullTime)
            .salary_between(Some(50_000.0), Some(90_000.0));

        let predicates = filter.predicates();
        assert_eq!(
            predicates.where_clause(),
            " WHERE j.title LIKE ? ESCAPE '\\' AND j.job_type = ? AND j.salary >= ? \
             AND j.salary <= ? AND j.provider_id = ?"
        );
    }

    #[test]
    fn application_options_cover_provider_through_the_job() {
        let filter = ApplicationFilter::for_provider(UserId(3)).status(ApplicationStatus::Interview);
        assert_eq!(
            filter.predicates().where_clause(),
            " WHERE j.provider_id = ? AND a.status = ?"
        );
    }

    #[test]
    fn limit_stays_out_of_the_where_clause() {
        let predicates = JobFilter::for_provider(UserId(2)).limit(5).predicates();
        assert_eq!(predicates.where_clause(), " WHERE j.provider_id = ?");
        assert_eq!(predicates.limit_clause(), " LIMIT ?");
        assert_eq!(ApplicationFilter::default().predicates().limit_clause(), "");

        let filter: ApplicationFilter =
            serde_json::from_value(serde_json::json!({ "limit": 3 })).expect("deserializes");
        assert_eq!(filter, ApplicationFilter::default().limit(3));
    }

    #[test]
    fn wildcards_in_search_text_are_escaped() {
        assert_eq!(contains_pattern("100%_sure"), "%100\\%\\_sure%");
        assert_eq!(contains_pattern("rust"), "%rust%");
    }

    #[test]
    fn filters_deserialize_from_query_shaped_json() {
        let filter: JobFilter = serde_json::from_value(serde_json::json!({
            "job_type": "Part-time",
            "min_salary": 1000.0,
            "provider_id": 4
        }))
        .expect("deserializes");
        assert_eq!(filter.job_type, JobTypeSelection::Only(JobType::PartTime));
        assert_eq!(filter.provider_id, Some(UserId(4)));
        assert!(filter.title.is_none());
        assert!(filter.limit.is_none());

        let invalid = serde_json::from_value::<JobFilter>(serde_json::json!({ "job_type": "Gig" }));
        assert!(invalid.is_err());
    }
}
