use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Local, NaiveDateTime};
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use super::domain::{
    ApplicationId, ApplicationStatus, ApplicationView, ApplyOutcome, DashboardStats, JobId,
    JobPosting, NewJob, NewUser, Registration, StatusChange, TransitionPolicy, User, UserId,
    UserRole,
};
use super::filters::{ApplicationFilter, FilterSet, JobFilter};
use super::password::{CredentialError, Credentials};
use super::schema::{self, format_timestamp, timestamp_column};
use crate::config::DatabaseConfig;

const USER_COLUMNS: &str = "id, username, user_type, name, email, registration_date";

const JOB_SELECT: &str = "
    SELECT j.id, j.provider_id, j.title, j.company, j.salary, j.job_type, j.description,
           j.posted_date, u.name, u.email,
           (SELECT COUNT(*) FROM applications c WHERE c.job_id = j.id) AS application_count
    FROM jobs j
    JOIN users u ON j.provider_id = u.id";

const JOB_COUNT: &str = "
    SELECT COUNT(*)
    FROM jobs j
    JOIN users u ON j.provider_id = u.id";

const APPLICATION_SELECT: &str = "
    SELECT a.id, a.job_id, a.seeker_id, j.provider_id, j.title, j.company, u.name, u.email,
           a.application_date, a.status, a.cover_letter
    FROM applications a
    JOIN jobs j ON a.job_id = j.id
    JOIN users u ON a.seeker_id = u.id";

const APPLICATION_COUNT: &str = "
    SELECT COUNT(*)
    FROM applications a
    JOIN jobs j ON a.job_id = j.id
    JOIN users u ON a.seeker_id = u.id";

const APPLICATION_STATUS_COUNTS: &str = "
    SELECT a.status, COUNT(*)
    FROM applications a
    JOIN jobs j ON a.job_id = j.id
    JOIN users u ON a.seeker_id = u.id";

/// Rows shown in each recent-activity list of a dashboard.
const RECENT_ACTIVITY: u32 = 5;

/// Source of the timestamps stamped onto new rows.
pub trait Clock: Send {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Error enumeration for store failures. Declined operations are outcomes, not errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// SQLite-backed store for users, job postings, and applications.
///
/// The store owns its connection for its whole lifetime; callers pass it by reference rather
/// than reaching for shared state.
pub struct MarketplaceStore {
    conn: Connection,
    credentials: Credentials,
    clock: Box<dyn Clock>,
    policy: TransitionPolicy,
}

impl MarketplaceStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening marketplace database");
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let store = if config.is_in_memory() {
            Self::open_in_memory()?
        } else {
            Self::open(&config.path)?
        };
        Ok(store.with_policy(config.status_policy))
    }

    /// Wraps an existing connection, creating the tables if needed.
    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        schema::migrate(&conn)?;
        Ok(Self {
            conn,
            credentials: Credentials::default(),
            clock: Box::new(SystemClock),
            policy: TransitionPolicy::default(),
        })
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Hasher used for new accounts; callers can run it without holding the store.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Releases the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> Result<(), StoreError> {
        self.conn.close().map_err(|(_, err)| StoreError::Sqlite(err))
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    fn now(&self) -> String {
        format_timestamp(&self.clock.now())
    }

    pub fn register(&self, user: &NewUser) -> Result<Registration, StoreError> {
        let credential = self.credentials.hash(&user.password)?;
        self.insert_user(user, &credential)
    }

    /// Inserts an account whose password was already hashed into `credential`.
    pub fn insert_user(&self, user: &NewUser, credential: &str) -> Result<Registration, StoreError> {
        let inserted = self.conn.execute(
            "INSERT INTO users (username, password, user_type, name, email, registration_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.username,
                credential,
                user.role,
                user.name,
                user.email,
                self.now()
            ],
        );

        match inserted {
            Ok(_) => {
                let id = UserId(self.conn.last_insert_rowid());
                info!(user_id = id.0, role = user.role.label(), "user registered");
                Ok(Registration::Created(id))
            }
            Err(err) if is_unique_violation(&err) => {
                warn!(username = %user.username, "username already registered");
                Ok(Registration::UsernameTaken)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Returns the account when `password` matches its stored credential.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>, StoreError> {
        match self.stored_credential(username)? {
            Some((user, stored)) => check_password(&self.credentials, password, user, &stored),
            None => Ok(None),
        }
    }

    /// The account registered under `username` together with its stored credential.
    pub fn stored_credential(&self, username: &str) -> Result<Option<(User, String)>, StoreError> {
        let found = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS}, password FROM users WHERE username = ?1"),
                [username],
                |row| Ok((user_from_row(row)?, row.get::<_, String>(6)?)),
            )
            .optional()?;

        if found.is_none() {
            debug!(username, "login for unknown username");
        }
        Ok(found)
    }

    pub fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id.0],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn count_users(&self) -> Result<u64, StoreError> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Inserts a listing. The caller is responsible for `provider_id` having the provider role.
    pub fn post_job(&self, job: &NewJob) -> Result<JobId, StoreError> {
        self.conn.execute(
            "INSERT INTO jobs (provider_id, title, company, salary, job_type, description, posted_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                job.provider_id.0,
                job.title,
                job.company,
                job.salary,
                job.job_type,
                job.description,
                self.now()
            ],
        )?;

        let id = JobId(self.conn.last_insert_rowid());
        info!(job_id = id.0, provider_id = job.provider_id.0, "job posted");
        Ok(id)
    }

    /// Listings matching `filter`, newest first.
    pub fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<JobPosting>, StoreError> {
        let predicates = filter.predicates();
        let sql = format!(
            "{JOB_SELECT}{} ORDER BY j.posted_date DESC, j.id DESC{}",
            predicates.where_clause(),
            predicates.limit_clause()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let jobs = stmt
            .query_map(predicates.paged_params(), job_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    pub fn count_jobs(&self, filter: &JobFilter) -> Result<u64, StoreError> {
        let predicates = filter.predicates();
        let sql = format!("{JOB_COUNT}{}", predicates.where_clause());
        let count = self
            .conn
            .query_row(&sql, predicates.params(), |row| row.get(0))?;
        Ok(count)
    }

    pub fn job(&self, id: JobId) -> Result<Option<JobPosting>, StoreError> {
        let job = self
            .conn
            .query_row(&format!("{JOB_SELECT} WHERE j.id = ?1"), [id.0], job_from_row)
            .optional()?;
        Ok(job)
    }

    /// Deletes a listing and its applications in one transaction.
    ///
    /// Returns `false` without touching anything when the job does not exist or belongs to
    /// another provider.
    pub fn delete_job(&mut self, id: JobId, provider_id: UserId) -> Result<bool, StoreError> {
        let tx = self.conn.transaction()?;

        let owned = tx
            .query_row(
                "SELECT 1 FROM jobs WHERE id = ?1 AND provider_id = ?2",
                params![id.0, provider_id.0],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !owned {
            warn!(
                job_id = id.0,
                provider_id = provider_id.0,
                "job delete declined: not found or not owned"
            );
            return Ok(false);
        }

        let removed = tx.execute("DELETE FROM applications WHERE job_id = ?1", [id.0])?;
        tx.execute("DELETE FROM jobs WHERE id = ?1", [id.0])?;
        tx.commit()?;

        info!(job_id = id.0, removed_applications = removed, "job deleted");
        Ok(true)
    }

    /// Submits an application unless the seeker already applied to this job.
    pub fn apply_for_job(
        &self,
        job_id: JobId,
        seeker_id: UserId,
        cover_letter: &str,
    ) -> Result<ApplyOutcome, StoreError> {
        let existing = self
            .conn
            .query_row(
                "SELECT id FROM applications WHERE job_id = ?1 AND seeker_id = ?2",
                params![job_id.0, seeker_id.0],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if existing.is_some() {
            warn!(
                job_id = job_id.0,
                seeker_id = seeker_id.0,
                "duplicate application declined"
            );
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        self.conn.execute(
            "INSERT INTO applications (job_id, seeker_id, application_date, status, cover_letter)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                job_id.0,
                seeker_id.0,
                self.now(),
                ApplicationStatus::Pending,
                cover_letter
            ],
        )?;

        let id = ApplicationId(self.conn.last_insert_rowid());
        info!(
            application_id = id.0,
            job_id = job_id.0,
            seeker_id = seeker_id.0,
            "application submitted"
        );
        Ok(ApplyOutcome::Submitted(id))
    }

    /// Applications matching `filter`, most recent first.
    pub fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<ApplicationView>, StoreError> {
        let predicates = filter.predicates();
        let sql = format!(
            "{APPLICATION_SELECT}{} ORDER BY a.application_date DESC, a.id DESC{}",
            predicates.where_clause(),
            predicates.limit_clause()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let applications = stmt
            .query_map(predicates.paged_params(), application_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(applications)
    }

    pub fn count_applications(&self, filter: &ApplicationFilter) -> Result<u64, StoreError> {
        let predicates = filter.predicates();
        let sql = format!("{APPLICATION_COUNT}{}", predicates.where_clause());
        let count = self
            .conn
            .query_row(&sql, predicates.params(), |row| row.get(0))?;
        Ok(count)
    }

    pub fn status_counts(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<BTreeMap<ApplicationStatus, u64>, StoreError> {
        let predicates = filter.predicates();
        let sql = format!(
            "{APPLICATION_STATUS_COUNTS}{} GROUP BY a.status",
            predicates.where_clause()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let counts = stmt
            .query_map(predicates.params(), |row| {
                Ok((row.get::<_, ApplicationStatus>(0)?, row.get::<_, u64>(1)?))
            })?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
        Ok(counts)
    }

    pub fn application(&self, id: ApplicationId) -> Result<Option<ApplicationView>, StoreError> {
        let mut applications = self.list_applications(&ApplicationFilter::for_application(id))?;
        Ok(applications.pop())
    }

    pub fn applications_for_seeker(
        &self,
        seeker_id: UserId,
    ) -> Result<Vec<ApplicationView>, StoreError> {
        self.list_applications(&ApplicationFilter::for_seeker(seeker_id))
    }

    /// Overwrites an application's status, subject to the store's transition policy.
    ///
    /// No ownership check happens here; see `MarketplaceService::review_application`.
    pub fn update_application_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<StatusChange, StoreError> {
        let current = self
            .conn
            .query_row(
                "SELECT status FROM applications WHERE id = ?1",
                [id.0],
                |row| row.get::<_, ApplicationStatus>(0),
            )
            .optional()?;

        let Some(from) = current else {
            return Ok(StatusChange::NotFound);
        };

        if !self.policy.allows(from, status) {
            warn!(
                application_id = id.0,
                from = from.label(),
                to = status.label(),
                "status transition rejected"
            );
            return Ok(StatusChange::Rejected { from, to: status });
        }

        self.conn.execute(
            "UPDATE applications SET status = ?1 WHERE id = ?2",
            params![status, id.0],
        )?;

        info!(
            application_id = id.0,
            from = from.label(),
            to = status.label(),
            "application status updated"
        );
        Ok(StatusChange::Updated { from, to: status })
    }

    /// Counters for a user's dashboard, derived from the same predicates as the listings.
    ///
    /// Providers see the latest applications to their jobs, seekers the latest postings.
    pub fn dashboard_stats(
        &self,
        user_id: UserId,
        role: UserRole,
    ) -> Result<DashboardStats, StoreError> {
        let (total_jobs, filter) = match role {
            UserRole::Provider => (
                Some(self.count_jobs(&JobFilter::for_provider(user_id))?),
                ApplicationFilter::for_provider(user_id),
            ),
            UserRole::Seeker => (None, ApplicationFilter::for_seeker(user_id)),
        };

        let (recent_jobs, recent_applications) = match role {
            UserRole::Provider => (
                Vec::new(),
                self.list_applications(&filter.clone().limit(RECENT_ACTIVITY))?,
            ),
            UserRole::Seeker => (
                self.list_jobs(&JobFilter::default().limit(RECENT_ACTIVITY))?,
                Vec::new(),
            ),
        };

        Ok(DashboardStats {
            role,
            total_jobs,
            total_applications: self.count_applications(&filter)?,
            status_counts: self.status_counts(&filter)?,
            recent_jobs,
            recent_applications,
        })
    }
}

/// Checks `password` against a stored credential, outside any lock on the store.
///
/// A credential that is not a PHC string, such as a plaintext password written by older
/// tooling, never matches.
pub(crate) fn check_password(
    credentials: &Credentials,
    password: &str,
    user: User,
    stored: &str,
) -> Result<Option<User>, StoreError> {
    match credentials.verify(password, stored) {
        Ok(true) => Ok(Some(user)),
        Ok(false) => {
            warn!(user_id = user.id.0, "login with wrong password");
            Ok(None)
        }
        Err(CredentialError::Malformed(reason)) => {
            warn!(user_id = user.id.0, %reason, "stored credential is not a password hash");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        username: row.get(1)?,
        role: row.get(2)?,
        name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        email: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        registered_at: timestamp_column(row, 5)?,
    })
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<JobPosting> {
    Ok(JobPosting {
        id: JobId(row.get(0)?),
        provider_id: UserId(row.get(1)?),
        title: row.get(2)?,
        company: row.get(3)?,
        salary: row.get(4)?,
        job_type: row.get(5)?,
        description: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        posted_at: timestamp_column(row, 7)?,
        provider_name: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        provider_email: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        application_count: row.get(10)?,
    })
}

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<ApplicationView> {
    Ok(ApplicationView {
        id: ApplicationId(row.get(0)?),
        job_id: JobId(row.get(1)?),
        seeker_id: UserId(row.get(2)?),
        provider_id: UserId(row.get(3)?),
        job_title: row.get(4)?,
        company: row.get(5)?,
        applicant_name: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        applicant_email: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        applied_at: timestamp_column(row, 8)?,
        status: row.get(9)?,
        cover_letter: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
    })
}
