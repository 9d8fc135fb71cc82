use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use super::domain::{
    ApplicationId, ApplicationStatus, ApplicationView, ApplyOutcome, DashboardStats, JobId,
    JobPosting, NewJob, NewUser, Registration, StatusChange, User, UserId, UserRole,
};
use super::filters::{ApplicationFilter, JobFilter};
use super::store::{check_password, MarketplaceStore, StoreError};

/// Upper bound accepted for an advertised salary.
pub const MAX_SALARY: f64 = 1_000_000.0;

/// Field-level problems with submitted forms.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("salary must be between 0 and 1,000,000")]
    SalaryOutOfRange,
}

/// Error raised by the marketplace service.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("username already exists")]
    UsernameTaken,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("You have already applied for this job")]
    DuplicateApplication,
    #[error("cannot move application from {from} to {to}")]
    TransitionRejected {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("marketplace store unavailable")]
    Unavailable,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Facade the presentation surfaces call: validates forms, enforces roles and ownership, and
/// serializes access to the single store connection.
///
/// Password hashing and verification run after the lock is released.
pub struct MarketplaceService {
    store: Mutex<MarketplaceStore>,
}

impl MarketplaceService {
    pub fn new(store: MarketplaceStore) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, MarketplaceStore>, MarketplaceError> {
        self.store.lock().map_err(|_| MarketplaceError::Unavailable)
    }

    /// Hands the store back, e.g. to close it on shutdown.
    pub fn into_store(self) -> Result<MarketplaceStore, MarketplaceError> {
        self.store
            .into_inner()
            .map_err(|_| MarketplaceError::Unavailable)
    }

    pub fn register(&self, form: NewUser) -> Result<UserId, MarketplaceError> {
        let form = NewUser {
            username: required("username", &form.username)?,
            password: secret("password", form.password)?,
            role: form.role,
            name: required("name", &form.name)?,
            email: required("email", &form.email)?,
        };

        let credentials = self.store()?.credentials().clone();
        let credential = credentials
            .hash(&form.password)
            .map_err(StoreError::from)?;

        match self.store()?.insert_user(&form, &credential)? {
            Registration::Created(id) => Ok(id),
            Registration::UsernameTaken => Err(MarketplaceError::UsernameTaken),
        }
    }

    pub fn login(&self, username: &str, password: &str) -> Result<User, MarketplaceError> {
        let username = required("username", username)?;
        let password = secret("password", password.to_string())?;

        let (credentials, found) = {
            let store = self.store()?;
            (store.credentials().clone(), store.stored_credential(&username)?)
        };
        let Some((user, stored)) = found else {
            return Err(MarketplaceError::InvalidCredentials);
        };

        check_password(&credentials, &password, user, &stored)?
            .ok_or(MarketplaceError::InvalidCredentials)
    }

    pub fn user(&self, id: UserId) -> Result<User, MarketplaceError> {
        self.store()?
            .user(id)?
            .ok_or(MarketplaceError::NotFound("user"))
    }

    pub fn post_job(&self, form: NewJob) -> Result<JobId, MarketplaceError> {
        let form = NewJob {
            provider_id: form.provider_id,
            title: required("title", &form.title)?,
            company: required("company", &form.company)?,
            salary: checked_salary(form.salary)?,
            job_type: form.job_type,
            description: required("description", &form.description)?,
        };

        let store = self.store()?;
        require_role(&store, form.provider_id, UserRole::Provider)?;
        Ok(store.post_job(&form)?)
    }

    pub fn jobs(&self, filter: &JobFilter) -> Result<Vec<JobPosting>, MarketplaceError> {
        Ok(self.store()?.list_jobs(filter)?)
    }

    pub fn job(&self, id: JobId) -> Result<JobPosting, MarketplaceError> {
        self.store()?
            .job(id)?
            .ok_or(MarketplaceError::NotFound("job"))
    }

    pub fn delete_job(&self, id: JobId, provider_id: UserId) -> Result<(), MarketplaceError> {
        if self.store()?.delete_job(id, provider_id)? {
            Ok(())
        } else {
            Err(MarketplaceError::Forbidden(
                "job does not exist or belongs to another provider",
            ))
        }
    }

    pub fn apply(
        &self,
        job_id: JobId,
        seeker_id: UserId,
        cover_letter: &str,
    ) -> Result<ApplicationId, MarketplaceError> {
        let cover_letter = required("cover letter", cover_letter)?;

        let store = self.store()?;
        require_role(&store, seeker_id, UserRole::Seeker)?;
        if store.job(job_id)?.is_none() {
            return Err(MarketplaceError::NotFound("job"));
        }

        match store.apply_for_job(job_id, seeker_id, &cover_letter)? {
            ApplyOutcome::Submitted(id) => Ok(id),
            ApplyOutcome::AlreadyApplied => Err(MarketplaceError::DuplicateApplication),
        }
    }

    pub fn applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<ApplicationView>, MarketplaceError> {
        Ok(self.store()?.list_applications(filter)?)
    }

    pub fn application(&self, id: ApplicationId) -> Result<ApplicationView, MarketplaceError> {
        self.store()?
            .application(id)?
            .ok_or(MarketplaceError::NotFound("application"))
    }

    /// Status change performed on behalf of the provider that owns the application's job.
    pub fn review_application(
        &self,
        id: ApplicationId,
        provider_id: UserId,
        status: ApplicationStatus,
    ) -> Result<StatusChange, MarketplaceError> {
        let store = self.store()?;
        let application = store
            .application(id)?
            .ok_or(MarketplaceError::NotFound("application"))?;

        if application.provider_id != provider_id {
            warn!(
                application_id = id.0,
                provider_id = provider_id.0,
                "status change by non-owner declined"
            );
            return Err(MarketplaceError::Forbidden(
                "only the provider who posted the job may review its applications",
            ));
        }

        match store.update_application_status(id, status)? {
            change @ StatusChange::Updated { .. } => Ok(change),
            StatusChange::Rejected { from, to } => {
                Err(MarketplaceError::TransitionRejected { from, to })
            }
            StatusChange::NotFound => Err(MarketplaceError::NotFound("application")),
        }
    }

    /// Dashboard for a user, picking the provider or seeker view from the account's role.
    pub fn dashboard(&self, user_id: UserId) -> Result<DashboardStats, MarketplaceError> {
        let store = self.store()?;
        let user = store
            .user(user_id)?
            .ok_or(MarketplaceError::NotFound("user"))?;
        Ok(store.dashboard_stats(user.id, user.role)?)
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Passwords are kept verbatim; only an all-blank value is refused.
fn secret(field: &'static str, value: String) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(value)
    }
}

fn checked_salary(salary: Option<f64>) -> Result<Option<f64>, ValidationError> {
    match salary {
        Some(value) if !value.is_finite() || !(0.0..=MAX_SALARY).contains(&value) => {
            Err(ValidationError::SalaryOutOfRange)
        }
        other => Ok(other),
    }
}

fn require_role(
    store: &MarketplaceStore,
    user_id: UserId,
    role: UserRole,
) -> Result<(), MarketplaceError> {
    match store.user(user_id)? {
        Some(user) if user.role == role => Ok(()),
        Some(_) => Err(MarketplaceError::Forbidden(match role {
            UserRole::Provider => "only job providers may post jobs",
            UserRole::Seeker => "only job seekers may apply for jobs",
        })),
        None => Err(MarketplaceError::NotFound("user")),
    }
}
