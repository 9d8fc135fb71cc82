//! Job marketplace: providers post listings, seekers apply, and providers triage the
//! applications their listings receive.
//!
//! `MarketplaceStore` owns the SQLite connection and answers every query; declined requests
//! come back as outcome values. `MarketplaceService` layers validation, role checks, and
//! ownership on top, and `marketplace_router` exposes the service over HTTP.

pub mod domain;
pub mod filters;
pub mod password;
pub mod router;
pub(crate) mod schema;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{
    format_salary, ApplicationId, ApplicationStatus, ApplicationView, ApplyOutcome,
    DashboardStats, JobId, JobPosting, JobType, NewJob, NewUser, Registration, StatusChange,
    TransitionPolicy, UnknownLabel, User, UserId, UserRole, TIMESTAMP_FORMAT,
};
pub use filters::{ApplicationFilter, JobFilter, JobTypeSelection};
pub use password::{CredentialError, Credentials};
pub use router::marketplace_router;
pub use service::{MarketplaceError, MarketplaceService, ValidationError, MAX_SALARY};
pub use store::{Clock, MarketplaceStore, StoreError, SystemClock};
