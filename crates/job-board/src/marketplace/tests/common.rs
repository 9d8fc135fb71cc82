use std::cell::Cell;
use std::sync::Arc;

use axum::response::Response;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::marketplace::{
    Clock, Credentials, JobId, JobType, MarketplaceService, MarketplaceStore, NewJob, NewUser,
    Registration, UserId, UserRole,
};

/// Clock that starts at a fixed instant and advances one second per reading.
pub(super) struct StepClock {
    next: Cell<NaiveDateTime>,
}

impl StepClock {
    pub(super) fn new() -> Self {
        Self {
            next: Cell::new(epoch()),
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> NaiveDateTime {
        let now = self.next.get();
        self.next.set(now + Duration::seconds(1));
        now
    }
}

/// Clock that never moves, for exercising timestamp ties.
pub(super) struct FrozenClock;

impl Clock for FrozenClock {
    fn now(&self) -> NaiveDateTime {
        epoch()
    }
}

pub(super) fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|date| date.and_hms_opt(9, 0, 0))
        .expect("valid timestamp")
}

pub(super) fn cheap_credentials() -> Credentials {
    Credentials::with_params(8, 1, 1).expect("valid argon2 params")
}

pub(super) fn store() -> MarketplaceStore {
    MarketplaceStore::open_in_memory()
        .expect("in-memory store opens")
        .with_clock(StepClock::new())
        .with_credentials(cheap_credentials())
}

pub(super) fn service() -> Arc<MarketplaceService> {
    Arc::new(MarketplaceService::new(store()))
}

pub(super) fn new_user(username: &str, role: UserRole) -> NewUser {
    NewUser {
        username: username.to_string(),
        password: format!("{username}-pw"),
        role,
        name: format!("{username} name"),
        email: format!("{username}@example.com"),
    }
}

pub(super) fn register(store: &MarketplaceStore, username: &str, role: UserRole) -> UserId {
    match store
        .register(&new_user(username, role))
        .expect("registration runs")
    {
        Registration::Created(id) => id,
        other => panic!("expected a new user, got {other:?}"),
    }
}

pub(super) fn new_job(
    provider_id: UserId,
    title: &str,
    salary: Option<f64>,
    job_type: JobType,
) -> NewJob {
    NewJob {
        provider_id,
        title: title.to_string(),
        company: "Acme Corp".to_string(),
        salary,
        job_type,
        description: format!("{title} at Acme"),
    }
}

pub(super) fn post(store: &MarketplaceStore, provider_id: UserId, title: &str) -> JobId {
    store
        .post_job(&new_job(provider_id, title, Some(80_000.0), JobType::FullTime))
        .expect("job posts")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("valid json body")
}
