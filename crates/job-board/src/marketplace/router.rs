use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{
    ApplicationId, ApplicationStatus, ApplyOutcome, JobId, NewJob, NewUser, UserId,
};
use super::filters::{ApplicationFilter, JobFilter};
use super::service::{MarketplaceError, MarketplaceService};

/// Router builder exposing the marketplace over HTTP.
pub fn marketplace_router(service: Arc<MarketplaceService>) -> Router {
    Router::new()
        .route("/api/v1/users", post(register_handler))
        .route("/api/v1/sessions", post(login_handler))
        .route("/api/v1/users/:user_id/dashboard", get(dashboard_handler))
        .route("/api/v1/jobs", get(list_jobs_handler).post(post_job_handler))
        .route(
            "/api/v1/jobs/:job_id",
            get(job_handler).delete(delete_job_handler),
        )
        .route("/api/v1/jobs/:job_id/applications", post(apply_handler))
        .route("/api/v1/applications", get(list_applications_handler))
        .route(
            "/api/v1/applications/:application_id/status",
            put(review_handler),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApplyRequest {
    pub seeker_id: UserId,
    #[serde(default)]
    pub cover_letter: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusUpdateRequest {
    pub provider_id: UserId,
    pub status: ApplicationStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteQuery {
    pub provider_id: UserId,
}

/// Runs a service call on the blocking pool. Store access and password hashing are synchronous
/// and must not stall the async workers.
async fn blocking<T, F>(service: Arc<MarketplaceService>, call: F) -> Result<T, MarketplaceError>
where
    F: FnOnce(&MarketplaceService) -> Result<T, MarketplaceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || call(&service))
        .await
        .map_err(|err| {
            error!(error = %err, "marketplace task did not complete");
            MarketplaceError::Unavailable
        })?
}

pub(crate) async fn register_handler(
    State(service): State<Arc<MarketplaceService>>,
    axum::Json(form): axum::Json<NewUser>,
) -> Response {
    match blocking(service, move |service| service.register(form)).await {
        Ok(id) => (StatusCode::CREATED, axum::Json(json!({ "id": id }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn login_handler(
    State(service): State<Arc<MarketplaceService>>,
    axum::Json(request): axum::Json<LoginRequest>,
) -> Response {
    match blocking(service, move |service| {
        service.login(&request.username, &request.password)
    })
    .await
    {
        Ok(user) => (StatusCode::OK, axum::Json(user)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn dashboard_handler(
    State(service): State<Arc<MarketplaceService>>,
    Path(user_id): Path<i64>,
) -> Response {
    match blocking(service, move |service| service.dashboard(UserId(user_id))).await {
        Ok(stats) => (StatusCode::OK, axum::Json(stats)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_jobs_handler(
    State(service): State<Arc<MarketplaceService>>,
    Query(filter): Query<JobFilter>,
) -> Response {
    match blocking(service, move |service| service.jobs(&filter)).await {
        Ok(jobs) => (StatusCode::OK, axum::Json(jobs)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn post_job_handler(
    State(service): State<Arc<MarketplaceService>>,
    axum::Json(form): axum::Json<NewJob>,
) -> Response {
    match blocking(service, move |service| service.post_job(form)).await {
        Ok(id) => (StatusCode::CREATED, axum::Json(json!({ "id": id }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn job_handler(
    State(service): State<Arc<MarketplaceService>>,
    Path(job_id): Path<i64>,
) -> Response {
    match blocking(service, move |service| service.job(JobId(job_id))).await {
        Ok(job) => (StatusCode::OK, axum::Json(job)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_job_handler(
    State(service): State<Arc<MarketplaceService>>,
    Path(job_id): Path<i64>,
    Query(query): Query<DeleteQuery>,
) -> Response {
    match blocking(service, move |service| {
        service.delete_job(JobId(job_id), query.provider_id)
    })
    .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn apply_handler(
    State(service): State<Arc<MarketplaceService>>,
    Path(job_id): Path<i64>,
    axum::Json(request): axum::Json<ApplyRequest>,
) -> Response {
    match blocking(service, move |service| {
        service.apply(JobId(job_id), request.seeker_id, &request.cover_letter)
    })
    .await
    {
        Ok(id) => {
            let payload = json!({
                "id": id,
                "message": ApplyOutcome::Submitted(id).message(),
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn list_applications_handler(
    State(service): State<Arc<MarketplaceService>>,
    Query(filter): Query<ApplicationFilter>,
) -> Response {
    match blocking(service, move |service| service.applications(&filter)).await {
        Ok(applications) => (StatusCode::OK, axum::Json(applications)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn review_handler(
    State(service): State<Arc<MarketplaceService>>,
    Path(application_id): Path<i64>,
    axum::Json(request): axum::Json<StatusUpdateRequest>,
) -> Response {
    let change = blocking(service, move |service| {
        service.review_application(
            ApplicationId(application_id),
            request.provider_id,
            request.status,
        )
    })
    .await;
    match change {
        Ok(change) => (StatusCode::OK, axum::Json(change)).into_response(),
        Err(err) => error_response(err),
    }
}

/// HTTP status a service error is reported with.
pub(crate) fn status_for(err: &MarketplaceError) -> StatusCode {
    match err {
        MarketplaceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MarketplaceError::UsernameTaken
        | MarketplaceError::DuplicateApplication
        | MarketplaceError::TransitionRejected { .. } => StatusCode::CONFLICT,
        MarketplaceError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        MarketplaceError::Forbidden(_) => StatusCode::FORBIDDEN,
        MarketplaceError::NotFound(_) => StatusCode::NOT_FOUND,
        MarketplaceError::Unavailable | MarketplaceError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: MarketplaceError) -> Response {
    let status = status_for(&err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "marketplace request failed");
    }

    let payload = match &err {
        MarketplaceError::TransitionRejected { from, to } => json!({
            "error": err.to_string(),
            "from": from,
            "to": to,
        }),
        _ => json!({ "error": err.to_string() }),
    };
    (status, axum::Json(payload)).into_response()
}
