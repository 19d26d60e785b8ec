//! JSON API over the workflow service.
//!
//! - `POST /api/v1/requests`                       submit a request
//! - `GET  /api/v1/requests`                       list with filters and paging
//! - `GET  /api/v1/requests/{id}`                  one request with its outcome
//! - `POST /api/v1/requests/{id}/decisions`        approve, reject or acknowledge
//! - `GET  /api/v1/requests/{id}/permissions`      what `actor_id` may do now
//! - `GET  /api/v1/requests/{id}/history`          decision history

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use hrflow_core::domain::employee::{DepartmentId, EmployeeId};
use hrflow_core::domain::request::{RequestId, RequestPayload, WorkflowRequest};
use hrflow_core::errors::{ApplicationError, InterfaceError};
use hrflow_core::workflow::{
    outcome, Decision, DecisionOutcome, RequestOutcome, Stage, StageState,
};
use hrflow_db::repositories::{DecisionRecord, Page, PageRequest, RequestFilter, StatusFilter};

use crate::service::{PermissionView, WorkflowService};

#[derive(Clone)]
pub struct ApiState {
    service: WorkflowService,
}

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub requester_id: String,
    pub payload: RequestPayload,
}

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    pub actor_id: String,
    pub decision: String,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub employee_id: Option<String>,
    pub department_id: Option<String>,
    pub status: Option<StatusFilter>,
    pub awaiting_stage: Option<Stage>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PermissionQuery {
    pub actor_id: String,
}

#[derive(Debug, Serialize)]
pub struct RequestView {
    #[serde(flatten)]
    pub request: WorkflowRequest,
    pub outcome: RequestOutcome,
}

impl From<WorkflowRequest> for RequestView {
    fn from(request: WorkflowRequest) -> Self {
        let outcome = outcome(&request);
        Self { request, outcome }
    }
}

#[derive(Debug, Serialize)]
pub struct DecisionView {
    pub stage: Stage,
    pub applied: StageState,
    pub unlocked: Option<Stage>,
    pub request: RequestView,
}

impl From<DecisionOutcome> for DecisionView {
    fn from(decided: DecisionOutcome) -> Self {
        Self {
            stage: decided.stage,
            applied: decided.applied,
            unlocked: decided.unlocked,
            request: RequestView { request: decided.request, outcome: decided.outcome },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: &'static str,
    pub message: String,
    pub correlation_id: String,
}

type ApiFailure = (StatusCode, Json<ApiError>);
type ApiResult<T> = Result<Json<T>, ApiFailure>;

pub fn router(service: WorkflowService) -> Router {
    Router::new()
        .route("/api/v1/requests", post(submit_request).get(list_requests))
        .route("/api/v1/requests/{id}", get(get_request))
        .route("/api/v1/requests/{id}/decisions", post(decide_request))
        .route("/api/v1/requests/{id}/permissions", get(request_permissions))
        .route("/api/v1/requests/{id}/history", get(request_history))
        .with_state(ApiState { service })
}

async fn submit_request(
    State(state): State<ApiState>,
    body: Result<Json<SubmitBody>, JsonRejection>,
) -> Result<(StatusCode, Json<RequestView>), ApiFailure> {
    let correlation_id = correlation_id();
    let Json(body) = body.map_err(|rejection| bad_body(rejection.body_text(), &correlation_id))?;

    let request = state
        .service
        .submit(&EmployeeId(body.requester_id), body.payload, &correlation_id)
        .await
        .map_err(|error| failure(error, &correlation_id))?;

    Ok((StatusCode::CREATED, Json(request.into())))
}

async fn list_requests(
    State(state): State<ApiState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Page<RequestView>> {
    let correlation_id = correlation_id();
    let Query(query) =
        query.map_err(|rejection| bad_body(rejection.body_text(), &correlation_id))?;

    let date_range = match (query.from, query.to) {
        (None, None) => None,
        (from, to) => Some((from.unwrap_or(earliest_date()), to.unwrap_or(latest_date()))),
    };
    let filter = RequestFilter {
        employee_id: query.employee_id.map(EmployeeId),
        department_id: query.department_id.map(DepartmentId),
        status: query.status,
        awaiting_stage: query.awaiting_stage,
        date_range,
    };

    let page = state
        .service
        .list(&filter, PageRequest::new(query.limit, query.offset))
        .await
        .map_err(|error| failure(error, &correlation_id))?;

    Ok(Json(Page {
        items: page.items.into_iter().map(RequestView::from).collect(),
        total: page.total,
        limit: page.limit,
        offset: page.offset,
    }))
}

async fn get_request(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<RequestView> {
    let correlation_id = correlation_id();
    let request = state
        .service
        .get(&RequestId(id))
        .await
        .map_err(|error| failure(error, &correlation_id))?;
    Ok(Json(request.into()))
}

async fn decide_request(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    body: Result<Json<DecisionBody>, JsonRejection>,
) -> ApiResult<DecisionView> {
    let correlation_id = correlation_id();
    let Json(body) = body.map_err(|rejection| bad_body(rejection.body_text(), &correlation_id))?;

    let decision = body.decision.parse::<Decision>().map_err(|message| {
        reject(InterfaceError::BadRequest {
            kind: "invalid_decision",
            message,
            correlation_id: correlation_id.clone(),
        })
    })?;

    let decided = state
        .service
        .decide(
            &RequestId(id),
            &EmployeeId(body.actor_id),
            decision,
            body.remarks.as_deref(),
            &correlation_id,
        )
        .await
        .map_err(|error| failure(error, &correlation_id))?;

    Ok(Json(decided.into()))
}

async fn request_permissions(
    Path(id): Path<String>,
    State(state): State<ApiState>,
    query: Result<Query<PermissionQuery>, QueryRejection>,
) -> ApiResult<PermissionView> {
    let correlation_id = correlation_id();
    let Query(query) =
        query.map_err(|rejection| bad_body(rejection.body_text(), &correlation_id))?;

    let view = state
        .service
        .permissions(&RequestId(id), &EmployeeId(query.actor_id))
        .await
        .map_err(|error| failure(error, &correlation_id))?;
    Ok(Json(view))
}

async fn request_history(
    Path(id): Path<String>,
    State(state): State<ApiState>,
) -> ApiResult<Vec<DecisionRecord>> {
    let correlation_id = correlation_id();
    let history = state
        .service
        .history(&RequestId(id))
        .await
        .map_err(|error| failure(error, &correlation_id))?;
    Ok(Json(history))
}

fn correlation_id() -> String {
    format!("req-{}", Uuid::new_v4().simple())
}

fn earliest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn latest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

fn bad_body(message: String, correlation_id: &str) -> ApiFailure {
    reject(InterfaceError::BadRequest {
        kind: "bad_request",
        message,
        correlation_id: correlation_id.to_owned(),
    })
}

fn failure(error: ApplicationError, correlation_id: &str) -> ApiFailure {
    reject(error.into_interface(correlation_id))
}

fn reject(error: InterfaceError) -> ApiFailure {
    let status = status_code(&error);
    if status.is_server_error() {
        warn!(
            event_name = "api.request.failed",
            correlation_id = %error.correlation_id(),
            error_kind = error.kind(),
            error = %error,
            "request failed"
        );
    } else {
        info!(
            event_name = "api.request.refused",
            correlation_id = %error.correlation_id(),
            error_kind = error.kind(),
            "request refused"
        );
    }

    (
        status,
        Json(ApiError {
            error: error.kind(),
            message: error.message().to_owned(),
            correlation_id: error.correlation_id().to_owned(),
        }),
    )
}

fn status_code(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
