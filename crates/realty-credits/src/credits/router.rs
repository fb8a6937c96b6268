use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use super::analytics::UsageFilter;
use super::domain::{AdminAlert, AiTool, CreditLimit, ToolRequest, TransactionStatus, UserId};
use super::gate::{DenialReason, GateDecision};
use super::provider::{AiProvider, ProviderError};
use super::repository::{CreditRepository, RepositoryError};
use super::service::{CreditService, CreditServiceError};

type SharedService<R, P> = Arc<CreditService<R, P>>;

/// Router builder exposing wallet, tool, and admin endpoints.
pub fn credit_router<R, P>(service: SharedService<R, P>) -> Router
where
    R: CreditRepository + 'static,
    P: AiProvider + 'static,
{
    Router::new()
        .route("/api/v1/wallets/:user_id", get(wallet_handler::<R, P>))
        .route("/api/v1/tools/:tool/check", post(check_handler::<R, P>))
        .route("/api/v1/tools/:tool/invoke", post(invoke_handler::<R, P>))
        .route("/api/v1/admin/tools", get(list_flags_handler::<R, P>))
        .route("/api/v1/admin/tools/:tool", put(set_flag_handler::<R, P>))
        .route(
            "/api/v1/admin/credit-limits",
            post(credit_limit_handler::<R, P>),
        )
        .route("/api/v1/admin/alerts", post(alert_handler::<R, P>))
        .route("/api/v1/admin/snapshots", post(snapshot_handler::<R, P>))
        .route(
            "/api/v1/admin/wallets/:user_id/grant",
            post(grant_handler::<R, P>),
        )
        .route("/api/v1/admin/usage", get(usage_summary_handler::<R, P>))
        .route(
            "/api/v1/admin/usage/top-users",
            get(top_users_handler::<R, P>),
        )
        .route(
            "/api/v1/admin/usage/export",
            get(usage_export_handler::<R, P>),
        )
        .route(
            "/api/v1/admin/transactions",
            get(transactions_handler::<R, P>),
        )
        .route("/api/v1/admin/usage-log", get(usage_log_handler::<R, P>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CheckRequest {
    pub(crate) user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InvokeRequest {
    pub(crate) user_id: UserId,
    #[serde(default)]
    pub(crate) input: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FlagUpdate {
    pub(crate) is_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GrantRequest {
    pub(crate) credits: u64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SnapshotRequest {
    #[serde(default)]
    pub(crate) day: Option<NaiveDate>,
}

/// Query string accepted by the admin usage views.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct UsageQuery {
    #[serde(default)]
    pub(crate) user_id: Option<String>,
    #[serde(default)]
    pub(crate) tool: Option<String>,
    #[serde(default)]
    pub(crate) from: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) to: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

impl UsageQuery {
    fn filter(&self) -> Result<UsageFilter, String> {
        let tool = self
            .tool
            .as_deref()
            .map(str::parse::<AiTool>)
            .transpose()
            .map_err(|err| err.to_string())?;
        let status = self
            .status
            .as_deref()
            .map(str::parse::<TransactionStatus>)
            .transpose()?;

        Ok(UsageFilter {
            user_id: self.user_id.clone().map(UserId),
            tool,
            from: self.from,
            to: self.to,
            status,
        })
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (status, axum::Json(payload)).into_response()
}

fn denial_status(reason: &DenialReason) -> StatusCode {
    match reason {
        DenialReason::ToolDisabled => StatusCode::FORBIDDEN,
        DenialReason::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
        DenialReason::DailyLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
    }
}

pub(crate) fn service_error_response(error: CreditServiceError) -> Response {
    match error {
        CreditServiceError::Denied(reason) => {
            let payload = json!({
                "error": reason.to_string(),
                "reason": reason,
            });
            (denial_status(&reason), axum::Json(payload)).into_response()
        }
        CreditServiceError::Provider(ProviderError::InvalidInput(message)) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, message)
        }
        CreditServiceError::Provider(other) => {
            error_response(StatusCode::BAD_GATEWAY, other.to_string())
        }
        CreditServiceError::Repository(RepositoryError::NotFound) => {
            error_response(StatusCode::NOT_FOUND, "record not found")
        }
        CreditServiceError::Repository(RepositoryError::Conflict) => {
            error_response(StatusCode::CONFLICT, "record already exists")
        }
        CreditServiceError::Invalid(message) => error_response(StatusCode::BAD_REQUEST, message),
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

fn parse_tool(raw: &str) -> Result<AiTool, Response> {
    raw.parse::<AiTool>()
        .map_err(|err| error_response(StatusCode::NOT_FOUND, err.to_string()))
}

pub(crate) async fn wallet_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(user_id): Path<String>,
) -> Response
where
    R: CreditRepository + 'static,
    P: AiProvider + 'static,
{
    match service.balance(&UserId(user_id)) {
        Ok(wallet) => (StatusCode::OK, axum::Json(wallet)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn check_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(tool): Path<String>,
    axum::Json(request): axum::Json<CheckRequest>,
) -> Response
where
    R: CreditRepository + 'static,
    P: AiProvider + 'static,
{
    let tool = match parse_tool(&tool) {
        Ok(tool) => tool,
        Err(response) => return response,
    };

    match service.check(&request.user_id, tool) {
        Ok(decision) => {
            let reason = match decision {
                GateDecision::Allow => None,
                GateDecision::Deny(reason) => Some(reason),
            };
            let payload = json!({
                "tool": tool,
                "allowed": decision.is_allowed(),
                "cost": service.pricing().cost(tool),
                "reason": reason,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn invoke_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(tool): Path<String>,
    axum::Json(request): axum::Json<InvokeRequest>,
) -> Response
where
    R: CreditRepository + 'static,
    P: AiProvider + 'static,
{
    let tool = match parse_tool(&tool) {
        Ok(tool) => tool,
        Err(response) => return response,
    };

    let request = ToolRequest {
        user_id: request.user_id,
        tool,
        input: request.input,
    };
    match service.invoke(request).await {
        Ok(response) => (StatusCode::OK, axum::Json(response)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn list_flags_handler<R, P>(
    State(service): State<SharedService<R, P>>,
) -> Response
where
    R: CreditRepository + 'static,
    P: AiProvider + 'static,
{
    match service.tool_flags() {
        Ok(flags) => (StatusCode::OK, axum::Json(flags)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn set_flag_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(tool): Path<String>,
    axum::Json(update): axum::Json<FlagUpdate>,
) -> Response
where
    R: CreditRepository + 'static,
    P: AiProvider + 'static,
{
    let tool = match parse_tool(&tool) {
        Ok(tool) => tool,
        Err(response) => return response,
    };

    match service.set_tool_enabled(tool, update.is_enabled) {
        Ok(flag) => (StatusCode::OK, axum::Json(flag)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn credit_limit_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    axum::Json(limit): axum::Json<CreditLimit>,
) -> Response
where
    R: CreditRepository + 'static,
    P: AiProvider + 'static,
{
    match service.upsert_credit_limit(limit) {
        Ok(stored) => {
            let payload = json!({ "success": true, "id": stored.tool_name });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn alert_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    axum::Json(alert): axum::Json<AdminAlert>,
) -> Response
where
    R: CreditRepository + 'static,
    P: AiProvider + 'static,
{
    match service.record_alert(alert) {
        Ok(id) => {
            let payload = json!({ "success": true, "id": id });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn snapshot_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    request: Option<axum::Json<SnapshotRequest>>,
) -> Response
where
    R: CreditRepository + 'static,
    P: AiProvider + 'static,
{
    let day = request
        .and_then(|axum::Json(request)| request.day)
        .unwrap_or_else(|| Utc::now().date_naive());

    match service.record_snapshot(day) {
        Ok((id, snapshot)) => {
            let payload = json!({ "success": true, "id": id, "snapshot": snapshot });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn grant_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Path(user_id): Path<String>,
    axum::Json(request): axum::Json<GrantRequest>,
) -> Response
where
    R: CreditRepository + 'static,
    P: AiProvider + 'static,
{
    match service.grant(&UserId(user_id), request.credits) {
        Ok(wallet) => (StatusCode::OK, axum::Json(wallet)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn usage_summary_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Query(query): Query<UsageQuery>,
) -> Response
where
    R: CreditRepository + 'static,
    P: AiProvider + 'static,
{
    let filter = match query.filter() {
        Ok(filter) => filter,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    match service.usage_summary(&filter) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn top_users_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Query(query): Query<UsageQuery>,
) -> Response
where
    R: CreditRepository + 'static,
    P: AiProvider + 'static,
{
    let filter = match query.filter() {
        Ok(filter) => filter,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    match service.top_users(&filter, query.limit.unwrap_or(10)) {
        Ok(users) => (StatusCode::OK, axum::Json(users)).into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn usage_export_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Query(query): Query<UsageQuery>,
) -> Response
where
    R: CreditRepository + 'static,
    P: AiProvider + 'static,
{
    let filter = match query.filter() {
        Ok(filter) => filter,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    match service.export_csv(&filter) {
        Ok(csv) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"ai_tool_transactions.csv\"",
                ),
            ],
            csv,
        )
            .into_response(),
        Err(error) => service_error_response(error),
    }
}

pub(crate) async fn transactions_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Query(query): Query<UsageQuery>,
) -> Response
where
    R: CreditRepository + 'static,
    P: AiProvider + 'static,
{
    let filter = match query.filter() {
        Ok(filter) => filter,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    match service.transactions(&filter, query.limit) {
        Ok(rows) => (StatusCode::OK, axum::Json(rows)).into_response(),
        Err(error) => service_error_response(error),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UsageLogQuery {
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

pub(crate) async fn usage_log_handler<R, P>(
    State(service): State<SharedService<R, P>>,
    Query(query): Query<UsageLogQuery>,
) -> Response
where
    R: CreditRepository + 'static,
    P: AiProvider + 'static,
{
    let entries = service.recent_usage(query.limit.unwrap_or(100));
    (StatusCode::OK, axum::Json(entries)).into_response()
}
