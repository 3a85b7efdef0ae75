use axum::extract::{Path, Query, State as AxumState};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use colorpot_execution::EngineError;
use colorpot_types::api::{BalanceView, StatsView};

use crate::app::AppState;
use crate::protocol::{parse_amount, BetRequest, DepositRequest, ErrorBody, HistoryQuery};

const DEFAULT_HISTORY_LIMIT: usize = 20;

pub fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::InvalidAmount { .. }
        | EngineError::InvalidUserId
        | EngineError::InvalidColorLabel
        | EngineError::DrawOutOfRange { .. } => StatusCode::BAD_REQUEST,
        EngineError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
        EngineError::RoundNotOpen { .. }
        | EngineError::InvalidState { .. }
        | EngineError::NoParticipants => StatusCode::CONFLICT,
        EngineError::UnknownRound(_) | EngineError::UnknownCurrency(_) => StatusCode::NOT_FOUND,
        EngineError::BalanceOverflow => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn error_response(err: EngineError) -> Response {
    (status_for(&err), Json(ErrorBody::from(&err))).into_response()
}

fn respond<T: serde::Serialize>(result: Result<T, EngineError>) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(err) => error_response(err),
    }
}

fn presents_token(expected: &str, header_name: &str, headers: &HeaderMap) -> bool {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    let header_token = headers
        .get(header_name)
        .and_then(|value| value.to_str().ok());
    bearer == Some(expected) || header_token == Some(expected)
}

/// Validates admin authentication via x-admin-token header or Bearer token.
/// Returns None if authorized. With no token configured every admin request is refused.
pub fn admin_auth_error(expected: Option<&str>, headers: &HeaderMap) -> Option<StatusCode> {
    match expected {
        Some(token) if presents_token(token, "x-admin-token", headers) => None,
        _ => Some(StatusCode::UNAUTHORIZED),
    }
}

/// Player requests name their own `user_id`; the host platform vouches for it with
/// x-platform-token. With no token configured the service trusts its callers.
pub fn platform_auth_error(expected: Option<&str>, headers: &HeaderMap) -> Option<StatusCode> {
    match expected {
        None => None,
        Some(token) if presents_token(token, "x-platform-token", headers) => None,
        Some(_) => Some(StatusCode::UNAUTHORIZED),
    }
}

pub(crate) async fn healthz() -> &'static str {
    "ok"
}

pub(crate) async fn list_tables(AxumState(state): AxumState<AppState>) -> impl IntoResponse {
    Json(state.currencies())
}

pub(crate) async fn get_snapshot(
    AxumState(state): AxumState<AppState>,
    Path(currency): Path<String>,
) -> Response {
    respond(state.snapshot(&currency))
}

pub(crate) async fn get_balance(
    AxumState(state): AxumState<AppState>,
    Path((currency, user_id)): Path<(String, String)>,
) -> Response {
    let balance = state.table(&currency).map(|table| table.balance(&user_id));
    respond(balance.map(|balance| BalanceView { user_id, balance }))
}

pub(crate) async fn get_stats(
    AxumState(state): AxumState<AppState>,
    Path((currency, user_id)): Path<(String, String)>,
) -> Response {
    let stats = state.table(&currency).map(|table| table.stats(&user_id));
    respond(stats.map(|stats| StatsView { user_id, stats }))
}

pub(crate) async fn get_round(
    AxumState(state): AxumState<AppState>,
    Path((currency, round_id)): Path<(String, u64)>,
) -> Response {
    respond(
        state
            .table(&currency)
            .and_then(|table| table.round(round_id).cloned()),
    )
}

pub(crate) async fn list_rounds(
    AxumState(state): AxumState<AppState>,
    Path(currency): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    respond(state.table(&currency).map(|table| {
        table
            .recent_rounds(limit)
            .into_iter()
            .cloned()
            .collect::<Vec<_>>()
    }))
}

pub(crate) async fn place_bet(
    AxumState(state): AxumState<AppState>,
    Path(currency): Path<String>,
    headers: HeaderMap,
    Json(request): Json<BetRequest>,
) -> Response {
    if let Some(status) = platform_auth_error(state.platform_token(), &headers) {
        return status.into_response();
    }
    let result = state
        .table(&currency)
        .map(|table| table.config().min_bet)
        .and_then(|min| parse_amount(&request.amount, min))
        .and_then(|amount| {
            state.place_bet(
                &currency,
                &request.user_id,
                amount,
                request.color_label.as_deref(),
            )
        });
    respond(result.map(|(stake, _)| stake))
}

pub(crate) async fn deposit(
    AxumState(state): AxumState<AppState>,
    Path(currency): Path<String>,
    headers: HeaderMap,
    Json(request): Json<DepositRequest>,
) -> Response {
    if let Some(status) = admin_auth_error(state.admin_token(), &headers) {
        return status.into_response();
    }
    let result = parse_amount(&request.amount, 1)
        .and_then(|amount| state.deposit(&currency, &request.user_id, amount));
    respond(result.map(|balance| BalanceView {
        user_id: request.user_id,
        balance,
    }))
}

pub(crate) async fn lock_round(
    AxumState(state): AxumState<AppState>,
    Path(currency): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(status) = admin_auth_error(state.admin_token(), &headers) {
        return status.into_response();
    }
    respond(state.lock_round(&currency))
}

pub(crate) async fn resolve_round(
    AxumState(state): AxumState<AppState>,
    Path(currency): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(status) = admin_auth_error(state.admin_token(), &headers) {
        return status.into_response();
    }
    respond(state.resolve_round(&currency))
}

pub(crate) async fn next_round(
    AxumState(state): AxumState<AppState>,
    Path(currency): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(status) = admin_auth_error(state.admin_token(), &headers) {
        return status.into_response();
    }
    respond(state.next_round(&currency))
}

pub(crate) async fn void_round(
    AxumState(state): AxumState<AppState>,
    Path(currency): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(status) = admin_auth_error(state.admin_token(), &headers) {
        return status.into_response();
    }
    respond(state.void_round(&currency))
}
