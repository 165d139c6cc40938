use axum::{
    extract::{rejection::JsonRejection, MatchedPath, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::info;

use policy_desk_core::template::{sms_reminder, SmsReminder};
use policy_desk_core::{Admin, NewPolicy, NotificationFeed, PolicyPatch, PolicyRecord};

use crate::auth::CurrentAdmin;
use crate::error::ApiError;
use crate::router::AppState;

#[derive(Debug, Serialize)]
pub struct PolicyResponse {
    pub message: &'static str,
    pub policy: PolicyRecord,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: &'static str,
    pub removed: usize,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: Option<String>,
}

fn record_mutation<T>(op: &'static str, result: &Result<T, ApiError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(ApiError::DuplicatePolicyNumber(_)) => "conflict",
        Err(ApiError::PolicyNotFound) => "not_found",
        Err(ApiError::InvalidInput(_)) => "invalid",
        Err(_) => "error",
    };
    counter!("policy_mutations_total", "op" => op, "result" => outcome).increment(1);
}

pub async fn create(
    State(state): State<AppState>,
    CurrentAdmin(mut admin): CurrentAdmin,
    body: Result<Json<NewPolicy>, JsonRejection>,
) -> Result<(StatusCode, Json<PolicyResponse>), ApiError> {
    let result = match body {
        Ok(Json(new)) => state
            .storage()
            .policies()
            .add(&mut admin, new, state.now())
            .await
            .map_err(ApiError::from),
        Err(rejection) => Err(rejection.into()),
    };
    record_mutation("add", &result);

    Ok((
        StatusCode::CREATED,
        Json(PolicyResponse {
            message: "Policy added successfully",
            policy: result?,
        }),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
) -> Json<Vec<PolicyRecord>> {
    Json(state.storage().policies().list(&admin).to_vec())
}

pub async fn get_by_id(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<PolicyRecord>, ApiError> {
    let policy = state.storage().policies().get(&admin, &id)?.clone();
    Ok(Json(policy))
}

pub async fn search(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<PolicyRecord>> {
    let needle = query.q.unwrap_or_default();
    let found = state
        .storage()
        .policies()
        .search(&admin, &needle)
        .into_iter()
        .cloned()
        .collect();
    Json(found)
}

pub async fn notifications(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
) -> Json<NotificationFeed> {
    let feed = state.storage().policies().notifications(&admin, state.now());
    for notification in &feed.notifications {
        counter!("notifications_emitted_total", "status" => notification.status.as_str())
            .increment(1);
    }
    Json(feed)
}

pub async fn renew(
    State(state): State<AppState>,
    CurrentAdmin(mut admin): CurrentAdmin,
    Path(id): Path<String>,
    body: Result<Json<PolicyPatch>, JsonRejection>,
) -> Result<Json<PolicyResponse>, ApiError> {
    let result = match body {
        Ok(Json(patch)) => state
            .storage()
            .policies()
            .renew(&mut admin, &id, patch, state.now())
            .await
            .map_err(ApiError::from),
        Err(rejection) => Err(rejection.into()),
    };
    record_mutation("renew", &result);

    Ok(Json(PolicyResponse {
        message: "Policy updated successfully",
        policy: result?,
    }))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(policy_number): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    remove_by_number(&state, admin, &policy_number).await
}

/// `DELETE` on a fixed sub-route such as `/policies/search`, whose last
/// segment is taken as the policy number.
pub async fn delete_fixed_segment(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    matched: MatchedPath,
) -> Result<Json<DeleteResponse>, ApiError> {
    let policy_number = matched.as_str().rsplit('/').next().unwrap_or_default();
    remove_by_number(&state, admin, policy_number).await
}

async fn remove_by_number(
    state: &AppState,
    mut admin: Admin,
    policy_number: &str,
) -> Result<Json<DeleteResponse>, ApiError> {
    let result = state
        .storage()
        .policies()
        .delete(&mut admin, policy_number, state.now())
        .await
        .map_err(ApiError::from);
    record_mutation("delete", &result);

    Ok(Json(DeleteResponse {
        message: "Policy deleted successfully",
        removed: result?,
    }))
}

/// Builds the renewal SMS for a policy. Delivery happens outside this service.
pub async fn send_sms(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<SmsReminder>, ApiError> {
    let policy = state.storage().policies().get(&admin, &id)?;
    let reminder = sms_reminder(policy);
    info!(stage = "policies", admin_id = %admin.id, policy_id = %policy.id, "sms reminder prepared");
    Ok(Json(reminder))
}

pub async fn report(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(policy_number): Path<String>,
) -> Result<Response, ApiError> {
    let policy = state
        .storage()
        .policies()
        .get_by_number(&admin, &policy_number)?;
    let rendered = state
        .reports()
        .render(policy)
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, rendered.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", rendered.file_name),
            ),
        ],
        rendered.body,
    )
        .into_response())
}
