//! Interval CRUD and recurrence-exception endpoints.

use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use duosync_core::{Category, Interval, RecurrenceException, RecurrenceRule};

use crate::routes::AppError;
use crate::state::AppState;
use crate::store::NewInterval;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/users/{user_id}/intervals",
            get(list_intervals).post(create_interval),
        )
        .route("/intervals/{id}", put(update_interval).delete(delete_interval))
        .route("/intervals/{id}/exceptions", post(set_exception))
        .route("/intervals/{id}/exceptions/{date}", delete(delete_exception))
}

/// Request body for creating or updating an interval.
#[derive(Deserialize)]
pub struct IntervalRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub category: Category,
    pub description: Option<String>,
    pub recurrence: Option<RecurrenceRule>,
}

impl IntervalRequest {
    fn into_new(self, user_id: i64) -> NewInterval {
        NewInterval {
            user_id,
            start: self.start,
            end: self.end,
            category: self.category,
            description: self.description,
            recurrence: self.recurrence,
        }
    }
}

/// GET /users/:id/intervals - all of a user's stored intervals
async fn list_intervals(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Interval>>, AppError> {
    Ok(Json(state.store.list_intervals(user_id).await?))
}

/// POST /users/:id/intervals - create an interval
async fn create_interval(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(req): Json<IntervalRequest>,
) -> Result<Json<Interval>, AppError> {
    let new = req.into_new(user_id);
    new.validate()
        .map_err(|msg| AppError::bad_request(anyhow::anyhow!(msg)))?;
    Ok(Json(state.store.create_interval(new).await?))
}

#[derive(Deserialize)]
pub struct UpdateIntervalRequest {
    pub user_id: i64,
    #[serde(flatten)]
    pub interval: IntervalRequest,
}

/// PUT /intervals/:id - replace an interval's fields
async fn update_interval(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateIntervalRequest>,
) -> Result<Json<Interval>, AppError> {
    let new = req.interval.into_new(req.user_id);
    new.validate()
        .map_err(|msg| AppError::bad_request(anyhow::anyhow!(msg)))?;
    let updated = state
        .store
        .update_interval(id, new)
        .await?
        .ok_or_else(|| AppError::not_found(format!("interval {id}")))?;
    Ok(Json(updated))
}

/// DELETE /intervals/:id
async fn delete_interval(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.store.delete_interval(id).await? {
        return Err(AppError::not_found(format!("interval {id}")));
    }
    Ok(Json(serde_json::json!({ "deleted": id })))
}

/// Request body for overriding one occurrence of a recurring interval:
/// either `{"date": ..., "exception": "cancelled"}` or
/// `{"date": ..., "exception": {"replaced": {...}}}`.
#[derive(Deserialize)]
pub struct ExceptionRequest {
    pub date: NaiveDate,
    pub exception: RecurrenceException,
}

/// POST /intervals/:id/exceptions - cancel or replace one occurrence
async fn set_exception(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ExceptionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if let RecurrenceException::Replaced(replacement) = &req.exception {
        if replacement.is_degenerate() {
            return Err(AppError::bad_request(anyhow::anyhow!(
                "replacement interval end must be after its start"
            )));
        }
    }
    if !state.store.set_exception(id, req.date, req.exception).await? {
        return Err(AppError::not_found(format!("recurring interval {id}")));
    }
    Ok(Json(serde_json::json!({ "interval_id": id, "date": req.date })))
}

/// DELETE /intervals/:id/exceptions/:date
async fn delete_exception(
    State(state): State<AppState>,
    Path((id, date)): Path<(i64, NaiveDate)>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.store.delete_exception(id, date).await? {
        return Err(AppError::not_found(format!(
            "exception for interval {id} on {date}"
        )));
    }
    Ok(Json(serde_json::json!({ "interval_id": id, "date": date })))
}
