//! Timeline endpoints: single-user day view and two-user shared view.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use duosync_core::{
    build_day_timeline, build_shared_timeline, parse_timezone, DayWindow, SharedCategory,
    TimelineCategory, TimelineSegment,
};

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/timeline", get(day_timeline))
        .route("/timeline/shared", get(shared_timeline))
}

#[derive(Deserialize)]
pub struct TimelineQuery {
    pub date: String,
    pub user_id: i64,
    pub timezone: String,
}

/// GET /timeline - one user's availability for a day
async fn day_timeline(
    State(state): State<AppState>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<Vec<TimelineSegment<TimelineCategory>>>, AppError> {
    let window = DayWindow::from_date_str(&query.date).map_err(AppError::bad_request)?;
    let tz = parse_timezone(&query.timezone).map_err(AppError::bad_request)?;

    let (intervals, exceptions) = tokio::try_join!(
        state.store.fetch_intervals(vec![query.user_id], window),
        state.store.fetch_exceptions(vec![query.user_id]),
    )?;

    Ok(Json(build_day_timeline(&intervals, &window, tz, &exceptions)))
}

#[derive(Deserialize)]
pub struct SharedTimelineQuery {
    pub date: String,
    pub user_id: i64,
    pub other_user_id: i64,
    pub timezone: String,
}

/// GET /timeline/shared - two users' availability classified against each
/// other (match / sleep / busy / available)
async fn shared_timeline(
    State(state): State<AppState>,
    Query(query): Query<SharedTimelineQuery>,
) -> Result<Json<Vec<TimelineSegment<SharedCategory>>>, AppError> {
    let window = DayWindow::from_date_str(&query.date).map_err(AppError::bad_request)?;
    let tz = parse_timezone(&query.timezone).map_err(AppError::bad_request)?;

    // The two users' fetches are independent; run them concurrently and
    // wait for both. Any failure propagates whole - no partial timeline.
    let (current, other, exceptions) = tokio::try_join!(
        state.store.fetch_intervals(vec![query.user_id], window),
        state.store.fetch_intervals(vec![query.other_user_id], window),
        state.store.fetch_exceptions(vec![query.user_id, query.other_user_id]),
    )?;

    Ok(Json(build_shared_timeline(
        &current,
        &other,
        &window,
        tz,
        &exceptions,
    )))
}
