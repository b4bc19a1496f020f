//! Plan endpoints called by the payment side.

use api_types::plan::{PlanInterval, PlanSubscription};
use axum::{Json, extract::State};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use serde_json::{Value, json};

use crate::{ServerError, request::RequestMeta, server::ServerState};

pub async fn subscription(
    meta: RequestMeta,
    State(state): State<ServerState>,
    WithRejection(Json(payload), _): WithRejection<Json<PlanSubscription>, ServerError>,
) -> Result<Json<Value>, ServerError> {
    state
        .engine
        .subscribe(&payload.user_email, &payload.plan, &meta.origin(), Utc::now())
        .await?;

    Ok(Json(json!({})))
}

pub async fn add_interval(
    meta: RequestMeta,
    State(state): State<ServerState>,
    WithRejection(Json(payload), _): WithRejection<Json<PlanInterval>, ServerError>,
) -> Result<Json<Value>, ServerError> {
    state
        .engine
        .add_interval(
            &payload.user_email,
            &payload.plan,
            &payload.duration,
            &meta.origin(),
            Utc::now(),
        )
        .await?;

    Ok(Json(json!({})))
}
