use api_types::{plan::Plan, profile::Profile};
use axum::{Extension, Json, extract::State};
use chrono::Utc;

use crate::{ServerError, server::ServerState};
use engine::users;

/// Profile of the logged in user with the plan currently in effect.
pub async fn get(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
) -> Result<Json<Profile>, ServerError> {
    let view = state.engine.profile_view(&user, Utc::now()).await?;

    Ok(Json(Profile {
        user_id: view.profile.user_id,
        active: view.active,
        plan: Plan {
            id: view.plan.id,
            name: view.plan.name,
            block_quota: view.plan.block_quota,
            monthly_traffic_quota: view.plan.monthly_traffic_quota,
        },
        subscribed_plan: view.profile.subscribed_plan,
        plus_notification_mail: view.profile.plus_notification_mail,
        pro_notification_mail: view.profile.pro_notification_mail,
        needs_confirmation_after: view.profile.needs_confirmation_after,
    }))
}
