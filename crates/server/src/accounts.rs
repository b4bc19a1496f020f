//! Registration, login and the token-authenticated account endpoints.

use api_types::auth::{
    Detail, Login, PasswordChange, Registration, TokenResponse, UserDetails, VerifyEmail,
};
use axum::{Extension, Json, extract::State, http::StatusCode};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use serde_json::{Value, json};

use crate::{ServerError, request::RequestMeta, server::ServerState};
use engine::{NewAccount, users};

pub async fn api_root() -> Json<Value> {
    Json(json!({
        "auth": "/api/v0/auth/",
        "registration": "/api/v0/auth/registration/",
        "verify-email": "/api/v0/auth/registration/verify-email/",
        "login": "/api/v0/auth/login/",
        "logout": "/api/v0/auth/logout/",
        "user": "/api/v0/auth/user/",
        "password-change": "/api/v0/auth/password/change/",
        "profile": "/api/v0/profile/",
        "plan-subscription": "/api/v0/plan/subscription/",
        "plan-add-interval": "/api/v0/plan/add-interval/",
    }))
}

pub async fn register(
    State(state): State<ServerState>,
    WithRejection(Json(payload), _): WithRejection<Json<Registration>, ServerError>,
) -> Result<(StatusCode, Json<TokenResponse>), ServerError> {
    let registered = state
        .engine
        .register(
            NewAccount {
                username: payload.username,
                email: payload.email,
                password1: payload.password1,
                password2: payload.password2,
            },
            Utc::now(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            key: registered.token,
        }),
    ))
}

pub async fn verify_email(
    State(state): State<ServerState>,
    WithRejection(Json(payload), _): WithRejection<Json<VerifyEmail>, ServerError>,
) -> Result<Json<Detail>, ServerError> {
    state.engine.verify_email(&payload.key).await?;

    Ok(Json(Detail {
        detail: "ok".to_string(),
    }))
}

pub async fn login(
    meta: RequestMeta,
    State(state): State<ServerState>,
    WithRejection(Json(payload), _): WithRejection<Json<Login>, ServerError>,
) -> Result<Json<TokenResponse>, ServerError> {
    let key = state
        .engine
        .login(
            &payload.username,
            &payload.password,
            meta.attempt_info(),
            Utc::now(),
        )
        .await?;

    Ok(Json(TokenResponse { key }))
}

pub async fn logout(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
) -> Result<Json<Detail>, ServerError> {
    state.engine.logout(user.id).await?;

    Ok(Json(Detail {
        detail: "Successfully logged out.".to_string(),
    }))
}

pub async fn user_details(Extension(user): Extension<users::Model>) -> Json<UserDetails> {
    Json(UserDetails {
        pk: user.id,
        username: user.username,
        email: user.email,
    })
}

pub async fn password_change(
    Extension(user): Extension<users::Model>,
    State(state): State<ServerState>,
    WithRejection(Json(payload), _): WithRejection<Json<PasswordChange>, ServerError>,
) -> Result<Json<Detail>, ServerError> {
    state
        .engine
        .change_password(
            user.id,
            &payload.old_password,
            &payload.new_password1,
            &payload.new_password2,
        )
        .await?;

    Ok(Json(Detail {
        detail: "New password has been saved.".to_string(),
    }))
}
