//! Account check used by the block server before it serves a request.

use api_types::auth::{AuthCheck, AuthCheckResponse};
use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use serde_json::Value;

use crate::{ServerError, server::ServerState, server::TokenAuthorization};
use engine::users;

/// Which account the caller is asking about.
#[derive(Debug, PartialEq, Eq)]
enum Identification {
    Token(String),
    /// `None` for a well-formed id no account can have.
    UserId(Option<i32>),
}

fn parse_token_auth(value: &Value) -> Result<String, ServerError> {
    value
        .as_str()
        .and_then(TokenAuthorization::parse)
        .map(|TokenAuthorization(key)| key)
        .ok_or_else(|| ServerError::Generic("Invalid auth type".to_string()))
}

fn is_integer(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_user_id(value: &Value) -> Result<Option<i32>, ServerError> {
    match value {
        Value::Number(number) if number.is_i64() || number.is_u64() => {
            Ok(number.as_i64().and_then(|id| i32::try_from(id).ok()))
        }
        Value::String(text) if is_integer(text.trim()) => Ok(text.trim().parse().ok()),
        _ => Err(ServerError::Generic("Malformed user ID".to_string())),
    }
}

fn identify(payload: &AuthCheck) -> Result<Identification, ServerError> {
    match (&payload.auth, &payload.user_id) {
        (Some(_), Some(_)) => Err(ServerError::Generic(
            "Pass *either* an auth token *or* an user ID".to_string(),
        )),
        (None, None) => Err(ServerError::Generic(
            "No user identification supplied".to_string(),
        )),
        (Some(auth), None) => parse_token_auth(auth).map(Identification::Token),
        (None, Some(user_id)) => parse_user_id(user_id).map(Identification::UserId),
    }
}

async fn resolve(state: &ServerState, payload: &AuthCheck) -> Result<users::Model, ServerError> {
    match identify(payload)? {
        Identification::Token(key) => state
            .engine
            .user_by_token(&key)
            .await?
            .ok_or_else(|| ServerError::NotFound("Invalid token".to_string())),
        Identification::UserId(id) => {
            let user = match id {
                Some(id) => state.engine.user_by_id(id).await?,
                None => None,
            };
            user.ok_or_else(|| ServerError::NotFound("Invalid user ID".to_string()))
        }
    }
}

async fn status(
    state: &ServerState,
    payload: AuthCheck,
) -> Result<Json<AuthCheckResponse>, ServerError> {
    let user = resolve(state, &payload).await?;
    let status = state.engine.account_status(&user, Utc::now()).await?;

    Ok(Json(AuthCheckResponse {
        user_id: status.user_id,
        active: status.active,
        block_quota: status.plan.block_quota,
        monthly_traffic_quota: status.plan.monthly_traffic_quota,
    }))
}

pub async fn check(
    State(state): State<ServerState>,
    WithRejection(Json(payload), _): WithRejection<Json<AuthCheck>, ServerError>,
) -> Result<Json<AuthCheckResponse>, ServerError> {
    tracing::debug!("auth check");
    status(&state, payload).await
}

/// Same check, for a block server request on a specific file.
pub async fn check_resource(
    Path((prefix, file_path)): Path<(String, String)>,
    State(state): State<ServerState>,
    WithRejection(Json(payload), _): WithRejection<Json<AuthCheck>, ServerError>,
) -> Result<Json<AuthCheckResponse>, ServerError> {
    tracing::debug!(%prefix, %file_path, "auth check for resource");
    status(&state, payload).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn check(auth: Option<Value>, user_id: Option<Value>) -> Option<Identification> {
        identify(&AuthCheck { auth, user_id }).ok()
    }

    #[test]
    fn user_id_accepts_numbers_and_numeric_strings() {
        assert_eq!(
            check(None, Some(json!(7))),
            Some(Identification::UserId(Some(7)))
        );
        assert_eq!(
            check(None, Some(json!(" 42 "))),
            Some(Identification::UserId(Some(42)))
        );
        assert_eq!(check(None, Some(json!("4x"))), None);
        assert_eq!(check(None, Some(json!(1.5))), None);
        assert_eq!(check(None, Some(json!([1]))), None);
        assert_eq!(check(None, Some(Value::Null)), None);
    }

    #[test]
    fn user_id_beyond_storage_range_is_well_formed() {
        assert_eq!(
            check(None, Some(json!(4_294_967_296_i64))),
            Some(Identification::UserId(None))
        );
        assert_eq!(
            check(None, Some(json!("99999999999999999999999"))),
            Some(Identification::UserId(None))
        );
    }

    #[test]
    fn auth_must_be_token_scheme() {
        assert_eq!(
            check(Some(json!("Token abc")), None),
            Some(Identification::Token("abc".to_string()))
        );
        assert_eq!(check(Some(json!("Basic abc")), None), None);
        assert_eq!(check(Some(json!(12)), None), None);
        assert_eq!(check(Some(Value::Null), None), None);
    }

    #[test]
    fn exactly_one_identification() {
        assert_eq!(check(None, None), None);
        assert_eq!(check(Some(json!("Token abc")), Some(json!(1))), None);
        assert_eq!(check(Some(Value::Null), Some(json!(1))), None);
    }
}
