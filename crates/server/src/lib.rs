use axum::{Json, extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse};
use engine::{EngineError, FieldErrors};

use api_types::ErrorBody;
pub use api_key::ApiSecret;
pub use server::{ServerConfig, ServerState, router, run, run_with_listener, spawn_with_listener};

mod accounts;
mod api_key;
mod auth_check;
mod plans;
mod profile;
mod request;
mod server;

pub mod types {
    pub mod auth {
        pub use api_types::auth::{
            AuthCheck, AuthCheckResponse, Detail, Login, PasswordChange, Registration,
            TokenResponse, UserDetails, VerifyEmail,
        };
    }

    pub mod plan {
        pub use api_types::plan::{Plan, PlanInterval, PlanSubscription};
    }

    pub mod profile {
        pub use api_types::profile::Profile;
    }
}

pub enum ServerError {
    Engine(EngineError),
    /// 400 with a plain message.
    Generic(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_) => StatusCode::CONFLICT,
        EngineError::Validation(_)
        | EngineError::InvalidCredentials
        | EngineError::InvalidDuration(_) => StatusCode::BAD_REQUEST,
        EngineError::LockedOut => StatusCode::TOO_MANY_REQUESTS,
        EngineError::PasswordHash(_) | EngineError::Mail(_) | EngineError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        EngineError::PasswordHash(_) | EngineError::Mail(_) => {
            tracing::error!("{err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

fn engine_error_response(err: EngineError) -> axum::response::Response {
    let status = status_for_engine_error(&err);
    match err {
        EngineError::Validation(fields) => (status, Json(fields)).into_response(),
        EngineError::InvalidCredentials => {
            let mut fields = FieldErrors::new();
            fields.insert(
                "non_field_errors".to_string(),
                vec![EngineError::InvalidCredentials.to_string()],
            );
            (status, Json(fields)).into_response()
        }
        other => (
            status,
            Json(ErrorBody {
                error: message_for_engine_error(other),
            }),
        )
            .into_response(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => return engine_error_response(err),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
            ServerError::Unauthorized(err) => (StatusCode::UNAUTHORIZED, err),
            ServerError::Forbidden(err) => (StatusCode::FORBIDDEN, err),
            ServerError::NotFound(err) => (StatusCode::NOT_FOUND, err),
        };

        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

/// Name of the field serde reported as missing, if that is the complaint.
fn missing_field(message: &str) -> Option<&str> {
    let rest = message.split_once("missing field `")?.1;
    rest.split_once('`').map(|(field, _)| field)
}

/// Unreadable bodies become 400 field errors like any other bad input.
impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        let mut fields = FieldErrors::new();
        match missing_field(&message) {
            Some(field) => {
                fields.insert(
                    field.to_string(),
                    vec!["This field is required.".to_string()],
                );
            }
            None => {
                fields.insert("non_field_errors".to_string(), vec![message]);
            }
        }
        Self::Engine(EngineError::Validation(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::KeyNotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn engine_conflict_maps_to_409() {
        let res = ServerError::from(EngineError::ExistingKey("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn engine_validation_maps_to_400() {
        let res = ServerError::from(EngineError::field("plan", "bad")).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn lockout_maps_to_429() {
        let res = ServerError::from(EngineError::LockedOut).into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn database_error_maps_to_500() {
        let err = EngineError::Database(sea_orm::DbErr::Custom("boom".to_string()));
        let res = ServerError::from(err).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn forbidden_maps_to_403() {
        let res = ServerError::Forbidden("Invalid API key".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn missing_field_is_named() {
        assert_eq!(
            missing_field(
                "Failed to deserialize the JSON body into the target type: missing field `user_email` at line 1 column 15"
            ),
            Some("user_email")
        );
        assert_eq!(missing_field("expected value at line 1 column 1"), None);
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
