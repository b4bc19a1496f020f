use serde::{Deserialize, Serialize};

/// Body of every error response that is not a field-level validation error.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub mod auth {
    use super::*;

    /// Account check sent by the block server.
    ///
    /// Exactly one of the two fields must be present. `auth` carries the
    /// `Authorization` value the block server received (`Token <key>`);
    /// `user_id` is accepted as a JSON number or a numeric string.
    ///
    /// `None` means the key is absent; an explicit `null` is `Some(Null)`.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct AuthCheck {
        #[serde(
            default,
            deserialize_with = "present",
            skip_serializing_if = "Option::is_none"
        )]
        pub auth: Option<serde_json::Value>,
        #[serde(
            default,
            deserialize_with = "present",
            skip_serializing_if = "Option::is_none"
        )]
        pub user_id: Option<serde_json::Value>,
    }

    /// Only called when the key exists, so `null` survives as a value.
    fn present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Some)
    }

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AuthCheckResponse {
        pub user_id: i32,
        pub active: bool,
        /// Bytes.
        pub block_quota: i64,
        /// Bytes per month.
        pub monthly_traffic_quota: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Login {
        pub username: String,
        pub password: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TokenResponse {
        pub key: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Registration {
        pub username: String,
        pub email: String,
        pub password1: String,
        pub password2: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct VerifyEmail {
        pub key: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PasswordChange {
        pub old_password: String,
        pub new_password1: String,
        pub new_password2: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Detail {
        pub detail: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserDetails {
        pub pk: i32,
        pub username: String,
        pub email: String,
    }
}

pub mod plan {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PlanSubscription {
        pub user_email: String,
        pub plan: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PlanInterval {
        pub user_email: String,
        pub plan: String,
        /// `[DD] [HH:[MM:]]ss[.uuuuuu]`
        pub duration: String,
    }

    #[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Plan {
        pub id: String,
        pub name: String,
        pub block_quota: i64,
        pub monthly_traffic_quota: i64,
    }
}

pub mod profile {
    use chrono::{DateTime, Utc};

    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct Profile {
        pub user_id: i32,
        pub active: bool,
        /// Effective plan after intervals and subscription are applied.
        pub plan: plan::Plan,
        pub subscribed_plan: Option<String>,
        pub plus_notification_mail: bool,
        pub pro_notification_mail: bool,
        pub needs_confirmation_after: DateTime<Utc>,
    }
}
