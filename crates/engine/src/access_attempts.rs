//! Login audit used by the lockout policy.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};

const MAX_USER_AGENT_LEN: usize = 255;
const UNKNOWN: &str = "<unknown>";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "access_attempts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub username: String,
    pub ip_address: String,
    pub user_agent: String,
    pub http_accept: String,
    pub path_info: String,
    /// `true` for successful logins.
    pub trusted: bool,
    pub attempt_time: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Request metadata recorded with every login attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttemptInfo {
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub http_accept: Option<String>,
    pub path_info: Option<String>,
}

impl AttemptInfo {
    pub(crate) fn into_active(
        self,
        username: &str,
        trusted: bool,
        now: DateTime<Utc>,
    ) -> ActiveModel {
        let user_agent = self
            .user_agent
            .map(|ua| ua.chars().take(MAX_USER_AGENT_LEN).collect())
            .unwrap_or_else(|| UNKNOWN.to_string());

        ActiveModel {
            id: ActiveValue::NotSet,
            username: ActiveValue::Set(username.to_string()),
            ip_address: ActiveValue::Set(self.ip_address),
            user_agent: ActiveValue::Set(user_agent),
            http_accept: ActiveValue::Set(
                self.http_accept.unwrap_or_else(|| UNKNOWN.to_string()),
            ),
            path_info: ActiveValue::Set(self.path_info.unwrap_or_else(|| UNKNOWN.to_string())),
            trusted: ActiveValue::Set(trusted),
            attempt_time: ActiveValue::Set(now),
        }
    }
}
