//! Per-user profile: subscription and email confirmation state.
//!
//! A profile is created together with its user and shares the user's
//! primary key.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use rand::RngCore;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i32,
    pub plus_notification_mail: bool,
    pub pro_notification_mail: bool,
    pub subscribed_plan: Option<String>,
    pub created_on_behalf: bool,
    pub next_confirmation_mail: Option<DateTimeUtc>,
    pub needs_confirmation_after: DateTimeUtc,
    #[sea_orm(unique)]
    pub confirmation_key: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::plans::Entity",
        from = "Column::SubscribedPlan",
        to = "super::plans::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    SubscribedPlan,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::plans::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubscribedPlan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// An unverified account is disabled once its grace period ran out.
    pub fn confirmation_overdue(&self, email_verified: bool, now: DateTime<Utc>) -> bool {
        !email_verified && now >= self.needs_confirmation_after
    }

    /// Whether a (re)minder mail should go out now.
    pub fn confirmation_mail_due(&self, email_verified: bool, now: DateTime<Utc>) -> bool {
        !email_verified && self.next_confirmation_mail.is_none_or(|at| at <= now)
    }
}

pub(crate) fn generate_confirmation_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
