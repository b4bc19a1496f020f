//! Append-only audit trail of plan changes on a profile.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};

use crate::EngineError;

/// Origin recorded for changes the engine makes on its own.
pub const USE_PLAN_ORIGIN: &str = "use-plan";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanAction {
    SetPlan,
    AddInterval,
    StartInterval,
    ExpireInterval,
}

impl PlanAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SetPlan => "set-plan",
            Self::AddInterval => "add-interval",
            Self::StartInterval => "start-interval",
            Self::ExpireInterval => "expire-interval",
        }
    }
}

impl TryFrom<&str> for PlanAction {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "set-plan" => Ok(Self::SetPlan),
            "add-interval" => Ok(Self::AddInterval),
            "start-interval" => Ok(Self::StartInterval),
            "expire-interval" => Ok(Self::ExpireInterval),
            other => Err(EngineError::KeyNotFound(format!(
                "invalid plan action: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "profile_plan_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub profile_id: i32,
    pub timestamp: DateTimeUtc,
    pub action: String,
    pub plan_id: Option<String>,
    pub interval_id: Option<i32>,
    pub origin: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::profiles::Entity",
        from = "Column::ProfileId",
        to = "super::profiles::Column::UserId",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Profile,
}

impl Related<super::profiles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn action(&self) -> Result<PlanAction, EngineError> {
        PlanAction::try_from(self.action.as_str())
    }
}

/// A log entry ready to be inserted next to the change it describes.
#[derive(Clone, Debug)]
pub(crate) struct LogEntry {
    pub profile_id: i32,
    pub action: PlanAction,
    pub plan_id: Option<String>,
    pub interval_id: Option<i32>,
    pub origin: String,
}

impl LogEntry {
    pub(crate) fn into_active(self, now: DateTime<Utc>) -> ActiveModel {
        ActiveModel {
            id: ActiveValue::NotSet,
            profile_id: ActiveValue::Set(self.profile_id),
            timestamp: ActiveValue::Set(now),
            action: ActiveValue::Set(self.action.as_str().to_string()),
            plan_id: ActiveValue::Set(self.plan_id),
            interval_id: ActiveValue::Set(self.interval_id),
            origin: ActiveValue::Set(self.origin),
        }
    }
}
