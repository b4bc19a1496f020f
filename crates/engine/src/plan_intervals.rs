//! Time-bounded plan grants.
//!
//! An interval is created `waiting`, becomes `active` when it is the oldest
//! waiting interval of a profile with no active one, and ends up `expired`
//! once `started_at + duration` has passed.

use chrono::{DateTime, TimeDelta, Utc};
use sea_orm::entity::prelude::*;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntervalState {
    Waiting,
    Active,
    Expired,
}

impl IntervalState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }
}

impl TryFrom<&str> for IntervalState {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            other => Err(EngineError::KeyNotFound(format!(
                "invalid interval state: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "plan_intervals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub profile_id: i32,
    pub plan_id: String,
    /// Length of the grant in whole seconds.
    pub duration: i64,
    pub started_at: Option<DateTimeUtc>,
    pub state: String,
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
    #[sea_orm(
        belongs_to = "super::plans::Entity",
        from = "Column::PlanId",
        to = "super::plans::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Plan,
}

impl Related<super::profiles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl Related<super::plans::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Plan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn state(&self) -> Result<IntervalState, EngineError> {
        IntervalState::try_from(self.state.as_str())
    }

    /// `None` while waiting, or when the end lies past the last
    /// representable date.
    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        let start = self.started_at?;
        start.checked_add_signed(TimeDelta::try_seconds(self.duration)?)
    }

    /// An interval that never started, or ends beyond the calendar, cannot
    /// expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at().is_some_and(|end| end <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval(started_at: Option<DateTime<Utc>>) -> Model {
        Model {
            id: 1,
            profile_id: 1,
            plan_id: "pro".to_string(),
            duration: 3600,
            started_at,
            state: IntervalState::Active.as_str().to_string(),
        }
    }

    #[test]
    fn expiry_is_inclusive_of_the_end() {
        let start = Utc::now();
        let interval = interval(Some(start));
        assert!(!interval.is_expired_at(start + TimeDelta::seconds(3599)));
        assert!(interval.is_expired_at(start + TimeDelta::seconds(3600)));
    }

    #[test]
    fn end_past_calendar_never_expires() {
        let mut interval = interval(Some(Utc::now()));
        interval.duration = 999_999_999 * 86_400;
        assert_eq!(interval.ends_at(), None);
        assert!(!interval.is_expired_at(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn unstarted_interval_never_expires() {
        let interval = interval(None);
        assert!(!interval.is_expired_at(Utc::now() + TimeDelta::days(365)));
    }

    #[test]
    fn state_round_trips_through_storage_string() {
        assert_eq!(
            IntervalState::try_from("waiting").ok(),
            Some(IntervalState::Waiting)
        );
        assert!(IntervalState::try_from("paused").is_err());
    }
}
