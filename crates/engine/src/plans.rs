//! Quota tiers.

use sea_orm::entity::prelude::*;

/// Id of the plan every profile falls back to when nothing else applies.
pub const DEFAULT_PLAN_ID: &str = "free";

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "plans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    /// Storage quota in bytes.
    pub block_quota: i64,
    /// Download traffic per month in bytes.
    pub monthly_traffic_quota: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::plan_intervals::Entity")]
    Intervals,
}

impl Related<super::plan_intervals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Intervals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
