//! Plan bookkeeping tables.
//!
//! - `plans`: quota tiers, seeded with the default `free` plan
//! - `profiles`: one row per user, subscription and confirmation state
//! - `plan_intervals`: time-bounded plan grants
//! - `profile_plan_logs`: append-only audit trail of plan changes

use sea_orm_migration::prelude::*;

use crate::m20261019_000000_accounts::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

const FREE_BLOCK_QUOTA: i64 = 2 * 1024 * 1024 * 1024;
const FREE_MONTHLY_TRAFFIC_QUOTA: i64 = 1024 * 1024 * 1024;

#[derive(Iden)]
enum Plans {
    Table,
    Id,
    Name,
    BlockQuota,
    MonthlyTrafficQuota,
}

#[derive(Iden)]
enum Profiles {
    Table,
    UserId,
    PlusNotificationMail,
    ProNotificationMail,
    SubscribedPlan,
    CreatedOnBehalf,
    NextConfirmationMail,
    NeedsConfirmationAfter,
    ConfirmationKey,
}

#[derive(Iden)]
enum PlanIntervals {
    Table,
    Id,
    ProfileId,
    PlanId,
    Duration,
    StartedAt,
    State,
}

#[derive(Iden)]
enum ProfilePlanLogs {
    Table,
    Id,
    ProfileId,
    Timestamp,
    Action,
    PlanId,
    IntervalId,
    Origin,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Plans::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Plans::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Plans::Name).string().not_null())
                    .col(ColumnDef::new(Plans::BlockQuota).big_integer().not_null())
                    .col(
                        ColumnDef::new(Plans::MonthlyTrafficQuota)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        let seed = Query::insert()
            .into_table(Plans::Table)
            .columns([
                Plans::Id,
                Plans::Name,
                Plans::BlockQuota,
                Plans::MonthlyTrafficQuota,
            ])
            .values([
                "free".into(),
                "Free".into(),
                FREE_BLOCK_QUOTA.into(),
                FREE_MONTHLY_TRAFFIC_QUOTA.into(),
            ])
            .map_err(|err| DbErr::Migration(err.to_string()))?
            .to_owned();
        manager.exec_stmt(seed).await?;

        manager
            .create_table(
                Table::create()
                    .table(Profiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Profiles::UserId)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Profiles::PlusNotificationMail)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Profiles::ProNotificationMail)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Profiles::SubscribedPlan).string())
                    .col(
                        ColumnDef::new(Profiles::CreatedOnBehalf)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Profiles::NextConfirmationMail).timestamp())
                    .col(
                        ColumnDef::new(Profiles::NeedsConfirmationAfter)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Profiles::ConfirmationKey)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-profiles-user_id")
                            .from(Profiles::Table, Profiles::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-profiles-subscribed_plan")
                            .from(Profiles::Table, Profiles::SubscribedPlan)
                            .to(Plans::Table, Plans::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PlanIntervals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlanIntervals::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PlanIntervals::ProfileId).integer().not_null())
                    .col(ColumnDef::new(PlanIntervals::PlanId).string().not_null())
                    .col(
                        ColumnDef::new(PlanIntervals::Duration)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PlanIntervals::StartedAt).timestamp())
                    .col(
                        ColumnDef::new(PlanIntervals::State)
                            .string()
                            .not_null()
                            .default("waiting"),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-plan_intervals-profile_id")
                            .from(PlanIntervals::Table, PlanIntervals::ProfileId)
                            .to(Profiles::Table, Profiles::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-plan_intervals-plan_id")
                            .from(PlanIntervals::Table, PlanIntervals::PlanId)
                            .to(Plans::Table, Plans::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-plan_intervals-profile_id-state")
                    .table(PlanIntervals::Table)
                    .col(PlanIntervals::ProfileId)
                    .col(PlanIntervals::State)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ProfilePlanLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProfilePlanLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProfilePlanLogs::ProfileId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProfilePlanLogs::Timestamp)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProfilePlanLogs::Action).string().not_null())
                    .col(ColumnDef::new(ProfilePlanLogs::PlanId).string())
                    .col(ColumnDef::new(ProfilePlanLogs::IntervalId).integer())
                    .col(ColumnDef::new(ProfilePlanLogs::Origin).string().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-profile_plan_logs-profile_id")
                            .from(ProfilePlanLogs::Table, ProfilePlanLogs::ProfileId)
                            .to(Profiles::Table, Profiles::UserId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-profile_plan_logs-plan_id")
                            .from(ProfilePlanLogs::Table, ProfilePlanLogs::PlanId)
                            .to(Plans::Table, Plans::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-profile_plan_logs-interval_id")
                            .from(ProfilePlanLogs::Table, ProfilePlanLogs::IntervalId)
                            .to(PlanIntervals::Table, PlanIntervals::Id),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProfilePlanLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PlanIntervals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Profiles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Plans::Table).to_owned())
            .await?;
        Ok(())
    }
}
