use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};

use crate::{
    EngineError, IntervalState, PlanAction, ResultEngine, plan_intervals,
    plan_logs::{LogEntry, USE_PLAN_ORIGIN},
    plans, profiles, users,
};

use super::Engine;

/// What the block server needs to know about an account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountStatus {
    pub user_id: i32,
    /// `false` once the confirmation grace period ran out unverified.
    pub active: bool,
    pub plan: plans::Model,
}

/// Read-only snapshot of a profile and its effective plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileView {
    pub profile: profiles::Model,
    pub plan: plans::Model,
    pub active: bool,
}

impl Engine {
    /// The account check behind the block server's auth endpoint.
    ///
    /// Sends a confirmation mail when one is due, advances the user's plan
    /// intervals and reports the resulting quotas.
    pub async fn account_status(
        &self,
        user: &users::Model,
        now: DateTime<Utc>,
    ) -> ResultEngine<AccountStatus> {
        let user = user.clone();
        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                let profile = engine.profile_in(db_tx, user.id).await?;
                let disabled = profile.confirmation_overdue(user.email_verified, now);
                if profile.confirmation_mail_due(user.email_verified, now) {
                    engine
                        .send_confirmation(db_tx, &user, profile.clone(), now)
                        .await?;
                }

                engine.use_plan_in(db_tx, user.id, now).await?;
                let plan = engine.effective_plan_in(db_tx, &profile, now).await?;

                Ok(AccountStatus {
                    user_id: user.id,
                    active: !disabled,
                    plan,
                })
            })
        })
        .await
    }

    /// Expires a finished interval and starts the next waiting one.
    pub async fn use_plan(&self, user_id: i32, now: DateTime<Utc>) -> ResultEngine<()> {
        self.with_tx(|engine, db_tx| Box::pin(engine.use_plan_in(db_tx, user_id, now)))
            .await
    }

    pub async fn profile_view(
        &self,
        user: &users::Model,
        now: DateTime<Utc>,
    ) -> ResultEngine<ProfileView> {
        let profile = self.profile_in(&self.database, user.id).await?;
        let plan = self.effective_plan_in(&self.database, &profile, now).await?;
        Ok(ProfileView {
            active: !profile.confirmation_overdue(user.email_verified, now),
            profile,
            plan,
        })
    }

    async fn profile_in<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: i32,
    ) -> ResultEngine<profiles::Model> {
        profiles::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("profile not exists".to_string()))
    }

    async fn use_plan_in(
        &self,
        db_tx: &DatabaseTransaction,
        profile_id: i32,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let pending = plan_intervals::Entity::find()
            .filter(plan_intervals::Column::ProfileId.eq(profile_id))
            .filter(plan_intervals::Column::State.ne(IntervalState::Expired.as_str()))
            .order_by_asc(plan_intervals::Column::Id)
            .all(db_tx)
            .await?;

        let mut running = false;
        let mut oldest_waiting = None;
        for interval in pending {
            match interval.state()? {
                IntervalState::Active if interval.is_expired_at(now) => {
                    let (interval_id, plan_id) = (interval.id, interval.plan_id.clone());
                    let mut expired: plan_intervals::ActiveModel = interval.into();
                    expired.state =
                        ActiveValue::Set(IntervalState::Expired.as_str().to_string());
                    expired.update(db_tx).await?;
                    self.log_usage(
                        db_tx,
                        profile_id,
                        PlanAction::ExpireInterval,
                        plan_id,
                        interval_id,
                        now,
                    )
                    .await?;
                    tracing::info!(profile_id, interval_id, "plan interval expired");
                }
                IntervalState::Active => running = true,
                IntervalState::Waiting if oldest_waiting.is_none() => {
                    oldest_waiting = Some(interval);
                }
                IntervalState::Waiting | IntervalState::Expired => {}
            }
        }
        if running {
            return Ok(());
        }
        let Some(next) = oldest_waiting else {
            return Ok(());
        };

        let (interval_id, plan_id) = (next.id, next.plan_id.clone());
        let mut started: plan_intervals::ActiveModel = next.into();
        started.started_at = ActiveValue::Set(Some(now));
        started.state = ActiveValue::Set(IntervalState::Active.as_str().to_string());
        started.update(db_tx).await?;
        self.log_usage(db_tx, profile_id, PlanAction::StartInterval, plan_id, interval_id, now)
            .await?;
        tracing::info!(profile_id, interval_id, "plan interval started");
        Ok(())
    }

    async fn log_usage(
        &self,
        db_tx: &DatabaseTransaction,
        profile_id: i32,
        action: PlanAction,
        plan_id: String,
        interval_id: i32,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        LogEntry {
            profile_id,
            action,
            plan_id: Some(plan_id),
            interval_id: Some(interval_id),
            origin: USE_PLAN_ORIGIN.to_string(),
        }
        .into_active(now)
        .insert(db_tx)
        .await?;
        Ok(())
    }

    /// Active interval's plan, else the subscribed plan, else the default.
    async fn effective_plan_in<C: ConnectionTrait>(
        &self,
        db: &C,
        profile: &profiles::Model,
        now: DateTime<Utc>,
    ) -> ResultEngine<plans::Model> {
        let interval_plan = plan_intervals::Entity::find()
            .filter(plan_intervals::Column::ProfileId.eq(profile.user_id))
            .filter(plan_intervals::Column::State.eq(IntervalState::Active.as_str()))
            .order_by_desc(plan_intervals::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .find(|interval| !interval.is_expired_at(now))
            .map(|interval| interval.plan_id);

        let plan_id = interval_plan
            .or_else(|| profile.subscribed_plan.clone())
            .unwrap_or_else(|| self.settings.default_plan.clone());

        plans::Entity::find_by_id(plan_id.clone())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("plan {plan_id} not exists")))
    }
}
