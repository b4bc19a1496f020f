use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, QueryFilter, QueryOrder, prelude::*};

use crate::{
    EngineError, FieldErrors, IntervalState, PlanAction, ResultEngine, parse_duration,
    plan_intervals, plan_logs, plan_logs::LogEntry, plans, profiles, users,
    util::normalize_email,
};

use super::Engine;

impl Engine {
    pub async fn create_plan(&self, plan: plans::Model) -> ResultEngine<plans::Model> {
        let mut fields = FieldErrors::new();
        if plan.id.trim().is_empty() {
            fields.insert("id".to_string(), vec!["This field may not be blank.".to_string()]);
        }
        if plan.block_quota < 0 {
            fields.insert(
                "block_quota".to_string(),
                vec!["Ensure this value is greater than or equal to 0.".to_string()],
            );
        }
        if plan.monthly_traffic_quota < 0 {
            fields.insert(
                "monthly_traffic_quota".to_string(),
                vec!["Ensure this value is greater than or equal to 0.".to_string()],
            );
        }
        if !fields.is_empty() {
            return Err(EngineError::Validation(fields));
        }
        if plans::Entity::find_by_id(plan.id.clone())
            .one(&self.database)
            .await?
            .is_some()
        {
            return Err(EngineError::ExistingKey(plan.id));
        }

        let active = plans::ActiveModel {
            id: ActiveValue::Set(plan.id),
            name: ActiveValue::Set(plan.name),
            block_quota: ActiveValue::Set(plan.block_quota),
            monthly_traffic_quota: ActiveValue::Set(plan.monthly_traffic_quota),
        };
        Ok(active.insert(&self.database).await?)
    }

    pub async fn plans(&self) -> ResultEngine<Vec<plans::Model>> {
        plans::Entity::find()
            .order_by_asc(plans::Column::Id)
            .all(&self.database)
            .await
            .map_err(Into::into)
    }

    pub async fn plan(&self, plan_id: &str) -> ResultEngine<Option<plans::Model>> {
        plans::Entity::find_by_id(plan_id.to_string())
            .one(&self.database)
            .await
            .map_err(Into::into)
    }

    /// Sets the subscribed plan of the account registered with `user_email`.
    ///
    /// The profile update and its `set-plan` audit entry commit together.
    pub async fn subscribe(
        &self,
        user_email: &str,
        plan_id: &str,
        origin: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let (profile, plan) = self.resolve_profile_and_plan(user_email, plan_id, None).await?;
        let origin = origin.to_string();

        self.with_tx(|_, db_tx| {
            Box::pin(async move {
                let profile_id = profile.user_id;
                let mut active: profiles::ActiveModel = profile.into();
                active.subscribed_plan = ActiveValue::Set(Some(plan.id.clone()));
                active.update(db_tx).await?;

                LogEntry {
                    profile_id,
                    action: PlanAction::SetPlan,
                    plan_id: Some(plan.id.clone()),
                    interval_id: None,
                    origin,
                }
                .into_active(now)
                .insert(db_tx)
                .await?;

                tracing::info!(profile_id, "subscribed to plan {}", plan.id);
                Ok(())
            })
        })
        .await
    }

    /// Queues a `waiting` interval of `plan_id` for the account registered
    /// with `user_email`. `duration` uses the `[DD] [HH:[MM:]]ss[.uuuuuu]`
    /// syntax.
    pub async fn add_interval(
        &self,
        user_email: &str,
        plan_id: &str,
        duration: &str,
        origin: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<plan_intervals::Model> {
        let (profile, plan) = self
            .resolve_profile_and_plan(user_email, plan_id, Some(duration))
            .await?;
        let seconds = parse_duration(duration)?.num_seconds();
        let origin = origin.to_string();

        self.with_tx(|_, db_tx| {
            Box::pin(async move {
                let interval = plan_intervals::ActiveModel {
                    id: ActiveValue::NotSet,
                    profile_id: ActiveValue::Set(profile.user_id),
                    plan_id: ActiveValue::Set(plan.id.clone()),
                    duration: ActiveValue::Set(seconds),
                    started_at: ActiveValue::Set(None),
                    state: ActiveValue::Set(IntervalState::Waiting.as_str().to_string()),
                }
                .insert(db_tx)
                .await?;

                LogEntry {
                    profile_id: profile.user_id,
                    action: PlanAction::AddInterval,
                    plan_id: Some(plan.id.clone()),
                    interval_id: Some(interval.id),
                    origin,
                }
                .into_active(now)
                .insert(db_tx)
                .await?;

                tracing::info!(
                    profile_id = profile.user_id,
                    interval_id = interval.id,
                    "queued {seconds}s of plan {}",
                    plan.id
                );
                Ok(interval)
            })
        })
        .await
    }

    /// Intervals of a profile, oldest first.
    pub async fn intervals(&self, user_id: i32) -> ResultEngine<Vec<plan_intervals::Model>> {
        plan_intervals::Entity::find()
            .filter(plan_intervals::Column::ProfileId.eq(user_id))
            .order_by_asc(plan_intervals::Column::Id)
            .all(&self.database)
            .await
            .map_err(Into::into)
    }

    /// Audit trail of a profile, oldest first.
    pub async fn plan_log(&self, user_id: i32) -> ResultEngine<Vec<plan_logs::Model>> {
        plan_logs::Entity::find()
            .filter(plan_logs::Column::ProfileId.eq(user_id))
            .order_by_asc(plan_logs::Column::Id)
            .all(&self.database)
            .await
            .map_err(Into::into)
    }

    /// Field-level validation shared by the plan endpoints; reports every
    /// bad field at once.
    async fn resolve_profile_and_plan(
        &self,
        user_email: &str,
        plan_id: &str,
        duration: Option<&str>,
    ) -> ResultEngine<(profiles::Model, plans::Model)> {
        let mut fields = FieldErrors::new();

        let user = users::Entity::find()
            .filter(users::Column::Email.eq(normalize_email(user_email)))
            .one(&self.database)
            .await?;
        let profile = match user {
            Some(user) => profiles::Entity::find_by_id(user.id)
                .one(&self.database)
                .await?,
            None => None,
        };
        if profile.is_none() {
            fields.insert(
                "user_email".to_string(),
                vec!["No user with this email address.".to_string()],
            );
        }

        let plan = self.plan(plan_id).await?;
        if plan.is_none() {
            fields.insert(
                "plan".to_string(),
                vec![format!("Invalid pk \"{plan_id}\" - object does not exist.")],
            );
        }

        if let Some(duration) = duration
            && parse_duration(duration).is_err()
        {
            fields.insert(
                "duration".to_string(),
                vec![
                    "Duration has wrong format. Use one of these formats instead: [DD] [HH:[MM:]]ss[.uuuuuu]."
                        .to_string(),
                ],
            );
        }

        match (profile, plan) {
            (Some(profile), Some(plan)) if fields.is_empty() => Ok((profile, plan)),
            _ => Err(EngineError::Validation(fields)),
        }
    }
}
