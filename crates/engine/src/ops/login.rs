use chrono::{DateTime, Utc};
use sea_orm::{Condition, ConnectionTrait, PaginatorTrait, QueryFilter, prelude::*};

use crate::{
    AttemptInfo, EngineError, ResultEngine, access_attempts, password, util::normalize_username,
};

use super::Engine;

impl Engine {
    /// Password login guarded by the lockout policy.
    ///
    /// Every attempt is recorded. A caller that already reached the failure
    /// limit, or reaches it with this attempt, gets [`EngineError::LockedOut`]
    /// regardless of the password. A successful login clears the failures of
    /// that username/IP pair and returns the user's token.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        info: AttemptInfo,
        now: DateTime<Utc>,
    ) -> ResultEngine<String> {
        let username = normalize_username(username);

        if self
            .is_locked(&self.database, &username, &info.ip_address, now)
            .await?
        {
            tracing::warn!(ip = %info.ip_address, "login refused for locked out {username}");
            return Err(EngineError::LockedOut);
        }

        let user = self
            .find_user_by_username(&self.database, &username)
            .await?
            .filter(|user| user.is_active && password::verify(password, &user.password));

        let Some(user) = user else {
            let ip_address = info.ip_address.clone();
            info.into_active(&username, false, now)
                .insert(&self.database)
                .await?;
            if self
                .is_locked(&self.database, &username, &ip_address, now)
                .await?
            {
                tracing::warn!(ip = %ip_address, "locking out {username}");
                return Err(EngineError::LockedOut);
            }
            return Err(EngineError::InvalidCredentials);
        };

        self.with_tx(|engine, db_tx| {
            Box::pin(async move {
                access_attempts::Entity::delete_many()
                    .filter(access_attempts::Column::Trusted.eq(false))
                    .filter(access_attempts::Column::Username.eq(username.as_str()))
                    .filter(access_attempts::Column::IpAddress.eq(info.ip_address.as_str()))
                    .exec(db_tx)
                    .await?;
                info.into_active(&username, true, now).insert(db_tx).await?;
                engine.token_for(db_tx, user.id, now).await
            })
        })
        .await
    }

    /// Failures for this username or from this IP inside the cool-off window.
    pub async fn recent_failures(
        &self,
        username: &str,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<u64> {
        self.count_failures(&self.database, &normalize_username(username), ip_address, now)
            .await
    }

    async fn is_locked<C: ConnectionTrait>(
        &self,
        db: &C,
        username: &str,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<bool> {
        let failures = self.count_failures(db, username, ip_address, now).await?;
        Ok(failures >= self.settings.failure_limit)
    }

    async fn count_failures<C: ConnectionTrait>(
        &self,
        db: &C,
        username: &str,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<u64> {
        access_attempts::Entity::find()
            .filter(access_attempts::Column::Trusted.eq(false))
            .filter(access_attempts::Column::AttemptTime.gte(now - self.settings.cooloff))
            .filter(
                Condition::any()
                    .add(access_attempts::Column::Username.eq(username))
                    .add(access_attempts::Column::IpAddress.eq(ip_address)),
            )
            .count(db)
            .await
            .map_err(Into::into)
    }
}
