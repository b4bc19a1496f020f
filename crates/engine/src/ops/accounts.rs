use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, ConnectionTrait, QueryFilter, SqlErr, prelude::*};

use crate::{
    ConfirmationMail, EngineError, FieldErrors, ResultEngine, password, profiles, tokens, users,
    util::{normalize_email, normalize_username, validate_email, validate_username},
};

use super::Engine;

const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
const DUPLICATE_USERNAME: &str = "A user with that username already exists.";
const DUPLICATE_EMAIL: &str = "A user is already registered with this e-mail address.";

/// Registration input, as submitted by the client.
#[derive(Clone, Debug)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Clone, Debug)]
pub struct Registered {
    pub user: users::Model,
    pub token: String,
}

fn push(fields: &mut FieldErrors, field: &str, message: impl Into<String>) {
    fields
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

/// A concurrent registration can win the race past the lookups above; its
/// unique index violation is reported like the lookup would have.
fn duplicate_account(err: DbErr) -> EngineError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) if detail.contains("email") => {
            EngineError::field("email", DUPLICATE_EMAIL)
        }
        Some(SqlErr::UniqueConstraintViolation(detail)) if detail.contains("username") => {
            EngineError::field("username", DUPLICATE_USERNAME)
        }
        _ => err.into(),
    }
}

impl Engine {
    /// Creates user, profile and token for a self-registered account and
    /// sends the first confirmation mail.
    pub async fn register(&self, account: NewAccount, now: DateTime<Utc>) -> ResultEngine<Registered> {
        self.create_account(account, false, now).await
    }

    /// Same as [`Engine::register`]; `created_on_behalf` marks accounts made
    /// by an operator rather than the user.
    pub async fn create_account(
        &self,
        account: NewAccount,
        created_on_behalf: bool,
        now: DateTime<Utc>,
    ) -> ResultEngine<Registered> {
        let username = normalize_username(&account.username);
        let email = normalize_email(&account.email);

        let mut fields = FieldErrors::new();
        if let Some(message) = validate_username(&username) {
            push(&mut fields, "username", message);
        } else if self.find_user_by_username(&self.database, &username).await?.is_some() {
            push(&mut fields, "username", DUPLICATE_USERNAME);
        }
        if let Some(message) = validate_email(&email) {
            push(&mut fields, "email", message);
        } else if self.find_user_by_email(&self.database, &email).await?.is_some() {
            push(&mut fields, "email", DUPLICATE_EMAIL);
        }
        for message in password::policy_violations(&account.password1, &username, &email) {
            push(&mut fields, "password1", message);
        }
        if account.password1 != account.password2 {
            push(&mut fields, "non_field_errors", PASSWORD_MISMATCH);
        }
        if !fields.is_empty() {
            return Err(EngineError::Validation(fields));
        }

        let password_hash = password::hash(&account.password1)?;
        let grace = self.settings.confirmation_grace_period;

        let registered = self
            .with_tx(|_, db_tx| {
                Box::pin(async move {
                    let user = users::ActiveModel {
                        id: ActiveValue::NotSet,
                        username: ActiveValue::Set(username),
                        email: ActiveValue::Set(email),
                        password: ActiveValue::Set(password_hash),
                        email_verified: ActiveValue::Set(false),
                        is_active: ActiveValue::Set(true),
                        date_joined: ActiveValue::Set(now),
                    }
                    .insert(db_tx)
                    .await
                    .map_err(duplicate_account)?;

                    profiles::ActiveModel {
                        user_id: ActiveValue::Set(user.id),
                        plus_notification_mail: ActiveValue::Set(false),
                        pro_notification_mail: ActiveValue::Set(false),
                        subscribed_plan: ActiveValue::Set(None),
                        created_on_behalf: ActiveValue::Set(created_on_behalf),
                        next_confirmation_mail: ActiveValue::Set(None),
                        needs_confirmation_after: ActiveValue::Set(now + grace),
                        confirmation_key: ActiveValue::Set(profiles::generate_confirmation_key()),
                    }
                    .insert(db_tx)
                    .await?;

                    let token = tokens::new_active(user.id, now).insert(db_tx).await?;
                    Ok(Registered {
                        user,
                        token: token.key,
                    })
                })
            })
            .await?;

        tracing::info!(
            user_id = registered.user.id,
            "registered {}",
            registered.user.username
        );

        let profile = self.profile(registered.user.id).await?;
        self.send_confirmation(&self.database, &registered.user, profile, now)
            .await?;

        Ok(registered)
    }

    /// Marks the email of the profile holding `key` as verified.
    pub async fn verify_email(&self, key: &str) -> ResultEngine<users::Model> {
        let key = key.to_string();
        self.with_tx(|_, db_tx| {
            Box::pin(async move {
                let profile = profiles::Entity::find()
                    .filter(profiles::Column::ConfirmationKey.eq(key))
                    .one(db_tx)
                    .await?
                    .ok_or_else(|| EngineError::KeyNotFound("Invalid confirmation key".to_string()))?;
                let user = users::Entity::find_by_id(profile.user_id)
                    .one(db_tx)
                    .await?
                    .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))?;

                let mut profile: profiles::ActiveModel = profile.into();
                profile.next_confirmation_mail = ActiveValue::Set(None);
                profile.update(db_tx).await?;

                let mut user: users::ActiveModel = user.into();
                user.email_verified = ActiveValue::Set(true);
                Ok(user.update(db_tx).await?)
            })
        })
        .await
    }

    pub async fn change_password(
        &self,
        user_id: i32,
        old_password: &str,
        new_password1: &str,
        new_password2: &str,
    ) -> ResultEngine<()> {
        let user = self
            .user_by_id(user_id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))?;

        let mut fields = FieldErrors::new();
        if !password::verify(old_password, &user.password) {
            push(
                &mut fields,
                "old_password",
                "Your old password was entered incorrectly. Please enter it again.",
            );
        }
        if new_password1 != new_password2 {
            push(&mut fields, "new_password2", PASSWORD_MISMATCH);
        }
        for message in password::policy_violations(new_password1, &user.username, &user.email) {
            push(&mut fields, "new_password2", message);
        }
        if !fields.is_empty() {
            return Err(EngineError::Validation(fields));
        }

        let mut user: users::ActiveModel = user.into();
        user.password = ActiveValue::Set(password::hash(new_password1)?);
        user.update(&self.database).await?;
        Ok(())
    }

    pub async fn user_by_id(&self, user_id: i32) -> ResultEngine<Option<users::Model>> {
        users::Entity::find_by_id(user_id)
            .one(&self.database)
            .await
            .map_err(Into::into)
    }

    pub async fn user_by_email(&self, email: &str) -> ResultEngine<Option<users::Model>> {
        self.find_user_by_email(&self.database, &normalize_email(email))
            .await
    }

    /// Resolves the owner of an API token.
    pub async fn user_by_token(&self, key: &str) -> ResultEngine<Option<users::Model>> {
        let Some(token) = tokens::Entity::find_by_id(key.to_string())
            .one(&self.database)
            .await?
        else {
            return Ok(None);
        };
        self.user_by_id(token.user_id).await
    }

    /// Invalidates the user's token; the next login issues a new one.
    pub async fn logout(&self, user_id: i32) -> ResultEngine<()> {
        tokens::Entity::delete_many()
            .filter(tokens::Column::UserId.eq(user_id))
            .exec(&self.database)
            .await?;
        Ok(())
    }

    pub async fn profile(&self, user_id: i32) -> ResultEngine<profiles::Model> {
        profiles::Entity::find_by_id(user_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("profile not exists".to_string()))
    }

    pub(super) async fn find_user_by_username<C: ConnectionTrait>(
        &self,
        db: &C,
        username: &str,
    ) -> ResultEngine<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn find_user_by_email<C: ConnectionTrait>(
        &self,
        db: &C,
        email: &str,
    ) -> ResultEngine<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Existing token of the user, or a fresh one.
    pub(super) async fn token_for<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: i32,
        now: DateTime<Utc>,
    ) -> ResultEngine<String> {
        if let Some(token) = tokens::Entity::find()
            .filter(tokens::Column::UserId.eq(user_id))
            .one(db)
            .await?
        {
            return Ok(token.key);
        }
        Ok(tokens::new_active(user_id, now).insert(db).await?.key)
    }

    /// Hands a confirmation mail to the mailer and books the next slot.
    ///
    /// A delivery failure is logged and leaves the slot untouched, so the
    /// next account check retries.
    pub(super) async fn send_confirmation<C: ConnectionTrait>(
        &self,
        db: &C,
        user: &users::Model,
        profile: profiles::Model,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let mail = ConfirmationMail {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            key: profile.confirmation_key.clone(),
        };
        if let Err(err) = self.mailer.send_confirmation(&mail) {
            tracing::warn!(user_id = user.id, "confirmation mail not sent: {err}");
            return Ok(());
        }

        let mut profile: profiles::ActiveModel = profile.into();
        profile.next_confirmation_mail =
            ActiveValue::Set(Some(now + self.settings.confirmation_mail_interval));
        profile.update(db).await?;
        Ok(())
    }
}
