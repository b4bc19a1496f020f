use std::{future::Future, pin::Pin, sync::Arc};

use chrono::TimeDelta;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use crate::{
    ResultEngine,
    mailer::{LogMailer, Mailer},
    plans::DEFAULT_PLAN_ID,
};

mod accounts;
mod login;
mod plans;
mod usage;

pub use accounts::{NewAccount, Registered};
pub use usage::{AccountStatus, ProfileView};

type TxFuture<'a, T> = Pin<Box<dyn Future<Output = ResultEngine<T>> + Send + 'a>>;

/// Tunables for throttling, email confirmation and plan fallback.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Failed logins (per username or per IP) tolerated inside `cooloff`.
    pub failure_limit: u64,
    pub cooloff: TimeDelta,
    /// How long an unverified account stays usable after registration.
    pub confirmation_grace_period: TimeDelta,
    /// Minimum gap between two confirmation mails to the same user.
    pub confirmation_mail_interval: TimeDelta,
    pub default_plan: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            failure_limit: 3,
            cooloff: TimeDelta::hours(1),
            confirmation_grace_period: TimeDelta::days(7),
            confirmation_mail_interval: TimeDelta::days(1),
            default_plan: DEFAULT_PLAN_ID.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    mailer: Arc<dyn Mailer>,
    settings: EngineSettings,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Run `f` inside a DB transaction, committing on success and rolling
    /// back on error.
    pub(crate) async fn with_tx<T, F>(&self, f: F) -> ResultEngine<T>
    where
        T: Send,
        F: for<'a> FnOnce(&'a Engine, &'a DatabaseTransaction) -> TxFuture<'a, T> + Send,
    {
        let db_tx = self.database.begin().await?;
        match f(self, &db_tx).await {
            Ok(value) => {
                db_tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                db_tx.rollback().await?;
                Err(err)
            }
        }
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    mailer: Option<Arc<dyn Mailer>>,
    settings: EngineSettings,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Replace the default [`LogMailer`].
    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> EngineBuilder {
        self.mailer = Some(mailer);
        self
    }

    pub fn settings(mut self, settings: EngineSettings) -> EngineBuilder {
        self.settings = settings;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            mailer: self.mailer.unwrap_or_else(|| Arc::new(LogMailer)),
            settings: self.settings,
        })
    }
}
