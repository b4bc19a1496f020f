#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{Database, DatabaseConnection};

use engine::{ConfirmationMail, Engine, EngineError, Mailer, NewAccount, Registered};
use migration::MigratorTrait;

/// Keeps every mail instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<ConfirmationMail>>,
    pub fail: bool,
}

impl RecordingMailer {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Mailer for RecordingMailer {
    fn send_confirmation(&self, mail: &ConfirmationMail) -> Result<(), EngineError> {
        if self.fail {
            return Err(EngineError::Mail("smtp down".to_string()));
        }
        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
}

pub async fn engine_with_db() -> (Engine, DatabaseConnection, Arc<RecordingMailer>) {
    engine_with_mailer(RecordingMailer::default()).await
}

pub async fn engine_with_mailer(
    mailer: RecordingMailer,
) -> (Engine, DatabaseConnection, Arc<RecordingMailer>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let mailer = Arc::new(mailer);
    let engine = Engine::builder()
        .database(db.clone())
        .mailer(mailer.clone())
        .build()
        .await
        .unwrap();
    (engine, db, mailer)
}

pub fn account(username: &str) -> NewAccount {
    NewAccount {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password1: "correct horse".to_string(),
        password2: "correct horse".to_string(),
    }
}

pub async fn register(engine: &Engine, username: &str) -> Registered {
    engine.register(account(username), t0()).await.unwrap()
}
