//! Outgoing mail seam.
//!
//! The engine only decides *when* a confirmation mail is due; delivering it
//! is up to a [`Mailer`]. [`LogMailer`] is the default and just records the
//! mail in the log.

use std::fmt::Debug;

use crate::ResultEngine;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationMail {
    pub user_id: i32,
    pub username: String,
    pub email: String,
    pub key: String,
}

pub trait Mailer: Send + Sync + Debug {
    fn send_confirmation(&self, mail: &ConfirmationMail) -> ResultEngine<()>;
}

#[derive(Clone, Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_confirmation(&self, mail: &ConfirmationMail) -> ResultEngine<()> {
        tracing::info!(
            user_id = mail.user_id,
            email = %mail.email,
            "confirmation mail for {} (key {})",
            mail.username,
            mail.key
        );
        Ok(())
    }
}
