//! Account and plan bookkeeping for the storage accounting service.
//!
//! The [`Engine`] owns the database connection and implements every
//! operation the HTTP layer and the admin CLI expose: registration and
//! login throttling, plan subscription and intervals, and the account check
//! the block server performs before uploads and downloads.

pub use access_attempts::AttemptInfo;
pub use duration::parse_duration;
pub use error::{EngineError, FieldErrors};
pub use mailer::{ConfirmationMail, LogMailer, Mailer};
pub use ops::{
    AccountStatus, Engine, EngineBuilder, EngineSettings, NewAccount, ProfileView, Registered,
};
pub use plan_intervals::IntervalState;
pub use plan_logs::PlanAction;
pub use plans::DEFAULT_PLAN_ID;

pub mod access_attempts;
pub mod plan_intervals;
pub mod plan_logs;
pub mod plans;
pub mod profiles;
pub mod tokens;
pub mod users;

mod duration;
mod error;
mod mailer;
mod ops;
mod password;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
