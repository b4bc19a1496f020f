use std::{error::Error, io::Write};

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use engine::{Engine, EngineError, NewAccount, plans};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

/// Recorded as the origin of plan changes made from here.
const ORIGIN: &str = "admin-cli";

#[derive(Parser, Debug)]
#[command(name = "accounting_admin")]
#[command(about = "Admin utilities for the accounting service (plans, users)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./accounting.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Plan(Plan),
    User(User),
}

#[derive(Args, Debug)]
struct HistoryArgs {
    #[arg(long)]
    email: String,
}

#[derive(Args, Debug)]
struct Plan {
    #[command(subcommand)]
    command: PlanCommand,
}

#[derive(Subcommand, Debug)]
enum PlanCommand {
    Create(PlanCreateArgs),
    List,
}

#[derive(Args, Debug)]
struct PlanCreateArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    name: String,
    /// Bytes.
    #[arg(long)]
    block_quota: i64,
    /// Bytes per month.
    #[arg(long)]
    monthly_traffic_quota: i64,
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
    Subscribe(SubscribeArgs),
    AddInterval(AddIntervalArgs),
    /// Show the plan intervals and the plan audit trail of a user.
    History(HistoryArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
}

#[derive(Args, Debug)]
struct SubscribeArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    plan: String,
}

#[derive(Args, Debug)]
struct AddIntervalArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    plan: String,
    /// `[DD] [HH:[MM:]]ss[.uuuuuu]`, e.g. `30 00:00:00` for 30 days.
    #[arg(long)]
    duration: String,
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                break;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
                    out.flush()?;
                }
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
                out.flush()?;
            }
            _ => {}
        }
    }

    Ok(buf)
}

/// The engine checks the policy; this only catches typos.
fn prompt_new_password() -> Result<(String, String), Box<dyn Error + Send + Sync>> {
    let p1 = prompt_password("Password: ")?;
    let p2 = prompt_password("Confirm password: ")?;
    Ok((p1, p2))
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// Prints field errors one per line and exits; other errors propagate.
fn report(err: EngineError) -> Box<dyn Error + Send + Sync> {
    if let EngineError::Validation(fields) = &err {
        for (field, messages) in fields {
            for message in messages {
                eprintln!("{field}: {message}");
            }
        }
        std::process::exit(2);
    }
    err.into()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Plan(Plan {
            command: PlanCommand::Create(args),
        }) => {
            let plan = engine
                .create_plan(plans::Model {
                    id: args.id,
                    name: args.name,
                    block_quota: args.block_quota,
                    monthly_traffic_quota: args.monthly_traffic_quota,
                })
                .await
                .map_err(report)?;
            println!("created plan: {} ({})", plan.name, plan.id);
        }
        Command::Plan(Plan {
            command: PlanCommand::List,
        }) => {
            for plan in engine.plans().await? {
                println!(
                    "{}\t{}\tblock={}\ttraffic={}",
                    plan.id, plan.name, plan.block_quota, plan.monthly_traffic_quota
                );
            }
        }
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            let (password1, password2) = prompt_new_password()?;
            let registered = engine
                .create_account(
                    NewAccount {
                        username: args.username,
                        email: args.email,
                        password1,
                        password2,
                    },
                    true,
                    Utc::now(),
                )
                .await
                .map_err(report)?;
            println!(
                "created user: {} ({})",
                registered.user.username, registered.user.id
            );
        }
        Command::User(User {
            command: UserCommand::Subscribe(args),
        }) => {
            engine
                .subscribe(&args.email, &args.plan, ORIGIN, Utc::now())
                .await
                .map_err(report)?;
            println!("subscribed {} to {}", args.email, args.plan);
        }
        Command::User(User {
            command: UserCommand::AddInterval(args),
        }) => {
            let interval = engine
                .add_interval(&args.email, &args.plan, &args.duration, ORIGIN, Utc::now())
                .await
                .map_err(report)?;
            println!(
                "queued {}s of {} for {} (interval {})",
                interval.duration, args.plan, args.email, interval.id
            );
        }
        Command::User(User {
            command: UserCommand::History(args),
        }) => {
            let Some(user) = engine.user_by_email(&args.email).await? else {
                eprintln!("user not found: {}", args.email);
                std::process::exit(1);
            };
            for interval in engine.intervals(user.id).await? {
                let ends = interval
                    .ends_at()
                    .map_or_else(|| "-".to_string(), |end| end.to_rfc3339());
                println!(
                    "interval {}\t{}\t{:?}\t{}s\tends {ends}",
                    interval.id,
                    interval.plan_id,
                    interval.state()?,
                    interval.duration
                );
            }
            for entry in engine.plan_log(user.id).await? {
                println!(
                    "{}\t{:?}\t{}\t{}",
                    entry.timestamp.to_rfc3339(),
                    entry.action()?,
                    entry.plan_id.as_deref().unwrap_or("-"),
                    entry.origin
                );
            }
        }
    }

    Ok(())
}
