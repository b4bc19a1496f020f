//! Account tables.
//!
//! - `users`: credentials and email state
//! - `tokens`: one API token per user, presented as `Token <key>`
//! - `access_attempts`: login audit used by the lockout policy

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
pub(crate) enum Users {
    Table,
    Id,
    Username,
    Email,
    Password,
    EmailVerified,
    IsActive,
    DateJoined,
}

#[derive(Iden)]
enum Tokens {
    Table,
    Key,
    UserId,
    Created,
}

#[derive(Iden)]
enum AccessAttempts {
    Table,
    Id,
    Username,
    IpAddress,
    UserAgent,
    HttpAccept,
    PathInfo,
    Trusted,
    AttemptTime,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .col(
                        ColumnDef::new(Users::EmailVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Users::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Users::DateJoined).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Tokens
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Tokens::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tokens::Key).string().not_null().primary_key())
                    .col(
                        ColumnDef::new(Tokens::UserId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Tokens::Created).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-tokens-user_id")
                            .from(Tokens::Table, Tokens::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Access attempts
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(AccessAttempts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AccessAttempts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AccessAttempts::Username).string().not_null())
                    .col(ColumnDef::new(AccessAttempts::IpAddress).string().not_null())
                    .col(ColumnDef::new(AccessAttempts::UserAgent).string().not_null())
                    .col(ColumnDef::new(AccessAttempts::HttpAccept).string().not_null())
                    .col(ColumnDef::new(AccessAttempts::PathInfo).string().not_null())
                    .col(ColumnDef::new(AccessAttempts::Trusted).boolean().not_null())
                    .col(
                        ColumnDef::new(AccessAttempts::AttemptTime)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-access_attempts-username-attempt_time")
                    .table(AccessAttempts::Table)
                    .col(AccessAttempts::Username)
                    .col(AccessAttempts::AttemptTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-access_attempts-ip_address-attempt_time")
                    .table(AccessAttempts::Table)
                    .col(AccessAttempts::IpAddress)
                    .col(AccessAttempts::AttemptTime)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AccessAttempts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tokens::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
