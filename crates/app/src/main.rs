use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "accounting={level},server={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.server.database).await?;
    let engine = engine::Engine::builder()
        .database(db)
        .settings(settings.engine()?)
        .build()
        .await?;
    tracing::info!(
        failure_limit = engine.settings().failure_limit,
        default_plan = %engine.settings().default_plan,
        "engine ready"
    );

    let config = server::ServerConfig {
        bind: settings
            .server
            .bind
            .clone()
            .unwrap_or_else(|| "127.0.0.1".to_string()),
        port: settings.server.port,
        api_secret: settings.server.api_secret.clone(),
    };
    server::run(engine, config).await?;

    Ok(())
}

async fn parse_database(
    config: &Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    tracing::info!("database ready");
    Ok(database)
}
