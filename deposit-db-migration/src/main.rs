use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use sea_orm_migration::cli;
use serde::Deserialize;

#[derive(Deserialize)]
struct MigrationConfig {
    database_url: String,
}

#[tokio::main]
async fn main() {
    // `DATABASE_URL` from the environment wins over App.toml, as with sea-orm-cli.
    if std::env::var("DATABASE_URL").is_err() {
        match Figment::new()
            .merge(Toml::file("App.toml"))
            .merge(Env::prefixed("INDEXER_"))
            .extract::<MigrationConfig>()
        {
            Ok(config) => std::env::set_var("DATABASE_URL", config.database_url),
            Err(error) => eprintln!("database_url not found in App.toml: {}", error),
        }
    }

    cli::run_cli(deposit_db_migration::Migrator).await;
}
