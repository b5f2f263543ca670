//! Applies the hosted schema (tables, row-level security policies, history
//! trigger and the `apply_positions` batch function) to a Postgres database.
//!
//! Usage:
//!   cargo run --bin stroflo-migrate              Apply pending migrations
//!   cargo run --bin stroflo-migrate -- --help    Show this help
//!
//! Reads `DATABASE_URL` (the project's direct Postgres connection string).

use std::env;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!("Stroflo schema migration");
    println!();
    println!("Applies the SQL migrations bundled with the db crate to DATABASE_URL.");
    println!();
    println!("Usage:");
    println!("  cargo run --bin stroflo-migrate             Apply pending migrations");
    println!("  cargo run --bin stroflo-migrate -- --help   Show this help");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
    let pool = db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;

    info!("Applying migrations");
    db::migrate(&pool).await.context("Migration failed")?;
    info!("Schema is up to date");

    pool.close().await;
    Ok(())
}
