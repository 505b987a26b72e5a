use anyhow::Context;
use clap::{Parser, Subcommand};
use clinic_booking_migration::Migrator;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Database;

#[derive(Parser, Debug)]
#[clap(name = "clinic-migration", version)]
#[clap(about = "Schema migrations for the clinic booking tables", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    /// Postgres connection string of the Supabase database.
    #[clap(long, env = "DATABASE_URL")]
    database_url: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    Up {
        /// Apply only this many migrations
        #[clap(long)]
        num: Option<u32>,
    },
    /// Roll back applied migrations
    Down {
        /// Roll back this many migrations. Use "all" to roll back everything.
        #[clap(long, default_value = "1")]
        num: String,
    },
    /// Show applied and pending migrations
    Status,
    /// Drop all tables, then apply all migrations
    Fresh,
    /// Roll back all migrations, then apply them again
    Refresh,
}

fn parse_steps(num: &str) -> anyhow::Result<Option<u32>> {
    match num {
        "all" => Ok(None),
        s => s
            .parse::<u32>()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("Invalid number for down command: {}", s)),
    }
}

async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    println!("Connecting to database...");
    let conn = Database::connect(&cli.database_url)
        .await
        .context("Failed to connect to the database")?;

    match cli.command {
        Commands::Up { num } => {
            println!("Applying migrations...");
            Migrator::up(&conn, num).await?;
        }
        Commands::Down { num } => {
            println!("Rolling back migrations...");
            Migrator::down(&conn, parse_steps(&num)?).await?;
        }
        Commands::Status => {
            Migrator::status(&conn).await?;
        }
        Commands::Fresh => {
            println!("Dropping all tables and re-applying migrations...");
            Migrator::fresh(&conn).await?;
        }
        Commands::Refresh => {
            println!("Rolling back and re-applying all migrations...");
            Migrator::refresh(&conn).await?;
        }
    }

    println!("Done.");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn down_steps() {
        assert_eq!(parse_steps("all").unwrap(), None);
        assert_eq!(parse_steps("3").unwrap(), Some(3));
        assert!(parse_steps("many").is_err());
    }

    #[test]
    fn cli_parses_up_with_count() {
        let cli = Cli::try_parse_from([
            "clinic-migration",
            "--database-url",
            "postgres://localhost/db",
            "up",
            "--num",
            "1",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Up { num: Some(1) }));
    }
}
