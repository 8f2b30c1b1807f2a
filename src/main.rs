use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use repositories::{
    drivers::DriverRepository, memory::MemoryStore, trips::TripRepository, DriverStore, TripStore,
};
use settings::Backend;

mod ledger;
mod models;
mod repositories;
pub mod services;
pub mod settings;
pub mod utils;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(short, long)]
    listen: Option<String>,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    init_logging(&args.log4rs)?;
    let mut settings = settings::Settings::new(&args.config)?;
    if let Some(listen) = args.listen {
        settings.http.listen = listen;
    }

    let (drivers, trips): (Arc<dyn DriverStore>, Arc<dyn TripStore>) =
        match (settings.storage.backend, &settings.postgres) {
            (Backend::Postgres, Some(postgres)) => {
                let conn = PgPoolOptions::new()
                    .max_connections(postgres.max_connections)
                    .connect(&postgres.url)
                    .await?;
                sqlx::migrate!("./migrations").run(&conn).await?;
                log::info!("Connected to Postgres, migrations applied.");

                (
                    Arc::new(DriverRepository::new(conn.clone())),
                    Arc::new(TripRepository::new(conn)),
                )
            }
            (Backend::Postgres, None) => {
                anyhow::bail!("postgres backend selected but no [postgres] settings")
            }
            (Backend::Memory, _) => {
                log::warn!("Using in-memory storage; data is lost on exit.");
                let store = MemoryStore::new();

                (Arc::new(store.clone()), Arc::new(store))
            }
        };

    log::info!("Starting services.");
    services::start_services(drivers, trips, settings).await
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            log::info!("Logging initialized from {}.", path);
            Ok(())
        }
        Err(e) => {
            eprintln!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
