use std::{env, sync::Arc};

use colored::Colorize;
use lockstep_collab::{
    BusError, Collab, CollabError, DatabaseError, LocalBus, MemoryDatabase, PgBus, PgDatabase,
};
use lockstep_core::Config;
use log::{error, info, warn};
use thiserror::Error;
use tokio::runtime;

use crate::catalog::CatalogError;

mod catalog;
mod logging;

#[derive(Debug, Error)]
enum LockstepError {
    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Could not connect to the bus: {0}")]
    Bus(#[from] BusError),

    #[error("Could not load the catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Could not restore stations: {0}")]
    Restore(#[from] CollabError),

    #[error("Server stopped: {0}")]
    Server(#[from] std::io::Error),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl LockstepError {
    fn hint(&self) -> String {
        match self {
            LockstepError::Database(_) => "This is a database error. Make sure DATABASE_URL points to a running postgres instance, then try again.".to_string(),
            LockstepError::Bus(_) => "The bus shares the postgres connection. Make sure the database accepts LISTEN/NOTIFY, then try again.".to_string(),
            LockstepError::Catalog(_) => "LOCKSTEP_CATALOG must point to a JSON file with \"songs\" and \"playlists\".".to_string(),
            LockstepError::Restore(_) => "Stations could not be read back. The stored records may be corrupt.".to_string(),
            LockstepError::Server(_) => "Make sure LOCKSTEP_SERVER_PORT is a free port.".to_string(),
            LockstepError::Fatal(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

async fn build_collab(config: Config) -> Result<Collab, LockstepError> {
    let capacity = config.bus_capacity;

    match env::var("DATABASE_URL") {
        Ok(url) => {
            info!("Connecting to database...");
            let database = PgDatabase::new(&url).await?;
            database.migrate().await?;

            let bus = PgBus::new(database.pool().clone(), capacity).await?;

            Ok(Collab::new(config, Arc::new(database), Arc::new(bus)))
        }
        Err(_) => {
            warn!("DATABASE_URL is not set, so stations only live in memory and every token is trusted");

            let admins: Vec<_> = env::var("LOCKSTEP_ADMINS")
                .unwrap_or_default()
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();

            let database = MemoryDatabase::development(admins);

            if let Ok(path) = env::var("LOCKSTEP_CATALOG") {
                let songs = catalog::load(&path, &database)?;
                info!("Loaded {} songs from {}", songs, path);
            }

            let bus = LocalBus::new(capacity);

            Ok(Collab::new(config, Arc::new(database), Arc::new(bus)))
        }
    }
}

async fn run() -> Result<(), LockstepError> {
    let collab = Arc::new(build_collab(Config::default()).await?);

    collab.listen();
    collab.stations.restore().await?;

    info!("Initialized successfully.");
    lockstep_server::run_server(collab).await?;

    Ok(())
}

fn main() {
    logging::init_logger();

    let result = runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("lockstep-async")
        .build()
        .map_err(|e| LockstepError::Fatal(e.to_string()))
        .and_then(|runtime| runtime.block_on(run()));

    if let Err(error) = result {
        error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "lockstep failed to start!".bold().red());
        error!("{}", error);
        error!(
            "{}",
            format!("Hint: {}", error.hint()).dimmed().italic()
        );
    }
}
