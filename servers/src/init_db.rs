//! Creates the `earthquakes` table and its time index, then exits.
//! Safe to run repeatedly.

use anyhow::Result;
use lib_quake::configs::load_config;
use lib_quake::loggers::setup_logging;
use tracing::info;

mod quake_logic;
use quake_logic::components::connect_database;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = load_config()?;
    let _guard = setup_logging(&settings.log_dir, &settings.log_level, "init_db")?;

    let database = connect_database(&settings).await?;
    database.init_schema().await?;

    info!("Database initialized.");
    Ok(())
}
