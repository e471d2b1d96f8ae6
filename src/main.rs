use std::sync::Arc;
use timetable_solver::config::AppConfig;
use timetable_solver::grid::SlotGrid;
use timetable_solver::server::{self, AppState};
use timetable_solver::store::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.server.log_filter.as_str()),
    )
    .init();

    let grid = SlotGrid::from_config(&config.grid)?;
    let store = Arc::new(MemoryStore::from_catalog(config.load_catalog()?));
    log::info!(
        "Loaded catalog{} with {} windows per day",
        config
            .catalog
            .as_ref()
            .map(|p| format!(" from {}", p.display()))
            .unwrap_or_default(),
        grid.len()
    );

    server::run_server(&config.server, AppState::new(store, grid)).await?;

    Ok(())
}
