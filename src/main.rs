use std::sync::Arc;

use panelsync::{
    config::Config,
    error::AppError,
    panel::{
        connection::SocketSettings,
        directory::{LivePanelConnector, PanelDirectory},
    },
    scheduler,
    service::{bot_log::BotLogStore, panel::PanelService},
    startup,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    startup::init_tracing();

    let config = Config::from_env()?;

    let db = startup::connect_to_database(&config).await?;
    let http_client = startup::setup_reqwest_client()?;
    let logs = BotLogStore::new(config.bot_log_dir.clone());

    let socket = SocketSettings {
        rpc_timeout: config.rpc_timeout,
        ..SocketSettings::default()
    };
    let connector = LivePanelConnector::new(http_client.clone(), socket, logs.clone());
    let panels = PanelDirectory::new(Arc::new(connector));

    PanelService::new(&db, &panels).bootstrap().await?;
    startup::init_rank_panel(&config, &panels)?;
    let server_query = startup::setup_server_query(&config, &http_client)?;

    let state = AppState::new(db, panels.clone(), logs, config.rpc_timeout, server_query);
    let runner = scheduler::start_scheduler(state, &config).await?;

    tracing::info!("panelsync running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down");
    if let Err(err) = runner.shutdown().await {
        tracing::error!(error = %err, "scheduler shutdown failed");
    }
    panels.shutdown();

    Ok(())
}
