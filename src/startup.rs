use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{
    config::Config,
    error::AppError,
    panel::directory::PanelDirectory,
    teamspeak::{webquery::WebQueryClient, ServerQuery},
};

/// Installs the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Connects to the Sqlite database and runs pending migrations.
///
/// Establishes a connection pool to the database using the connection string from
/// configuration, then runs all pending SeaORM migrations so the schema is up to date
/// before any job touches it.
///
/// # Arguments
/// - `config` - Application configuration containing the database URL
///
/// # Returns
/// - `Ok(DatabaseConnection)` - Connected database with migrations applied
/// - `Err(AppError)` - Failed to connect to database or run migrations
pub async fn connect_to_database(config: &Config) -> Result<sea_orm::DatabaseConnection, AppError> {
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ConnectOptions, Database};

    let mut opt = ConnectOptions::new(&config.database_url);
    opt.sqlx_logging(false);

    let db = Database::connect(opt).await?;

    Migrator::up(&db, None).await?;

    Ok(db)
}

/// HTTP client shared by the audio panel and WebQuery clients.
///
/// Redirects are disabled: panel hosts are user supplied, and a redirect must not
/// carry the bearer token to another host.
pub fn setup_reqwest_client() -> Result<reqwest::Client, AppError> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    Ok(client)
}

/// Starts the rank-system panel connection when configured.
///
/// # Returns
/// - `Ok(true)` - Connection started; it keeps reconnecting in the background
/// - `Ok(false)` - No rank panel configured, the family stays disabled
/// - `Err(AppError)` - The configured host is not a usable socket URL
pub fn init_rank_panel(config: &Config, panels: &PanelDirectory) -> Result<bool, AppError> {
    let Some(rank) = &config.rank_panel else {
        tracing::info!("rank panel not configured, rank system disabled");
        return Ok(false);
    };

    panels
        .init_rank(&rank.host, &rank.token)
        .map_err(|err| {
            crate::error::config::ConfigError::InvalidValue {
                name: "RANK_PANEL_HOST".to_string(),
                value: rank.host.clone(),
                reason: err.to_string(),
            }
        })?;
    tracing::info!(host = %rank.host, "rank panel connection started");

    Ok(true)
}

/// Builds the TeamSpeak query collaborator when WebQuery is configured.
pub fn setup_server_query(
    config: &Config,
    http: &reqwest::Client,
) -> Result<Option<Arc<dyn ServerQuery>>, AppError> {
    let Some(webquery) = &config.teamspeak_webquery else {
        return Ok(None);
    };

    let client = WebQueryClient::new(
        http.clone(),
        &webquery.url,
        &webquery.api_key,
        config.rpc_timeout,
    )?;

    Ok(Some(Arc::new(client)))
}
