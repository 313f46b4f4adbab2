use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use chatcentral::store::{KeyValueStore, MemoryStore, SqlStore};
use chatcentral::web::{AppState, WebServer};
use chatcentral::{Authenticator, Config, Database};

async fn open_store(config: &Config) -> chatcentral::Result<Arc<dyn KeyValueStore>> {
    match config.store.backend.as_str() {
        "memory" => {
            info!("Using in-process store; lockouts and revocations are not shared");
            Ok(Arc::new(MemoryStore::new()))
        }
        _ => {
            let store_db = Database::open(config.store_url()).await?;
            info!(url = config.store_url(), "Using SQL store");
            Ok(Arc::new(SqlStore::new(store_db.pool().clone())))
        }
    }
}

async fn run(config: Config) -> chatcentral::Result<()> {
    config.validate()?;

    let db = Database::open(&config.database.url).await?;
    let store = open_store(&config).await?;
    if let Err(e) = store.ping().await {
        warn!(error = %e, "Store is not reachable yet; logins will fail until it is");
    }
    let auth = Authenticator::new(db, store.clone(), &config)?;
    let state = AppState::new(auth, store, &config.server);

    let server = WebServer::new(
        &config.server,
        state,
        Duration::from_secs(config.store.purge_interval_secs.max(1)),
    )?;
    server.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            if let Err(e) = config.apply_env_overrides() {
                eprintln!("Ignoring environment overrides: {e}");
            }
            config
        }
    };

    // Initialize logging
    if let Err(e) = chatcentral::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        chatcentral::logging::init_console_only(&config.logging.level);
    }

    info!("Chat Central admin backend");
    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );

    if let Err(e) = run(config).await {
        error!("Fatal: {e}");
        std::process::exit(1);
    }
}
