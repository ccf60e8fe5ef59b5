//! Workflow approval service executable

use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use workflow_core::config::{ServiceConfig, StorageBackend};
use workflow_core::{paths, FileStore, MemoryStore, StoreImport, WorkflowStore};
use workflow_server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with INFO as default if RUST_LOG not set
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let matches = Command::new("workflow-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Workflow state machine and approval service")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .help("Configuration file path (JSON)")
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Use the file store rooted at DIR")
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .value_name("PORT")
                .help("HTTP port")
                .value_parser(clap::value_parser!(u16))
        )
        .arg(
            Arg::new("memory")
                .long("memory")
                .help("Keep all records in memory")
                .action(ArgAction::SetTrue)
                .conflicts_with("data-dir")
        )
        .arg(
            Arg::new("import")
                .long("import")
                .value_name("FILE")
                .help("Load entities and actor roles from FILE at startup")
        )
        .get_matches();

    let config_path = match matches.get_one::<String>("config") {
        Some(path) => PathBuf::from(path),
        None => paths::service_config_path(),
    };
    let mut config = ServiceConfig::load(Some(config_path.as_path()))
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    // Command line flags override the layered configuration
    if let Some(port) = matches.get_one::<u16>("port") {
        config.server.port = *port;
    }
    if let Some(data_dir) = matches.get_one::<String>("data-dir") {
        config.storage.backend = StorageBackend::File;
        config.storage.data_dir = Some(PathBuf::from(data_dir));
    }
    if matches.get_flag("memory") {
        config.storage.backend = StorageBackend::Memory;
    }
    config.validate()?;

    let store: Arc<dyn WorkflowStore> = match config.storage.backend {
        StorageBackend::Memory => {
            log::info!("Using in-memory store");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::File => {
            if let Some(data_dir) = &config.storage.data_dir {
                paths::init_data_root(data_dir.display().to_string()).map_err(anyhow::Error::msg)?;
            }
            let data_dir = paths::workflow_data_root();
            log::info!("Using data directory: {}", data_dir.display());
            Arc::new(FileStore::open(&data_dir)?)
        }
    };

    if let Some(import_path) = matches.get_one::<String>("import") {
        let import = StoreImport::from_file(import_path)
            .with_context(|| format!("Failed to read import file {}", import_path))?;
        let (entities, actors) = import.apply(&*store).await?;
        log::info!("Loaded {} entities and {} actors from {}", entities, actors, import_path);
    }

    let app = workflow_server::app(AppState::new(store));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    log::info!("Workflow server listening on {}", address);

    axum::serve(listener, app).await?;
    Ok(())
}
