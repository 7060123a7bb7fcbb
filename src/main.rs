use std::sync::Arc;

use anyhow::Result;
use blog_generator::config::{Config, StoreBackend, DEFAULT_CONFIG_FILE};
use blog_generator::db;
use blog_generator::handler::{BlogService, StorageTarget};
use blog_generator::inference::remote::RemoteInference;
use blog_generator::jobs::JobBook;
use blog_generator::routes::{router, AppState};
use blog_generator::store::fs::FsStore;
use blog_generator::store::memory::MemoryStore;
use blog_generator::store::sqlite::SqliteStore;
use blog_generator::store::ArtifactStore;
use blog_generator::telemetry::{init_telemetry, shutdown_telemetry};
use clap::Parser;
use clap_serde_derive::ClapSerde;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tracing::{error, info};

#[cfg(unix)]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env, default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    /// Configuration options
    #[command(flatten)]
    pub opt_config: <Config as ClapSerde>::Opt,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = match Config::from_toml(&args.config_file) {
        Ok(opt) => Config::from(opt).merge(args.opt_config),
        Err(err) => {
            if args.config_file == DEFAULT_CONFIG_FILE {
                Config::default().merge(args.opt_config)
            } else {
                eprintln!(
                    "Failed to read configuration file {} with error: {}",
                    args.config_file, err
                );
                std::process::exit(1);
            }
        }
    };

    init_telemetry(config.otlp_endpoint(), config.console_log)?;

    let pool = db::connect(&config.database_file).await?;
    let store = open_store(&config, &pool).await?;
    let jobs = JobBook::new(pool).await?;
    let generator = Arc::new(RemoteInference::from_config(&config)?);

    let service = BlogService::new(
        generator,
        store,
        jobs,
        StorageTarget {
            bucket: config.bucket.clone(),
            prefix: config.artifact_prefix.clone(),
        },
    );

    let listener = TcpListener::bind(format!("{}:{}", config.address, config.port)).await?;
    info!("Listening on {}", listener.local_addr()?);
    info!(
        "Writing artifacts to bucket {} under {}/ ({:?} store)",
        config.bucket, config.artifact_prefix, config.store_backend
    );

    axum::serve(listener, router(AppState { service }))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown_telemetry();
    Ok(())
}

async fn open_store(config: &Config, pool: &SqlitePool) -> Result<Arc<dyn ArtifactStore>> {
    Ok(match config.store_backend {
        StoreBackend::Fs => {
            let store = FsStore::new(&config.store_root);
            store.ensure_bucket(&config.bucket).await?;
            Arc::new(store)
        }
        StoreBackend::Sqlite => Arc::new(SqliteStore::new(pool.clone()).await?),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    })
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down..."),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
