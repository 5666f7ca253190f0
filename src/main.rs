#![allow(clippy::uninlined_format_args)]

use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use audiodoc_rs::auth::Auth;
use audiodoc_rs::config::Config;
use audiodoc_rs::notify::ResendNotifier;
use audiodoc_rs::runner::pandoc::PandocExporter;
use audiodoc_rs::runner::{ApiContentPipeline, PipelineRunner};
use audiodoc_rs::storage::task::sqlite::SqliteTaskStore;
use audiodoc_rs::task::{ControllerOptions, TaskController};
use audiodoc_rs::utils::logger;
use audiodoc_rs::{init_env, AppContext, DATA_PATH, SQLITE_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = logger::init("./logs".to_string())?;
    init_env();
    fs::create_dir_all(DATA_PATH.as_str())?;

    info!("Starting audiodoc service {}...", env!("GIT_HASH"));

    // all required secrets up front; a missing one stops the boot here
    let config = Config::from_env()?;

    info!("Initializing Storage...");
    let store = SqliteTaskStore::new(&SQLITE_PATH).await?;

    info!("Initializing Auth...");
    let auth = Auth::new(&config.auth_domain, &config.auth_audience);

    info!("Initializing Job Runner...");
    let content = Arc::new(ApiContentPipeline::new(&config));
    let runner = PipelineRunner::new(content, PandocExporter::new(), DATA_PATH.as_str());

    let notifier = ResendNotifier::new(config.email_api_key.clone(), config.email_from.clone());

    let controller = TaskController::new(
        Arc::new(store),
        Arc::new(runner),
        Arc::new(notifier),
        ControllerOptions {
            key_mode: config.key_mode,
            job_timeout: config.job_timeout,
            error_display_cap: config.error_display_cap,
        },
    );

    let ctx = Arc::new(AppContext {
        auth: Arc::new(auth),
        controller: Arc::new(controller),
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], 7200));
    info!("Starting HTTP server at http://{}", addr);

    match audiodoc_rs::web::start_server(ctx, addr).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            tracing::error!("Server error: {}", e);
            return Err(e);
        }
    }

    info!("Shutting down...");

    Ok(())
}
