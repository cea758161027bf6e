use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ticket_copilot::config::CopilotConfig;
use ticket_copilot::crm::{CrmClient, TicketSource};
use ticket_copilot::jobs::{CopilotService, JobExecutor, copilot_routes};
use ticket_copilot::llm::{StructuredGenerator, create_provider};
use ticket_copilot::store::{InMemoryJobStore, JobStore, LibSqlJobStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CopilotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export OPENAI_API_KEY=sk-...");
        std::process::exit(1);
    });

    // Initialize tracing; keep the appender guard alive for the whole run
    let (file_layer, _log_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "ticket-copilot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    eprintln!("🎫 Ticket Copilot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   CRM API: {}", config.crm.base_url);
    eprintln!("   Jobs API: http://0.0.0.0:{}/api/copilot/v1", config.port);

    // ── Collaborators ───────────────────────────────────────────────────
    let llm = create_provider(&config.llm)?;
    let generator = Arc::new(StructuredGenerator::new(llm, config.generator.clone()));
    let tickets: Arc<dyn TicketSource> = Arc::new(CrmClient::new(config.crm.clone())?);

    // ── Job Store ───────────────────────────────────────────────────────
    let store: Arc<dyn JobStore> = match &config.db_path {
        Some(path) => {
            let store = LibSqlJobStore::new_local(path).await.unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", path.display(), e);
                std::process::exit(1);
            });
            eprintln!("   Database: {}", path.display());
            Arc::new(store)
        }
        None => {
            eprintln!("   Database: in-memory (jobs are lost on restart)");
            Arc::new(InMemoryJobStore::new())
        }
    };
    if let Some(dir) = &config.log_dir {
        eprintln!("   Logs: {}", dir.display());
    }

    // ── HTTP Server ─────────────────────────────────────────────────────
    let executor = Arc::new(JobExecutor::new(Arc::clone(&store), tickets, generator));
    let service = Arc::new(CopilotService::new(store, executor));
    let app = copilot_routes(service);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Copilot server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
