use advisor_coordinator::{
    api::start_server,
    audit::AuditLog,
    config::Settings,
    gemini::GeminiClient,
    state::build_checkpoint_store,
    tools::FinancialApiClient,
    SessionHost,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;

    if settings.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY not set; every turn will fail until it is configured");
    }

    info!("Financial Advisory Coordinator - API Server");
    info!("Port: {}", settings.port);
    info!("Model: {}", settings.gemini_model);

    // Create components
    let model = Arc::new(GeminiClient::new(
        settings.gemini_api_key.clone().unwrap_or_default(),
        &settings.gemini_model,
    )?);
    let api = settings
        .financial_api_base_url
        .as_deref()
        .map(FinancialApiClient::new)
        .transpose()?;
    let store = build_checkpoint_store(settings.database_url.as_deref());

    let host = Arc::new(SessionHost::assemble(
        model,
        api,
        settings.coordinator.clone(),
        store,
        Arc::new(AuditLog::new()),
    ));

    info!("Coordinator initialized");

    // Start API server
    start_server(host, settings.port).await?;

    Ok(())
}
