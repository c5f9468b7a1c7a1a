use advisor_coordinator::{
    audit::AuditLog,
    config::Settings,
    gemini::GeminiClient,
    llm::{ChatModel, ModelReply, ScriptedModel},
    state::InMemoryCheckpointStore,
    tools::FinancialApiClient,
    SessionHost, ToolCallRequest,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SAMPLE_REQUEST: &str = "Help me construct a portfolio for client 12345";

/// Offline script: one tool round with a specialist consult, then an
/// accepted answer
fn demo_model() -> ScriptedModel {
    ScriptedModel::new(vec![
        ModelReply::tool_calls(vec![
            ToolCallRequest::new("get_client_profile", json!({"client_id": "12345"})),
            ToolCallRequest::new(
                "consult_specialist",
                json!({
                    "agent": "portfolio_architect",
                    "task": "Propose a target allocation for a moderate-risk client",
                    "context": {"client_id": "12345"}
                }),
            ),
        ]),
        ModelReply::text(
            "A 60/40 split suits a moderate profile: 45% broad US equity, 15% international equity, 30% core bonds, 10% TIPS.",
        ),
        ModelReply::text(
            "Recommended allocation for client 12345: 45% US equity, 15% international equity, 30% core bonds, 10% TIPS. \
             Rebalance annually or on 5% drift; validate against the IPS before trading.",
        ),
        ModelReply::text(
            r#"{"feedback": "Complete, specific and actionable.", "success_criteria_met": true, "user_input_needed": false, "next_agent": null}"#,
        ),
    ])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let message = if args.is_empty() {
        SAMPLE_REQUEST.to_string()
    } else {
        args.join(" ")
    };

    let model: Arc<dyn ChatModel> = match &settings.gemini_api_key {
        Some(key) => Arc::new(GeminiClient::new(key.clone(), &settings.gemini_model)?),
        None => {
            info!("GEMINI_API_KEY not set, running the scripted demo");
            Arc::new(demo_model())
        }
    };
    info!(model = model.model_name(), "Financial Advisory Coordinator starting");

    let api = settings
        .financial_api_base_url
        .as_deref()
        .map(FinancialApiClient::new)
        .transpose()?;

    let host = SessionHost::assemble(
        model,
        api,
        settings.coordinator.clone(),
        Arc::new(InMemoryCheckpointStore::new()),
        Arc::new(AuditLog::new()),
    );

    let session_id = host.start_session().await?;
    info!(session_id = %session_id, message = %message, "Submitting turn");

    match host.submit_turn(session_id, &message, None).await {
        Ok(report) => {
            println!("\n=== TURN RESULT ===");
            println!("Session: {}", session_id);
            println!("Outcome: {:?}", report.outcome);
            println!(
                "Evaluations: {}  Worker steps: {}",
                report.evaluations, report.worker_steps
            );
            let phases: Vec<String> = report.phases.iter().map(|p| p.to_string()).collect();
            println!("Phases: {}", phases.join(" → "));
            println!();
            for event in &report.events {
                println!("[{}] {}", event.role, event.content);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Turn failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
