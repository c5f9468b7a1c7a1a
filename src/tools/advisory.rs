//! Financial advisory tool catalogue
//!
//! Without a configured data backend each tool synthesizes a descriptive
//! text result from its arguments. With `FINANCIAL_API_BASE_URL` set, every
//! call is forwarded to `POST {base}/api/v1/tools/{name}`.

use super::{ParamType, Tool, ToolRegistry, ToolSchema};
use crate::error::CoordinatorError;
use crate::Result;
use reqwest::Client;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// HTTP client for the financial data service
#[derive(Clone)]
pub struct FinancialApiClient {
    client: Client,
    base_url: String,
}

impl FinancialApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!("Financial API request failed for {}: {}", path, e);
                CoordinatorError::ToolError(format!(
                    "Financial API request failed for {}: {}",
                    path, e
                ))
            })?;

        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| CoordinatorError::ToolError(format!("Invalid JSON response: {}", e)))?;

        if !status.is_success() {
            return Err(CoordinatorError::ToolError(format!(
                "Financial API returned {} for {}: {}",
                status, path, body
            )));
        }

        Ok(body)
    }
}

type Render = fn(&Map<String, Value>) -> String;

/// A catalogue entry: fixed name, description and schema, with a local
/// text renderer used when no backend is configured
pub struct AdvisoryTool {
    tool_name: &'static str,
    tool_description: &'static str,
    schema: fn() -> ToolSchema,
    render: Render,
    api: Option<FinancialApiClient>,
}

#[async_trait::async_trait]
impl Tool for AdvisoryTool {
    fn name(&self) -> &'static str {
        self.tool_name
    }

    fn description(&self) -> &'static str {
        self.tool_description
    }

    fn schema(&self) -> ToolSchema {
        (self.schema)()
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String> {
        let Some(api) = &self.api else {
            return Ok((self.render)(arguments));
        };

        let path = format!("/api/v1/tools/{}", self.tool_name);
        let response = api.post_json(&path, &Value::Object(arguments.clone())).await?;

        Ok(match response {
            Value::String(text) => text,
            other => serde_json::to_string_pretty(&other)?,
        })
    }
}

fn text<'a>(args: &'a Map<String, Value>, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn list(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    })
}

fn pretty(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key)
        .filter(|v| !v.is_null())
        .map(|v| serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()))
}

const CATALOGUE: &[(&str, &str, fn() -> ToolSchema, Render)] = &[
    (
        "get_client_profile",
        "Retrieve comprehensive client profile including demographics, goals, risk profile, and holdings",
        || ToolSchema::new().required("client_id", ParamType::String, "Unique client identifier"),
        |a| format!(
            "Client profile data for {} retrieved. Includes demographics, goals, risk profile, and holdings.",
            text(a, "client_id")
        ),
    ),
    (
        "get_portfolio_data",
        "Retrieve portfolio data including positions, values, and performance metrics",
        || ToolSchema::new().required("portfolio_id", ParamType::String, "Portfolio identifier"),
        |a| format!(
            "Portfolio data for {} retrieved. Includes positions, current values, and performance metrics.",
            text(a, "portfolio_id")
        ),
    ),
    (
        "search_investment_solutions",
        "Search for investment solutions using structured data (performance, risk) and unstructured data (research reports)",
        || {
            ToolSchema::new()
                .required("search_criteria", ParamType::Object, "Search criteria (symbol, sector, type, etc.)")
                .optional("include_unstructured", ParamType::Boolean, "Include unstructured research data (default true)")
        },
        |a| format!(
            "Investment solutions search completed with criteria:\n{}\nUnstructured data included: {}\nResults retrieved from structured and research data sources.",
            pretty(a, "search_criteria").unwrap_or_default(),
            a.get("include_unstructured").and_then(Value::as_bool).unwrap_or(true)
        ),
    ),
    (
        "calculate_risk_metrics",
        "Calculate risk metrics (VaR, Sharpe, beta, standard deviation, max drawdown) for a portfolio",
        || {
            ToolSchema::new()
                .required("portfolio_id", ParamType::String, "Portfolio identifier")
                .string_list("risk_metrics", true, "Risk metrics to calculate (VaR, Sharpe, beta, etc.)")
                .optional("time_horizon", ParamType::String, "Time horizon for calculations (default 1Y)")
        },
        |a| format!(
            "Risk metrics calculated for portfolio {}:\nMetrics: {}\nTime horizon: {}\nResults computed using historical data.",
            text(a, "portfolio_id"),
            list(a, "risk_metrics").unwrap_or_default(),
            a.get("time_horizon").and_then(Value::as_str).unwrap_or("1Y")
        ),
    ),
    (
        "perform_stress_test",
        "Perform stress testing on portfolio for specific scenarios (2008 crisis, COVID-19, inflation shock, etc.)",
        || {
            ToolSchema::new()
                .required("portfolio_id", ParamType::String, "Portfolio identifier")
                .required("scenario", ParamType::String, "Scenario: 2008_crisis, covid19, inflation_shock, market_crash")
        },
        |a| format!(
            "Stress test completed for portfolio {}:\nScenario: {}\nResults show portfolio impact under stress conditions.",
            text(a, "portfolio_id"),
            text(a, "scenario")
        ),
    ),
    (
        "analyze_tax_impact",
        "Analyze tax implications of portfolio changes, tax-loss harvesting opportunities, and asset location optimization",
        || {
            ToolSchema::new()
                .required("client_id", ParamType::String, "Client identifier")
                .optional("portfolio_id", ParamType::String, "Specific portfolio to analyze")
                .required("analysis_type", ParamType::String, "Type: transition, harvesting, location_optimization")
        },
        |a| {
            let scope = a
                .get("portfolio_id")
                .and_then(Value::as_str)
                .map(|p| format!("portfolio {}", p))
                .unwrap_or_else(|| "all portfolios".to_string());
            format!(
                "Tax analysis completed for client {}, {}:\nAnalysis type: {}\nResults include capital gains/losses, tax efficiency, and optimization recommendations.",
                text(a, "client_id"),
                scope,
                text(a, "analysis_type")
            )
        },
    ),
    (
        "create_transition_plan",
        "Create step-by-step transition plan from current to target allocation, considering taxes, costs, and timing",
        || {
            ToolSchema::new()
                .required("portfolio_id", ParamType::String, "Source portfolio identifier")
                .required("target_allocation", ParamType::Object, "Target asset allocation percentages")
                .optional("constraints", ParamType::Object, "Constraints (tax, timing, etc.)")
        },
        |a| format!(
            "Transition plan created for portfolio {}:\nTarget allocation:\n{}\nConstraints:\n{}\nPlan includes sequenced trades and cost estimates.",
            text(a, "portfolio_id"),
            pretty(a, "target_allocation").unwrap_or_default(),
            pretty(a, "constraints").unwrap_or_else(|| "None".to_string())
        ),
    ),
    (
        "generate_portfolio_report",
        "Generate customized client reports (detailed, executive summary, or one-pager) with performance and recommendations",
        || {
            ToolSchema::new()
                .required("client_id", ParamType::String, "Client identifier")
                .required("report_type", ParamType::String, "Report type: detailed, executive, one_pager")
                .string_list("portfolio_ids", false, "Specific portfolios to include")
        },
        |a| format!(
            "Report generated for client {}:\nReport type: {}\nPortfolios included: {}\nReport includes performance, allocation, risk metrics, and recommendations.",
            text(a, "client_id"),
            text(a, "report_type"),
            list(a, "portfolio_ids")
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "all portfolios".to_string())
        ),
    ),
    (
        "execute_account_operation",
        "Execute account operations: open new accounts, consolidate accounts, transfer assets, execute rollovers",
        || {
            ToolSchema::new()
                .required("operation_type", ParamType::String, "Operation: open, consolidate, transfer, rollover")
                .required("client_id", ParamType::String, "Client identifier")
                .required("account_details", ParamType::Object, "Account details for the operation")
        },
        |a| format!(
            "Account operation executed:\nOperation: {}\nClient: {}\nDetails:\n{}\nOperation completed and documented in system.",
            text(a, "operation_type"),
            text(a, "client_id"),
            pretty(a, "account_details").unwrap_or_default()
        ),
    ),
    (
        "get_market_data",
        "Retrieve market data for securities (prices, performance, risk metrics, fundamentals)",
        || {
            ToolSchema::new()
                .string_list("symbols", true, "Security symbols")
                .optional("data_type", ParamType::String, "Data type: prices, performance, risk_metrics, fundamentals (default prices)")
        },
        |a| format!(
            "Market data retrieved for symbols: {}\nData type: {}\nData fetched from market data providers.",
            list(a, "symbols").unwrap_or_default(),
            a.get("data_type").and_then(Value::as_str).unwrap_or("prices")
        ),
    ),
    (
        "calculate_portfolio_allocation",
        "Calculate current asset allocation breakdown for a portfolio",
        || ToolSchema::new().required("portfolio_id", ParamType::String, "Portfolio identifier"),
        |a| format!(
            "Asset allocation calculated for portfolio {}:\nAllocation breakdown by asset class, sector, and geography.",
            text(a, "portfolio_id")
        ),
    ),
    (
        "validate_compliance",
        "Validate portfolio compliance with investment policy statements, regulations, and firm policies",
        || {
            ToolSchema::new()
                .required("client_id", ParamType::String, "Client identifier")
                .required("portfolio_id", ParamType::String, "Portfolio identifier")
        },
        |a| format!(
            "Compliance validation completed for client {}, portfolio {}:\nChecked against IPS, regulatory restrictions, and firm policies.",
            text(a, "client_id"),
            text(a, "portfolio_id")
        ),
    ),
];

/// Create the registry holding the twelve advisory tools.
pub fn create_default_registry(api: Option<FinancialApiClient>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    for &(tool_name, tool_description, schema, render) in CATALOGUE {
        registry.register(Arc::new(AdvisoryTool {
            tool_name,
            tool_description,
            schema,
            render,
            api: api.clone(),
        }));
    }

    match &api {
        Some(api) => info!(base_url = %api.base_url(), "Advisory tools backed by financial API"),
        None => info!("Advisory tools running with local synthesis"),
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_optional_defaults_rendered() {
        let registry = create_default_registry(None);

        let text = registry
            .invoke(
                "calculate_risk_metrics",
                &json!({"portfolio_id": "PORT-001", "risk_metrics": ["VaR", "Sharpe"]}),
            )
            .await
            .unwrap();
        assert!(text.contains("VaR, Sharpe"));
        assert!(text.contains("Time horizon: 1Y"));

        let text = registry
            .invoke("analyze_tax_impact", &json!({"client_id": "C1", "analysis_type": "harvesting"}))
            .await
            .unwrap();
        assert!(text.contains("all portfolios"));
    }

    #[tokio::test]
    async fn test_object_argument_as_string() {
        let registry = create_default_registry(None);
        let text = registry
            .invoke(
                "create_transition_plan",
                &json!({
                    "portfolio_id": "PORT-001",
                    "target_allocation": "{\"equities\": 60, \"bonds\": 40}"
                }),
            )
            .await
            .unwrap();
        assert!(text.contains("\"equities\": 60"));
        assert!(text.contains("Constraints:\nNone"));
    }

    #[test]
    fn test_catalogue_names_unique() {
        let registry = create_default_registry(None);
        assert_eq!(registry.len(), CATALOGUE.len());
    }
}
