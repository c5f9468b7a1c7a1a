//! Gemini API client
//!
//! Implements `ChatModel` over `generateContent`, including function calling
//! for tool use and JSON-schema constrained output for structured verdicts.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::CoordinatorError;
use crate::llm::{ChatModel, ModelReply, ModelRequest, ResponseFormat};
use crate::models::{Message, Role, ToolCallRequest};
use crate::tools::{ParamType, ToolDescriptor, ToolSchema};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: &str) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: model.to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: ModelRequest) -> crate::Result<ModelReply> {
        if self.api_key.is_empty() {
            return Err(CoordinatorError::ConfigError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let body = build_request(&request);

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Calling Gemini API"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                CoordinatorError::AgentFailure(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response ({}): {}", status, error_text);
            return Err(CoordinatorError::AgentFailure(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            CoordinatorError::AgentFailure(format!("Gemini parse error: {}", e))
        })?;

        let reply = into_reply(gemini_response)?;

        info!(
            model = %self.model,
            tool_calls = reply.tool_calls.len(),
            "Gemini response received"
        );

        Ok(reply)
    }
}

//
// ================= Wire Types =================
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDeclarations>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclarations {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

//
// ================= Conversions =================
//

fn gemini_type(param_type: ParamType) -> &'static str {
    match param_type {
        ParamType::String => "STRING",
        ParamType::Number => "NUMBER",
        ParamType::Integer => "INTEGER",
        ParamType::Boolean => "BOOLEAN",
        ParamType::Array => "ARRAY",
        ParamType::Object => "OBJECT",
    }
}

/// OpenAPI-subset schema for a field map. Free-form objects are declared as
/// JSON-encoded strings since Gemini rejects OBJECT without properties; the
/// registry's validation parses them back.
fn schema_to_gemini(schema: &ToolSchema) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for (name, spec) in schema.fields() {
        let property = match spec.param_type {
            ParamType::Object => json!({
                "type": "STRING",
                "description": format!("{} (JSON-encoded object)", spec.description),
            }),
            ParamType::Array => json!({
                "type": "ARRAY",
                "description": spec.description,
                "items": { "type": gemini_type(spec.items.unwrap_or(ParamType::String)) },
            }),
            other => json!({
                "type": gemini_type(other),
                "description": spec.description,
            }),
        };
        properties.insert(name.to_string(), property);
        if spec.required {
            required.push(Value::String(name.to_string()));
        }
    }

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
    })
}

fn declaration(tool: &ToolDescriptor) -> FunctionDeclaration {
    FunctionDeclaration {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: schema_to_gemini(&tool.parameter_schema),
    }
}

fn text_part(text: impl Into<String>) -> Part {
    Part {
        text: Some(text.into()),
        ..Default::default()
    }
}

fn message_to_content(message: &Message) -> Content {
    match message.role {
        Role::User => Content {
            role: Some("user".to_string()),
            parts: vec![text_part(&message.content)],
        },
        Role::System => Content {
            role: Some("user".to_string()),
            parts: vec![text_part(format!("System note: {}", message.content))],
        },
        Role::Assistant => {
            let mut parts = Vec::new();
            if !message.content.is_empty() {
                parts.push(text_part(&message.content));
            }
            for call in &message.tool_calls {
                parts.push(Part {
                    function_call: Some(FunctionCall {
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    }),
                    ..Default::default()
                });
            }
            Content {
                role: Some("model".to_string()),
                parts,
            }
        }
        Role::Tool => Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                function_response: Some(FunctionResponse {
                    name: message.tool_name.clone().unwrap_or_default(),
                    response: json!({ "content": message.content }),
                }),
                ..Default::default()
            }],
        },
    }
}

/// Adjacent contents with the same role are merged so a batch of function
/// responses answers its function calls in a single turn.
fn build_contents(messages: &[Message]) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::with_capacity(messages.len());

    for message in messages {
        let content = message_to_content(message);
        if content.parts.is_empty() {
            continue;
        }
        match contents.last_mut() {
            Some(last) if last.role == content.role => last.parts.extend(content.parts),
            _ => contents.push(content),
        }
    }

    contents
}

fn build_request(request: &ModelRequest) -> GeminiRequest {
    let (response_mime_type, response_schema) = match &request.response_format {
        ResponseFormat::Text => (None, None),
        ResponseFormat::Json(schema) => (
            Some("application/json".to_string()),
            Some(schema_to_gemini(schema)),
        ),
    };

    let tools = if request.tools.is_empty() {
        Vec::new()
    } else {
        vec![ToolDeclarations {
            function_declarations: request.tools.iter().map(declaration).collect(),
        }]
    };

    GeminiRequest {
        contents: build_contents(&request.messages),
        system_instruction: request.system.as_ref().map(|system| Content {
            role: None,
            parts: vec![text_part(system)],
        }),
        tools,
        generation_config: GenerationConfig {
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 2048,
            response_mime_type,
            response_schema,
        },
    }
}

fn into_reply(response: GeminiResponse) -> crate::Result<ModelReply> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| CoordinatorError::AgentFailure("No response from Gemini API".to_string()))?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if reason != "STOP" {
            debug!(finish_reason = %reason, "Gemini finished early");
        }
    }

    let mut reply = ModelReply::default();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(text) = part.text {
            reply.content.push_str(&text);
        }
        if let Some(call) = part.function_call {
            let arguments = if call.args.is_null() { json!({}) } else { call.args };
            reply.tool_calls.push(ToolCallRequest::new(call.name, arguments));
        }
    }

    if reply.is_empty() {
        return Err(CoordinatorError::AgentFailure(
            "Empty response from Gemini".to_string(),
        ));
    }

    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::create_default_registry;

    #[test]
    fn test_request_serialization() {
        let request = ModelRequest::new(
            Some("You are the coordinator".to_string()),
            vec![Message::user("Help me construct a portfolio for client 12345")],
        )
        .with_tools(create_default_registry(None).list_schemas());

        let json = serde_json::to_value(build_request(&request)).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "You are the coordinator");
        let declarations = json["tools"][0]["functionDeclarations"].as_array().unwrap();
        assert_eq!(declarations.len(), 12);
        assert!(json["generationConfig"].get("responseSchema").is_none());
    }

    #[test]
    fn test_object_params_declared_as_strings() {
        let schema = ToolSchema::new()
            .required("target_allocation", ParamType::Object, "Target weights")
            .string_list("symbols", false, "Tickers");
        let value = schema_to_gemini(&schema);

        assert_eq!(value["properties"]["target_allocation"]["type"], "STRING");
        assert_eq!(value["properties"]["symbols"]["items"]["type"], "STRING");
        assert_eq!(value["required"], json!(["target_allocation"]));
    }

    #[test]
    fn test_tool_round_merges_function_responses() {
        let call_a = ToolCallRequest::new("get_client_profile", json!({"client_id": "1"}));
        let call_b = ToolCallRequest::new("get_portfolio_data", json!({"portfolio_id": "P"}));
        let messages = vec![
            Message::user("go"),
            Message::assistant_with_tools("", vec![call_a.clone(), call_b.clone()]),
            crate::models::ToolResult {
                call_id: call_a.id,
                tool_name: call_a.name,
                content: "a".into(),
                is_error: false,
            }
            .into_message(),
            crate::models::ToolResult {
                call_id: call_b.id,
                tool_name: call_b.name,
                content: "b".into(),
                is_error: false,
            }
            .into_message(),
        ];

        let contents = build_contents(&messages);
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1].role.as_deref(), Some("model"));
        assert_eq!(contents[1].parts.len(), 2);
        assert_eq!(contents[2].parts.len(), 2);
    }

    #[test]
    fn test_structured_output_config() {
        let schema = ToolSchema::new().required("feedback", ParamType::String, "Feedback");
        let request = ModelRequest::new(None, vec![Message::user("judge")])
            .with_format(ResponseFormat::Json(schema));
        let json = serde_json::to_value(build_request(&request)).unwrap();

        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(json["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn test_response_with_function_call() {
        let raw = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Fetching the profile."},
                        {"functionCall": {"name": "get_client_profile", "args": {"client_id": "12345"}}}
                    ]
                },
                "finishReason": "STOP"
            }]
        });
        let response: GeminiResponse = serde_json::from_value(raw).unwrap();
        let reply = into_reply(response).unwrap();

        assert_eq!(reply.content, "Fetching the profile.");
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].arguments["client_id"], "12345");
    }

    #[test]
    fn test_empty_candidates_is_agent_failure() {
        let response: GeminiResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(into_reply(response).unwrap_err().is_agent_failure());
    }
}
