//! Tool parameter schemas and argument validation

use crate::error::CoordinatorError;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    pub description: String,
    /// Element type for arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ParamType>,
}

/// Field name → spec mapping for one tool (or structured model output)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ToolSchema {
    fields: BTreeMap<String, ParamSpec>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    fn field(mut self, name: &str, param_type: ParamType, required: bool, description: &str) -> Self {
        self.fields.insert(
            name.to_string(),
            ParamSpec {
                param_type,
                required,
                description: description.to_string(),
                items: None,
            },
        );
        self
    }

    pub fn required(self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.field(name, param_type, true, description)
    }

    pub fn optional(self, name: &str, param_type: ParamType, description: &str) -> Self {
        self.field(name, param_type, false, description)
    }

    pub fn string_list(mut self, name: &str, required: bool, description: &str) -> Self {
        self = self.field(name, ParamType::Array, required, description);
        if let Some(spec) = self.fields.get_mut(name) {
            spec.items = Some(ParamType::String);
        }
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &ParamSpec)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.fields.get(name)
    }

    /// Check field presence and types.
    ///
    /// Object fields also accept a string holding a JSON object; such values
    /// are replaced by the parsed object. Unknown fields pass through.
    pub fn validate(&self, tool: &str, arguments: &Value) -> Result<Map<String, Value>> {
        let mut args = match arguments {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(CoordinatorError::InvalidArguments(format!(
                    "{}: arguments must be a JSON object, got {}",
                    tool, other
                )))
            }
        };

        for (name, spec) in &self.fields {
            let value = match args.get_mut(name) {
                Some(Value::Null) | None => {
                    if spec.required {
                        return Err(CoordinatorError::InvalidArguments(format!(
                            "{}: missing required field '{}'",
                            tool, name
                        )));
                    }
                    continue;
                }
                Some(value) => value,
            };

            if spec.param_type == ParamType::Object {
                let parsed = value
                    .as_str()
                    .and_then(|raw| serde_json::from_str::<Value>(raw).ok())
                    .filter(Value::is_object);
                if let Some(parsed) = parsed {
                    *value = parsed;
                }
            }

            if !spec.param_type.matches(value) {
                return Err(CoordinatorError::InvalidArguments(format!(
                    "{}: field '{}' must be of type {:?}",
                    tool, name, spec.param_type
                )));
            }

            if let (Some(item_type), Value::Array(items)) = (spec.items, &*value) {
                if items.iter().any(|item| !item_type.matches(item)) {
                    return Err(CoordinatorError::InvalidArguments(format!(
                        "{}: every element of '{}' must be of type {:?}",
                        tool, name, item_type
                    )));
                }
            }
        }

        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn risk_schema() -> ToolSchema {
        ToolSchema::new()
            .required("portfolio_id", ParamType::String, "Portfolio identifier")
            .string_list("risk_metrics", true, "Metrics to calculate")
            .optional("time_horizon", ParamType::String, "Horizon")
            .optional("constraints", ParamType::Object, "Constraints")
    }

    #[test]
    fn test_missing_required_field() {
        let err = risk_schema()
            .validate("calculate_risk_metrics", &json!({"risk_metrics": ["VaR"]}))
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidArguments(_)));
        assert!(err.to_string().contains("portfolio_id"));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let err = risk_schema()
            .validate(
                "calculate_risk_metrics",
                &json!({"portfolio_id": 7, "risk_metrics": ["VaR"]}),
            )
            .unwrap_err();
        assert!(err.to_string().contains("portfolio_id"));

        let err = risk_schema()
            .validate(
                "calculate_risk_metrics",
                &json!({"portfolio_id": "P1", "risk_metrics": ["VaR", 3]}),
            )
            .unwrap_err();
        assert!(err.to_string().contains("risk_metrics"));
    }

    #[test]
    fn test_optional_fields_may_be_absent_or_null() {
        let args = risk_schema()
            .validate(
                "calculate_risk_metrics",
                &json!({"portfolio_id": "P1", "risk_metrics": [], "time_horizon": null}),
            )
            .unwrap();
        assert_eq!(args["portfolio_id"], "P1");
    }

    #[test]
    fn test_object_field_coerced_from_string() {
        let args = risk_schema()
            .validate(
                "calculate_risk_metrics",
                &json!({
                    "portfolio_id": "P1",
                    "risk_metrics": ["beta"],
                    "constraints": "{\"max_turnover\": 0.2}"
                }),
            )
            .unwrap();
        assert_eq!(args["constraints"]["max_turnover"], json!(0.2));
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        assert!(risk_schema().validate("t", &json!(["P1"])).is_err());
    }

    #[test]
    fn test_descriptor_serialization() {
        let value = serde_json::to_value(risk_schema()).unwrap();
        assert_eq!(value["portfolio_id"]["type"], "string");
        assert_eq!(value["portfolio_id"]["required"], true);
        assert_eq!(value["risk_metrics"]["items"], "string");
    }
}
