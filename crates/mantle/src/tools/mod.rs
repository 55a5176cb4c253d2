//! Tool framework for the agent runtime
//!
//! A tool is a named, schema-validated capability the agent may invoke.
//! The dispatcher in [`dispatch`] governs when and how many run.

pub mod builtin;
pub mod dispatch;
pub mod outcome;
pub mod registry;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use uuid::Uuid;

/// Category of a tool, used for listing and timeout defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    System,
    File,
    Network,
    Data,
    Code,
    External,
    Custom,
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ToolCategory::System => "system",
            ToolCategory::File => "file",
            ToolCategory::Network => "network",
            ToolCategory::Data => "data",
            ToolCategory::Code => "code",
            ToolCategory::External => "external",
            ToolCategory::Custom => "custom",
        };
        write!(f, "{}", s)
    }
}

/// Errors a tool may raise that the dispatcher classifies specially
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Access-control rejection, e.g. a path outside the allow-list
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

/// Result of tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,
    /// Output from the tool
    pub output: String,
    /// Error message if failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    /// Create a failed result
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Create a failed result with output
    pub fn failure(output: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            error: Some(error.into()),
        }
    }
}

/// Per-invocation context, created by the dispatcher and read-only to tools
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Task this invocation belongs to
    pub task_id: Uuid,
    /// User on whose behalf the task runs
    pub user_id: Option<String>,
    /// Filesystem allow-list; None means unrestricted.
    /// Enforcement is the tool's responsibility, not the dispatcher's.
    pub allowed_paths: Option<Vec<PathBuf>>,
    /// Working directory for relative paths
    pub working_dir: PathBuf,
    /// Maximum output length (truncate if exceeded)
    pub max_output_len: usize,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            task_id: Uuid::new_v4(),
            user_id: None,
            allowed_paths: None,
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            max_output_len: 50000,
        }
    }
}

impl ToolContext {
    /// Create a new context for the given task
    pub fn new(task_id: Uuid) -> Self {
        Self {
            task_id,
            ..Default::default()
        }
    }

    /// Set the user
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the filesystem allow-list
    pub fn with_allowed_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.allowed_paths = Some(paths);
        self
    }

    /// Set the working directory
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }
}

/// Schema for a tool parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterProperty {
    /// Parameter type (string, number, boolean, array, object)
    #[serde(rename = "type")]
    pub param_type: String,
    /// Parameter description
    pub description: String,
    /// Enum values if applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    /// Default value if applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterProperty {
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            param_type: "string".to_string(),
            description: description.into(),
            enum_values: None,
            default: None,
        }
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self {
            param_type: "number".to_string(),
            description: description.into(),
            enum_values: None,
            default: None,
        }
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self {
            param_type: "boolean".to_string(),
            description: description.into(),
            enum_values: None,
            default: None,
        }
    }

    pub fn array(description: impl Into<String>) -> Self {
        Self {
            param_type: "array".to_string(),
            description: description.into(),
            enum_values: None,
            default: None,
        }
    }

    pub fn object(description: impl Into<String>) -> Self {
        Self {
            param_type: "object".to_string(),
            description: description.into(),
            enum_values: None,
            default: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_enum(mut self, values: Vec<String>) -> Self {
        self.enum_values = Some(values);
        self
    }

    /// Check a value against this property's declared type
    fn matches_type(&self, value: &Value) -> bool {
        match self.param_type.as_str() {
            "string" => value.is_string(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            _ => true,
        }
    }
}

/// Schema describing tool parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Type is always "object"
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Parameter properties
    pub properties: std::collections::HashMap<String, ParameterProperty>,
    /// Required parameter names
    #[serde(default)]
    pub required: Vec<String>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: std::collections::HashMap::new(),
            required: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, prop: ParameterProperty) -> Self {
        self.properties.insert(name.into(), prop);
        self
    }

    pub fn with_required(mut self, name: impl Into<String>, prop: ParameterProperty) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), prop);
        self.required.push(name);
        self
    }

    /// Validate raw arguments against this schema.
    ///
    /// Checks required fields, declared types, and enum membership.
    /// Unknown fields are tolerated. Returns the list of violations.
    pub fn validate(&self, args: &Value) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let obj = match args {
            Value::Object(map) => Some(map),
            Value::Null => None,
            _ => {
                return Err(vec![format!(
                    "arguments must be an object, got {}",
                    json_type_name(args)
                )])
            }
        };

        for name in &self.required {
            let present = obj.map(|m| m.contains_key(name)).unwrap_or(false);
            if !present {
                errors.push(format!("missing required parameter: {}", name));
            }
        }

        if let Some(map) = obj {
            for (name, value) in map {
                let Some(prop) = self.properties.get(name) else {
                    continue;
                };
                if value.is_null() {
                    continue;
                }
                if !prop.matches_type(value) {
                    errors.push(format!(
                        "parameter {} expects {}, got {}",
                        name,
                        prop.param_type,
                        json_type_name(value)
                    ));
                    continue;
                }
                if let (Some(allowed), Some(s)) = (&prop.enum_values, value.as_str()) {
                    if !allowed.iter().any(|a| a == s) {
                        errors.push(format!(
                            "parameter {} must be one of [{}]",
                            name,
                            allowed.join(", ")
                        ));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::new()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Planner-facing description of a tool: metadata only, never the handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub parameters: ParameterSchema,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: ToolCategory,
        parameters: ParameterSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category,
            parameters,
        }
    }
}

/// A requested invocation: tool name plus raw arguments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// The Tool trait that all capabilities implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool name
    fn name(&self) -> &str;

    /// Get a description of what the tool does
    fn description(&self) -> &str;

    /// Get the category
    fn category(&self) -> ToolCategory;

    /// Get the parameter schema
    fn parameters_schema(&self) -> ParameterSchema;

    /// Execute the tool with the given arguments
    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<ToolResult>;

    /// Convert to a planner-facing definition
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.name(),
            self.description(),
            self.category(),
            self.parameters_schema(),
        )
    }
}
