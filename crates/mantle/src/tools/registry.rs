//! Tool registry: registration, lookup, and per-tool usage statistics

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::outcome::Outcome;
use super::{Tool, ToolCategory, ToolDefinition};

/// Registration errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    Duplicate(String),
}

/// Running usage counters for one tool.
/// Never reset except on process restart.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageStats {
    /// Invocations whose body ran (or timed out trying)
    pub invocations: u64,
    /// All failures, including validation rejections
    pub failures: u64,
    /// Moving average duration over executed invocations
    pub avg_duration_ms: f64,
    samples: u64,
}

impl UsageStats {
    fn record(&mut self, outcome: &Outcome) {
        let ran = outcome.error_kind.map(|k| k.ran()).unwrap_or(true);
        if !outcome.success {
            self.failures += 1;
        }
        if !ran {
            // Rejected before execution: only the failure count moves.
            return;
        }
        self.invocations += 1;
        self.samples += 1;
        let d = outcome.duration_ms as f64;
        self.avg_duration_ms += (d - self.avg_duration_ms) / self.samples as f64;
    }
}

/// Registry of available tools, insertion-ordered
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
    stats: RwLock<HashMap<String, UsageStats>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
            stats: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool. Names are unique; duplicates are rejected.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    /// Register an already-shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Replace a tool, or register it if absent. The explicit overwrite path.
    pub fn replace<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, Arc::new(tool));
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// All tools in registration order
    pub fn list(&self) -> Vec<Arc<dyn Tool>> {
        self.order
            .iter()
            .filter_map(|n| self.tools.get(n).cloned())
            .collect()
    }

    /// Tools of one category, registration order preserved
    pub fn list_by_category(&self, category: ToolCategory) -> Vec<Arc<dyn Tool>> {
        self.list()
            .into_iter()
            .filter(|t| t.category() == category)
            .collect()
    }

    /// All registered tool names, registration order
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Planner-facing definitions: metadata only, never the handlers
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.list().iter().map(|t| t.to_definition()).collect()
    }

    /// Record an outcome against a tool's usage counters.
    /// No-op for unknown names; that should not occur in correct operation.
    pub fn record_usage(&self, name: &str, outcome: &Outcome) {
        if !self.tools.contains_key(name) {
            return;
        }
        let mut stats = self.stats.write();
        stats.entry(name.to_string()).or_default().record(outcome);
    }

    /// Snapshot of one tool's usage counters
    pub fn usage(&self, name: &str) -> Option<UsageStats> {
        self.stats.read().get(name).copied()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::outcome::ErrorKind;
    use crate::tools::{ParameterSchema, ToolContext, ToolResult};
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::Value;
    use uuid::Uuid;

    struct MockTool {
        name: &'static str,
        category: ToolCategory,
    }

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "a mock tool"
        }

        fn category(&self) -> ToolCategory {
            self.category
        }

        fn parameters_schema(&self) -> ParameterSchema {
            ParameterSchema::new()
        }

        async fn execute(&self, _args: &Value, _ctx: &ToolContext) -> Result<ToolResult> {
            Ok(ToolResult::success("mock output"))
        }
    }

    fn mock(name: &'static str, category: ToolCategory) -> MockTool {
        MockTool { name, category }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ToolRegistry::new();
        registry.register(mock("a", ToolCategory::File)).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get("a").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(mock("a", ToolCategory::File)).unwrap();

        let err = registry.register(mock("a", ToolCategory::System)).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(ref n) if n == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_replace_overwrites() {
        let mut registry = ToolRegistry::new();
        registry.register(mock("a", ToolCategory::File)).unwrap();
        registry.replace(mock("a", ToolCategory::System));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").unwrap().category(), ToolCategory::System);
    }

    #[test]
    fn test_insertion_order() {
        let mut registry = ToolRegistry::new();
        registry.register(mock("c", ToolCategory::File)).unwrap();
        registry.register(mock("a", ToolCategory::File)).unwrap();
        registry.register(mock("b", ToolCategory::System)).unwrap();

        let names: Vec<_> = registry.list().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_list_by_category_preserves_order() {
        let mut registry = ToolRegistry::new();
        registry.register(mock("c", ToolCategory::File)).unwrap();
        registry.register(mock("s", ToolCategory::System)).unwrap();
        registry.register(mock("a", ToolCategory::File)).unwrap();

        let files: Vec<_> = registry
            .list_by_category(ToolCategory::File)
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(files, vec!["c", "a"]);
    }

    #[test]
    fn test_round_trip_identity() {
        let mut registry = ToolRegistry::new();
        registry.register(mock("a", ToolCategory::File)).unwrap();

        let by_name = registry.get("a").unwrap();
        let by_list = registry.list().remove(0);
        let by_category = registry.list_by_category(ToolCategory::File).remove(0);

        assert!(Arc::ptr_eq(&by_name, &by_list));
        assert!(Arc::ptr_eq(&by_name, &by_category));
    }

    #[test]
    fn test_definitions_expose_metadata_only() {
        let mut registry = ToolRegistry::new();
        registry.register(mock("a", ToolCategory::File)).unwrap();

        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "a");
        assert_eq!(defs[0].category, ToolCategory::File);
    }

    #[test]
    fn test_usage_stats_success_and_failure() {
        let mut registry = ToolRegistry::new();
        registry.register(mock("a", ToolCategory::File)).unwrap();
        let task = Uuid::new_v4();

        let ok = Outcome::success(Uuid::new_v4(), task, "a", "out", Utc::now());
        registry.record_usage("a", &ok);

        let failed = Outcome::failure(
            Uuid::new_v4(),
            task,
            "a",
            ErrorKind::ExecutionFailed,
            "boom",
            Utc::now(),
        );
        registry.record_usage("a", &failed);

        let stats = registry.usage("a").unwrap();
        assert_eq!(stats.invocations, 2);
        assert_eq!(stats.failures, 1);
    }

    #[test]
    fn test_validation_failure_only_bumps_failures() {
        let mut registry = ToolRegistry::new();
        registry.register(mock("a", ToolCategory::File)).unwrap();
        let task = Uuid::new_v4();

        let ok = Outcome::success(Uuid::new_v4(), task, "a", "out", Utc::now());
        registry.record_usage("a", &ok);
        let avg_before = registry.usage("a").unwrap().avg_duration_ms;

        let rejected = Outcome::failure(
            Uuid::new_v4(),
            task,
            "a",
            ErrorKind::ValidationFailed,
            "bad args",
            Utc::now(),
        );
        registry.record_usage("a", &rejected);

        let stats = registry.usage("a").unwrap();
        assert_eq!(stats.invocations, 1);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.avg_duration_ms, avg_before);
    }

    #[test]
    fn test_record_usage_unknown_name_is_noop() {
        let registry = ToolRegistry::new();
        let outcome = Outcome::success(Uuid::new_v4(), Uuid::new_v4(), "ghost", "x", Utc::now());
        registry.record_usage("ghost", &outcome);
        assert!(registry.usage("ghost").is_none());
    }
}
