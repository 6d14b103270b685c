//! Tool registry - manages the tools offered to the LLM

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::context::Context;
use crate::error::Result;
use crate::runtime::SkillRuntime;

use super::activate::ActivateSkillsTool;
use super::resource::ReadSkillResourceTool;
use super::script::RunSkillScriptTool;
use super::traits::{Tool, ToolCall, ToolDefinition, ToolResult};

/// Registry of available tools
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        ToolRegistry {
            tools: HashMap::new(),
        }
    }

    /// Registry holding the skill tools bound to one session
    pub fn for_session(runtime: Arc<SkillRuntime>, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        let mut registry = Self::new();
        registry.register(ActivateSkillsTool::new(Arc::clone(&runtime), session_id.clone()));
        registry.register(ReadSkillResourceTool::new(Arc::clone(&runtime), session_id.clone()));
        registry.register(RunSkillScriptTool::new(runtime, session_id));
        registry
    }

    /// Register a tool, replacing any tool of the same name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Tool definitions, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.to_definition()).collect();
        definitions.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        definitions
    }

    /// Execute a tool call
    pub async fn execute(&self, ctx: &Context, call: &ToolCall) -> Result<ToolResult> {
        match self.get(&call.name) {
            Some(tool) => tool.execute(ctx, call.arguments.clone()).await,
            None => Ok(ToolResult::failure(format!(
                "Unknown tool: {}",
                call.name
            ))),
        }
    }

    /// Get tool count
    pub fn count(&self) -> usize {
        self.tools.len()
    }

    /// Tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::Error;

    #[test]
    fn test_tool_result() {
        let success = ToolResult::success("Done!");
        assert!(success.success);
        assert_eq!(success.to_llm_string(), "Done!");

        let failure = ToolResult::failure("Oops!");
        assert!(!failure.success);
        assert_eq!(failure.to_llm_string(), "Error: Oops!");

        let client = ToolResult::from_error(Error::SkillNotFound("pdf".to_string())).unwrap();
        assert!(!client.success);
        assert!(ToolResult::from_error(Error::Cancelled).is_err());
    }

    #[tokio::test]
    async fn test_session_registry() {
        let runtime = Arc::new(SkillRuntime::new(RuntimeConfig::default()).unwrap());
        let registry = ToolRegistry::for_session(runtime, "session-1");

        assert_eq!(registry.count(), 3);
        assert_eq!(
            registry.names(),
            vec!["activate_skills", "read_skill_resource", "run_skill_script"]
        );
        let definitions = registry.definitions();
        assert_eq!(definitions[0].tool_type, "function");
        assert_eq!(definitions[0].function.parameters["type"], "object");

        let result = registry
            .execute(
                &Context::background(),
                &ToolCall {
                    id: "call-1".to_string(),
                    name: "browse".to_string(),
                    arguments: serde_json::json!({}),
                },
            )
            .await
            .unwrap();
        assert!(!result.success);
    }
}
