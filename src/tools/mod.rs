//! Tools module - Skill tools for LLM function calling
//!
//! Each tool implements the `Tool` trait and is bound to one session of a
//! [`SkillRuntime`]. The model names skills by handle (`name` + `location`)
//! exactly as they appear in the rendered prompt.
//!
//! ## Built-in Tools
//!
//! - **activate_skills**: Activate skills and receive their instructions
//! - **read_skill_resource**: Read a file shipped with an active skill
//! - **run_skill_script**: Run a script shipped with an active skill

mod activate;
mod registry;
mod resource;
mod script;
mod traits;

// Core trait and types
pub use traits::{FunctionDefinition, Tool, ToolCall, ToolDefinition, ToolResult};

// Registry
pub use registry::ToolRegistry;

// Built-in tools
pub use activate::ActivateSkillsTool;
pub use resource::ReadSkillResourceTool;
pub use script::RunSkillScriptTool;

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::core::context::Context;
use crate::core::types::SkillHandle;
use crate::error::{Error, Result};
use crate::runtime::SkillRuntime;

/// Skill reference as sent by the model
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SkillRef {
    pub name: String,
    pub location: String,
}

impl SkillRef {
    fn handle(&self) -> SkillHandle {
        SkillHandle::new(self.name.as_str(), self.location.as_str())
    }
}

/// JSON schema properties for a skill reference
pub(crate) fn skill_ref_schema() -> Value {
    serde_json::json!({
        "name": {
            "type": "string",
            "description": "Skill name exactly as listed in <available_skills>"
        },
        "location": {
            "type": "string",
            "description": "Skill location exactly as listed in <available_skills>"
        }
    })
}

/// Runtime and session shared by the skill tools
#[derive(Clone)]
pub(crate) struct SessionBinding {
    runtime: Arc<SkillRuntime>,
    session_id: String,
}

impl SessionBinding {
    fn new(runtime: Arc<SkillRuntime>, session_id: String) -> Self {
        SessionBinding { runtime, session_id }
    }

    fn runtime(&self) -> &SkillRuntime {
        &self.runtime
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Resolve a skill reference that must be active in the session
    async fn active_handle(&self, ctx: &Context, skill: &SkillRef) -> Result<SkillHandle> {
        ctx.check()?;
        let handle = skill.handle();
        let session = self.runtime.session(&self.session_id).await?;
        let key = self.runtime.catalog().resolve_handle(&handle)?;
        if !session.is_active(&key) {
            return Err(Error::SkillNotActive(format!(
                "{} (activate it with activate_skills first)",
                handle.trimmed()
            )));
        }
        Ok(handle)
    }
}
