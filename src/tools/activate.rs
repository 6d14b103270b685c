//! Activate skills tool
//!
//! Lets the model load skills into its session. The result carries the
//! instructions of every active skill.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::traits::{parse_args, Tool, ToolResult};
use super::{skill_ref_schema, SessionBinding, SkillRef};
use crate::catalog::SkillFilter;
use crate::core::context::Context;
use crate::error::Result;
use crate::prompt::PromptSection;
use crate::runtime::SkillRuntime;
use crate::session::ActivationMode;

#[derive(Debug, Deserialize)]
struct ActivateArgs {
    skills: Vec<SkillRef>,
    #[serde(default)]
    mode: Option<String>,
}

/// Built-in tool: activate skills
pub struct ActivateSkillsTool {
    binding: SessionBinding,
}

impl ActivateSkillsTool {
    pub fn new(runtime: Arc<SkillRuntime>, session_id: impl Into<String>) -> Self {
        ActivateSkillsTool {
            binding: SessionBinding::new(runtime, session_id.into()),
        }
    }

    async fn activate(&self, ctx: &Context, args: Value) -> Result<ToolResult> {
        let args: ActivateArgs = parse_args(args)?;
        let mode: ActivationMode = args.mode.as_deref().unwrap_or_default().parse()?;
        let handles: Vec<_> = args.skills.iter().map(SkillRef::handle).collect();

        let runtime = self.binding.runtime();
        let active = runtime
            .activate_handles(ctx, self.binding.session_id(), &handles, mode)
            .await?;
        debug!(session = %self.binding.session_id(), active = active.len(), "Skills activated by tool");

        let content = runtime
            .render_prompt(
                ctx,
                Some(self.binding.session_id()),
                &SkillFilter::all(),
                PromptSection::Active,
            )
            .await?;
        Ok(ToolResult::success_with_metadata(
            content,
            serde_json::json!({ "active": active }),
        ))
    }
}

#[async_trait]
impl Tool for ActivateSkillsTool {
    fn name(&self) -> &str {
        "activate_skills"
    }

    fn description(&self) -> &str {
        "Activate skills from <available_skills> and receive their full instructions. \
         Mode 'replace' (default) makes the request the whole active set; 'add' keeps the current skills."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "skills": {
                    "type": "array",
                    "description": "Skills to activate",
                    "items": {
                        "type": "object",
                        "properties": skill_ref_schema(),
                        "required": ["name", "location"]
                    }
                },
                "mode": {
                    "type": "string",
                    "enum": ["replace", "add"],
                    "description": "How the request combines with active skills"
                }
            },
            "required": ["skills"]
        })
    }

    async fn execute(&self, ctx: &Context, args: Value) -> Result<ToolResult> {
        match self.activate(ctx, args).await {
            Ok(result) => Ok(result),
            Err(e) => ToolResult::from_error(e),
        }
    }
}
