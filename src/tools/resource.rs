//! Read skill resource tool

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::traits::{parse_args, Tool, ToolResult};
use super::{skill_ref_schema, SessionBinding, SkillRef};
use crate::core::context::Context;
use crate::core::types::ResourceEncoding;
use crate::error::Result;
use crate::runtime::SkillRuntime;

#[derive(Debug, Deserialize)]
struct ReadResourceArgs {
    #[serde(flatten)]
    skill: SkillRef,
    path: String,
    #[serde(default)]
    encoding: Option<String>,
}

/// Built-in tool: read a file shipped with an active skill
pub struct ReadSkillResourceTool {
    binding: SessionBinding,
}

impl ReadSkillResourceTool {
    pub fn new(runtime: Arc<SkillRuntime>, session_id: impl Into<String>) -> Self {
        ReadSkillResourceTool {
            binding: SessionBinding::new(runtime, session_id.into()),
        }
    }

    async fn read(&self, ctx: &Context, args: Value) -> Result<ToolResult> {
        let args: ReadResourceArgs = parse_args(args)?;
        let encoding: ResourceEncoding = match args.encoding.as_deref() {
            Some(encoding) => encoding.parse()?,
            None => ResourceEncoding::Utf8,
        };
        let handle = self.binding.active_handle(ctx, &args.skill).await?;

        let resource = self
            .binding
            .runtime()
            .read_resource(ctx, &handle, &args.path, encoding)
            .await?;
        let metadata = serde_json::json!({
            "encoding": resource.encoding,
            "bytes": resource.bytes,
            "truncated": resource.truncated,
        });
        Ok(ToolResult::success_with_metadata(resource.content, metadata))
    }
}

#[async_trait]
impl Tool for ReadSkillResourceTool {
    fn name(&self) -> &str {
        "read_skill_resource"
    }

    fn description(&self) -> &str {
        "Read a file that ships with an active skill, by path relative to the skill"
    }

    fn parameters_schema(&self) -> Value {
        let mut properties = skill_ref_schema();
        properties["path"] = serde_json::json!({
            "type": "string",
            "description": "Path of the file relative to the skill (e.g. reference/forms.md)"
        });
        properties["encoding"] = serde_json::json!({
            "type": "string",
            "enum": ["utf8", "base64"],
            "description": "Use base64 for binary files"
        });
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": ["name", "location", "path"]
        })
    }

    async fn execute(&self, ctx: &Context, args: Value) -> Result<ToolResult> {
        match self.read(ctx, args).await {
            Ok(result) => Ok(result),
            Err(e) => ToolResult::from_error(e),
        }
    }
}
