//! Run skill script tool

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::traits::{parse_args, Tool, ToolResult};
use super::{skill_ref_schema, SessionBinding, SkillRef};
use crate::core::context::Context;
use crate::core::types::{ScriptOutput, ScriptRequest};
use crate::error::{ErrorKind, Result};
use crate::runtime::SkillRuntime;

#[derive(Debug, Deserialize)]
struct RunScriptArgs {
    #[serde(flatten)]
    skill: SkillRef,
    script: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    workdir: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

/// Built-in tool: run a script shipped with an active skill
pub struct RunSkillScriptTool {
    binding: SessionBinding,
}

impl RunSkillScriptTool {
    pub fn new(runtime: Arc<SkillRuntime>, session_id: impl Into<String>) -> Self {
        RunSkillScriptTool {
            binding: SessionBinding::new(runtime, session_id.into()),
        }
    }

    async fn run(&self, ctx: &Context, args: Value) -> Result<ToolResult> {
        let args: RunScriptArgs = parse_args(args)?;
        let handle = self.binding.active_handle(ctx, &args.skill).await?;

        let mut request = ScriptRequest::new(args.script.as_str()).with_args(args.args);
        request.workdir = args.workdir;
        request.timeout = args.timeout_secs.map(Duration::from_secs);

        let output = self
            .binding
            .runtime()
            .run_script(ctx, &handle, &request)
            .await?;
        Ok(to_result(&args.script, output))
    }
}

fn to_result(script: &str, output: ScriptOutput) -> ToolResult {
    let mut content = String::new();
    if !output.stdout.is_empty() {
        content.push_str("STDOUT:\n");
        content.push_str(&output.stdout);
        if output.truncated_stdout {
            content.push_str("\n[truncated]");
        }
    }
    if !output.stderr.is_empty() {
        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str("STDERR:\n");
        content.push_str(&output.stderr);
        if output.truncated_stderr {
            content.push_str("\n[truncated]");
        }
    }
    if content.is_empty() {
        content = format!("Script completed with exit code {}", output.exit_code);
    }

    let metadata = serde_json::json!({
        "script": script,
        "exit_code": output.exit_code,
        "duration_ms": output.duration_ms,
    });

    if output.success() {
        ToolResult::success_with_metadata(content, metadata)
    } else {
        ToolResult {
            success: false,
            content: Some(content),
            error: Some(format!("Script exited with code {}", output.exit_code)),
            metadata: Some(metadata),
        }
    }
}

#[async_trait]
impl Tool for RunSkillScriptTool {
    fn name(&self) -> &str {
        "run_skill_script"
    }

    fn description(&self) -> &str {
        "Run a script from the scripts/ folder of an active skill"
    }

    fn parameters_schema(&self) -> Value {
        let mut properties = skill_ref_schema();
        properties["script"] = serde_json::json!({
            "type": "string",
            "description": "Script path relative to the skill (e.g. scripts/extract.py)"
        });
        properties["args"] = serde_json::json!({
            "type": "array",
            "items": { "type": "string" },
            "description": "Arguments passed to the script"
        });
        properties["workdir"] = serde_json::json!({
            "type": "string",
            "description": "Working directory relative to the skill"
        });
        properties["timeout_secs"] = serde_json::json!({
            "type": "integer",
            "minimum": 1,
            "description": "Timeout in seconds"
        });
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": ["name", "location", "script"]
        })
    }

    async fn execute(&self, ctx: &Context, args: Value) -> Result<ToolResult> {
        match self.run(ctx, args).await {
            Ok(result) => Ok(result),
            // Timeouts and spawn failures are reported to the model.
            Err(e) if e.kind() == ErrorKind::Provider => Ok(ToolResult::failure(e.to_string())),
            Err(e) => ToolResult::from_error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::core::types::SkillDef;
    use crate::providers::{FsProvider, InMemoryProvider, MemorySkill};
    use crate::runtime::SessionOptions;
    use tempfile::TempDir;

    #[test]
    fn test_nonzero_exit_is_failure_with_output() {
        let result = to_result(
            "scripts/check.sh",
            ScriptOutput {
                exit_code: 2,
                stdout: String::new(),
                stderr: "bad input".to_string(),
                truncated_stdout: false,
                truncated_stderr: false,
                duration_ms: 5,
            },
        );
        assert!(!result.success);
        assert_eq!(result.content.as_deref(), Some("STDERR:\nbad input"));
        assert_eq!(result.metadata.unwrap()["exit_code"], 2);
    }

    #[tokio::test]
    async fn test_runs_fs_skill_script() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("hello");
        std::fs::create_dir_all(dir.join("scripts")).unwrap();
        std::fs::write(
            dir.join("SKILL.md"),
            "---\nname: hello\ndescription: Greets\n---\nRun scripts/hello.sh\n",
        )
        .unwrap();
        std::fs::write(dir.join("scripts/hello.sh"), "echo \"hello $1\"\n").unwrap();

        let runtime = Arc::new(SkillRuntime::new(RuntimeConfig::default()).unwrap());
        runtime.register_provider(Arc::new(FsProvider::default())).unwrap();
        let ctx = Context::background();
        let location = dir.to_string_lossy().to_string();
        let def = SkillDef::new("fs", "hello", location.as_str());
        runtime.add_skill(&ctx, def.clone()).await.unwrap();
        let session = runtime
            .new_session(&ctx, SessionOptions::new().with_active(vec![def]))
            .await
            .unwrap();

        let tool = RunSkillScriptTool::new(runtime, session.id());
        let result = tool
            .execute(
                &ctx,
                serde_json::json!({
                    "name": "hello",
                    "location": location,
                    "script": "scripts/hello.sh",
                    "args": ["world"]
                }),
            )
            .await
            .unwrap();
        assert!(result.success, "{:?}", result);
        assert_eq!(result.content.as_deref(), Some("STDOUT:\nhello world\n"));
    }

    #[tokio::test]
    async fn test_unsupported_provider_is_reported() {
        let runtime = Arc::new(SkillRuntime::new(RuntimeConfig::default()).unwrap());
        runtime
            .register_provider(Arc::new(
                InMemoryProvider::new().with_skill(MemorySkill::new("pdf", "PDF", "# PDF")),
            ))
            .unwrap();
        let ctx = Context::background();
        let def = SkillDef::new("memory", "pdf", "builtin/pdf");
        runtime.add_skill(&ctx, def.clone()).await.unwrap();
        let session = runtime
            .new_session(&ctx, SessionOptions::new().with_active(vec![def]))
            .await
            .unwrap();

        let tool = RunSkillScriptTool::new(runtime, session.id());
        let result = tool
            .execute(
                &ctx,
                serde_json::json!({"name": "pdf", "location": "builtin/pdf", "script": "scripts/x.sh"}),
            )
            .await
            .unwrap();
        assert!(!result.success);
    }
}
