//! Filesystem skill provider
//!
//! A skill is a directory holding a `SKILL.md`: YAML frontmatter between
//! `---` fences followed by the markdown body. The canonical location is the
//! canonicalized directory path. Resources are read relative to that
//! directory and scripts run from its `scripts/` folder.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{encode_resource, truncate_utf8};
use crate::config::{FilesystemConfig, ScriptRuntime};
use crate::core::context::Context;
use crate::core::provider::SkillProvider;
use crate::core::types::{
    IndexedSkill, ProviderSkillKey, ResourceEncoding, ScriptOutput, ScriptRequest, SkillDef,
    SkillResource,
};
use crate::error::{Error, Result};

/// Provider type served by [`FsProvider`]
pub const FS_PROVIDER_TYPE: &str = "fs";

/// File that marks a directory as a skill
pub const SKILL_FILE: &str = "SKILL.md";

const SCRIPTS_DIR: &str = "scripts";

/// Limits for [`FsProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsProviderConfig {
    pub script_timeout: Duration,
    pub max_resource_bytes: usize,
    pub max_output_bytes: usize,
}

impl Default for FsProviderConfig {
    fn default() -> Self {
        FsProviderConfig::from(&FilesystemConfig::default())
    }
}

impl From<&FilesystemConfig> for FsProviderConfig {
    fn from(config: &FilesystemConfig) -> Self {
        FsProviderConfig {
            script_timeout: config.script_timeout,
            max_resource_bytes: config.max_resource_bytes,
            max_output_bytes: config.max_output_bytes,
        }
    }
}

/// YAML frontmatter of a `SKILL.md`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SkillFrontmatter {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_yaml::Value>,
    /// Space-delimited tool names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<String>,
}

impl SkillFrontmatter {
    /// Flatten into catalog properties
    fn properties(&self) -> BTreeMap<String, String> {
        let mut properties: BTreeMap<String, String> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), yaml_to_string(v)))
            .collect();
        if let Some(license) = &self.license {
            properties.insert("license".to_string(), license.clone());
        }
        if let Some(tools) = &self.allowed_tools {
            properties.insert("allowed-tools".to_string(), tools.clone());
        }
        properties
    }
}

fn yaml_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// A parsed `SKILL.md`
#[derive(Debug, Clone, PartialEq)]
pub struct SkillDocument {
    pub frontmatter: SkillFrontmatter,
    pub body: String,
}

/// Parse a `SKILL.md` document.
///
/// Frontmatter is required and must open on the first line.
pub fn parse_skill_md(text: &str) -> Result<SkillDocument> {
    let text = text.replace("\r\n", "\n");
    let rest = text
        .strip_prefix("---\n")
        .ok_or_else(|| Error::Provider("missing YAML frontmatter (expected leading '---')".to_string()))?;

    let mut yaml = Vec::new();
    let mut lines = rest.split('\n');
    let mut closed = false;
    for line in &mut lines {
        if line.trim_end() == "---" {
            closed = true;
            break;
        }
        yaml.push(line);
    }
    if !closed {
        return Err(Error::Provider(
            "unterminated YAML frontmatter (missing closing '---')".to_string(),
        ));
    }

    let frontmatter: SkillFrontmatter = serde_yaml::from_str(&yaml.join("\n"))?;
    if frontmatter.name.trim().is_empty() {
        return Err(Error::Provider("frontmatter name is empty".to_string()));
    }
    let body = lines.collect::<Vec<_>>().join("\n");

    Ok(SkillDocument {
        frontmatter,
        body: body.trim_start_matches('\n').trim_end().to_string(),
    })
}

/// Serves skills stored as directories on disk
#[derive(Debug, Clone, Default)]
pub struct FsProvider {
    config: FsProviderConfig,
}

impl FsProvider {
    pub fn new(config: FsProviderConfig) -> Self {
        FsProvider { config }
    }

    /// Provider limits
    pub fn config(&self) -> &FsProviderConfig {
        &self.config
    }

    /// List skill definitions found directly under `root`.
    ///
    /// Hidden directories and directories whose `SKILL.md` does not parse are
    /// skipped with a warning. Sorted by `(name, location)`.
    pub async fn discover(root: &Path) -> Result<Vec<SkillDef>> {
        let mut dir = tokio::fs::read_dir(root)
            .await
            .map_err(|e| Error::from(e).context(format!("reading skill root {}", root.display())))?;

        let mut defs = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if hidden || !entry.file_type().await?.is_dir() {
                continue;
            }
            let skill_md = path.join(SKILL_FILE);
            if !tokio::fs::try_exists(&skill_md).await.unwrap_or(false) {
                continue;
            }
            match read_document(&skill_md).await {
                Ok((doc, _)) => defs.push(SkillDef::new(
                    FS_PROVIDER_TYPE,
                    doc.frontmatter.name,
                    path.to_string_lossy(),
                )),
                Err(e) => warn!(path = %skill_md.display(), error = %e, "Skipping invalid skill"),
            }
        }

        defs.sort_by(|a, b| (&a.name, &a.location).cmp(&(&b.name, &b.location)));
        debug!(root = %root.display(), skills = defs.len(), "Discovered skills");
        Ok(defs)
    }

    /// [`FsProvider::discover`] over several roots; missing roots are skipped
    pub async fn discover_roots(roots: &[PathBuf]) -> Result<Vec<SkillDef>> {
        let mut defs = Vec::new();
        for root in roots {
            if !root.is_dir() {
                warn!(root = %root.display(), "Skill root does not exist");
                continue;
            }
            defs.extend(Self::discover(root).await?);
        }
        Ok(defs)
    }

    async fn skill_root(key: &ProviderSkillKey) -> Result<PathBuf> {
        tokio::fs::canonicalize(&key.location)
            .await
            .map_err(|_| Error::SkillNotFound(format!("{key} ({})", key.location)))
    }

    async fn run(
        &self,
        key: &ProviderSkillKey,
        request: &ScriptRequest,
    ) -> Result<ScriptOutput> {
        let root = Self::skill_root(key).await?;
        let script = resolve_inside(&root, &request.location).await?;
        let scripts_dir = tokio::fs::canonicalize(root.join(SCRIPTS_DIR))
            .await
            .map_err(|_| Error::InvalidArgument(format!("skill '{}' has no {SCRIPTS_DIR}/ directory", key.name)))?;
        if !script.starts_with(&scripts_dir) || !script.is_file() {
            return Err(Error::InvalidArgument(format!(
                "'{}' is not a script under {SCRIPTS_DIR}/",
                request.location
            )));
        }

        let workdir = match &request.workdir {
            Some(dir) => {
                let dir = resolve_inside(&root, dir).await?;
                if !dir.is_dir() {
                    return Err(Error::InvalidArgument(format!(
                        "workdir '{}' is not a directory",
                        dir.display()
                    )));
                }
                dir
            }
            None => root.clone(),
        };

        let runtime = ScriptRuntime::for_path(&script);
        let mut command = match runtime.interpreter() {
            Some(interpreter) => {
                let program = which::which(interpreter).map_err(|e| {
                    Error::Provider(format!("interpreter '{interpreter}' not found: {e}"))
                })?;
                let mut command = Command::new(program);
                command.arg(&script);
                command
            }
            None => Command::new(&script),
        };
        command
            .args(&request.args)
            .envs(&request.env)
            .current_dir(&workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let timeout = request.timeout.unwrap_or(self.config.script_timeout);
        debug!(skill = %key, script = %script.display(), %runtime, ?timeout, "Running skill script");

        let start = Instant::now();
        let child = command
            .spawn()
            .map_err(|e| Error::Provider(format!("failed to spawn {}: {e}", script.display())))?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!(skill = %key, script = %request.location, ?timeout, "Script timed out");
                return Err(Error::Provider(format!(
                    "script '{}' timed out after {}",
                    request.location,
                    humantime_serde::re::humantime::format_duration(timeout)
                )));
            }
        };

        let (stdout, truncated_stdout) =
            truncate_utf8(&String::from_utf8_lossy(&output.stdout), self.config.max_output_bytes);
        let (stderr, truncated_stderr) =
            truncate_utf8(&String::from_utf8_lossy(&output.stderr), self.config.max_output_bytes);

        Ok(ScriptOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout,
            stderr,
            truncated_stdout,
            truncated_stderr,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

async fn read_document(skill_md: &Path) -> Result<(SkillDocument, String)> {
    let raw = tokio::fs::read(skill_md).await?;
    let digest = hex::encode(Sha256::digest(&raw));
    let text = String::from_utf8(raw)
        .map_err(|_| Error::Provider(format!("{} is not valid UTF-8", skill_md.display())))?;
    let doc = parse_skill_md(&text).map_err(|e| e.context(skill_md.display().to_string()))?;
    Ok((doc, digest))
}

/// Resolve a relative path under `root`, rejecting anything that leaves it
async fn resolve_inside(root: &Path, relative: &str) -> Result<PathBuf> {
    let relative = relative.trim();
    let path = Path::new(relative);
    if relative.is_empty() || path.is_absolute() {
        return Err(Error::InvalidArgument(format!(
            "'{relative}' must be a relative path inside the skill"
        )));
    }
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(Error::InvalidArgument(format!(
            "'{relative}' may not contain '..' or a root"
        )));
    }

    let resolved = tokio::fs::canonicalize(root.join(path))
        .await
        .map_err(|_| Error::InvalidArgument(format!("'{relative}' does not exist in the skill")))?;
    // Symlinks may still point outside.
    if !resolved.starts_with(root) {
        return Err(Error::InvalidArgument(format!(
            "'{relative}' resolves outside the skill"
        )));
    }
    Ok(resolved)
}

#[async_trait]
impl SkillProvider for FsProvider {
    fn provider_type(&self) -> &str {
        FS_PROVIDER_TYPE
    }

    async fn index(&self, ctx: &Context, def: &SkillDef) -> Result<IndexedSkill> {
        ctx.check()?;
        let dir = tokio::fs::canonicalize(&def.location)
            .await
            .map_err(|_| Error::SkillNotFound(format!("no skill directory at {}", def.location)))?;
        if !dir.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        let (doc, digest) = read_document(&dir.join(SKILL_FILE)).await?;
        if doc.frontmatter.name != def.name {
            return Err(Error::InvalidArgument(format!(
                "{} declares name '{}', expected '{}'",
                dir.join(SKILL_FILE).display(),
                doc.frontmatter.name,
                def.name
            )));
        }

        let key = ProviderSkillKey::new(FS_PROVIDER_TYPE, def.name.clone(), dir.to_string_lossy());
        let mut indexed = IndexedSkill::new(key, doc.frontmatter.description.trim()).with_digest(digest);
        indexed.properties = doc.frontmatter.properties();
        Ok(indexed)
    }

    async fn load_body(&self, ctx: &Context, key: &ProviderSkillKey) -> Result<String> {
        ctx.check()?;
        let root = Self::skill_root(key).await?;
        let (doc, _) = read_document(&root.join(SKILL_FILE)).await?;
        Ok(doc.body)
    }

    async fn read_resource(
        &self,
        ctx: &Context,
        key: &ProviderSkillKey,
        location: &str,
        encoding: ResourceEncoding,
    ) -> Result<SkillResource> {
        ctx.check()?;
        let root = Self::skill_root(key).await?;
        let path = resolve_inside(&root, location).await?;
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(Error::InvalidArgument(format!("'{location}' is not a file")));
        }

        let mut bytes = Vec::new();
        tokio::fs::File::open(&path)
            .await?
            .take(self.config.max_resource_bytes as u64 + 1)
            .read_to_end(&mut bytes)
            .await?;

        let mut resource = encode_resource(location.trim(), &bytes, encoding, self.config.max_resource_bytes)?;
        resource.bytes = metadata.len();
        Ok(resource)
    }

    async fn run_script(
        &self,
        ctx: &Context,
        key: &ProviderSkillKey,
        request: &ScriptRequest,
    ) -> Result<ScriptOutput> {
        ctx.check()?;
        self.run(key, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    const PDF_SKILL: &str = "---\nname: pdf\ndescription: Work with PDF files\nlicense: MIT\nallowed-tools: Bash Read\nmetadata:\n  version: 2\n  author: docs-team\n---\n\n# PDF\n\nUse `pdftotext`.\n";

    fn write_skill(root: &Path, dir: &str, content: &str) -> PathBuf {
        let path = root.join(dir);
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join(SKILL_FILE), content).unwrap();
        path
    }

    fn skill_with_scripts() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let dir = write_skill(tmp.path(), "pdf", PDF_SKILL);
        std::fs::create_dir_all(dir.join("scripts")).unwrap();
        std::fs::create_dir_all(dir.join("reference")).unwrap();
        std::fs::write(dir.join("reference/forms.md"), "# Forms").unwrap();
        std::fs::write(dir.join("scripts/echo.sh"), "echo \"args: $@\"\necho \"$GREETING\" >&2\npwd\n").unwrap();
        std::fs::write(dir.join("scripts/slow.sh"), "sleep 5\n").unwrap();
        (tmp, dir)
    }

    async fn indexed_key(dir: &Path) -> ProviderSkillKey {
        FsProvider::default()
            .index(&Context::background(), &SkillDef::new("fs", "pdf", dir.to_string_lossy()))
            .await
            .unwrap()
            .key
    }

    #[test]
    fn test_parse_skill_md() {
        let doc = parse_skill_md(PDF_SKILL).unwrap();
        assert_eq!(doc.frontmatter.name, "pdf");
        assert_eq!(doc.body, "# PDF\n\nUse `pdftotext`.");

        let properties = doc.frontmatter.properties();
        assert_eq!(properties.get("version").map(String::as_str), Some("2"));
        assert_eq!(properties.get("license").map(String::as_str), Some("MIT"));
        assert_eq!(properties.get("allowed-tools").map(String::as_str), Some("Bash Read"));
    }

    #[test]
    fn test_parse_rejects_missing_frontmatter() {
        assert!(parse_skill_md("# Just markdown").is_err());
        assert!(parse_skill_md("---\nname: x\ndescription: y\n").is_err());
        assert!(parse_skill_md("---\ndescription: y\n---\nbody").is_err());
    }

    #[tokio::test]
    async fn test_index_canonicalizes_and_digests() {
        let tmp = TempDir::new().unwrap();
        let dir = write_skill(tmp.path(), "pdf", PDF_SKILL);
        let ctx = Context::background();
        let provider = FsProvider::default();

        let dotted = format!("{}/./", dir.display());
        let indexed = provider
            .index(&ctx, &SkillDef::new("fs", "pdf", dotted))
            .await
            .unwrap();
        let canonical = std::fs::canonicalize(&dir).unwrap();
        assert_eq!(indexed.key.location, canonical.to_string_lossy());
        assert_eq!(indexed.description, "Work with PDF files");
        assert_eq!(indexed.digest, hex::encode(Sha256::digest(PDF_SKILL.as_bytes())));
        assert!(indexed.body.is_none());

        let body = provider.load_body(&ctx, &indexed.key).await.unwrap();
        assert!(body.starts_with("# PDF"));
    }

    #[tokio::test]
    async fn test_index_rejects_name_mismatch_and_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = write_skill(tmp.path(), "pdf", PDF_SKILL);
        let ctx = Context::background();
        let provider = FsProvider::default();

        let err = provider
            .index(&ctx, &SkillDef::new("fs", "docx", dir.to_string_lossy()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = provider
            .index(&ctx, &SkillDef::new("fs", "pdf", tmp.path().join("nope").to_string_lossy()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SkillNotFound);
    }

    #[tokio::test]
    async fn test_read_resource_stays_inside_skill() {
        let (tmp, dir) = skill_with_scripts();
        std::fs::write(tmp.path().join("secret.txt"), "secret").unwrap();
        let key = indexed_key(&dir).await;
        let ctx = Context::background();
        let provider = FsProvider::default();

        let resource = provider
            .read_resource(&ctx, &key, "reference/forms.md", ResourceEncoding::Utf8)
            .await
            .unwrap();
        assert_eq!(resource.content, "# Forms");
        assert_eq!(resource.bytes, 7);

        for bad in ["../secret.txt", "/etc/passwd", "reference/../../secret.txt", "missing.md"] {
            let err = provider
                .read_resource(&ctx, &key, bad, ResourceEncoding::Utf8)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{bad}");
        }

        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(tmp.path().join("secret.txt"), dir.join("link.txt")).unwrap();
            let err = provider
                .read_resource(&ctx, &key, "link.txt", ResourceEncoding::Utf8)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[tokio::test]
    async fn test_read_resource_truncates() {
        let (_tmp, dir) = skill_with_scripts();
        std::fs::write(dir.join("big.txt"), "x".repeat(100)).unwrap();
        let key = indexed_key(&dir).await;
        let provider = FsProvider::new(FsProviderConfig {
            max_resource_bytes: 10,
            ..Default::default()
        });

        let resource = provider
            .read_resource(&Context::background(), &key, "big.txt", ResourceEncoding::Base64)
            .await
            .unwrap();
        assert!(resource.truncated);
        assert_eq!(resource.bytes, 100);
    }

    #[tokio::test]
    async fn test_run_script() {
        let (_tmp, dir) = skill_with_scripts();
        let key = indexed_key(&dir).await;
        let provider = FsProvider::default();

        let output = provider
            .run_script(
                &Context::background(),
                &key,
                &ScriptRequest::new("scripts/echo.sh")
                    .with_args(["one", "two"])
                    .with_env("GREETING", "hello")
                    .with_workdir("reference"),
            )
            .await
            .unwrap();
        assert!(output.success());
        assert!(output.stdout.contains("args: one two"));
        assert!(output.stdout.trim_end().ends_with("reference"));
        assert_eq!(output.stderr.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_script_rejects_non_scripts_and_times_out() {
        let (_tmp, dir) = skill_with_scripts();
        let key = indexed_key(&dir).await;
        let ctx = Context::background();
        let provider = FsProvider::default();

        let err = provider
            .run_script(&ctx, &key, &ScriptRequest::new("reference/forms.md"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let mut slow = ScriptRequest::new("scripts/slow.sh");
        slow.timeout = Some(Duration::from_millis(200));
        let err = provider.run_script(&ctx, &key, &slow).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_discover() {
        let tmp = TempDir::new().unwrap();
        write_skill(tmp.path(), "pdf", PDF_SKILL);
        write_skill(tmp.path(), "broken", "no frontmatter");
        write_skill(tmp.path(), ".hidden", PDF_SKILL);
        std::fs::create_dir_all(tmp.path().join("empty")).unwrap();
        std::fs::write(tmp.path().join("README.md"), "root file").unwrap();

        let defs = FsProvider::discover(tmp.path()).await.unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "pdf");
        assert_eq!(defs[0].provider_type, FS_PROVIDER_TYPE);

        let defs = FsProvider::discover_roots(&[tmp.path().to_path_buf(), tmp.path().join("missing")])
            .await
            .unwrap();
        assert_eq!(defs.len(), 1);
    }
}
