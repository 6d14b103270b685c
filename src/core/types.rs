//! Core types shared by the catalog, sessions and providers
//!
//! Three identities exist for a skill:
//! - [`SkillDef`]: what the host supplied, compared by value.
//! - [`ProviderSkillKey`]: the provider's canonical form; internal only.
//! - [`SkillHandle`]: what the LLM (or a user) sees and selects by.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::naming::SUFFIX_SEPARATOR;
use crate::error::{Error, Result};

/// Host-supplied skill definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SkillDef {
    /// Provider type that serves this skill (e.g. `fs`)
    pub provider_type: String,
    /// Skill name
    pub name: String,
    /// Provider-specific location as the host wrote it
    pub location: String,
}

impl SkillDef {
    /// Create a new skill definition
    pub fn new(
        provider_type: impl Into<String>,
        name: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        SkillDef {
            provider_type: provider_type.into(),
            name: name.into(),
            location: location.into(),
        }
    }

    /// All three fields must be non-blank
    pub fn validate(&self) -> Result<()> {
        if self.provider_type.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "skill provider type is required".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(Error::InvalidArgument("skill name is required".to_string()));
        }
        if self.name.contains(SUFFIX_SEPARATOR) {
            return Err(Error::InvalidArgument(format!(
                "skill name '{}' must not contain '{}'",
                self.name, SUFFIX_SEPARATOR
            )));
        }
        if self.location.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "skill location is required".to_string(),
            ));
        }
        Ok(())
    }

    /// The un-canonicalized key a provider would start from
    pub(crate) fn as_key(&self) -> ProviderSkillKey {
        ProviderSkillKey {
            provider_type: self.provider_type.clone(),
            name: self.name.clone(),
            location: self.location.clone(),
        }
    }
}

impl fmt::Display for SkillDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.provider_type, self.name, self.location)
    }
}

/// Canonical skill identity returned by a provider's index step.
///
/// `provider_type` and `name` always equal the originating [`SkillDef`];
/// `location` may be normalized by the provider and is never shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderSkillKey {
    /// Provider type
    pub provider_type: String,
    /// Skill name
    pub name: String,
    /// Canonical location
    pub location: String,
}

impl ProviderSkillKey {
    /// Create a new canonical key
    pub fn new(
        provider_type: impl Into<String>,
        name: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        ProviderSkillKey {
            provider_type: provider_type.into(),
            name: name.into(),
            location: location.into(),
        }
    }

    /// Re-index input for a key that is not (or no longer) in the catalog
    pub(crate) fn as_def(&self) -> SkillDef {
        SkillDef {
            provider_type: self.provider_type.clone(),
            name: self.name.clone(),
            location: self.location.clone(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.provider_type.trim().is_empty() || self.name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "skill key requires provider type and name".to_string(),
            ));
        }
        if self.location.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "skill key requires a location".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for ProviderSkillKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Canonical locations stay internal; only type and name are printed.
        write!(f, "{}:{}", self.provider_type, self.name)
    }
}

/// LLM/user-visible selector: display name plus the host-written location
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SkillHandle {
    /// Display name (plain name, or `name#xxxxxxxx` inside a collision group)
    pub name: String,
    /// Location exactly as given in the skill's [`SkillDef`]
    pub location: String,
}

impl SkillHandle {
    /// Create a new handle
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        SkillHandle {
            name: name.into(),
            location: location.into(),
        }
    }

    /// Copy with surrounding whitespace removed from both fields
    pub fn trimmed(&self) -> Self {
        SkillHandle {
            name: self.name.trim().to_string(),
            location: self.location.trim().to_string(),
        }
    }
}

impl fmt::Display for SkillHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.location)
    }
}

/// Skill metadata key/value properties
pub type SkillProperties = BTreeMap<String, String>;

/// Result of a provider's index step
#[derive(Debug, Clone)]
pub struct IndexedSkill {
    /// Canonical key
    pub key: ProviderSkillKey,
    /// Short description shown before activation
    pub description: String,
    /// Free-form properties
    pub properties: SkillProperties,
    /// Content digest of the skill definition
    pub digest: String,
    /// Body, when the provider already has it in hand
    pub body: Option<String>,
}

impl IndexedSkill {
    /// Create an index result without properties or preloaded body
    pub fn new(key: ProviderSkillKey, description: impl Into<String>) -> Self {
        IndexedSkill {
            key,
            description: description.into(),
            properties: SkillProperties::new(),
            digest: String::new(),
            body: None,
        }
    }

    /// Set the digest
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = digest.into();
        self
    }

    /// Add a property
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Preload the body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Host-facing view of a catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRecord {
    /// Definition the skill was added with
    pub def: SkillDef,
    /// Current LLM-visible handle
    pub handle: SkillHandle,
    /// Description
    pub description: String,
    /// Properties
    pub properties: SkillProperties,
    /// Content digest
    pub digest: String,
}

/// LLM-facing view of a catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSummary {
    /// Handle the LLM selects the skill by
    pub handle: SkillHandle,
    /// Description
    pub description: String,
}

/// An activated skill with its body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveSkill {
    /// Handle
    pub handle: SkillHandle,
    /// Full body
    pub body: String,
}

/// How a resource should be returned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceEncoding {
    /// UTF-8 text
    #[default]
    Utf8,
    /// Base64 of the raw bytes
    Base64,
}

impl std::str::FromStr for ResourceEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "utf8" | "utf-8" | "text" => Ok(ResourceEncoding::Utf8),
            "base64" => Ok(ResourceEncoding::Base64),
            other => Err(Error::InvalidArgument(format!(
                "unsupported resource encoding: {other}. Valid options: utf8, base64"
            ))),
        }
    }
}

impl fmt::Display for ResourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceEncoding::Utf8 => write!(f, "utf8"),
            ResourceEncoding::Base64 => write!(f, "base64"),
        }
    }
}

/// A resource read from inside a skill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillResource {
    /// Resource location relative to the skill, as requested
    pub location: String,
    /// Encoding of `content`
    pub encoding: ResourceEncoding,
    /// Content
    pub content: String,
    /// Whether the content was cut at the provider's size limit
    pub truncated: bool,
    /// Size of the resource in bytes
    pub bytes: u64,
}

/// Request to run a script that ships with a skill
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRequest {
    /// Script location relative to the skill
    pub location: String,
    /// Arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working directory relative to the skill
    #[serde(default)]
    pub workdir: Option<String>,
    /// Override of the provider's timeout
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl ScriptRequest {
    /// Create a new script request
    pub fn new(location: impl Into<String>) -> Self {
        ScriptRequest {
            location: location.into(),
            ..Default::default()
        }
    }

    /// Set arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set working directory
    pub fn with_workdir(mut self, dir: impl Into<String>) -> Self {
        self.workdir = Some(dir.into());
        self
    }
}

/// Output of a skill script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOutput {
    /// Exit code (-1 if terminated by signal)
    pub exit_code: i32,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Whether stdout was truncated
    pub truncated_stdout: bool,
    /// Whether stderr was truncated
    pub truncated_stderr: bool,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl ScriptOutput {
    /// Whether the script exited with status 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
