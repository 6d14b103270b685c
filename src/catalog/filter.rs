//! Listing filters
//!
//! The same filter serves two audiences. Host-facing listings match the name
//! prefix against `SkillDef::name`; LLM-facing listings match it against the
//! display name. Location prefixes always apply to the user-visible location.

use std::collections::HashSet;

use crate::core::types::SkillDef;

/// Criteria for listing catalog entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillFilter {
    /// Provider types to include (empty = all)
    pub provider_types: Vec<String>,
    /// Name prefix
    pub name_prefix: Option<String>,
    /// User-visible location prefix
    pub location_prefix: Option<String>,
    /// Explicit allow-list of definitions
    pub allow: Option<HashSet<SkillDef>>,
}

impl SkillFilter {
    /// A filter that matches everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a provider type (may be called repeatedly)
    pub fn with_provider_type(mut self, provider_type: impl Into<String>) -> Self {
        self.provider_types.push(provider_type.into());
        self
    }

    /// Restrict by name prefix
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    /// Restrict by location prefix
    pub fn with_location_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.location_prefix = Some(prefix.into());
        self
    }

    /// Restrict to an explicit set of definitions
    pub fn with_allow_list<I>(mut self, defs: I) -> Self
    where
        I: IntoIterator<Item = SkillDef>,
    {
        self.allow = Some(defs.into_iter().collect());
        self
    }

    /// Host-facing match: name prefix applies to `def.name`
    pub fn matches_def(&self, def: &SkillDef) -> bool {
        self.matches_common(def) && Self::has_prefix(&def.name, self.name_prefix.as_deref())
    }

    /// LLM-facing match: name prefix applies to the display name
    pub fn matches_display(&self, def: &SkillDef, display_name: &str) -> bool {
        self.matches_common(def) && Self::has_prefix(display_name, self.name_prefix.as_deref())
    }

    fn matches_common(&self, def: &SkillDef) -> bool {
        if !self.provider_types.is_empty()
            && !self.provider_types.iter().any(|t| *t == def.provider_type)
        {
            return false;
        }
        if !Self::has_prefix(&def.location, self.location_prefix.as_deref()) {
            return false;
        }
        self.allow.as_ref().map_or(true, |allow| allow.contains(def))
    }

    fn has_prefix(value: &str, prefix: Option<&str>) -> bool {
        prefix.map_or(true, |p| value.starts_with(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_everything() {
        let def = SkillDef::new("fs", "pdf", "/skills/pdf");
        assert!(SkillFilter::all().matches_def(&def));
        assert!(SkillFilter::all().matches_display(&def, "pdf#0badf00d"));
    }

    #[test]
    fn test_name_prefix_targets_differ() {
        let def = SkillDef::new("fs", "pdf", "/skills/pdf");
        let filter = SkillFilter::all().with_name_prefix("pdf#");
        assert!(!filter.matches_def(&def));
        assert!(filter.matches_display(&def, "pdf#0badf00d"));
    }

    #[test]
    fn test_provider_location_and_allow_list() {
        let pdf = SkillDef::new("fs", "pdf", "/skills/pdf");
        let docx = SkillDef::new("memory", "docx", "builtin");

        let by_type = SkillFilter::all().with_provider_type("memory");
        assert!(!by_type.matches_def(&pdf));
        assert!(by_type.matches_def(&docx));

        let by_location = SkillFilter::all().with_location_prefix("/skills");
        assert!(by_location.matches_def(&pdf));
        assert!(!by_location.matches_def(&docx));

        let allow = SkillFilter::all().with_allow_list([docx.clone()]);
        assert!(!allow.matches_def(&pdf));
        assert!(allow.matches_def(&docx));
    }
}
