//! Prompt rendering for skills
//!
//! Two XML documents are produced with Handlebars templates: the catalog of
//! skills the model may activate, and the bodies of the skills it already
//! has. Both can be rendered on their own or combined into one document.

use handlebars::Handlebars;
use serde::Serialize;

use crate::core::types::{ActiveSkill, SkillSummary};
use crate::error::{Error, Result};

const AVAILABLE_TEMPLATE: &str = "available";
const ACTIVE_TEMPLATE: &str = "active";

const AVAILABLE: &str = r#"<available_skills>
{{#each skills}}
<skill>
<name>{{handle.name}}</name>
<description>{{description}}</description>
<location>{{handle.location}}</location>
</skill>
{{/each}}
</available_skills>
"#;

const ACTIVE: &str = r#"<active_skills>
{{#each skills}}
<skill name="{{handle.name}}" location="{{handle.location}}">
{{body}}
</skill>
{{/each}}
</active_skills>
"#;

/// Which sections a rendered prompt contains
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptSection {
    /// Skills that can be activated
    Available,
    /// Bodies of active skills
    Active,
    /// Both
    #[default]
    Combined,
}

impl std::str::FromStr for PromptSection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "available" => Ok(PromptSection::Available),
            "active" => Ok(PromptSection::Active),
            "" | "combined" | "all" => Ok(PromptSection::Combined),
            other => Err(Error::InvalidArgument(format!(
                "unknown prompt section: {other}. Valid options: available, active, combined"
            ))),
        }
    }
}

#[derive(Serialize)]
struct SkillList<'a, T> {
    skills: &'a [T],
}

/// Renders skill listings into prompt text
pub struct PromptRenderer {
    registry: Handlebars<'static>,
}

impl PromptRenderer {
    /// Create a renderer with the built-in templates
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(xml_escape);

        for (name, template) in [(AVAILABLE_TEMPLATE, AVAILABLE), (ACTIVE_TEMPLATE, ACTIVE)] {
            registry
                .register_template_string(name, template)
                .map_err(|e| Error::Internal(format!("Invalid template {}: {}", name, e)))?;
        }

        Ok(PromptRenderer { registry })
    }

    /// Render the catalog of activatable skills.
    ///
    /// Entries are sorted by `(name, location)`.
    pub fn render_available(&self, skills: &[SkillSummary]) -> Result<String> {
        let skills = sorted(skills);
        self.render(AVAILABLE_TEMPLATE, &SkillList { skills: &skills })
    }

    /// Render the bodies of active skills in activation order
    pub fn render_active(&self, skills: &[ActiveSkill]) -> Result<String> {
        self.render(ACTIVE_TEMPLATE, &SkillList { skills })
    }

    /// Render both sections into one document
    pub fn render_combined(&self, available: &[SkillSummary], active: &[ActiveSkill]) -> Result<String> {
        let available_doc = self.render_available(available)?;
        let active_doc = self.render_active(active)?;
        Ok(format!("<skills>\n{available_doc}{active_doc}</skills>\n"))
    }

    fn render<T: Serialize>(&self, template: &str, data: &T) -> Result<String> {
        self.registry
            .render(template, data)
            .map_err(|e| Error::Internal(format!("Template render error: {}", e)))
    }
}

fn sorted(skills: &[SkillSummary]) -> Vec<SkillSummary> {
    let mut skills = skills.to_vec();
    skills.sort_by(|a, b| a.handle.cmp(&b.handle));
    skills
}

/// Escape text for XML element content and attribute values
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SkillHandle;

    fn summary(name: &str, location: &str, description: &str) -> SkillSummary {
        SkillSummary {
            handle: SkillHandle::new(name, location),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_available_is_sorted_and_escaped() {
        let renderer = PromptRenderer::new().unwrap();
        let out = renderer
            .render_available(&[
                summary("zeta", "/z", "Last"),
                summary("alpha", "/a", "Uses <tags> & \"quotes\""),
            ])
            .unwrap();

        assert!(out.starts_with("<available_skills>"));
        assert_eq!(out.matches("<skill>").count(), 2);
        assert!(out.find("<name>alpha</name>").unwrap() < out.find("<name>zeta</name>").unwrap());
        assert!(out.contains("Uses &lt;tags&gt; &amp; &quot;quotes&quot;"));
        assert!(out.contains("<location>/a</location>"));
    }

    #[test]
    fn test_active_keeps_order_and_bodies() {
        let renderer = PromptRenderer::new().unwrap();
        let out = renderer
            .render_active(&[
                ActiveSkill {
                    handle: SkillHandle::new("pdf", "/skills/pdf"),
                    body: "# PDF\nUse `pdftotext`.".to_string(),
                },
                ActiveSkill {
                    handle: SkillHandle::new("docx#0a1b2c3d", "/skills/docx"),
                    body: "# DOCX".to_string(),
                },
            ])
            .unwrap();

        assert!(out.contains("<skill name=\"pdf\" location=\"/skills/pdf\">\n# PDF\nUse `pdftotext`.\n</skill>"));
        assert!(out.find("name=\"pdf\"").unwrap() < out.find("name=\"docx#0a1b2c3d\"").unwrap());
    }

    #[test]
    fn test_combined_and_empty() {
        let renderer = PromptRenderer::new().unwrap();
        let out = renderer.render_combined(&[], &[]).unwrap();
        assert!(out.starts_with("<skills>\n<available_skills>"));
        assert!(out.contains("</available_skills>\n<active_skills>"));
        assert!(out.ends_with("</active_skills>\n</skills>\n"));
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("a<b>&'c'"), "a&lt;b&gt;&amp;&apos;c&apos;");
    }
}
