//! Sub-agent configurations: markdown documents with YAML frontmatter.
//!
//! Each document declares `{name, model, tools}` in the frontmatter; the
//! body (or a `system_prompt` frontmatter field) is the system prompt.
//! Loaded once at startup into an immutable registry.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::GatewayError;

/// One sub-agent: a specialized prompt + toolset.
#[derive(Debug, Clone)]
pub struct SubAgentConfig {
    pub name: String,
    pub model: Option<String>,
    /// Tool subset this agent may use; empty means the full session toolset.
    pub tools: Vec<String>,
    pub system_prompt: String,
}

#[derive(Debug, Deserialize)]
struct Frontmatter {
    name: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    tools: Vec<String>,
    #[serde(default)]
    system_prompt: Option<String>,
}

/// Parses one sub-agent document: `---` frontmatter, then the prompt body.
pub fn parse_subagent_doc(text: &str) -> Result<SubAgentConfig, GatewayError> {
    let rest = text
        .strip_prefix("---")
        .ok_or_else(|| GatewayError::InvalidInput("missing frontmatter".into()))?;
    let end = rest
        .find("\n---")
        .ok_or_else(|| GatewayError::InvalidInput("unterminated frontmatter".into()))?;
    let frontmatter: Frontmatter = serde_yaml::from_str(&rest[..end])
        .map_err(|e| GatewayError::InvalidInput(format!("bad frontmatter: {}", e)))?;
    let body = rest[end + 4..].trim();

    let system_prompt = frontmatter
        .system_prompt
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            if body.is_empty() {
                None
            } else {
                Some(body.to_string())
            }
        })
        .ok_or_else(|| GatewayError::InvalidInput("sub-agent has no system prompt".into()))?;

    Ok(SubAgentConfig {
        name: frontmatter.name,
        model: frontmatter.model,
        tools: frontmatter.tools,
        system_prompt,
    })
}

/// Name → config map, immutable after startup.
pub struct SubAgentRegistry {
    by_name: HashMap<String, Arc<SubAgentConfig>>,
}

impl SubAgentRegistry {
    /// The built-in sub-agents shipped with the gateway.
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            by_name: HashMap::new(),
        };
        for doc in [
            include_str!("defaults/hotel.md"),
            include_str!("defaults/research.md"),
        ] {
            match parse_subagent_doc(doc) {
                Ok(config) => registry.register(config),
                Err(e) => tracing::warn!(error = %e, "skipping built-in sub-agent"),
            }
        }
        registry
    }

    pub fn register(&mut self, config: SubAgentConfig) {
        self.by_name.insert(config.name.clone(), Arc::new(config));
    }

    /// Loads every `*.md` document from a directory on top of what is
    /// already registered. Unparseable documents are skipped with a warning.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> std::io::Result<usize> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let text = std::fs::read_to_string(&path)?;
            match parse_subagent_doc(&text) {
                Ok(config) => {
                    self.register(config);
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping sub-agent doc")
                }
            }
        }
        Ok(loaded)
    }

    pub fn get(&self, name: &str) -> Option<Arc<SubAgentConfig>> {
        self.by_name.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: A well-formed document parses into name, tools and prompt
    /// body.
    #[test]
    fn parse_doc_with_body_prompt() {
        let doc = "---\nname: hotel\nmodel: gpt-4o-mini\ntools:\n  - room_availability\n  - create_doc\n---\nYou are the hotel desk agent.";
        let config = parse_subagent_doc(doc).unwrap();
        assert_eq!(config.name, "hotel");
        assert_eq!(config.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.tools, vec!["room_availability", "create_doc"]);
        assert_eq!(config.system_prompt, "You are the hotel desk agent.");
    }

    /// **Scenario**: A frontmatter system_prompt wins over an empty body;
    /// neither present fails.
    #[test]
    fn prompt_sources() {
        let doc = "---\nname: a\nsystem_prompt: Inline prompt.\n---\n";
        assert_eq!(parse_subagent_doc(doc).unwrap().system_prompt, "Inline prompt.");

        let doc = "---\nname: a\n---\n";
        assert!(parse_subagent_doc(doc).is_err());
    }

    /// **Scenario**: Built-in defaults register and resolve by name.
    #[test]
    fn defaults_load() {
        let registry = SubAgentRegistry::with_defaults();
        assert!(registry.get("hotel").is_some());
        assert!(registry.get("research").is_some());
        assert!(registry.get("ghost").is_none());
    }

    /// **Scenario**: load_dir picks up *.md files and skips garbage.
    #[test]
    fn load_dir_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("retail.md"),
            "---\nname: retail\n---\nRetail agent prompt.",
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.md"), "no frontmatter here").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut registry = SubAgentRegistry::with_defaults();
        let loaded = registry.load_dir(dir.path()).unwrap();
        assert_eq!(loaded, 1);
        assert!(registry.get("retail").is_some());
    }
}
