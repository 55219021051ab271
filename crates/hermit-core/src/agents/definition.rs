//! Agent definition loading.
//!
//! Definitions are markdown files with YAML frontmatter: the frontmatter
//! carries name, description, and optional tool/skill/step restrictions;
//! the body is the system prompt template with a `{{task}}` placeholder.
//!
//! ```yaml
//! ---
//! name: researcher
//! description: Investigates a question and reports findings
//! tools:
//!   - calculate
//! max_steps: 15
//! ---
//!
//! You are a researcher. Your task: {{task}}
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tracing::{debug, warn};

/// Static description of one invocable agent.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    pub name: String,
    pub description: String,
    /// System prompt body; `{{task}}` is substituted at invocation.
    pub system_prompt_template: String,
    /// Tool whitelist. `None` = every tool except sub-agent invocation.
    pub allowed_tools: Option<Vec<String>>,
    /// Skill whitelist. `None` = all skills.
    pub allowed_skills: Option<Vec<String>>,
    /// Step-limit override for this agent.
    pub max_steps: Option<usize>,
}

#[derive(Deserialize)]
struct Frontmatter {
    name: String,
    description: String,
    #[serde(default)]
    tools: Option<Vec<String>>,
    #[serde(default)]
    skills: Option<Vec<String>>,
    #[serde(default)]
    max_steps: Option<usize>,
}

impl AgentDefinition {
    /// Parse a definition from markdown-with-frontmatter content.
    pub fn parse(content: &str) -> Result<Self> {
        let (frontmatter, body) =
            split_frontmatter(content).ok_or_else(|| anyhow!("missing YAML frontmatter"))?;

        let meta: Frontmatter = serde_yaml::from_str(frontmatter)
            .map_err(|e| anyhow!("invalid frontmatter: {e}"))?;

        if meta.name.trim().is_empty() {
            return Err(anyhow!("agent name must not be empty"));
        }

        Ok(Self {
            name: meta.name,
            description: meta.description,
            system_prompt_template: body.trim().to_string(),
            allowed_tools: meta.tools,
            allowed_skills: meta.skills,
            max_steps: meta.max_steps,
        })
    }

    /// The template with `{{task}}` substituted.
    pub fn render_system_prompt(&self, task: &str) -> String {
        self.system_prompt_template.replace("{{task}}", task)
    }

    /// One line of the sub-agent metadata block.
    pub fn metadata_line(&self) -> String {
        let mut line = format!("- `{}`: {}", self.name, self.description);
        if let Some(tools) = &self.allowed_tools {
            line.push_str(&format!(" (tools: {})", tools.join(", ")));
        }
        if let Some(skills) = &self.allowed_skills {
            line.push_str(&format!(" (skills: {})", skills.join(", ")));
        }
        if let Some(max_steps) = self.max_steps {
            line.push_str(&format!(" (max_steps: {max_steps})"));
        }
        line
    }
}

/// Discovered agent definitions, resolvable by name.
#[derive(Debug, Clone, Default)]
pub struct AgentLibrary {
    agents: BTreeMap<String, AgentDefinition>,
}

impl AgentLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.md` definition in a directory (non-recursive).
    /// Malformed files are skipped with a warning.
    pub fn discover(dir: &Path) -> Self {
        let mut library = Self::new();

        if !dir.is_dir() {
            warn!(dir = %dir.display(), "agents directory does not exist");
            return library;
        }

        let Ok(entries) = fs::read_dir(dir) else {
            warn!(dir = %dir.display(), "cannot read agents directory");
            return library;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }

            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), "cannot read agent file: {e}");
                    continue;
                }
            };

            match AgentDefinition::parse(&content) {
                Ok(definition) => {
                    debug!(agent = %definition.name, path = %path.display(), "loaded agent");
                    library.insert(definition);
                }
                Err(e) => warn!(path = %path.display(), "skipping agent file: {e}"),
            }
        }

        library
    }

    pub fn insert(&mut self, definition: AgentDefinition) {
        self.agents.insert(definition.name.clone(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// The "Available Sub-Agents" block injected into a parent's system
    /// prompt. Empty when no agents are discovered.
    pub fn metadata_prompt(&self) -> String {
        if self.agents.is_empty() {
            return String::new();
        }

        let mut prompt = String::from("## Available Sub-Agents\n\n");
        prompt.push_str(
            "You can delegate to specialized sub-agents. Each runs independently \
             with its own context and restricted capabilities. Use the \
             `invoke_agent` tool when a task matches an agent below.\n\n",
        );
        for definition in self.agents.values() {
            prompt.push_str(&definition.metadata_line());
            prompt.push('\n');
        }
        prompt
    }
}

fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix("---")?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;

    let end = rest.find("\n---")?;
    let frontmatter = rest[..end].trim_end_matches('\r');
    let body = rest[end + 4..].trim_start_matches(['\r', '\n']);
    Some((frontmatter, body))
}
