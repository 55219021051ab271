//! Agent definitions and sub-agent orchestration.

pub mod definition;
pub mod invoke;

pub use definition::{AgentDefinition, AgentLibrary};
pub use invoke::InvokeAgentTool;

use std::path::Path;

/// Assemble a full system prompt: the rendered template plus workspace,
/// tool, and skill metadata, and — when the agent may delegate — the
/// sub-agent listing.
pub fn compose_system_prompt(
    base: &str,
    workspace_dir: &Path,
    tool_names: &[String],
    skills: &[String],
    subagents: Option<&AgentLibrary>,
) -> String {
    let mut prompt = base.trim_end().to_string();

    prompt.push_str(&format!(
        "\n\n## Workspace\n{}\n",
        workspace_dir.display()
    ));

    if !tool_names.is_empty() {
        prompt.push_str("\n## Available Tools\n");
        for name in tool_names {
            prompt.push_str(&format!("- {name}\n"));
        }
    }

    if !skills.is_empty() {
        prompt.push_str("\n## Available Skills\n");
        for skill in skills {
            prompt.push_str(&format!("- {skill}\n"));
        }
    }

    if let Some(library) = subagents {
        let metadata = library.metadata_prompt();
        if !metadata.is_empty() {
            prompt.push('\n');
            prompt.push_str(&metadata);
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn prompt_lists_workspace_tools_and_skills() {
        let prompt = compose_system_prompt(
            "You are an agent.",
            &PathBuf::from("/work"),
            &["calculate".into(), "record_note".into()],
            &["git-commit".into()],
            None,
        );

        assert!(prompt.starts_with("You are an agent."));
        assert!(prompt.contains("## Workspace\n/work"));
        assert!(prompt.contains("- calculate"));
        assert!(prompt.contains("- git-commit"));
        assert!(!prompt.contains("Available Sub-Agents"));
    }

    #[test]
    fn subagent_metadata_is_appended_when_present() {
        let mut library = AgentLibrary::new();
        library.insert(AgentDefinition {
            name: "researcher".into(),
            description: "Looks things up".into(),
            system_prompt_template: "{{task}}".into(),
            allowed_tools: None,
            allowed_skills: None,
            max_steps: None,
        });

        let prompt = compose_system_prompt(
            "Base.",
            &PathBuf::from("/work"),
            &[],
            &[],
            Some(&library),
        );
        assert!(prompt.contains("Available Sub-Agents"));
        assert!(prompt.contains("`researcher`"));
    }
}
