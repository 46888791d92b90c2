//! Assistant provisioning
//!
//! Builds the assistant definition from an instructions directory and the
//! configured tool descriptors, then creates or updates the hosted assistant.

use std::path::{Path, PathBuf};

use crate::agents::domain::ToolDescriptor;
use crate::agents::error::{AgentError, AgentResult};
use crate::agents::transport::{AssistantDefinition, AssistantTool, AssistantTransport};

/// Subdirectory of the assistant directory holding instruction files
pub const INSTRUCTIONS_DIR: &str = "instructions";

/// Concatenate every file under `<assistant_dir>/instructions`, sorted by
/// path, and append the list of functions the assistant may call.
pub fn build_instructions(assistant_dir: &Path, function_names: &[String]) -> AgentResult<String> {
    let mut instructions = String::new();
    for path in instruction_files(&assistant_dir.join(INSTRUCTIONS_DIR))? {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            AgentError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        instructions.push_str(&content);
        instructions.push('\n');
    }

    instructions.push_str(&format!(
        "\nIMPORTANT: Only invoke these functions: {}\n",
        function_names.join(", ")
    ));
    Ok(instructions)
}

fn instruction_files(dir: &Path) -> AgentResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        tracing::warn!("No instructions directory at {}", dir.display());
        return Ok(Vec::new());
    }
    let pattern = format!("{}/**/*", dir.display());
    let mut files: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| AgentError::Configuration(format!("invalid instructions path: {}", e)))?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Built-in tools first, then one function tool per descriptor
pub fn build_tools(descriptors: &[ToolDescriptor]) -> Vec<AssistantTool> {
    let mut tools = vec![AssistantTool::CodeInterpreter, AssistantTool::FileSearch];
    tools.extend(
        descriptors
            .iter()
            .cloned()
            .map(|function| AssistantTool::Function { function }),
    );
    tools
}

/// Update the assistant with a matching name, or create it. Returns its id.
pub async fn provision(
    transport: &dyn AssistantTransport,
    definition: &AssistantDefinition,
) -> AgentResult<String> {
    let existing = transport
        .list_assistants()
        .await?
        .into_iter()
        .find(|a| a.name.as_deref() == Some(definition.name.as_str()));

    match existing {
        Some(assistant) => {
            transport.update_assistant(&assistant.id, definition).await?;
            tracing::info!(assistant = %assistant.id, "Updated assistant {}", definition.name);
            Ok(assistant.id)
        }
        None => {
            let id = transport.create_assistant(definition).await?;
            tracing::info!(assistant = %id, "Created assistant {} ({})", definition.name, definition.model);
            Ok(id)
        }
    }
}
