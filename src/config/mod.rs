use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub mod validator;
pub mod watcher;

use crate::agents::core::{EngineConfig, DEFAULT_MAX_ITERATIONS, DEFAULT_PROMPT_TEMPLATE};
use crate::agents::domain::ToolDescriptor;
use crate::cli::Cli;

/// Default configuration file name, looked up next to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "hestia.toml";

/// Prefix for environment overrides, e.g. `HESTIA__SERVER__PORT=8080`
pub const ENV_PREFIX: &str = "HESTIA";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub assistant_api: AssistantApiSettings,
    #[serde(default)]
    pub assistant: AssistantSettings,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub home: HomeSettings,
    #[serde(default)]
    pub knowledge: KnowledgeSettings,
    #[serde(default)]
    pub artifacts: ArtifactSettings,
    #[serde(default)]
    pub prompt: PromptSettings,
    /// Functions exposed to the assistant; also loaded from `config/tools/`
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Connection to the hosted assistant API
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssistantApiSettings {
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub base_url: String,
    pub request_timeout_seconds: u64,
    /// Delay between run status polls
    pub poll_interval_ms: u64,
    /// Give up waiting on a pending run after this long
    pub poll_timeout_seconds: u64,
}

impl Default for AssistantApiSettings {
    fn default() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            request_timeout_seconds: 60,
            poll_interval_ms: 500,
            poll_timeout_seconds: 120,
        }
    }
}

/// The assistant this bridge provisions and talks to
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssistantSettings {
    pub name: String,
    pub model: String,
    /// Holds `instructions/` and, by default, `vector_stores/`
    pub directory: PathBuf,
    /// Create or update the assistant at startup
    pub provision: bool,
    /// Use this assistant id as-is instead of looking it up by name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            name: "home-assistant".to_string(),
            model: "gpt-4o".to_string(),
            directory: PathBuf::from("assistants/home-assistant"),
            provision: true,
            id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    pub max_iterations: u32,
    pub attach_uploaded_files: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            attach_uploaded_files: false,
        }
    }
}

impl From<&EngineSettings> for EngineConfig {
    fn from(settings: &EngineSettings) -> Self {
        EngineConfig {
            max_iterations: settings.max_iterations,
            attach_uploaded_files: settings.attach_uploaded_files,
        }
    }
}

/// Home-automation control API
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HomeSettings {
    /// Functions are posted to `{base_url}/functions/{name}`; unset disables them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding a bearer token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for HomeSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            token_env: None,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KnowledgeSettings {
    pub enabled: bool,
    /// Each subdirectory is one store; defaults to `<assistant.directory>/vector_stores`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    pub manifest_path: PathBuf,
    /// Store searched by the assistant for every thread
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_store: Option<String>,
    /// Re-sync stores when files under the root change
    pub watch: bool,
    /// How a store is picked for messages that name none
    pub selector: SelectorKind,
    /// Chat model used by the `completion` selector
    pub selector_model: String,
    /// Store name -> what it holds; guides both selectors
    pub descriptions: BTreeMap<String, String>,
}

/// Knowledge store routing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    /// Only stores named in the request are used
    None,
    /// Word overlap with store names and descriptions
    #[default]
    Keyword,
    /// Ask a chat model
    Completion,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            root: None,
            manifest_path: PathBuf::from(".hestia/knowledge_manifest.json"),
            default_store: None,
            watch: true,
            selector: SelectorKind::default(),
            selector_model: "gpt-4o-mini".to_string(),
            descriptions: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArtifactSettings {
    pub enabled: bool,
    pub output_dir: PathBuf,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: PathBuf::from("artifacts"),
        }
    }
}

/// Template wrapped around messages arriving over HTTP
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PromptSettings {
    pub template: String,
    /// Name used when a request does not identify its user
    pub default_user: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            default_user: "user".to_string(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::from_root(".")
    }

    /// Create settings from CLI arguments (config file, environment, then CLI overrides)
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let root = match cli.config.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut settings = Self::load(&cli.config)?;
        settings.apply_cli_overrides(cli);
        settings.load_tools_from_dir(&root.join("config/tools"))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_root(root: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let root = root.as_ref();
        let mut settings = Self::load(&root.join(DEFAULT_CONFIG_FILE))?;
        settings.load_tools_from_dir(&root.join("config/tools"))?;
        settings.validate()?;
        Ok(settings)
    }

    fn load(config_path: &Path) -> Result<Self, anyhow::Error> {
        let s = Config::builder()
            .add_source(File::from(config_path.to_path_buf()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .build()?;

        Ok(s.try_deserialize()?)
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        validator::ConfigValidator::validate(self).map_err(|errors| {
            let error_messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::anyhow!(
                "Configuration validation failed:\n{}",
                error_messages.join("\n")
            )
        })
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(id) = &cli.assistant_id {
            self.assistant.id = Some(id.clone());
        }
        if cli.no_provision {
            self.assistant.provision = false;
        }
        if cli.no_knowledge_sync {
            self.knowledge.enabled = false;
        }
    }

    /// Directory whose subdirectories are the knowledge stores
    pub fn knowledge_root(&self) -> PathBuf {
        self.knowledge
            .root
            .clone()
            .unwrap_or_else(|| self.assistant.directory.join("vector_stores"))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::from(&self.engine)
    }

    /// Tool descriptors from `path/*.{json,yaml,yml}`; a name already
    /// configured is replaced by the file's definition
    fn load_tools_from_dir(&mut self, path: &Path) -> Result<(), anyhow::Error> {
        let pattern = format!("{}/*", path.display());
        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in glob::glob(&pattern)? {
            match entry {
                Ok(path) => paths.push(path),
                Err(e) => tracing::warn!("Failed to read glob entry: {}", e),
            }
        }
        paths.sort();

        for path in paths {
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !matches!(ext, "json" | "yaml" | "yml") {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            let tool: ToolDescriptor = if ext == "json" {
                serde_json::from_str(&content)?
            } else {
                serde_yaml::from_str(&content)?
            };
            tracing::debug!("Loaded tool {} from {}", tool.name, path.display());
            match self.tools.iter_mut().find(|t| t.name == tool.name) {
                Some(existing) => *existing = tool,
                None => self.tools.push(tool),
            }
        }
        Ok(())
    }
}
