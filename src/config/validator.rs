use std::collections::HashMap;
use thiserror::Error;

use crate::agents::domain::ToolDescriptor;
use crate::config::{
    AssistantApiSettings, EngineSettings, HomeSettings, KnowledgeSettings, SelectorKind, Settings,
};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Duplicate entry: {0}")]
    Duplicate(String),
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(settings: &Settings) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        Self::validate_server(&settings.server, &mut errors);
        Self::validate_assistant_api(&settings.assistant_api, &mut errors);
        Self::validate_assistant(settings, &mut errors);
        Self::validate_engine(&settings.engine, &mut errors);
        Self::validate_home(&settings.home, &mut errors);
        Self::validate_knowledge(&settings.knowledge, &mut errors);
        Self::validate_prompt(&settings.prompt.template, &mut errors);
        Self::validate_tools(&settings.tools, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_server(server: &crate::config::ServerSettings, errors: &mut Vec<ValidationError>) {
        if server.host.is_empty() {
            errors.push(ValidationError::MissingField("server.host".to_string()));
        }

        if server.port == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "server.port".to_string(),
                reason: "Port must be greater than 0".to_string(),
            });
        }
    }

    fn validate_assistant_api(api: &AssistantApiSettings, errors: &mut Vec<ValidationError>) {
        if api.api_key_env.is_empty() {
            errors.push(ValidationError::MissingField("assistant_api.api_key_env".to_string()));
        }
        if !is_http_url(&api.base_url) {
            errors.push(ValidationError::InvalidValue {
                field: "assistant_api.base_url".to_string(),
                reason: format!("'{}' is not an http(s) URL", api.base_url),
            });
        }
        if api.poll_interval_ms == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "assistant_api.poll_interval_ms".to_string(),
                reason: "Poll interval must be greater than 0".to_string(),
            });
        }
        if api.poll_timeout_seconds == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "assistant_api.poll_timeout_seconds".to_string(),
                reason: "Poll timeout must be greater than 0".to_string(),
            });
        }
    }

    fn validate_assistant(settings: &Settings, errors: &mut Vec<ValidationError>) {
        let assistant = &settings.assistant;
        if assistant.name.is_empty() {
            errors.push(ValidationError::MissingField("assistant.name".to_string()));
        }
        if assistant.model.is_empty() {
            errors.push(ValidationError::MissingField("assistant.model".to_string()));
        }
        if !assistant.provision && assistant.id.is_none() {
            errors.push(ValidationError::InvalidValue {
                field: "assistant.id".to_string(),
                reason: "An assistant id is required when provisioning is disabled".to_string(),
            });
        }
    }

    fn validate_engine(engine: &EngineSettings, errors: &mut Vec<ValidationError>) {
        if engine.max_iterations == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "engine.max_iterations".to_string(),
                reason: "At least one iteration is required".to_string(),
            });
        }
    }

    fn validate_home(home: &HomeSettings, errors: &mut Vec<ValidationError>) {
        if let Some(url) = &home.base_url {
            if !is_http_url(url) {
                errors.push(ValidationError::InvalidValue {
                    field: "home.base_url".to_string(),
                    reason: format!("'{}' is not an http(s) URL", url),
                });
            }
        }
    }

    fn validate_knowledge(knowledge: &KnowledgeSettings, errors: &mut Vec<ValidationError>) {
        if knowledge.selector == SelectorKind::Completion && knowledge.selector_model.is_empty() {
            errors.push(ValidationError::MissingField("knowledge.selector_model".to_string()));
        }
    }

    fn validate_prompt(template: &str, errors: &mut Vec<ValidationError>) {
        let mut tera = tera::Tera::default();
        if let Err(e) = tera.add_raw_template("prompt", template) {
            errors.push(ValidationError::InvalidValue {
                field: "prompt.template".to_string(),
                reason: e.to_string(),
            });
        }
    }

    fn validate_tools(tools: &[ToolDescriptor], errors: &mut Vec<ValidationError>) {
        let mut seen_names = HashMap::new();

        for (idx, tool) in tools.iter().enumerate() {
            if let Some(prev_idx) = seen_names.insert(&tool.name, idx) {
                errors.push(ValidationError::Duplicate(format!(
                    "Tool name '{}' appears at indices {} and {}",
                    tool.name, prev_idx, idx
                )));
            }

            if tool.name.is_empty() {
                errors.push(ValidationError::MissingField(format!("tools[{}].name", idx)));
            } else if !tool
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                errors.push(ValidationError::InvalidValue {
                    field: format!("tools[{}].name", idx),
                    reason: "Function names may only contain letters, digits, '_' and '-'"
                        .to_string(),
                });
            }

            if !tool.parameters.is_object() {
                errors.push(ValidationError::InvalidValue {
                    field: format!("tools[{}].parameters", idx),
                    reason: "Parameters must be a JSON schema object".to_string(),
                });
            }
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
