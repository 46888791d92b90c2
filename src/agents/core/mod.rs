//! Conversation turn engine
//!
//! - [`TurnEngine`]: drives one user turn against an assistant thread
//! - [`TurnReport`]: outcome, iteration count and dispatch records of a turn
//! - [`render_prompt`]: renders the user-facing prompt template

mod report;
mod turn;

pub use report::{DispatchRecord, DispatchStatus, TurnOutcome, TurnReport};
pub use turn::{EngineConfig, TurnEngine, TurnRequest, DEFAULT_MAX_ITERATIONS};

use chrono::{DateTime, Local};
use serde::Serialize;
use tera::{Context, Tera};

/// Default template wrapped around every user message
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
Receiving input from {{ user }}. Address them by their name and follow their instructions or \
perform the task accurately and provide feedback.
It is {{ date }} at {{ time }}.

USER INPUT:

{{ input }}
{% if context %}
DESCRIPTION OF TASKS:
{{ context }}
{% endif %}{% if store %}
USE VECTOR STORE: {{ store }}
{% endif %}";

/// Values available to the prompt template
#[derive(Debug, Clone, Serialize)]
pub struct PromptInput {
    pub user: String,
    pub input: String,
    pub context: Option<String>,
    pub store: Option<String>,
}

impl PromptInput {
    pub fn new(user: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            input: input.into(),
            context: None,
            store: None,
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_store(mut self, store: Option<String>) -> Self {
        self.store = store;
        self
    }
}

/// Render the prompt template at the given time.
///
/// Falls back to the raw input when the template fails to render.
pub fn render_prompt(template: &str, input: &PromptInput, now: DateTime<Local>) -> String {
    if template.trim().is_empty() {
        return input.input.clone();
    }

    let mut context = Context::new();
    context.insert("user", &title_case(&input.user));
    context.insert("input", &input.input);
    context.insert("context", &input.context);
    context.insert("store", &input.store);
    context.insert("date", &now.format("%A, %B %d, %Y").to_string());
    context.insert("time", &now.format("%I:%M %p").to_string());

    match Tera::one_off(template, &context, false) {
        Ok(rendered) => rendered,
        Err(e) => {
            tracing::warn!("Failed to render prompt template: {}", e);
            input.input.clone()
        }
    }
}

fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn evening() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 15, 21, 5, 0).unwrap()
    }

    #[test]
    fn test_default_template_includes_sections() {
        let input = PromptInput::new("gerardo", "turn on the kitchen lights")
            .with_context(Some("Lights follow the evening scene".into()))
            .with_store(Some("home_automation".into()));
        let prompt = render_prompt(DEFAULT_PROMPT_TEMPLATE, &input, evening());

        assert!(prompt.starts_with("Receiving input from Gerardo."));
        assert!(prompt.contains("It is Friday, March 15, 2024 at 09:05 PM."));
        assert!(prompt.contains("USER INPUT:\n\nturn on the kitchen lights"));
        assert!(prompt.contains("DESCRIPTION OF TASKS:\nLights follow the evening scene"));
        assert!(prompt.contains("USE VECTOR STORE: home_automation"));
    }

    #[test]
    fn test_optional_sections_are_omitted() {
        let input = PromptInput::new("guest", "hello").with_context(Some("   ".into()));
        let prompt = render_prompt(DEFAULT_PROMPT_TEMPLATE, &input, evening());
        assert!(!prompt.contains("DESCRIPTION OF TASKS"));
        assert!(!prompt.contains("USE VECTOR STORE"));
    }

    #[test]
    fn test_broken_template_falls_back_to_input() {
        let input = PromptInput::new("guest", "hello");
        assert_eq!(render_prompt("{% if %}", &input, evening()), "hello");
        assert_eq!(render_prompt("", &input, evening()), "hello");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("gerardo"), "Gerardo");
        assert_eq!(title_case("ANA maria"), "Ana Maria");
        assert_eq!(title_case(""), "");
    }
}
