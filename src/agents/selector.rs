//! Knowledge store routing
//!
//! When a message arrives without a knowledge store, a [`StoreSelector`]
//! picks the most relevant one from the synced catalog. Two selectors exist:
//! [`KeywordSelector`] scores word overlap locally, [`CompletionSelector`]
//! asks a chat model with a routing prompt.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::agents::transport::ChatCompletion;

/// Picks the knowledge store most relevant to a message
#[async_trait]
pub trait StoreSelector: Send + Sync {
    /// Name of the chosen store among `stores`, or `None` when none fits
    async fn select(&self, message: &str, stores: &[String]) -> Option<String>;
}

/// Shortest description word that counts as a keyword
const MIN_KEYWORD_LEN: usize = 4;

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Equal words, or a shared stem such as `light`/`lights`
fn matches(word: &str, term: &str) -> bool {
    word == term
        || (word.len() >= MIN_KEYWORD_LEN
            && term.len() >= MIN_KEYWORD_LEN
            && (word.starts_with(term) || term.starts_with(word)))
}

/// Scores each store by how many of its name and description words appear
/// in the message
#[derive(Debug, Clone, Default)]
pub struct KeywordSelector {
    descriptions: BTreeMap<String, String>,
}

impl KeywordSelector {
    pub fn new(descriptions: BTreeMap<String, String>) -> Self {
        Self { descriptions }
    }

    fn terms(&self, store: &str) -> HashSet<String> {
        let mut terms: HashSet<String> = words(store).collect();
        if let Some(description) = self.descriptions.get(store) {
            terms.extend(words(description).filter(|w| w.len() >= MIN_KEYWORD_LEN));
        }
        terms
    }

    fn score(&self, message_words: &HashSet<String>, store: &str) -> usize {
        self.terms(store)
            .iter()
            .filter(|term| message_words.iter().any(|word| matches(word, term)))
            .count()
    }
}

#[async_trait]
impl StoreSelector for KeywordSelector {
    async fn select(&self, message: &str, stores: &[String]) -> Option<String> {
        let message_words: HashSet<String> = words(message).collect();
        let mut best: Option<(&String, usize)> = None;
        for store in stores {
            let score = self.score(&message_words, store);
            if score > 0 && best.map_or(true, |(_, top)| score > top) {
                best = Some((store, score));
            }
        }
        best.map(|(store, _)| store.clone())
    }
}

/// Asks a chat model which store fits the message
pub struct CompletionSelector {
    client: Arc<dyn ChatCompletion>,
    model: String,
    descriptions: BTreeMap<String, String>,
}

impl CompletionSelector {
    pub fn new(
        client: Arc<dyn ChatCompletion>,
        model: impl Into<String>,
        descriptions: BTreeMap<String, String>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            descriptions,
        }
    }

    fn prompt(&self, message: &str, stores: &[String]) -> String {
        let mut prompt = format!(
            "We have the following vector stores available for you to use:\n{}\n\n\
             Return the name of the vector store most relevant to the user input.\n\n\
             IMPORTANT: ONLY RETURN THE NAME OF THE VECTOR STORE. DO NOT RETURN ANYTHING ELSE.\n\n",
            stores.join(", ")
        );
        for store in stores {
            if let Some(description) = self.descriptions.get(store) {
                prompt.push_str(&format!("{}: {}\n", store, description));
            }
        }
        prompt.push_str(&format!(
            "\nUSER INPUT:\n{}\n\nEXPECTED OUTPUT:\n<vector_store_name>\n",
            message
        ));
        prompt
    }
}

#[async_trait]
impl StoreSelector for CompletionSelector {
    async fn select(&self, message: &str, stores: &[String]) -> Option<String> {
        let reply = match self.client.complete(&self.model, &self.prompt(message, stores)).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Knowledge store selection failed: {}", e);
                return None;
            }
        };
        tracing::debug!("Store selection reply: {}", reply);

        // Longest name first so `rules` never shadows `home_rules`
        let mut candidates: Vec<&String> = stores.iter().collect();
        candidates.sort_by_key(|s| std::cmp::Reverse(s.len()));
        candidates
            .into_iter()
            .find(|store| reply.contains(store.as_str()))
            .cloned()
    }
}
