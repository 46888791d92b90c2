//! Thread message types

use serde::{Deserialize, Serialize};

/// Message role on a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant message
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One content element of a thread message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text
    Text { text: String },
    /// An image generated by the assistant
    ImageFile { file_id: String },
    /// Any other content kind (kept by type name)
    #[serde(other)]
    Other,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        MessageContent::Text { text: text.into() }
    }

    pub fn image(file_id: impl Into<String>) -> Self {
        MessageContent::ImageFile {
            file_id: file_id.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, MessageContent::ImageFile { .. })
    }
}

/// A message on a thread, as listed by the transport (newest first)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: Vec<MessageContent>,
    /// File ids attached to this message
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl ThreadMessage {
    pub fn assistant(id: impl Into<String>, content: Vec<MessageContent>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content,
            attachments: Vec::new(),
        }
    }

    /// The answer text of this message.
    ///
    /// A message that leads with an image carries its caption in the second
    /// element. Returns `None` when the expected element is missing or is not
    /// text.
    pub fn response_text(&self) -> Option<&str> {
        let first = self.content.first()?;
        if first.is_image() {
            self.content.get(1)?.as_text()
        } else {
            first.as_text()
        }
    }

    /// File ids referenced by this message's attachments and image contents
    pub fn referenced_files(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.attachments.iter().map(String::as_str).collect();
        for content in &self.content {
            if let MessageContent::ImageFile { file_id } = content {
                ids.push(file_id);
            }
        }
        ids
    }
}

/// Request to post a new user message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub content: String,
    /// Uploaded files to expose to the file-search tool for this message
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }
}
