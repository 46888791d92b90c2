//! File and vector store types

use serde::{Deserialize, Serialize};

/// Purpose tag of files uploaded by this bridge for the file-search tool
pub const ASSISTANTS_PURPOSE: &str = "assistants";

/// A file known to the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileObject {
    pub id: String,
    pub filename: String,
    pub purpose: String,
    #[serde(default)]
    pub bytes: u64,
}

impl FileObject {
    /// Whether this file was uploaded as assistant input rather than generated
    pub fn is_user_upload(&self) -> bool {
        self.purpose == ASSISTANTS_PURPOSE
    }

    /// File name without directories or extension
    pub fn stem(&self) -> &str {
        let base = self.filename.rsplit('/').next().unwrap_or(&self.filename);
        base.split('.').next().unwrap_or(base)
    }
}

/// A vector store (knowledge store)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorStore {
    pub id: String,
    pub name: String,
}

/// Outcome of attaching a batch of files to a vector store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBatch {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub failed: u32,
}
