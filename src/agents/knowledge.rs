//! Knowledge-store synchronization
//!
//! Keeps each vector store in step with a directory of reference documents.
//! A manifest records the SHA-256 of every uploaded file so unchanged files
//! are never re-uploaded; changed or vanished files are deleted and uploaded
//! again one by one.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::agents::error::{AgentError, AgentResult};
use crate::agents::transport::FileTransport;

/// Knowledge store names mapped to their ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KnowledgeCatalog {
    stores: BTreeMap<String, String>,
}

/// Catalog shared between the engine and the resync watcher
pub type SharedCatalog = Arc<RwLock<KnowledgeCatalog>>;

impl KnowledgeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, id: impl Into<String>) {
        self.stores.insert(name.into(), id.into());
    }

    /// Map a store name to its id; anything else is taken to be an id already
    pub fn resolve(&self, name_or_id: &str) -> String {
        self.stores
            .get(name_or_id)
            .cloned()
            .unwrap_or_else(|| name_or_id.to_string())
    }

    pub fn id_of(&self, name: &str) -> Option<&str> {
        self.stores.get(name).map(String::as_str)
    }

    pub fn names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

/// Uploaded state of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub sha256: String,
    pub file_id: String,
}

/// store name -> file name -> uploaded state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeManifest {
    #[serde(default)]
    pub stores: BTreeMap<String, BTreeMap<String, ManifestEntry>>,
}

impl KnowledgeManifest {
    /// Load the manifest; a missing or unreadable file yields an empty manifest
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable manifest {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub async fn save(&self, path: &Path) -> AgentResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

/// A file on disk that should be present in a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Path relative to the store directory, `/`-separated
    pub name: String,
    pub path: PathBuf,
    pub sha256: String,
}

impl LocalFile {
    /// Read and hash `path`, naming it relative to `store_dir`
    pub async fn read(store_dir: &Path, path: &Path) -> AgentResult<Self> {
        let content = tokio::fs::read(path).await?;
        Ok(Self {
            name: relative_name(store_dir, path)?,
            path: path.to_path_buf(),
            sha256: format!("{:x}", Sha256::digest(&content)),
        })
    }
}

/// `office/rules.md` for `<store_dir>/office/rules.md`; files outside the
/// store directory fall back to their bare file name
fn relative_name(store_dir: &Path, path: &Path) -> AgentResult<String> {
    let relative = path.strip_prefix(store_dir).unwrap_or_else(|_| {
        path.file_name().map(Path::new).unwrap_or(path)
    });
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<&str>>>()
        .filter(|parts| !parts.is_empty())
        .ok_or_else(|| AgentError::Knowledge(format!("invalid file name: {}", path.display())))?;
    Ok(parts.join("/"))
}

/// Work needed to bring one store up to date
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Files not yet uploaded
    pub upload: Vec<LocalFile>,
    /// Files whose content changed or whose upload vanished: (file, old id)
    pub replace: Vec<(LocalFile, String)>,
    /// Files no longer on disk: (name, old id)
    pub remove: Vec<(String, String)>,
    /// Names of files already current
    pub unchanged: Vec<String>,
}

impl SyncPlan {
    pub fn is_noop(&self) -> bool {
        self.upload.is_empty() && self.replace.is_empty() && self.remove.is_empty()
    }
}

/// Compare local files with the manifest and the store's remote file ids
pub fn plan_sync(
    manifest: &BTreeMap<String, ManifestEntry>,
    local: Vec<LocalFile>,
    remote_ids: &HashSet<String>,
) -> SyncPlan {
    let mut plan = SyncPlan::default();
    let local_names: HashSet<String> = local.iter().map(|f| f.name.clone()).collect();

    for file in local {
        match manifest.get(&file.name) {
            Some(entry) if entry.sha256 == file.sha256 && remote_ids.contains(&entry.file_id) => {
                plan.unchanged.push(file.name);
            }
            Some(entry) => plan.replace.push((file, entry.file_id.clone())),
            None => plan.upload.push(file),
        }
    }

    for (name, entry) in manifest {
        if !local_names.contains(name) {
            plan.remove.push((name.clone(), entry.file_id.clone()));
        }
    }

    plan
}

/// Ensures vector stores reflect local document sets
pub struct KnowledgeSynchronizer {
    files: Arc<dyn FileTransport>,
    manifest_path: PathBuf,
    manifest: Mutex<KnowledgeManifest>,
}

impl KnowledgeSynchronizer {
    pub fn new(files: Arc<dyn FileTransport>, manifest_path: impl Into<PathBuf>) -> Self {
        let manifest_path = manifest_path.into();
        let manifest = KnowledgeManifest::load(&manifest_path);
        Self {
            files,
            manifest_path,
            manifest: Mutex::new(manifest),
        }
    }

    /// Make the named store hold exactly `file_paths`, returning its id.
    ///
    /// Files are tracked by their path relative to `store_dir`, so equal file
    /// names in different subdirectories are distinct entries. Re-running with
    /// unchanged files performs no uploads.
    pub async fn ensure(
        &self,
        store_name: &str,
        store_dir: &Path,
        file_paths: &[PathBuf],
    ) -> AgentResult<String> {
        let store_id = self.find_or_create_store(store_name).await?;

        let mut local = Vec::with_capacity(file_paths.len());
        for path in file_paths {
            local.push(LocalFile::read(store_dir, path).await?);
        }
        let remote_ids: HashSet<String> = self
            .files
            .list_vector_store_files(&store_id)
            .await?
            .into_iter()
            .collect();

        // Held across the sync so concurrent resyncs don't interleave
        let mut manifest = self.manifest.lock().await;
        let entries = manifest.stores.entry(store_name.to_string()).or_default();
        let plan = plan_sync(entries, local, &remote_ids);

        if plan.is_noop() {
            tracing::debug!(store = store_name, "Knowledge store already up to date");
            return Ok(store_id);
        }

        for (name, old_id) in &plan.remove {
            self.delete_quietly(old_id).await;
            entries.remove(name);
            tracing::info!(store = store_name, "Removed {}", name);
        }

        let mut uploaded = Vec::new();
        for (file, old_id) in &plan.replace {
            self.delete_quietly(old_id).await;
            tracing::info!(store = store_name, "Replacing changed file {}", file.name);
            uploaded.push(file);
        }
        uploaded.extend(plan.upload.iter());

        let mut new_ids = Vec::with_capacity(uploaded.len());
        for file in uploaded {
            let object = self.files.upload_file(&file.path).await?;
            entries.insert(
                file.name.clone(),
                ManifestEntry {
                    sha256: file.sha256.clone(),
                    file_id: object.id.clone(),
                },
            );
            new_ids.push(object.id);
        }

        if !new_ids.is_empty() {
            tracing::info!(store = store_name, "Uploading {} files to vector store", new_ids.len());
            let batch = self.files.create_file_batch_and_poll(&store_id, &new_ids).await?;
            tracing::info!(
                store = store_name,
                "Batch status: {} ({} completed, {} failed)",
                batch.status,
                batch.completed,
                batch.failed
            );
        }

        manifest.save(&self.manifest_path).await?;
        Ok(store_id)
    }

    /// Sync every subdirectory of `root` as a store named after the directory
    pub async fn sync_directory(&self, root: &Path) -> AgentResult<KnowledgeCatalog> {
        let mut catalog = KnowledgeCatalog::new();
        for (name, files) in discover_stores(root)? {
            let id = self.ensure(&name, &root.join(&name), &files).await?;
            catalog.insert(name, id);
        }
        Ok(catalog)
    }

    async fn find_or_create_store(&self, name: &str) -> AgentResult<String> {
        let stores = self.files.list_vector_stores().await?;
        if let Some(store) = stores.into_iter().find(|s| s.name == name) {
            tracing::debug!("Vector store already exists: {}", name);
            return Ok(store.id);
        }
        tracing::info!("Creating vector store: {}", name);
        Ok(self.files.create_vector_store(name).await?.id)
    }

    async fn delete_quietly(&self, file_id: &str) {
        if let Err(e) = self.files.delete_file(file_id).await {
            tracing::warn!(file_id, "Failed to delete file: {}", e);
        }
    }
}

/// Group the files under `root` by their top-level directory.
///
/// Files directly inside `root` are ignored; nested directories belong to
/// their top-level store.
pub fn discover_stores(root: &Path) -> AgentResult<BTreeMap<String, Vec<PathBuf>>> {
    let mut stores: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    if !root.is_dir() {
        tracing::warn!("Knowledge directory does not exist: {}", root.display());
        return Ok(stores);
    }

    let pattern = format!("{}/*/**/*", root.display());
    let entries = glob::glob(&pattern)
        .map_err(|e| AgentError::Knowledge(format!("invalid knowledge path: {}", e)))?;
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => {
                let store = path
                    .strip_prefix(root)
                    .ok()
                    .and_then(|rel| rel.components().next())
                    .and_then(|c| c.as_os_str().to_str())
                    .map(str::to_string);
                if let Some(store) = store {
                    stores.entry(store).or_default().push(path);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to read glob entry: {}", e),
        }
    }

    for files in stores.values_mut() {
        files.sort();
    }
    Ok(stores)
}
