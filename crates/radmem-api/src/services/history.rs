//! Medical-history virtual filesystem.
//!
//! Entries are addressed by `(patient_id, path)` where `path` is a
//! slash-joined chain of names below the patient's root (empty string).
//! Every mutating call checks that the addressed entry belongs to the
//! patient named in the route.
//!
//! Folder renames rewrite the path prefix of every descendant. Folder
//! deletes remove all descendants, file bytes first, then the records.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use radmem_core::{
    defaults, detect_content_type, join_path, new_record_id, sanitize_filename,
    validate_entry_name, Error, HistoryEntry, HistoryFileType, HistoryItem, NamedVectors, Result,
    VectorSlot,
};
use radmem_db::{generate_storage_path, Database, FilesystemBackend, StorageBackend};
use radmem_inference::Embedder;

/// A file as received from the history upload form.
#[derive(Debug, Clone)]
pub struct HistoryFileUpload {
    pub bytes: Vec<u8>,
    pub original_filename: String,
    pub content_type: Option<String>,
    pub file_type: HistoryFileType,
    pub parent_path: String,
}

/// One row of a folder listing, in the shape the web client renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HistoryListing {
    Folder {
        id: Uuid,
        name: String,
        path: String,
        #[serde(rename = "createdAt")]
        created_at: DateTime<Utc>,
        #[serde(rename = "itemCount")]
        item_count: usize,
    },
    File {
        id: Uuid,
        name: String,
        path: String,
        #[serde(rename = "fileType")]
        file_type: HistoryFileType,
        #[serde(rename = "mimeType")]
        mime_type: String,
        size: u64,
        #[serde(rename = "uploadedAt")]
        uploaded_at: DateTime<Utc>,
    },
}

impl HistoryListing {
    fn from_entry(entry: HistoryEntry, item_count: usize) -> Self {
        match entry.item {
            HistoryItem::Folder { created_at } => HistoryListing::Folder {
                id: entry.id,
                name: entry.name,
                path: entry.path,
                created_at,
                item_count,
            },
            HistoryItem::File {
                size_bytes,
                mime_type,
                uploaded_at,
                file_type,
                ..
            } => HistoryListing::File {
                id: entry.id,
                name: entry.name,
                path: entry.path,
                file_type,
                mime_type,
                size: size_bytes,
                uploaded_at,
            },
        }
    }

    fn is_folder(&self) -> bool {
        matches!(self, HistoryListing::Folder { .. })
    }

    fn name(&self) -> &str {
        match self {
            HistoryListing::Folder { name, .. } | HistoryListing::File { name, .. } => name,
        }
    }
}

/// Bytes of a history file ready to send.
#[derive(Debug, Clone)]
pub struct HistoryDownload {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct HistoryService {
    db: Database,
    embedder: Embedder,
    storage: Arc<FilesystemBackend>,
}

impl HistoryService {
    pub fn new(db: Database, embedder: Embedder, storage: Arc<FilesystemBackend>) -> Self {
        Self {
            db,
            embedder,
            storage,
        }
    }

    /// Folder contents, folders first then by name.
    ///
    /// Listing an empty root materializes the default folders.
    #[instrument(skip(self), fields(subsystem = "api", component = "history", op = "list"))]
    pub async fn list(&self, patient_id: &str, path: &str) -> Result<Vec<HistoryListing>> {
        let patient_id = require_patient(patient_id)?;
        let path = normalize_path(path)?;
        if path.is_empty() {
            self.ensure_default_folders(patient_id).await?;
        } else {
            self.require_folder(patient_id, &path).await?;
        }

        let mut items = Vec::new();
        for entry in self.db.history.list_children(patient_id, &path).await? {
            let count = if entry.is_folder() {
                self.db.history.descendants(patient_id, &entry.path).await?.len()
            } else {
                0
            };
            items.push(HistoryListing::from_entry(entry, count));
        }
        items.sort_by(|a, b| {
            b.is_folder()
                .cmp(&a.is_folder())
                .then_with(|| a.name().to_lowercase().cmp(&b.name().to_lowercase()))
        });
        debug!(patient_id, path = %path, result_count = items.len(), "Listed history folder");
        Ok(items)
    }

    /// Create a folder under `parent_path`.
    pub async fn create_folder(
        &self,
        patient_id: &str,
        parent_path: &str,
        name: &str,
    ) -> Result<HistoryEntry> {
        let patient_id = require_patient(patient_id)?;
        let name = validate_entry_name(name)?;
        let parent_path = normalize_path(parent_path)?;
        if !parent_path.is_empty() {
            self.require_folder(patient_id, &parent_path).await?;
        }
        let path = join_path(&parent_path, &name);
        self.ensure_free(patient_id, &path).await?;

        let entry = HistoryEntry {
            id: new_record_id(),
            patient_id: patient_id.to_string(),
            name,
            parent_path,
            path,
            item: HistoryItem::Folder {
                created_at: Utc::now(),
            },
        };
        self.insert(&entry).await?;
        info!(subsystem = "api", component = "history", op = "create_folder", patient_id, path = %entry.path, "Folder created");
        Ok(entry)
    }

    /// Store a file under `parent_path`. The bytes are removed again if the
    /// record cannot be written.
    #[instrument(
        skip(self, upload),
        fields(subsystem = "api", component = "history", op = "upload_file", size = upload.bytes.len())
    )]
    pub async fn upload_file(
        &self,
        patient_id: &str,
        upload: HistoryFileUpload,
    ) -> Result<HistoryEntry> {
        let patient_id = require_patient(patient_id)?;
        if upload.bytes.is_empty() {
            return Err(Error::InvalidInput("Uploaded file is empty".to_string()));
        }
        let name = validate_entry_name(&sanitize_filename(&upload.original_filename))?;
        let parent_path = normalize_path(&upload.parent_path)?;
        if !parent_path.is_empty() {
            self.require_folder(patient_id, &parent_path).await?;
        }
        let path = join_path(&parent_path, &name);
        self.ensure_free(patient_id, &path).await?;

        let id = new_record_id();
        let storage_path = generate_storage_path(&id, &file_extension(&name));
        let claimed = upload
            .content_type
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or("application/octet-stream");
        let entry = HistoryEntry {
            id,
            patient_id: patient_id.to_string(),
            name,
            parent_path,
            path,
            item: HistoryItem::File {
                storage_path: storage_path.clone(),
                size_bytes: upload.bytes.len() as u64,
                mime_type: detect_content_type(&upload.bytes, claimed),
                uploaded_at: Utc::now(),
                file_type: upload.file_type,
            },
        };

        self.storage.write(&storage_path, &upload.bytes).await?;
        if let Err(e) = self.insert(&entry).await {
            warn!(storage_path = %storage_path, error = %e, "History upload failed, removing bytes");
            if let Err(cleanup) = self.storage.delete(&storage_path).await {
                warn!(storage_path = %storage_path, error = %cleanup, "Failed to remove history bytes");
            }
            return Err(e);
        }
        Ok(entry)
    }

    /// Rename an entry in place. Folder renames carry every descendant along.
    #[instrument(skip(self), fields(subsystem = "api", component = "history", op = "rename"))]
    pub async fn rename(&self, patient_id: &str, id: Uuid, new_name: &str) -> Result<HistoryEntry> {
        let mut entry = self.owned(patient_id, id).await?;
        let name = validate_entry_name(new_name)?;
        if name == entry.name {
            return Ok(entry);
        }
        let new_path = join_path(&entry.parent_path, &name);
        self.ensure_free(&entry.patient_id, &new_path).await?;

        let descendants = if entry.is_folder() {
            self.db.history.descendants(&entry.patient_id, &entry.path).await?
        } else {
            Vec::new()
        };

        self.db
            .history
            .relocate(entry.id, &name, &entry.parent_path, &new_path)
            .await?;
        for child in &descendants {
            self.db
                .history
                .relocate(
                    child.id,
                    &child.name,
                    &rebase(&child.parent_path, &entry.path, &new_path),
                    &rebase(&child.path, &entry.path, &new_path),
                )
                .await?;
        }
        info!(
            patient_id = %entry.patient_id,
            from = %entry.path,
            to = %new_path,
            result_count = descendants.len(),
            "History entry renamed"
        );

        entry.name = name;
        entry.path = new_path;
        Ok(entry)
    }

    /// Delete an entry and, for folders, everything below it. Returns the
    /// number of records removed.
    #[instrument(skip(self), fields(subsystem = "api", component = "history", op = "delete"))]
    pub async fn delete(&self, patient_id: &str, id: Uuid) -> Result<usize> {
        let entry = self.owned(patient_id, id).await?;
        let mut doomed = if entry.is_folder() {
            self.db.history.descendants(&entry.patient_id, &entry.path).await?
        } else {
            Vec::new()
        };
        doomed.insert(0, entry);

        for item in &doomed {
            if let HistoryItem::File { storage_path, .. } = &item.item {
                self.storage.delete(storage_path).await?;
            }
        }
        // Deepest entries first.
        let ids: Vec<Uuid> = doomed.iter().rev().map(|e| e.id).collect();
        self.db.history.delete(&ids).await?;
        info!(patient_id, result_count = ids.len(), "History entries deleted");
        Ok(ids.len())
    }

    pub async fn download(&self, patient_id: &str, id: Uuid) -> Result<HistoryDownload> {
        let entry = self.owned(patient_id, id).await?;
        match entry.item {
            HistoryItem::File {
                storage_path,
                mime_type,
                ..
            } => Ok(HistoryDownload {
                name: entry.name,
                mime_type,
                bytes: self.storage.read(&storage_path).await?,
            }),
            HistoryItem::Folder { .. } => Err(Error::InvalidInput(format!(
                "{} is a folder and cannot be downloaded",
                entry.path
            ))),
        }
    }

    async fn owned(&self, patient_id: &str, id: Uuid) -> Result<HistoryEntry> {
        let entry = self
            .db
            .history
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("History item not found: {}", id)))?;
        if entry.patient_id != patient_id.trim() {
            return Err(Error::Forbidden(format!(
                "History item {} does not belong to this patient",
                id
            )));
        }
        Ok(entry)
    }

    async fn ensure_default_folders(&self, patient_id: &str) -> Result<()> {
        if !self.db.history.list_children(patient_id, "").await?.is_empty() {
            return Ok(());
        }
        for name in defaults::DEFAULT_HISTORY_FOLDERS {
            self.create_folder(patient_id, "", name).await?;
        }
        Ok(())
    }

    async fn require_folder(&self, patient_id: &str, path: &str) -> Result<()> {
        match self.db.history.find_by_path(patient_id, path).await? {
            Some(entry) if entry.is_folder() => Ok(()),
            Some(_) => Err(Error::InvalidInput(format!("{} is not a folder", path))),
            None => Err(Error::NotFound(format!("Folder not found: {}", path))),
        }
    }

    async fn ensure_free(&self, patient_id: &str, path: &str) -> Result<()> {
        if self.db.history.find_by_path(patient_id, path).await?.is_some() {
            return Err(Error::Conflict(format!("An item named {} already exists", path)));
        }
        Ok(())
    }

    async fn insert(&self, entry: &HistoryEntry) -> Result<()> {
        let vector = self.embedder.embed_text(&entry.description()).await?;
        self.db
            .history
            .insert(entry, NamedVectors::new().with(VectorSlot::Text, vector))
            .await
    }
}

fn require_patient(patient_id: &str) -> Result<&str> {
    let trimmed = patient_id.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("patient_id is required".to_string()));
    }
    Ok(trimmed)
}

/// Canonical form of a client path: no leading/trailing slashes, every
/// segment a valid entry name.
fn normalize_path(path: &str) -> Result<String> {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    let segments = trimmed
        .split('/')
        .map(validate_entry_name)
        .collect::<Result<Vec<_>>>()?;
    Ok(segments.join("/"))
}

/// Replace the `old` prefix of `path` with `new`.
fn rebase(path: &str, old: &str, new: &str) -> String {
    if path == old {
        return new.to_string();
    }
    match path.strip_prefix(old).filter(|rest| rest.starts_with('/')) {
        Some(rest) => format!("{}{}", new, rest),
        None => path.to_string(),
    }
}

fn file_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}
