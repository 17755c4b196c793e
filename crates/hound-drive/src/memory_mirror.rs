//! In-process [`ContentMirror`] used by tests and the `--mirror-offline` startup mode.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Mutex,
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::content_mirror::{BlobKind, ContentMirror, MirroredBlob};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub kind: BlobKind,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct InMemoryMirror {
    blobs: Mutex<Vec<StoredBlob>>,
    next_id: AtomicU64,
    fail_writes: AtomicBool,
}

impl InMemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent create/update fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Inserts a blob without any name check, e.g. to seed duplicates.
    pub fn seed_blob(&self, name: &str, parent_id: Option<&str>, kind: BlobKind, bytes: &[u8]) -> Result<String> {
        let id = self.allocate_id();
        self.lock()?.push(StoredBlob {
            id: id.clone(),
            name: name.to_string(),
            parent_id: parent_id.map(str::to_string),
            kind,
            bytes: bytes.to_vec(),
        });
        Ok(id)
    }

    pub fn blobs_named(&self, name: &str, parent_id: Option<&str>) -> Vec<StoredBlob> {
        self.snapshot()
            .into_iter()
            .filter(|blob| blob.name == name && blob.parent_id.as_deref() == parent_id)
            .collect()
    }

    pub fn content_of(&self, blob_id: &str) -> Option<Vec<u8>> {
        self.snapshot()
            .into_iter()
            .find(|blob| blob.id == blob_id)
            .map(|blob| blob.bytes)
    }

    pub fn snapshot(&self) -> Vec<StoredBlob> {
        self.blobs
            .lock()
            .map(|blobs| blobs.clone())
            .unwrap_or_default()
    }

    fn allocate_id(&self) -> String {
        format!("blob-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<StoredBlob>>> {
        self.blobs
            .lock()
            .map_err(|_| anyhow!("in-memory mirror mutex is poisoned"))
    }

    fn ensure_writable(&self, operation: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("in-memory mirror rejected {operation}");
        }
        Ok(())
    }
}

#[async_trait]
impl ContentMirror for InMemoryMirror {
    async fn list_by_name(
        &self,
        name: &str,
        parent_id: Option<&str>,
        kind: BlobKind,
    ) -> Result<Option<MirroredBlob>> {
        Ok(self
            .lock()?
            .iter()
            .find(|blob| {
                blob.name == name
                    && blob.kind == kind
                    && parent_id.map_or(true, |parent| blob.parent_id.as_deref() == Some(parent))
            })
            .map(|blob| MirroredBlob {
                id: blob.id.clone(),
                name: blob.name.clone(),
            }))
    }

    async fn create_blob(&self, name: &str, parent_id: &str, bytes: Vec<u8>) -> Result<String> {
        self.ensure_writable("create")?;
        let id = self.allocate_id();
        self.lock()?.push(StoredBlob {
            id: id.clone(),
            name: name.to_string(),
            parent_id: Some(parent_id.to_string()),
            kind: BlobKind::File,
            bytes,
        });
        Ok(id)
    }

    async fn update_blob(&self, blob_id: &str, bytes: Vec<u8>) -> Result<()> {
        self.ensure_writable("update")?;
        let mut blobs = self.lock()?;
        let blob = blobs
            .iter_mut()
            .find(|blob| blob.id == blob_id)
            .ok_or_else(|| anyhow!("blob {blob_id} does not exist"))?;
        blob.bytes = bytes;
        Ok(())
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String> {
        self.ensure_writable("create folder")?;
        let id = self.allocate_id();
        self.lock()?.push(StoredBlob {
            id: id.clone(),
            name: name.to_string(),
            parent_id: parent_id.map(str::to_string),
            kind: BlobKind::Folder,
            bytes: Vec::new(),
        });
        Ok(id)
    }
}
