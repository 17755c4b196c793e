use anyhow::Result;
use async_trait::async_trait;

/// Distinguishes plain content blobs from folders during name lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    File,
    Folder,
}

/// A named object in the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirroredBlob {
    pub id: String,
    pub name: String,
}

/// Storage operations the mirror gateway is built from.
///
/// Implementations report failures as errors and never retry at this level
/// beyond transport-level backoff; create-or-update policy lives in
/// [`crate::MirrorGateway`].
#[async_trait]
pub trait ContentMirror: Send + Sync {
    /// Returns the first blob named `name` directly under `parent_id`
    /// (or anywhere visible when `parent_id` is `None`). No recursive search.
    async fn list_by_name(
        &self,
        name: &str,
        parent_id: Option<&str>,
        kind: BlobKind,
    ) -> Result<Option<MirroredBlob>>;

    /// Creates a new blob and returns its id. Never checks for existing names.
    async fn create_blob(&self, name: &str, parent_id: &str, bytes: Vec<u8>) -> Result<String>;

    /// Replaces the content of an existing blob in place.
    async fn update_blob(&self, blob_id: &str, bytes: Vec<u8>) -> Result<()>;

    /// Creates a folder unconditionally and returns its id.
    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<String>;
}
