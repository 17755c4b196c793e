//! Create-or-update mirroring of local files into a fixed remote folder layout.

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::content_mirror::{BlobKind, ContentMirror};

pub const IMAGES_FOLDER_NAME: &str = "images";
pub const HTML_FOLDER_NAME: &str = "html";

/// Resolved folder ids: the root folder holds channel logs, with `images/`
/// and `html/` beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorLayout {
    pub root_id: String,
    pub images_id: String,
    pub html_id: String,
}

/// Named target folders inside a [`MirrorLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorTarget {
    Root,
    Html,
    Images,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Created { blob_id: String },
    Updated { blob_id: String },
}

impl SyncOutcome {
    pub fn blob_id(&self) -> &str {
        match self {
            Self::Created { blob_id } | Self::Updated { blob_id } => blob_id,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
        }
    }
}

#[derive(Clone)]
pub struct MirrorGateway {
    mirror: Arc<dyn ContentMirror>,
    layout: MirrorLayout,
}

impl MirrorGateway {
    pub fn new(mirror: Arc<dyn ContentMirror>, layout: MirrorLayout) -> Self {
        Self { mirror, layout }
    }

    /// Resolves (creating where absent) the root folder by name and its
    /// `images`/`html` children.
    pub async fn bootstrap(mirror: Arc<dyn ContentMirror>, root_folder_name: &str) -> Result<Self> {
        let root_id = ensure_folder(mirror.as_ref(), root_folder_name, None)
            .await
            .with_context(|| format!("failed to resolve mirror root folder '{root_folder_name}'"))?;
        let images_id = ensure_folder(mirror.as_ref(), IMAGES_FOLDER_NAME, Some(&root_id))
            .await
            .context("failed to resolve mirror images folder")?;
        let html_id = ensure_folder(mirror.as_ref(), HTML_FOLDER_NAME, Some(&root_id))
            .await
            .context("failed to resolve mirror html folder")?;
        info!(root_id, images_id, html_id, "mirror layout resolved");
        Ok(Self::new(
            mirror,
            MirrorLayout {
                root_id,
                images_id,
                html_id,
            },
        ))
    }

    pub fn layout(&self) -> &MirrorLayout {
        &self.layout
    }

    pub fn folder_id(&self, target: MirrorTarget) -> &str {
        match target {
            MirrorTarget::Root => &self.layout.root_id,
            MirrorTarget::Html => &self.layout.html_id,
            MirrorTarget::Images => &self.layout.images_id,
        }
    }

    /// Mirrors `local_path` as `name` inside `target`: creates the blob when
    /// absent, otherwise overwrites the first same-named blob in place.
    pub async fn sync(&self, name: &str, local_path: &Path, target: MirrorTarget) -> Result<SyncOutcome> {
        let folder_id = self.folder_id(target).to_string();
        self.sync_into_folder(name, local_path, &folder_id).await
    }

    pub async fn sync_into_folder(
        &self,
        name: &str,
        local_path: &Path,
        folder_id: &str,
    ) -> Result<SyncOutcome> {
        let bytes = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("failed to read {}", local_path.display()))?;
        let existing = self
            .mirror
            .list_by_name(name, Some(folder_id), BlobKind::File)
            .await
            .with_context(|| format!("failed to look up mirrored blob '{name}'"))?;
        let outcome = match existing {
            Some(blob) => {
                self.mirror
                    .update_blob(&blob.id, bytes)
                    .await
                    .with_context(|| format!("failed to update mirrored blob '{name}'"))?;
                SyncOutcome::Updated { blob_id: blob.id }
            }
            None => {
                let blob_id = self
                    .mirror
                    .create_blob(name, folder_id, bytes)
                    .await
                    .with_context(|| format!("failed to create mirrored blob '{name}'"))?;
                SyncOutcome::Created { blob_id }
            }
        };
        debug!(blob = name, folder_id, outcome = outcome.as_str(), "mirror sync complete");
        Ok(outcome)
    }

    /// Returns the existing folder named `name` under `parent_id`, creating it
    /// only when absent.
    pub async fn create_folder(&self, name: &str, parent_id: &str) -> Result<String> {
        ensure_folder(self.mirror.as_ref(), name, Some(parent_id)).await
    }

    /// Uploads an attachment into `images/<channel_subfolder>/`. Attachments
    /// are write-once, so this always creates.
    pub async fn upload_attachment(
        &self,
        name: &str,
        channel_subfolder: &str,
        local_path: &Path,
    ) -> Result<String> {
        let bytes = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("failed to read {}", local_path.display()))?;
        let images_id = self.layout.images_id.clone();
        let channel_folder_id = self
            .create_folder(channel_subfolder, &images_id)
            .await
            .with_context(|| format!("failed to resolve attachment folder '{channel_subfolder}'"))?;
        let blob_id = self
            .mirror
            .create_blob(name, &channel_folder_id, bytes)
            .await
            .with_context(|| format!("failed to upload attachment '{name}'"))?;
        debug!(blob = name, channel_subfolder, blob_id, "attachment uploaded");
        Ok(blob_id)
    }
}

async fn ensure_folder(
    mirror: &dyn ContentMirror,
    name: &str,
    parent_id: Option<&str>,
) -> Result<String> {
    if let Some(folder) = mirror.list_by_name(name, parent_id, BlobKind::Folder).await? {
        return Ok(folder.id);
    }
    mirror.create_folder(name, parent_id).await
}
