//! Remote content mirroring for recorded channel logs, rendered pages, and
//! message attachments.
//!
//! [`ContentMirror`] is the narrow storage seam (lookup by name, create,
//! update, create folder). [`MirrorGateway`] builds the create-or-update and
//! idempotent-folder semantics on top of it. [`DriveApiClient`] implements the
//! seam against the Google Drive v3 REST API, and [`InMemoryMirror`] backs
//! tests and dry runs.

pub mod content_mirror;
pub mod drive_api_client;
pub mod drive_auth;
pub mod memory_mirror;
pub mod mirror_gateway;

pub use content_mirror::{BlobKind, ContentMirror, MirroredBlob};
pub use drive_api_client::{DriveApiClient, DriveApiClientConfig};
pub use drive_auth::{
    AccessTokenSource, ServiceAccountCredentials, ServiceAccountTokenSource, StaticAccessToken,
    DRIVE_SCOPE,
};
pub use memory_mirror::{InMemoryMirror, StoredBlob};
pub use mirror_gateway::{MirrorGateway, MirrorLayout, MirrorTarget, SyncOutcome};
