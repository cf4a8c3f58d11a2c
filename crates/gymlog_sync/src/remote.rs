//! Seams to the outside world: the server, credentials, the conflict
//! dialog and navigation.

use crate::error::SyncResult;
use async_trait::async_trait;
use gymlog_model::{MergeConflict, Resolutions, StagedChange, UserChanges};
use std::sync::Arc;

/// The sync server.
///
/// Implementations classify every failure into a [`crate::SyncError`]; a
/// stale version must come back as [`crate::SyncError::VersionConflict`].
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Everything that changed after `version`.
    async fn changes_since(&self, version: u64) -> SyncResult<UserChanges>;

    /// Uploads one staged change made against `change.version`.
    async fn upload(&self, change: &StagedChange) -> SyncResult<()>;
}

/// Supplies bearer tokens.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// A currently valid access token, refreshing it if needed.
    ///
    /// Fails with [`crate::SyncError::Unauthenticated`] when no token can be
    /// obtained without the user.
    async fn access_token(&self) -> SyncResult<String>;

    /// Forgets every stored credential.
    async fn logout(&self) -> SyncResult<()>;
}

/// Asks the user how to settle merge conflicts.
#[async_trait]
pub trait ConflictResolver: Send + Sync {
    /// Returns a resolution for every conflict, or `None` if the user did
    /// not decide.
    async fn resolve(&self, conflicts: &[MergeConflict]) -> Option<Resolutions>;
}

/// Sends the user to the login screen.
pub trait Navigator: Send + Sync {
    /// Called when a sync cycle ends because the credentials were refused.
    fn require_login(&self);
}

#[async_trait]
impl<T: RemoteApi + ?Sized> RemoteApi for Arc<T> {
    async fn changes_since(&self, version: u64) -> SyncResult<UserChanges> {
        (**self).changes_since(version).await
    }

    async fn upload(&self, change: &StagedChange) -> SyncResult<()> {
        (**self).upload(change).await
    }
}

#[async_trait]
impl<T: CredentialProvider + ?Sized> CredentialProvider for Arc<T> {
    async fn access_token(&self) -> SyncResult<String> {
        (**self).access_token().await
    }

    async fn logout(&self) -> SyncResult<()> {
        (**self).logout().await
    }
}

#[async_trait]
impl<T: ConflictResolver + ?Sized> ConflictResolver for Arc<T> {
    async fn resolve(&self, conflicts: &[MergeConflict]) -> Option<Resolutions> {
        (**self).resolve(conflicts).await
    }
}

impl<T: Navigator + ?Sized> Navigator for Arc<T> {
    fn require_login(&self) {
        (**self).require_login()
    }
}
