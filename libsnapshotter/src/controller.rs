//! CSI Controller operations used by the snapshotter.
//!
//! Snapshot creation and deletion are optional in CSI; callers are expected
//! to ask [`CsiSnapshotController::supports_controller_create_snapshot`]
//! before relying on them.

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::CsiError;
use crate::types::{CreatedSnapshot, Parameters, Secrets, SnapshotStatus, VolumeRef};

/// Controller service — snapshot lifecycle against one driver.
#[async_trait]
pub trait CsiSnapshotController: Send + Sync {
    /// Whether the driver reports CREATE_DELETE_SNAPSHOT.
    async fn supports_controller_create_snapshot(&self, ctx: &CallContext)
    -> Result<bool, CsiError>;

    /// Whether the driver reports LIST_SNAPSHOTS.
    async fn supports_controller_list_snapshots(&self, ctx: &CallContext)
    -> Result<bool, CsiError>;

    /// Cut a snapshot called `snapshot_name` of `volume`.
    ///
    /// The driver name is fetched first so the result is attributed to the
    /// driver that actually served the request.  A volume without a handle
    /// is rejected before anything is sent.
    async fn create_snapshot(
        &self,
        ctx: &CallContext,
        snapshot_name: &str,
        volume: &VolumeRef,
        parameters: Parameters,
        credentials: Secrets,
    ) -> Result<CreatedSnapshot, CsiError>;

    /// Delete the snapshot `snapshot_id`.
    async fn delete_snapshot(
        &self,
        ctx: &CallContext,
        snapshot_id: &str,
        credentials: Secrets,
    ) -> Result<(), CsiError>;

    /// Readiness, creation time and size of `snapshot_id`.
    ///
    /// A driver that lists no entry for the id yields
    /// [`CsiError::SnapshotNotFound`].
    async fn get_snapshot_status(
        &self,
        ctx: &CallContext,
        snapshot_id: &str,
    ) -> Result<SnapshotStatus, CsiError>;
}
