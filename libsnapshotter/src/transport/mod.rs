//! Transport layer for CSI driver calls.
//!
//! [`DriverRpc`] is the seam between the snapshotter façade and the wire:
//! one async method per remote call, taking and returning raw CSI messages.
//! [`GrpcDriver`] implements it over a [`DriverChannel`]; tests implement it
//! with an in-process fake.

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::CsiError;
use crate::message::*;

pub mod channel;
pub mod client;

#[cfg(test)]
pub(crate) mod fake;

pub use channel::{ConnectivityState, DriverAddress, DriverChannel};
pub use client::GrpcDriver;

/// Raw CSI identity and controller calls.
///
/// Implementations must honor `ctx`: an expired deadline or a cancelled
/// token ends the call with [`CsiError::DeadlineExceeded`] or
/// [`CsiError::Cancelled`].  They must be safe to call concurrently.
#[async_trait]
pub trait DriverRpc: Send + Sync {
    /// `Identity.GetPluginInfo`.
    async fn get_plugin_info(
        &self,
        ctx: &CallContext,
        req: GetPluginInfoRequest,
    ) -> Result<GetPluginInfoResponse, CsiError>;

    /// `Identity.GetPluginCapabilities`.
    async fn get_plugin_capabilities(
        &self,
        ctx: &CallContext,
        req: GetPluginCapabilitiesRequest,
    ) -> Result<GetPluginCapabilitiesResponse, CsiError>;

    /// `Identity.Probe`.
    async fn probe(&self, ctx: &CallContext, req: ProbeRequest)
    -> Result<ProbeResponse, CsiError>;

    /// `Controller.ControllerGetCapabilities`.
    async fn controller_get_capabilities(
        &self,
        ctx: &CallContext,
        req: ControllerGetCapabilitiesRequest,
    ) -> Result<ControllerGetCapabilitiesResponse, CsiError>;

    /// `Controller.CreateSnapshot`.
    async fn create_snapshot(
        &self,
        ctx: &CallContext,
        req: CreateSnapshotRequest,
    ) -> Result<CreateSnapshotResponse, CsiError>;

    /// `Controller.DeleteSnapshot`.
    async fn delete_snapshot(
        &self,
        ctx: &CallContext,
        req: DeleteSnapshotRequest,
    ) -> Result<DeleteSnapshotResponse, CsiError>;

    /// `Controller.ListSnapshots`.
    async fn list_snapshots(
        &self,
        ctx: &CallContext,
        req: ListSnapshotsRequest,
    ) -> Result<ListSnapshotsResponse, CsiError>;

    /// Release the underlying transport.  A second call, and every call
    /// after the first, fails with [`CsiError::ChannelClosed`].
    fn close(&self) -> Result<(), CsiError>;
}

#[async_trait]
impl<T: DriverRpc + ?Sized> DriverRpc for std::sync::Arc<T> {
    async fn get_plugin_info(
        &self,
        ctx: &CallContext,
        req: GetPluginInfoRequest,
    ) -> Result<GetPluginInfoResponse, CsiError> {
        (**self).get_plugin_info(ctx, req).await
    }

    async fn get_plugin_capabilities(
        &self,
        ctx: &CallContext,
        req: GetPluginCapabilitiesRequest,
    ) -> Result<GetPluginCapabilitiesResponse, CsiError> {
        (**self).get_plugin_capabilities(ctx, req).await
    }

    async fn probe(&self, ctx: &CallContext, req: ProbeRequest)
    -> Result<ProbeResponse, CsiError> {
        (**self).probe(ctx, req).await
    }

    async fn controller_get_capabilities(
        &self,
        ctx: &CallContext,
        req: ControllerGetCapabilitiesRequest,
    ) -> Result<ControllerGetCapabilitiesResponse, CsiError> {
        (**self).controller_get_capabilities(ctx, req).await
    }

    async fn create_snapshot(
        &self,
        ctx: &CallContext,
        req: CreateSnapshotRequest,
    ) -> Result<CreateSnapshotResponse, CsiError> {
        (**self).create_snapshot(ctx, req).await
    }

    async fn delete_snapshot(
        &self,
        ctx: &CallContext,
        req: DeleteSnapshotRequest,
    ) -> Result<DeleteSnapshotResponse, CsiError> {
        (**self).delete_snapshot(ctx, req).await
    }

    async fn list_snapshots(
        &self,
        ctx: &CallContext,
        req: ListSnapshotsRequest,
    ) -> Result<ListSnapshotsResponse, CsiError> {
        (**self).list_snapshots(ctx, req).await
    }

    fn close(&self) -> Result<(), CsiError> {
        (**self).close()
    }
}
