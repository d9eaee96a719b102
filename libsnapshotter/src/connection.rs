//! The snapshotter's connection to one CSI driver.
//!
//! [`Connection`] turns the raw CSI calls of a [`DriverRpc`] into the
//! operations a snapshot controller needs, checking every response before
//! handing it out: an empty driver name, a missing snapshot message or a
//! malformed timestamp is an error, never a half-filled result.  It holds no
//! state besides the transport, so one instance can be shared by any number
//! of tasks; it never retries.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::capability::CapabilityNegotiator;
use crate::config::ConnectionConfig;
use crate::context::CallContext;
use crate::controller::CsiSnapshotController;
use crate::error::CsiError;
use crate::identity::CsiIdentity;
use crate::interceptor::{Logged, RedactionPolicy};
use crate::message::controller_service_capability::rpc;
use crate::message::plugin_capability::service;
use crate::message::{
    CreateSnapshotRequest, DeleteSnapshotRequest, GetPluginInfoRequest, ListSnapshotsRequest,
    ProbeRequest, Snapshot, method,
};
use crate::timestamp::to_absolute_nanos;
use crate::transport::{DriverChannel, DriverRpc, GrpcDriver};
use crate::types::{CreatedSnapshot, Parameters, PluginInfo, Secrets, SnapshotStatus, VolumeRef};

/// Everything a snapshot controller needs from a driver connection.
pub trait SnapshotterConnection: CsiIdentity + CsiSnapshotController {
    /// Release the connection.  Calls made afterwards, including a second
    /// `close`, fail with [`CsiError::ChannelClosed`].
    fn close(&self) -> Result<(), CsiError>;
}

/// The gRPC transport stack [`Connection::open`] builds.
pub type GrpcConnection = Connection<Logged<GrpcDriver>>;

/// Snapshot operations over a [`DriverRpc`].
#[derive(Debug)]
pub struct Connection<R> {
    rpc: R,
}

impl GrpcConnection {
    /// Connect to the driver at `address`, waiting at most
    /// `connect_timeout` for the channel to become ready.
    ///
    /// An unreachable driver is not an error here: the returned connection
    /// reports the real failure on its first call.
    pub async fn open(address: &str, connect_timeout: Duration) -> Result<Self, CsiError> {
        let channel = DriverChannel::open(address, connect_timeout).await?;
        Ok(Self::new(Logged::new(
            GrpcDriver::new(channel),
            RedactionPolicy::default(),
        )))
    }

    /// [`Connection::open`] with values from a [`ConnectionConfig`].
    pub async fn from_config(config: &ConnectionConfig) -> Result<Self, CsiError> {
        Self::open(&config.endpoint, config.connect_timeout).await
    }

    /// The underlying channel, e.g. to watch its connectivity.
    pub fn channel(&self) -> &DriverChannel {
        self.rpc.inner().channel()
    }
}

impl<R: DriverRpc> Connection<R> {
    /// Issue calls through `rpc`.
    pub fn new(rpc: R) -> Self {
        Self { rpc }
    }

    /// The transport in use.
    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    /// A negotiator asking this connection's driver.
    pub fn capabilities(&self) -> CapabilityNegotiator<'_, R> {
        CapabilityNegotiator::new(&self.rpc)
    }
}

/// Snapshot fields shared by create and status results, validated.
fn checked_snapshot(
    method: &'static str,
    snapshot: Option<Snapshot>,
) -> Result<(Snapshot, i64), CsiError> {
    let snapshot =
        snapshot.ok_or_else(|| CsiError::malformed(method, "response carries no snapshot"))?;
    let creation_time = to_absolute_nanos(snapshot.creation_time.as_ref())?;
    Ok((snapshot, creation_time))
}

#[async_trait]
impl<R: DriverRpc> CsiIdentity for Connection<R> {
    async fn get_driver_name(&self, ctx: &CallContext) -> Result<String, CsiError> {
        Ok(self.get_plugin_info(ctx).await?.name)
    }

    async fn get_plugin_info(&self, ctx: &CallContext) -> Result<PluginInfo, CsiError> {
        let rsp = self
            .rpc
            .get_plugin_info(ctx, GetPluginInfoRequest {})
            .await?;
        if rsp.name.is_empty() {
            return Err(CsiError::EmptyDriverName);
        }
        Ok(PluginInfo {
            name: rsp.name,
            vendor_version: rsp.vendor_version,
            manifest: rsp.manifest,
        })
    }

    async fn probe(&self, ctx: &CallContext) -> Result<(), CsiError> {
        let rsp = self.rpc.probe(ctx, ProbeRequest {}).await?;
        if rsp.ready == Some(false) {
            debug!("driver reports it is not ready yet");
        }
        Ok(())
    }

    async fn supports_plugin_controller_service(
        &self,
        ctx: &CallContext,
    ) -> Result<bool, CsiError> {
        self.capabilities()
            .supports_plugin_service(ctx, service::Type::ControllerService)
            .await
    }
}

#[async_trait]
impl<R: DriverRpc> CsiSnapshotController for Connection<R> {
    async fn supports_controller_create_snapshot(
        &self,
        ctx: &CallContext,
    ) -> Result<bool, CsiError> {
        self.capabilities()
            .supports_controller(ctx, rpc::Type::CreateDeleteSnapshot)
            .await
    }

    async fn supports_controller_list_snapshots(
        &self,
        ctx: &CallContext,
    ) -> Result<bool, CsiError> {
        self.capabilities()
            .supports_controller(ctx, rpc::Type::ListSnapshots)
            .await
    }

    #[instrument(skip(self, ctx, volume, parameters, credentials), fields(volume = %volume.name))]
    async fn create_snapshot(
        &self,
        ctx: &CallContext,
        snapshot_name: &str,
        volume: &VolumeRef,
        parameters: Parameters,
        credentials: Secrets,
    ) -> Result<CreatedSnapshot, CsiError> {
        debug!("CSI CreateSnapshot: {snapshot_name}");
        let Some(volume_handle) = volume.handle() else {
            return Err(CsiError::InvalidArgument(format!(
                "volume {} has no CSI volume handle",
                volume.name
            )));
        };

        let driver_name = self.get_driver_name(ctx).await?;

        let req = CreateSnapshotRequest {
            source_volume_id: volume_handle.to_owned(),
            name: snapshot_name.to_owned(),
            parameters,
            secrets: credentials,
        };
        let rsp = self.rpc.create_snapshot(ctx, req).await?;

        let (snapshot, creation_time) = checked_snapshot(method::CREATE_SNAPSHOT, rsp.snapshot)?;
        if snapshot.snapshot_id.is_empty() {
            return Err(CsiError::malformed(
                method::CREATE_SNAPSHOT,
                "snapshot id is empty",
            ));
        }

        let created = CreatedSnapshot {
            driver_name,
            snapshot_id: snapshot.snapshot_id,
            creation_time,
            size_bytes: snapshot.size_bytes,
            ready_to_use: snapshot.ready_to_use,
        };
        debug!("CSI CreateSnapshot: {snapshot_name} {created}");
        Ok(created)
    }

    async fn delete_snapshot(
        &self,
        ctx: &CallContext,
        snapshot_id: &str,
        credentials: Secrets,
    ) -> Result<(), CsiError> {
        let req = DeleteSnapshotRequest {
            snapshot_id: snapshot_id.to_owned(),
            secrets: credentials,
        };
        self.rpc.delete_snapshot(ctx, req).await?;
        Ok(())
    }

    async fn get_snapshot_status(
        &self,
        ctx: &CallContext,
        snapshot_id: &str,
    ) -> Result<SnapshotStatus, CsiError> {
        let req = ListSnapshotsRequest {
            snapshot_id: snapshot_id.to_owned(),
            ..Default::default()
        };
        let rsp = self.rpc.list_snapshots(ctx, req).await?;

        // Only the first entry is consulted.
        let Some(entry) = rsp.entries.into_iter().next() else {
            return Err(CsiError::SnapshotNotFound(snapshot_id.to_owned()));
        };
        let (snapshot, creation_time) = checked_snapshot(method::LIST_SNAPSHOTS, entry.snapshot)?;

        Ok(SnapshotStatus {
            ready_to_use: snapshot.ready_to_use,
            creation_time,
            size_bytes: snapshot.size_bytes,
        })
    }
}

impl<R: DriverRpc> SnapshotterConnection for Connection<R> {
    fn close(&self) -> Result<(), CsiError> {
        self.rpc.close()
    }
}
