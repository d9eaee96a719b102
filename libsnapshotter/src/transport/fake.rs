//! In-process stand-in for a CSI driver, used by unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tonic::Status;

use crate::context::CallContext;
use crate::error::CsiError;
use crate::message::controller_service_capability::{self, rpc};
use crate::message::plugin_capability::{self, service};
use crate::message::*;
use crate::transport::DriverRpc;

/// Scripted driver: every call returns the configured reply and is
/// recorded by its gRPC method path.
pub(crate) struct FakeDriver {
    plugin_info: Result<GetPluginInfoResponse, Status>,
    plugin_capabilities: Vec<PluginCapability>,
    probe: Result<ProbeResponse, Status>,
    controller_capabilities: Result<Vec<ControllerServiceCapability>, Status>,
    create: Result<CreateSnapshotResponse, Status>,
    delete: Result<DeleteSnapshotResponse, Status>,
    list: Result<ListSnapshotsResponse, Status>,
    latency: Option<Duration>,
    calls: Mutex<Vec<&'static str>>,
    last_create: Mutex<Option<CreateSnapshotRequest>>,
    last_delete: Mutex<Option<DeleteSnapshotRequest>>,
    last_list: Mutex<Option<ListSnapshotsRequest>>,
    closed: AtomicBool,
}

pub(crate) fn controller_capability(kind: rpc::Type) -> ControllerServiceCapability {
    ControllerServiceCapability {
        r#type: Some(controller_service_capability::Type::Rpc(
            controller_service_capability::Rpc {
                r#type: kind as i32,
            },
        )),
    }
}

pub(crate) fn plugin_service(kind: service::Type) -> PluginCapability {
    PluginCapability {
        r#type: Some(plugin_capability::Type::Service(plugin_capability::Service {
            r#type: kind as i32,
        })),
    }
}

impl FakeDriver {
    /// A healthy driver called `name` with no capabilities and no snapshots.
    pub(crate) fn new(name: &str) -> Self {
        Self {
            plugin_info: Ok(GetPluginInfoResponse {
                name: name.to_owned(),
                vendor_version: "1.0.0".to_owned(),
                ..Default::default()
            }),
            plugin_capabilities: Vec::new(),
            probe: Ok(ProbeResponse { ready: Some(true) }),
            controller_capabilities: Ok(Vec::new()),
            create: Ok(CreateSnapshotResponse::default()),
            delete: Ok(DeleteSnapshotResponse {}),
            list: Ok(ListSnapshotsResponse::default()),
            latency: None,
            calls: Mutex::new(Vec::new()),
            last_create: Mutex::new(None),
            last_delete: Mutex::new(None),
            last_list: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn with_plugin_info_error(mut self, status: Status) -> Self {
        self.plugin_info = Err(status);
        self
    }

    pub(crate) fn with_plugin_capabilities(mut self, caps: Vec<PluginCapability>) -> Self {
        self.plugin_capabilities = caps;
        self
    }

    pub(crate) fn with_probe(mut self, probe: Result<ProbeResponse, Status>) -> Self {
        self.probe = probe;
        self
    }

    pub(crate) fn with_controller_capabilities(
        mut self,
        caps: Vec<ControllerServiceCapability>,
    ) -> Self {
        self.controller_capabilities = Ok(caps);
        self
    }

    pub(crate) fn with_capabilities_error(mut self, status: Status) -> Self {
        self.controller_capabilities = Err(status);
        self
    }

    pub(crate) fn with_created(mut self, snapshot: Option<Snapshot>) -> Self {
        self.create = Ok(CreateSnapshotResponse { snapshot });
        self
    }

    pub(crate) fn with_create_error(mut self, status: Status) -> Self {
        self.create = Err(status);
        self
    }

    pub(crate) fn with_delete_error(mut self, status: Status) -> Self {
        self.delete = Err(status);
        self
    }

    pub(crate) fn with_listed(mut self, snapshots: Vec<Option<Snapshot>>) -> Self {
        self.list = Ok(ListSnapshotsResponse {
            entries: snapshots
                .into_iter()
                .map(|snapshot| list_snapshots_response::Entry { snapshot })
                .collect(),
            next_token: String::new(),
        });
        self
    }

    pub(crate) fn with_list_error(mut self, status: Status) -> Self {
        self.list = Err(status);
        self
    }

    /// Delay every reply by `latency`.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Method paths called so far, in order.
    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn last_create(&self) -> Option<CreateSnapshotRequest> {
        self.last_create.lock().unwrap().clone()
    }

    pub(crate) fn last_delete(&self) -> Option<DeleteSnapshotRequest> {
        self.last_delete.lock().unwrap().clone()
    }

    pub(crate) fn last_list(&self) -> Option<ListSnapshotsRequest> {
        self.last_list.lock().unwrap().clone()
    }

    async fn reply<T: Clone>(
        &self,
        ctx: &CallContext,
        method: &'static str,
        reply: &Result<T, Status>,
    ) -> Result<T, CsiError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CsiError::ChannelClosed);
        }
        self.calls.lock().unwrap().push(method);

        ctx.run(async {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            reply.clone().map_err(CsiError::from)
        })
        .await
    }
}

#[async_trait]
impl DriverRpc for FakeDriver {
    async fn get_plugin_info(
        &self,
        ctx: &CallContext,
        _req: GetPluginInfoRequest,
    ) -> Result<GetPluginInfoResponse, CsiError> {
        self.reply(ctx, method::GET_PLUGIN_INFO, &self.plugin_info)
            .await
    }

    async fn get_plugin_capabilities(
        &self,
        ctx: &CallContext,
        _req: GetPluginCapabilitiesRequest,
    ) -> Result<GetPluginCapabilitiesResponse, CsiError> {
        let reply = Ok(GetPluginCapabilitiesResponse {
            capabilities: self.plugin_capabilities.clone(),
        });
        self.reply(ctx, method::GET_PLUGIN_CAPABILITIES, &reply)
            .await
    }

    async fn probe(
        &self,
        ctx: &CallContext,
        _req: ProbeRequest,
    ) -> Result<ProbeResponse, CsiError> {
        self.reply(ctx, method::PROBE, &self.probe).await
    }

    async fn controller_get_capabilities(
        &self,
        ctx: &CallContext,
        _req: ControllerGetCapabilitiesRequest,
    ) -> Result<ControllerGetCapabilitiesResponse, CsiError> {
        let reply = self
            .controller_capabilities
            .clone()
            .map(|capabilities| ControllerGetCapabilitiesResponse { capabilities });
        self.reply(ctx, method::CONTROLLER_GET_CAPABILITIES, &reply)
            .await
    }

    async fn create_snapshot(
        &self,
        ctx: &CallContext,
        req: CreateSnapshotRequest,
    ) -> Result<CreateSnapshotResponse, CsiError> {
        *self.last_create.lock().unwrap() = Some(req);
        self.reply(ctx, method::CREATE_SNAPSHOT, &self.create).await
    }

    async fn delete_snapshot(
        &self,
        ctx: &CallContext,
        req: DeleteSnapshotRequest,
    ) -> Result<DeleteSnapshotResponse, CsiError> {
        *self.last_delete.lock().unwrap() = Some(req);
        self.reply(ctx, method::DELETE_SNAPSHOT, &self.delete).await
    }

    async fn list_snapshots(
        &self,
        ctx: &CallContext,
        req: ListSnapshotsRequest,
    ) -> Result<ListSnapshotsResponse, CsiError> {
        *self.last_list.lock().unwrap() = Some(req);
        self.reply(ctx, method::LIST_SNAPSHOTS, &self.list).await
    }

    fn close(&self) -> Result<(), CsiError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(CsiError::ChannelClosed);
        }
        Ok(())
    }
}
