//! tonic client used by the snapshotter to issue CSI requests.

use async_trait::async_trait;
use tonic::Code;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tracing::instrument;

use crate::context::CallContext;
use crate::error::CsiError;
use crate::message::*;

use super::DriverRpc;
use super::channel::DriverChannel;

/// [`DriverRpc`] over a gRPC [`DriverChannel`].
///
/// Each call takes a cheap clone of the channel, so concurrent calls share
/// one HTTP/2 connection and never block each other here.
#[derive(Debug)]
pub struct GrpcDriver {
    channel: DriverChannel,
}

impl GrpcDriver {
    /// Issue calls over `channel`.
    pub fn new(channel: DriverChannel) -> Self {
        Self { channel }
    }

    /// The channel calls go through.
    pub fn channel(&self) -> &DriverChannel {
        &self.channel
    }

    /// Send one unary request and wait for its response.
    ///
    /// The remaining deadline travels as `grpc-timeout` so the driver can
    /// give up too, and is enforced locally as well.
    #[instrument(skip(self, ctx, req), level = "trace")]
    async fn unary<Req, Resp>(
        &self,
        ctx: &CallContext,
        path: &'static str,
        req: Req,
    ) -> Result<Resp, CsiError>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut request = tonic::Request::new(req);
        if let Some(remaining) = ctx.remaining() {
            request.set_timeout(remaining);
        }

        let result = ctx
            .run(async move {
                let mut grpc = Grpc::new(self.channel.channel().await?);
                grpc.ready().await.map_err(|e| {
                    CsiError::Rpc(tonic::Status::unavailable(format!(
                        "service was not ready: {e}"
                    )))
                })?;
                let codec: ProstCodec<Req, Resp> = ProstCodec::default();
                let response = grpc
                    .unary(request, PathAndQuery::from_static(path), codec)
                    .await?;
                Ok(response.into_inner())
            })
            .await;
        result.map_err(|e| local_deadline(ctx, e))
    }
}

/// tonic enforces the `grpc-timeout` it sends and reports expiry as
/// `CANCELLED`; once the caller's deadline has passed that is ours.
fn local_deadline(ctx: &CallContext, err: CsiError) -> CsiError {
    match err {
        CsiError::Rpc(status) if status.code() == Code::Cancelled && ctx.is_expired() => {
            CsiError::DeadlineExceeded
        }
        other => other,
    }
}

#[async_trait]
impl DriverRpc for GrpcDriver {
    async fn get_plugin_info(
        &self,
        ctx: &CallContext,
        req: GetPluginInfoRequest,
    ) -> Result<GetPluginInfoResponse, CsiError> {
        self.unary(ctx, method::GET_PLUGIN_INFO, req).await
    }

    async fn get_plugin_capabilities(
        &self,
        ctx: &CallContext,
        req: GetPluginCapabilitiesRequest,
    ) -> Result<GetPluginCapabilitiesResponse, CsiError> {
        self.unary(ctx, method::GET_PLUGIN_CAPABILITIES, req).await
    }

    async fn probe(
        &self,
        ctx: &CallContext,
        req: ProbeRequest,
    ) -> Result<ProbeResponse, CsiError> {
        self.unary(ctx, method::PROBE, req).await
    }

    async fn controller_get_capabilities(
        &self,
        ctx: &CallContext,
        req: ControllerGetCapabilitiesRequest,
    ) -> Result<ControllerGetCapabilitiesResponse, CsiError> {
        self.unary(ctx, method::CONTROLLER_GET_CAPABILITIES, req)
            .await
    }

    async fn create_snapshot(
        &self,
        ctx: &CallContext,
        req: CreateSnapshotRequest,
    ) -> Result<CreateSnapshotResponse, CsiError> {
        self.unary(ctx, method::CREATE_SNAPSHOT, req).await
    }

    async fn delete_snapshot(
        &self,
        ctx: &CallContext,
        req: DeleteSnapshotRequest,
    ) -> Result<DeleteSnapshotResponse, CsiError> {
        self.unary(ctx, method::DELETE_SNAPSHOT, req).await
    }

    async fn list_snapshots(
        &self,
        ctx: &CallContext,
        req: ListSnapshotsRequest,
    ) -> Result<ListSnapshotsResponse, CsiError> {
        self.unary(ctx, method::LIST_SNAPSHOTS, req).await
    }

    fn close(&self) -> Result<(), CsiError> {
        self.channel.close()
    }
}
