//! Shared fixtures: logging, dead addresses and in-process drivers.

#![allow(dead_code)]

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use libsnapshotter::message::controller_service_capability::{self, rpc};
use libsnapshotter::message::*;
use libsnapshotter::timestamp::from_absolute_nanos;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tonic::Status;
use tonic::body::Body;
use tonic::codec::ProstCodec;
use tonic::codegen::http;
use tonic::server::{Grpc, NamedService, UnaryService};
use tracing_subscriber::EnvFilter;

pub const DRIVER_NAME: &str = "csi.example.com";
/// Creation time reported for every snapshot the test driver cuts.
pub const CREATED_AT: i64 = 1_700_000_000_123_456_789;

pub fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A free loopback address nothing listens on.
pub fn free_address() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Accepts connections and never answers on them.
pub struct SilentDriver {
    pub address: SocketAddr,
    accepted: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl SilentDriver {
    pub async fn bind(address: SocketAddr) -> Self {
        let listener = TcpListener::bind(address).await.unwrap();
        let address = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&accepted);
        let task = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(stream);
            }
        });

        Self {
            address,
            accepted,
            task,
        }
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Stop listening and drop every accepted connection.
    pub async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

/// Start a CSI driver answering identity and controller calls on a fresh
/// loopback port.  Returns its address.
pub fn start_driver() -> String {
    let address = free_address();
    tokio::spawn(
        tonic::transport::Server::builder()
            .add_service(IdentityService)
            .add_service(ControllerService)
            .serve(address),
    );
    address.to_string()
}

fn plugin_info(_: GetPluginInfoRequest) -> Result<GetPluginInfoResponse, Status> {
    Ok(GetPluginInfoResponse {
        name: DRIVER_NAME.to_owned(),
        vendor_version: "1.2.3".to_owned(),
        manifest: [("build".to_owned(), "test".to_owned())].into(),
    })
}

fn health(_: ProbeRequest) -> Result<ProbeResponse, Status> {
    Ok(ProbeResponse { ready: Some(true) })
}

fn controller_capabilities(
    _: ControllerGetCapabilitiesRequest,
) -> Result<ControllerGetCapabilitiesResponse, Status> {
    Ok(ControllerGetCapabilitiesResponse {
        capabilities: vec![ControllerServiceCapability {
            r#type: Some(controller_service_capability::Type::Rpc(
                controller_service_capability::Rpc {
                    r#type: rpc::Type::CreateDeleteSnapshot as i32,
                },
            )),
        }],
    })
}

/// Echoes the request into the snapshot so the caller can check every
/// field made the trip.
fn create_snapshot(req: CreateSnapshotRequest) -> Result<CreateSnapshotResponse, Status> {
    if req.secrets.get("password").map(String::as_str) != Some("hunter2") {
        return Err(Status::unauthenticated("missing credentials"));
    }
    Ok(CreateSnapshotResponse {
        snapshot: Some(Snapshot {
            size_bytes: req.parameters.get("size").and_then(|s| s.parse().ok()).unwrap_or(0),
            snapshot_id: format!("{}-id", req.name),
            source_volume_id: req.source_volume_id,
            creation_time: Some(from_absolute_nanos(CREATED_AT)),
            ready_to_use: true,
        }),
    })
}

fn delete_snapshot(req: DeleteSnapshotRequest) -> Result<DeleteSnapshotResponse, Status> {
    if req.snapshot_id.is_empty() {
        return Err(Status::invalid_argument("snapshot id is required"));
    }
    Ok(DeleteSnapshotResponse {})
}

fn list_snapshots(req: ListSnapshotsRequest) -> Result<ListSnapshotsResponse, Status> {
    let entries = if req.snapshot_id == "missing" {
        Vec::new()
    } else {
        vec![list_snapshots_response::Entry {
            snapshot: Some(Snapshot {
                size_bytes: 4096,
                snapshot_id: req.snapshot_id,
                source_volume_id: "vol-abc".to_owned(),
                creation_time: Some(from_absolute_nanos(CREATED_AT)),
                ready_to_use: false,
            }),
        }]
    };
    Ok(ListSnapshotsResponse {
        entries,
        next_token: String::new(),
    })
}

/// One unary method backed by a plain function.
struct Handler<Req, Resp>(fn(Req) -> Result<Resp, Status>);

impl<Req, Resp> UnaryService<Req> for Handler<Req, Resp> {
    type Response = Resp;
    type Future = std::future::Ready<Result<tonic::Response<Resp>, Status>>;

    fn call(&mut self, request: tonic::Request<Req>) -> Self::Future {
        std::future::ready((self.0)(request.into_inner()).map(tonic::Response::new))
    }
}

async fn serve<Req, Resp>(
    handler: fn(Req) -> Result<Resp, Status>,
    req: http::Request<Body>,
) -> http::Response<Body>
where
    Req: prost::Message + Default + Send + 'static,
    Resp: prost::Message + Send + 'static,
{
    let codec: ProstCodec<Resp, Req> = ProstCodec::default();
    Grpc::new(codec).unary(Handler(handler), req).await
}

type ResponseFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<Body>, Infallible>> + Send>>;

fn dispatch(req: http::Request<Body>) -> ResponseFuture {
    Box::pin(async move {
        let path = req.uri().path().to_owned();
        let response = match path.as_str() {
            method::GET_PLUGIN_INFO => serve(plugin_info, req).await,
            method::PROBE => serve(health, req).await,
            method::CONTROLLER_GET_CAPABILITIES => serve(controller_capabilities, req).await,
            method::CREATE_SNAPSHOT => serve(create_snapshot, req).await,
            method::DELETE_SNAPSHOT => serve(delete_snapshot, req).await,
            method::LIST_SNAPSHOTS => serve(list_snapshots, req).await,
            _ => {
                let mut response = http::Response::new(Body::default());
                let headers = response.headers_mut();
                headers.insert(Status::GRPC_STATUS, (tonic::Code::Unimplemented as i32).into());
                headers.insert(http::header::CONTENT_TYPE, tonic::metadata::GRPC_CONTENT_TYPE);
                response
            }
        };
        Ok(response)
    })
}

macro_rules! csi_service {
    ($name:ident, $service:literal) => {
        #[derive(Clone)]
        struct $name;

        impl NamedService for $name {
            const NAME: &'static str = $service;
        }

        impl tower::Service<http::Request<Body>> for $name {
            type Response = http::Response<Body>;
            type Error = Infallible;
            type Future = ResponseFuture;

            fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
                Poll::Ready(Ok(()))
            }

            fn call(&mut self, req: http::Request<Body>) -> Self::Future {
                dispatch(req)
            }
        }
    };
}

csi_service!(IdentityService, "csi.v1.Identity");
csi_service!(ControllerService, "csi.v1.Controller");

/// Wait until `condition` holds, polling every few milliseconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
