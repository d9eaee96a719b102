//! # libsnapshotter — CSI snapshot connection for RK8s
//!
//! `libsnapshotter` is the client half of the [Container Storage
//! Interface][csi] used by the RK8s snapshot controller.  It keeps one
//! long-lived gRPC channel to a CSI driver (local socket or network
//! address) and exposes the handful of identity and controller calls the
//! snapshotter needs, with validated, normalized results.
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Results handed to callers: `CreatedSnapshot`, `SnapshotStatus`, `PluginInfo`. |
//! | [`error`] | [`CsiError`] enum covering all failure modes. |
//! | [`timestamp`] | Protobuf timestamp ⇄ absolute nanoseconds. |
//! | [`message`] | CSI v1 protobuf messages and method paths. |
//! | [`context`] | [`CallContext`]: per-call deadline and cancellation. |
//! | [`transport`] | Driver channel and tonic client behind the `DriverRpc` seam. |
//! | [`interceptor`] | Debug logging of every call with secrets stripped. |
//! | [`capability`] | Capability negotiation. |
//! | [`identity`] | [`CsiIdentity`] trait — driver name, info and health. |
//! | [`controller`] | [`CsiSnapshotController`] trait — snapshot create/delete/status. |
//! | [`connection`] | [`Connection`], the implementation of both traits. |
//! | [`config`] | [`ConnectionConfig`] loaded from the environment. |
//!
//! ## Example
//!
//! ```no_run
//! use libsnapshotter::{CallContext, Connection, ConnectionConfig, CsiIdentity};
//!
//! # async fn run() -> Result<(), libsnapshotter::CsiError> {
//! let conn = Connection::from_config(&ConnectionConfig::from_env()?).await?;
//! let name = conn
//!     .get_driver_name(&CallContext::with_timeout(std::time::Duration::from_secs(5)))
//!     .await?;
//! println!("driver: {name}");
//! # Ok(())
//! # }
//! ```
//!
//! [csi]: https://github.com/container-storage-interface/spec

pub mod capability;
pub mod config;
pub mod connection;
pub mod context;
pub mod controller;
pub mod error;
pub mod identity;
pub mod interceptor;
pub mod message;
pub mod timestamp;
pub mod transport;
pub mod types;

// Re-export the most commonly used items at crate root for convenience.
pub use config::ConnectionConfig;
pub use connection::{Connection, GrpcConnection, SnapshotterConnection};
pub use context::CallContext;
pub use controller::CsiSnapshotController;
pub use error::{CsiError, ErrorKind};
pub use identity::CsiIdentity;
pub use types::*;
