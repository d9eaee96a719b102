//! CSI Identity operations used by the snapshotter.
//!
//! The Identity service tells the snapshotter which driver it is talking to
//! and whether that driver is healthy.  Every CSI plugin must implement it.

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::CsiError;
use crate::types::PluginInfo;

/// Identity service — plugin discovery and health probing.
#[async_trait]
pub trait CsiIdentity: Send + Sync {
    /// Driver name as reported by `GetPluginInfo`.
    ///
    /// An empty name is an error, never a successful empty string.
    async fn get_driver_name(&self, ctx: &CallContext) -> Result<String, CsiError>;

    /// Full plugin information: name, vendor version and manifest.
    async fn get_plugin_info(&self, ctx: &CallContext) -> Result<PluginInfo, CsiError>;

    /// Check that the driver is ready to process requests.  Failures are
    /// returned exactly as the transport reported them.
    async fn probe(&self, ctx: &CallContext) -> Result<(), CsiError>;

    /// Whether the plugin advertises the CONTROLLER_SERVICE capability.
    async fn supports_plugin_controller_service(&self, ctx: &CallContext)
    -> Result<bool, CsiError>;
}
