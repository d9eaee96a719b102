//! Capability negotiation with a CSI driver.
//!
//! Every question issues a fresh `ControllerGetCapabilities` (or
//! `GetPluginCapabilities`) call; nothing is cached.  Entries that are
//! absent, of another kind, or carry an enum value this crate does not know
//! are skipped, so an unsupported capability is `Ok(false)` and only a
//! failed call is an error.

use tracing::debug;

use crate::context::CallContext;
use crate::error::CsiError;
use crate::message::controller_service_capability::{self, rpc};
use crate::message::plugin_capability::{self, service};
use crate::message::{
    ControllerGetCapabilitiesRequest, ControllerServiceCapability, GetPluginCapabilitiesRequest,
    PluginCapability,
};
use crate::transport::DriverRpc;

/// Controller RPC capabilities named in a capability list, skipping
/// entries that do not describe one.
pub fn controller_rpcs(
    capabilities: &[ControllerServiceCapability],
) -> impl Iterator<Item = rpc::Type> + '_ {
    capabilities.iter().filter_map(|cap| match cap.r#type {
        Some(controller_service_capability::Type::Rpc(entry)) => {
            rpc::Type::try_from(entry.r#type).ok()
        }
        None => None,
    })
}

/// Plugin service capabilities named in a capability list, skipping
/// entries that do not describe one.
pub fn plugin_services(capabilities: &[PluginCapability]) -> impl Iterator<Item = service::Type> + '_ {
    capabilities.iter().filter_map(|cap| match cap.r#type {
        Some(plugin_capability::Type::Service(entry)) => {
            service::Type::try_from(entry.r#type).ok()
        }
        None => None,
    })
}

/// Answers "does the driver support X?" by asking it.
#[derive(Debug)]
pub struct CapabilityNegotiator<'a, R: ?Sized> {
    rpc: &'a R,
}

impl<'a, R: DriverRpc + ?Sized> CapabilityNegotiator<'a, R> {
    /// Negotiate over `rpc`.
    pub fn new(rpc: &'a R) -> Self {
        Self { rpc }
    }

    /// The controller RPC capabilities the driver advertises right now.
    pub async fn controller_capabilities(
        &self,
        ctx: &CallContext,
    ) -> Result<Vec<rpc::Type>, CsiError> {
        let rsp = self
            .rpc
            .controller_get_capabilities(ctx, ControllerGetCapabilitiesRequest {})
            .await?;
        Ok(controller_rpcs(&rsp.capabilities).collect())
    }

    /// Whether the driver advertises the controller capability `wanted`.
    pub async fn supports_controller(
        &self,
        ctx: &CallContext,
        wanted: rpc::Type,
    ) -> Result<bool, CsiError> {
        let supported = self.controller_capabilities(ctx).await?.contains(&wanted);
        debug!(capability = wanted.as_str_name(), supported, "controller capability");
        Ok(supported)
    }

    /// Whether the driver advertises the controller capability with the
    /// protobuf name `name`, e.g. `"LIST_SNAPSHOTS"`.  Unknown names are
    /// simply unsupported.
    pub async fn supports(&self, ctx: &CallContext, name: &str) -> Result<bool, CsiError> {
        let supported = self
            .controller_capabilities(ctx)
            .await?
            .iter()
            .any(|cap| cap.as_str_name() == name);
        debug!(capability = name, supported, "controller capability");
        Ok(supported)
    }

    /// Whether the driver advertises the plugin service `wanted`.
    pub async fn supports_plugin_service(
        &self,
        ctx: &CallContext,
        wanted: service::Type,
    ) -> Result<bool, CsiError> {
        let rsp = self
            .rpc
            .get_plugin_capabilities(ctx, GetPluginCapabilitiesRequest {})
            .await?;
        let supported = plugin_services(&rsp.capabilities).any(|svc| svc == wanted);
        debug!(service = wanted.as_str_name(), supported, "plugin capability");
        Ok(supported)
    }
}
