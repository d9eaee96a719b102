//! Request/response logging around every driver call.
//!
//! [`Logged`] decorates any [`DriverRpc`] and emits, at `debug` level, the
//! method name, the request, then the response or the error.  Payloads are
//! rendered as JSON with every field named by the [`RedactionPolicy`]
//! replaced by [`STRIPPED`].  The decorator never touches the values it
//! logs; whatever the inner transport returns is returned unchanged.

use std::collections::BTreeSet;
use std::future::Future;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{Level, debug};

use crate::context::CallContext;
use crate::error::CsiError;
use crate::message::*;
use crate::transport::DriverRpc;

/// Replacement text for redacted values.
pub const STRIPPED: &str = "***stripped***";

/// Names of fields whose values must never reach the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionPolicy {
    fields: BTreeSet<String>,
}

impl Default for RedactionPolicy {
    /// Strips the CSI `secrets` maps.
    fn default() -> Self {
        Self::empty().with_field("secrets")
    }
}

impl RedactionPolicy {
    /// A policy that redacts nothing.
    pub fn empty() -> Self {
        Self {
            fields: BTreeSet::new(),
        }
    }

    /// Also redact fields called `name`.
    pub fn with_field(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into());
        self
    }

    /// Whether a field called `name` is secret.
    pub fn is_secret(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    /// Replace secret values in `value`, at any depth.
    pub fn strip(&self, value: &mut Value) {
        match value {
            Value::Object(map) => {
                for (key, field) in map.iter_mut() {
                    if self.is_secret(key) {
                        *field = Value::String(STRIPPED.to_owned());
                    } else {
                        self.strip(field);
                    }
                }
            }
            Value::Array(items) => items.iter_mut().for_each(|item| self.strip(item)),
            _ => {}
        }
    }

    /// Render `payload` as JSON with secrets stripped.
    pub fn render<T: Serialize>(&self, payload: &T) -> String {
        match serde_json::to_value(payload) {
            Ok(mut value) => {
                self.strip(&mut value);
                value.to_string()
            }
            Err(e) => format!("<unrenderable: {e}>"),
        }
    }
}

/// A [`DriverRpc`] that logs every call made through it.
#[derive(Debug)]
pub struct Logged<R> {
    inner: R,
    policy: RedactionPolicy,
}

impl<R> Logged<R> {
    /// Wrap `inner`, redacting with `policy`.
    pub fn new(inner: R, policy: RedactionPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// The redaction policy in use.
    pub fn policy(&self) -> &RedactionPolicy {
        &self.policy
    }

    async fn intercept<Req, Resp, F>(
        &self,
        method: &'static str,
        req: &Req,
        call: F,
    ) -> Result<Resp, CsiError>
    where
        Req: Serialize,
        Resp: Serialize,
        F: Future<Output = Result<Resp, CsiError>>,
    {
        let enabled = tracing::enabled!(Level::DEBUG);
        if enabled {
            debug!(method, "GRPC call");
            debug!(method, request = %self.policy.render(req), "GRPC request");
        }

        let result = call.await;

        if enabled {
            match &result {
                Ok(resp) => debug!(method, response = %self.policy.render(resp), "GRPC response"),
                Err(e) => debug!(method, error = %e, "GRPC error"),
            }
        }
        result
    }
}

#[async_trait]
impl<R: DriverRpc> DriverRpc for Logged<R> {
    async fn get_plugin_info(
        &self,
        ctx: &CallContext,
        req: GetPluginInfoRequest,
    ) -> Result<GetPluginInfoResponse, CsiError> {
        self.intercept(method::GET_PLUGIN_INFO, &req, self.inner.get_plugin_info(ctx, req.clone()))
            .await
    }

    async fn get_plugin_capabilities(
        &self,
        ctx: &CallContext,
        req: GetPluginCapabilitiesRequest,
    ) -> Result<GetPluginCapabilitiesResponse, CsiError> {
        self.intercept(
            method::GET_PLUGIN_CAPABILITIES,
            &req,
            self.inner.get_plugin_capabilities(ctx, req.clone()),
        )
        .await
    }

    async fn probe(
        &self,
        ctx: &CallContext,
        req: ProbeRequest,
    ) -> Result<ProbeResponse, CsiError> {
        self.intercept(method::PROBE, &req, self.inner.probe(ctx, req))
            .await
    }

    async fn controller_get_capabilities(
        &self,
        ctx: &CallContext,
        req: ControllerGetCapabilitiesRequest,
    ) -> Result<ControllerGetCapabilitiesResponse, CsiError> {
        self.intercept(
            method::CONTROLLER_GET_CAPABILITIES,
            &req,
            self.inner.controller_get_capabilities(ctx, req),
        )
        .await
    }

    async fn create_snapshot(
        &self,
        ctx: &CallContext,
        req: CreateSnapshotRequest,
    ) -> Result<CreateSnapshotResponse, CsiError> {
        self.intercept(
            method::CREATE_SNAPSHOT,
            &req,
            self.inner.create_snapshot(ctx, req.clone()),
        )
        .await
    }

    async fn delete_snapshot(
        &self,
        ctx: &CallContext,
        req: DeleteSnapshotRequest,
    ) -> Result<DeleteSnapshotResponse, CsiError> {
        self.intercept(
            method::DELETE_SNAPSHOT,
            &req,
            self.inner.delete_snapshot(ctx, req.clone()),
        )
        .await
    }

    async fn list_snapshots(
        &self,
        ctx: &CallContext,
        req: ListSnapshotsRequest,
    ) -> Result<ListSnapshotsResponse, CsiError> {
        self.intercept(
            method::LIST_SNAPSHOTS,
            &req,
            self.inner.list_snapshots(ctx, req.clone()),
        )
        .await
    }

    fn close(&self) -> Result<(), CsiError> {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::transport::fake::FakeDriver;

    #[test]
    fn strips_secrets_at_any_depth() {
        let req = CreateSnapshotRequest {
            source_volume_id: "vol-abc".into(),
            name: "snap-1".into(),
            secrets: HashMap::from([("password".to_owned(), "hunter2".to_owned())]),
            parameters: HashMap::from([("tier".to_owned(), "gold".to_owned())]),
        };

        let rendered = RedactionPolicy::default().render(&req);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains(STRIPPED));
        assert!(rendered.contains("gold"));

        let mut nested = serde_json::json!({"outer": [{"secrets": {"k": "v"}}]});
        RedactionPolicy::default().strip(&mut nested);
        assert_eq!(nested["outer"][0]["secrets"], STRIPPED);
    }

    #[test]
    fn custom_policy_fields() {
        let policy = RedactionPolicy::empty().with_field("parameters");
        assert!(policy.is_secret("parameters"));
        assert!(!policy.is_secret("secrets"));
    }

    #[tokio::test]
    async fn passes_requests_and_responses_through_unchanged() {
        let fake = Arc::new(FakeDriver::new("csi.example.com"));
        let logged = Logged::new(Arc::clone(&fake), RedactionPolicy::default());
        let ctx = CallContext::background();

        let req = DeleteSnapshotRequest {
            snapshot_id: "snap-xyz".into(),
            secrets: HashMap::from([("token".to_owned(), "abc".to_owned())]),
        };
        logged.delete_snapshot(&ctx, req.clone()).await.unwrap();
        assert_eq!(fake.last_delete(), Some(req));

        let info = logged
            .get_plugin_info(&ctx, GetPluginInfoRequest {})
            .await
            .unwrap();
        assert_eq!(info.name, "csi.example.com");
    }

    #[tokio::test]
    async fn passes_errors_through_unchanged() {
        let fake = FakeDriver::new("csi.example.com")
            .with_list_error(tonic::Status::permission_denied("no"));
        let logged = Logged::new(fake, RedactionPolicy::default());

        let err = logged
            .list_snapshots(&CallContext::background(), ListSnapshotsRequest::default())
            .await
            .unwrap_err();
        let status = err.status().expect("status");
        assert_eq!(status.code(), tonic::Code::PermissionDenied);
        assert_eq!(status.message(), "no");
    }
}
