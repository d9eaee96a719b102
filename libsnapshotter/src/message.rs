//! CSI v1 protocol messages used by the snapshotter.
//!
//! Only the identity and controller messages the snapshotter actually sends
//! are defined here.  Field numbers and types match `csi.proto` from the
//! Container Storage Interface spec, so these encode byte-for-byte like the
//! upstream generated types.  Every message also derives [`Serialize`] so the
//! diagnostic interceptor can render it with secrets stripped.

use std::collections::HashMap;

use serde::{Serialize, Serializer};

/// gRPC method paths of the CSI v1 services.
pub mod method {
    /// `Identity.GetPluginInfo`.
    pub const GET_PLUGIN_INFO: &str = "/csi.v1.Identity/GetPluginInfo";
    /// `Identity.GetPluginCapabilities`.
    pub const GET_PLUGIN_CAPABILITIES: &str = "/csi.v1.Identity/GetPluginCapabilities";
    /// `Identity.Probe`.
    pub const PROBE: &str = "/csi.v1.Identity/Probe";
    /// `Controller.ControllerGetCapabilities`.
    pub const CONTROLLER_GET_CAPABILITIES: &str = "/csi.v1.Controller/ControllerGetCapabilities";
    /// `Controller.CreateSnapshot`.
    pub const CREATE_SNAPSHOT: &str = "/csi.v1.Controller/CreateSnapshot";
    /// `Controller.DeleteSnapshot`.
    pub const DELETE_SNAPSHOT: &str = "/csi.v1.Controller/DeleteSnapshot";
    /// `Controller.ListSnapshots`.
    pub const LIST_SNAPSHOTS: &str = "/csi.v1.Controller/ListSnapshots";
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct GetPluginInfoRequest {}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct GetPluginInfoResponse {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub vendor_version: ::prost::alloc::string::String,
    #[prost(map = "string, string", tag = "3")]
    pub manifest: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct GetPluginCapabilitiesRequest {}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct GetPluginCapabilitiesResponse {
    #[prost(message, repeated, tag = "1")]
    pub capabilities: ::prost::alloc::vec::Vec<PluginCapability>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct PluginCapability {
    #[prost(oneof = "plugin_capability::Type", tags = "1")]
    pub r#type: ::core::option::Option<plugin_capability::Type>,
}

/// Nested message and enum types in `PluginCapability`.
pub mod plugin_capability {
    use serde::Serialize;

    #[derive(Clone, Copy, PartialEq, ::prost::Message, Serialize)]
    pub struct Service {
        #[prost(enumeration = "service::Type", tag = "1")]
        pub r#type: i32,
    }

    /// Nested message and enum types in `Service`.
    pub mod service {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
        #[repr(i32)]
        pub enum Type {
            Unknown = 0,
            ControllerService = 1,
            VolumeAccessibilityConstraints = 2,
        }

        impl Type {
            /// String value of the enum field names used in the ProtoBuf definition.
            pub fn as_str_name(&self) -> &'static str {
                match self {
                    Self::Unknown => "UNKNOWN",
                    Self::ControllerService => "CONTROLLER_SERVICE",
                    Self::VolumeAccessibilityConstraints => "VOLUME_ACCESSIBILITY_CONSTRAINTS",
                }
            }

            /// Creates an enum from field names used in the ProtoBuf definition.
            pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
                match value {
                    "UNKNOWN" => Some(Self::Unknown),
                    "CONTROLLER_SERVICE" => Some(Self::ControllerService),
                    "VOLUME_ACCESSIBILITY_CONSTRAINTS" => Some(Self::VolumeAccessibilityConstraints),
                    _ => None,
                }
            }
        }
    }

    #[derive(Clone, Copy, PartialEq, ::prost::Oneof, Serialize)]
    pub enum Type {
        #[prost(message, tag = "1")]
        Service(Service),
    }
}

#[derive(Clone, Copy, PartialEq, ::prost::Message, Serialize)]
pub struct ProbeRequest {}

#[derive(Clone, Copy, PartialEq, ::prost::Message, Serialize)]
pub struct ProbeResponse {
    #[prost(message, optional, tag = "1")]
    pub ready: ::core::option::Option<bool>,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, ::prost::Message, Serialize)]
pub struct ControllerGetCapabilitiesRequest {}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct ControllerGetCapabilitiesResponse {
    #[prost(message, repeated, tag = "1")]
    pub capabilities: ::prost::alloc::vec::Vec<ControllerServiceCapability>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message, Serialize)]
pub struct ControllerServiceCapability {
    #[prost(oneof = "controller_service_capability::Type", tags = "1")]
    pub r#type: ::core::option::Option<controller_service_capability::Type>,
}

/// Nested message and enum types in `ControllerServiceCapability`.
pub mod controller_service_capability {
    use serde::Serialize;

    #[derive(Clone, Copy, PartialEq, ::prost::Message, Serialize)]
    pub struct Rpc {
        #[prost(enumeration = "rpc::Type", tag = "1")]
        pub r#type: i32,
    }

    /// Nested message and enum types in `RPC`.
    pub mod rpc {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
        #[repr(i32)]
        pub enum Type {
            Unknown = 0,
            CreateDeleteVolume = 1,
            PublishUnpublishVolume = 2,
            ListVolumes = 3,
            GetCapacity = 4,
            CreateDeleteSnapshot = 5,
            ListSnapshots = 6,
            CloneVolume = 7,
            PublishReadonly = 8,
            ExpandVolume = 9,
        }

        impl Type {
            /// String value of the enum field names used in the ProtoBuf definition.
            pub fn as_str_name(&self) -> &'static str {
                match self {
                    Self::Unknown => "UNKNOWN",
                    Self::CreateDeleteVolume => "CREATE_DELETE_VOLUME",
                    Self::PublishUnpublishVolume => "PUBLISH_UNPUBLISH_VOLUME",
                    Self::ListVolumes => "LIST_VOLUMES",
                    Self::GetCapacity => "GET_CAPACITY",
                    Self::CreateDeleteSnapshot => "CREATE_DELETE_SNAPSHOT",
                    Self::ListSnapshots => "LIST_SNAPSHOTS",
                    Self::CloneVolume => "CLONE_VOLUME",
                    Self::PublishReadonly => "PUBLISH_READONLY",
                    Self::ExpandVolume => "EXPAND_VOLUME",
                }
            }

            /// Creates an enum from field names used in the ProtoBuf definition.
            pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
                match value {
                    "UNKNOWN" => Some(Self::Unknown),
                    "CREATE_DELETE_VOLUME" => Some(Self::CreateDeleteVolume),
                    "PUBLISH_UNPUBLISH_VOLUME" => Some(Self::PublishUnpublishVolume),
                    "LIST_VOLUMES" => Some(Self::ListVolumes),
                    "GET_CAPACITY" => Some(Self::GetCapacity),
                    "CREATE_DELETE_SNAPSHOT" => Some(Self::CreateDeleteSnapshot),
                    "LIST_SNAPSHOTS" => Some(Self::ListSnapshots),
                    "CLONE_VOLUME" => Some(Self::CloneVolume),
                    "PUBLISH_READONLY" => Some(Self::PublishReadonly),
                    "EXPAND_VOLUME" => Some(Self::ExpandVolume),
                    _ => None,
                }
            }
        }
    }

    #[derive(Clone, Copy, PartialEq, ::prost::Oneof, Serialize)]
    pub enum Type {
        #[prost(message, tag = "1")]
        Rpc(Rpc),
    }
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct CreateSnapshotRequest {
    #[prost(string, tag = "1")]
    pub source_volume_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
    #[prost(map = "string, string", tag = "3")]
    pub secrets: HashMap<String, String>,
    #[prost(map = "string, string", tag = "4")]
    pub parameters: HashMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct CreateSnapshotResponse {
    #[prost(message, optional, tag = "1")]
    pub snapshot: ::core::option::Option<Snapshot>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct Snapshot {
    #[prost(int64, tag = "1")]
    pub size_bytes: i64,
    #[prost(string, tag = "2")]
    pub snapshot_id: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub source_volume_id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "4")]
    #[serde(serialize_with = "serialize_timestamp")]
    pub creation_time: ::core::option::Option<::prost_types::Timestamp>,
    #[prost(bool, tag = "5")]
    pub ready_to_use: bool,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct DeleteSnapshotRequest {
    #[prost(string, tag = "1")]
    pub snapshot_id: ::prost::alloc::string::String,
    #[prost(map = "string, string", tag = "2")]
    pub secrets: HashMap<String, String>,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message, Serialize)]
pub struct DeleteSnapshotResponse {}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct ListSnapshotsRequest {
    #[prost(int32, tag = "1")]
    pub max_entries: i32,
    #[prost(string, tag = "2")]
    pub starting_token: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub source_volume_id: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub snapshot_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct ListSnapshotsResponse {
    #[prost(message, repeated, tag = "1")]
    pub entries: ::prost::alloc::vec::Vec<list_snapshots_response::Entry>,
    #[prost(string, tag = "2")]
    pub next_token: ::prost::alloc::string::String,
}

/// Nested message and enum types in `ListSnapshotsResponse`.
pub mod list_snapshots_response {
    use serde::Serialize;

    #[derive(Clone, PartialEq, ::prost::Message, Serialize)]
    pub struct Entry {
        #[prost(message, optional, tag = "1")]
        pub snapshot: ::core::option::Option<super::Snapshot>,
    }
}

/// `prost_types::Timestamp` has no serde support; log it as its two fields.
fn serialize_timestamp<S: Serializer>(
    ts: &Option<::prost_types::Timestamp>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Wire {
        seconds: i64,
        nanos: i32,
    }

    ts.as_ref()
        .map(|ts| Wire {
            seconds: ts.seconds,
            nanos: ts.nanos,
        })
        .serialize(serializer)
}
