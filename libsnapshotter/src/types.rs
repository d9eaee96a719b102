//! Caller-facing data model of the snapshotter connection.
//!
//! These types are what the façade accepts and returns.  Wire messages live
//! in [`crate::message`]; nothing here carries protobuf types, so callers can
//! mirror results straight into their own resource objects.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque key/value parameters forwarded to the driver (snapshot class
/// parameters).
pub type Parameters = HashMap<String, String>;

/// Credential material forwarded to the driver.  Never logged.
pub type Secrets = HashMap<String, String>;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// The source volume of a snapshot.
///
/// Only volumes provisioned by a CSI driver carry a `volume_handle`; asking
/// to snapshot a volume without one fails before any remote call is made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRef {
    /// Name of the persistent volume, used in error messages.
    pub name: String,
    /// Driver-assigned handle of the volume.
    #[serde(default)]
    pub volume_handle: Option<String>,
}

impl VolumeRef {
    /// A volume backed by a CSI driver.
    pub fn csi(name: impl Into<String>, volume_handle: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            volume_handle: Some(volume_handle.into()),
        }
    }

    /// The volume handle, if present and non-empty.
    pub fn handle(&self) -> Option<&str> {
        self.volume_handle.as_deref().filter(|h| !h.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Result of a successful `create_snapshot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSnapshot {
    /// Name of the driver that cut the snapshot.
    pub driver_name: String,
    /// Driver-assigned snapshot id.
    pub snapshot_id: String,
    /// Creation time in nanoseconds since the Unix epoch.
    pub creation_time: i64,
    /// Size of the snapshot in bytes.
    pub size_bytes: i64,
    /// Whether the snapshot can be used as a restore source yet.
    pub ready_to_use: bool,
}

impl fmt::Display for CreatedSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "driver name [{}] snapshot ID [{}] time stamp [{}] size [{}] readyToUse [{}]",
            self.driver_name, self.snapshot_id, self.creation_time, self.size_bytes, self.ready_to_use
        )
    }
}

/// Result of a successful `get_snapshot_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStatus {
    /// Whether the snapshot can be used as a restore source yet.
    pub ready_to_use: bool,
    /// Creation time in nanoseconds since the Unix epoch.
    pub creation_time: i64,
    /// Size of the snapshot in bytes.
    pub size_bytes: i64,
}

/// Information about the CSI plugin behind the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Plugin name, e.g. `"csi.example.com"`.
    pub name: String,
    /// Vendor-provided version string.
    #[serde(default)]
    pub vendor_version: String,
    /// Opaque vendor manifest.
    #[serde(default)]
    pub manifest: HashMap<String, String>,
}
