//! Conversion between the protobuf wire timestamp and absolute nanoseconds.
//!
//! CSI drivers report creation times as `google.protobuf.Timestamp`.  The
//! rest of the snapshotter works with a single scalar, nanoseconds since the
//! Unix epoch, so every timestamp crossing the façade goes through
//! [`to_absolute_nanos`].  Malformed values are rejected, never clamped.

use prost_types::Timestamp;
use thiserror::Error;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// A wire timestamp that cannot be represented as absolute nanoseconds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimestampError {
    /// The response did not carry a timestamp at all.
    #[error("timestamp is missing")]
    Missing,

    /// The nanosecond remainder is outside `[0, 1e9)`.
    #[error("timestamp nanos {0} out of range [0, 999999999]")]
    InvalidNanos(i32),

    /// The instant does not fit into a signed 64-bit nanosecond count.
    #[error("timestamp {seconds}s+{nanos}ns is outside the representable range")]
    OutOfRange {
        /// Seconds component as received.
        seconds: i64,
        /// Nanoseconds component as received.
        nanos: i32,
    },
}

/// Convert a wire timestamp into nanoseconds since the Unix epoch.
///
/// `None` is treated as malformed: a snapshot-bearing response must always
/// carry its creation time.
pub fn to_absolute_nanos(ts: Option<&Timestamp>) -> Result<i64, TimestampError> {
    let ts = ts.ok_or(TimestampError::Missing)?;
    if !(0..NANOS_PER_SECOND).contains(&i64::from(ts.nanos)) {
        return Err(TimestampError::InvalidNanos(ts.nanos));
    }

    // i128 keeps the multiplication exact near i64::MIN, where the floor
    // seconds times 1e9 alone would overflow.
    let total = i128::from(ts.seconds) * i128::from(NANOS_PER_SECOND) + i128::from(ts.nanos);
    i64::try_from(total).map_err(|_| TimestampError::OutOfRange {
        seconds: ts.seconds,
        nanos: ts.nanos,
    })
}

/// Inverse of [`to_absolute_nanos`]: always yields a normalized timestamp.
pub fn from_absolute_nanos(nanos: i64) -> Timestamp {
    Timestamp {
        seconds: nanos.div_euclid(NANOS_PER_SECOND),
        // rem_euclid is in [0, 1e9), which always fits in i32.
        nanos: nanos.rem_euclid(NANOS_PER_SECOND) as i32,
    }
}
