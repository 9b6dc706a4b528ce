//! Error taxonomy for the LIN master engine.
//!
//! Two surfaces exist side by side: the [`LinError`] returned by each
//! fallible operation, and the sticky [`ErrorFlags`] bit-set latched on the
//! engine. Flags persist across transactions until the caller clears them,
//! so cumulative bus health can be polled without missing transient faults.

use enumset::{EnumSet, EnumSetType};
use thiserror::Error;

/// Independent error conditions, latched until explicitly cleared.
///
/// A new transaction only ever adds flags; success never removes them.
#[derive(EnumSetType, Debug)]
pub enum ErrorFlag {
    /// Operation attempted while the state machine was not in the required
    /// state (misuse or prior unresolved fault).
    State,
    /// Observed bus echo did not match what was written. Indicates bus
    /// contention, a wiring fault, or a misbehaving slave.
    Echo,
    /// Expected bytes did not arrive within the timing budget. Indicates a
    /// silent or absent slave, or a broken link.
    Timeout,
    /// Slave response checksum did not match the recomputed value.
    Checksum,
    /// Unclassified fault (channel I/O failure). Should not occur on a
    /// healthy setup.
    Misc,
}

/// Snapshot of the latched error flags.
pub type ErrorFlags = EnumSet<ErrorFlag>;

/// Fault reported by a [`ByteChannel`](crate::channel::ByteChannel)
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("channel fault: {0}")]
pub struct ChannelError(pub String);

impl ChannelError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Classification of a failed engine operation.
///
/// Every variant except [`PayloadTooLong`](LinError::PayloadTooLong) has a
/// matching flag latched on the engine when it is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinError {
    #[error("state machine not in the required state")]
    State,
    #[error("bus echo did not match the transmitted bytes")]
    Echo,
    #[error("expected bytes did not arrive within the timing budget")]
    Timeout,
    #[error("slave response checksum mismatch")]
    Checksum,
    /// Request rejected before any transaction was created; no flag is
    /// latched because the bus was never touched.
    #[error("payload length {len} exceeds the 8 byte LIN maximum")]
    PayloadTooLong { len: usize },
    #[error(transparent)]
    Channel(#[from] ChannelError),
}
