//! Transport abstraction
//!
//! The core never owns the radio. An external transport (in practice a BLE
//! GATT server or client glue) implements [`Transport`] for the send side,
//! and pushes inbound traffic into [`crate::device::StreamController`]
//! (commands, connect/disconnect) or [`crate::host::HostSession`]
//! (notifications) on the receive side.

use crate::error::LinkError;

/// Logical endpoints multiplexed over one physical link
///
/// These correspond one-to-one to the peripheral's GATT characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Host → device command tokens
    Control,
    /// Device → host status reports (JSON)
    Status,
    /// Single-capture image transfers (chunked)
    Image,
    /// Continuous frame-stream transfers (chunked)
    Frame,
    /// Continuous audio packets (unfragmented)
    Audio,
}

/// Send-side contract of the wireless link
///
/// Implementations must be cheap to call from the capture activities: a
/// `notify` may block briefly for link pacing but never for the duration of
/// a whole transfer. Payloads above [`max_payload`](Transport::max_payload)
/// are rejected, never truncated.
pub trait Transport: Send + Sync {
    /// Maximum bytes deliverable in one notification
    fn max_payload(&self) -> usize;

    /// Whether a peer is currently connected
    fn is_connected(&self) -> bool;

    /// Deliver one notification on the given logical endpoint
    fn notify(&self, endpoint: Endpoint, payload: &[u8]) -> Result<(), LinkError>;
}
