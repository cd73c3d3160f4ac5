//! The contract between the controller state machine and the raw packet transport

use crate::error::HciError;
use std::fmt::Debug;
use std::time::Duration;

/// A bidirectional HCI packet channel to one controller.
///
/// Packets carry their type indicator as the first byte: commands go out as
/// `HCI_COMMAND_PKT ...`, events come back as `HCI_EVENT_PKT ...`.
pub trait Transport: Send + Sync + Sized + 'static {
    type Config: Clone + Debug + Send + Sync;

    /// Opens a fresh handle on the controller described by `config`
    fn open(config: &Self::Config) -> Result<Self, HciError>;

    fn send(&self, packet: &[u8]) -> Result<(), HciError>;

    /// Waits at most `timeout` for the next packet; `HciError::Timeout` if none came
    fn receive(&self, timeout: Duration) -> Result<Vec<u8>, HciError>;

    /// Releases the handle. Pending and later receives fail with `HciError::Closed`.
    fn close(&self);
}
