//! Error types for the hcictl library
//!
//! `HciError` covers the transport (the raw socket and the packet framing on
//! top of it). `Error` is what controller operations return.

use thiserror::Error;

/// Errors that can occur when working with HCI sockets
#[derive(Error, Debug)]
pub enum HciError {
    #[error("Failed to open HCI socket: {0}")]
    SocketError(#[from] std::io::Error),

    #[error("Failed to bind to HCI device: {0}")]
    BindError(std::io::Error),

    #[error("Failed to send HCI command: {0}")]
    SendError(std::io::Error),

    #[error("Failed to receive HCI event: {0}")]
    ReceiveError(std::io::Error),

    #[error("Timed out waiting for HCI event")]
    Timeout,

    #[error("Invalid HCI packet format")]
    InvalidPacketFormat,

    #[error("Transport is closed")]
    Closed,
}

/// Errors returned by controller, device table and scan operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to open controller: {0}")]
    OpenFailed(String),

    #[error("Controller is busy ({0})")]
    ControllerBusy(crate::hci::ControllerState),

    #[error("Controller is closed")]
    Closed,

    #[error("Timed out waiting for event for opcode {0:#06x}")]
    Timeout(u16),

    #[error("Controller could not be resynchronized, close and reopen it")]
    ControllerUnrecoverable,

    #[error("No link to {0}")]
    NotConnected(crate::gap::BdAddr),

    #[error("Command {opcode:#06x} failed with status {status:#04x}")]
    CommandFailed { opcode: u16, status: u8 },

    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    #[error("Transport error: {0}")]
    Transport(#[from] HciError),
}

pub type Result<T> = std::result::Result<T, Error>;
