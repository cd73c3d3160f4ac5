//! Bluetooth HCI (Host Controller Interface) implementation
//!
//! This module provides the command/event codec, the transport contract with
//! its raw socket implementation, and the controller state machine on top.

pub mod constants;
pub mod controller;
pub mod features;
pub mod packet;
pub mod socket;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use controller::{Controller, ControllerConfig, ControllerState, Resolution, DEFAULT_TIMEOUT};
pub use features::{LeFeatures, LeStates};
pub use packet::{
    AdvertisingParameters, ConnectionParameters, DisconnectionComplete, HciCommand, HciEvent,
    LeAdvertisingReport, LeConnectionComplete,
};
pub use socket::{HciSocket, SocketConfig};
pub use transport::Transport;
