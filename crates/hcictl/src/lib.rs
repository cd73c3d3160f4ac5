//! hcictl - host-side driver for Bluetooth LE controllers
//!
//! This library drives a Bluetooth controller through its HCI (Host Controller
//! Interface) on Unix systems: it opens the adapter, runs LE scans, advertises,
//! manages the white list and reads link RSSI, while keeping a table of the
//! remote devices it has seen.
//!
//! ```no_run
//! use hcictl::{Controller, ControllerConfig, HciSocket, ScanOptions, SocketConfig};
//! use std::time::Duration;
//!
//! let controller: Controller<HciSocket> =
//!     Controller::new(SocketConfig { dev_id: 0 }, ControllerConfig::default());
//! controller.open()?;
//! for device in controller.scan_devices(ScanOptions::for_duration(Duration::from_secs(5)))? {
//!     println!("{}", device);
//! }
//! controller.close();
//! # Ok::<(), hcictl::Error>(())
//! ```

pub mod error;
pub mod gap;
pub mod hci;
pub mod scan;

// Re-export common types for convenience
pub use error::{Error, HciError, Result};
pub use gap::{Address, AddressType, BdAddr, Device, DeviceTable, NamePolicy, Registration};
pub use hci::{
    AdvertisingParameters, ConnectionParameters, Controller, ControllerConfig, ControllerState,
    HciCommand, HciEvent, HciSocket, LeAdvertisingReport, LeFeatures, LeStates, Resolution,
    SocketConfig, Transport,
};
pub use scan::{
    compute_device_name, parse_advertising_data, DeviceName, Scan, ScanDuration, ScanFilterPolicy,
    ScanOptions, ScanType,
};
