//! Example: Scanning for BLE devices
//!
//! Scans for ten seconds, printing devices as they show up, then dumps the
//! device table.
//!
//! Note: This example requires root privileges to run, as opening raw HCI sockets
//! requires elevated permissions.

use hcictl::{Controller, ControllerConfig, HciSocket, ScanOptions, SocketConfig};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let device = std::env::args().nth(1).unwrap_or_else(|| "hci0".into());
    let controller: Controller<HciSocket> = Controller::new(
        device.parse::<SocketConfig>()?,
        ControllerConfig {
            name: device,
            ..Default::default()
        },
    );
    controller.open()?;

    println!("Scanning for 10 seconds...");
    let scan = controller.scan_devices(ScanOptions::for_duration(Duration::from_secs(10)))?;
    for device in scan {
        match device.rssi() {
            Some(rssi) => println!("{} ({} dBm)", device, rssi),
            None => println!("{}", device),
        }
    }

    println!("Known devices:");
    controller.devices()?.dump(&mut std::io::stdout())?;

    controller.close();
    Ok(())
}
