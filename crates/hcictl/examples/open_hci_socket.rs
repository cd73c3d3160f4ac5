//! Example: Opening a controller
//!
//! Opens the adapter named on the command line (default hci0) and prints what
//! it supports.
//!
//! Note: This example requires root privileges to run, as opening raw HCI sockets
//! requires elevated permissions.

use hcictl::{Controller, ControllerConfig, HciSocket, SocketConfig};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    TermLogger::init(
        LevelFilter::Debug,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let device = std::env::args().nth(1).unwrap_or_else(|| "hci0".into());
    let socket_config: SocketConfig = device.parse()?;

    let config = ControllerConfig {
        name: device.clone(),
        ..Default::default()
    };
    let controller: Controller<HciSocket> = Controller::new(socket_config, config);

    if let Err(e) = controller.open() {
        eprintln!("Failed to open {}: {}", device, e);
        eprintln!("This might be because:");
        eprintln!("1. You don't have sufficient permissions to access the Bluetooth device");
        eprintln!("2. No Bluetooth adapter is available");
        eprintln!("3. The Bluetooth adapter is not powered on");
        return Err(e.into());
    }

    match controller.local_address() {
        Some(address) => println!("{} is {}", device, address),
        None => println!("{} did not report its address", device),
    }

    let features = controller.le_read_local_supported_features()?;
    println!("LE features: {:?}", features);

    println!("LE states:");
    for (state, supported) in controller.le_read_supported_states()?.describe() {
        println!("  [{}] {}", if supported { "x" } else { " " }, state);
    }

    controller.close();
    Ok(())
}
