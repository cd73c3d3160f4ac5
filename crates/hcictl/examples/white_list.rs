//! Example: Managing the LE white list
//!
//! Usage: white_list [hciN] ADDRESS...
//!
//! Clears the white list, adds every address given, then scans only for
//! white-listed advertisers for a while.

use hcictl::{
    Address, BdAddr, Controller, ControllerConfig, HciSocket, ScanFilterPolicy, ScanOptions,
    SocketConfig,
};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let socket_config = match args.first().map(|a| a.parse::<SocketConfig>()) {
        Some(Ok(config)) => {
            args.remove(0);
            config
        }
        _ => SocketConfig::default(),
    };

    let controller: Controller<HciSocket> =
        Controller::new(socket_config, ControllerConfig::default());
    controller.open()?;

    controller.le_clear_white_list()?;
    for arg in args.iter() {
        let address = Address::public(arg.parse::<BdAddr>()?);
        controller.le_add_white_list(&address)?;
        println!("Added {}", address);
    }
    println!("White list size: {}", controller.le_get_white_list_size()?);

    let options = ScanOptions {
        filter_policy: ScanFilterPolicy::WhiteListOnly,
        ..ScanOptions::for_duration(Duration::from_secs(30))
    };

    println!("Scanning for white-listed devices for 30 seconds...");
    for device in controller.scan_devices(options)? {
        println!("{}", device);
    }

    controller.close();
    Ok(())
}
