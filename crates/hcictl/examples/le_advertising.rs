use hcictl::{AdvertisingParameters, Controller, ControllerConfig, HciSocket, SocketConfig};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let controller: Controller<HciSocket> =
        Controller::new(SocketConfig { dev_id: 0 }, ControllerConfig::default());
    controller.open()?;

    // Configure advertising parameters
    let params = AdvertisingParameters {
        interval_min: 0x0020, // 32 * 0.625ms = 20ms
        interval_max: 0x0020,
        ..Default::default()
    };

    let mut adv_data = vec![
        0x02, // Length
        0x01, // Type (Flags)
        0x06, // Value (LE General Discoverable Mode, BR/EDR Not Supported)
    ];
    let name = b"hcictl";
    adv_data.push(name.len() as u8 + 1);
    adv_data.push(0x09); // Complete Local Name
    adv_data.extend_from_slice(name);

    controller.enable_advertise(&params, &adv_data)?;
    println!("Started advertising");

    // Wait for user input to stop advertising
    println!("Press Enter to stop advertising...");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    controller.disable_advertise()?;
    println!("Stopped advertising");

    controller.close();
    Ok(())
}
