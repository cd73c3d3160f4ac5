// Address type tags as carried in HCI parameters
pub const PUBLIC_DEVICE_ADDRESS: u8 = 0x00;
pub const RANDOM_DEVICE_ADDRESS: u8 = 0x01;
// Not a Bluetooth value: used for devices discovered without a known type
pub const UNKNOWN_ADDRESS_TYPE: u8 = 0x12;

// Max length (bytes) of a stored device name
pub const MAX_NAME_LEN: usize = 50;

pub const UNKNOWN_NAME: &str = "UNKNOWN";

// RSSI value reported when the controller has no measurement
pub const RSSI_UNAVAILABLE: i8 = 127;
// Reported values above this are outside the valid range
pub const RSSI_MAX_VALID: i8 = 20;

// Advertising Data Types
pub const ADV_TYPE_FLAGS: u8 = 0x01;
pub const ADV_TYPE_16BIT_SERVICE_UUID_PARTIAL: u8 = 0x02;
pub const ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE: u8 = 0x03;
pub const ADV_TYPE_SHORT_LOCAL_NAME: u8 = 0x08;
pub const ADV_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
pub const ADV_TYPE_TX_POWER_LEVEL: u8 = 0x0A;
pub const ADV_TYPE_APPEARANCE: u8 = 0x19;
pub const ADV_TYPE_MANUFACTURER_SPECIFIC: u8 = 0xFF;
