//! HCI protocol constants
//!
//! This module contains constants used in the Bluetooth HCI protocol.

// HCI packet types
pub const HCI_COMMAND_PKT: u8 = 0x01;
pub const HCI_ACL_PKT: u8 = 0x02;
pub const HCI_EVENT_PKT: u8 = 0x04;

// Maximum size of HCI command parameters
pub const HCI_MAX_PARAM_LEN: usize = 255;
// Packet type + event header + parameters
pub const HCI_MAX_EVENT_SIZE: usize = 258;

// Common OGF (Opcode Group Field) values
pub const OGF_LINK_CTL: u8 = 0x01;
pub const OGF_HOST_CTL: u8 = 0x03;
pub const OGF_INFO_PARAM: u8 = 0x04;
pub const OGF_STATUS_PARAM: u8 = 0x05;
pub const OGF_LE: u8 = 0x08;

// Link Control Commands (OGF: 0x01)
pub const OCF_DISCONNECT: u16 = 0x0006;

// Host Controller Commands (OGF: 0x03)
pub const OCF_RESET: u16 = 0x0003;

// Informational Parameters (OGF: 0x04)
pub const OCF_READ_BD_ADDR: u16 = 0x0009;

// Status Parameters (OGF: 0x05)
pub const OCF_READ_RSSI: u16 = 0x0005;

// LE Command OCF values (OGF: 0x08)
pub const OCF_LE_READ_LOCAL_SUPPORTED_FEATURES: u16 = 0x0003;
pub const OCF_LE_SET_ADVERTISING_PARAMETERS: u16 = 0x0006;
pub const OCF_LE_SET_ADVERTISING_DATA: u16 = 0x0008;
pub const OCF_LE_SET_ADVERTISING_ENABLE: u16 = 0x000A;
pub const OCF_LE_SET_SCAN_PARAMETERS: u16 = 0x000B;
pub const OCF_LE_SET_SCAN_ENABLE: u16 = 0x000C;
pub const OCF_LE_CREATE_CONNECTION: u16 = 0x000D;
pub const OCF_LE_READ_WHITE_LIST_SIZE: u16 = 0x000F;
pub const OCF_LE_CLEAR_WHITE_LIST: u16 = 0x0010;
pub const OCF_LE_ADD_DEVICE_TO_WHITE_LIST: u16 = 0x0011;
pub const OCF_LE_REMOVE_DEVICE_FROM_WHITE_LIST: u16 = 0x0012;
pub const OCF_LE_READ_SUPPORTED_STATES: u16 = 0x001C;

// HCI Events
pub const EVT_DISCONN_COMPLETE: u8 = 0x05;
pub const EVT_CMD_COMPLETE: u8 = 0x0E;
pub const EVT_CMD_STATUS: u8 = 0x0F;
pub const EVT_LE_META_EVENT: u8 = 0x3E;

// LE Meta Events
pub const EVT_LE_CONN_COMPLETE: u8 = 0x01;
pub const EVT_LE_ADVERTISING_REPORT: u8 = 0x02;

// Status codes
pub const HCI_SUCCESS: u8 = 0x00;
pub const HCI_UNKNOWN_CONNECTION_ID: u8 = 0x02;
pub const HCI_REMOTE_USER_TERMINATED: u8 = 0x13;

// Advertising data payload length
pub const LE_ADVERTISING_DATA_LEN: usize = 31;

/// Builds an opcode from its group and command fields
pub const fn opcode(ogf: u8, ocf: u16) -> u16 {
    ((ogf as u16) << 10) | (ocf & 0x3ff)
}
