//! HCI packet structures and parsing
//!
//! This module contains structures and methods for handling HCI packets.

use crate::error::HciError;
use crate::gap::{Address, BdAddr};
use crate::hci::constants::*;
use byteorder::{ByteOrder, LittleEndian};

/// Parameters for LE Set Advertising Parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingParameters {
    /// In 0.625 ms units
    pub interval_min: u16,
    pub interval_max: u16,
    pub advertising_type: u8,
    pub own_address_type: u8,
    pub peer_address_type: u8,
    pub peer_address: BdAddr,
    pub channel_map: u8,
    pub filter_policy: u8,
}

impl Default for AdvertisingParameters {
    fn default() -> Self {
        Self {
            interval_min: 0x0800, // 1.28 s
            interval_max: 0x0800,
            advertising_type: 0x00, // ADV_IND
            own_address_type: 0x00,
            peer_address_type: 0x00,
            peer_address: BdAddr::default(),
            channel_map: 0x07, // all three channels
            filter_policy: 0x00,
        }
    }
}

/// Parameters for LE Create Connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    pub scan_interval: u16,
    pub scan_window: u16,
    pub own_address_type: u8,
    pub conn_interval_min: u16,
    pub conn_interval_max: u16,
    pub conn_latency: u16,
    pub supervision_timeout: u16,
}

impl Default for ConnectionParameters {
    fn default() -> Self {
        Self {
            scan_interval: 0x0010,
            scan_window: 0x0010,
            own_address_type: 0x00,
            conn_interval_min: 0x0006, // 7.5 ms
            conn_interval_max: 0x0008, // 10 ms
            conn_latency: 0x0000,
            supervision_timeout: 0x0048, // 720 ms
        }
    }
}

/// HCI commands issued by the controller state machine
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum HciCommand {
    // Link Control Commands (OGF: 0x01)
    Disconnect { handle: u16, reason: u8 },

    // Host Controller Commands (OGF: 0x03)
    Reset,

    // Informational Parameters (OGF: 0x04)
    ReadBdAddr,

    // Status Parameters (OGF: 0x05)
    ReadRssi { handle: u16 },

    // LE Commands (OGF: 0x08)
    LeReadLocalSupportedFeatures,
    LeReadSupportedStates,
    LeSetScanParameters {
        scan_type: u8,
        scan_interval: u16,
        scan_window: u16,
        own_address_type: u8,
        filter_policy: u8,
    },
    LeSetScanEnable { enable: bool, filter_duplicates: bool },
    LeSetAdvertisingParameters(AdvertisingParameters),
    LeSetAdvertisingData { data: Vec<u8> },
    LeSetAdvertiseEnable { enable: bool },
    LeCreateConnection {
        peer_address_type: u8,
        peer_address: BdAddr,
        params: ConnectionParameters,
    },
    LeReadWhiteListSize,
    LeClearWhiteList,
    LeAddDeviceToWhiteList { address_type: u8, address: BdAddr },
    LeRemoveDeviceFromWhiteList { address_type: u8, address: BdAddr },
}

impl HciCommand {
    /// Get the OGF and OCF for this command
    pub fn opcode_parts(&self) -> (u8, u16) {
        match self {
            Self::Disconnect { .. } => (OGF_LINK_CTL, OCF_DISCONNECT),
            Self::Reset => (OGF_HOST_CTL, OCF_RESET),
            Self::ReadBdAddr => (OGF_INFO_PARAM, OCF_READ_BD_ADDR),
            Self::ReadRssi { .. } => (OGF_STATUS_PARAM, OCF_READ_RSSI),
            Self::LeReadLocalSupportedFeatures => (OGF_LE, OCF_LE_READ_LOCAL_SUPPORTED_FEATURES),
            Self::LeReadSupportedStates => (OGF_LE, OCF_LE_READ_SUPPORTED_STATES),
            Self::LeSetScanParameters { .. } => (OGF_LE, OCF_LE_SET_SCAN_PARAMETERS),
            Self::LeSetScanEnable { .. } => (OGF_LE, OCF_LE_SET_SCAN_ENABLE),
            Self::LeSetAdvertisingParameters(_) => (OGF_LE, OCF_LE_SET_ADVERTISING_PARAMETERS),
            Self::LeSetAdvertisingData { .. } => (OGF_LE, OCF_LE_SET_ADVERTISING_DATA),
            Self::LeSetAdvertiseEnable { .. } => (OGF_LE, OCF_LE_SET_ADVERTISING_ENABLE),
            Self::LeCreateConnection { .. } => (OGF_LE, OCF_LE_CREATE_CONNECTION),
            Self::LeReadWhiteListSize => (OGF_LE, OCF_LE_READ_WHITE_LIST_SIZE),
            Self::LeClearWhiteList => (OGF_LE, OCF_LE_CLEAR_WHITE_LIST),
            Self::LeAddDeviceToWhiteList { .. } => (OGF_LE, OCF_LE_ADD_DEVICE_TO_WHITE_LIST),
            Self::LeRemoveDeviceFromWhiteList { .. } => {
                (OGF_LE, OCF_LE_REMOVE_DEVICE_FROM_WHITE_LIST)
            }
        }
    }

    pub fn opcode(&self) -> u16 {
        let (ogf, ocf) = self.opcode_parts();
        opcode(ogf, ocf)
    }

    /// Whether the controller answers with Command Status rather than Command Complete
    pub fn expects_status(&self) -> bool {
        matches!(self, Self::LeCreateConnection { .. } | Self::Disconnect { .. })
    }

    /// Convert the command to its raw parameter bytes
    fn parameters(&self) -> Vec<u8> {
        match self {
            Self::Reset
            | Self::ReadBdAddr
            | Self::LeReadLocalSupportedFeatures
            | Self::LeReadSupportedStates
            | Self::LeReadWhiteListSize
            | Self::LeClearWhiteList => vec![],

            Self::Disconnect { handle, reason } => {
                let mut params = Vec::with_capacity(3);
                params.extend_from_slice(&handle.to_le_bytes());
                params.push(*reason);
                params
            }

            Self::ReadRssi { handle } => handle.to_le_bytes().to_vec(),

            Self::LeSetScanParameters {
                scan_type,
                scan_interval,
                scan_window,
                own_address_type,
                filter_policy,
            } => {
                let mut params = Vec::with_capacity(7);
                params.push(*scan_type);
                params.extend_from_slice(&scan_interval.to_le_bytes());
                params.extend_from_slice(&scan_window.to_le_bytes());
                params.push(*own_address_type);
                params.push(*filter_policy);
                params
            }

            Self::LeSetScanEnable {
                enable,
                filter_duplicates,
            } => vec![*enable as u8, *filter_duplicates as u8],

            Self::LeSetAdvertisingParameters(p) => {
                let mut params = Vec::with_capacity(15);
                params.extend_from_slice(&p.interval_min.to_le_bytes());
                params.extend_from_slice(&p.interval_max.to_le_bytes());
                params.push(p.advertising_type);
                params.push(p.own_address_type);
                params.push(p.peer_address_type);
                params.extend_from_slice(p.peer_address.as_slice());
                params.push(p.channel_map);
                params.push(p.filter_policy);
                params
            }

            Self::LeSetAdvertisingData { data } => {
                // Length byte followed by a fixed 31 byte, zero padded field
                let len = data.len().min(LE_ADVERTISING_DATA_LEN);
                let mut params = Vec::with_capacity(1 + LE_ADVERTISING_DATA_LEN);
                params.push(len as u8);
                params.extend_from_slice(&data[..len]);
                params.resize(1 + LE_ADVERTISING_DATA_LEN, 0);
                params
            }

            Self::LeSetAdvertiseEnable { enable } => vec![*enable as u8],

            Self::LeCreateConnection {
                peer_address_type,
                peer_address,
                params: p,
            } => {
                let mut params = Vec::with_capacity(25);
                params.extend_from_slice(&p.scan_interval.to_le_bytes());
                params.extend_from_slice(&p.scan_window.to_le_bytes());
                params.push(0x00); // Initiator filter policy: use peer address
                params.push(*peer_address_type);
                params.extend_from_slice(peer_address.as_slice());
                params.push(p.own_address_type);
                params.extend_from_slice(&p.conn_interval_min.to_le_bytes());
                params.extend_from_slice(&p.conn_interval_max.to_le_bytes());
                params.extend_from_slice(&p.conn_latency.to_le_bytes());
                params.extend_from_slice(&p.supervision_timeout.to_le_bytes());
                params.extend_from_slice(&0u16.to_le_bytes()); // Min CE length
                params.extend_from_slice(&0u16.to_le_bytes()); // Max CE length
                params
            }

            Self::LeAddDeviceToWhiteList {
                address_type,
                address,
            }
            | Self::LeRemoveDeviceFromWhiteList {
                address_type,
                address,
            } => {
                let mut params = Vec::with_capacity(7);
                params.push(*address_type);
                params.extend_from_slice(address.as_slice());
                params
            }
        }
    }

    /// Convert the command to a raw HCI packet
    pub fn to_packet(&self) -> Vec<u8> {
        let params = self.parameters();

        let mut packet = vec![HCI_COMMAND_PKT];
        packet.extend_from_slice(&self.opcode().to_le_bytes());
        packet.push(params.len() as u8);
        packet.extend_from_slice(&params);
        packet
    }
}

/// HCI Event packet
#[derive(Debug, Clone)]
pub struct HciEvent {
    pub event_code: u8,
    pub parameter_total_length: u8,
    pub parameters: Vec<u8>,
}

impl HciEvent {
    /// Parse an HCI event from raw bytes (event header onwards)
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 2 {
            return None;
        }

        let event_code = data[0];
        let parameter_total_length = data[1];

        if data.len() < (parameter_total_length as usize + 2) {
            return None;
        }

        let parameters = data[2..(parameter_total_length as usize + 2)].to_vec();

        Some(HciEvent {
            event_code,
            parameter_total_length,
            parameters,
        })
    }

    /// Parse a packet as read from the transport, packet type indicator included
    pub fn from_packet(packet: &[u8]) -> Result<Self, HciError> {
        match packet.split_first() {
            Some((&HCI_EVENT_PKT, rest)) => Self::parse(rest).ok_or(HciError::InvalidPacketFormat),
            _ => Err(HciError::InvalidPacketFormat),
        }
    }

    /// Serialize back to a transport packet, indicator included
    pub fn to_packet(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(self.parameters.len() + 3);
        packet.push(HCI_EVENT_PKT);
        packet.push(self.event_code);
        packet.push(self.parameters.len() as u8);
        packet.extend_from_slice(&self.parameters);
        packet
    }

    pub fn get_event_code(&self) -> u8 {
        self.event_code
    }

    pub fn get_parameters(&self) -> &[u8] {
        &self.parameters
    }

    /// Opcode and return parameters of a Command Complete event
    pub fn command_complete(&self) -> Option<(u16, &[u8])> {
        if self.event_code != EVT_CMD_COMPLETE || self.parameters.len() < 3 {
            return None;
        }
        let opcode = LittleEndian::read_u16(&self.parameters[1..3]);
        Some((opcode, &self.parameters[3..]))
    }

    /// Opcode and status of a Command Status event
    pub fn command_status(&self) -> Option<(u16, u8)> {
        if self.event_code != EVT_CMD_STATUS || self.parameters.len() < 4 {
            return None;
        }
        let opcode = LittleEndian::read_u16(&self.parameters[2..4]);
        Some((opcode, self.parameters[0]))
    }

    /// Check if this is a Command Complete event for the given command
    pub fn is_command_complete(&self, ogf: u8, ocf: u16) -> bool {
        matches!(self.command_complete(), Some((op, _)) if op == opcode(ogf, ocf))
    }

    /// The opcode this event answers, if it is Command Complete or Command Status
    pub fn answered_opcode(&self) -> Option<u16> {
        self.command_complete()
            .map(|(op, _)| op)
            .or_else(|| self.command_status().map(|(op, _)| op))
    }

    /// Status of a Command Complete / Command Status event
    pub fn get_status(&self) -> u8 {
        if let Some((_, status)) = self.command_status() {
            return status;
        }
        match self.command_complete() {
            Some((_, ret)) if !ret.is_empty() => ret[0],
            _ => 0xFF,
        }
    }

    /// Subevent code of an LE Meta event
    pub fn le_subevent(&self) -> Option<u8> {
        if self.event_code == EVT_LE_META_EVENT {
            self.parameters.first().copied()
        } else {
            None
        }
    }

    pub fn is_advertising_report(&self) -> bool {
        self.le_subevent() == Some(EVT_LE_ADVERTISING_REPORT)
    }
}

/// LE Advertising Report Event
#[derive(Debug, Clone)]
pub struct LeAdvertisingReport {
    pub event_type: u8,
    pub address_type: u8,
    pub address: [u8; 6],
    pub data_length: u8,
    pub data: Vec<u8>,
    pub rssi: i8,
}

impl LeAdvertisingReport {
    /// Parse every report carried by an LE Advertising Report meta event.
    ///
    /// Fields are grouped across reports: all event types, then all address
    /// types, all addresses, all data lengths, all data, and all RSSI values.
    pub fn parse_from_event(event: &HciEvent) -> Result<Vec<Self>, HciError> {
        if !event.is_advertising_report() {
            return Err(HciError::InvalidPacketFormat);
        }

        let params = &event.parameters;
        let num_reports = *params.get(1).ok_or(HciError::InvalidPacketFormat)? as usize;

        let event_types = 2;
        let address_types = event_types + num_reports;
        let addresses = address_types + num_reports;
        let lengths = addresses + 6 * num_reports;
        let data_start = lengths + num_reports;

        if params.len() < data_start {
            return Err(HciError::InvalidPacketFormat);
        }

        let data_total: usize = params[lengths..data_start]
            .iter()
            .map(|&l| l as usize)
            .sum();
        let rssis = data_start + data_total;

        if params.len() < rssis + num_reports {
            return Err(HciError::InvalidPacketFormat);
        }

        let mut reports = Vec::with_capacity(num_reports);
        let mut data_offset = data_start;
        for i in 0..num_reports {
            let mut address = [0u8; 6];
            address.copy_from_slice(&params[addresses + 6 * i..addresses + 6 * (i + 1)]);

            let data_length = params[lengths + i];
            let data = params[data_offset..data_offset + data_length as usize].to_vec();
            data_offset += data_length as usize;

            reports.push(LeAdvertisingReport {
                event_type: params[event_types + i],
                address_type: params[address_types + i],
                address,
                data_length,
                data,
                rssi: params[rssis + i] as i8,
            });
        }

        Ok(reports)
    }

    pub fn bd_addr(&self) -> BdAddr {
        BdAddr::new(self.address)
    }

    pub fn address(&self) -> crate::error::Result<Address> {
        Address::parse(self.address, self.address_type)
    }
}

/// LE Connection Complete subevent
#[derive(Debug, Clone)]
pub struct LeConnectionComplete {
    pub status: u8,
    pub connection_handle: u16,
    pub role: u8,
    pub peer_address_type: u8,
    pub peer_address: [u8; 6],
    pub conn_interval: u16,
    pub conn_latency: u16,
    pub supervision_timeout: u16,
    pub master_clock_accuracy: u8,
}

impl LeConnectionComplete {
    pub fn parse(event: &HciEvent) -> Option<Self> {
        if event.le_subevent() != Some(EVT_LE_CONN_COMPLETE) || event.parameters.len() < 19 {
            return None;
        }
        let p = &event.parameters;
        let mut peer_address = [0u8; 6];
        peer_address.copy_from_slice(&p[6..12]);

        Some(Self {
            status: p[1],
            connection_handle: LittleEndian::read_u16(&p[2..4]) & 0x0FFF,
            role: p[4],
            peer_address_type: p[5],
            peer_address,
            conn_interval: LittleEndian::read_u16(&p[12..14]),
            conn_latency: LittleEndian::read_u16(&p[14..16]),
            supervision_timeout: LittleEndian::read_u16(&p[16..18]),
            master_clock_accuracy: p[18],
        })
    }
}

/// Disconnection Complete event
#[derive(Debug, Clone)]
pub struct DisconnectionComplete {
    pub status: u8,
    pub connection_handle: u16,
    pub reason: u8,
}

impl DisconnectionComplete {
    pub fn parse(event: &HciEvent) -> Option<Self> {
        if event.event_code != EVT_DISCONN_COMPLETE || event.parameters.len() < 4 {
            return None;
        }
        Some(Self {
            status: event.parameters[0],
            connection_handle: LittleEndian::read_u16(&event.parameters[1..3]) & 0x0FFF,
            reason: event.parameters[3],
        })
    }
}
