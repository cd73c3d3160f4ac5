//! Scripted in-memory controller for tests
//!
//! `MockController` plays the hardware: it answers every command it receives
//! with the matching Command Complete (or Command Status plus the follow-up
//! event), keeps a white list and link table, and lets tests withhold answers
//! or inject events.

use crate::error::HciError;
use crate::hci::constants::*;
use crate::hci::transport::Transport;
use byteorder::{ByteOrder, LittleEndian};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const LOCAL_ADDRESS: [u8; 6] = [0x01, 0x00, 0x00, 0xDA, 0x7E, 0x00];

#[derive(Debug, Default)]
struct Hardware {
    inbox: VecDeque<Vec<u8>>,
    sent: Vec<u16>,
    withheld: HashMap<u16, usize>,
    mute: bool,
    garbled: usize,
    fail_open: bool,
    closed: bool,
    opens: usize,
    white_list: BTreeSet<(u8, [u8; 6])>,
    links: HashMap<u16, [u8; 6]>,
    next_handle: u16,
    features: u64,
    states: u64,
    rssi: i8,
}

#[derive(Default)]
pub struct MockController {
    hardware: Mutex<Hardware>,
    ready: Condvar,
}

impl fmt::Debug for MockController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockController").finish_non_exhaustive()
    }
}

impl MockController {
    pub fn new() -> Arc<Self> {
        let controller = Self::default();
        {
            let mut hw = controller.lock();
            hw.next_handle = 0x0040;
            hw.features = 0x01;
            hw.states = 0x1FFF_FFFF;
            hw.rssi = -60;
        }
        Arc::new(controller)
    }

    /// Drops the next `count` answers to `opcode`
    pub fn withhold(&self, opcode: u16, count: usize) {
        self.lock().withheld.insert(opcode, count);
    }

    /// Stops answering anything at all
    pub fn set_mute(&self, mute: bool) {
        self.lock().mute = mute;
    }

    /// Makes the next `count` packets read by the host come out malformed
    pub fn garble(&self, count: usize) {
        self.lock().garbled = count;
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    pub fn set_features(&self, features: u64) {
        self.lock().features = features;
    }

    pub fn set_states(&self, states: u64) {
        self.lock().states = states;
    }

    pub fn set_rssi(&self, rssi: i8) {
        self.lock().rssi = rssi;
    }

    /// Opcodes of every command received, in order
    pub fn sent_opcodes(&self) -> Vec<u16> {
        self.lock().sent.clone()
    }

    pub fn opens(&self) -> usize {
        self.lock().opens
    }

    pub fn white_list_len(&self) -> usize {
        self.lock().white_list.len()
    }

    /// Queues the regular answer to `opcode`, e.g. after withholding it
    pub fn answer(&self, opcode: u16) {
        let mut hw = self.lock();
        hw.withheld.remove(&opcode);
        hw.respond(opcode, &[]);
        self.ready.notify_all();
    }

    /// Queues a raw packet for the host
    pub fn push_packet(&self, packet: Vec<u8>) {
        self.lock().inbox.push_back(packet);
        self.ready.notify_all();
    }

    /// Queues one LE Advertising Report event carrying every given
    /// (address, address type, data, rssi), fields grouped as on the wire
    pub fn advertise(&self, reports: &[([u8; 6], u8, Vec<u8>, i8)]) {
        let mut params = vec![EVT_LE_ADVERTISING_REPORT, reports.len() as u8];
        params.extend(reports.iter().map(|_| 0x00u8));
        params.extend(reports.iter().map(|r| r.1));
        for r in reports {
            params.extend_from_slice(&r.0);
        }
        params.extend(reports.iter().map(|r| r.2.len() as u8));
        for r in reports {
            params.extend_from_slice(&r.2);
        }
        params.extend(reports.iter().map(|r| r.3 as u8));

        self.push_packet(event(EVT_LE_META_EVENT, &params));
    }

    fn lock(&self) -> MutexGuard<'_, Hardware> {
        self.hardware.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Hardware {
    fn receive_command(&mut self, packet: &[u8]) {
        if packet.len() < 4 || packet[0] != HCI_COMMAND_PKT {
            return;
        }
        let opcode = LittleEndian::read_u16(&packet[1..3]);
        self.sent.push(opcode);

        if self.mute {
            return;
        }
        if let Some(count) = self.withheld.get_mut(&opcode) {
            if *count > 0 {
                *count -= 1;
                return;
            }
        }
        self.respond(opcode, &packet[4..]);
    }

    fn respond(&mut self, op: u16, params: &[u8]) {
        let address = |at: usize| -> [u8; 6] {
            let mut bytes = [0u8; 6];
            if let Some(src) = params.get(at..at + 6) {
                bytes.copy_from_slice(src);
            }
            bytes
        };

        match op {
            _ if op == opcode(OGF_HOST_CTL, OCF_RESET) => {
                self.white_list.clear();
                self.links.clear();
                self.complete(op, &[HCI_SUCCESS]);
            }
            _ if op == opcode(OGF_INFO_PARAM, OCF_READ_BD_ADDR) => {
                let mut ret = vec![HCI_SUCCESS];
                ret.extend_from_slice(&LOCAL_ADDRESS);
                self.complete(op, &ret);
            }
            _ if op == opcode(OGF_LE, OCF_LE_READ_LOCAL_SUPPORTED_FEATURES) => {
                let mut ret = vec![HCI_SUCCESS];
                ret.extend_from_slice(&self.features.to_le_bytes());
                self.complete(op, &ret);
            }
            _ if op == opcode(OGF_LE, OCF_LE_READ_SUPPORTED_STATES) => {
                let mut ret = vec![HCI_SUCCESS];
                ret.extend_from_slice(&self.states.to_le_bytes());
                self.complete(op, &ret);
            }
            // Real controllers report capacity; this one reports occupancy
            _ if op == opcode(OGF_LE, OCF_LE_READ_WHITE_LIST_SIZE) => {
                let size = self.white_list.len() as u8;
                self.complete(op, &[HCI_SUCCESS, size]);
            }
            _ if op == opcode(OGF_LE, OCF_LE_CLEAR_WHITE_LIST) => {
                self.white_list.clear();
                self.complete(op, &[HCI_SUCCESS]);
            }
            _ if op == opcode(OGF_LE, OCF_LE_ADD_DEVICE_TO_WHITE_LIST) => {
                let kind = params.first().copied().unwrap_or_default();
                self.white_list.insert((kind, address(1)));
                self.complete(op, &[HCI_SUCCESS]);
            }
            _ if op == opcode(OGF_LE, OCF_LE_REMOVE_DEVICE_FROM_WHITE_LIST) => {
                let kind = params.first().copied().unwrap_or_default();
                self.white_list.remove(&(kind, address(1)));
                self.complete(op, &[HCI_SUCCESS]);
            }
            _ if op == opcode(OGF_STATUS_PARAM, OCF_READ_RSSI) => {
                let handle = params.get(0..2).map(LittleEndian::read_u16).unwrap_or_default();
                let mut ret = vec![HCI_SUCCESS];
                ret.extend_from_slice(&handle.to_le_bytes());
                if self.links.contains_key(&handle) {
                    ret.push(self.rssi as u8);
                } else {
                    ret[0] = HCI_UNKNOWN_CONNECTION_ID;
                    ret.push(0);
                }
                self.complete(op, &ret);
            }
            _ if op == opcode(OGF_LE, OCF_LE_CREATE_CONNECTION) => {
                self.status(op, HCI_SUCCESS);

                let peer_type = params.get(5).copied().unwrap_or_default();
                let peer = address(6);
                let handle = self.next_handle;
                self.next_handle += 1;
                self.links.insert(handle, peer);

                let mut meta = vec![EVT_LE_CONN_COMPLETE, HCI_SUCCESS];
                meta.extend_from_slice(&handle.to_le_bytes());
                meta.push(0x00); // master
                meta.push(peer_type);
                meta.extend_from_slice(&peer);
                meta.extend_from_slice(&0x0006u16.to_le_bytes());
                meta.extend_from_slice(&0x0000u16.to_le_bytes());
                meta.extend_from_slice(&0x0048u16.to_le_bytes());
                meta.push(0x00);
                self.inbox.push_back(event(EVT_LE_META_EVENT, &meta));
            }
            _ if op == opcode(OGF_LINK_CTL, OCF_DISCONNECT) => {
                let handle = params.get(0..2).map(LittleEndian::read_u16).unwrap_or_default();
                if self.links.remove(&handle).is_none() {
                    self.status(op, HCI_UNKNOWN_CONNECTION_ID);
                    return;
                }
                self.status(op, HCI_SUCCESS);

                let mut complete = vec![HCI_SUCCESS];
                complete.extend_from_slice(&handle.to_le_bytes());
                complete.push(params.get(2).copied().unwrap_or(HCI_REMOTE_USER_TERMINATED));
                self.inbox.push_back(event(EVT_DISCONN_COMPLETE, &complete));
            }
            _ => self.complete(op, &[HCI_SUCCESS]),
        }
    }

    fn complete(&mut self, op: u16, ret: &[u8]) {
        let mut params = vec![0x01];
        params.extend_from_slice(&op.to_le_bytes());
        params.extend_from_slice(ret);
        self.inbox.push_back(event(EVT_CMD_COMPLETE, &params));
    }

    fn status(&mut self, op: u16, status: u8) {
        let mut params = vec![status, 0x01];
        params.extend_from_slice(&op.to_le_bytes());
        self.inbox.push_back(event(EVT_CMD_STATUS, &params));
    }
}

/// Builds a transport event packet
pub fn event(code: u8, params: &[u8]) -> Vec<u8> {
    let mut packet = vec![HCI_EVENT_PKT, code, params.len() as u8];
    packet.extend_from_slice(params);
    packet
}

/// Points a controller at a `MockController`
#[derive(Debug, Clone)]
pub struct MockConfig {
    hardware: Arc<MockController>,
}

impl MockConfig {
    pub fn new(hardware: &Arc<MockController>) -> Self {
        Self {
            hardware: Arc::clone(hardware),
        }
    }
}

#[derive(Debug)]
pub struct MockTransport {
    hardware: Arc<MockController>,
}

impl Transport for MockTransport {
    type Config = MockConfig;

    fn open(config: &MockConfig) -> Result<Self, HciError> {
        let mut hw = config.hardware.lock();
        if hw.fail_open {
            return Err(HciError::BindError(io::Error::new(
                io::ErrorKind::NotFound,
                "no such device",
            )));
        }
        hw.closed = false;
        hw.opens += 1;
        hw.inbox.clear();
        Ok(MockTransport {
            hardware: Arc::clone(&config.hardware),
        })
    }

    fn send(&self, packet: &[u8]) -> Result<(), HciError> {
        let mut hw = self.hardware.lock();
        if hw.closed {
            return Err(HciError::Closed);
        }
        hw.receive_command(packet);
        self.hardware.ready.notify_all();
        Ok(())
    }

    fn receive(&self, timeout: Duration) -> Result<Vec<u8>, HciError> {
        let hw = self.hardware.lock();
        let (mut hw, _) = self
            .hardware
            .ready
            .wait_timeout_while(hw, timeout, |hw| hw.inbox.is_empty() && !hw.closed)
            .unwrap_or_else(PoisonError::into_inner);

        if hw.closed {
            return Err(HciError::Closed);
        }
        let packet = hw.inbox.pop_front().ok_or(HciError::Timeout)?;
        if hw.garbled > 0 {
            hw.garbled -= 1;
            return Err(HciError::InvalidPacketFormat);
        }
        Ok(packet)
    }

    fn close(&self) {
        self.hardware.lock().closed = true;
        self.hardware.ready.notify_all();
    }
}
