//! HCI Socket implementation for Bluetooth communication
//!
//! This module provides a wrapper around the raw HCI socket interface,
//! allowing for communication with Bluetooth controllers.

use crate::error::{Error, HciError};
use crate::hci::constants::{HCI_EVENT_PKT, HCI_MAX_EVENT_SIZE};
use crate::hci::transport::Transport;
use log::trace;
use std::os::unix::io::{AsRawFd, RawFd};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

// Bluetooth socket constants
const AF_BLUETOOTH: i32 = 31;
const BTPROTO_HCI: i32 = 1;
const HCI_CHANNEL_RAW: i32 = 0;
const SOL_HCI: i32 = 0;
const HCI_FILTER: i32 = 2;

/// Selects the local adapter a socket binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SocketConfig {
    /// The device ID to open (0 for the first device)
    pub dev_id: u16,
}

impl FromStr for SocketConfig {
    type Err = Error;

    /// Accepts "hci0" as well as a bare "0"
    fn from_str(s: &str) -> Result<Self, Error> {
        let id = s.strip_prefix("hci").unwrap_or(s);
        id.parse::<u16>()
            .map(|dev_id| SocketConfig { dev_id })
            .map_err(|_| Error::OpenFailed(format!("invalid HCI device {:?}", s)))
    }
}

/// Represents an HCI socket
#[derive(Debug)]
pub struct HciSocket {
    fd: RawFd,
    dev_id: u16,
    closed: AtomicBool,
}

// Define the sockaddr_hci structure
#[repr(C)]
struct SockaddrHci {
    hci_family: libc::sa_family_t,
    hci_dev: u16,
    hci_channel: u16,
}

// Define the hci_filter structure
#[repr(C)]
struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

impl HciSocket {
    /// Gets the raw file descriptor for the socket
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    pub fn dev_id(&self) -> u16 {
        self.dev_id
    }

    /// Opens a new HCI socket
    ///
    /// # Arguments
    ///
    /// * `dev_id` - The device ID to open (0 for the first device)
    ///
    /// # Returns
    ///
    /// A new `HciSocket` instance or an error if the socket could not be opened
    pub fn open(dev_id: u16) -> Result<Self, HciError> {
        // Open a raw HCI socket
        let fd = unsafe { libc::socket(AF_BLUETOOTH, libc::SOCK_RAW, BTPROTO_HCI) };

        if fd < 0 {
            return Err(HciError::SocketError(std::io::Error::last_os_error()));
        }

        // Bind to the specified device
        let addr = SockaddrHci {
            hci_family: AF_BLUETOOTH as libc::sa_family_t,
            hci_dev: dev_id,
            hci_channel: HCI_CHANNEL_RAW as u16,
        };

        let result = unsafe {
            libc::bind(
                fd,
                &addr as *const _ as *const libc::sockaddr,
                std::mem::size_of::<SockaddrHci>() as libc::socklen_t,
            )
        };

        if result < 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(HciError::BindError(err));
        }

        let socket = HciSocket {
            fd,
            dev_id,
            closed: AtomicBool::new(false),
        };
        socket.accept_all_events()?;

        Ok(socket)
    }

    // The raw channel delivers nothing until a filter is installed.
    fn accept_all_events(&self) -> Result<(), HciError> {
        let filter = HciFilter {
            type_mask: 1 << HCI_EVENT_PKT,
            event_mask: [u32::MAX, u32::MAX],
            opcode: 0,
        };

        let result = unsafe {
            libc::setsockopt(
                self.fd,
                SOL_HCI,
                HCI_FILTER,
                &filter as *const _ as *const libc::c_void,
                std::mem::size_of::<HciFilter>() as libc::socklen_t,
            )
        };

        if result < 0 {
            return Err(HciError::SocketError(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    fn read_packet(&self) -> Result<Vec<u8>, HciError> {
        let mut buffer = [0u8; HCI_MAX_EVENT_SIZE];

        let bytes_read = loop {
            let n = unsafe {
                libc::read(
                    self.fd,
                    buffer.as_mut_ptr() as *mut libc::c_void,
                    buffer.len(),
                )
            };
            if n >= 0 {
                break n as usize;
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(HciError::ReceiveError(err));
            }
        };

        if bytes_read == 0 {
            return Err(HciError::Closed);
        }
        if bytes_read < 3 || buffer[0] != HCI_EVENT_PKT {
            return Err(HciError::InvalidPacketFormat);
        }

        Ok(buffer[..bytes_read].to_vec())
    }
}

impl Transport for HciSocket {
    type Config = SocketConfig;

    fn open(config: &SocketConfig) -> Result<Self, HciError> {
        HciSocket::open(config.dev_id)
    }

    fn send(&self, packet: &[u8]) -> Result<(), HciError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HciError::Closed);
        }
        trace!("hci{} < {}", self.dev_id, hex::encode(packet));
        match unsafe {
            libc::write(
                self.fd,
                packet.as_ptr() as *const libc::c_void,
                packet.len(),
            )
        } {
            -1 => Err(HciError::SendError(std::io::Error::last_os_error())),
            _ => Ok(()),
        }
    }

    fn receive(&self, timeout: Duration) -> Result<Vec<u8>, HciError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HciError::Closed);
        }

        let mut pfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = poll_timeout(timeout);

        // Wait for data to be available
        let result = loop {
            let n = unsafe { libc::poll(&mut pfd, 1, millis) };
            if n >= 0 {
                break n;
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(HciError::ReceiveError(err));
            }
        };

        if result == 0 {
            return Err(HciError::Timeout);
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(HciError::Closed);
        }

        let packet = self.read_packet()?;
        trace!("hci{} > {}", self.dev_id, hex::encode(&packet));
        Ok(packet)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            // Wakes up any thread blocked in poll()
            unsafe { libc::shutdown(self.fd, libc::SHUT_RDWR) };
        }
    }
}

impl AsRawFd for HciSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for HciSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// `poll(2)` timeout in whole milliseconds, rounded up so a short but
/// non-zero wait never turns into a non-blocking check
pub(crate) fn poll_timeout(timeout: Duration) -> libc::c_int {
    timeout.as_micros().div_ceil(1000).min(i32::MAX as u128) as libc::c_int
}
