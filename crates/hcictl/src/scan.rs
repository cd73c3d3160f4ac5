//! Bluetooth LE scanning functionality
//!
//! While a controller is SCANNING a background receiver drains the transport,
//! decodes advertising reports and registers every advertiser in the device
//! table. Newly seen devices are handed to the caller through a bounded queue
//! consumed by the [`Scan`] iterator.

use crate::error::{Error, HciError, Result};
use crate::gap::{
    Address, AddressType, Device, DeviceTable, ADV_TYPE_COMPLETE_LOCAL_NAME,
    ADV_TYPE_SHORT_LOCAL_NAME, RSSI_MAX_VALID, RSSI_UNAVAILABLE,
};
use crate::hci::{Controller, HciEvent, LeAdvertisingReport, Transport};
use log::{debug, error, trace, warn};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ScanType {
    Passive = 0x00,
    /// Sends scan requests, so scan responses (often carrying the name) arrive too
    #[default]
    Active = 0x01,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ScanFilterPolicy {
    #[default]
    AcceptAll = 0x00,
    WhiteListOnly = 0x01,
}

/// How long a scan runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDuration {
    For(Duration),
    /// Until the `Scan` is cancelled or dropped
    UntilCancelled,
}

/// Parameters of a discovery session
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub scan_type: ScanType,
    /// In 0.625 ms units
    pub interval: u16,
    /// In 0.625 ms units, at most `interval`
    pub window: u16,
    pub own_address_type: u8,
    pub filter_policy: ScanFilterPolicy,
    pub filter_duplicates: bool,
    pub duration: ScanDuration,
    /// Stop once this many distinct devices were produced
    pub max_reports: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            scan_type: ScanType::Active,
            interval: 0x0010, // 10ms
            window: 0x0010,
            own_address_type: 0x00,
            filter_policy: ScanFilterPolicy::AcceptAll,
            filter_duplicates: false,
            duration: ScanDuration::For(Duration::from_secs(10)),
            max_reports: None,
        }
    }
}

impl ScanOptions {
    pub fn for_duration(duration: Duration) -> Self {
        Self {
            duration: ScanDuration::For(duration),
            ..Default::default()
        }
    }

    pub fn until_cancelled() -> Self {
        Self {
            duration: ScanDuration::UntilCancelled,
            ..Default::default()
        }
    }
}

/// Display name derived from an advertising report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceName {
    /// Local name carried in the advertising data
    Advertised(String),
    /// No name was advertised; the formatted address stands in
    Address(String),
}

impl DeviceName {
    pub fn as_str(&self) -> &str {
        match self {
            DeviceName::Advertised(name) | DeviceName::Address(name) => name,
        }
    }

    pub fn advertised(&self) -> Option<&str> {
        match self {
            DeviceName::Advertised(name) => Some(name),
            DeviceName::Address(_) => None,
        }
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives a display name for the advertiser of `report`.
///
/// The complete local name wins over the shortened one; without either the
/// formatted address is used.
pub fn compute_device_name(report: &LeAdvertisingReport) -> DeviceName {
    let fields = parse_advertising_data(&report.data);

    let find = |ad_type: u8| {
        fields
            .iter()
            .filter(|(t, _)| *t == ad_type)
            .map(|(_, value)| String::from_utf8_lossy(value).trim_end_matches('\0').trim().to_string())
            .find(|name| !name.is_empty())
    };

    match find(ADV_TYPE_COMPLETE_LOCAL_NAME).or_else(|| find(ADV_TYPE_SHORT_LOCAL_NAME)) {
        Some(name) => DeviceName::Advertised(name),
        None => DeviceName::Address(report.bd_addr().to_string()),
    }
}

/// Parse advertisement data from a LE Advertising Report
///
/// # Arguments
///
/// * `data` - The advertisement data
///
/// # Returns
///
/// A vector of (type, data) tuples
pub fn parse_advertising_data(data: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let length = data[i] as usize;
        if length == 0 || i + length >= data.len() {
            break;
        }

        let ad_type = data[i + 1];
        let ad_data = data[i + 2..i + 1 + length].to_vec();

        result.push((ad_type, ad_data));

        i += 1 + length;
    }

    result
}

/// How the background receiver stopped
#[derive(Debug)]
pub(crate) enum ScanEnd {
    Finished,
    Failed(HciError),
}

/// A running discovery session.
///
/// Yields each device the first time this session sees it. The controller
/// returns to OPEN when the iterator is exhausted, cancelled or dropped.
pub struct Scan<'a, T: Transport> {
    controller: &'a Controller<T>,
    receiver: Option<Receiver<Device>>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<ScanEnd>>,
}

impl<'a, T: Transport> Scan<'a, T> {
    /// Stops the scan and waits for the controller to leave SCANNING
    pub fn cancel(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        self.cancel.store(true, Ordering::Release);
        // Unblocks a receiver waiting on a full queue
        self.receiver.take();

        let end = worker.join().unwrap_or_else(|_| {
            error!("scan receiver panicked");
            ScanEnd::Finished
        });
        self.controller.end_scan(end)
    }
}

impl<'a, T: Transport> Iterator for Scan<'a, T> {
    type Item = Device;

    fn next(&mut self) -> Option<Device> {
        let device = self.receiver.as_ref()?.recv().ok();
        if device.is_none() {
            if let Err(e) = self.finish() {
                warn!("scan ended with an error: {}", e);
            }
        }
        device
    }
}

impl<'a, T: Transport> Drop for Scan<'a, T> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("scan ended with an error: {}", e);
        }
    }
}

/// Spawns the receiver of an already enabled scan
pub(crate) fn start<'a, T: Transport>(
    controller: &'a Controller<T>,
    transport: Arc<T>,
    devices: Arc<DeviceTable>,
    options: ScanOptions,
) -> Result<Scan<'a, T>> {
    let depth = controller.config().scan_queue_depth.max(1);
    let (queue, receiver) = mpsc::sync_channel(depth);
    let cancel = Arc::new(AtomicBool::new(false));

    let producer = Producer {
        transport,
        devices,
        queue,
        cancel: Arc::clone(&cancel),
        deadline: match options.duration {
            ScanDuration::For(d) => Some(Instant::now() + d),
            ScanDuration::UntilCancelled => None,
        },
        limit: options.max_reports,
        poll: controller.poll_interval(),
        seen: HashSet::new(),
    };

    let worker = thread::Builder::new()
        .name("hci-scan".into())
        .spawn(move || producer.run())
        .map_err(|e| Error::Transport(HciError::SocketError(e)))?;

    Ok(Scan {
        controller,
        receiver: Some(receiver),
        cancel,
        worker: Some(worker),
    })
}

struct Producer<T> {
    transport: Arc<T>,
    devices: Arc<DeviceTable>,
    queue: SyncSender<Device>,
    cancel: Arc<AtomicBool>,
    deadline: Option<Instant>,
    limit: Option<usize>,
    poll: Duration,
    seen: HashSet<Address>,
}

impl<T: Transport> Producer<T> {
    fn run(mut self) -> ScanEnd {
        while !self.cancel.load(Ordering::Acquire) {
            let wait = match self.deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        debug!("scan duration elapsed");
                        break;
                    }
                    left.min(self.poll)
                }
                None => self.poll,
            };

            let packet = match self.transport.receive(wait) {
                Ok(packet) => packet,
                Err(HciError::Timeout) => continue,
                Err(HciError::InvalidPacketFormat) => {
                    warn!("dropping malformed read while scanning");
                    continue;
                }
                Err(HciError::Closed) if self.cancel.load(Ordering::Acquire) => break,
                Err(e) => return ScanEnd::Failed(e),
            };

            let event = match HciEvent::from_packet(&packet) {
                Ok(event) => event,
                Err(_) => {
                    warn!("dropping malformed packet while scanning: {}", hex::encode(&packet));
                    continue;
                }
            };
            if !event.is_advertising_report() {
                trace!("ignoring event {:#04x} while scanning", event.event_code);
                continue;
            }

            let reports = match LeAdvertisingReport::parse_from_event(&event) {
                Ok(reports) => reports,
                Err(e) => {
                    warn!("dropping advertising report: {}", e);
                    continue;
                }
            };

            for report in reports.iter() {
                let Some(device) = self.process(report) else {
                    continue;
                };
                if self.queue.send(device).is_err() {
                    // Consumer went away
                    return ScanEnd::Finished;
                }
                if self.limit.is_some_and(|limit| self.seen.len() >= limit) {
                    debug!("scan produced {} devices, stopping", self.seen.len());
                    return ScanEnd::Finished;
                }
            }
        }
        ScanEnd::Finished
    }

    /// Registers the advertiser; returns it if this session had not seen it yet
    fn process(&mut self, report: &LeAdvertisingReport) -> Option<Device> {
        let address = report.address().unwrap_or_else(|_| {
            debug!("advertiser {} has address type {:#04x}", report.bd_addr(), report.address_type);
            Address::new(report.bd_addr(), AddressType::Unknown)
        });

        let rssi = match report.rssi {
            RSSI_UNAVAILABLE => {
                warn!("RSSI of {} is not available", address);
                None
            }
            rssi if rssi > RSSI_MAX_VALID => {
                error!("RSSI of {} is invalid: {}", address, rssi);
                None
            }
            rssi => Some(rssi),
        };

        let name = compute_device_name(report);
        // The address fallback is never stored, so it cannot replace a real name
        self.devices.observe(address, name.advertised().unwrap_or(""), rssi);

        if !self.seen.insert(address) {
            return None;
        }
        self.devices.get(&address)
    }
}
