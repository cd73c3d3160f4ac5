//! Registry of remote devices keyed by address
//!
//! Devices are kept in registration order. A device's address never changes
//! once registered; its name and last RSSI may be refreshed by later sightings.

use crate::gap::constants::*;
use crate::gap::types::Address;
use log::{debug, trace};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// How a rediscovered device's name is updated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamePolicy {
    /// Take any non-empty name that differs from the stored one
    #[default]
    Refresh,
    /// Only fill in a name if none is stored yet
    KeepFirst,
    /// Take the new name if it is longer than the stored one
    KeepLongest,
}

impl NamePolicy {
    fn should_replace(&self, current: &str, candidate: &str) -> bool {
        if candidate.is_empty() {
            return false;
        }
        match self {
            NamePolicy::Refresh => candidate != current,
            NamePolicy::KeepFirst => current.is_empty(),
            NamePolicy::KeepLongest => candidate.len() > current.len(),
        }
    }
}

/// Outcome of `DeviceTable::register`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Inserted,
    AlreadyRegistered,
}

/// A known remote device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    address: Address,
    name: String,
    custom_name: String,
    rssi: Option<i8>,
}

impl Device {
    pub fn new(address: Address, name: &str) -> Self {
        Self {
            address,
            name: bounded(name),
            custom_name: String::new(),
            rssi: None,
        }
    }

    /// Sets the user-friendly name shown next to the advertised one
    pub fn with_custom_name(mut self, custom_name: &str) -> Self {
        self.custom_name = bounded(custom_name);
        self
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Name resolved from the device itself; empty if none was seen yet
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn custom_name(&self) -> &str {
        &self.custom_name
    }

    /// Last RSSI (dBm) seen for this device
    pub fn rssi(&self) -> Option<i8> {
        self.rssi
    }

    /// The name if one is known, otherwise the formatted address
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.address.to_string()
        } else {
            self.name.clone()
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let or_unknown = |s: &str| {
            if s.is_empty() {
                UNKNOWN_NAME.to_string()
            } else {
                s.to_string()
            }
        };
        write!(
            f,
            "{} [{}] : {} a.k.a {}",
            self.address.address_type().tag(),
            self.address,
            or_unknown(&self.name),
            or_unknown(&self.custom_name)
        )
    }
}

// Truncates to MAX_NAME_LEN bytes without splitting a character.
fn bounded(name: &str) -> String {
    if name.len() <= MAX_NAME_LEN {
        return name.to_string();
    }
    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

#[derive(Default)]
struct Entries {
    index: HashMap<Address, usize>,
    devices: Vec<Device>,
}

/// Table of devices keyed by (address bytes, address type)
///
/// Safe to share between the scan producer and readers: every operation
/// takes the lock for its whole duration, so readers never see a half
/// inserted entry.
pub struct DeviceTable {
    policy: NamePolicy,
    entries: RwLock<Entries>,
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self::new(NamePolicy::default())
    }
}

impl DeviceTable {
    pub fn new(policy: NamePolicy) -> Self {
        Self {
            policy,
            entries: RwLock::new(Entries::default()),
        }
    }

    pub fn policy(&self) -> NamePolicy {
        self.policy
    }

    /// Registers a device, or refreshes its name if it is already known
    pub fn register(&self, address: Address, name: &str) -> Registration {
        self.insert_or_update(Device::new(address, name))
    }

    /// Registers a fully built device (custom name included)
    pub fn register_device(&self, device: Device) -> Registration {
        self.insert_or_update(device)
    }

    /// Records a sighting from an advertising report
    pub fn observe(&self, address: Address, name: &str, rssi: Option<i8>) -> Registration {
        let mut device = Device::new(address, name);
        device.rssi = rssi;
        self.insert_or_update(device)
    }

    fn insert_or_update(&self, device: Device) -> Registration {
        let mut entries = self.write();

        if let Some(&slot) = entries.index.get(&device.address) {
            let existing = &mut entries.devices[slot];
            if self.policy.should_replace(&existing.name, &device.name) {
                debug!(
                    "Device {} renamed from {:?} to {:?}",
                    existing.address, existing.name, device.name
                );
                existing.name = device.name;
            }
            if existing.custom_name.is_empty() && !device.custom_name.is_empty() {
                existing.custom_name = device.custom_name;
            }
            if device.rssi.is_some() {
                existing.rssi = device.rssi;
            }
            return Registration::AlreadyRegistered;
        }

        trace!("Registering device {}", device);
        let slot = entries.devices.len();
        entries.index.insert(device.address, slot);
        entries.devices.push(device);
        Registration::Inserted
    }

    pub fn get(&self, address: &Address) -> Option<Device> {
        let entries = self.read();
        entries
            .index
            .get(address)
            .map(|&slot| entries.devices[slot].clone())
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.read().index.contains_key(address)
    }

    /// All devices, in registration order
    pub fn display_all(&self) -> Vec<Device> {
        self.read().devices.clone()
    }

    /// Writes one line per device, in registration order
    pub fn dump<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        for device in self.read().devices.iter() {
            writeln!(out, "{}", device)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every entry. The table is consumed.
    pub fn destroy(self) {
        let entries = self.entries.into_inner().unwrap_or_else(PoisonError::into_inner);
        debug!("Destroying device table with {} entries", entries.devices.len());
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
