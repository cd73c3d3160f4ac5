use crate::error::{Error, Result};
use crate::gap::constants::*;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Link-layer address type as understood by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressType {
    Public,
    Random,
    /// Discovered without type information; sent to the controller as `Public`
    Unknown,
}

impl AddressType {
    /// Short tag used when displaying devices
    pub fn tag(&self) -> &'static str {
        match self {
            AddressType::Public => "[PDA]",
            AddressType::Random => "[RDA]",
            AddressType::Unknown => "[???]",
        }
    }

    /// The type to put in an HCI command parameter
    pub fn to_hci(self) -> u8 {
        match self {
            AddressType::Random => RANDOM_DEVICE_ADDRESS,
            AddressType::Public | AddressType::Unknown => PUBLIC_DEVICE_ADDRESS,
        }
    }
}

impl TryFrom<u8> for AddressType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            PUBLIC_DEVICE_ADDRESS => Ok(AddressType::Public),
            RANDOM_DEVICE_ADDRESS => Ok(AddressType::Random),
            UNKNOWN_ADDRESS_TYPE => Ok(AddressType::Unknown),
            other => Err(Error::InvalidAddress(format!(
                "unrecognized address type {:#04x}",
                other
            ))),
        }
    }
}

impl From<AddressType> for u8 {
    fn from(value: AddressType) -> Self {
        match value {
            AddressType::Public => PUBLIC_DEVICE_ADDRESS,
            AddressType::Random => RANDOM_DEVICE_ADDRESS,
            AddressType::Unknown => UNKNOWN_ADDRESS_TYPE,
        }
    }
}

/// 48-bit device address, stored little-endian as it travels over HCI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() >= 6 {
            let mut bytes = [0u8; 6];
            bytes.copy_from_slice(&slice[0..6]);
            Some(Self { bytes })
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

// Most significant byte first, so ordering agrees with the text form.
impl Ord for BdAddr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes.iter().rev().cmp(other.bytes.iter().rev())
    }
}

impl PartialOrd for BdAddr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

impl FromStr for BdAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidAddress(s.to_string());

        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(invalid());
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(invalid());
            }
            bytes[5 - i] = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }

        Ok(Self { bytes })
    }
}

/// A device address together with its type.
///
/// Two addresses with the same bytes but a different type are different
/// devices: they never compare equal. Ordering is by bytes first, then type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    addr: BdAddr,
    kind: AddressType,
}

impl Address {
    pub fn new(addr: BdAddr, kind: AddressType) -> Self {
        Self { addr, kind }
    }

    /// Builds an address from raw HCI bytes and an address type tag
    pub fn parse(bytes: [u8; 6], type_tag: u8) -> Result<Self> {
        let kind = AddressType::try_from(type_tag)?;
        Ok(Self {
            addr: BdAddr::new(bytes),
            kind,
        })
    }

    pub fn public(addr: BdAddr) -> Self {
        Self::new(addr, AddressType::Public)
    }

    pub fn random(addr: BdAddr) -> Self {
        Self::new(addr, AddressType::Random)
    }

    pub fn bd_addr(&self) -> BdAddr {
        self.addr
    }

    pub fn address_type(&self) -> AddressType {
        self.kind
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.addr, f)
    }
}
