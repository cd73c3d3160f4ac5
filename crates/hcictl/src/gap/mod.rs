//! Addresses and the table of known remote devices

pub mod constants;
pub mod table;
pub mod types;

#[cfg(test)]
mod tests;

pub use constants::*;
pub use table::{Device, DeviceTable, NamePolicy, Registration};
pub use types::*;
