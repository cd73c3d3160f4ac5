//! Unit tests for addresses and the device table

use super::*;
use crate::error::Error;
use std::cmp::Ordering;
use std::sync::Arc;
use std::thread;

const X: [u8; 6] = [0x1E, 0xE9, 0x20, 0x8C, 0xBA, 0x1C];
const Y: [u8; 6] = [0x60, 0x29, 0xCD, 0x72, 0x02, 0x00];

#[test]
fn test_address_parse() {
    let addr = Address::parse(X, PUBLIC_DEVICE_ADDRESS).unwrap();
    assert_eq!(addr.address_type(), AddressType::Public);
    assert_eq!(addr.bd_addr().bytes, X);

    let addr = Address::parse(X, RANDOM_DEVICE_ADDRESS).unwrap();
    assert_eq!(addr.address_type(), AddressType::Random);

    let addr = Address::parse(X, UNKNOWN_ADDRESS_TYPE).unwrap();
    assert_eq!(addr.address_type(), AddressType::Unknown);

    // Identity address types are not accepted
    let result = Address::parse(X, 0x02);
    assert!(matches!(result, Err(Error::InvalidAddress(_))));
}

#[test]
fn test_address_compare() {
    let a = Address::parse(X, PUBLIC_DEVICE_ADDRESS).unwrap();
    let b = Address::parse(X, PUBLIC_DEVICE_ADDRESS).unwrap();
    assert_eq!(a.cmp(&b), Ordering::Equal);
    assert_eq!(a, b);

    // Same bytes, different type: never equal
    for tag in [RANDOM_DEVICE_ADDRESS, UNKNOWN_ADDRESS_TYPE] {
        let other = Address::parse(X, tag).unwrap();
        assert_ne!(a.cmp(&other), Ordering::Equal);
        assert_ne!(a, other);
    }

    // Byte-wise, most significant byte first: 1C:.. > 00:..
    let x = Address::public(BdAddr::new(X));
    let y = Address::public(BdAddr::new(Y));
    assert_eq!(x.cmp(&y), Ordering::Greater);
    assert_eq!(y.cmp(&x), Ordering::Less);
}

#[test]
fn test_address_format() {
    let addr = BdAddr::new(X);
    assert_eq!(addr.to_string(), "1C:BA:8C:20:E9:1E");
    assert_eq!(Address::random(addr).to_string(), "1C:BA:8C:20:E9:1E");

    let parsed: BdAddr = "1C:BA:8C:20:E9:1E".parse().unwrap();
    assert_eq!(parsed, addr);

    let parsed: BdAddr = "00:02:72:cd:29:60".parse().unwrap();
    assert_eq!(parsed.bytes, Y);

    assert!("00:02:72:CD:29".parse::<BdAddr>().is_err());
    assert!("00:02:72:CD:29:GG".parse::<BdAddr>().is_err());
    assert!("0002:72:CD:29:60:0".parse::<BdAddr>().is_err());
}

#[test]
fn test_address_type_to_hci() {
    assert_eq!(AddressType::Public.to_hci(), PUBLIC_DEVICE_ADDRESS);
    assert_eq!(AddressType::Random.to_hci(), RANDOM_DEVICE_ADDRESS);
    assert_eq!(AddressType::Unknown.to_hci(), PUBLIC_DEVICE_ADDRESS);
    assert_eq!(u8::from(AddressType::Unknown), UNKNOWN_ADDRESS_TYPE);
}

#[test]
fn test_register_twice() {
    let table = DeviceTable::default();
    let a = Address::public(BdAddr::new(X));

    assert_eq!(table.register(a, "Foo"), Registration::Inserted);
    assert_eq!(table.register(a, "Foo"), Registration::AlreadyRegistered);
    assert_eq!(table.len(), 1);
    assert_eq!(table.get(&a).unwrap().name(), "Foo");
}

#[test]
fn test_same_bytes_different_type_are_distinct() {
    let table = DeviceTable::default();
    let public = Address::public(BdAddr::new(X));
    let random = Address::random(BdAddr::new(X));

    assert_eq!(table.register(public, "A"), Registration::Inserted);
    assert_eq!(table.register(random, "B"), Registration::Inserted);
    assert_eq!(table.len(), 2);
    assert_eq!(table.get(&random).unwrap().name(), "B");
}

#[test]
fn test_display_all_keeps_registration_order() {
    let table = DeviceTable::default();
    let a = Address::public(BdAddr::new(X));
    let b = Address::public(BdAddr::new(Y));

    table.register(a, "A");
    table.register(b, "B");

    // Lookups in between do not affect order
    assert!(table.get(&b).is_some());
    assert!(table.get(&a).is_some());
    table.register(a, "A2");

    let all: Vec<Address> = table.display_all().iter().map(|d| *d.address()).collect();
    assert_eq!(all, vec![a, b]);
}

#[test]
fn test_name_policy_refresh() {
    let table = DeviceTable::new(NamePolicy::Refresh);
    let a = Address::public(BdAddr::new(X));

    table.register(a, "");
    assert_eq!(table.get(&a).unwrap().name(), "");

    table.register(a, "Foo");
    assert_eq!(table.get(&a).unwrap().name(), "Foo");

    // An empty name never erases a known one
    table.register(a, "");
    assert_eq!(table.get(&a).unwrap().name(), "Foo");

    table.register(a, "Bar");
    assert_eq!(table.get(&a).unwrap().name(), "Bar");
}

#[test]
fn test_name_policy_keep_first() {
    let table = DeviceTable::new(NamePolicy::KeepFirst);
    let a = Address::public(BdAddr::new(X));

    table.register(a, "");
    table.register(a, "Foo");
    table.register(a, "Bar");
    assert_eq!(table.get(&a).unwrap().name(), "Foo");
}

#[test]
fn test_name_policy_keep_longest() {
    let table = DeviceTable::new(NamePolicy::KeepLongest);
    let a = Address::public(BdAddr::new(X));

    table.register(a, "Foo");
    table.register(a, "Fo");
    assert_eq!(table.get(&a).unwrap().name(), "Foo");
    table.register(a, "Foo Sensor");
    assert_eq!(table.get(&a).unwrap().name(), "Foo Sensor");
}

#[test]
fn test_observe_updates_rssi() {
    let table = DeviceTable::default();
    let a = Address::random(BdAddr::new(X));

    table.observe(a, "Foo", Some(-70));
    table.observe(a, "", Some(-55));
    let device = table.get(&a).unwrap();
    assert_eq!(device.name(), "Foo");
    assert_eq!(device.rssi(), Some(-55));

    table.observe(a, "", None);
    assert_eq!(table.get(&a).unwrap().rssi(), Some(-55));
}

#[test]
fn test_names_are_bounded() {
    let long = "x".repeat(MAX_NAME_LEN + 10);
    let device = Device::new(Address::public(BdAddr::new(X)), &long);
    assert_eq!(device.name().len(), MAX_NAME_LEN);

    // Never split a multi-byte character
    let long = "é".repeat(MAX_NAME_LEN);
    let device = Device::new(Address::public(BdAddr::new(X)), &long);
    assert!(device.name().len() <= MAX_NAME_LEN);
    assert!(device.name().chars().all(|c| c == 'é'));
}

#[test]
fn test_device_display() {
    let device = Device::new(Address::public(BdAddr::new(X)), "").with_custom_name("SENSOR_TAG");
    assert_eq!(
        device.to_string(),
        "[PDA] [1C:BA:8C:20:E9:1E] : UNKNOWN a.k.a SENSOR_TAG"
    );
    assert_eq!(device.display_name(), "1C:BA:8C:20:E9:1E");

    let device = Device::new(Address::parse(Y, UNKNOWN_ADDRESS_TYPE).unwrap(), "Dongle");
    assert_eq!(
        device.to_string(),
        "[???] [00:02:72:CD:29:60] : Dongle a.k.a UNKNOWN"
    );
    assert_eq!(device.display_name(), "Dongle");
}

#[test]
fn test_dump() {
    let table = DeviceTable::default();
    table.register(Address::public(BdAddr::new(X)), "A");
    table.register(Address::random(BdAddr::new(Y)), "B");

    let mut out = Vec::new();
    table.dump(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("[PDA] [1C:BA:8C:20:E9:1E]"));
    assert!(lines[1].starts_with("[RDA] [00:02:72:CD:29:60]"));
}

#[test]
fn test_concurrent_register_and_read() {
    let table = Arc::new(DeviceTable::default());

    let writers: Vec<_> = (0..4u8)
        .map(|t| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for i in 0..50u8 {
                    let addr = Address::public(BdAddr::new([i, t, 0, 0, 0, 0]));
                    table.register(addr, "dev");
                    // Re-registration from another thread must not duplicate
                    table.register(Address::public(BdAddr::new([i, 0, 0, 0, 0, 0])), "");
                }
            })
        })
        .collect();

    for _ in 0..100 {
        for device in table.display_all() {
            assert!(table.get(device.address()).is_some());
        }
    }

    for writer in writers {
        writer.join().unwrap();
    }

    // 4 * 50 distinct, plus the shared [i, 0, ...] addresses overlap with t == 0
    assert_eq!(table.len(), 200);
}

#[test]
fn test_destroy() {
    let table = DeviceTable::default();
    table.register(Address::public(BdAddr::new(X)), "A");
    table.destroy();
}
