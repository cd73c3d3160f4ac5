//! Bitmask views of LE Read Local Supported Features / LE Read Supported States

use bitflags::bitflags;

bitflags! {
    /// LE features supported by the local controller
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LeFeatures: u64 {
        const ENCRYPTION = 1 << 0;
        const CONNECTION_PARAMETERS_REQUEST = 1 << 1;
        const EXTENDED_REJECT_INDICATION = 1 << 2;
        const SLAVE_INITIATED_FEATURES_EXCHANGE = 1 << 3;
        const PING = 1 << 4;
        const DATA_PACKET_LENGTH_EXTENSION = 1 << 5;
        const LL_PRIVACY = 1 << 6;
        const EXTENDED_SCANNER_FILTER_POLICIES = 1 << 7;
        const LE_2M_PHY = 1 << 8;
        const STABLE_MODULATION_INDEX_TX = 1 << 9;
        const STABLE_MODULATION_INDEX_RX = 1 << 10;
        const LE_CODED_PHY = 1 << 11;
        const EXTENDED_ADVERTISING = 1 << 12;
        const PERIODIC_ADVERTISING = 1 << 13;
        const CHANNEL_SELECTION_ALGORITHM_2 = 1 << 14;
        const POWER_CLASS_1 = 1 << 15;
        const MIN_USED_CHANNELS = 1 << 16;
    }
}

bitflags! {
    /// LE state combinations the controller supports
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LeStates: u64 {
        const NON_CONNECTABLE_ADV = 1 << 0;
        const SCANNABLE_ADV = 1 << 1;
        const CONNECTABLE_ADV = 1 << 2;
        const DIRECTED_ADV = 1 << 3;
        const PASSIVE_SCAN = 1 << 4;
        const ACTIVE_SCAN = 1 << 5;
        const INITIATING_MASTER = 1 << 6;
        const CONNECTION_SLAVE = 1 << 7;
        const NON_CONNECTABLE_ADV_PASSIVE_SCAN = 1 << 8;
        const SCANNABLE_ADV_PASSIVE_SCAN = 1 << 9;
        const CONNECTABLE_ADV_PASSIVE_SCAN = 1 << 10;
        const DIRECTED_ADV_PASSIVE_SCAN = 1 << 11;
        const NON_CONNECTABLE_ADV_ACTIVE_SCAN = 1 << 12;
        const SCANNABLE_ADV_ACTIVE_SCAN = 1 << 13;
        const CONNECTABLE_ADV_ACTIVE_SCAN = 1 << 14;
        const DIRECTED_ADV_ACTIVE_SCAN = 1 << 15;
        const NON_CONNECTABLE_ADV_INITIATING = 1 << 16;
        const SCANNABLE_ADV_INITIATING = 1 << 17;
        const NON_CONNECTABLE_ADV_MASTER = 1 << 18;
        const SCANNABLE_ADV_MASTER = 1 << 19;
        const NON_CONNECTABLE_ADV_SLAVE = 1 << 20;
        const SCANNABLE_ADV_SLAVE = 1 << 21;
        const PASSIVE_SCAN_INITIATING = 1 << 22;
        const ACTIVE_SCAN_INITIATING = 1 << 23;
        const PASSIVE_SCAN_MASTER = 1 << 24;
        const ACTIVE_SCAN_MASTER = 1 << 25;
        const PASSIVE_SCAN_SLAVE = 1 << 26;
        const ACTIVE_SCAN_SLAVE = 1 << 27;
        const INITIATING_MASTER_MASTER = 1 << 28;
    }
}

const STATE_DESCRIPTIONS: [(LeStates, &str); 29] = [
    (LeStates::NON_CONNECTABLE_ADV, "Non-connectable Advertising State"),
    (LeStates::SCANNABLE_ADV, "Scannable Advertising State"),
    (LeStates::CONNECTABLE_ADV, "Connectable Advertising State"),
    (LeStates::DIRECTED_ADV, "Directed Advertising State"),
    (LeStates::PASSIVE_SCAN, "Passive Scanning State"),
    (LeStates::ACTIVE_SCAN, "Active Scanning State"),
    (LeStates::INITIATING_MASTER, "Initiating State and Connection State in the Master Role"),
    (LeStates::CONNECTION_SLAVE, "Connection State in Slave Role"),
    (LeStates::NON_CONNECTABLE_ADV_PASSIVE_SCAN, "Non-connectable Advertising State and Passive Scanning State combination"),
    (LeStates::SCANNABLE_ADV_PASSIVE_SCAN, "Scannable Advertising State and Passive Scanning State combination"),
    (LeStates::CONNECTABLE_ADV_PASSIVE_SCAN, "Connectable Advertising State and Passive Scanning State combination"),
    (LeStates::DIRECTED_ADV_PASSIVE_SCAN, "Directed Advertising State and Passive Scanning State combination"),
    (LeStates::NON_CONNECTABLE_ADV_ACTIVE_SCAN, "Non-connectable Advertising State and Active Scanning State combination"),
    (LeStates::SCANNABLE_ADV_ACTIVE_SCAN, "Scannable Advertising State and Active Scanning State combination"),
    (LeStates::CONNECTABLE_ADV_ACTIVE_SCAN, "Connectable Advertising State and Active Scanning State combination"),
    (LeStates::DIRECTED_ADV_ACTIVE_SCAN, "Directed Advertising State and Active Scanning State combination"),
    (LeStates::NON_CONNECTABLE_ADV_INITIATING, "Non-connectable Advertising State and Initiating State combination"),
    (LeStates::SCANNABLE_ADV_INITIATING, "Scannable Advertising State and Initiating State combination"),
    (LeStates::NON_CONNECTABLE_ADV_MASTER, "Non-connectable Advertising State and Master Role combination"),
    (LeStates::SCANNABLE_ADV_MASTER, "Scannable Advertising State and Master Role combination"),
    (LeStates::NON_CONNECTABLE_ADV_SLAVE, "Non-connectable Advertising State and Slave Role combination"),
    (LeStates::SCANNABLE_ADV_SLAVE, "Scannable Advertising State and Slave Role combination"),
    (LeStates::PASSIVE_SCAN_INITIATING, "Passive Scanning State and Initiating State combination"),
    (LeStates::ACTIVE_SCAN_INITIATING, "Active Scanning State and Initiating State combination"),
    (LeStates::PASSIVE_SCAN_MASTER, "Passive Scanning State and Master Role combination"),
    (LeStates::ACTIVE_SCAN_MASTER, "Active Scanning State and Master Role combination"),
    (LeStates::PASSIVE_SCAN_SLAVE, "Passive Scanning State and Slave Role combination"),
    (LeStates::ACTIVE_SCAN_SLAVE, "Active Scanning State and Slave Role combination"),
    (LeStates::INITIATING_MASTER_MASTER, "Initiating State and Master Role combination and Master Role and Master Role combination"),
];

impl LeStates {
    /// Every documented state with whether it is supported
    pub fn describe(&self) -> impl Iterator<Item = (&'static str, bool)> + '_ {
        STATE_DESCRIPTIONS
            .iter()
            .map(move |(flag, text)| (*text, self.contains(*flag)))
    }
}
