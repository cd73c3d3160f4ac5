//! HCI controller state machine
//!
//! A `Controller` owns one transport handle and moves through
//! CLOSED -> OPEN -> {SCANNING, ADVERTISING, READING, WRITING} -> OPEN -> CLOSED.
//! Every hardware operation sends one command and blocks until the matching
//! Command Complete/Status event arrives or the timeout elapses. Only one
//! operation may be in flight; a second one fails with `ControllerBusy`.
//!
//! When an expected event does not arrive (or arrives malformed) the
//! controller is marked interrupted and resynchronized once: any running scan
//! or advertising is disabled and an HCI Reset is awaited. If that fails too
//! the controller is unrecoverable until it is closed and reopened.

use crate::error::{Error, HciError, Result};
use crate::gap::{Address, BdAddr, DeviceTable, NamePolicy};
use crate::hci::constants::*;
use crate::hci::features::{LeFeatures, LeStates};
use crate::hci::packet::{
    AdvertisingParameters, ConnectionParameters, DisconnectionComplete, HciCommand, HciEvent,
    LeConnectionComplete,
};
use crate::hci::transport::Transport;
use crate::scan::{self, Scan, ScanEnd, ScanOptions};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, error, info, trace, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Default timeout used to communicate with the adapter
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Current activity of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerState {
    Closed,
    /// Idle: the only state new operations start from
    Open,
    Scanning,
    Advertising,
    Reading,
    Writing,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerState::Closed => "CLOSED",
            ControllerState::Open => "OPEN",
            ControllerState::Scanning => "SCANNING",
            ControllerState::Advertising => "ADVERTISING",
            ControllerState::Reading => "READING",
            ControllerState::Writing => "WRITING",
        };
        f.write_str(name)
    }
}

/// Outcome of `Controller::resolve_interruption`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Recovered,
    Unrecoverable,
}

/// Tunables for a controller instance
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// User-friendly label used in logs
    pub name: String,
    /// How long to wait for the event answering a command
    pub command_timeout: Duration,
    /// Timeout for each command issued while resynchronizing
    pub resync_timeout: Duration,
    /// How long to wait for LE Connection Complete
    pub connect_timeout: Duration,
    /// Issue an HCI Reset when opening
    pub reset_on_open: bool,
    /// Name update rule for the session's device table
    pub name_policy: NamePolicy,
    /// Capacity of the queue between the scan receiver and the consumer
    pub scan_queue_depth: usize,
    /// Granularity at which the scan receiver notices cancellation
    pub poll_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            name: crate::gap::UNKNOWN_NAME.to_string(),
            command_timeout: DEFAULT_TIMEOUT,
            resync_timeout: DEFAULT_TIMEOUT,
            connect_timeout: Duration::from_secs(10),
            reset_on_open: true,
            name_policy: NamePolicy::default(),
            scan_queue_depth: 64,
            poll_interval: Duration::from_millis(100),
        }
    }
}

struct Status {
    state: ControllerState,
    interrupted: bool,
    unrecoverable: bool,
    // Bumped on every close
    closes: u64,
}

struct Session<T> {
    transport: Arc<T>,
    devices: Arc<DeviceTable>,
    local_address: Option<BdAddr>,
    // Connection handles of established links
    links: HashMap<BdAddr, u16>,
}

/// A Bluetooth controller reached through a `Transport`
pub struct Controller<T: Transport> {
    transport_config: T::Config,
    config: ControllerConfig,
    status: Mutex<Status>,
    session: Mutex<Option<Session<T>>>,
}

impl<T: Transport> Controller<T> {
    /// Creates a controller in the CLOSED state
    pub fn new(transport_config: T::Config, config: ControllerConfig) -> Self {
        Self {
            transport_config,
            config,
            status: Mutex::new(Status {
                state: ControllerState::Closed,
                interrupted: false,
                unrecoverable: false,
                closes: 0,
            }),
            session: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> ControllerState {
        self.status().state
    }

    /// Whether an earlier operation left the controller needing resynchronization
    pub fn is_interrupted(&self) -> bool {
        self.status().interrupted
    }

    /// Device table of the current session
    pub fn devices(&self) -> Result<Arc<DeviceTable>> {
        self.session()
            .as_ref()
            .map(|s| Arc::clone(&s.devices))
            .ok_or(Error::Closed)
    }

    /// Address of the local adapter, if it could be read when opening
    pub fn local_address(&self) -> Option<BdAddr> {
        self.session().as_ref().and_then(|s| s.local_address)
    }

    /// Whether a link to `address` is currently established
    pub fn is_connected(&self, address: &Address) -> bool {
        self.link_handle(&address.bd_addr()).is_some()
    }

    /// Opens the transport and brings the controller to OPEN.
    ///
    /// On failure the controller stays CLOSED and the transport is released.
    /// While the handshake runs the controller reads as WRITING, so other
    /// operations are rejected as busy instead of blocking.
    pub fn open(&self) -> Result<()> {
        let closes = {
            let mut status = self.status();
            if status.unrecoverable {
                return Err(Error::ControllerUnrecoverable);
            }
            if status.state != ControllerState::Closed {
                return Err(Error::ControllerBusy(status.state));
            }
            self.set_state(&mut status, ControllerState::Writing);
            status.closes
        };

        let (transport, local_address) = match self.handshake() {
            Ok(opened) => opened,
            Err(e) => {
                let mut status = self.status();
                if status.state == ControllerState::Writing && status.closes == closes {
                    self.set_state(&mut status, ControllerState::Closed);
                }
                return Err(e);
            }
        };

        let mut status = self.status();
        if status.state != ControllerState::Writing || status.closes != closes {
            // closed while the handshake was in flight
            transport.close();
            return Err(Error::Closed);
        }

        *self.session() = Some(Session {
            transport: Arc::new(transport),
            devices: Arc::new(DeviceTable::new(self.config.name_policy)),
            local_address,
            links: HashMap::new(),
        });

        status.interrupted = false;
        status.unrecoverable = false;
        self.set_state(&mut status, ControllerState::Open);

        match local_address {
            Some(addr) => info!("Controller {} opened ({})", self.config.name, addr),
            None => info!("Controller {} opened", self.config.name),
        }
        Ok(())
    }

    /// Opens the transport, resets it and reads the local address
    fn handshake(&self) -> Result<(T, Option<BdAddr>)> {
        let transport = T::open(&self.transport_config).map_err(|e| {
            error!("Controller {} : cannot open {:?}: {}", self.config.name, self.transport_config, e);
            Error::OpenFailed(e.to_string())
        })?;

        if self.config.reset_on_open {
            if let Err(e) = self.exchange(&transport, &HciCommand::Reset, self.config.command_timeout) {
                error!("Controller {} : reset failed: {}", self.config.name, e);
                transport.close();
                return Err(Error::OpenFailed(format!("reset failed: {}", e)));
            }
        }

        let local_address = match self.exchange(&transport, &HciCommand::ReadBdAddr, self.config.command_timeout) {
            Ok(event) => return_parameters(&event)
                .ok()
                .and_then(|ret| BdAddr::from_slice(ret.get(1..).unwrap_or_default())),
            Err(e) => {
                warn!("Controller {} : cannot read local address: {}", self.config.name, e);
                None
            }
        };

        Ok((transport, local_address))
    }

    /// Brings the controller to CLOSED and releases the transport.
    ///
    /// Never fails: a running scan or advertising is disabled on a best-effort
    /// basis and the handle is released regardless.
    pub fn close(&self) {
        let prior = {
            let mut status = self.status();
            let prior = status.state;
            status.closes += 1;
            status.interrupted = false;
            status.unrecoverable = false;
            self.set_state(&mut status, ControllerState::Closed);
            prior
        };

        let Some(session) = self.session().take() else {
            return;
        };

        let notify = match prior {
            ControllerState::Scanning => Some(HciCommand::LeSetScanEnable {
                enable: false,
                filter_duplicates: false,
            }),
            ControllerState::Advertising => Some(HciCommand::LeSetAdvertiseEnable { enable: false }),
            _ => None,
        };
        if let Some(command) = notify {
            if let Err(e) = session.transport.send(&command.to_packet()) {
                warn!("Controller {} : could not stop {} before closing: {}", self.config.name, prior, e);
            }
        }

        session.transport.close();

        match Arc::try_unwrap(session.devices) {
            Ok(devices) => devices.destroy(),
            Err(_) => debug!("Controller {} : device table still shared, released by its last user", self.config.name),
        }

        info!("Controller {} closed", self.config.name);
    }

    /// Tries to bring an interrupted controller back to OPEN.
    ///
    /// Disables whatever activity the controller was stuck in, then awaits an
    /// HCI Reset. If that fails the controller becomes unrecoverable.
    ///
    /// Only an idle (OPEN) controller is resynchronised. While another
    /// operation holds the controller it owns recovery, and this returns
    /// `ControllerBusy` without touching the transport.
    pub fn resolve_interruption(&self) -> Result<Resolution> {
        let transport = {
            let mut status = self.status();
            if status.state == ControllerState::Closed {
                return Err(Error::Closed);
            }
            if status.unrecoverable {
                return Ok(Resolution::Unrecoverable);
            }
            if status.state != ControllerState::Open {
                return Err(Error::ControllerBusy(status.state));
            }
            if !status.interrupted {
                warn!("Controller {} : nothing to resolve", self.config.name);
                return Ok(Resolution::Recovered);
            }
            let transport = self.transport()?;
            self.set_state(&mut status, ControllerState::Writing);
            transport
        };

        let resolution = self.resync(&transport, ControllerState::Open);
        self.release(ControllerState::Writing);
        Ok(resolution)
    }

    /// LE Read Local Supported Features
    pub fn le_read_local_supported_features(&self) -> Result<LeFeatures> {
        let event = self.run(ControllerState::Reading, HciCommand::LeReadLocalSupportedFeatures)?;
        let ret = return_parameters(&event)?;
        if ret.len() < 9 {
            return Err(Error::InvalidPacket("short LE features response".into()));
        }
        Ok(LeFeatures::from_bits_retain(LittleEndian::read_u64(&ret[1..9])))
    }

    /// LE Read Supported States
    pub fn le_read_supported_states(&self) -> Result<LeStates> {
        let event = self.run(ControllerState::Reading, HciCommand::LeReadSupportedStates)?;
        let ret = return_parameters(&event)?;
        if ret.len() < 9 {
            return Err(Error::InvalidPacket("short LE states response".into()));
        }
        Ok(LeStates::from_bits_retain(LittleEndian::read_u64(&ret[1..9])))
    }

    pub fn le_clear_white_list(&self) -> Result<()> {
        self.run(ControllerState::Writing, HciCommand::LeClearWhiteList)?;
        Ok(())
    }

    /// Adds a device to the controller's white list and to the device table
    pub fn le_add_white_list(&self, address: &Address) -> Result<()> {
        self.run(
            ControllerState::Writing,
            HciCommand::LeAddDeviceToWhiteList {
                address_type: address.address_type().to_hci(),
                address: address.bd_addr(),
            },
        )?;
        self.remember(address);
        Ok(())
    }

    pub fn le_rm_white_list(&self, address: &Address) -> Result<()> {
        self.run(
            ControllerState::Writing,
            HciCommand::LeRemoveDeviceFromWhiteList {
                address_type: address.address_type().to_hci(),
                address: address.bd_addr(),
            },
        )?;
        self.remember(address);
        Ok(())
    }

    pub fn le_get_white_list_size(&self) -> Result<u8> {
        let event = self.run(ControllerState::Reading, HciCommand::LeReadWhiteListSize)?;
        let ret = return_parameters(&event)?;
        ret.get(1)
            .copied()
            .ok_or_else(|| Error::InvalidPacket("short white list size response".into()))
    }

    /// Reads the RSSI (dBm) of the link to `address`
    pub fn get_rssi(&self, address: &Address) -> Result<i8> {
        let handle = self
            .link_handle(&address.bd_addr())
            .ok_or(Error::NotConnected(address.bd_addr()))?;

        let event = match self.run(ControllerState::Reading, HciCommand::ReadRssi { handle }) {
            Err(Error::CommandFailed {
                status: HCI_UNKNOWN_CONNECTION_ID,
                ..
            }) => {
                self.forget_link(handle);
                return Err(Error::NotConnected(address.bd_addr()));
            }
            other => other?,
        };

        let ret = return_parameters(&event)?;
        ret.get(3)
            .map(|&rssi| rssi as i8)
            .ok_or_else(|| Error::InvalidPacket("short RSSI response".into()))
    }

    /// Creates an LE link to `address` and returns its connection handle
    pub fn create_connection(&self, address: &Address, params: ConnectionParameters) -> Result<u16> {
        let transport = self.claim(ControllerState::Open, ControllerState::Writing)?;
        let result = self.connect_on(&transport, address, params);
        self.release(ControllerState::Writing);
        result
    }

    fn connect_on(&self, transport: &Arc<T>, address: &Address, params: ConnectionParameters) -> Result<u16> {
        let command = HciCommand::LeCreateConnection {
            peer_address_type: address.address_type().to_hci(),
            peer_address: address.bd_addr(),
            params,
        };
        self.exchange_recovering(transport, ControllerState::Open, &command)?;

        let peer = address.bd_addr();
        let event = self.guarded(
            transport,
            self.await_event(transport, command.opcode(), self.config.connect_timeout, |event| {
                LeConnectionComplete::parse(event).is_some_and(|c| c.peer_address == peer.bytes)
            }),
        )?;

        let complete = LeConnectionComplete::parse(&event)
            .ok_or_else(|| Error::InvalidPacket("bad LE connection complete".into()))?;
        if complete.status != HCI_SUCCESS {
            return Err(Error::CommandFailed {
                opcode: command.opcode(),
                status: complete.status,
            });
        }

        self.remember_link(peer, complete.connection_handle);
        info!(
            "Controller {} : connected to {} (handle {:#06x})",
            self.config.name, peer, complete.connection_handle
        );
        Ok(complete.connection_handle)
    }

    /// Terminates the link to `address`
    pub fn disconnect(&self, address: &Address) -> Result<()> {
        let handle = self
            .link_handle(&address.bd_addr())
            .ok_or(Error::NotConnected(address.bd_addr()))?;

        let transport = self.claim(ControllerState::Open, ControllerState::Writing)?;
        let result = self.disconnect_on(&transport, handle);
        self.release(ControllerState::Writing);
        result
    }

    fn disconnect_on(&self, transport: &Arc<T>, handle: u16) -> Result<()> {
        let command = HciCommand::Disconnect {
            handle,
            reason: HCI_REMOTE_USER_TERMINATED,
        };
        self.exchange_recovering(transport, ControllerState::Open, &command)?;
        self.guarded(
            transport,
            self.await_event(transport, command.opcode(), self.config.command_timeout, |event| {
                DisconnectionComplete::parse(event).is_some_and(|d| d.connection_handle == handle)
            }),
        )?;
        self.forget_link(handle);
        Ok(())
    }

    /// Starts advertising: OPEN -> ADVERTISING
    pub fn enable_advertise(&self, params: &AdvertisingParameters, data: &[u8]) -> Result<()> {
        let transport = self.claim(ControllerState::Open, ControllerState::Advertising)?;

        let commands = [
            HciCommand::LeSetAdvertisingParameters(params.clone()),
            HciCommand::LeSetAdvertisingData { data: data.to_vec() },
            HciCommand::LeSetAdvertiseEnable { enable: true },
        ];
        for command in commands.iter() {
            if let Err(e) = self.exchange_recovering(&transport, ControllerState::Advertising, command) {
                self.release(ControllerState::Advertising);
                return Err(e);
            }
        }

        info!("Controller {} : advertising", self.config.name);
        Ok(())
    }

    /// Stops advertising: ADVERTISING -> OPEN
    pub fn disable_advertise(&self) -> Result<()> {
        let transport = self.claim(ControllerState::Advertising, ControllerState::Advertising)?;
        let result = self.exchange_recovering(
            &transport,
            ControllerState::Advertising,
            &HciCommand::LeSetAdvertiseEnable { enable: false },
        );
        // A failed disable was resynchronized, which stops advertising as well
        self.release(ControllerState::Advertising);
        result.map(|_| info!("Controller {} : advertising stopped", self.config.name))
    }

    /// Starts a scan: OPEN -> SCANNING.
    ///
    /// Returns a lazy sequence of the devices seen; each is registered in the
    /// device table as it arrives. The controller goes back to OPEN when the
    /// sequence ends, is cancelled, or is dropped.
    pub fn scan_devices(&self, options: ScanOptions) -> Result<Scan<'_, T>> {
        let transport = self.claim(ControllerState::Open, ControllerState::Scanning)?;
        let devices = self.devices()?;

        let setup = [
            HciCommand::LeSetScanParameters {
                scan_type: options.scan_type as u8,
                scan_interval: options.interval,
                scan_window: options.window,
                own_address_type: options.own_address_type,
                filter_policy: options.filter_policy as u8,
            },
            HciCommand::LeSetScanEnable {
                enable: true,
                filter_duplicates: options.filter_duplicates,
            },
        ];
        for command in setup.iter() {
            if let Err(e) = self.exchange_recovering(&transport, ControllerState::Scanning, command) {
                self.release(ControllerState::Scanning);
                return Err(e);
            }
        }

        info!("Controller {} : scanning ({:?})", self.config.name, options.duration);
        match scan::start(self, transport, devices, options) {
            Ok(scan) => Ok(scan),
            Err(e) => {
                if let Err(stop) = self.end_scan(ScanEnd::Finished) {
                    warn!("Controller {} : could not stop scanning: {}", self.config.name, stop);
                }
                Err(e)
            }
        }
    }

    /// Disables scanning after the receiver stopped: SCANNING -> OPEN
    pub(crate) fn end_scan(&self, end: ScanEnd) -> Result<()> {
        if self.state() != ControllerState::Scanning {
            // Closed underneath the scan
            return Ok(());
        }

        if let ScanEnd::Failed(e) = end {
            error!("Controller {} : scan receiver failed: {}", self.config.name, e);
            self.force_close();
            return Err(Error::Transport(e));
        }

        let transport = match self.transport() {
            Ok(t) => t,
            Err(e) => {
                self.release(ControllerState::Scanning);
                return Err(e);
            }
        };

        let result = self.exchange_recovering(
            &transport,
            ControllerState::Scanning,
            &HciCommand::LeSetScanEnable {
                enable: false,
                filter_duplicates: false,
            },
        );
        self.release(ControllerState::Scanning);
        info!("Controller {} : scan stopped", self.config.name);
        result.map(|_| ())
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    /// Runs a single command from OPEN through `state` and back
    fn run(&self, state: ControllerState, command: HciCommand) -> Result<HciEvent> {
        let transport = self.claim(ControllerState::Open, state)?;
        let result = self.exchange_recovering(&transport, ControllerState::Open, &command);
        self.release(state);
        result
    }

    /// Moves `from` -> `to`, resolving a pending interruption first
    fn claim(&self, from: ControllerState, to: ControllerState) -> Result<Arc<T>> {
        let pending = {
            let status = self.status();
            status.interrupted && !status.unrecoverable && status.state == ControllerState::Open
        };
        if pending && self.resolve_interruption()? == Resolution::Unrecoverable {
            return Err(Error::ControllerUnrecoverable);
        }

        let mut status = self.status();
        if status.state == ControllerState::Closed {
            return Err(Error::Closed);
        }
        if status.unrecoverable {
            return Err(Error::ControllerUnrecoverable);
        }
        if status.state != from {
            return Err(Error::ControllerBusy(status.state));
        }

        let transport = self.transport()?;
        self.set_state(&mut status, to);
        Ok(transport)
    }

    /// Back to OPEN, unless something else (close) already moved us
    fn release(&self, from: ControllerState) {
        let mut status = self.status();
        if status.state == from {
            self.set_state(&mut status, ControllerState::Open);
        }
    }

    /// Sends `command`; on a missing or malformed answer, resynchronizes and retries once
    fn exchange_recovering(&self, transport: &Arc<T>, active: ControllerState, command: &HciCommand) -> Result<HciEvent> {
        let first = self.exchange(transport, command, self.config.command_timeout);
        let err = match first {
            Err(e) if is_interruption(&e) => e,
            other => return self.guarded(transport, other),
        };

        warn!("Controller {} : {} interrupted: {}", self.config.name, describe(command), err);
        self.status().interrupted = true;

        if self.resync(transport, active) == Resolution::Unrecoverable {
            return Err(Error::ControllerUnrecoverable);
        }

        let retry = self.exchange(transport, command, self.config.command_timeout);
        if let Err(e) = &retry {
            if is_interruption(e) {
                warn!("Controller {} : {} failed again: {}", self.config.name, describe(command), e);
                self.status().interrupted = true;
            }
        }
        self.guarded(transport, retry)
    }

    /// A transport failure leaves the controller in an unknown state: close it
    fn guarded<R>(&self, transport: &Arc<T>, result: Result<R>) -> Result<R> {
        if let Err(Error::Transport(e)) = &result {
            error!("Controller {} : transport failure: {}", self.config.name, e);
            transport.close();
            self.force_close();
        }
        result
    }

    fn force_close(&self) {
        if self.state() != ControllerState::Closed {
            self.close();
        }
    }

    fn resync(&self, transport: &Arc<T>, active: ControllerState) -> Resolution {
        info!("Controller {} : resynchronizing (was {})", self.config.name, active);

        let stop = match active {
            ControllerState::Scanning => Some(HciCommand::LeSetScanEnable {
                enable: false,
                filter_duplicates: false,
            }),
            ControllerState::Advertising => Some(HciCommand::LeSetAdvertiseEnable { enable: false }),
            _ => None,
        };
        if let Some(command) = stop {
            if let Err(e) = self.exchange(transport, &command, self.config.resync_timeout) {
                debug!("Controller {} : {} during resync: {}", self.config.name, describe(&command), e);
            }
        }

        match self.exchange(transport, &HciCommand::Reset, self.config.resync_timeout) {
            Ok(_) => {
                self.status().interrupted = false;
                // A reset drops every link
                if let Some(session) = self.session().as_mut() {
                    session.links.clear();
                }
                info!("Controller {} : interruption resolved", self.config.name);
                Resolution::Recovered
            }
            Err(e) => {
                let mut status = self.status();
                status.interrupted = true;
                status.unrecoverable = true;
                error!("Controller {} : unable to resolve the interruption: {}", self.config.name, e);
                Resolution::Unrecoverable
            }
        }
    }

    /// Sends a command and waits for its Command Complete / Command Status
    fn exchange(&self, transport: &T, command: &HciCommand, timeout: Duration) -> Result<HciEvent> {
        let opcode = command.opcode();
        trace!("Controller {} : sending {}", self.config.name, describe(command));
        transport.send(&command.to_packet())?;

        let event = self.await_event(transport, opcode, timeout, |event| {
            event.answered_opcode() == Some(opcode)
        })?;

        let status = event.get_status();
        if status != HCI_SUCCESS {
            return Err(Error::CommandFailed { opcode, status });
        }
        Ok(event)
    }

    /// Waits until an event satisfying `wanted` arrives; everything else is
    /// treated as unsolicited and discarded after bookkeeping
    fn await_event<F>(&self, transport: &T, opcode: u16, timeout: Duration, mut wanted: F) -> Result<HciEvent>
    where
        F: FnMut(&HciEvent) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::Timeout(opcode));
            }

            let packet = match transport.receive(remaining) {
                Ok(packet) => packet,
                Err(HciError::Timeout) => return Err(Error::Timeout(opcode)),
                // recovered like a lost answer
                Err(HciError::InvalidPacketFormat) => {
                    return Err(Error::InvalidPacket("malformed packet from transport".into()))
                }
                Err(e) => return Err(e.into()),
            };
            let event = HciEvent::from_packet(&packet)
                .map_err(|_| Error::InvalidPacket(hex::encode(&packet)))?;

            if wanted(&event) {
                return Ok(event);
            }
            self.observe_unsolicited(&event);
        }
    }

    fn observe_unsolicited(&self, event: &HciEvent) {
        if let Some(complete) = LeConnectionComplete::parse(event) {
            if complete.status == HCI_SUCCESS {
                self.remember_link(BdAddr::new(complete.peer_address), complete.connection_handle);
            }
        } else if let Some(disconnected) = DisconnectionComplete::parse(event) {
            self.forget_link(disconnected.connection_handle);
        } else if event.is_advertising_report() {
            trace!("Controller {} : discarding stale advertising report", self.config.name);
        } else {
            warn!(
                "Controller {} : discarding unsolicited event {:#04x}",
                self.config.name, event.event_code
            );
        }
    }

    fn remember(&self, address: &Address) {
        if let Ok(devices) = self.devices() {
            if !devices.contains(address) {
                devices.register(*address, "");
            }
        }
    }

    fn remember_link(&self, peer: BdAddr, handle: u16) {
        if let Some(session) = self.session().as_mut() {
            session.links.insert(peer, handle);
        }
    }

    fn forget_link(&self, handle: u16) {
        if let Some(session) = self.session().as_mut() {
            session.links.retain(|_, h| *h != handle);
        }
    }

    fn link_handle(&self, peer: &BdAddr) -> Option<u16> {
        self.session().as_ref().and_then(|s| s.links.get(peer).copied())
    }

    fn transport(&self) -> Result<Arc<T>> {
        self.session()
            .as_ref()
            .map(|s| Arc::clone(&s.transport))
            .ok_or(Error::Closed)
    }

    fn set_state(&self, status: &mut Status, state: ControllerState) {
        if status.state != state {
            debug!(
                "Controller {} state changing from {} to {}",
                self.config.name, status.state, state
            );
            status.state = state;
        }
    }

    fn status(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self) -> MutexGuard<'_, Option<Session<T>>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport> Drop for Controller<T> {
    fn drop(&mut self) {
        if self.state() != ControllerState::Closed {
            self.close();
        }
    }
}

fn is_interruption(err: &Error) -> bool {
    matches!(err, Error::Timeout(_) | Error::InvalidPacket(_))
}

fn return_parameters(event: &HciEvent) -> Result<&[u8]> {
    event
        .command_complete()
        .map(|(_, ret)| ret)
        .ok_or_else(|| Error::InvalidPacket("expected a Command Complete event".into()))
}

fn describe(command: &HciCommand) -> String {
    format!("command {:#06x}", command.opcode())
}
