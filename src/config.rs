//! Safety configuration: RX rule table, TX whitelist, and the per-drive
//! variant flags decoded from the init parameter.

use crate::frame::CanFrame;

/// Address, bus and payload length of one whitelisted outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanMsg {
    pub addr: u16,
    pub bus: u8,
    pub len: u8,
}

impl CanMsg {
    pub const fn new(addr: u16, bus: u8, len: u8) -> Self {
        Self { addr, bus, len }
    }
}

/// Checksum convention carried by a message, if any.
///
/// The crate-wide field layout: for [`ChecksumKind::NibbleSum`] the checksum
/// occupies the low nibble of the last payload byte and the counter the high
/// nibble; for the byte-wide kinds the checksum occupies the whole last byte
/// and the counter the low bits of the byte before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumKind {
    /// Message carries no checksum
    #[default]
    None,
    /// Byte sum modulo 256 over the payload before the checksum byte
    Sum8,
    /// Family CRC-8 over the payload before the checksum byte
    Crc8,
    /// 4-bit nibble-sum complement over the payload with the checksum
    /// nibble cleared
    NibbleSum,
}

/// Validation rule for one expected inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxCheck {
    pub msg: CanMsg,
    pub checksum: ChecksumKind,
    /// Maximum counter value; 0 if the message carries no counter
    pub max_counter: u8,
    /// Nominal frequency in Hz
    pub frequency_hz: u16,
}

impl RxCheck {
    pub const fn new(
        msg: CanMsg,
        checksum: ChecksumKind,
        max_counter: u8,
        frequency_hz: u16,
    ) -> Self {
        Self {
            msg,
            checksum,
            max_counter,
            frequency_hz,
        }
    }
}

/// The immutable per-drive configuration: what may be received with which
/// guarantees, and what may be transmitted at all.
#[derive(Debug, Clone)]
pub struct SafetyConfig {
    pub rx_checks: Vec<RxCheck>,
    pub tx_msgs: Vec<CanMsg>,
}

impl SafetyConfig {
    /// Whitelist lookup: an outbound frame must match an entry by address,
    /// bus and length before any semantic check runs.
    pub fn tx_whitelisted(&self, frame: &CanFrame) -> bool {
        self.tx_msgs
            .iter()
            .any(|m| m.addr == frame.addr() && m.bus == frame.bus() && m.len == frame.len())
    }

    /// The RX rule covering an address/bus pair, if any.
    pub fn rx_rule(&self, addr: u16, bus: u8) -> Option<&RxCheck> {
        self.rx_checks
            .iter()
            .find(|c| c.msg.addr == addr && c.msg.bus == bus)
    }
}

/// Init parameter bit: gas telemetry uses the EV powertrain signal
pub const PARAM_EV_GAS: u16 = 1;
/// Init parameter bit: gas telemetry uses the hybrid powertrain signal
pub const PARAM_HYBRID_GAS: u16 = 2;
/// Init parameter bit: adaptive cruise radar lives behind the camera
pub const PARAM_CAMERA_SCC: u16 = 4;
/// Init parameter bit: the driving computer controls longitudinal motion
pub const PARAM_LONGITUDINAL: u16 = 8;
/// Init parameter bit: older model without counters/checksums on core messages
pub const PARAM_LEGACY: u16 = 16;
/// Init parameter bit: bus 1 is wired through the OBD connector and must be
/// relayed regardless of what is discovered on it
pub const PARAM_OBD_RELAY: u16 = 32;

/// Vehicle-variant flags, decoded once per drive cycle from the init
/// parameter. Contradictory combinations degrade to the most restrictive
/// settings rather than failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariantFlags {
    pub ev_gas: bool,
    pub hybrid_gas: bool,
    pub camera_scc: bool,
    pub longitudinal: bool,
    pub legacy: bool,
    pub obd_relay: bool,
}

impl VariantFlags {
    pub fn from_param(param: u16) -> Self {
        let mut flags = Self {
            ev_gas: param & PARAM_EV_GAS != 0,
            hybrid_gas: param & PARAM_HYBRID_GAS != 0,
            camera_scc: param & PARAM_CAMERA_SCC != 0,
            longitudinal: param & PARAM_LONGITUDINAL != 0,
            legacy: param & PARAM_LEGACY != 0,
            obd_relay: param & PARAM_OBD_RELAY != 0,
        };

        // camera-based SCC cars have no radar for the computer to command
        if flags.camera_scc {
            flags.longitudinal = false;
        }
        // a car cannot be both EV and hybrid; fall back to the legacy table
        if flags.ev_gas && flags.hybrid_gas {
            flags.ev_gas = false;
            flags.hybrid_gas = false;
            flags.legacy = true;
        }
        if flags.legacy {
            flags.longitudinal = false;
            flags.camera_scc = false;
        }
        flags
    }
}
