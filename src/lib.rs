//! # HKG CAN Safety Gatekeeper
//!
//! This library implements the safety gatekeeper that sits between a
//! driver-assistance computer and the CAN buses of Hyundai/Kia family
//! vehicles.
//!
//! ## Overview
//!
//! Every inbound vehicle frame is inspected to track real-world state
//! (driver torque, wheel speeds, cruise status), every outbound command from
//! the driving computer is validated before it may reach an actuator, and
//! frames are selectively relayed between the camera and powertrain buses.
//! The checks enforced are:
//! - TX whitelist by address, bus and length
//! - Steering torque limits (absolute, rate, driver override, realtime)
//! - Longitudinal acceleration bounds and forward-collision actuation blocks
//! - Per-rule counter/checksum/frequency validation of inbound frames
//!
//! ## Example
//!
//! ```rust
//! use hkg_safety::{CanFrame, SafetyModel, SafetyResult, StandardSafety};
//! use hkg_safety::common::clock::StdClock;
//!
//! # fn main() -> SafetyResult<()> {
//! let mut safety = StandardSafety::new(0, StdClock::new());
//!
//! // A steering command with zero requested torque is allowed even before
//! // cruise control has granted control authority.
//! let lkas11 = CanFrame::new(0x340, 0, &[0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00])?;
//! assert!(safety.tx(&lkas11));
//!
//! // An unknown address is always denied, independent of its payload.
//! let unknown = CanFrame::new(0x123, 0, &[0x00; 8])?;
//! assert!(!safety.tx(&unknown));
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

pub mod common;
pub mod config;
pub mod context;
pub mod frame;
pub mod rx_checks;

mod variants;
pub use variants::multibus::MultibusSafety;
pub use variants::standard::StandardSafety;

pub use config::SafetyConfig;
pub use frame::CanFrame;

/// Result type for safety operations
pub type SafetyResult<T> = Result<T, SafetyError>;

/// Error types for frame and configuration construction.
///
/// Check outcomes are never errors: a denied transmission is a `false` from
/// [`SafetyModel::tx`], a suppressed relay is a `None` from
/// [`SafetyModel::fwd`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SafetyError {
    /// Malformed CAN frame
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Validation status of a single inbound frame against its RX rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxStatus {
    /// Frame passed all rule checks for its address
    Ok,
    /// No rule covers this address/bus; the frame is not validated
    UnknownAddr,
    /// Payload length differs from the rule's expected length
    LengthError,
    /// Rolling checksum mismatch
    ChecksumError,
    /// Counter did not advance as expected
    CounterError,
    /// Frame arrived much faster than its nominal frequency
    TooFrequent,
    /// Frame arrived much slower than its nominal frequency
    Stale,
}

/// Common interface of the per-variant safety models.
///
/// Each model is invoked synchronously from the transport layer and provides
/// three entry points:
/// - `rx`: observe an inbound vehicle frame (purely state-updating)
/// - `tx`: decide whether an outbound command may be transmitted
/// - `fwd`: decide the relay destination of an inbound frame
pub trait SafetyModel {
    /// Observe an inbound frame. Updates driver-torque samples, vehicle
    /// motion, cruise state and bus-discovery bookkeeping. Frames failing
    /// their RX rule never update state.
    fn rx(&mut self, frame: &CanFrame);

    /// Validate an outbound frame request. `true` allows transmission,
    /// `false` drops the frame before it reaches the wire.
    fn tx(&mut self, frame: &CanFrame) -> bool;

    /// Decide where an inbound frame should be relayed. `None` means do not
    /// forward; `Some(bus)` forwards the frame unmodified to that bus.
    fn fwd(&mut self, bus: u8, addr: u16) -> Option<u8>;

    /// The active RX rule table and TX whitelist.
    fn config(&self) -> &SafetyConfig;

    /// Whether non-zero actuation commands are currently permitted.
    fn controls_allowed(&self) -> bool;

    /// Latched flag indicating a persistent conflict between the driving
    /// computer and a stock ECU on a safety-relevant message.
    fn relay_malfunction(&self) -> bool;
}
