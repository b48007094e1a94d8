//! CAN frame value type and payload accessors.
//!
//! Frames are immutable once constructed. The bit/byte accessors follow the
//! on-wire conventions of the vehicle family: multi-byte fields aggregate
//! little-endian, single bits are addressed LSB-first across the payload.

use crate::{SafetyError, SafetyResult};

/// Maximum payload length of a classic CAN frame
pub const MAX_FRAME_LEN: usize = 8;

/// A single CAN frame as observed by the gatekeeper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    addr: u16,
    bus: u8,
    len: u8,
    data: [u8; MAX_FRAME_LEN],
}

impl CanFrame {
    /// Create a new frame. The payload must fit a classic CAN frame.
    ///
    /// # Errors
    /// Returns `SafetyError::InvalidFrame` if the payload exceeds 8 bytes.
    pub fn new(addr: u16, bus: u8, payload: &[u8]) -> SafetyResult<Self> {
        if payload.len() > MAX_FRAME_LEN {
            return Err(SafetyError::InvalidFrame(format!(
                "Payload of {} bytes exceeds {} byte maximum",
                payload.len(),
                MAX_FRAME_LEN
            )));
        }
        let mut data = [0u8; MAX_FRAME_LEN];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            addr,
            bus,
            len: payload.len() as u8,
            data,
        })
    }

    pub fn addr(&self) -> u16 {
        self.addr
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }

    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Payload slice, `len` bytes long
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Single payload byte. Bytes past `len` read as zero.
    pub fn byte(&self, index: usize) -> u8 {
        self.data[index]
    }

    /// Aggregate up to 4 payload bytes starting at `offset`, little-endian.
    pub fn bytes(&self, offset: usize, count: usize) -> u32 {
        let mut value = 0u32;
        for i in 0..count {
            value |= (self.data[offset + i] as u32) << (8 * i);
        }
        value
    }

    /// Single payload bit, addressed LSB-first across the payload.
    pub fn bit(&self, position: u32) -> bool {
        let byte = (position / 8) as usize;
        let shift = position % 8;
        (self.data[byte] >> shift) & 0x1 != 0
    }
}
