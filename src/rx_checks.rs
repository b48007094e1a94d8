//! Generic per-rule enforcement of counter, checksum and frequency
//! guarantees on inbound frames.
//!
//! Field conventions match [`crate::config::ChecksumKind`]: byte-wide
//! checksums occupy the last payload byte with the counter in the byte
//! before it; the nibble-sum style packs counter and checksum into the high
//! and low nibbles of the last byte.

use crate::common::checksum;
use crate::common::clock::elapsed_us;
use crate::config::{ChecksumKind, RxCheck};
use crate::frame::CanFrame;
use crate::RxStatus;

/// Inter-arrival tolerance around the nominal period, as a factor
const FREQ_TOLERANCE: u32 = 10;

#[derive(Debug, Clone)]
struct RxCheckState {
    rule: RxCheck,
    last_counter: u8,
    last_ts: Option<u32>,
    seen: bool,
}

/// Stateful validator for the active RX rule table.
///
/// One state record per rule; frames whose address/bus match no rule are
/// reported as [`RxStatus::UnknownAddr`] and left to the caller.
#[derive(Debug, Clone)]
pub struct RxChecker {
    entries: Vec<RxCheckState>,
}

impl RxChecker {
    pub fn new(rules: &[RxCheck]) -> Self {
        Self {
            entries: rules
                .iter()
                .map(|&rule| RxCheckState {
                    rule,
                    last_counter: 0,
                    last_ts: None,
                    seen: false,
                })
                .collect(),
        }
    }

    /// Validate one inbound frame against its rule.
    ///
    /// A length mismatch is reported before any state is touched. Checksum,
    /// counter and frequency are checked in that order; the first violation
    /// wins. Arrival state advances even on violation so a single bad frame
    /// cannot wedge the stream.
    pub fn validate(&mut self, frame: &CanFrame, now: u32) -> RxStatus {
        let entry = match self
            .entries
            .iter_mut()
            .find(|e| e.rule.msg.addr == frame.addr() && e.rule.msg.bus == frame.bus())
        {
            Some(entry) => entry,
            None => return RxStatus::UnknownAddr,
        };

        if frame.len() != entry.rule.msg.len {
            return RxStatus::LengthError;
        }

        let mut status = RxStatus::Ok;

        if !verify_checksum(frame, entry.rule.checksum) {
            status = RxStatus::ChecksumError;
        }

        if status == RxStatus::Ok && entry.rule.max_counter > 0 {
            let counter = read_counter(frame, &entry.rule);
            if entry.seen {
                let modulo = entry.rule.max_counter as u16 + 1;
                let delta =
                    (counter as u16 + modulo - entry.last_counter as u16) % modulo;
                if delta != 1 {
                    status = RxStatus::CounterError;
                }
            }
            entry.last_counter = counter;
        }

        if status == RxStatus::Ok && entry.rule.frequency_hz > 0 {
            if let Some(last) = entry.last_ts {
                let period = 1_000_000 / entry.rule.frequency_hz as u32;
                let dt = elapsed_us(now, last);
                if dt < period / FREQ_TOLERANCE {
                    status = RxStatus::TooFrequent;
                } else if dt > period.saturating_mul(FREQ_TOLERANCE) {
                    status = RxStatus::Stale;
                }
            }
        }

        entry.last_ts = Some(now);
        entry.seen = true;
        status
    }
}

fn verify_checksum(frame: &CanFrame, kind: ChecksumKind) -> bool {
    let data = frame.data();
    if data.len() < 2 {
        return true;
    }
    let last = data.len() - 1;
    match kind {
        ChecksumKind::None => true,
        ChecksumKind::Sum8 => data[last] == checksum::sum8(&data[..last]),
        ChecksumKind::Crc8 => data[last] == checksum::crc8(&[&data[..last]]),
        ChecksumKind::NibbleSum => {
            let mut scrubbed = [0u8; 8];
            scrubbed[..data.len()].copy_from_slice(data);
            scrubbed[last] &= 0xF0;
            (data[last] & 0x0F) == checksum::nibble_sum(&scrubbed[..data.len()])
        }
    }
}

fn read_counter(frame: &CanFrame, rule: &RxCheck) -> u8 {
    let last = frame.len() as usize - 1;
    match rule.checksum {
        ChecksumKind::NibbleSum => (frame.byte(last) >> 4) & rule.max_counter,
        _ => frame.byte(last.saturating_sub(1)) & rule.max_counter,
    }
}
