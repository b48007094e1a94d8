//! Timer-relay safety variant.
//!
//! Covers the installations where the driving computer sits between the
//! camera bus (2) and the main powertrain bus (0) and relay decisions are
//! made purely from how recently the computer produced its own copy of a
//! message. Four configuration tables exist: base, longitudinal (the
//! computer also commands acceleration and may silence the radar over UDS),
//! camera-SCC (cruise radar lives behind the camera), and legacy (older
//! models without counters or checksums on the core messages).

use crate::common::clock::{elapsed_us, Clock};
use crate::common::limits::{
    longitudinal_accel_checks, HKG_LONG_LIMITS, HKG_TORQUE_LIMITS, STANDSTILL_THRESHOLD,
};
use crate::config::{CanMsg, ChecksumKind, RxCheck, SafetyConfig, VariantFlags};
use crate::context::SafetyContext;
use crate::frame::CanFrame;
use crate::rx_checks::RxChecker;
use crate::variants::addr;
use crate::{RxStatus, SafetyModel};

const BUS_MAIN: u8 = 0;
const BUS_CAMERA: u8 = 2;

/// Suppression window for the steering-adjacent messages
const LKAS_FWD_WINDOW_US: u32 = 200_000;
const MDPS_FWD_WINDOW_US: u32 = 200_000;
/// Longer windows for the cruise and collision subsystems
const SCC_FWD_WINDOW_US: u32 = 400_000;
const FCA_FWD_WINDOW_US: u32 = 400_000;

/// Only payload permitted on the radar diagnostic address: tester present
const UDS_TESTER_PRESENT_LOW: u32 = 0x0080_3E02;

/// Timestamps of the last allowed transmission per safety-relevant address.
/// `None` means never sent (or last attempt denied).
#[derive(Debug, Clone, Copy, Default)]
struct LastSent {
    lkas11: Option<u32>,
    scc12: Option<u32>,
    mdps12: Option<u32>,
    fca11: Option<u32>,
}

fn recently(last: Option<u32>, now: u32, window_us: u32) -> bool {
    matches!(last, Some(ts) if elapsed_us(now, ts) < window_us)
}

/// Safety model for the timer-relay installations
pub struct StandardSafety<C: Clock> {
    ctx: SafetyContext,
    config: SafetyConfig,
    checker: RxChecker,
    flags: VariantFlags,
    last_sent: LastSent,
    clock: C,
}

impl<C: Clock> StandardSafety<C> {
    /// Build the model for one drive cycle. Decodes the variant flags,
    /// selects the matching rule table and whitelist, and starts with
    /// control authority revoked and the relay fault cleared.
    pub fn new(param: u16, clock: C) -> Self {
        let flags = VariantFlags::from_param(param);
        let config = build_config(&flags);
        let checker = RxChecker::new(&config.rx_checks);
        Self {
            ctx: SafetyContext::new(),
            config,
            checker,
            flags,
            last_sent: LastSent::default(),
            clock,
        }
    }

    pub fn vehicle_moving(&self) -> bool {
        self.ctx.vehicle_moving
    }

    pub fn gas_pressed(&self) -> bool {
        self.ctx.gas_pressed
    }

    pub fn brake_pressed(&self) -> bool {
        self.ctx.brake_pressed
    }

    fn rx_main_bus(&mut self, frame: &CanFrame) {
        match frame.addr() {
            addr::MDPS12 => {
                // scale the raw driver torque signal to command units
                let raw = (frame.bytes(0, 4) & 0x7FF) as f32;
                self.ctx.torque_driver.push((raw * 0.79 - 808.0) as i32);
            }
            addr::CLU11 => {
                let button = frame.byte(0) & 0x7;
                // buttons manage control authority when the computer runs
                // longitudinal control, otherwise cruise state does
                if self.flags.longitudinal {
                    self.ctx.observe_cruise_button(button);
                }
            }
            addr::E_EMS11 if self.flags.ev_gas => {
                let pedal = ((frame.byte(4) as u32 & 0x7F) << 1) | (frame.byte(3) as u32 >> 7);
                self.ctx.gas_pressed = pedal != 0;
            }
            addr::E_EMS11 if self.flags.hybrid_gas => {
                self.ctx.gas_pressed = frame.byte(7) != 0;
            }
            addr::EMS16 if !self.flags.ev_gas && !self.flags.hybrid_gas => {
                self.ctx.gas_pressed = (frame.byte(7) >> 6) != 0;
            }
            addr::WHL_SPD11 => {
                // average opposite corners against the standstill threshold
                let front_left = frame.bytes(0, 2) & 0x3FFF;
                let rear_right = frame.bytes(6, 2) & 0x3FFF;
                self.ctx.vehicle_moving =
                    front_left > STANDSTILL_THRESHOLD || rear_right > STANDSTILL_THRESHOLD;
            }
            addr::TCS13 => {
                self.ctx.brake_pressed = frame.bit(55);
            }
            _ => {}
        }

        // the stock steering command must not appear on the main bus once
        // the relay has isolated the camera; with longitudinal control the
        // radar must be silent too
        let stock_ecu_detected = frame.addr() == addr::LKAS11
            || (self.flags.longitudinal && frame.addr() == addr::SCC12);
        if stock_ecu_detected {
            self.ctx.relay_malfunction = true;
        }
    }
}

impl<C: Clock> SafetyModel for StandardSafety<C> {
    fn rx(&mut self, frame: &CanFrame) {
        let now = self.clock.now_us();
        let status = self.checker.validate(frame, now);
        if !matches!(status, RxStatus::Ok | RxStatus::UnknownAddr) {
            return;
        }

        if frame.addr() == addr::SCC11 {
            self.ctx.observe_cruise_state(frame.bit(0));
        }

        if frame.bus() == BUS_MAIN {
            self.rx_main_bus(frame);
        }
    }

    fn tx(&mut self, frame: &CanFrame) -> bool {
        let now = self.clock.now_us();
        let mut tx = self.config.tx_whitelisted(frame);

        if tx {
            match frame.addr() {
                // forward-collision actuation must never be commanded
                addr::FCA11 => {
                    let decel_cmd = frame.byte(1);
                    let fca_cmd_act = frame.bit(20);
                    let vsm_dec_cmd_act = frame.bit(31);
                    if decel_cmd != 0 || fca_cmd_act || vsm_dec_cmd_act {
                        tx = false;
                    }
                }
                // both redundant acceleration encodings must be in bounds
                addr::SCC12 => {
                    let accel_raw = (((frame.byte(4) as i32 & 0x7) << 8)
                        | frame.byte(3) as i32)
                        - 1023;
                    let accel_val = (((frame.byte(5) as i32) << 3)
                        | (frame.byte(4) as i32 >> 5))
                        - 1023;

                    let violation = longitudinal_accel_checks(accel_raw, &HKG_LONG_LIMITS)
                        || longitudinal_accel_checks(accel_val, &HKG_LONG_LIMITS);
                    if violation {
                        tx = false;
                    }
                }
                addr::LKAS11 => {
                    let desired_torque = ((frame.bytes(0, 4) >> 16) & 0x7FF) as i32 - 1024;
                    if self
                        .ctx
                        .steer_torque_cmd_check(desired_torque, now, &HKG_TORQUE_LIMITS)
                    {
                        tx = false;
                    }
                }
                // only the tester-present keep-alive may reach the radar's
                // diagnostic address
                addr::RADAR_UDS => {
                    if frame.bytes(0, 4) != UDS_TESTER_PRESENT_LOW || frame.bytes(4, 4) != 0 {
                        tx = false;
                    }
                }
                _ => {}
            }
        }

        match frame.addr() {
            addr::LKAS11 => self.last_sent.lkas11 = tx.then_some(now),
            addr::SCC12 => self.last_sent.scc12 = tx.then_some(now),
            addr::MDPS12 => self.last_sent.mdps12 = tx.then_some(now),
            addr::FCA11 => self.last_sent.fca11 = tx.then_some(now),
            _ => {}
        }

        tx
    }

    fn fwd(&mut self, bus: u8, addr: u16) -> Option<u8> {
        let now = self.clock.now_us();

        match bus {
            // powertrain to camera: forward everything except the steering
            // module's own message while our copy is fresh
            BUS_MAIN => {
                if addr == addr::MDPS12 && recently(self.last_sent.mdps12, now, MDPS_FWD_WINDOW_US)
                {
                    None
                } else {
                    Some(BUS_CAMERA)
                }
            }
            // camera to powertrain: block the stock command messages while
            // ours are fresh, let them through if we have gone quiet so the
            // car is never left without a command
            BUS_CAMERA => {
                let is_lkas_msg = addr == addr::LKAS11 || addr == addr::LFAHDA_MFC;
                let is_scc_msg =
                    matches!(addr, addr::SCC11 | addr::SCC12 | addr::SCC13 | addr::SCC14);
                let is_fca_msg = matches!(addr, addr::FCA11 | addr::FCA12);

                let blocked = if is_lkas_msg {
                    recently(self.last_sent.lkas11, now, LKAS_FWD_WINDOW_US)
                } else if is_scc_msg {
                    recently(self.last_sent.scc12, now, SCC_FWD_WINDOW_US)
                } else if is_fca_msg {
                    recently(self.last_sent.fca11, now, FCA_FWD_WINDOW_US)
                } else {
                    false
                };

                (!blocked).then_some(BUS_MAIN)
            }
            _ => None,
        }
    }

    fn config(&self) -> &SafetyConfig {
        &self.config
    }

    fn controls_allowed(&self) -> bool {
        self.ctx.controls_allowed
    }

    fn relay_malfunction(&self) -> bool {
        self.ctx.relay_malfunction
    }
}

/// Rules shared by every non-legacy table
fn core_rx_checks() -> Vec<RxCheck> {
    vec![
        RxCheck::new(
            CanMsg::new(addr::EMS16, BUS_MAIN, 8),
            ChecksumKind::NibbleSum,
            3,
            100,
        ),
        RxCheck::new(CanMsg::new(addr::E_EMS11, BUS_MAIN, 8), ChecksumKind::None, 0, 100),
        RxCheck::new(
            CanMsg::new(addr::MDPS12, BUS_MAIN, 8),
            ChecksumKind::Crc8,
            15,
            100,
        ),
        RxCheck::new(
            CanMsg::new(addr::WHL_SPD11, BUS_MAIN, 8),
            ChecksumKind::None,
            0,
            100,
        ),
        RxCheck::new(
            CanMsg::new(addr::TCS13, BUS_MAIN, 8),
            ChecksumKind::Sum8,
            7,
            100,
        ),
    ]
}

fn scc12_check(bus: u8) -> RxCheck {
    RxCheck::new(CanMsg::new(addr::SCC12, bus, 8), ChecksumKind::NibbleSum, 15, 50)
}

fn base_tx_msgs() -> Vec<CanMsg> {
    vec![
        CanMsg::new(addr::LKAS11, BUS_MAIN, 8),
        CanMsg::new(addr::CLU11, BUS_MAIN, 4),
        CanMsg::new(addr::LFAHDA_MFC, BUS_MAIN, 4),
        CanMsg::new(addr::CLU11, BUS_CAMERA, 4),
        CanMsg::new(addr::MDPS12, BUS_CAMERA, 8),
        CanMsg::new(addr::SCC11, BUS_MAIN, 8),
        CanMsg::new(addr::SCC12, BUS_MAIN, 8),
        CanMsg::new(addr::SCC13, BUS_MAIN, 8),
        CanMsg::new(addr::SCC14, BUS_MAIN, 8),
        CanMsg::new(addr::FCA11, BUS_MAIN, 8),
        CanMsg::new(addr::FCA12, BUS_MAIN, 8),
        CanMsg::new(addr::FRT_RADAR11, BUS_MAIN, 8),
    ]
}

fn build_config(flags: &VariantFlags) -> SafetyConfig {
    if flags.legacy {
        // older models have fewer checks due to missing counters/checksums
        return SafetyConfig {
            rx_checks: vec![
                RxCheck::new(
                    CanMsg::new(addr::EMS16, BUS_MAIN, 8),
                    ChecksumKind::NibbleSum,
                    3,
                    100,
                ),
                RxCheck::new(CanMsg::new(addr::E_EMS11, BUS_MAIN, 8), ChecksumKind::None, 0, 100),
                RxCheck::new(
                    CanMsg::new(addr::WHL_SPD11, BUS_MAIN, 8),
                    ChecksumKind::None,
                    0,
                    50,
                ),
            ],
            tx_msgs: base_tx_msgs(),
        };
    }

    if flags.longitudinal {
        let mut rx_checks = core_rx_checks();
        // buttons manage controls allowed instead of the cruise state
        rx_checks.push(RxCheck::new(
            CanMsg::new(addr::CLU11, BUS_MAIN, 4),
            ChecksumKind::None,
            15,
            50,
        ));
        return SafetyConfig {
            rx_checks,
            tx_msgs: vec![
                CanMsg::new(addr::LKAS11, BUS_MAIN, 8),
                CanMsg::new(addr::CLU11, BUS_MAIN, 4),
                CanMsg::new(addr::LFAHDA_MFC, BUS_MAIN, 4),
                CanMsg::new(addr::SCC11, BUS_MAIN, 8),
                CanMsg::new(addr::SCC12, BUS_MAIN, 8),
                CanMsg::new(addr::SCC13, BUS_MAIN, 8),
                CanMsg::new(addr::SCC14, BUS_MAIN, 8),
                CanMsg::new(addr::FRT_RADAR11, BUS_MAIN, 2),
                CanMsg::new(addr::FCA11, BUS_MAIN, 8),
                CanMsg::new(addr::FCA12, BUS_MAIN, 8),
                // radar disable over diagnostics
                CanMsg::new(addr::RADAR_UDS, BUS_MAIN, 8),
                CanMsg::new(addr::CLU11, BUS_CAMERA, 4),
                CanMsg::new(addr::MDPS12, BUS_CAMERA, 8),
            ],
        };
    }

    if flags.camera_scc {
        let mut rx_checks = core_rx_checks();
        // cruise command originates behind the camera on these cars
        rx_checks.push(scc12_check(BUS_CAMERA));
        return SafetyConfig {
            rx_checks,
            tx_msgs: base_tx_msgs(),
        };
    }

    let mut rx_checks = core_rx_checks();
    rx_checks.push(scc12_check(BUS_MAIN));
    SafetyConfig {
        rx_checks,
        tx_msgs: base_tx_msgs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::checksum;
    use crate::common::clock::ManualClock;
    use crate::config::{PARAM_CAMERA_SCC, PARAM_EV_GAS, PARAM_LEGACY, PARAM_LONGITUDINAL};

    /// Steering command frame with the torque field encoded at bits 16..27
    fn lkas11_frame(torque: i32) -> CanFrame {
        let field = (torque + 1024) as u32;
        let mut data = [0u8; 8];
        data[2] = (field & 0xFF) as u8;
        data[3] = ((field >> 8) & 0x7) as u8;
        CanFrame::new(addr::LKAS11, BUS_MAIN, &data).unwrap()
    }

    /// Cruise status frame with the availability bit set or cleared
    fn scc11_frame(available: bool) -> CanFrame {
        let mut data = [0u8; 8];
        if available {
            data[0] = 0x01;
        }
        CanFrame::new(addr::SCC11, BUS_MAIN, &data).unwrap()
    }

    /// Cruise command frame carrying both redundant accel encodings
    fn scc12_frame(accel: i32) -> CanFrame {
        let raw = (accel + 1023) as u32;
        let val = (accel + 1023) as u32;
        let mut data = [0u8; 8];
        data[3] = (raw & 0xFF) as u8;
        data[4] = ((raw >> 8) & 0x7) as u8;
        data[4] |= ((val & 0x7) << 5) as u8;
        data[5] = ((val >> 3) & 0xFF) as u8;
        CanFrame::new(addr::SCC12, BUS_MAIN, &data).unwrap()
    }

    fn engage(safety: &mut StandardSafety<&ManualClock>) {
        safety.rx(&scc11_frame(true));
        assert!(safety.controls_allowed());
    }

    #[test]
    fn test_base_config_contents() {
        let clock = ManualClock::new();
        let safety = StandardSafety::new(0, &clock);
        let config = safety.config();

        for msg in [
            CanMsg::new(addr::LKAS11, 0, 8),
            CanMsg::new(addr::CLU11, 0, 4),
            CanMsg::new(addr::CLU11, 2, 4),
            CanMsg::new(addr::SCC11, 0, 8),
            CanMsg::new(addr::SCC12, 0, 8),
            CanMsg::new(addr::MDPS12, 2, 8),
        ] {
            assert!(config.tx_msgs.contains(&msg), "missing {:?}", msg);
        }

        let whl = config.rx_rule(addr::WHL_SPD11, 0).unwrap();
        assert_eq!(whl.frequency_hz, 100);
        let mdps = config.rx_rule(addr::MDPS12, 0).unwrap();
        assert_eq!(mdps.frequency_hz, 100);
    }

    #[test]
    fn test_variant_tables_differ() {
        let clock = ManualClock::new();

        let long = StandardSafety::new(PARAM_LONGITUDINAL, &clock);
        assert!(long
            .config()
            .tx_msgs
            .contains(&CanMsg::new(addr::RADAR_UDS, 0, 8)));
        assert!(long.config().rx_rule(addr::SCC12, 0).is_none());
        assert!(long.config().rx_rule(addr::CLU11, 0).is_some());

        let camera = StandardSafety::new(PARAM_CAMERA_SCC, &clock);
        assert!(camera.config().rx_rule(addr::SCC12, 2).is_some());
        assert!(camera.config().rx_rule(addr::SCC12, 0).is_none());

        let legacy = StandardSafety::new(PARAM_LEGACY, &clock);
        assert_eq!(
            legacy.config().rx_rule(addr::WHL_SPD11, 0).unwrap().frequency_hz,
            50
        );
        assert!(legacy.config().rx_rule(addr::TCS13, 0).is_none());
    }

    #[test]
    fn test_tx_unknown_addr_always_denied() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);
        engage(&mut safety);
        let frame = CanFrame::new(0x2AB, 0, &[0xFF; 8]).unwrap();
        assert!(!safety.tx(&frame));
    }

    #[test]
    fn test_tx_wrong_bus_or_len_denied() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);
        let wrong_bus = CanFrame::new(addr::LKAS11, 1, &[0, 0, 0, 4, 0, 0, 0, 0]).unwrap();
        let wrong_len = CanFrame::new(addr::LKAS11, 0, &[0, 0, 0, 4]).unwrap();
        assert!(!safety.tx(&wrong_bus));
        assert!(!safety.tx(&wrong_len));
    }

    #[test]
    fn test_torque_above_absolute_bound_denied_but_advances() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);
        engage(&mut safety);
        assert!(!safety.tx(&lkas11_frame(400)));
        // self-correcting policy: the attempted value is the new reference
        assert_eq!(safety.ctx.torque.desired_torque_last, 400);
    }

    #[test]
    fn test_torque_ramp_within_rate_allowed() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);
        engage(&mut safety);
        let mut torque = 0;
        for _ in 0..100 {
            torque += HKG_TORQUE_LIMITS.max_rate_up;
            assert!(safety.tx(&lkas11_frame(torque)), "torque={}", torque);
            clock.advance(10_000);
        }
    }

    #[test]
    fn test_torque_step_beyond_rate_denied() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);
        engage(&mut safety);
        assert!(!safety.tx(&lkas11_frame(HKG_TORQUE_LIMITS.max_rate_up + 1)));
    }

    #[test]
    fn test_authority_loss_zeroes_torque_state() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);
        engage(&mut safety);
        assert!(safety.tx(&lkas11_frame(3)));
        clock.advance(10_000);

        safety.rx(&scc11_frame(false));
        assert!(!safety.controls_allowed());

        // non-zero torque is now itself a violation
        assert!(!safety.tx(&lkas11_frame(3)));
        assert_eq!(safety.ctx.torque.desired_torque_last, 0);
        assert_eq!(safety.ctx.torque.rt_torque_last, 0);

        // zero torque remains allowed
        assert!(safety.tx(&lkas11_frame(0)));
    }

    #[test]
    fn test_fca_actuation_always_denied() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);

        let mut data = [0u8; 8];
        data[1] = 0x10; // non-zero deceleration command
        let decel = CanFrame::new(addr::FCA11, 0, &data).unwrap();
        assert!(!safety.tx(&decel));

        engage(&mut safety);
        assert!(!safety.tx(&decel));

        let mut data = [0u8; 8];
        data[2] = 0x10; // FCA_CmdAct, bit 20
        assert!(!safety.tx(&CanFrame::new(addr::FCA11, 0, &data).unwrap()));

        // all-clear payload passes
        assert!(safety.tx(&CanFrame::new(addr::FCA11, 0, &[0u8; 8]).unwrap()));
    }

    #[test]
    fn test_accel_bounds() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);
        engage(&mut safety);

        assert!(safety.tx(&scc12_frame(0)));
        assert!(safety.tx(&scc12_frame(200)));
        assert!(!safety.tx(&scc12_frame(201)));
        assert!(safety.tx(&scc12_frame(-350)));
        assert!(!safety.tx(&scc12_frame(-351)));
    }

    #[test]
    fn test_uds_tester_present_only() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(PARAM_LONGITUDINAL, &clock);
        let tester = CanFrame::new(
            addr::RADAR_UDS,
            0,
            &[0x02, 0x3E, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00],
        )
        .unwrap();
        assert!(safety.tx(&tester));

        let other = CanFrame::new(
            addr::RADAR_UDS,
            0,
            &[0x02, 0x10, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00],
        )
        .unwrap();
        assert!(!safety.tx(&other));
    }

    #[test]
    fn test_fwd_defaults_before_any_traffic() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);
        // unknown state never suppresses
        assert_eq!(safety.fwd(0, addr::MDPS12), Some(2));
        assert_eq!(safety.fwd(2, addr::LKAS11), Some(0));
        assert_eq!(safety.fwd(2, addr::SCC12), Some(0));
        assert_eq!(safety.fwd(2, 0x123), Some(0));
        assert_eq!(safety.fwd(1, addr::LKAS11), None);
    }

    #[test]
    fn test_fwd_suppresses_stock_steering_within_window() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);

        assert!(safety.tx(&lkas11_frame(0)));
        clock.advance(50_000);
        assert_eq!(safety.fwd(2, addr::LKAS11), None);
        assert_eq!(safety.fwd(2, addr::LFAHDA_MFC), None);

        // once we go quiet the stock message is let through again
        clock.advance(250_000);
        assert_eq!(safety.fwd(2, addr::LKAS11), Some(0));
    }

    #[test]
    fn test_fwd_scc_window_is_longer() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);

        assert!(safety.tx(&scc12_frame(0)));
        clock.advance(300_000);
        assert_eq!(safety.fwd(2, addr::SCC11), None);
        clock.advance(200_000);
        assert_eq!(safety.fwd(2, addr::SCC11), Some(0));
    }

    #[test]
    fn test_fwd_denied_tx_does_not_suppress() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);

        engage(&mut safety);
        assert!(!safety.tx(&lkas11_frame(400)));
        clock.advance(50_000);
        // a denied command never reached the wire, so nothing to protect
        assert_eq!(safety.fwd(2, addr::LKAS11), Some(0));
    }

    #[test]
    fn test_fwd_mdps_suppression_toward_camera() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);

        let mdps = CanFrame::new(addr::MDPS12, BUS_CAMERA, &[0u8; 8]).unwrap();
        assert!(safety.tx(&mdps));
        clock.advance(100_000);
        assert_eq!(safety.fwd(0, addr::MDPS12), None);
        clock.advance(150_000);
        assert_eq!(safety.fwd(0, addr::MDPS12), Some(2));
    }

    #[test]
    fn test_rx_driver_torque_feeds_window() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);

        // torque field raw 1100 decodes to 0.79 * 1100 - 808 = 61
        let mut data = [0u8; 8];
        data[0] = 0x4C;
        data[1] = 0x04;
        data[6] = 0; // counter
        data[7] = checksum::crc8(&[&data[..7]]);
        let frame = CanFrame::new(addr::MDPS12, 0, &data).unwrap();
        safety.rx(&frame);
        clock.advance(10_000);
        assert_eq!(safety.ctx.torque_driver.max(), 61);

        // corrupt checksum never updates the window
        let mut bad = data;
        bad[7] ^= 0xFF;
        let frame = CanFrame::new(addr::MDPS12, 0, &bad).unwrap();
        safety.rx(&frame);
        assert_eq!(safety.ctx.torque_driver.max(), 61);
    }

    #[test]
    fn test_rx_wheel_speed_motion() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);

        let mut data = [0u8; 8];
        data[0] = 100; // front left above threshold
        safety.rx(&CanFrame::new(addr::WHL_SPD11, 0, &data).unwrap());
        assert!(safety.vehicle_moving());

        clock.advance(10_000);
        data[0] = 10;
        safety.rx(&CanFrame::new(addr::WHL_SPD11, 0, &data).unwrap());
        assert!(!safety.vehicle_moving());
    }

    #[test]
    fn test_rx_gas_per_powertrain() {
        // ICE: gas lives in the engine status message
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);
        let mut data = [0u8; 8];
        data[7] = 0x40;
        data[7] |= checksum::nibble_sum(&data);
        safety.rx(&CanFrame::new(addr::EMS16, 0, &data).unwrap());
        assert!(safety.gas_pressed());

        // EV: gas lives in the powertrain status message
        let mut safety = StandardSafety::new(PARAM_EV_GAS, &clock);
        let mut data = [0u8; 8];
        data[4] = 0x01;
        safety.rx(&CanFrame::new(addr::E_EMS11, 0, &data).unwrap());
        assert!(safety.gas_pressed());
    }

    #[test]
    fn test_rx_brake() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);
        let mut data = [0u8; 8];
        data[6] = 0x80; // bit 55
        data[7] = checksum::sum8(&data[..7]);
        safety.rx(&CanFrame::new(addr::TCS13, 0, &data).unwrap());
        assert!(safety.brake_pressed());
    }

    #[test]
    fn test_stock_steering_on_main_bus_latches_relay_fault() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(0, &clock);
        assert!(!safety.relay_malfunction());
        safety.rx(&CanFrame::new(addr::LKAS11, 0, &[0u8; 8]).unwrap());
        assert!(safety.relay_malfunction());
    }

    #[test]
    fn test_longitudinal_radar_must_stay_silent() {
        let clock = ManualClock::new();
        let mut safety = StandardSafety::new(PARAM_LONGITUDINAL, &clock);
        safety.rx(&CanFrame::new(addr::SCC12, 0, &[0u8; 8]).unwrap());
        assert!(safety.relay_malfunction());

        // without longitudinal control the radar is expected to talk
        let mut safety = StandardSafety::new(0, &clock);
        let mut data = [0u8; 8];
        data[7] = checksum::nibble_sum(&data);
        safety.rx(&CanFrame::new(addr::SCC12, 0, &data).unwrap());
        assert!(!safety.relay_malfunction());
    }
}
