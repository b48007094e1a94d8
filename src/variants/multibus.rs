//! Bus-discovery safety variant.
//!
//! Covers the split-bus installations where the power steering module or
//! the cruise radar may live on bus 1 instead of the powertrain bus, and
//! where a local CAN segment may be wired to bus 1 instead. Nothing is
//! assumed at power-on: which module lives where is learned from traffic,
//! and relay decisions come from per-function activity counters rather
//! than timestamps.

use crate::common::clock::Clock;
use crate::common::limits::{HKG_TORQUE_LIMITS, STANDSTILL_THRESHOLD};
use crate::config::{CanMsg, ChecksumKind, RxCheck, SafetyConfig, VariantFlags};
use crate::context::{SafetyContext, CRUISE_BTN_CANCEL};
use crate::frame::CanFrame;
use crate::rx_checks::RxChecker;
use crate::variants::addr;
use crate::{RxStatus, SafetyModel};

const BUS_MAIN: u8 = 0;
const BUS_AUX: u8 = 1;
const BUS_CAMERA: u8 = 2;

/// Frames of our own output per function before it counts as quiet
const LIVE_FRAMES: u8 = 20;
/// Frames of grace once local-CAN markers have been seen on bus 1
const LCAN_HOLD_FRAMES: u16 = 500;
/// Frames of grace once the stock steering command appears on the main bus
const LKAS_BUS0_HOLD_FRAMES: u8 = 20;

fn is_cruise_addr(addr_in: u16) -> bool {
    matches!(
        addr_in,
        addr::SCC11 | addr::SCC12 | addr::SCC13 | addr::SCC14
    )
}

/// Learned bus topology.
///
/// The hold counters keep a single stray frame from flapping the relay
/// state: a claim only lapses once the competing countdown has run out.
#[derive(Debug, Clone)]
struct BusDiscovery {
    mdps_bus: Option<u8>,
    scc_bus: Option<u8>,
    lcan_on_bus1: bool,
    forward_bus1: bool,
    forward_obd: bool,
    forward_bus2: bool,
    lkas_bus0_frames: u8,
    lcan_frames: u16,
}

impl BusDiscovery {
    fn new(forward_obd: bool) -> Self {
        Self {
            mdps_bus: None,
            scc_bus: None,
            lcan_on_bus1: false,
            forward_bus1: false,
            forward_obd,
            forward_bus2: true,
            lkas_bus0_frames: 0,
            lcan_frames: 0,
        }
    }

    /// Destination for frames that should reach bus 1, if it is relayed.
    fn bus1_destination(&self) -> Option<u8> {
        (self.forward_bus1 || self.forward_obd).then_some(BUS_AUX)
    }

    fn observe(&mut self, bus: u8, addr_in: u16) {
        // local-CAN markers mean bus 1 is not a relay segment
        if bus == BUS_AUX
            && (addr_in == addr::LCAN_MARKER_A || addr_in == addr::LCAN_MARKER_B)
        {
            self.lcan_frames = LCAN_HOLD_FRAMES;
            if self.forward_bus1 || !self.lcan_on_bus1 {
                self.lcan_on_bus1 = true;
                self.forward_bus1 = false;
            }
        }

        if addr_in == addr::LKAS11 {
            // stock steering reaching the main bus: stop mirroring the
            // camera link until its copies have stopped for a while
            if bus == BUS_MAIN && self.forward_bus2 {
                self.forward_bus2 = false;
                self.lkas_bus0_frames = LKAS_BUS0_HOLD_FRAMES;
            }
            if bus == BUS_CAMERA {
                if self.lkas_bus0_frames > 0 {
                    self.lkas_bus0_frames -= 1;
                } else if !self.forward_bus2 {
                    self.forward_bus2 = true;
                }
                if self.lcan_frames > 0 {
                    self.lcan_frames -= 1;
                } else if self.lcan_on_bus1 {
                    self.lcan_on_bus1 = false;
                }
            }
        }

        // adopt the steering module's bus; bus 1 only counts when it is
        // not a local CAN segment, unless it is the wired OBD path
        if (addr_in == addr::MDPS12 || addr_in == addr::MDPS11) && self.mdps_bus != Some(bus) {
            if bus != BUS_AUX || !self.lcan_on_bus1 || self.forward_obd {
                self.mdps_bus = Some(bus);
                if bus == BUS_AUX
                    && !self.forward_obd
                    && !self.forward_bus1
                    && !self.lcan_on_bus1
                {
                    self.forward_bus1 = true;
                }
            }
        }

        // adopt the cruise radar's bus
        if (addr_in == addr::SCC11 || addr_in == addr::SCC12) && self.scc_bus != Some(bus) {
            if bus != BUS_AUX || !self.lcan_on_bus1 {
                self.scc_bus = Some(bus);
                if bus == BUS_AUX && !self.forward_bus1 {
                    self.forward_bus1 = true;
                }
            }
        }
    }
}

/// Countdown of our own recent output per mirrored function. While a
/// counter is non-zero the router consumes the stock copy of that
/// function's messages instead of forwarding it.
#[derive(Debug, Clone, Copy, Default)]
struct OpActivity {
    lkas: u8,
    mdps: u8,
    clu: u8,
    scc: u8,
    ems: u8,
}

/// Safety model for the bus-discovery installations
pub struct MultibusSafety<C: Clock> {
    ctx: SafetyContext,
    config: SafetyConfig,
    checker: RxChecker,
    discovery: BusDiscovery,
    activity: OpActivity,
    clock: C,
}

impl<C: Clock> MultibusSafety<C> {
    /// Build the model for one drive cycle with nothing discovered yet,
    /// control authority revoked and the relay fault cleared.
    pub fn new(param: u16, clock: C) -> Self {
        let flags = VariantFlags::from_param(param);
        let config = build_config();
        let checker = RxChecker::new(&config.rx_checks);
        Self {
            ctx: SafetyContext::new(),
            config,
            checker,
            discovery: BusDiscovery::new(flags.obd_relay),
            activity: OpActivity::default(),
            clock,
        }
    }

    pub fn vehicle_moving(&self) -> bool {
        self.ctx.vehicle_moving
    }
}

impl<C: Clock> SafetyModel for MultibusSafety<C> {
    fn rx(&mut self, frame: &CanFrame) {
        let now = self.clock.now_us();
        let status = self.checker.validate(frame, now);
        if !matches!(status, RxStatus::Ok | RxStatus::UnknownAddr) {
            return;
        }

        self.discovery.observe(frame.bus(), frame.addr());

        if frame.addr() == addr::MDPS12 && Some(frame.bus()) == self.discovery.mdps_bus {
            // scale the raw driver torque signal to command units
            let raw = (frame.bytes(0, 4) & 0x7FF) as f32;
            self.ctx.torque_driver.push((raw * 0.79 - 808.0) as i32);
        }

        // while we produce the cruise messages ourselves, the copies coming
        // back are our own and must not drive the cruise state
        if frame.addr() == addr::SCC11 && self.activity.scc == 0 {
            self.ctx.observe_cruise_state(frame.bit(0));
        }

        // cars without adaptive cruise manage authority from the buttons
        if frame.addr() == addr::CLU11
            && frame.bus() == BUS_MAIN
            && self.discovery.scc_bus.is_none()
            && self.activity.scc == 0
        {
            self.ctx.observe_cruise_button(frame.byte(0) & 0x7);
        }

        if frame.addr() == addr::WHL_SPD11 && frame.bus() == BUS_MAIN {
            let front_left = frame.bytes(0, 2) & 0x3FFF;
            let rear_right = frame.bytes(6, 2) & 0x3FFF;
            self.ctx.vehicle_moving =
                front_left > STANDSTILL_THRESHOLD || rear_right > STANDSTILL_THRESHOLD;
        }

        if frame.addr() == addr::LKAS11 && frame.bus() == BUS_MAIN {
            self.ctx.relay_malfunction = true;
        }
    }

    fn tx(&mut self, frame: &CanFrame) -> bool {
        let now = self.clock.now_us();
        let mut tx = self.config.tx_whitelisted(frame);

        if tx {
            if frame.addr() == addr::LKAS11 {
                let desired_torque = ((frame.bytes(0, 4) >> 16) & 0x7FF) as i32 - 1024;
                if self
                    .ctx
                    .steer_torque_cmd_check(desired_torque, now, &HKG_TORQUE_LIMITS)
                {
                    tx = false;
                }
            }

            // with controls off and the steering module on bus 1, only the
            // cancel press may travel toward it; resume spam stays possible
            // once controls are granted
            if frame.addr() == addr::CLU11
                && !self.ctx.controls_allowed
                && self.discovery.mdps_bus == Some(BUS_AUX)
                && frame.bus() != BUS_AUX
                && frame.byte(0) & 0x7 != CRUISE_BTN_CANCEL
            {
                tx = false;
            }
        }

        if tx {
            match (frame.addr(), frame.bus()) {
                (addr::LKAS11, _) => self.activity.lkas = LIVE_FRAMES,
                (addr::MDPS12, _) => self.activity.mdps = LIVE_FRAMES,
                // only the copy created for the bus 1 steering module counts
                (addr::CLU11, BUS_AUX) => self.activity.clu = LIVE_FRAMES,
                (addr::SCC12, _) => self.activity.scc = LIVE_FRAMES,
                (addr::EMS11, _) => self.activity.ems = LIVE_FRAMES,
                _ => {}
            }
        }

        tx
    }

    fn fwd(&mut self, bus: u8, addr_in: u16) -> Option<u8> {
        let to_bus1 = self.discovery.bus1_destination();

        if !self.discovery.forward_bus2 {
            // the stock steering owns the camera link; only the main/aux
            // relay keeps running, if discovered
            return match bus {
                BUS_MAIN => to_bus1,
                BUS_AUX if to_bus1.is_some() => Some(BUS_MAIN),
                _ => None,
            };
        }

        match bus {
            BUS_MAIN => {
                if addr_in == addr::CLU11
                    && self.activity.clu > 0
                    && self.discovery.mdps_bus != Some(BUS_MAIN)
                {
                    // we synthesize the cluster message for the steering
                    // module ourselves
                    self.activity.clu -= 1;
                    Some(BUS_CAMERA)
                } else if addr_in == addr::MDPS12 && self.activity.mdps > 0 {
                    self.activity.mdps -= 1;
                    to_bus1
                } else if addr_in == addr::EMS11 && self.activity.ems > 0 {
                    self.activity.ems -= 1;
                    Some(BUS_CAMERA)
                } else {
                    Some(BUS_CAMERA)
                }
            }
            BUS_AUX => {
                to_bus1?;
                if addr_in == addr::MDPS12 && self.activity.mdps > 0 {
                    self.activity.mdps -= 1;
                    Some(BUS_MAIN)
                } else if is_cruise_addr(addr_in) && self.activity.scc > 0 {
                    self.activity.scc -= 1;
                    Some(BUS_CAMERA)
                } else {
                    Some(BUS_MAIN)
                }
            }
            BUS_CAMERA => {
                if (addr_in == addr::LKAS11 || addr_in == addr::LFAHDA_MFC)
                    && self.activity.lkas > 0
                {
                    self.activity.lkas -= 1;
                    // our copy reaches the car already; a bus 1 steering
                    // module may still want the stock one
                    if self.discovery.mdps_bus == Some(BUS_MAIN) {
                        to_bus1
                    } else {
                        None
                    }
                } else if is_cruise_addr(addr_in) && self.activity.scc > 0 {
                    self.activity.scc -= 1;
                    to_bus1
                } else {
                    Some(BUS_MAIN)
                }
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

fn build_config() -> SafetyConfig {
    // reduced rule table: these installs span model years without
    // counters or checksums on most core messages
    SafetyConfig {
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
        tx_msgs: vec![
            CanMsg::new(addr::LKAS11, 0, 8),
            CanMsg::new(addr::LKAS11, 1, 8),
            CanMsg::new(addr::CLU11, 0, 4),
            CanMsg::new(addr::CLU11, 1, 4),
            CanMsg::new(addr::CLU11, 2, 4),
            CanMsg::new(addr::LFAHDA_MFC, 0, 4),
            CanMsg::new(addr::MDPS12, 2, 8),
            CanMsg::new(addr::SCC11, 0, 8),
            CanMsg::new(addr::SCC12, 0, 8),
            CanMsg::new(addr::SCC13, 0, 8),
            CanMsg::new(addr::SCC14, 0, 8),
            CanMsg::new(addr::FRT_RADAR11, 0, 8),
            CanMsg::new(addr::EMS11, 1, 8),
            CanMsg::new(addr::FCA11, 0, 8),
            CanMsg::new(addr::FCA12, 0, 8),
            CanMsg::new(addr::RADAR_UDS, 0, 8),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::clock::ManualClock;
    use crate::context::{CRUISE_BTN_RES, CRUISE_BTN_SET};

    fn lkas11_frame(bus: u8, torque: i32) -> CanFrame {
        let field = (torque + 1024) as u32;
        let mut data = [0u8; 8];
        data[2] = (field & 0xFF) as u8;
        data[3] = ((field >> 8) & 0x7) as u8;
        CanFrame::new(addr::LKAS11, bus, &data).unwrap()
    }

    fn scc11_frame(bus: u8, available: bool) -> CanFrame {
        let mut data = [0u8; 8];
        if available {
            data[0] = 0x01;
        }
        CanFrame::new(addr::SCC11, bus, &data).unwrap()
    }

    fn clu11_frame(bus: u8, button: u8) -> CanFrame {
        CanFrame::new(addr::CLU11, bus, &[button, 0, 0, 0]).unwrap()
    }

    fn mdps12_frame(bus: u8, raw_torque: u16) -> CanFrame {
        let mut data = [0u8; 8];
        data[0] = (raw_torque & 0xFF) as u8;
        data[1] = ((raw_torque >> 8) & 0x7) as u8;
        CanFrame::new(addr::MDPS12, bus, &data).unwrap()
    }

    #[test]
    fn test_fwd_defaults_before_discovery() {
        let clock = ManualClock::new();
        let mut safety = MultibusSafety::new(0, &clock);
        assert_eq!(safety.fwd(0, 0x123), Some(2));
        assert_eq!(safety.fwd(2, 0x123), Some(0));
        // bus 1 is not relayed until something is discovered there
        assert_eq!(safety.fwd(1, 0x123), None);
    }

    #[test]
    fn test_mdps_on_bus1_enables_relay() {
        let clock = ManualClock::new();
        let mut safety = MultibusSafety::new(0, &clock);
        safety.rx(&mdps12_frame(1, 1023));
        assert_eq!(safety.fwd(1, 0x123), Some(0));
        assert_eq!(safety.fwd(0, 0x123), Some(2));
    }

    #[test]
    fn test_lcan_markers_block_bus1_relay() {
        let clock = ManualClock::new();
        let mut safety = MultibusSafety::new(0, &clock);
        safety.rx(&CanFrame::new(addr::LCAN_MARKER_A, 1, &[0u8; 8]).unwrap());
        // a local segment is not the steering module's home
        safety.rx(&mdps12_frame(1, 1023));
        assert_eq!(safety.fwd(1, 0x123), None);
    }

    #[test]
    fn test_lcan_hold_expires() {
        let clock = ManualClock::new();
        let mut safety = MultibusSafety::new(0, &clock);
        safety.rx(&CanFrame::new(addr::LCAN_MARKER_B, 1, &[0u8; 8]).unwrap());

        // the marker claim decays one frame at a time on camera steering
        for _ in 0..=LCAN_HOLD_FRAMES {
            safety.rx(&lkas11_frame(2, 0));
        }
        safety.rx(&mdps12_frame(1, 1023));
        assert_eq!(safety.fwd(1, 0x123), Some(0));
    }

    #[test]
    fn test_obd_relay_overrides_lcan() {
        let clock = ManualClock::new();
        let mut safety = MultibusSafety::new(crate::config::PARAM_OBD_RELAY, &clock);
        safety.rx(&CanFrame::new(addr::LCAN_MARKER_A, 1, &[0u8; 8]).unwrap());
        safety.rx(&mdps12_frame(1, 1023));
        assert_eq!(safety.fwd(1, 0x123), Some(0));
    }

    #[test]
    fn test_stock_steering_on_main_bus_pauses_mirror() {
        let clock = ManualClock::new();
        let mut safety = MultibusSafety::new(0, &clock);
        safety.rx(&lkas11_frame(0, 0));
        assert!(safety.relay_malfunction());
        assert_eq!(safety.fwd(0, 0x123), None);
        assert_eq!(safety.fwd(2, 0x123), None);

        // the mirror resumes once the grace counter has drained
        for _ in 0..=LKAS_BUS0_HOLD_FRAMES {
            safety.rx(&lkas11_frame(2, 0));
        }
        assert_eq!(safety.fwd(0, 0x123), Some(2));
    }

    #[test]
    fn test_router_consumes_own_steering() {
        let clock = ManualClock::new();
        let mut safety = MultibusSafety::new(0, &clock);
        assert!(safety.tx(&lkas11_frame(0, 0)));

        // the stock copy is consumed while our output is recent
        for _ in 0..LIVE_FRAMES {
            assert_eq!(safety.fwd(2, addr::LKAS11), None);
        }
        assert_eq!(safety.fwd(2, addr::LKAS11), Some(0));
    }

    #[test]
    fn test_denied_steering_does_not_mark_activity() {
        let clock = ManualClock::new();
        let mut safety = MultibusSafety::new(0, &clock);
        safety.rx(&scc11_frame(0, true));
        assert!(safety.controls_allowed());
        assert!(!safety.tx(&lkas11_frame(0, 400)));
        assert_eq!(safety.fwd(2, addr::LKAS11), Some(0));
    }

    #[test]
    fn test_torque_path_enforced() {
        let clock = ManualClock::new();
        let mut safety = MultibusSafety::new(0, &clock);
        safety.rx(&scc11_frame(0, true));
        assert!(safety.tx(&lkas11_frame(0, HKG_TORQUE_LIMITS.max_rate_up)));
        clock.advance(10_000);
        assert!(!safety.tx(&lkas11_frame(
            0,
            2 * HKG_TORQUE_LIMITS.max_rate_up + 1
        )));
    }

    #[test]
    fn test_clu11_cancel_only_toward_bus1_mdps() {
        let clock = ManualClock::new();
        let mut safety = MultibusSafety::new(0, &clock);
        safety.rx(&mdps12_frame(1, 1023));
        assert!(!safety.controls_allowed());

        assert!(!safety.tx(&clu11_frame(0, CRUISE_BTN_RES)));
        assert!(safety.tx(&clu11_frame(0, CRUISE_BTN_CANCEL)));
        // the copy we create on the module's own bus is unrestricted
        assert!(safety.tx(&clu11_frame(1, CRUISE_BTN_RES)));
    }

    #[test]
    fn test_button_only_cruise_without_radar() {
        let clock = ManualClock::new();
        let mut safety = MultibusSafety::new(0, &clock);
        safety.rx(&clu11_frame(0, CRUISE_BTN_SET));
        assert!(safety.controls_allowed());
        safety.rx(&clu11_frame(0, CRUISE_BTN_CANCEL));
        assert!(!safety.controls_allowed());

        // once a radar is discovered the buttons stop managing authority
        safety.rx(&scc11_frame(0, false));
        safety.rx(&clu11_frame(0, CRUISE_BTN_SET));
        assert!(!safety.controls_allowed());
    }

    #[test]
    fn test_own_cruise_output_masks_car_state() {
        let clock = ManualClock::new();
        let mut safety = MultibusSafety::new(0, &clock);
        assert!(safety.tx(&CanFrame::new(addr::SCC12, 0, &[0u8; 8]).unwrap()));
        safety.rx(&scc11_frame(0, true));
        assert!(!safety.controls_allowed());
    }

    #[test]
    fn test_driver_torque_from_discovered_bus() {
        let clock = ManualClock::new();
        let mut safety = MultibusSafety::new(0, &clock);
        // raw 1100 decodes to 0.79 * 1100 - 808 = 61
        safety.rx(&mdps12_frame(1, 1100));
        assert_eq!(safety.ctx.torque_driver.max(), 61);

        // the module moving to the main bus re-homes the sampling with it
        safety.rx(&mdps12_frame(0, 1200));
        assert_eq!(safety.ctx.torque_driver.max(), 140);
    }

    #[test]
    fn test_router_consumes_own_cruise_toward_car() {
        let clock = ManualClock::new();
        let mut safety = MultibusSafety::new(0, &clock);
        safety.rx(&mdps12_frame(1, 1023));
        assert!(safety.tx(&CanFrame::new(addr::SCC12, 0, &[0u8; 8]).unwrap()));

        // a bus 1 radar's frames are diverted toward the camera while our
        // cruise output is recent
        assert_eq!(safety.fwd(1, addr::SCC12), Some(2));
    }
}
