//! Mutable per-drive state shared by the RX validator and TX gatekeeper.
//!
//! All state lives in one explicit struct owned by the safety model, so a
//! fresh context per test is trivial and nothing hides in process-wide
//! statics. Lifetime is one drive cycle; re-init discards everything.

use crate::common::clock::elapsed_us;
use crate::common::limits::{
    driver_limit_check, max_limit_check, rt_rate_limit_check, TorqueLimits,
};
use crate::common::sample::SampleWindow;

/// Steering command state consumed by the rate and realtime checks
#[derive(Debug, Clone, Copy, Default)]
pub struct TorqueState {
    /// Last commanded torque, allowed or not
    pub desired_torque_last: i32,
    /// Realtime reference value, refreshed once per realtime interval
    pub rt_torque_last: i32,
    /// Timestamp of the last realtime reference refresh
    pub ts_torque_check_last: u32,
}

/// Cruise button codes on the steering wheel cluster message
pub const CRUISE_BTN_RES: u8 = 1;
pub const CRUISE_BTN_SET: u8 = 2;
pub const CRUISE_BTN_CANCEL: u8 = 4;

/// Shared mutable safety state for one drive cycle
#[derive(Debug, Clone, Default)]
pub struct SafetyContext {
    /// Control authority: whether any non-zero actuation command may be sent
    pub controls_allowed: bool,
    /// Latched relay conflict fault
    pub relay_malfunction: bool,
    pub gas_pressed: bool,
    pub brake_pressed: bool,
    pub vehicle_moving: bool,
    cruise_engaged_prev: bool,
    pub torque: TorqueState,
    pub torque_driver: SampleWindow,
}

impl SafetyContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard all state, as at power-on or safety re-init.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Observe the cruise engaged/available state from a vehicle frame.
    /// A rising edge grants control authority, loss revokes it.
    pub fn observe_cruise_state(&mut self, cruise_engaged: bool) {
        if cruise_engaged && !self.cruise_engaged_prev {
            self.controls_allowed = true;
        }
        if !cruise_engaged {
            self.controls_allowed = false;
        }
        self.cruise_engaged_prev = cruise_engaged;
    }

    /// Observe a cruise button press on cars managed by buttons alone:
    /// res/set engage, cancel disengages.
    pub fn observe_cruise_button(&mut self, button: u8) {
        match button {
            CRUISE_BTN_RES | CRUISE_BTN_SET => self.controls_allowed = true,
            CRUISE_BTN_CANCEL => self.controls_allowed = false,
            _ => {}
        }
    }

    /// Zero the torque references and restamp the realtime timestamp, so a
    /// later grant of control authority starts from a clean baseline.
    pub fn reset_torque(&mut self, now: u32) {
        self.torque.desired_torque_last = 0;
        self.torque.rt_torque_last = 0;
        self.torque.ts_torque_check_last = now;
    }

    /// The full steering-torque gatekeeper check. Returns `true` on
    /// violation.
    ///
    /// With control authority: absolute bound, driver/rate envelope and
    /// realtime delta run in order. `desired_torque_last` advances to the
    /// attempted value even when a check fails, so the next frame is judged
    /// against what was attempted rather than a stale reference. Without
    /// control authority any non-zero torque is a violation and the torque
    /// state is reset to zero.
    pub fn steer_torque_cmd_check(
        &mut self,
        desired_torque: i32,
        now: u32,
        limits: &TorqueLimits,
    ) -> bool {
        let mut violation = false;

        if self.controls_allowed {
            violation |= max_limit_check(desired_torque, limits.max_steer, -limits.max_steer);

            violation |= driver_limit_check(
                desired_torque,
                self.torque.desired_torque_last,
                &self.torque_driver,
                limits,
            );
            // used next time
            self.torque.desired_torque_last = desired_torque;

            violation |=
                rt_rate_limit_check(desired_torque, self.torque.rt_torque_last, limits.max_rt_delta);

            // every realtime interval set the new reference
            if elapsed_us(now, self.torque.ts_torque_check_last) > limits.rt_interval_us {
                self.torque.rt_torque_last = desired_torque;
                self.torque.ts_torque_check_last = now;
            }
        }

        if !self.controls_allowed && desired_torque != 0 {
            violation = true;
        }
        if !self.controls_allowed {
            self.reset_torque(now);
        }

        violation
    }
}
