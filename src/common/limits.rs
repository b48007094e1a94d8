//! Pure numeric limit predicates used by the TX gatekeeper.
//!
//! All predicates return `true` on violation and have no side effects;
//! callers decide what a violation means.

use crate::common::sample::SampleWindow;

/// Steering torque limit parameters for one vehicle family
#[derive(Debug, Clone)]
pub struct TorqueLimits {
    pub max_steer: i32,
    pub max_rate_up: i32,
    pub max_rate_down: i32,
    pub max_rt_delta: i32,
    /// Interval between realtime reference refreshes, in microseconds
    pub rt_interval_us: u32,
    pub driver_torque_allowance: i32,
    pub driver_torque_factor: i32,
}

/// Longitudinal acceleration bounds, in raw command units
#[derive(Debug, Clone)]
pub struct LongitudinalLimits {
    pub max_accel: i32,
    pub min_accel: i32,
}

/// Family steering limits, matching the stock assist module's envelope
pub const HKG_TORQUE_LIMITS: TorqueLimits = TorqueLimits {
    max_steer: 384,
    max_rate_up: 3,
    max_rate_down: 7,
    max_rt_delta: 224,
    rt_interval_us: 250_000,
    driver_torque_allowance: 50,
    driver_torque_factor: 2,
};

/// Family longitudinal bounds (2.0 m/s² accel, -3.5 m/s² decel)
pub const HKG_LONG_LIMITS: LongitudinalLimits = LongitudinalLimits {
    max_accel: 200,
    min_accel: -350,
};

/// Raw wheel-speed value below which the vehicle counts as standing still
pub const STANDSTILL_THRESHOLD: u32 = 30;

/// Absolute bound check: violation iff `val` is outside `[min, max]`.
pub fn max_limit_check(val: i32, max: i32, min: i32) -> bool {
    (val > max) || (val < min)
}

/// Rate-of-change check constrained by driver-applied torque.
///
/// The envelope around `val_last` allows at most `max_rate_up` per step away
/// from zero. Driver torque in the window moves the absolute cap, not the
/// step size: a driver pushing against the command shrinks the cap until the
/// command is forced to retreat, while a cooperating driver keeps the full
/// cap available. Motion toward zero at `max_rate_down` is always permitted,
/// so a command can always self-retreat.
pub fn driver_limit_check(
    val: i32,
    val_last: i32,
    driver: &SampleWindow,
    limits: &TorqueLimits,
) -> bool {
    let highest_allowed_rl = val_last.max(0) + limits.max_rate_up;
    let lowest_allowed_rl = val_last.min(0) - limits.max_rate_up;

    let driver_max_limit =
        limits.max_steer + (limits.driver_torque_allowance + driver.max()) * limits.driver_torque_factor;
    let driver_min_limit =
        -limits.max_steer + (-limits.driver_torque_allowance + driver.min()) * limits.driver_torque_factor;

    // once past the driver's applied torque, the command must move toward 0
    let highest_allowed = highest_allowed_rl
        .min((val_last - limits.max_rate_down).max(driver_max_limit.max(0)));
    let lowest_allowed = lowest_allowed_rl
        .max((val_last + limits.max_rate_down).min(driver_min_limit.min(0)));

    max_limit_check(val, highest_allowed, lowest_allowed)
}

/// Realtime delta check: violation iff `val` departs from `val_last` by more
/// than `max_rt_delta` in either direction. The reference is refreshed by
/// the caller once per realtime interval.
pub fn rt_rate_limit_check(val: i32, val_last: i32, max_rt_delta: i32) -> bool {
    let highest_val = val_last.max(0) + max_rt_delta;
    let lowest_val = val_last.min(0) - max_rt_delta;

    max_limit_check(val, highest_val, lowest_val)
}

/// Bounds check for a decoded longitudinal acceleration command.
pub fn longitudinal_accel_checks(desired_accel: i32, limits: &LongitudinalLimits) -> bool {
    max_limit_check(desired_accel, limits.max_accel, limits.min_accel)
}
