pub mod multibus;
pub mod standard;

/// Message addresses shared across the vehicle family.
pub(crate) mod addr {
    /// Steering command from the camera / driving computer
    pub const LKAS11: u16 = 0x340;
    /// Steering wheel cluster buttons
    pub const CLU11: u16 = 0x4F1;
    /// Highway driving assist status for the cluster
    pub const LFAHDA_MFC: u16 = 0x485;
    /// Power steering status, carries driver-applied torque
    pub const MDPS12: u16 = 0x251;
    /// Alternate power steering status message
    pub const MDPS11: u16 = 0x381;
    /// Adaptive cruise status
    pub const SCC11: u16 = 0x420;
    /// Adaptive cruise command, carries the acceleration request
    pub const SCC12: u16 = 0x421;
    pub const SCC13: u16 = 0x50A;
    pub const SCC14: u16 = 0x389;
    /// Forward-collision avoidance command
    pub const FCA11: u16 = 0x38D;
    pub const FCA12: u16 = 0x483;
    /// Front radar status
    pub const FRT_RADAR11: u16 = 0x4A2;
    /// Engine status, gas position on combustion models
    pub const EMS16: u16 = 0x260;
    /// Powertrain status on EV and hybrid models
    pub const E_EMS11: u16 = 0x371;
    /// Engine telemetry relayed toward the power steering module
    pub const EMS11: u16 = 0x316;
    /// Wheel speeds
    pub const WHL_SPD11: u16 = 0x386;
    /// Traction control status, carries the brake switch
    pub const TCS13: u16 = 0x394;
    /// Radar diagnostic (UDS) address
    pub const RADAR_UDS: u16 = 0x7D0;
    /// Local-CAN presence markers seen on bus 1 installations
    pub const LCAN_MARKER_A: u16 = 0x510;
    pub const LCAN_MARKER_B: u16 = 0x20C;
}
