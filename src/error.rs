//! Error types for the ranging pipeline and configuration checks.
//!
//! Ranging errors are never fatal: the pipeline counts them and carries on.
//! Config errors are reported once, before the control loop starts.

use core::fmt;

use crate::state::Channel;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangingError {
    /// Channel was armed but no complete echo arrived in time.
    SensorTimeout(Channel),
    /// Distance outside the valid band; the sample was dropped.
    OutOfRangeSample { channel: Channel, cm: u16 },
    /// No accepted sample within the staleness window.
    StaleChannel(Channel),
    /// Edge seen while the slot was not waiting for one.
    ConflictingCapture(Channel),
}

impl RangingError {
    pub fn channel(&self) -> Channel {
        match *self {
            RangingError::SensorTimeout(ch)
            | RangingError::StaleChannel(ch)
            | RangingError::ConflictingCapture(ch) => ch,
            RangingError::OutOfRangeSample { channel, .. } => channel,
        }
    }
}

impl fmt::Display for RangingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangingError::SensorTimeout(ch) => write!(f, "{} sensor: no echo", ch.name()),
            RangingError::OutOfRangeSample { channel, cm } => {
                write!(f, "{} sensor: {} cm out of range", channel.name(), cm)
            }
            RangingError::StaleChannel(ch) => write!(f, "{} sensor: stale", ch.name()),
            RangingError::ConflictingCapture(ch) => {
                write!(f, "{} sensor: unexpected capture edge", ch.name())
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Guard interval shorter than the worst-case echo round trip.
    GuardTooShort { guard_ms: u32, min_ms: u32 },
    /// Frame timeout must cover at least one guard interval.
    FrameTimeoutTooShort,
    /// Filter window outside `1..=MAX_WINDOW`.
    BadWindow(usize),
    /// A `[min, max]` band with `min >= max`.
    EmptyBand { min: u16, max: u16 },
    /// `ticks_per_cm` of zero.
    ZeroScale,
    /// Speed duties must satisfy `min <= slow, base <= max`.
    SpeedOrder,
    /// Thresholds must satisfy `too_close < pivot < arc < clear`.
    ThresholdOrder,
    /// Arc minimum duration exceeds its maximum.
    ArcTiming,
    /// A tick count or period that must be non-zero is zero.
    ZeroPeriod,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::GuardTooShort { guard_ms, min_ms } => {
                write!(f, "guard interval {} ms below {} ms", guard_ms, min_ms)
            }
            ConfigError::FrameTimeoutTooShort => f.write_str("frame timeout shorter than guard"),
            ConfigError::BadWindow(w) => write!(f, "filter window {} not in 1..=5", w),
            ConfigError::EmptyBand { min, max } => write!(f, "empty band [{}, {}]", min, max),
            ConfigError::ZeroScale => f.write_str("ticks_per_cm is zero"),
            ConfigError::SpeedOrder => f.write_str("speed duties out of order"),
            ConfigError::ThresholdOrder => f.write_str("distance thresholds out of order"),
            ConfigError::ArcTiming => f.write_str("arc min duration exceeds max"),
            ConfigError::ZeroPeriod => f.write_str("zero period or tick count"),
        }
    }
}
