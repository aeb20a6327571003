//! Shared state types passed between the ranging side, the controller and
//! the telemetry task.
//!
//! All types are `Copy` so they can go through an embassy channel or be
//! snapshotted once per tick without borrowing.

use crate::actuator::Command;
use crate::nav::NavState;
use crate::time::Timestamp;

// ── Channels ──────────────────────────────────────────────────────────────────

/// One of the three ultrasonic sensors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    Left,
    Right,
    Center,
}

impl Channel {
    pub const COUNT: usize = 3;
    pub const ALL: [Channel; Self::COUNT] = [Channel::Left, Channel::Right, Channel::Center];

    /// Stable slot index for per-channel arrays.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
            Channel::Center => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Channel::Left => "left",
            Channel::Right => "right",
            Channel::Center => "center",
        }
    }
}

// ── Samples ───────────────────────────────────────────────────────────────────

/// One completed, in-band echo measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    pub channel: Channel,
    pub echo_ticks: u16,
    pub distance_cm: u16,
    pub captured_at: Timestamp,
}

/// Filtered distances as seen by the controller for one tick.
/// `None` = no fresh reading for that channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RangeSnapshot {
    pub left: Option<u16>,
    pub center: Option<u16>,
    pub right: Option<u16>,
    pub taken_at: Timestamp,
}

impl RangeSnapshot {
    pub fn get(&self, channel: Channel) -> Option<u16> {
        match channel {
            Channel::Left => self.left,
            Channel::Right => self.right,
            Channel::Center => self.center,
        }
    }

    pub fn set(&mut self, channel: Channel, value: Option<u16>) {
        match channel {
            Channel::Left => self.left = value,
            Channel::Right => self.right = value,
            Channel::Center => self.center = value,
        }
    }
}

/// Running counters for the ranging pipeline. Saturating, never reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RangingStats {
    pub samples: u32,
    pub timeouts: u32,
    pub out_of_range: u32,
    pub strays: u32,
    pub frames: u32,
}

/// Per-tick record published to the telemetry task.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Telemetry {
    pub snapshot: RangeSnapshot,
    pub state: NavState,
    pub command: Command,
    pub stats: RangingStats,
}
