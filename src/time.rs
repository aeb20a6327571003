//! Time base for the control loop and the capture timer.
//!
//! Two clocks are involved:
//! - a free-running 32-bit millisecond counter (`Timestamp`), used for guard
//!   intervals, deadlines and staleness;
//! - the 16-bit input-capture timer (1 tick = 1 µs), used only for echo widths.
//!
//! Both wrap. Every comparison here is done with wrapping subtraction so a
//! rollover in the middle of an interval is harmless.

/// Millisecond timestamp from a free-running counter. Wraps after ~49.7 days.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp(u32);

impl Timestamp {
    #[inline]
    pub const fn from_millis(ms: u32) -> Self {
        Self(ms)
    }

    #[inline]
    pub const fn as_millis(self) -> u32 {
        self.0
    }

    /// `self + ms`, wrapping.
    #[inline]
    pub const fn add_millis(self, ms: u32) -> Self {
        Self(self.0.wrapping_add(ms))
    }

    /// Milliseconds from `earlier` to `self`, modulo 2^32.
    #[inline]
    pub const fn millis_since(self, earlier: Timestamp) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// True once `self` is at or past `deadline`.
    ///
    /// Valid as long as the two are less than 2^31 ms apart.
    #[inline]
    pub const fn has_reached(self, deadline: Timestamp) -> bool {
        (self.0.wrapping_sub(deadline.0) as i32) >= 0
    }
}

/// Monotonic millisecond clock.
pub trait TimeSource {
    fn now(&self) -> Timestamp;
}

/// Width of an echo pulse in capture-timer ticks.
///
/// The capture timer is 16 bits wide; `fall < rise` means the counter
/// overflowed during the echo, which wrapping subtraction absorbs.
#[inline]
pub const fn echo_ticks(rise: u16, fall: u16) -> u16 {
    fall.wrapping_sub(rise)
}
