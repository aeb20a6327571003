//! Tunables for ranging and navigation.
//!
//! Defaults are the values the rover was tuned with on a ~2 m wide indoor
//! course. Everything here is plain data; call `validate()` once before the
//! control loop starts.

use crate::error::ConfigError;
use crate::ranging::filter::MAX_WINDOW;

/// Worst-case echo round trip at 4 m is ~23.2 ms. One extra ms of margin.
pub const MIN_GUARD_MS: u32 = 24;

// ── Ranging ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterMode {
    Median,
    Mean,
}

/// Order in which the three sensors are fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerPattern {
    /// L → C → R → C. The front sensor is sampled twice as often.
    CenterInterleaved,
    /// L → R → C.
    RoundRobin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RangingConfig {
    /// Minimum time between two trigger pulses.
    pub guard_ms: u32,
    /// Frame report deadline, and the longest a channel may stay armed.
    pub frame_timeout_ms: u32,
    /// Filter history length, `1..=5`.
    pub window: usize,
    pub filter_mode: FilterMode,
    /// A channel with no accepted sample for longer than this reads as unknown.
    pub stale_ms: u32,
    pub min_valid_cm: u16,
    pub max_valid_cm: u16,
    /// Capture ticks per centimetre of range (58 at 1 µs/tick).
    pub ticks_per_cm: u16,
    pub trigger_pulse_us: u32,
    pub pattern: TriggerPattern,
}

impl Default for RangingConfig {
    fn default() -> Self {
        Self {
            guard_ms: 40,
            frame_timeout_ms: 80,
            window: 3,
            filter_mode: FilterMode::Median,
            stale_ms: 400,
            min_valid_cm: 2,
            max_valid_cm: 400,
            ticks_per_cm: 58,
            trigger_pulse_us: 10,
            pattern: TriggerPattern::CenterInterleaved,
        }
    }
}

impl RangingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.guard_ms < MIN_GUARD_MS {
            return Err(ConfigError::GuardTooShort {
                guard_ms: self.guard_ms,
                min_ms: MIN_GUARD_MS,
            });
        }
        if self.frame_timeout_ms < self.guard_ms {
            return Err(ConfigError::FrameTimeoutTooShort);
        }
        if self.window == 0 || self.window > MAX_WINDOW {
            return Err(ConfigError::BadWindow(self.window));
        }
        if self.min_valid_cm >= self.max_valid_cm {
            return Err(ConfigError::EmptyBand {
                min: self.min_valid_cm,
                max: self.max_valid_cm,
            });
        }
        if self.ticks_per_cm == 0 {
            return Err(ConfigError::ZeroScale);
        }
        if self.stale_ms == 0 || self.trigger_pulse_us == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        Ok(())
    }

    /// `self` if it validates, otherwise the defaults (logged).
    pub fn or_default(self) -> Self {
        match self.validate() {
            Ok(()) => self,
            Err(err) => {
                log_error!("config: ranging {}, using defaults", err);
                Self::default()
            }
        }
    }
}

// ── Navigation ────────────────────────────────────────────────────────────────

/// Which way to turn when both sides report the same clearance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TieBreak {
    PreferRight,
    PreferLeft,
}

/// PWM duty limits and slew steps. Duties are raw compare values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpeedConfig {
    pub min: u16,
    pub base: u16,
    pub max: u16,
    /// Duty used for cornering, recovery and right after a turn.
    pub slow: u16,
    pub step_up: u16,
    pub step_down: u16,
    /// Per-wheel step for arc bias.
    pub step_diff: u16,
    /// min(front, left, right) below this forces slow duty.
    pub near_cm: u16,
    /// min(front, left, right) at or above this allows a speed-up.
    pub far_cm: u16,
    pub speedup_cooldown_ms: u32,
    /// Cooldown used while the front is opening up fast.
    pub speedup_cooldown_open_ms: u32,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            min: 240,
            base: 450,
            max: 780,
            slow: 390,
            step_up: 40,
            step_down: 150,
            step_diff: 50,
            near_cm: 62,
            far_cm: 68,
            speedup_cooldown_ms: 100,
            speedup_cooldown_open_ms: 140,
        }
    }
}

/// Wall-centering trim while cruising. Gains are in duty per 1000 cm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SteeringConfig {
    pub kp_permille: i32,
    pub kd_permille: i32,
    pub dead_band_cm: u16,
    pub max_trim: u16,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            kp_permille: 1500,
            kd_permille: 500,
            dead_band_cm: 2,
            max_trim: 60,
        }
    }
}

/// Front closing/opening rate detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrendConfig {
    /// Averaged per-tick delta at or below `-fast_delta_cm` counts as closing fast.
    pub fast_delta_cm: i16,
    pub streak_ticks: u8,
    pub close_pivot_boost_cm: u16,
    pub close_arc_boost_cm: u16,
    pub open_arc_relief_cm: u16,
    pub open_clear_relief_cm: u16,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            fast_delta_cm: 3,
            streak_ticks: 2,
            close_pivot_boost_cm: 4,
            close_arc_boost_cm: 3,
            open_arc_relief_cm: 3,
            open_clear_relief_cm: 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NavConfig {
    // Front thresholds
    pub too_close_cm: u16,
    pub pivot_cm: u16,
    pub arc_cm: u16,
    pub clear_cm: u16,
    pub pivot_confirm_ticks: u8,
    pub chain_pivot_relief_cm: u16,

    // Crash guard
    pub crash_cm: u16,
    pub crash_streak: u8,
    pub crash_cooldown_ticks: u16,
    pub brake_ticks: u16,
    pub backoff_ticks: u16,
    pub pivot_away_ticks: u16,

    // Timing
    pub turn_ms: u32,
    pub arc_min_ms: u32,
    pub arc_max_ms: u32,
    pub decide_every_ms: u32,
    pub hold_drive_ms: u32,
    pub hold_turn_ms: u32,
    pub startup_ban_ms: u32,
    pub chain_window_ms: u32,
    pub chain_decide_ms: u32,
    pub chain_hold_drive_ms: u32,
    /// Arc bias grows once per this period.
    pub arc_bias_period_ms: u32,
    pub arc_bias_phases: u8,

    // Side handling
    pub side_min_cm: u16,
    pub side_max_cm: u16,
    pub vote_limit: i8,
    pub tie_break: TieBreak,

    pub speed: SpeedConfig,
    pub steering: SteeringConfig,
    pub trend: TrendConfig,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            too_close_cm: 12,
            pivot_cm: 64,
            arc_cm: 79,
            clear_cm: 81,
            pivot_confirm_ticks: 1,
            chain_pivot_relief_cm: 2,

            crash_cm: 15,
            crash_streak: 2,
            crash_cooldown_ticks: 40,
            brake_ticks: 10,
            backoff_ticks: 20,
            pivot_away_ticks: 25,

            turn_ms: 350,
            arc_min_ms: 300,
            arc_max_ms: 900,
            decide_every_ms: 30,
            hold_drive_ms: 150,
            hold_turn_ms: 130,
            startup_ban_ms: 1300,
            chain_window_ms: 350,
            chain_decide_ms: 16,
            chain_hold_drive_ms: 70,
            arc_bias_period_ms: 30,
            arc_bias_phases: 3,

            side_min_cm: 2,
            side_max_cm: 300,
            vote_limit: 2,
            tie_break: TieBreak::PreferRight,

            speed: SpeedConfig::default(),
            steering: SteeringConfig::default(),
            trend: TrendConfig::default(),
        }
    }
}

impl NavConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.speed;
        if !(s.min <= s.slow && s.slow <= s.max && s.min <= s.base && s.base <= s.max) {
            return Err(ConfigError::SpeedOrder);
        }
        if !(self.too_close_cm < self.pivot_cm
            && self.pivot_cm < self.arc_cm
            && self.arc_cm < self.clear_cm)
        {
            return Err(ConfigError::ThresholdOrder);
        }
        if self.crash_cm >= self.pivot_cm || s.near_cm > s.far_cm {
            return Err(ConfigError::ThresholdOrder);
        }
        if self.arc_min_ms > self.arc_max_ms {
            return Err(ConfigError::ArcTiming);
        }
        if self.side_min_cm >= self.side_max_cm {
            return Err(ConfigError::EmptyBand {
                min: self.side_min_cm,
                max: self.side_max_cm,
            });
        }
        if self.crash_streak == 0
            || self.pivot_confirm_ticks == 0
            || self.vote_limit <= 0
            || self.decide_every_ms == 0
            || self.chain_decide_ms == 0
            || self.turn_ms == 0
            || self.trend.streak_ticks == 0
        {
            return Err(ConfigError::ZeroPeriod);
        }
        Ok(())
    }

    /// `self` if it validates, otherwise the defaults (logged).
    pub fn or_default(self) -> Self {
        match self.validate() {
            Ok(()) => self,
            Err(err) => {
                log_error!("config: nav {}, using defaults", err);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(RangingConfig::default().validate(), Ok(()));
        assert_eq!(NavConfig::default().validate(), Ok(()));
    }

    #[test]
    fn guard_below_echo_round_trip_is_rejected() {
        let cfg = RangingConfig {
            guard_ms: 20,
            ..RangingConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::GuardTooShort { guard_ms: 20, min_ms: 24 })
        );
    }

    #[test]
    fn window_must_fit_the_ring() {
        for window in [0, 6] {
            let cfg = RangingConfig {
                window,
                ..RangingConfig::default()
            };
            assert_eq!(cfg.validate(), Err(ConfigError::BadWindow(window)));
        }
    }

    #[test]
    fn thresholds_must_keep_the_hysteresis_band() {
        let cfg = NavConfig {
            clear_cm: 75,
            ..NavConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ThresholdOrder));
    }

    #[test]
    fn invalid_config_falls_back_to_defaults() {
        let cfg = RangingConfig {
            guard_ms: 5,
            ..RangingConfig::default()
        };
        assert_eq!(cfg.or_default(), RangingConfig::default());

        let cfg = NavConfig {
            arc_min_ms: 2_000,
            ..NavConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ArcTiming));
        assert_eq!(cfg.or_default(), NavConfig::default());

        let tuned = NavConfig {
            pivot_cm: 60,
            ..NavConfig::default()
        };
        assert_eq!(tuned.or_default(), tuned);
    }

    #[test]
    fn speed_limits_must_be_ordered() {
        let mut cfg = NavConfig::default();
        cfg.speed.slow = 900;
        assert_eq!(cfg.validate(), Err(ConfigError::SpeedOrder));
    }
}
