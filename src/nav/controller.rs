//! Navigation state machine.
//!
//! ```text
//!            front < too_close, or front <= pivot (gated)
//!   Cruise ───────────────────────────────────────────────► Pivot ──deadline──┐
//!     │ ▲                                                                      │
//!     │ └──────────────────────────────────────────────────────────────────────┘
//!     │ pivot < front <= arc (gated)
//!     └──────────► Arc ──(clear AND min elapsed) OR max elapsed──► Cruise
//!
//!   Cruise/Pivot/Arc ──crash streak──► EmergencyBrake ──► Backoff ──► PivotAway ──► Cruise
//! ```
//!
//! "Gated" means a decision tick (one every `decide_every_ms`) that also falls
//! outside the post-transition hold. Turn direction always comes from which
//! side has more room, never from an absolute side distance.

use core::cmp::Ordering;

use crate::actuator::{Command, Motion, Wheel};
use crate::config::{NavConfig, TieBreak};
use crate::nav::governor::SpeedGovernor;
use crate::nav::steering::{SteeringController, Trim};
use crate::nav::trend::FrontTrend;
use crate::state::RangeSnapshot;
use crate::time::Timestamp;

/// Side reading outside the side band: no wall in range.
const FAR: u16 = u16::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TurnDirection {
    Left,
    Right,
}

impl TurnDirection {
    pub const fn pivot(self) -> Motion {
        match self {
            TurnDirection::Left => Motion::PivotLeft,
            TurnDirection::Right => Motion::PivotRight,
        }
    }

    /// The wheel on the inside of the turn.
    pub const fn inner_wheel(self) -> Wheel {
        match self {
            TurnDirection::Left => Wheel::Left,
            TurnDirection::Right => Wheel::Right,
        }
    }

    const fn from_tie_break(tie: TieBreak) -> Self {
        match tie {
            TieBreak::PreferRight => TurnDirection::Right,
            TieBreak::PreferLeft => TurnDirection::Left,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NavState {
    Cruise,
    Pivot {
        direction: TurnDirection,
        deadline: Timestamp,
    },
    Arc {
        direction: TurnDirection,
        min_until: Timestamp,
        max_until: Timestamp,
    },
    EmergencyBrake {
        ticks_remaining: u16,
    },
    Backoff {
        ticks_remaining: u16,
    },
    PivotAway {
        direction: TurnDirection,
        ticks_remaining: u16,
    },
}

impl NavState {
    pub const fn name(&self) -> &'static str {
        match self {
            NavState::Cruise => "cruise",
            NavState::Pivot { .. } => "pivot",
            NavState::Arc { .. } => "arc",
            NavState::EmergencyBrake { .. } => "brake",
            NavState::Backoff { .. } => "backoff",
            NavState::PivotAway { .. } => "pivot-away",
        }
    }

    /// States the crash guard may interrupt.
    pub const fn is_guarded(&self) -> bool {
        matches!(self, NavState::Cruise | NavState::Pivot { .. } | NavState::Arc { .. })
    }
}

pub struct NavigationController {
    config: NavConfig,
    state: NavState,
    governor: SpeedGovernor,
    steering: SteeringController,
    trend: FrontTrend,

    vote: i8,
    ban_until: Timestamp,
    next_decide: Timestamp,
    hold_until: Timestamp,
    chain_until: Timestamp,
    speedup_after: Timestamp,

    pivot_streak: u8,
    crash_streak: u8,
    crash_cooldown: u16,

    arc_phase: u8,
    next_arc_bias: Timestamp,
}

impl NavigationController {
    pub fn new(config: NavConfig) -> Self {
        Self {
            governor: SpeedGovernor::new(config.speed),
            steering: SteeringController::new(config.steering),
            trend: FrontTrend::new(&config.trend),
            config,
            state: NavState::Cruise,
            vote: 0,
            ban_until: Timestamp::default(),
            next_decide: Timestamp::default(),
            hold_until: Timestamp::default(),
            chain_until: Timestamp::default(),
            speedup_after: Timestamp::default(),
            pivot_streak: 0,
            crash_streak: 0,
            crash_cooldown: 0,
            arc_phase: 0,
            next_arc_bias: Timestamp::default(),
        }
    }

    /// (Re)start autonomous driving. Turns stay banned for `startup_ban_ms`.
    pub fn start(&mut self, now: Timestamp) {
        self.state = NavState::Cruise;
        self.governor.reset();
        self.steering.reset();
        self.trend.reset();
        self.vote = 0;
        self.ban_until = now.add_millis(self.config.startup_ban_ms);
        self.next_decide = now;
        self.hold_until = now;
        self.chain_until = now;
        self.speedup_after = now;
        self.pivot_streak = 0;
        self.crash_streak = 0;
        self.crash_cooldown = 0;
        self.arc_phase = 0;
        self.next_arc_bias = now;
        log_info!("nav: start, turns banned for {} ms", self.config.startup_ban_ms);
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// One control tick. Reads the snapshot once and returns the command
    /// for the actuator, already clamped to the duty limits.
    pub fn update(&mut self, snapshot: &RangeSnapshot, now: Timestamp) -> Command {
        let front = snapshot.center;
        let left = self.side(snapshot.left);
        let right = self.side(snapshot.right);
        let any_unknown = snapshot.left.is_none() || snapshot.center.is_none() || snapshot.right.is_none();

        self.trend.update(front);

        // The streak only counts while the guard is live, so every brake
        // needs `crash_streak` fresh readings. Unknown front holds it.
        self.crash_cooldown = self.crash_cooldown.saturating_sub(1);
        if !self.state.is_guarded() || self.crash_cooldown > 0 {
            self.crash_streak = 0;
        } else if let Some(f) = front {
            if f <= self.config.crash_cm {
                self.crash_streak = self.crash_streak.saturating_add(1);
            } else {
                self.crash_streak = 0;
            }
        }

        if self.state.is_guarded() && self.crash_streak >= self.config.crash_streak {
            self.crash_streak = 0;
            self.steering.reset();
            self.transition(NavState::EmergencyBrake {
                ticks_remaining: self.config.brake_ticks,
            });
        }

        let state = self.state;
        let command = match state {
            NavState::EmergencyBrake { ticks_remaining } => self.brake(ticks_remaining),
            NavState::Backoff { ticks_remaining } => self.backoff(ticks_remaining, left, right),
            NavState::PivotAway {
                direction,
                ticks_remaining,
            } => self.pivot_away(direction, ticks_remaining, front, left, right, now),
            _ if !now.has_reached(self.ban_until) => {
                if any_unknown {
                    self.governor.speed_down();
                } else {
                    self.governor.slow();
                }
                self.forward(None)
            }
            NavState::Cruise => self.cruise(front, left, right, any_unknown, now),
            NavState::Pivot { direction, deadline } => {
                if now.has_reached(deadline) {
                    self.end_turn(now)
                } else {
                    self.pivot_command(direction)
                }
            }
            NavState::Arc {
                direction,
                min_until,
                max_until,
            } => self.arc(direction, min_until, max_until, front, now),
        };

        command.clamped(self.config.speed.min, self.config.speed.max)
    }

    // ── Cruise ────────────────────────────────────────────────────────────

    fn cruise(
        &mut self,
        front: Option<u16>,
        left: Option<u16>,
        right: Option<u16>,
        any_unknown: bool,
        now: Timestamp,
    ) -> Command {
        let in_chain = !now.has_reached(self.chain_until);
        let decide_ms = if in_chain {
            self.config.chain_decide_ms
        } else {
            self.config.decide_every_ms
        };
        let can_decide = now.has_reached(self.next_decide);
        if can_decide {
            self.next_decide = now.add_millis(decide_ms);
        }

        let Some(front) = front else {
            self.pivot_streak = 0;
            self.governor.speed_down();
            self.steering.reset();
            return self.forward(None);
        };

        if front < self.config.too_close_cm {
            self.cast_vote(left, right);
            let direction = self.direction();
            log_info!("nav: front {} cm too close", front);
            self.enter_pivot(direction, now);
            return self.pivot_command(direction);
        }

        if any_unknown {
            self.governor.speed_down();
        } else {
            self.govern(front, left, right, now);
        }

        if can_decide {
            self.cast_vote(left, right);
        }

        let (pivot_th, arc_th) = self.thresholds(in_chain);
        if front <= pivot_th {
            self.pivot_streak = self.pivot_streak.saturating_add(1);
        } else {
            self.pivot_streak = 0;
        }

        // A zero vote means no side information yet: keep cruising.
        if can_decide && now.has_reached(self.hold_until) && self.vote != 0 {
            let direction = self.direction();
            if front <= pivot_th {
                if self.pivot_streak >= self.config.pivot_confirm_ticks {
                    self.enter_pivot(direction, now);
                    return self.pivot_command(direction);
                }
            } else if front <= arc_th {
                self.enter_arc(direction, now);
                return self.forward(None);
            }
        }

        let sides = match (left, right) {
            (Some(l), Some(r)) if l != FAR && r != FAR => Some((l, r)),
            _ => None,
        };
        let trim = self.steering.update(sides);
        self.forward(trim)
    }

    fn govern(&mut self, front: u16, left: Option<u16>, right: Option<u16>, now: Timestamp) {
        let nearest = [left, right].into_iter().flatten().fold(front, u16::min);
        let speed = self.config.speed;

        if nearest < speed.near_cm {
            self.governor.slow();
        } else if nearest >= speed.far_cm && now.has_reached(self.speedup_after) {
            self.governor.speed_up();
            let cooldown = if self.trend.opening_fast() {
                speed.speedup_cooldown_open_ms
            } else {
                speed.speedup_cooldown_ms
            };
            self.speedup_after = now.add_millis(cooldown);
        }
    }

    fn thresholds(&self, in_chain: bool) -> (u16, u16) {
        let t = &self.config.trend;
        let mut pivot = self.config.pivot_cm;
        let mut arc = self.config.arc_cm;

        if self.trend.closing_fast() {
            pivot = pivot.saturating_add(t.close_pivot_boost_cm);
            arc = arc.saturating_add(t.close_arc_boost_cm);
        } else if self.trend.opening_fast() {
            arc = arc.saturating_sub(t.open_arc_relief_cm);
        }
        if in_chain {
            pivot = pivot.saturating_sub(self.config.chain_pivot_relief_cm);
        }

        // Adjustments may narrow the arc band but never invert it.
        (pivot, arc.max(pivot))
    }

    // ── Turns ─────────────────────────────────────────────────────────────

    fn enter_pivot(&mut self, direction: TurnDirection, now: Timestamp) {
        self.pivot_streak = 0;
        self.steering.reset();
        self.governor.slow();
        self.hold_until = now.add_millis(self.config.hold_turn_ms);
        self.transition(NavState::Pivot {
            direction,
            deadline: now.add_millis(self.config.turn_ms),
        });
    }

    fn enter_arc(&mut self, direction: TurnDirection, now: Timestamp) {
        self.pivot_streak = 0;
        self.steering.reset();
        self.governor.slow();
        self.governor.nudge_down(direction.inner_wheel());
        self.governor.nudge_down(direction.inner_wheel());
        self.arc_phase = 0;
        self.next_arc_bias = now.add_millis(self.config.arc_bias_period_ms);
        self.hold_until = now.add_millis(self.config.hold_turn_ms);
        self.transition(NavState::Arc {
            direction,
            min_until: now.add_millis(self.config.arc_min_ms),
            max_until: now.add_millis(self.config.arc_max_ms),
        });
    }

    fn arc(
        &mut self,
        direction: TurnDirection,
        min_until: Timestamp,
        max_until: Timestamp,
        front: Option<u16>,
        now: Timestamp,
    ) -> Command {
        let mut clear_th = self.config.clear_cm;
        if self.trend.opening_fast() {
            clear_th = clear_th.saturating_sub(self.config.trend.open_clear_relief_cm);
        }
        let clear_th = clear_th.max(self.config.arc_cm);

        let cleared = front.map_or(false, |f| f >= clear_th);
        if (cleared && now.has_reached(min_until)) || now.has_reached(max_until) {
            return self.end_turn(now);
        }

        if now.has_reached(self.next_arc_bias) && self.arc_phase < self.config.arc_bias_phases {
            self.governor.nudge_down(direction.inner_wheel());
            self.arc_phase += 1;
            self.next_arc_bias = now.add_millis(self.config.arc_bias_period_ms);
        }
        self.forward(None)
    }

    /// Back to Cruise at slow duty, opening the chaining window.
    fn end_turn(&mut self, now: Timestamp) -> Command {
        let in_chain = !now.has_reached(self.chain_until);
        let hold = if in_chain {
            self.config.chain_hold_drive_ms
        } else {
            self.config.hold_drive_ms
        };
        self.hold_until = now.add_millis(hold);
        self.chain_until = now.add_millis(self.config.chain_window_ms);
        self.arc_phase = 0;
        self.governor.slow();
        self.transition(NavState::Cruise);
        self.forward(None)
    }

    // ── Collision recovery ────────────────────────────────────────────────

    fn brake(&mut self, ticks_remaining: u16) -> Command {
        self.governor.floor();
        if ticks_remaining <= 1 {
            self.transition(NavState::Backoff {
                ticks_remaining: self.config.backoff_ticks,
            });
        } else {
            self.state = NavState::EmergencyBrake {
                ticks_remaining: ticks_remaining - 1,
            };
        }
        self.forward(None)
    }

    fn backoff(&mut self, ticks_remaining: u16, left: Option<u16>, right: Option<u16>) -> Command {
        self.governor.slow();
        if ticks_remaining <= 1 {
            let direction = self.roomier_side(left, right);
            self.transition(NavState::PivotAway {
                direction,
                ticks_remaining: self.config.pivot_away_ticks,
            });
        } else {
            self.state = NavState::Backoff {
                ticks_remaining: ticks_remaining - 1,
            };
        }
        Command::new(Motion::Backward, self.governor.left(), self.governor.right())
    }

    fn pivot_away(
        &mut self,
        direction: TurnDirection,
        ticks_remaining: u16,
        front: Option<u16>,
        left: Option<u16>,
        right: Option<u16>,
        now: Timestamp,
    ) -> Command {
        // The wall being turned away from.
        let far_side = match direction {
            TurnDirection::Left => right,
            TurnDirection::Right => left,
        };
        let escaped = matches!((front, far_side), (Some(f), Some(s)) if f > s);

        if escaped || ticks_remaining <= 1 {
            self.crash_cooldown = self.config.crash_cooldown_ticks;
            self.crash_streak = 0;
            self.hold_until = now.add_millis(self.config.hold_drive_ms);
            self.governor.slow();
            self.transition(NavState::Cruise);
            return self.forward(None);
        }

        self.state = NavState::PivotAway {
            direction,
            ticks_remaining: ticks_remaining - 1,
        };
        self.governor.slow();
        self.pivot_command(direction)
    }

    // ── Helpers ───────────────────────────────────────────────────────────

    /// `None` for an unknown (stale) side. Readings outside the side band
    /// become `FAR`: they never count as near.
    fn side(&self, reading: Option<u16>) -> Option<u16> {
        let band = self.config.side_min_cm..=self.config.side_max_cm;
        reading.map(|cm| if band.contains(&cm) { cm } else { FAR })
    }

    /// `Greater` when the right side has more room. `None` if either is unknown.
    fn compare_sides(left: Option<u16>, right: Option<u16>) -> Option<Ordering> {
        Some(right?.cmp(&left?))
    }

    /// Unknown sides abstain; the vote keeps its previous lean.
    fn cast_vote(&mut self, left: Option<u16>, right: Option<u16>) {
        let Some(order) = Self::compare_sides(left, right) else {
            return;
        };
        let step = match order {
            Ordering::Greater => 1,
            Ordering::Less => -1,
            Ordering::Equal => match self.config.tie_break {
                TieBreak::PreferRight => 1,
                TieBreak::PreferLeft => -1,
            },
        };
        let limit = self.config.vote_limit.max(1);
        self.vote = self.vote.saturating_add(step).clamp(-limit, limit);
    }

    fn direction(&self) -> TurnDirection {
        match self.vote.cmp(&0) {
            Ordering::Greater => TurnDirection::Right,
            Ordering::Less => TurnDirection::Left,
            Ordering::Equal => TurnDirection::from_tie_break(self.config.tie_break),
        }
    }

    fn roomier_side(&self, left: Option<u16>, right: Option<u16>) -> TurnDirection {
        match Self::compare_sides(left, right) {
            Some(Ordering::Greater) => TurnDirection::Right,
            Some(Ordering::Less) => TurnDirection::Left,
            Some(Ordering::Equal) => TurnDirection::from_tie_break(self.config.tie_break),
            None => self.direction(),
        }
    }

    fn forward(&self, trim: Option<Trim>) -> Command {
        let mut left = self.governor.left();
        let mut right = self.governor.right();
        if let Some(trim) = trim {
            match trim.wheel {
                Wheel::Left => left = left.saturating_sub(trim.amount),
                Wheel::Right => right = right.saturating_sub(trim.amount),
            }
        }
        Command::new(Motion::Forward, left, right)
    }

    fn pivot_command(&self, direction: TurnDirection) -> Command {
        Command::new(direction.pivot(), self.governor.left(), self.governor.right())
    }

    fn transition(&mut self, next: NavState) {
        log_info!("nav: {} -> {}", self.state.name(), next.name());
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn ms(v: u32) -> Timestamp {
        Timestamp::from_millis(v)
    }

    fn no_ban() -> NavConfig {
        NavConfig {
            startup_ban_ms: 0,
            ..NavConfig::default()
        }
    }

    fn controller(config: NavConfig) -> NavigationController {
        let mut c = NavigationController::new(config);
        c.start(ms(0));
        c
    }

    fn snap(left: Option<u16>, center: Option<u16>, right: Option<u16>, t: u32) -> RangeSnapshot {
        RangeSnapshot {
            left,
            center,
            right,
            taken_at: ms(t),
        }
    }

    /// Tick with all three channels known.
    fn step(c: &mut NavigationController, t: u32, left: u16, front: u16, right: u16) -> Command {
        c.update(&snap(Some(left), Some(front), Some(right), t), ms(t))
    }

    fn is_brake(state: NavState) -> bool {
        matches!(state, NavState::EmergencyBrake { .. })
    }

    #[test]
    fn closing_front_pivots_toward_roomier_side() {
        let mut c = controller(no_ban());

        step(&mut c, 0, 50, 200, 70);
        assert_eq!(c.state(), NavState::Cruise);

        let cmd = step(&mut c, 30, 50, 60, 70);
        assert_eq!(
            c.state(),
            NavState::Pivot {
                direction: TurnDirection::Right,
                deadline: ms(380)
            }
        );
        assert_eq!(cmd.motion, Motion::PivotRight);

        step(&mut c, 60, 50, 55, 70);
        assert!(matches!(c.state(), NavState::Pivot { direction: TurnDirection::Right, .. }));
    }

    #[test]
    fn pivot_waits_for_confirmation_streak() {
        let mut c = controller(NavConfig {
            pivot_confirm_ticks: 2,
            ..no_ban()
        });

        step(&mut c, 0, 50, 200, 70);
        step(&mut c, 30, 50, 60, 70);
        // At or under the pivot threshold: neither pivot yet nor arc.
        assert_eq!(c.state(), NavState::Cruise);
        step(&mut c, 60, 50, 55, 70);
        assert!(matches!(c.state(), NavState::Pivot { direction: TurnDirection::Right, .. }));
    }

    #[test]
    fn decisions_are_rate_limited() {
        let mut c = controller(no_ban());
        step(&mut c, 0, 50, 200, 70);
        // Only 10 ms since the last decision tick.
        step(&mut c, 10, 50, 60, 70);
        assert_eq!(c.state(), NavState::Cruise);
        step(&mut c, 30, 50, 60, 70);
        assert!(matches!(c.state(), NavState::Pivot { .. }));
    }

    #[test]
    fn too_close_pivots_without_waiting_for_gate() {
        let mut c = controller(no_ban());
        step(&mut c, 0, 40, 200, 90);
        let cmd = step(&mut c, 5, 40, 10, 90);
        assert!(matches!(c.state(), NavState::Pivot { direction: TurnDirection::Right, .. }));
        assert_eq!(cmd.motion, Motion::PivotRight);
    }

    #[test]
    fn pivot_returns_to_cruise_at_deadline() {
        let mut c = controller(no_ban());
        step(&mut c, 0, 90, 50, 40);
        assert!(matches!(c.state(), NavState::Pivot { direction: TurnDirection::Left, .. }));

        step(&mut c, 330, 90, 50, 40);
        assert!(matches!(c.state(), NavState::Pivot { .. }));
        let cmd = step(&mut c, 350, 90, 150, 40);
        assert_eq!(c.state(), NavState::Cruise);
        assert_eq!(cmd.motion, Motion::Forward);
        assert_eq!((cmd.left_duty, cmd.right_duty), (390, 390));
    }

    #[test]
    fn arc_holds_through_threshold_noise() {
        let mut c = controller(no_ban());

        step(&mut c, 0, 60, 75, 90);
        assert!(matches!(c.state(), NavState::Arc { direction: TurnDirection::Right, .. }));

        // 70/80 straddles the arc threshold but never reaches clear (81).
        let mut t = 0;
        for i in 0..20 {
            t += 30;
            let front = if i % 2 == 0 { 70 } else { 80 };
            step(&mut c, t, 60, front, 90);
            assert!(matches!(c.state(), NavState::Arc { .. }), "left arc at t={}", t);
        }

        step(&mut c, t + 30, 60, 85, 90);
        assert_eq!(c.state(), NavState::Cruise);
    }

    #[test]
    fn arc_respects_minimum_duration() {
        let mut c = controller(no_ban());
        step(&mut c, 0, 60, 75, 90);
        step(&mut c, 30, 60, 120, 90);
        step(&mut c, 270, 60, 120, 90);
        assert!(matches!(c.state(), NavState::Arc { .. }));
        step(&mut c, 300, 60, 120, 90);
        assert_eq!(c.state(), NavState::Cruise);
    }

    #[test]
    fn arc_gives_up_at_maximum_duration() {
        let mut c = controller(no_ban());
        let mut t = 0;
        step(&mut c, t, 60, 75, 90);
        while t < 870 {
            t += 30;
            step(&mut c, t, 60, 75, 90);
            assert!(matches!(c.state(), NavState::Arc { .. }));
        }
        step(&mut c, 900, 60, 75, 90);
        assert_eq!(c.state(), NavState::Cruise);
    }

    #[test]
    fn arc_slows_the_inner_wheel_in_steps() {
        let mut c = controller(no_ban());
        let cmd = step(&mut c, 0, 60, 75, 90);
        assert_eq!(cmd.motion, Motion::Forward);
        assert_eq!((cmd.left_duty, cmd.right_duty), (390, 290));

        let cmd = step(&mut c, 30, 60, 75, 90);
        assert_eq!((cmd.left_duty, cmd.right_duty), (390, 240));
    }

    #[test]
    fn single_crash_dip_does_not_brake() {
        let mut c = controller(no_ban());
        step(&mut c, 0, 100, 200, 100);
        step(&mut c, 20, 100, 14, 100);
        assert!(!is_brake(c.state()));
        for t in (40..400).step_by(20) {
            step(&mut c, t, 100, 200, 100);
            assert!(!is_brake(c.state()));
        }
    }

    #[test]
    fn sustained_crash_range_brakes_then_recovers() {
        let mut c = controller(NavConfig {
            brake_ticks: 2,
            backoff_ticks: 2,
            pivot_away_ticks: 3,
            crash_cooldown_ticks: 5,
            ..no_ban()
        });
        let mut kinds = Vec::new();
        let mut motions = Vec::new();
        for i in 0..14u32 {
            let cmd = step(&mut c, i * 30, 30, 14, 120);
            kinds.push(c.state().name());
            motions.push(cmd.motion);
        }

        assert_eq!(
            kinds,
            [
                "pivot",
                "brake",
                "backoff",
                "backoff",
                "pivot-away",
                "pivot-away",
                "pivot-away",
                "cruise",
                // Front is still 14 cm, but the cooldown holds the guard off.
                "cruise",
                "cruise",
                "cruise",
                "cruise",
                // Guard live again: one reading is not enough to brake.
                "pivot",
                "brake",
            ]
        );
        assert_eq!(motions[1], Motion::Forward);
        assert_eq!(motions[3], Motion::Backward);
        assert_eq!(motions[5], Motion::PivotRight);
        assert_eq!(motions[7], Motion::Forward);
    }

    #[test]
    fn brake_runs_at_floor_duty() {
        let mut c = controller(no_ban());
        step(&mut c, 0, 100, 14, 100);
        let cmd = step(&mut c, 20, 100, 14, 100);
        assert!(is_brake(c.state()));
        assert_eq!(cmd, Command::new(Motion::Forward, 240, 240));
    }

    #[test]
    fn pivot_away_ends_early_once_front_opens() {
        let mut c = controller(NavConfig {
            brake_ticks: 1,
            backoff_ticks: 1,
            ..no_ban()
        });
        step(&mut c, 0, 30, 14, 120);
        step(&mut c, 20, 30, 14, 120); // one brake tick, then backoff
        step(&mut c, 40, 30, 14, 120); // one backoff tick, then pivot away
        assert!(matches!(
            c.state(),
            NavState::PivotAway { direction: TurnDirection::Right, .. }
        ));
        // Still shorter than the left wall we are turning away from.
        step(&mut c, 60, 30, 25, 120);
        assert!(matches!(c.state(), NavState::PivotAway { .. }));
        // Past the left wall, though still short of the right one.
        step(&mut c, 80, 30, 100, 120);
        assert_eq!(c.state(), NavState::Cruise);
    }

    #[test]
    fn configured_thresholds_are_used_as_given() {
        let config = NavConfig {
            too_close_cm: 10,
            crash_cm: 8,
            pivot_cm: 30,
            arc_cm: 35,
            clear_cm: 45,
            ..no_ban()
        };
        assert_eq!(config.validate(), Ok(()));
        let mut c = controller(config);

        for t in (0..300).step_by(30) {
            step(&mut c, t, 50, 38, 90);
            assert_eq!(c.state(), NavState::Cruise);
        }
        step(&mut c, 300, 50, 33, 90);
        assert!(matches!(
            c.state(),
            NavState::Arc { direction: TurnDirection::Right, .. }
        ));
    }

    #[test]
    fn unknown_front_slows_and_holds_crash_streak() {
        let mut c = controller(no_ban());
        for t in (0..200).step_by(20) {
            step(&mut c, t, 200, 200, 200);
        }
        let before = step(&mut c, 200, 200, 200, 200);

        let cmd = c.update(&snap(Some(200), None, Some(200), 220), ms(220));
        assert_eq!(c.state(), NavState::Cruise);
        assert_eq!(cmd.motion, Motion::Forward);
        assert!(cmd.left_duty < before.left_duty);

        // 14 / unknown / 14 is still two consecutive known crash readings.
        step(&mut c, 240, 200, 14, 200);
        c.update(&snap(Some(200), None, Some(200), 260), ms(260));
        step(&mut c, 280, 200, 14, 200);
        assert!(is_brake(c.state()));
    }

    #[test]
    fn stale_side_suspends_speed_up() {
        let mut c = controller(no_ban());
        let mut last = step(&mut c, 0, 200, 200, 200);
        for t in (20..300).step_by(20) {
            last = step(&mut c, t, 200, 200, 200);
        }
        let cmd = c.update(&snap(None, Some(200), Some(200), 300), ms(300));
        assert!(cmd.left_duty < last.left_duty);
        assert!(cmd.right_duty < last.right_duty);
    }

    #[test]
    fn speed_ramps_up_in_bounded_steps() {
        let mut c = controller(no_ban());
        let mut prev = step(&mut c, 0, 200, 200, 200);
        for t in (20..3_000).step_by(20) {
            let cmd = step(&mut c, t, 200, 200, 200);
            assert!(cmd.left_duty >= prev.left_duty);
            assert!(cmd.left_duty - prev.left_duty <= 40);
            prev = cmd;
        }
        assert_eq!(prev.left_duty, 780);
    }

    #[test]
    fn side_out_of_band_counts_as_far() {
        let mut c = controller(no_ban());
        // Left 350 cm is past the side band: treat as far, so turn left.
        step(&mut c, 0, 350, 50, 100);
        assert!(matches!(c.state(), NavState::Pivot { direction: TurnDirection::Left, .. }));
    }

    #[test]
    fn stale_side_keeps_previous_lean() {
        let mut c = controller(no_ban());
        step(&mut c, 0, 90, 200, 40);
        // Left goes unknown; it must not read as open or blocked.
        c.update(&snap(None, Some(50), Some(40), 30), ms(30));
        assert!(matches!(c.state(), NavState::Pivot { direction: TurnDirection::Left, .. }));

        let mut c = controller(no_ban());
        step(&mut c, 0, 40, 200, 90);
        c.update(&snap(None, Some(50), Some(40), 30), ms(30));
        assert!(matches!(c.state(), NavState::Pivot { direction: TurnDirection::Right, .. }));
    }

    #[test]
    fn no_gated_turn_without_side_information() {
        let mut c = controller(no_ban());
        for t in (0..300).step_by(30) {
            c.update(&snap(None, Some(50), None, t), ms(t));
            assert_eq!(c.state(), NavState::Cruise);
        }
        // Too close still turns, falling back to the tie-break.
        c.update(&snap(None, Some(10), None, 300), ms(300));
        assert!(matches!(c.state(), NavState::Pivot { direction: TurnDirection::Right, .. }));
    }

    #[test]
    fn equal_sides_follow_tie_break() {
        let mut c = controller(no_ban());
        step(&mut c, 0, 80, 50, 80);
        assert!(matches!(c.state(), NavState::Pivot { direction: TurnDirection::Right, .. }));

        let mut c = controller(NavConfig {
            tie_break: TieBreak::PreferLeft,
            ..no_ban()
        });
        step(&mut c, 0, 80, 50, 80);
        assert!(matches!(c.state(), NavState::Pivot { direction: TurnDirection::Left, .. }));
    }

    #[test]
    fn cruise_trims_wheel_toward_open_side() {
        let mut c = controller(no_ban());
        let cmd = step(&mut c, 0, 40, 200, 80);
        assert_eq!(c.state(), NavState::Cruise);
        assert_eq!(cmd.motion, Motion::Forward);
        assert_eq!((cmd.left_duty, cmd.right_duty), (390, 330));
    }

    #[test]
    fn startup_ban_suppresses_turns() {
        let mut c = controller(NavConfig::default());
        for t in (0..1_300).step_by(20) {
            let cmd = step(&mut c, t, 50, 50, 100);
            assert_eq!(c.state(), NavState::Cruise);
            assert_eq!(cmd, Command::new(Motion::Forward, 390, 390));
        }
        step(&mut c, 1_300, 50, 50, 100);
        assert!(matches!(c.state(), NavState::Pivot { direction: TurnDirection::Right, .. }));
    }

    #[test]
    fn crash_guard_active_during_startup_ban() {
        let mut c = controller(NavConfig::default());
        step(&mut c, 0, 50, 14, 100);
        step(&mut c, 20, 50, 14, 100);
        assert!(is_brake(c.state()));
    }

    #[test]
    fn chain_window_lowers_pivot_threshold() {
        // Outside the chain window 63 cm pivots.
        let mut c = controller(no_ban());
        step(&mut c, 0, 50, 63, 90);
        assert!(matches!(c.state(), NavState::Pivot { .. }));

        // Right after a turn it arcs instead.
        step(&mut c, 350, 50, 200, 90);
        assert_eq!(c.state(), NavState::Cruise);
        step(&mut c, 500, 50, 63, 90);
        assert!(matches!(c.state(), NavState::Arc { .. }));
    }

    #[test]
    fn same_inputs_same_state_sequence() {
        let fronts = [200u16, 150, 90, 75, 70, 80, 85, 60, 40, 30, 14, 14, 90, 120, 200];
        let run = || {
            let mut c = controller(no_ban());
            let mut states = Vec::new();
            for (i, f) in fronts.iter().cycle().take(120).enumerate() {
                let t = i as u32 * 20;
                let l = 40 + (i as u16 * 7) % 50;
                let r = 40 + (i as u16 * 11) % 50;
                step(&mut c, t, l, *f, r);
                states.push(c.state());
            }
            states
        };
        assert_eq!(run(), run());
    }

    fn reading(rng: &mut StdRng) -> Option<u16> {
        if rng.random_bool(0.2) {
            None
        } else {
            Some(rng.random_range(0..600))
        }
    }

    #[test]
    fn duties_always_within_limits() {
        for seed in 0..64u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let ban = if seed % 2 == 0 { 0 } else { 1_300 };
            let config = NavConfig {
                startup_ban_ms: ban,
                ..NavConfig::default()
            };
            let (min, max) = (config.speed.min, config.speed.max);
            let mut c = controller(config);
            let mut t = 0u32;
            for _ in 0..rng.random_range(1..300) {
                t += rng.random_range(1..60);
                let (l, f, r) = (reading(&mut rng), reading(&mut rng), reading(&mut rng));
                let cmd = c.update(&snap(l, f, r, t), ms(t));
                assert!((min..=max).contains(&cmd.left_duty), "seed {seed}: {cmd:?}");
                assert!((min..=max).contains(&cmd.right_duty), "seed {seed}: {cmd:?}");
            }
        }
    }
}
