use crate::actuator::Wheel;
use crate::config::SpeedConfig;

/// Per-wheel forward duty with asymmetric slew.
///
/// Speeding up moves in small steps, slowing down in large ones, and every
/// value stays inside `[min, max]`.
pub struct SpeedGovernor {
    config: SpeedConfig,
    left: u16,
    right: u16,
}

impl SpeedGovernor {
    pub fn new(config: SpeedConfig) -> Self {
        let base = config.base.clamp(config.min, config.max);
        Self {
            config,
            left: base,
            right: base,
        }
    }

    #[inline]
    fn clamp(&self, duty: u16) -> u16 {
        duty.clamp(self.config.min, self.config.max)
    }

    pub fn left(&self) -> u16 {
        self.left
    }

    pub fn right(&self) -> u16 {
        self.right
    }

    pub fn duty(&self, wheel: Wheel) -> u16 {
        match wheel {
            Wheel::Left => self.left,
            Wheel::Right => self.right,
        }
    }

    pub fn reset(&mut self) {
        self.left = self.clamp(self.config.base);
        self.right = self.left;
    }

    /// Both wheels straight to the slow duty.
    pub fn slow(&mut self) {
        self.left = self.clamp(self.config.slow);
        self.right = self.left;
    }

    /// Both wheels straight to the floor.
    pub fn floor(&mut self) {
        self.left = self.config.min;
        self.right = self.config.min;
    }

    pub fn speed_up(&mut self) {
        self.left = self.clamp(self.left.saturating_add(self.config.step_up));
        self.right = self.clamp(self.right.saturating_add(self.config.step_up));
    }

    pub fn speed_down(&mut self) {
        self.left = self.clamp(self.left.saturating_sub(self.config.step_down));
        self.right = self.clamp(self.right.saturating_sub(self.config.step_down));
    }

    /// Take one differential step off a single wheel.
    pub fn nudge_down(&mut self, wheel: Wheel) {
        let step = self.config.step_diff;
        match wheel {
            Wheel::Left => self.left = self.clamp(self.left.saturating_sub(step)),
            Wheel::Right => self.right = self.clamp(self.right.saturating_sub(step)),
        }
    }
}
