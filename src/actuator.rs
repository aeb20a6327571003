//! Motor command types and the seam to the motor driver.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Wheel {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Forward,
    Backward,
}

/// Whole-vehicle motion. Pivots spin in place, one wheel each way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Motion {
    Forward,
    Backward,
    PivotLeft,
    PivotRight,
}

impl Motion {
    /// `(left, right)` wheel directions.
    pub const fn wheel_directions(self) -> (Direction, Direction) {
        match self {
            Motion::Forward => (Direction::Forward, Direction::Forward),
            Motion::Backward => (Direction::Backward, Direction::Backward),
            Motion::PivotLeft => (Direction::Backward, Direction::Forward),
            Motion::PivotRight => (Direction::Forward, Direction::Backward),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    pub motion: Motion,
    pub left_duty: u16,
    pub right_duty: u16,
}

impl Command {
    pub const fn new(motion: Motion, left_duty: u16, right_duty: u16) -> Self {
        Self {
            motion,
            left_duty,
            right_duty,
        }
    }

    pub fn clamped(self, min: u16, max: u16) -> Self {
        Self {
            motion: self.motion,
            left_duty: self.left_duty.clamp(min, max),
            right_duty: self.right_duty.clamp(min, max),
        }
    }

    pub fn duty(&self, wheel: Wheel) -> u16 {
        match wheel {
            Wheel::Left => self.left_duty,
            Wheel::Right => self.right_duty,
        }
    }
}

/// Direction pins plus PWM duty for a two-wheel drive.
pub trait Actuator {
    type Error;

    fn set_direction(&mut self, wheel: Wheel, direction: Direction) -> Result<(), Self::Error>;
    fn set_duty(&mut self, wheel: Wheel, duty: u16) -> Result<(), Self::Error>;
}

/// Push one command to the motors: directions first, then duties.
pub fn apply<A: Actuator>(actuator: &mut A, command: &Command) -> Result<(), A::Error> {
    let (left, right) = command.motion.wheel_directions();
    actuator.set_direction(Wheel::Left, left)?;
    actuator.set_direction(Wheel::Right, right)?;
    actuator.set_duty(Wheel::Left, command.left_duty)?;
    actuator.set_duty(Wheel::Right, command.right_duty)?;
    Ok(())
}
