//! Host-side stand-ins for the hardware seams. Test builds only.

use core::cell::Cell;
use core::convert::Infallible;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

use crate::actuator::{Actuator, Direction, Wheel};
use crate::ranging::scheduler::CaptureControl;
use crate::state::Channel;
use crate::time::{TimeSource, Timestamp};

/// Trigger pin that records every level written to it.
#[derive(Clone, Default)]
pub struct MockPin {
    pub levels: Rc<std::cell::RefCell<Vec<bool>>>,
}

impl MockPin {
    pub fn writes(&self) -> Vec<bool> {
        self.levels.borrow().clone()
    }

    /// Number of complete high pulses seen.
    pub fn pulses(&self) -> usize {
        self.levels
            .borrow()
            .windows(2)
            .filter(|w| w[0] && !w[1])
            .count()
    }
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.borrow_mut().push(true);
        Ok(())
    }
}

/// Delay that only adds up how long it was asked to wait.
#[derive(Default)]
pub struct NoDelay {
    pub total_ns: u64,
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureOp {
    Arm(Channel),
    Disarm(Channel),
}

/// `CaptureControl` that logs arm/disarm calls.
#[derive(Default)]
pub struct RecordingCapture {
    pub ops: Vec<CaptureOp>,
}

impl RecordingCapture {
    pub fn armed(&self) -> Vec<Channel> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                CaptureOp::Arm(ch) => Some(*ch),
                CaptureOp::Disarm(_) => None,
            })
            .collect()
    }
}

impl CaptureControl for RecordingCapture {
    fn arm(&mut self, channel: Channel) {
        self.ops.push(CaptureOp::Arm(channel));
    }

    fn disarm(&mut self, channel: Channel) {
        self.ops.push(CaptureOp::Disarm(channel));
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotorOp {
    Direction(Wheel, Direction),
    Duty(Wheel, u16),
}

#[derive(Default)]
pub struct RecordingActuator {
    pub ops: Vec<MotorOp>,
}

impl RecordingActuator {
    pub fn last_duty(&self, wheel: Wheel) -> Option<u16> {
        self.ops.iter().rev().find_map(|op| match *op {
            MotorOp::Duty(w, d) if w == wheel => Some(d),
            _ => None,
        })
    }

    pub fn last_direction(&self, wheel: Wheel) -> Option<Direction> {
        self.ops.iter().rev().find_map(|op| match *op {
            MotorOp::Direction(w, d) if w == wheel => Some(d),
            _ => None,
        })
    }
}

impl Actuator for RecordingActuator {
    type Error = Infallible;

    fn set_direction(&mut self, wheel: Wheel, direction: Direction) -> Result<(), Self::Error> {
        self.ops.push(MotorOp::Direction(wheel, direction));
        Ok(())
    }

    fn set_duty(&mut self, wheel: Wheel, duty: u16) -> Result<(), Self::Error> {
        self.ops.push(MotorOp::Duty(wheel, duty));
        Ok(())
    }
}

/// Clock advanced by hand.
#[derive(Default)]
pub struct ManualClock {
    now: Cell<u32>,
}

impl ManualClock {
    pub fn at(ms: u32) -> Self {
        Self { now: Cell::new(ms) }
    }

    pub fn advance(&self, ms: u32) -> Timestamp {
        self.now.set(self.now.get().wrapping_add(ms));
        self.now()
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.now.get())
    }
}
