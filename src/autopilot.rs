//! The two periodic entry points: `ranging_tick` then `navigation_tick`,
//! once per control period, in that order.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::actuator::{self, Actuator, Command, Motion};
use crate::nav::NavigationController;
use crate::ranging::{CaptureControl, Ranging};
use crate::state::{RangeSnapshot, Telemetry};
use crate::time::Timestamp;

pub struct Autopilot<'a, C, P, D, A> {
    ranging: Ranging<'a, C, P, D>,
    nav: NavigationController,
    actuator: A,
    snapshot: RangeSnapshot,
    last_command: Command,
    actuator_faults: u32,
}

impl<'a, C, P, D, A> Autopilot<'a, C, P, D, A>
where
    C: CaptureControl,
    P: OutputPin,
    D: DelayNs,
    A: Actuator,
{
    pub fn new(ranging: Ranging<'a, C, P, D>, nav: NavigationController, actuator: A) -> Self {
        let floor = nav.config().speed.min;
        Self {
            ranging,
            nav,
            actuator,
            snapshot: RangeSnapshot::default(),
            last_command: Command::new(Motion::Forward, floor, floor),
            actuator_faults: 0,
        }
    }

    /// Begin autonomous driving at `now`.
    pub fn start(&mut self, now: Timestamp) {
        self.nav.start(now);
    }

    /// Drain captures, fire the next trigger and refresh the filtered view.
    pub fn ranging_tick(&mut self, now: Timestamp) -> RangeSnapshot {
        self.snapshot = self.ranging.ranging_tick(now);
        self.snapshot
    }

    /// Run the controller on the latest snapshot and drive the motors.
    pub fn navigation_tick(&mut self, now: Timestamp) -> Telemetry {
        let snapshot = self.snapshot;
        let command = self.nav.update(&snapshot, now);

        if actuator::apply(&mut self.actuator, &command).is_err() {
            self.actuator_faults = self.actuator_faults.saturating_add(1);
            log_warn!("autopilot: actuator write failed ({} total)", self.actuator_faults);
        }
        self.last_command = command;

        Telemetry {
            snapshot,
            state: self.nav.state(),
            command,
            stats: self.ranging.stats(),
        }
    }

    /// Both halves of one control period.
    pub fn tick(&mut self, now: Timestamp) -> Telemetry {
        self.ranging_tick(now);
        self.navigation_tick(now)
    }

    pub fn last_command(&self) -> Command {
        self.last_command
    }

    pub fn actuator_faults(&self) -> u32 {
        self.actuator_faults
    }

    pub fn ranging(&self) -> &Ranging<'a, C, P, D> {
        &self.ranging
    }

    pub fn ranging_mut(&mut self) -> &mut Ranging<'a, C, P, D> {
        &mut self.ranging
    }

    pub fn controller(&self) -> &NavigationController {
        &self.nav
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }
}
