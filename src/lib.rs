#![cfg_attr(not(test), no_std)]

//! # autonav: ultrasonic ranging and reactive navigation for a differential-drive rover
//!
//! Hardware-independent core of the rover firmware. Everything in this crate
//! runs on the host under `cargo test`; the STM32F405 shell (`src/main.rs`,
//! `src/bin/range_check.rs`) is only built with `--features firmware`.
//!
//! | Module | Purpose |
//! | ------ | ------- |
//! | [`time`] | Millisecond timestamps and wrap-safe tick arithmetic |
//! | [`config`] | Tunables for ranging and navigation |
//! | [`ranging`] | Echo capture, trigger scheduling and range filtering |
//! | [`nav`] | Navigation state machine, steering and speed governor |
//! | [`actuator`] | Motor command types and the `Actuator` capability |
//! | [`autopilot`] | The two periodic entry points tying it all together |
//!
//! Data flow per control period:
//!
//! ```text
//! TIM4 edge IRQ ──► EchoCapture ──► SensorScheduler::tick ──► RangeFilter
//!                                                                  │
//!                          Actuator ◄── NavigationController ◄── RangeSnapshot
//! ```

#[macro_use]
mod logging;

pub mod actuator;
pub mod autopilot;
pub mod config;
pub mod error;
pub mod nav;
pub mod ranging;
pub mod state;
pub mod time;

#[cfg(test)]
pub(crate) mod testing;

pub use actuator::{Actuator, Command, Direction, Motion, Wheel};
pub use autopilot::Autopilot;
pub use config::{NavConfig, RangingConfig};
pub use error::{ConfigError, RangingError};
pub use nav::{NavState, NavigationController};
pub use ranging::{CaptureBank, Ranging};
pub use state::{Channel, RangeSnapshot, RawSample, Telemetry};
pub use time::{TimeSource, Timestamp};
