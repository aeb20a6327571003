//! Ultrasonic ranging pipeline: capture slots, trigger scheduling, filtering.

pub mod capture;
pub mod filter;
pub mod scheduler;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::RangingConfig;
use crate::error::RangingError;
use crate::state::{Channel, RangeSnapshot, RangingStats};
use crate::time::Timestamp;

pub use capture::{CaptureBank, CaptureState, EchoCapture, EdgeOutcome};
pub use filter::RangeFilter;
pub use scheduler::{CaptureControl, FrameReport, SensorScheduler, TickReport};

/// Scheduler and filter driven together from the control task.
pub struct Ranging<'a, C, P, D> {
    scheduler: SensorScheduler<'a, C, P, D>,
    filter: RangeFilter,
    last_raw: [Option<u16>; Channel::COUNT],
    stale: [bool; Channel::COUNT],
}

impl<'a, C, P, D> Ranging<'a, C, P, D>
where
    C: CaptureControl,
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(bank: &'a CaptureBank, control: C, triggers: [P; Channel::COUNT], delay: D, config: RangingConfig) -> Self {
        let config = config.or_default();
        Self {
            filter: RangeFilter::new(&config),
            scheduler: SensorScheduler::new(bank, control, triggers, delay, config),
            last_raw: [None; Channel::COUNT],
            // Nothing to warn about until a channel has been fresh once.
            stale: [true; Channel::COUNT],
        }
    }

    /// Advance the trigger sequence, feed drained samples through the
    /// filter and return the current filtered view.
    pub fn ranging_tick(&mut self, now: Timestamp) -> RangeSnapshot {
        let report = self.scheduler.tick(now);

        for sample in report.samples.iter() {
            self.last_raw[sample.channel.index()] = Some(sample.distance_cm);
            if let Err(err) = self.filter.push(sample.channel, sample.distance_cm, now) {
                log_debug!("ranging: {}", err);
            }
        }
        if let Some(frame) = report.frame {
            if !frame.complete {
                log_debug!("ranging: frame timed out");
            }
        }

        self.snapshot(now)
    }

    /// Filtered distances as of `now`. Stale channels read as `None`.
    pub fn snapshot(&mut self, now: Timestamp) -> RangeSnapshot {
        let mut snap = RangeSnapshot {
            taken_at: now,
            ..RangeSnapshot::default()
        };
        for channel in Channel::ALL {
            let value = self.filter.read(channel, now);
            let stale = value.is_none();
            let was_stale = core::mem::replace(&mut self.stale[channel.index()], stale);
            if stale && !was_stale {
                log_warn!("ranging: {}", RangingError::StaleChannel(channel));
            }
            snap.set(channel, value);
        }
        snap
    }

    /// Most recent accepted raw distance per channel, before filtering.
    pub fn last_raw(&self, channel: Channel) -> Option<u16> {
        self.last_raw[channel.index()]
    }

    pub fn stats(&self) -> RangingStats {
        self.scheduler.stats()
    }

    pub fn filter(&self) -> &RangeFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut RangeFilter {
        &mut self.filter
    }

    pub fn scheduler(&self) -> &SensorScheduler<'a, C, P, D> {
        &self.scheduler
    }
}
