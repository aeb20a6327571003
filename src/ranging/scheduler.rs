//! Trigger sequencing for the three sensors.
//!
//! Only one sensor is armed at a time. A new trigger is fired no sooner than
//! `guard_ms` after the previous one, which must exceed the longest echo the
//! sensors can return; that keeps one sensor's ping from being heard by
//! another. Whatever the previous sensor was doing when its guard runs out is
//! abandoned before the next one is armed.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use heapless::Vec;

use crate::config::{RangingConfig, TriggerPattern};
use crate::error::RangingError;
use crate::ranging::capture::CaptureBank;
use crate::state::{Channel, RangingStats, RawSample};
use crate::time::Timestamp;

const CENTER_INTERLEAVED: [Channel; 4] = [Channel::Left, Channel::Center, Channel::Right, Channel::Center];
const ROUND_ROBIN: [Channel; 3] = [Channel::Left, Channel::Right, Channel::Center];

/// Hardware side of arming a capture channel: clear pending flags, select
/// rising polarity and unmask the channel interrupt (or the reverse).
pub trait CaptureControl {
    fn arm(&mut self, channel: Channel);
    fn disarm(&mut self, channel: Channel);
}

/// One aggregation round over the three channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameReport {
    pub samples: [Option<RawSample>; Channel::COUNT],
    pub started_at: Timestamp,
    /// All three channels reported before the frame timed out.
    pub complete: bool,
}

#[derive(Debug, Default)]
pub struct TickReport {
    /// In-band samples drained this tick.
    pub samples: Vec<RawSample, { Channel::COUNT }>,
    pub errors: Vec<RangingError, 6>,
    pub frame: Option<FrameReport>,
}

pub struct SensorScheduler<'a, C, P, D> {
    bank: &'a CaptureBank,
    control: C,
    triggers: [P; Channel::COUNT],
    delay: D,
    config: RangingConfig,

    step: usize,
    last_trigger: Option<Timestamp>,
    armed: Option<(Channel, Timestamp)>,

    frame: [Option<RawSample>; Channel::COUNT],
    frame_start: Option<Timestamp>,
    stats: RangingStats,
}

impl<'a, C, P, D> SensorScheduler<'a, C, P, D>
where
    C: CaptureControl,
    P: OutputPin,
    D: DelayNs,
{
    /// `triggers` is indexed by `Channel::index()`: `[left, right, center]`.
    /// An invalid `config` is replaced by the defaults.
    pub fn new(bank: &'a CaptureBank, control: C, triggers: [P; Channel::COUNT], delay: D, config: RangingConfig) -> Self {
        Self {
            bank,
            control,
            triggers,
            delay,
            config: config.or_default(),
            step: 0,
            last_trigger: None,
            armed: None,
            frame: [None; Channel::COUNT],
            frame_start: None,
            stats: RangingStats::default(),
        }
    }

    pub fn stats(&self) -> RangingStats {
        self.stats
    }

    pub fn config(&self) -> &RangingConfig {
        &self.config
    }

    pub fn armed(&self) -> Option<Channel> {
        self.armed.map(|(ch, _)| ch)
    }

    fn pattern(&self) -> &'static [Channel] {
        match self.config.pattern {
            TriggerPattern::CenterInterleaved => &CENTER_INTERLEAVED,
            TriggerPattern::RoundRobin => &ROUND_ROBIN,
        }
    }

    /// Arm `channel` and fire its trigger pulse.
    pub fn trigger(&mut self, channel: Channel, now: Timestamp) {
        let slot = self.bank.slot(channel);
        let control = &mut self.control;
        critical_section::with(|_| {
            // Slot first so the interrupt never sees an unarmed slot.
            slot.arm();
            control.arm(channel);
        });

        let pin = &mut self.triggers[channel.index()];
        let _ = pin.set_low();
        let _ = pin.set_high();
        self.delay.delay_us(self.config.trigger_pulse_us);
        let _ = pin.set_low();

        self.armed = Some((channel, now));
        self.last_trigger = Some(now);
        if self.frame_start.is_none() {
            self.frame_start = Some(now);
        }
    }

    fn abandon(&mut self, channel: Channel, report: &mut TickReport) {
        let slot = self.bank.slot(channel);
        let control = &mut self.control;
        critical_section::with(|_| {
            control.disarm(channel);
            slot.disarm();
        });
        self.stats.timeouts = self.stats.timeouts.saturating_add(1);
        log_debug!("ranging: no echo on {}", channel);
        let _ = report.errors.push(RangingError::SensorTimeout(channel));
    }

    fn drain(&mut self, now: Timestamp, report: &mut TickReport) {
        for channel in Channel::ALL {
            let slot = self.bank.slot(channel);

            let strays = slot.take_strays();
            if strays > 0 {
                self.stats.strays = self.stats.strays.saturating_add(strays as u32);
                log_debug!("ranging: {} stray edge(s) on {}", strays, channel);
                let _ = report.errors.push(RangingError::ConflictingCapture(channel));
            }

            let Some(echo_ticks) = slot.take() else {
                continue;
            };
            if self.armed.map(|(ch, _)| ch) == Some(channel) {
                self.armed = None;
            }

            let distance_cm = echo_ticks / self.config.ticks_per_cm;
            if distance_cm < self.config.min_valid_cm || distance_cm > self.config.max_valid_cm {
                self.stats.out_of_range = self.stats.out_of_range.saturating_add(1);
                log_debug!("ranging: {} cm out of range on {}", distance_cm, channel);
                let _ = report
                    .errors
                    .push(RangingError::OutOfRangeSample { channel, cm: distance_cm });
                continue;
            }

            let sample = RawSample {
                channel,
                echo_ticks,
                distance_cm,
                captured_at: now,
            };
            self.stats.samples = self.stats.samples.saturating_add(1);
            self.frame[channel.index()] = Some(sample);
            let _ = report.samples.push(sample);
        }
    }

    /// Run once per control period.
    ///
    /// 1. Drain completed captures.
    /// 2. Abandon a channel that has been armed past the frame timeout.
    /// 3. Once the guard interval is up, abandon whatever is still armed and
    ///    fire the next sensor in the pattern.
    /// 4. Close the frame when every channel reported or it timed out.
    pub fn tick(&mut self, now: Timestamp) -> TickReport {
        let mut report = TickReport::default();

        self.drain(now, &mut report);

        if let Some((channel, since)) = self.armed {
            if now.millis_since(since) >= self.config.frame_timeout_ms {
                self.armed = None;
                self.abandon(channel, &mut report);
            }
        }

        let guard_elapsed = self
            .last_trigger
            .map_or(true, |at| now.millis_since(at) >= self.config.guard_ms);
        if guard_elapsed {
            if let Some((channel, _)) = self.armed.take() {
                if self.bank.slot(channel).is_armed() {
                    self.abandon(channel, &mut report);
                }
            }
            let pattern = self.pattern();
            let next = pattern[self.step % pattern.len()];
            self.step = (self.step + 1) % pattern.len();
            self.trigger(next, now);
        }

        if let Some(start) = self.frame_start {
            let complete = self.frame.iter().all(Option::is_some);
            if complete || now.millis_since(start) >= self.config.frame_timeout_ms {
                report.frame = Some(FrameReport {
                    samples: self.frame,
                    started_at: start,
                    complete,
                });
                self.frame = [None; Channel::COUNT];
                self.frame_start = Some(now);
                self.stats.frames = self.stats.frames.saturating_add(1);
            }
        }

        report
    }
}
