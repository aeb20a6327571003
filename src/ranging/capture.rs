//! Per-channel echo capture slots shared between the capture interrupt and
//! the control task.
//!
//! Each slot is a tiny state machine:
//!
//! ```text
//!   Idle ──arm──► AwaitingRise ──edge──► AwaitingFall ──edge──► Complete
//!    ▲                                                             │
//!    └──────────────────────── take / disarm ◄─────────────────────┘
//! ```
//!
//! The interrupt only ever moves a slot forward along AwaitingRise →
//! AwaitingFall → Complete. The control task owns every other transition.
//! Timestamps are written before the phase byte, the phase is stored with
//! `Release` and loaded with `Acquire`, so whoever observes a phase also
//! observes the timestamps that go with it.

use core::sync::atomic::{AtomicU16, AtomicU8, Ordering};

use crate::state::Channel;
use crate::time::echo_ticks;

const IDLE: u8 = 0;
const AWAITING_RISE: u8 = 1;
const AWAITING_FALL: u8 = 2;
const COMPLETE: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureState {
    Idle,
    AwaitingRise,
    AwaitingFall { rise: u16 },
    Complete { rise: u16, fall: u16 },
}

/// What the interrupt glue should do with the capture channel after an edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EdgeOutcome {
    /// Rising edge latched. Switch to falling polarity.
    Rise,
    /// Falling edge latched. Restore rising polarity and mask the channel.
    Fall { echo_ticks: u16 },
    /// Edge arrived while the slot wasn't waiting. Ignored.
    Stray,
}

pub struct EchoCapture {
    phase: AtomicU8,
    rise: AtomicU16,
    fall: AtomicU16,
    strays: AtomicU16,
}

impl EchoCapture {
    pub const fn new() -> Self {
        Self {
            phase: AtomicU8::new(IDLE),
            rise: AtomicU16::new(0),
            fall: AtomicU16::new(0),
            strays: AtomicU16::new(0),
        }
    }

    /// Reset to `AwaitingRise`. Call with the channel's interrupt masked.
    pub fn arm(&self) {
        self.rise.store(0, Ordering::Relaxed);
        self.fall.store(0, Ordering::Relaxed);
        self.phase.store(AWAITING_RISE, Ordering::Release);
    }

    /// Drop whatever is in flight and go back to `Idle`.
    pub fn disarm(&self) {
        self.phase.store(IDLE, Ordering::Release);
    }

    /// Interrupt side. O(1), never blocks.
    pub fn on_edge(&self, captured: u16) -> EdgeOutcome {
        match self.phase.load(Ordering::Acquire) {
            AWAITING_RISE => {
                self.rise.store(captured, Ordering::Relaxed);
                self.phase.store(AWAITING_FALL, Ordering::Release);
                EdgeOutcome::Rise
            }
            AWAITING_FALL => {
                let rise = self.rise.load(Ordering::Relaxed);
                self.fall.store(captured, Ordering::Relaxed);
                self.phase.store(COMPLETE, Ordering::Release);
                EdgeOutcome::Fall {
                    echo_ticks: echo_ticks(rise, captured),
                }
            }
            _ => {
                self.strays.fetch_add(1, Ordering::Relaxed);
                EdgeOutcome::Stray
            }
        }
    }

    pub fn state(&self) -> CaptureState {
        match self.phase.load(Ordering::Acquire) {
            AWAITING_RISE => CaptureState::AwaitingRise,
            AWAITING_FALL => CaptureState::AwaitingFall {
                rise: self.rise.load(Ordering::Relaxed),
            },
            COMPLETE => CaptureState::Complete {
                rise: self.rise.load(Ordering::Relaxed),
                fall: self.fall.load(Ordering::Relaxed),
            },
            _ => CaptureState::Idle,
        }
    }

    /// If a full echo is latched, return its width in ticks and free the slot.
    pub fn take(&self) -> Option<u16> {
        if self.phase.load(Ordering::Acquire) != COMPLETE {
            return None;
        }
        let rise = self.rise.load(Ordering::Relaxed);
        let fall = self.fall.load(Ordering::Relaxed);
        self.phase.store(IDLE, Ordering::Release);
        Some(echo_ticks(rise, fall))
    }

    pub fn is_armed(&self) -> bool {
        matches!(
            self.phase.load(Ordering::Acquire),
            AWAITING_RISE | AWAITING_FALL
        )
    }

    /// Stray edges seen since the last call.
    pub fn take_strays(&self) -> u16 {
        self.strays.swap(0, Ordering::Relaxed)
    }
}

impl Default for EchoCapture {
    fn default() -> Self {
        Self::new()
    }
}

/// One capture slot per sensor. Lives in a `static` so the interrupt
/// handler can reach it.
pub struct CaptureBank {
    slots: [EchoCapture; Channel::COUNT],
}

impl CaptureBank {
    pub const fn new() -> Self {
        Self {
            slots: [EchoCapture::new(), EchoCapture::new(), EchoCapture::new()],
        }
    }

    #[inline]
    pub fn slot(&self, channel: Channel) -> &EchoCapture {
        &self.slots[channel.index()]
    }

    #[inline]
    pub fn on_edge(&self, channel: Channel, captured: u16) -> EdgeOutcome {
        self.slot(channel).on_edge(captured)
    }
}

impl Default for CaptureBank {
    fn default() -> Self {
        Self::new()
    }
}
