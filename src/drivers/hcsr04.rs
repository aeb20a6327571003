//! HC-SR04 echo capture on TIM4.
//!
//! | Sensor | Echo pin | TIM4 channel | Trigger pin |
//! |--------|----------|--------------|-------------|
//! | Right  | PB6      | CH1          | PC5         |
//! | Left   | PB7      | CH2          | PC8         |
//! | Center | PB8      | CH3          | PC6         |
//!
//! The timer free-runs at 1 MHz over the full 16-bit range. Each armed
//! channel waits for a rising edge, flips to falling, and masks itself once
//! the falling edge is latched into [`ECHO_BANK`].

use embassy_stm32::interrupt::{self, InterruptExt};
use embassy_stm32::pac;
use embassy_stm32::pac::gpio::vals::{Moder, Pupdr};
use embassy_stm32::pac::timer::vals::{CcmrInputCcs, FilterValue};
use embassy_stm32::peripherals;

use autonav::{CaptureBank, Channel};
use autonav::ranging::{CaptureControl, EdgeOutcome};

use crate::board::CAPTURE_PSC;

/// Capture slots shared with the TIM4 interrupt.
pub static ECHO_BANK: CaptureBank = CaptureBank::new();

/// Alternate function number of TIM4 on PB6..PB8.
const AF_TIM4: u8 = 2;
/// Input filter: fCK_INT, N=8. Rejects sub-µs glitches on long leads.
const INPUT_FILTER: u8 = 0b0011;
/// `(timer channel index, echo pin on GPIOB, sensor)`.
const ECHO_MAP: [(usize, usize, Channel); Channel::COUNT] = [
    (0, 6, Channel::Right),
    (1, 7, Channel::Left),
    (2, 8, Channel::Center),
];

const fn timer_index(channel: Channel) -> usize {
    match channel {
        Channel::Right => 0,
        Channel::Left => 1,
        Channel::Center => 2,
    }
}

fn set_falling(idx: usize, falling: bool) {
    pac::TIM4.ccer().modify(|w| {
        w.set_ccp(idx, falling);
        w.set_ccnp(idx, false);
    });
}

fn clear_flags(idx: usize) {
    pac::TIM4.sr().modify(|w| {
        w.set_ccif(idx, false);
        w.set_ccof(idx, false);
    });
}

/// Owns TIM4 and the three echo pins.
pub struct EchoTimer {
    _tim: peripherals::TIM4,
    _pins: (peripherals::PB6, peripherals::PB7, peripherals::PB8),
}

impl EchoTimer {
    pub fn new(
        tim: peripherals::TIM4,
        pb6: peripherals::PB6,
        pb7: peripherals::PB7,
        pb8: peripherals::PB8,
    ) -> Self {
        pac::RCC.apb1enr().modify(|w| w.set_tim4en(true));

        for (_, pin, _) in ECHO_MAP {
            pac::GPIOB.pupdr().modify(|w| w.set_pupdr(pin, Pupdr::FLOATING));
            pac::GPIOB.afr(pin / 8).modify(|w| w.set_afr(pin % 8, AF_TIM4));
            pac::GPIOB.moder().modify(|w| w.set_moder(pin, Moder::ALTERNATE));
        }

        let tim4 = pac::TIM4;
        tim4.cr1().modify(|w| w.set_cen(false));
        tim4.psc().write(|w| w.set_psc(CAPTURE_PSC));
        tim4.arr().write(|w| w.set_arr(u16::MAX));
        tim4.egr().write(|w| w.set_ug(true));

        for (idx, _, _) in ECHO_MAP {
            // CCxS = 01: capture on the channel's own input.
            tim4.ccmr_input(idx / 2).modify(|w| {
                w.set_ccs(idx % 2, CcmrInputCcs::from_bits(0b01));
                w.set_icf(idx % 2, FilterValue::from_bits(INPUT_FILTER));
            });
            tim4.ccer().modify(|w| {
                w.set_ccp(idx, false);
                w.set_ccnp(idx, false);
                w.set_cce(idx, true);
            });
            tim4.dier().modify(|w| w.set_ccie(idx, false));
            clear_flags(idx);
        }
        tim4.cr1().modify(|w| w.set_cen(true));

        interrupt::TIM4.unpend();
        unsafe { interrupt::TIM4.enable() };

        Self {
            _tim: tim,
            _pins: (pb6, pb7, pb8),
        }
    }
}

impl CaptureControl for EchoTimer {
    fn arm(&mut self, channel: Channel) {
        let idx = timer_index(channel);
        critical_section::with(|_| {
            set_falling(idx, false);
            clear_flags(idx);
            pac::TIM4.dier().modify(|w| w.set_ccie(idx, true));
        });
    }

    fn disarm(&mut self, channel: Channel) {
        let idx = timer_index(channel);
        critical_section::with(|_| {
            pac::TIM4.dier().modify(|w| w.set_ccie(idx, false));
            set_falling(idx, false);
            clear_flags(idx);
        });
    }
}

#[interrupt]
fn TIM4() {
    let tim4 = pac::TIM4;
    let sr = tim4.sr().read();
    let dier = tim4.dier().read();

    for (idx, _, channel) in ECHO_MAP {
        if !sr.ccif(idx) {
            continue;
        }
        // Reading CCR clears CCIF.
        let captured = tim4.ccr(idx).read().ccr();
        if !dier.ccie(idx) {
            continue;
        }
        match ECHO_BANK.on_edge(channel, captured) {
            EdgeOutcome::Rise => set_falling(idx, true),
            EdgeOutcome::Fall { .. } | EdgeOutcome::Stray => {
                tim4.dier().modify(|w| w.set_ccie(idx, false));
                set_falling(idx, false);
            }
        }
        tim4.sr().modify(|w| w.set_ccof(idx, false));
    }
}
