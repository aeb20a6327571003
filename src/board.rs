use embassy_stm32::rcc::*;
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::Config;
use embassy_time::Instant;

use autonav::{TimeSource, Timestamp};

/// APB1 timer clock: 168 MHz / 4 * 2.
pub const APB1_TIMER_HZ: u32 = 84_000_000;
/// Capture timer prescaler for a 1 µs tick.
pub const CAPTURE_PSC: u16 = (APB1_TIMER_HZ / 1_000_000 - 1) as u16;

pub struct Board {
    pub p: embassy_stm32::Peripherals,
}

impl Board {
    pub fn init() -> Self {
        let mut config = Config::default();
        config.rcc.hse = Some(Hse {
            freq: TimeHertz(8_000_000),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL168,
            divp: Some(PllPDiv::DIV2), // 168 MHz
            divq: Some(PllQDiv::DIV7), // 48 MHz USB
            divr: None,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;

        let p = embassy_stm32::init(config);

        Self { p }
    }
}

/// Millisecond clock backed by the embassy time driver (TIM2).
#[derive(Clone, Copy, Default)]
pub struct MonoClock;

impl TimeSource for MonoClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(Instant::now().as_millis() as u32)
    }
}
