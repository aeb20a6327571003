#![no_std]
#![no_main]

//! # range_check: ranging bench firmware
//!
//! Runs only the ultrasonic pipeline (motors stay unpowered) and streams one
//! CSV line per control period over USB CDC-ACM, for tuning the filter
//! window and the guard interval against a real room.
//!
//! ## Usage
//! ```sh
//! cargo run --release --features firmware --bin range_check
//! cat /dev/ttyACM0 > ranges.csv
//! ```
//!
//! ## CSV format
//! `ts_ms,left_raw,center_raw,right_raw,left_f,center_f,right_f`
//!
//! Distances in cm. An empty field means no sample yet (raw) or a stale
//! channel (filtered). Lines starting with `#` are comments.

// ── Modules (explicit paths from src/bin/) ────────────────────────────────────
#[path = "../board.rs"]   mod board;
#[path = "../usb.rs"]     mod usb;
#[path = "../drivers/mod.rs"]
mod drivers {
    #[path = "hcsr04.rs"] pub mod hcsr04;
}

use core::fmt::{self, Write};
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Pin, Speed};
use embassy_time::{Delay, Duration, Instant, Ticker, Timer};
use {defmt_rtt as _, panic_probe as _};

use autonav::config::{FilterMode, TriggerPattern};
use autonav::{Channel, Ranging, RangingConfig, TimeSource};

use crate::board::{Board, MonoClock};
use crate::drivers::hcsr04::{EchoTimer, ECHO_BANK};

// ── Parameters ────────────────────────────────────────────────────────────────

/// One line per 20 ms period, same cadence as the rover loop.
const SAMPLE_RATE_HZ: u64 = 50;
/// `# stats` comment line every this many periods.
const STATS_EVERY: u32 = 250;

const GUARD_MS: u32 = 40;
const FILTER_WINDOW: usize = 3;
const FILTER_MODE: FilterMode = FilterMode::Median;
const PATTERN: TriggerPattern = TriggerPattern::CenterInterleaved;

/// Empty CSV field for `None`.
struct Field(Option<u16>);

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{}", v),
            None => Ok(()),
        }
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let board = Board::init();
    let p = board.p;

    // USB CDC
    let (usb_dev, mut usb_serial) = usb::init(p.USB_OTG_FS, p.PA12, p.PA11, "autonav range_check");
    spawner.must_spawn(usb::usb_task(usb_dev));

    // LED (PC13)
    let mut led = Output::new(p.PC13, Level::High, Speed::Low);

    // Motor enables held low: TIM3 is never started here.
    let _ena = Output::new(p.PA6, Level::Low, Speed::Low);
    let _enb = Output::new(p.PA7, Level::Low, Speed::Low);

    let echo_timer = EchoTimer::new(p.TIM4, p.PB6, p.PB7, p.PB8);
    let triggers = [
        Output::new(p.PC8.degrade(), Level::Low, Speed::Low),
        Output::new(p.PC5.degrade(), Level::Low, Speed::Low),
        Output::new(p.PC6.degrade(), Level::Low, Speed::Low),
    ];

    let config = RangingConfig {
        guard_ms: GUARD_MS,
        window: FILTER_WINDOW,
        filter_mode: FILTER_MODE,
        pattern: PATTERN,
        ..RangingConfig::default()
    }
    .or_default();
    let mut ranging = Ranging::new(&ECHO_BANK, echo_timer, triggers, Delay, config);

    // ── Wait for a host (max 30 s, then start anyway) ─────────────────────────
    for _ in 0..300u32 {
        led.toggle();
        Timer::after(Duration::from_millis(100)).await;
        if usb_serial.dtr() {
            break;
        }
    }
    led.set_high();

    // ── CSV header ────────────────────────────────────────────────────────────
    {
        let mut hdr = heapless::String::<192>::new();
        let _ = write!(
            hdr,
            "# autonav range_check | guard={}ms window={} mode={:?} pattern={:?}\r\n\
             ts_ms,left_raw,center_raw,right_raw,left_f,center_f,right_f\r\n",
            config.guard_ms, config.window, config.filter_mode, config.pattern,
        );
        usb::write_line(&mut usb_serial, hdr.as_bytes()).await;
    }

    // ── Acquisition loop ──────────────────────────────────────────────────────
    let clock = MonoClock;
    let start = Instant::now();
    let mut ticker = Ticker::every(Duration::from_hz(SAMPLE_RATE_HZ));
    let mut n: u32 = 0;

    loop {
        ticker.next().await;

        let now = clock.now();
        let snapshot = ranging.ranging_tick(now);

        let mut line = heapless::String::<96>::new();
        let _ = write!(
            line,
            "{},{},{},{},{},{},{}\r\n",
            start.elapsed().as_millis(),
            Field(ranging.last_raw(Channel::Left)),
            Field(ranging.last_raw(Channel::Center)),
            Field(ranging.last_raw(Channel::Right)),
            Field(snapshot.left),
            Field(snapshot.center),
            Field(snapshot.right),
        );
        usb::write_line(&mut usb_serial, line.as_bytes()).await;

        n = n.wrapping_add(1);

        // LED 1 Hz
        if n % SAMPLE_RATE_HZ as u32 == 0 {
            led.toggle();
        }

        if n % STATS_EVERY == 0 {
            let s = ranging.stats();
            let mut msg = heapless::String::<96>::new();
            let _ = write!(
                msg,
                "# ok={} timeout={} oor={} stray={} frames={}\r\n",
                s.samples, s.timeouts, s.out_of_range, s.strays, s.frames,
            );
            usb::write_line(&mut usb_serial, msg.as_bytes()).await;
        }
    }
}
