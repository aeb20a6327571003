use embassy_executor::task;
use embassy_stm32::gpio::{AnyPin, Output};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Delay, Duration, Ticker};

use autonav::{Autopilot, Telemetry, TimeSource};

use crate::board::MonoClock;
use crate::drivers::hcsr04::EchoTimer;
use crate::drivers::l298n::L298n;

// ── Loop parameters ───────────────────────────────────────────────────────────

/// Control period: 20 ms.
pub const CONTROL_LOOP_HZ: u64 = 50;

pub type RoverAutopilot = Autopilot<'static, EchoTimer, Output<'static, AnyPin>, Delay, L298n>;

// ── Task ─────────────────────────────────────────────────────────────────────

#[task]
pub async fn control_loop_task(
    mut autopilot: RoverAutopilot,
    telemetry_tx: Sender<'static, CriticalSectionRawMutex, Telemetry, 1>,
) {
    let clock = MonoClock;
    let mut ticker = Ticker::every(Duration::from_hz(CONTROL_LOOP_HZ));

    autopilot.start(clock.now());

    loop {
        ticker.next().await;

        // Both halves see the same instant.
        let now = clock.now();
        autopilot.ranging_tick(now);
        let telemetry = autopilot.navigation_tick(now);

        // Cap=1: if the telemetry task hasn't taken the last one, skip.
        let _ = telemetry_tx.try_send(telemetry);
    }
}
