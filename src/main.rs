#![no_std]
#![no_main]

mod board;
mod drivers;
mod tasks;
mod usb;

use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, OutputType, Pin, Speed};
use embassy_stm32::time::khz;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_stm32::timer::CountingMode;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Delay, Duration, Timer};
use {defmt_rtt as _, panic_probe as _};

use autonav::{Autopilot, NavConfig, NavigationController, Ranging, RangingConfig, Telemetry};

use crate::board::Board;
use crate::drivers::hcsr04::{EchoTimer, ECHO_BANK};
use crate::drivers::l298n::L298n;
use crate::tasks::control_loop::control_loop_task;
use crate::tasks::telemetry_task::telemetry_task;

// ── Field tuning ──────────────────────────────────────────────────────────────
const GUARD_MS: u32 = 40;
const FILTER_WINDOW: usize = 3;
const MOTOR_PWM_KHZ: u32 = 1;

// ── Inter-task channels ───────────────────────────────────────────────────────
//  Cap=1: the telemetry task only ever wants the latest record.
static TELEMETRY_CHAN: Channel<CriticalSectionRawMutex, Telemetry, 1> = Channel::new();

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (168 MHz PLL)
    let board = Board::init();
    let p = board.p;

    // 2. USB (CDC-ACM for debug)
    let (usb_dev, usb_serial) = usb::init(p.USB_OTG_FS, p.PA12, p.PA11, "autonav rover");
    spawner.must_spawn(usb::usb_task(usb_dev));

    // 3. Motors: TIM3 CH1 (PA6) right, CH2 (PA7) left; IN1..IN4 low = coast
    let pwm = SimplePwm::new(
        p.TIM3,
        Some(PwmPin::new_ch1(p.PA6, OutputType::PushPull)),
        Some(PwmPin::new_ch2(p.PA7, OutputType::PushPull)),
        None,
        None,
        khz(MOTOR_PWM_KHZ),
        CountingMode::EdgeAlignedUp,
    );
    let motors = L298n::new(
        pwm,
        Output::new(p.PA4.degrade(), Level::Low, Speed::Low),
        Output::new(p.PB0.degrade(), Level::Low, Speed::Low),
        Output::new(p.PC1.degrade(), Level::Low, Speed::Low),
        Output::new(p.PC0.degrade(), Level::Low, Speed::Low),
    );

    // 4. Ultrasonic: TIM4 capture on PB6/PB7/PB8, triggers [left, right, center]
    let echo_timer = EchoTimer::new(p.TIM4, p.PB6, p.PB7, p.PB8);
    let triggers = [
        Output::new(p.PC8.degrade(), Level::Low, Speed::Low),
        Output::new(p.PC5.degrade(), Level::Low, Speed::Low),
        Output::new(p.PC6.degrade(), Level::Low, Speed::Low),
    ];

    // 5. Configuration (invalid tuning falls back to defaults, logged)
    let ranging_config = RangingConfig {
        guard_ms: GUARD_MS,
        window: FILTER_WINDOW,
        ..RangingConfig::default()
    }
    .or_default();
    let nav_config = NavConfig::default().or_default();
    defmt::info!("ranging {}", ranging_config);
    defmt::info!("nav {}", nav_config);

    // 6. Heartbeat LED (PC13)
    let mut led = Output::new(p.PC13, Level::High, Speed::Low);

    // 7. Let the sensors settle before the first ping
    Timer::after(Duration::from_millis(100)).await;

    let ranging = Ranging::new(&ECHO_BANK, echo_timer, triggers, Delay, ranging_config);
    let autopilot = Autopilot::new(ranging, NavigationController::new(nav_config), motors);

    // 8. Spawn tasks
    spawner.must_spawn(control_loop_task(autopilot, TELEMETRY_CHAN.sender()));
    spawner.must_spawn(telemetry_task(usb_serial, TELEMETRY_CHAN.receiver()));

    // 9. Main task: LED heartbeat @ 1 Hz
    loop {
        led.toggle();
        Timer::after(Duration::from_millis(500)).await;
    }
}
