use core::fmt::{self, Write};

use embassy_executor::task;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_time::{Duration, Ticker, Timer};

use autonav::{NavState, Telemetry};

use crate::usb::{self, UsbSerial};

const USB_DEBUG_ENABLED: bool = true;
const TELEMETRY_HZ: u64 = 10;
/// A host that stops reading must not wedge the task.
const WRITE_TIMEOUT: Duration = Duration::from_millis(50);

/// `Option<u16>` distance, `-` when unknown.
struct Cm(Option<u16>);

impl fmt::Display for Cm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(cm) => write!(f, "{}", cm),
            None => f.write_str("-"),
        }
    }
}

async fn send(usb_serial: &mut UsbSerial<'static>, line: &[u8]) -> bool {
    match select(usb::write_line(usb_serial, line), Timer::after(WRITE_TIMEOUT)).await {
        Either::First(()) => true,
        Either::Second(()) => false,
    }
}

/// Telemetry task, 10 Hz.
/// Takes the latest control-loop record and prints it over USB CDC.
#[task]
pub async fn telemetry_task(
    mut usb_serial: UsbSerial<'static>,
    telemetry_rx: Receiver<'static, CriticalSectionRawMutex, Telemetry, 1>,
) {
    let mut tick: u32 = 0;
    let mut latest: Option<Telemetry> = None;
    let mut last_state: Option<NavState> = None;
    let mut dropped: u32 = 0;

    let mut ticker = Ticker::every(Duration::from_hz(TELEMETRY_HZ));

    loop {
        ticker.next().await;
        tick = tick.wrapping_add(1);

        if let Ok(t) = telemetry_rx.try_receive() {
            latest = Some(t);
        }
        let Some(t) = latest else {
            continue;
        };

        // State changes are worth a line of their own even between reports.
        let state_changed = last_state.map_or(true, |s| s.name() != t.state.name());
        if state_changed {
            last_state = Some(t.state);
            defmt::info!("telemetry: state {}", t.state);
        }

        if !USB_DEBUG_ENABLED || !usb_serial.dtr() {
            continue;
        }

        // ── Ranges + command (every tick) ────────────────────────────────────
        let mut m = heapless::String::<128>::new();
        let _ = write!(
            m,
            "[NAV] {} L={} C={} R={} cmd={:?} {}/{}\r\n",
            t.state.name(),
            Cm(t.snapshot.left),
            Cm(t.snapshot.center),
            Cm(t.snapshot.right),
            t.command.motion,
            t.command.left_duty,
            t.command.right_duty,
        );
        if !send(&mut usb_serial, m.as_bytes()).await {
            dropped = dropped.wrapping_add(1);
        }

        // ── Ranging counters (every second) ──────────────────────────────────
        if tick % TELEMETRY_HZ as u32 == 0 {
            let s = t.stats;
            let mut m = heapless::String::<128>::new();
            let _ = write!(
                m,
                "[RNG] ok={} timeout={} oor={} stray={} frames={} usb_drop={}\r\n",
                s.samples, s.timeouts, s.out_of_range, s.strays, s.frames, dropped,
            );
            if !send(&mut usb_serial, m.as_bytes()).await {
                dropped = dropped.wrapping_add(1);
            }
        }
    }
}
