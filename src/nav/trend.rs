use crate::config::TrendConfig;

const SMA_LEN: usize = 3;

/// Tracks how fast the front distance is changing.
///
/// Keeps a 3-sample moving average of the per-tick front delta and counts
/// consecutive ticks where that average says "closing fast" or "opening
/// fast". Nothing is reported until the average has three deltas behind it.
pub struct FrontTrend {
    fast_delta: i16,
    streak_needed: u8,
    prev: Option<u16>,
    deltas: [i16; SMA_LEN],
    idx: usize,
    warm: usize,
    close_streak: u8,
    open_streak: u8,
}

impl FrontTrend {
    pub fn new(config: &TrendConfig) -> Self {
        Self {
            fast_delta: config.fast_delta_cm.abs(),
            streak_needed: config.streak_ticks,
            prev: None,
            deltas: [0; SMA_LEN],
            idx: 0,
            warm: 0,
            close_streak: 0,
            open_streak: 0,
        }
    }

    pub fn reset(&mut self) {
        self.prev = None;
        self.deltas = [0; SMA_LEN];
        self.idx = 0;
        self.warm = 0;
        self.close_streak = 0;
        self.open_streak = 0;
    }

    /// Feed this tick's front distance. Unknown readings leave the tracker as is.
    pub fn update(&mut self, front: Option<u16>) {
        let Some(front) = front else {
            return;
        };
        let Some(prev) = self.prev.replace(front) else {
            return;
        };

        let delta = (front as i32 - prev as i32).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        self.deltas[self.idx] = delta;
        self.idx = (self.idx + 1) % SMA_LEN;
        if self.warm < SMA_LEN {
            self.warm += 1;
        }

        let ready = self.is_ready();
        let avg = self.average();
        self.close_streak = if ready && avg <= -self.fast_delta {
            self.close_streak.saturating_add(1)
        } else {
            0
        };
        self.open_streak = if ready && avg >= self.fast_delta {
            self.open_streak.saturating_add(1)
        } else {
            0
        };
    }

    pub fn is_ready(&self) -> bool {
        self.warm >= SMA_LEN
    }

    /// Average delta per tick in cm, truncated toward zero.
    pub fn average(&self) -> i16 {
        let sum: i32 = self.deltas.iter().map(|&d| d as i32).sum();
        (sum / SMA_LEN as i32) as i16
    }

    pub fn closing_fast(&self) -> bool {
        self.close_streak >= self.streak_needed
    }

    pub fn opening_fast(&self) -> bool {
        self.open_streak >= self.streak_needed
    }
}
