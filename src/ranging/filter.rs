use heapless::Deque;

use crate::config::{FilterMode, RangingConfig};
use crate::error::{ConfigError, RangingError};
use crate::state::Channel;
use crate::time::Timestamp;

/// Longest supported history per channel.
pub const MAX_WINDOW: usize = 5;

/// Insertion sort on a small copy, then the middle element.
/// For even `n` this is the upper of the two middle values.
fn median_of(samples: &[u16]) -> u16 {
    let n = samples.len().min(MAX_WINDOW);
    let mut buf = [0u16; MAX_WINDOW];
    buf[..n].copy_from_slice(&samples[..n]);

    for i in 1..n {
        let key = buf[i];
        let mut j = i;
        while j > 0 && buf[j - 1] > key {
            buf[j] = buf[j - 1];
            j -= 1;
        }
        buf[j] = key;
    }
    buf[n / 2]
}

fn rounded_mean(samples: &[u16]) -> u16 {
    let n = samples.len() as u32;
    let sum: u32 = samples.iter().map(|&s| s as u32).sum();
    ((sum + n / 2) / n) as u16
}

struct History {
    samples: Deque<u16, MAX_WINDOW>,
    last_update: Option<Timestamp>,
}

impl History {
    const fn new() -> Self {
        Self {
            samples: Deque::new(),
            last_update: None,
        }
    }
}

/// Per-channel smoothing with out-of-band rejection and staleness.
pub struct RangeFilter {
    mode: FilterMode,
    window: usize,
    stale_ms: u32,
    min_cm: u16,
    max_cm: u16,
    history: [History; Channel::COUNT],
}

impl RangeFilter {
    pub fn new(config: &RangingConfig) -> Self {
        Self {
            mode: config.filter_mode,
            window: config.window.clamp(1, MAX_WINDOW),
            stale_ms: config.stale_ms,
            min_cm: config.min_valid_cm,
            max_cm: config.max_valid_cm,
            history: [History::new(), History::new(), History::new()],
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Change the history length at runtime. Older samples beyond the new
    /// length are dropped.
    pub fn set_window(&mut self, window: usize) -> Result<(), ConfigError> {
        if window == 0 || window > MAX_WINDOW {
            return Err(ConfigError::BadWindow(window));
        }
        self.window = window;
        for h in self.history.iter_mut() {
            while h.samples.len() > window {
                h.samples.pop_front();
            }
        }
        Ok(())
    }

    pub fn set_mode(&mut self, mode: FilterMode) {
        self.mode = mode;
    }

    /// Feed one raw distance. Out-of-band values leave the channel untouched.
    pub fn push(&mut self, channel: Channel, raw_cm: u16, now: Timestamp) -> Result<u16, RangingError> {
        if raw_cm < self.min_cm || raw_cm > self.max_cm {
            return Err(RangingError::OutOfRangeSample { channel, cm: raw_cm });
        }

        let window = self.window;
        let h = &mut self.history[channel.index()];
        while h.samples.len() >= window {
            h.samples.pop_front();
        }
        // Room was made above.
        let _ = h.samples.push_back(raw_cm.min(self.max_cm));
        h.last_update = Some(now);

        Ok(self.statistic(channel).unwrap_or(raw_cm))
    }

    /// Filtered distance, or `None` if the channel has nothing recent.
    pub fn read(&self, channel: Channel, now: Timestamp) -> Option<u16> {
        if self.is_stale(channel, now) {
            return None;
        }
        self.statistic(channel)
    }

    pub fn is_stale(&self, channel: Channel, now: Timestamp) -> bool {
        match self.history[channel.index()].last_update {
            Some(at) => now.millis_since(at) > self.stale_ms,
            None => true,
        }
    }

    pub fn reset(&mut self) {
        for h in self.history.iter_mut() {
            h.samples.clear();
            h.last_update = None;
        }
    }

    fn statistic(&self, channel: Channel) -> Option<u16> {
        let h = &self.history[channel.index()];
        if h.samples.is_empty() {
            return None;
        }
        let mut buf = [0u16; MAX_WINDOW];
        let mut n = 0;
        for &s in h.samples.iter() {
            buf[n] = s;
            n += 1;
        }
        let value = match self.mode {
            FilterMode::Median => median_of(&buf[..n]),
            FilterMode::Mean => rounded_mean(&buf[..n]),
        };
        Some(value.min(self.max_cm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u32) -> Timestamp {
        Timestamp::from_millis(v)
    }

    fn filter() -> RangeFilter {
        RangeFilter::new(&RangingConfig::default())
    }

    #[test]
    fn median_window_of_three() {
        let mut f = filter();
        assert_eq!(f.push(Channel::Center, 42, ms(0)), Ok(42));
        assert_eq!(f.push(Channel::Center, 40, ms(40)), Ok(42));
        assert_eq!(f.push(Channel::Center, 400, ms(80)), Ok(42));
        // 42 evicted: {40, 400, 41}
        assert_eq!(f.push(Channel::Center, 41, ms(120)), Ok(41));
        assert_eq!(f.read(Channel::Center, ms(120)), Some(41));
    }

    #[test]
    fn out_of_band_samples_keep_previous_value() {
        let mut f = filter();
        f.push(Channel::Left, 120, ms(0)).unwrap();

        assert_eq!(
            f.push(Channel::Left, 1, ms(10)),
            Err(RangingError::OutOfRangeSample { channel: Channel::Left, cm: 1 })
        );
        assert_eq!(
            f.push(Channel::Left, 500, ms(20)),
            Err(RangingError::OutOfRangeSample { channel: Channel::Left, cm: 500 })
        );
        assert_eq!(f.read(Channel::Left, ms(20)), Some(120));
    }

    #[test]
    fn rejected_samples_do_not_refresh_staleness() {
        let cfg = RangingConfig {
            stale_ms: 100,
            ..RangingConfig::default()
        };
        let mut f = RangeFilter::new(&cfg);
        f.push(Channel::Right, 80, ms(0)).unwrap();
        let _ = f.push(Channel::Right, 999, ms(90));
        assert_eq!(f.read(Channel::Right, ms(150)), None);
    }

    #[test]
    fn stale_channel_reads_as_unknown() {
        let cfg = RangingConfig {
            stale_ms: 100,
            ..RangingConfig::default()
        };
        let mut f = RangeFilter::new(&cfg);
        f.push(Channel::Center, 75, ms(0)).unwrap();
        assert_eq!(f.read(Channel::Center, ms(100)), Some(75));
        assert_eq!(f.read(Channel::Center, ms(150)), None);
        assert!(f.is_stale(Channel::Center, ms(150)));
    }

    #[test]
    fn empty_channel_is_unknown() {
        let f = filter();
        assert_eq!(f.read(Channel::Left, ms(0)), None);
    }

    #[test]
    fn mean_mode_rounds() {
        let mut f = filter();
        f.set_mode(FilterMode::Mean);
        f.push(Channel::Left, 10, ms(0)).unwrap();
        f.push(Channel::Left, 11, ms(1)).unwrap();
        // (10 + 11) / 2 = 10.5 -> 11
        assert_eq!(f.read(Channel::Left, ms(1)), Some(11));
        f.push(Channel::Left, 11, ms(2)).unwrap();
        // 32 / 3 = 10.67 -> 11
        assert_eq!(f.read(Channel::Left, ms(2)), Some(11));
    }

    #[test]
    fn window_can_shrink_and_grow_at_runtime() {
        let mut f = filter();
        for (i, v) in [50, 60, 70].into_iter().enumerate() {
            f.push(Channel::Right, v, ms(i as u32)).unwrap();
        }
        f.set_window(1).unwrap();
        assert_eq!(f.read(Channel::Right, ms(3)), Some(70));

        f.set_window(5).unwrap();
        for v in [10, 90, 20, 80] {
            f.push(Channel::Right, v, ms(4)).unwrap();
        }
        // {70, 10, 90, 20, 80} -> sorted 10 20 70 80 90
        assert_eq!(f.read(Channel::Right, ms(4)), Some(70));

        assert_eq!(f.set_window(6), Err(ConfigError::BadWindow(6)));
        assert_eq!(f.window(), 5);
    }

    #[test]
    fn median_of_even_count_takes_upper_middle() {
        assert_eq!(median_of(&[30, 10]), 30);
        assert_eq!(median_of(&[4, 1, 3, 2]), 3);
        assert_eq!(median_of(&[7]), 7);
    }
}
