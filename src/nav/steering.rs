use crate::actuator::Wheel;
use crate::config::SteeringConfig;

/// Duty reduction for one wheel, steering the vehicle toward that side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trim {
    pub wheel: Wheel,
    pub amount: u16,
}

/// PD trim on the left/right clearance difference, keeping the rover
/// centred between two walls.
pub struct SteeringController {
    kp: i32,
    kd: i32,
    dead_band: i32,
    max_trim: i32,
    prev_error: Option<i32>,
}

impl SteeringController {
    pub fn new(config: SteeringConfig) -> Self {
        Self {
            kp: config.kp_permille,
            kd: config.kd_permille,
            dead_band: config.dead_band_cm as i32,
            max_trim: config.max_trim as i32,
            prev_error: None,
        }
    }

    pub fn reset(&mut self) {
        self.prev_error = None;
    }

    /// `None` when no correction is needed. Call with both sides valid;
    /// pass `None` for a tick where one isn't, which also drops the
    /// derivative history.
    pub fn update(&mut self, sides: Option<(u16, u16)>) -> Option<Trim> {
        let Some((left, right)) = sides else {
            self.reset();
            return None;
        };

        // Positive: more room on the right, so turn right.
        let error = right as i32 - left as i32;
        let derivative = self.prev_error.map_or(0, |prev| error - prev);
        self.prev_error = Some(error);

        if error.abs() <= self.dead_band {
            return None;
        }

        let output = ((self.kp * error + self.kd * derivative) / 1000).clamp(-self.max_trim, self.max_trim);
        match output {
            0 => None,
            o if o > 0 => Some(Trim {
                wheel: Wheel::Right,
                amount: o as u16,
            }),
            o => Some(Trim {
                wheel: Wheel::Left,
                amount: (-o) as u16,
            }),
        }
    }
}
