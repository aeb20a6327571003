//! L298N dual H-bridge: TIM3 PWM on the enable inputs, four GPIO direction
//! lines.
//!
//! | Wheel | Enable      | IN (fwd) | IN (rev) |
//! |-------|-------------|----------|----------|
//! | Right | TIM3 CH1 PA6 | IN1 PA4 | IN2 PB0 |
//! | Left  | TIM3 CH2 PA7 | IN3 PC1 | IN4 PC0 |

use core::convert::Infallible;

use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::peripherals::TIM3;
use embassy_stm32::timer::simple_pwm::SimplePwm;
use embassy_stm32::timer::Channel as PwmChannel;

use autonav::{Actuator, Direction, Wheel};

/// Command duties are expressed on this scale and mapped onto the timer's
/// real period.
pub const DUTY_FULL_SCALE: u16 = 1000;

struct HBridgeSide {
    pwm: PwmChannel,
    forward: Output<'static, AnyPin>,
    reverse: Output<'static, AnyPin>,
}

pub struct L298n {
    pwm: SimplePwm<'static, TIM3>,
    max_duty: u16,
    right: HBridgeSide,
    left: HBridgeSide,
}

impl L298n {
    /// `in1..in4` must start low so the motors are coasting until the first
    /// command.
    pub fn new(
        mut pwm: SimplePwm<'static, TIM3>,
        in1: Output<'static, AnyPin>,
        in2: Output<'static, AnyPin>,
        in3: Output<'static, AnyPin>,
        in4: Output<'static, AnyPin>,
    ) -> Self {
        let max_duty = pwm.get_max_duty();
        for ch in [PwmChannel::Ch1, PwmChannel::Ch2] {
            pwm.set_duty(ch, 0);
            pwm.enable(ch);
        }
        Self {
            pwm,
            max_duty,
            right: HBridgeSide {
                pwm: PwmChannel::Ch1,
                forward: in1,
                reverse: in2,
            },
            left: HBridgeSide {
                pwm: PwmChannel::Ch2,
                forward: in3,
                reverse: in4,
            },
        }
    }

    fn side(&mut self, wheel: Wheel) -> &mut HBridgeSide {
        match wheel {
            Wheel::Left => &mut self.left,
            Wheel::Right => &mut self.right,
        }
    }

    fn scale(&self, duty: u16) -> u16 {
        let duty = duty.min(DUTY_FULL_SCALE) as u32;
        (duty * self.max_duty as u32 / DUTY_FULL_SCALE as u32) as u16
    }
}

impl Actuator for L298n {
    type Error = Infallible;

    fn set_direction(&mut self, wheel: Wheel, direction: Direction) -> Result<(), Infallible> {
        let side = self.side(wheel);
        // Drop the active line first so the bridge never sees both high.
        match direction {
            Direction::Forward => {
                side.reverse.set_low();
                side.forward.set_high();
            }
            Direction::Backward => {
                side.forward.set_low();
                side.reverse.set_high();
            }
        }
        Ok(())
    }

    fn set_duty(&mut self, wheel: Wheel, duty: u16) -> Result<(), Infallible> {
        let raw = self.scale(duty);
        let ch = self.side(wheel).pwm;
        self.pwm.set_duty(ch, raw);
        Ok(())
    }
}
