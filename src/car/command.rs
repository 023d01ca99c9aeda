use crate::config::types::SliderBounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Brake {
    Released = 0,
    Engaged = 1,
}

/// A single write to the car-control characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarCommand {
    pub speed: u8,
    pub direction: u8,
    pub brake: Brake,
}

impl CarCommand {
    pub fn drive(speed: u8, direction: u8, speed_range: SliderBounds, direction_range: SliderBounds) -> CarCommand {
        CarCommand {
            speed: speed_range.clamp(speed),
            direction: direction_range.clamp(direction),
            brake: Brake::Released,
        }
    }

    pub fn standby() -> CarCommand {
        CarCommand { speed: 0, direction: 0, brake: Brake::Released }
    }

    pub fn brake() -> CarCommand {
        CarCommand { speed: 0, direction: 0, brake: Brake::Engaged }
    }

    /// Wire layout is `[speed, direction, brake]`.
    pub fn to_bytes(&self) -> [u8; 3] {
        [self.speed, self.direction, self.brake as u8]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_clamps_to_slider_bounds() {
        let speed = SliderBounds { min: 10, max: 200 };
        let direction = SliderBounds { min: 30, max: 90 };

        assert_eq!(CarCommand::drive(255, 0, speed, direction).to_bytes(), [200, 30, 0]);
        assert_eq!(CarCommand::drive(0, 255, speed, direction).to_bytes(), [10, 90, 0]);
        assert_eq!(CarCommand::drive(50, 60, speed, direction).to_bytes(), [50, 60, 0]);
    }

    #[test]
    fn standby_and_brake_differ_only_in_the_last_byte() {
        assert_eq!(CarCommand::standby().to_bytes(), [0, 0, 0]);
        assert_eq!(CarCommand::brake().to_bytes(), [0, 0, 1]);
    }
}
