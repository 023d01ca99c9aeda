use serde::{Deserialize, Serialize};

/// Inclusive range of a control slider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliderBounds {
    pub min: u8,
    pub max: u8,
}

impl SliderBounds {
    pub const FULL: SliderBounds = SliderBounds { min: u8::MIN, max: u8::MAX };

    /// Swaps `min` and `max` if they were configured the wrong way around.
    pub fn normalized(self) -> SliderBounds {
        if self.min <= self.max {
            self
        } else {
            SliderBounds { min: self.max, max: self.min }
        }
    }

    pub fn clamp(&self, value: u8) -> u8 {
        let bounds = self.normalized();
        value.clamp(bounds.min, bounds.max)
    }
}

impl Default for SliderBounds {
    fn default() -> Self {
        SliderBounds::FULL
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub speed_range: SliderBounds,
    pub direction_range: SliderBounds,
    // minimum time between two writes caused by dragging a slider
    pub throttle_interval_ms: u64,
    pub scan_filter_services: bool,
}

impl Config {
    pub fn normalize(&mut self) {
        self.speed_range = self.speed_range.normalized();
        self.direction_range = self.direction_range.normalized();
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            speed_range: SliderBounds::FULL,
            direction_range: SliderBounds::FULL,
            throttle_interval_ms: 100,
            scan_filter_services: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let config: Config = serde_json::from_str(r#"{"throttleIntervalMs": 250}"#).unwrap();
        assert_eq!(config.throttle_interval_ms, 250);
        assert_eq!(config.speed_range, SliderBounds::FULL);
        assert!(config.scan_filter_services);
    }

    #[test]
    fn keys_are_camel_case() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["speedRange"]["max"], 255);
        assert_eq!(json["directionRange"]["min"], 0);
        assert_eq!(json["scanFilterServices"], true);
    }

    #[test]
    fn reversed_bounds_are_swapped() {
        let mut config = Config {
            speed_range: SliderBounds { min: 200, max: 20 },
            ..Config::default()
        };
        config.normalize();
        assert_eq!(config.speed_range, SliderBounds { min: 20, max: 200 });
    }

    #[test]
    fn clamp_never_panics_on_reversed_bounds() {
        let bounds = SliderBounds { min: 100, max: 10 };
        assert_eq!(bounds.clamp(0), 10);
        assert_eq!(bounds.clamp(255), 100);
        assert_eq!(bounds.clamp(50), 50);
    }
}
