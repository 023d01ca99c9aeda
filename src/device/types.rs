use std::fmt;
use btleplug::platform::Peripheral;

/// Opaque identifier of a discovered peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DeviceId {
    fn from(value: String) -> Self {
        DeviceId(value)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        DeviceId(value.to_string())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub id: DeviceId,
    pub name: String,
    pub rssi: Option<i16>,
    pub peripheral: Peripheral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable,
    NoPermission,
}

#[derive(Debug, Clone)]
pub enum DeviceEvent {
    AvailabilityChange(Availability),
    DeviceSeen(DiscoveredDevice),
    DiscoveryError(String),
    Disconnected(DeviceId),
}
