use iced::Event;

use crate::config::types::Config;
use crate::device::types::{DeviceEvent, DeviceId};
use crate::gui::panel::SliderControl;

#[derive(Debug, Clone)]
pub enum CardAction {
    Slide(SliderControl, u8),
    Release,
    Standby,
    Brake,
    Disconnect,
    SendDaySetting,
    Read,
}

#[derive(Debug, Clone)]
pub enum HostCall {
    Connect,
    Disconnect,
    WriteCarState,
    WriteDaySetting,
}

impl std::fmt::Display for HostCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            HostCall::Connect => "connect",
            HostCall::Disconnect => "disconnect",
            HostCall::WriteCarState => "write car state",
            HostCall::WriteDaySetting => "write day setting",
        };

        write!(f, "{}", result)
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    EventOccurred(Event),
    ConfigLoadComplete((Config, Option<String>)),
    DeviceEvent(DeviceEvent),
    SelectDevice(DeviceId),
    Card(DeviceId, CardAction),
    // errors are stringified at the host call boundary
    HostCallComplete(DeviceId, HostCall, Result<(), String>),
    ReadComplete(DeviceId, Result<Vec<u8>, String>),
    NoticeConfirmed,
}
