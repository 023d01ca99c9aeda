//! State of the control panel, independent of the widgets that render it.
//!
//! All device bookkeeping happens here: the discovered device list, the connection registry, one
//! card per device that was ever selected, and the on-screen log. The iced application turns the
//! outcomes of these methods into host calls.

use std::fmt;
use std::time::{Duration, Instant};
use indexmap::IndexMap;

use crate::car::command::CarCommand;
use crate::car::throttle::Throttle;
use crate::config::types::Config;
use crate::device::registry::DeviceRegistry;
use crate::device::types::DeviceId;
use crate::gui::log_box::LogBox;
use crate::gui::types::HostCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            ConnectionStatus::Connecting => "Connecting…",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Error => "Error",
        };

        write!(f, "{}", result)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliderControl {
    Speed,
    Direction,
}

#[derive(Debug, Clone)]
pub struct DeviceListEntry {
    pub id: DeviceId,
    pub name: String,
    pub rssi: Option<i16>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct DeviceCard {
    pub id: DeviceId,
    pub name: String,
    pub status: ConnectionStatus,
    pub speed: u8,
    pub direction: u8,
    throttle: Throttle,
}

impl DeviceCard {
    fn new(id: DeviceId, name: String, throttle_interval: Duration) -> Self {
        DeviceCard {
            id,
            name,
            status: ConnectionStatus::Connecting,
            speed: 0,
            direction: 0,
            throttle: Throttle::new(throttle_interval),
        }
    }

    pub fn controls_visible(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Connect,
    AlreadyConnected,
    UnknownDevice,
}

#[derive(Debug)]
pub struct Panel {
    config: Config,
    registry: DeviceRegistry,
    entries: IndexMap<DeviceId, DeviceListEntry>,
    cards: IndexMap<DeviceId, DeviceCard>,
    log: LogBox,
}

impl Panel {
    pub fn new(config: Config) -> Self {
        Panel {
            config,
            registry: DeviceRegistry::default(),
            entries: IndexMap::new(),
            cards: IndexMap::new(),
            log: LogBox::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// New bounds apply to the next command, the throttle interval to cards created afterwards.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn log(&mut self, text: impl AsRef<str>) {
        self.log.push(text);
    }

    pub fn log_box(&self) -> &LogBox {
        &self.log
    }

    pub fn entries(&self) -> impl Iterator<Item = &DeviceListEntry> {
        self.entries.values()
    }

    pub fn cards(&self) -> impl Iterator<Item = &DeviceCard> {
        self.cards.values()
    }

    pub fn card(&self, id: &DeviceId) -> Option<&DeviceCard> {
        self.cards.get(id)
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    fn device_name(&self, id: &DeviceId) -> String {
        self.entries.get(id)
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Returns true if the device was not seen before.
    pub fn device_seen(&mut self, id: &DeviceId, name: &str, rssi: Option<i16>) -> bool {
        if !self.registry.discover(id) {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.rssi = rssi;
            }
            return false;
        }

        self.log.push(format!("Device found: {}", name));
        self.entries.insert(id.clone(), DeviceListEntry {
            id: id.clone(),
            name: name.to_string(),
            rssi,
            active: false,
        });
        true
    }

    pub fn select(&mut self, id: &DeviceId) -> SelectOutcome {
        let Some(entry) = self.entries.get_mut(id) else {
            self.log.push("No devices found. You must request a device first.");
            return SelectOutcome::UnknownDevice;
        };
        entry.active = true;
        let name = entry.name.clone();
        self.log.push(format!("Device selected: {}", name));

        if !self.registry.begin_connect(id) {
            self.log.push("Already connected to this device.");
            return SelectOutcome::AlreadyConnected;
        }

        // a reconnect replaces the stale card, moving it to the end
        self.cards.shift_remove(id);
        let throttle_interval = Duration::from_millis(self.config.throttle_interval_ms);
        self.cards.insert(id.clone(), DeviceCard::new(id.clone(), name.clone(), throttle_interval));
        self.log.push(format!("Device card initialized: {}", name));

        self.log.push(format!("Connecting {}", name));
        SelectOutcome::Connect
    }

    pub fn connect_finished(&mut self, id: &DeviceId, result: Result<(), String>) {
        let name = self.device_name(id);

        match result {
            Ok(()) => {
                self.log.push(format!("Connected to {}", name));
                self.registry.connect_succeeded(id);
                self.set_status(id, ConnectionStatus::Connected);
            },
            Err(err) => {
                self.log.push(format!("ERROR on connect({}): {}", id, err));
                self.registry.connect_failed(id);
                self.set_status(id, ConnectionStatus::Error);
                self.deactivate_entry(id);
            },
        }
    }

    /// Handles both the disconnect button and a connection loss noticed by the watch.
    pub fn disconnected(&mut self, id: &DeviceId) {
        // a late report must not touch a card that is already reconnecting
        let was_connected = matches!(
            self.cards.get(id).map(|card| card.status),
            Some(ConnectionStatus::Connected)
        );
        if !was_connected {
            return;
        }

        self.registry.disconnected(id);

        self.log.push(format!("Disconnected from {}", self.device_name(id)));
        self.set_status(id, ConnectionStatus::Disconnected);
        self.deactivate_entry(id);
    }

    /// Routes the result of a host call. Returns a notice for the user if the failure needs one.
    pub fn host_call_finished(&mut self, id: &DeviceId, call: HostCall, result: Result<(), String>) -> Option<String> {
        match (call, result) {
            (HostCall::Connect, result) => {
                let notice = result.as_ref().err().map(|err| format!("Failed to connect to {}: {}", id, err));
                self.connect_finished(id, result);
                notice
            },
            (HostCall::Disconnect, Ok(())) => {
                self.disconnected(id);
                None
            },
            (call, Err(err)) => {
                self.log.push(format!("ERROR on {}({}): {}", call, id, err));
                None
            },
            (_, Ok(())) => None,
        }
    }

    fn set_status(&mut self, id: &DeviceId, status: ConnectionStatus) {
        if let Some(card) = self.cards.get_mut(id) {
            card.status = status;
        }
    }

    fn deactivate_entry(&mut self, id: &DeviceId) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.active = false;
        }
    }

    fn drive_command(&mut self, id: &DeviceId) -> Option<CarCommand> {
        let card = self.cards.get(id)?;
        let command = CarCommand::drive(card.speed, card.direction, self.config.speed_range, self.config.direction_range);
        self.log_command(&command);
        Some(command)
    }

    fn log_command(&mut self, command: &CarCommand) {
        self.log.push(format!("{} {} {}", command.direction, command.speed, command.brake as u8));
    }

    /// Slider drag. Returns a command at most once per throttle interval.
    pub fn slider_input(&mut self, id: &DeviceId, control: SliderControl, value: u8, now: Instant) -> Option<CarCommand> {
        let speed_range = self.config.speed_range;
        let direction_range = self.config.direction_range;
        let card = self.cards.get_mut(id)?;

        match control {
            SliderControl::Speed => card.speed = speed_range.clamp(value),
            SliderControl::Direction => card.direction = direction_range.clamp(value),
        }

        if !card.throttle.ready(now) {
            return None;
        }
        self.drive_command(id)
    }

    /// Slider release, never throttled.
    pub fn slider_release(&mut self, id: &DeviceId) -> Option<CarCommand> {
        self.drive_command(id)
    }

    pub fn standby(&mut self, id: &DeviceId) -> Option<CarCommand> {
        self.stop(id, CarCommand::standby())
    }

    pub fn brake(&mut self, id: &DeviceId) -> Option<CarCommand> {
        self.stop(id, CarCommand::brake())
    }

    fn stop(&mut self, id: &DeviceId, command: CarCommand) -> Option<CarCommand> {
        let card = self.cards.get_mut(id)?;
        card.speed = 0;
        card.direction = 0;
        self.log_command(&command);
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::car::command::Brake;
    use crate::config::types::SliderBounds;

    fn id() -> DeviceId {
        DeviceId::from("car-1")
    }

    fn connected_panel() -> Panel {
        let mut panel = Panel::new(Config::default());
        panel.device_seen(&id(), "RC car", Some(-60));
        assert_eq!(panel.select(&id()), SelectOutcome::Connect);
        panel.connect_finished(&id(), Ok(()));
        panel
    }

    #[test]
    fn known_device_only_updates_rssi() {
        let mut panel = Panel::new(Config::default());

        assert!(panel.device_seen(&id(), "RC car", Some(-70)));
        assert!(!panel.device_seen(&id(), "RC car", Some(-40)));

        let entries: Vec<&DeviceListEntry> = panel.entries().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rssi, Some(-40));
        assert_eq!(panel.registry().discovered_count(), 1);
    }

    #[test]
    fn selecting_unknown_device_is_refused() {
        let mut panel = Panel::new(Config::default());
        assert_eq!(panel.select(&id()), SelectOutcome::UnknownDevice);
        assert!(panel.card(&id()).is_none());
    }

    #[test]
    fn second_select_while_connecting_or_connected_is_refused() {
        let mut panel = Panel::new(Config::default());
        panel.device_seen(&id(), "RC car", None);

        assert_eq!(panel.select(&id()), SelectOutcome::Connect);
        assert_eq!(panel.select(&id()), SelectOutcome::AlreadyConnected);

        panel.connect_finished(&id(), Ok(()));
        assert_eq!(panel.select(&id()), SelectOutcome::AlreadyConnected);
        assert_eq!(panel.card(&id()).map(|card| card.status), Some(ConnectionStatus::Connected));
        assert!(panel.log_box().entries().any(|line| line.ends_with("Already connected to this device.")));
    }

    #[test]
    fn failed_connect_shows_error_and_allows_retry() {
        let mut panel = Panel::new(Config::default());
        panel.device_seen(&id(), "RC car", None);
        panel.select(&id());
        panel.connect_finished(&id(), Err("timed out".to_string()));

        let card = panel.card(&id()).unwrap();
        assert_eq!(card.status, ConnectionStatus::Error);
        assert!(!card.controls_visible());
        assert!(!panel.entries().next().unwrap().active);

        assert_eq!(panel.select(&id()), SelectOutcome::Connect);
        assert_eq!(panel.card(&id()).map(|card| card.status), Some(ConnectionStatus::Connecting));
    }

    #[test]
    fn disconnect_leaves_connected_state() {
        let mut panel = connected_panel();
        assert!(panel.card(&id()).unwrap().controls_visible());
        assert!(panel.entries().next().unwrap().active);

        panel.disconnected(&id());

        let card = panel.card(&id()).unwrap();
        assert_eq!(card.status, ConnectionStatus::Disconnected);
        assert!(!card.controls_visible());
        assert!(!panel.registry().is_connected(&id()));
        assert!(!panel.entries().next().unwrap().active);
    }

    #[test]
    fn duplicate_disconnect_is_logged_once() {
        let mut panel = connected_panel();
        panel.disconnected(&id());
        panel.disconnected(&id());

        let count = panel.log_box().entries().filter(|line| line.contains("Disconnected from")).count();
        assert_eq!(count, 1);
    }

    #[test]
    fn late_disconnect_does_not_touch_a_reconnecting_card() {
        let mut panel = connected_panel();
        panel.disconnected(&id());
        assert_eq!(panel.select(&id()), SelectOutcome::Connect);

        // the disconnect call completes after the watch already reported the loss
        panel.host_call_finished(&id(), HostCall::Disconnect, Ok(()));

        assert_eq!(panel.card(&id()).map(|card| card.status), Some(ConnectionStatus::Connecting));
        assert!(panel.registry().is_connecting(&id()));
        assert!(panel.entries().next().unwrap().active);
        let count = panel.log_box().entries().filter(|line| line.contains("Disconnected from")).count();
        assert_eq!(count, 1);

        panel.connect_finished(&id(), Ok(()));
        assert_eq!(panel.card(&id()).map(|card| card.status), Some(ConnectionStatus::Connected));
        assert_eq!(panel.select(&id()), SelectOutcome::AlreadyConnected);
    }

    #[test]
    fn failed_connect_call_queues_a_notice() {
        let mut panel = Panel::new(Config::default());
        panel.device_seen(&id(), "RC car", None);
        panel.select(&id());

        let notice = panel.host_call_finished(&id(), HostCall::Connect, Err("refused".to_string()));

        assert_eq!(notice, Some("Failed to connect to car-1: refused".to_string()));
        assert_eq!(panel.card(&id()).map(|card| card.status), Some(ConnectionStatus::Error));
        assert!(!panel.registry().is_connecting(&id()));
    }

    #[test]
    fn successful_connect_call_has_no_notice() {
        let mut panel = Panel::new(Config::default());
        panel.device_seen(&id(), "RC car", None);
        panel.select(&id());

        assert_eq!(panel.host_call_finished(&id(), HostCall::Connect, Ok(())), None);
        assert!(panel.registry().is_connected(&id()));
    }

    #[test]
    fn disconnect_call_moves_card_out_of_connected() {
        let mut panel = connected_panel();

        assert_eq!(panel.host_call_finished(&id(), HostCall::Disconnect, Ok(())), None);

        let card = panel.card(&id()).unwrap();
        assert_eq!(card.status, ConnectionStatus::Disconnected);
        assert!(!panel.registry().is_connected(&id()));
    }

    #[test]
    fn failed_writes_are_only_logged() {
        let mut panel = connected_panel();

        let notice = panel.host_call_finished(&id(), HostCall::WriteCarState, Err("gatt error".to_string()));
        assert_eq!(notice, None);
        let notice = panel.host_call_finished(&id(), HostCall::WriteDaySetting, Err("gatt error".to_string()));
        assert_eq!(notice, None);

        assert_eq!(panel.card(&id()).map(|card| card.status), Some(ConnectionStatus::Connected));
        assert!(panel.log_box().entries().any(|line| line.ends_with("ERROR on write car state(car-1): gatt error")));
        assert!(panel.log_box().entries().any(|line| line.ends_with("ERROR on write day setting(car-1): gatt error")));
    }

    #[test]
    fn reconnect_replaces_the_card() {
        let mut panel = connected_panel();
        panel.slider_release(&id());
        panel.slider_input(&id(), SliderControl::Speed, 120, Instant::now());
        panel.disconnected(&id());

        assert_eq!(panel.select(&id()), SelectOutcome::Connect);
        let cards: Vec<&DeviceCard> = panel.cards().collect();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].speed, 0);
        assert_eq!(cards[0].status, ConnectionStatus::Connecting);
    }

    #[test]
    fn slider_input_is_throttled_but_release_is_not() {
        let mut panel = connected_panel();
        let start = Instant::now();

        let first = panel.slider_input(&id(), SliderControl::Speed, 100, start);
        assert_eq!(first.map(|c| c.to_bytes()), Some([100, 0, 0]));

        let dropped = panel.slider_input(&id(), SliderControl::Direction, 50, start + Duration::from_millis(20));
        assert_eq!(dropped, None);

        let released = panel.slider_release(&id());
        assert_eq!(released.map(|c| c.to_bytes()), Some([100, 50, 0]));

        let later = panel.slider_input(&id(), SliderControl::Direction, 60, start + Duration::from_millis(100));
        assert_eq!(later.map(|c| c.to_bytes()), Some([100, 60, 0]));
    }

    #[test]
    fn slider_values_are_clamped_to_configured_bounds() {
        let mut panel = Panel::new(Config {
            speed_range: SliderBounds { min: 0, max: 200 },
            direction_range: SliderBounds { min: 40, max: 140 },
            ..Config::default()
        });
        panel.device_seen(&id(), "RC car", None);
        panel.select(&id());
        panel.connect_finished(&id(), Ok(()));

        panel.slider_input(&id(), SliderControl::Speed, 255, Instant::now());
        panel.slider_input(&id(), SliderControl::Direction, 0, Instant::now());
        let command = panel.slider_release(&id()).unwrap();

        let bytes = command.to_bytes();
        assert_eq!(bytes.len(), 3);
        assert_eq!(bytes, [200, 40, 0]);
    }

    #[test]
    fn standby_and_brake_zero_the_sliders() {
        let mut panel = connected_panel();
        panel.slider_input(&id(), SliderControl::Speed, 90, Instant::now());

        let standby = panel.standby(&id()).unwrap();
        assert_eq!(standby.brake, Brake::Released);
        assert_eq!(panel.card(&id()).map(|card| (card.speed, card.direction)), Some((0, 0)));

        panel.slider_input(&id(), SliderControl::Direction, 30, Instant::now() + Duration::from_secs(1));
        let brake = panel.brake(&id()).unwrap();
        assert_eq!(brake.to_bytes(), [0, 0, 1]);
        assert_eq!(panel.card(&id()).map(|card| (card.speed, card.direction)), Some((0, 0)));
    }

    #[test]
    fn commands_without_a_card_are_ignored() {
        let mut panel = Panel::new(Config::default());
        assert_eq!(panel.standby(&id()), None);
        assert_eq!(panel.slider_release(&id()), None);
    }
}
