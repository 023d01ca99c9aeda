use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use btleplug::platform::Peripheral;
use iced::{Alignment, Application, Command, Element, Length, Settings, Size, Subscription, window};
use iced::event::{self, Event};
use iced::theme::{self, Theme};
use iced::widget::{
    Column, button, column, container, horizontal_rule, row, scrollable, slider, text,
};
use iced::widget::scrollable::RelativeOffset;
use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::config::io::ConfigIO;
use crate::config::types::Config;
use crate::device::connection::{
    connect_peripheral, connection_watch_subscription, disconnect_peripheral, read_car_state, to_hex,
    write_car_command, write_day_setting,
};
use crate::device::constants::RC_CAR_CONTROL_CHARACTERISTIC;
use crate::device::discovery::discovery_subscription;
use crate::device::registry::DeviceRegistry;
use crate::device::types::{Availability, DeviceEvent, DeviceId};
use crate::car::command::CarCommand;
use crate::error::AppRunError;
use crate::gui::panel::{ConnectionStatus, DeviceCard, DeviceListEntry, Panel, SelectOutcome, SliderControl};
use crate::gui::style::DeviceListItemStyleSheet;
use crate::gui::types::{CardAction, HostCall, Message};

pub struct ApplicationFlags {
    config_io: ConfigIO,
}

pub struct RcCarApplication {
    // this token is cancelled upon exit
    app_cancel: CancellationToken,

    // messages that the user must click away
    notices: Vec<String>,

    config_io: ConfigIO,
    // discovery starts once the config is known, it decides the scan filter
    config_loaded: bool,

    // latest availability reported by the discovery loop
    availability: Option<Availability>,
    // the latest peripheral handle for every device that was seen
    peripherals: HashMap<DeviceId, Peripheral>,

    panel: Panel,
    log_scrollable: scrollable::Id,
}

impl RcCarApplication {
    fn before_close(&mut self) {
        self.app_cancel.cancel();
    }

    fn load_config(&self) -> Command<Message> {
        let config_io = self.config_io.clone();

        let fut = async move {
            match config_io.load().await {
                Ok(config) => (config, None),
                Err(err) => {
                    let mut error_message: Option<String> = None;

                    if err.is_file_not_found_error() {
                        info!("Config file not found, using defaults");
                    } else {
                        error!("Failed to load config: {:?}", &err);
                        error_message = Some(format!("Failed to load config: {}", &err));
                    }
                    (Config::default(), error_message)
                }
            }
        };

        Command::perform(fut, Message::ConfigLoadComplete)
    }

    fn connect(&mut self, id: DeviceId) -> Command<Message> {
        let Some(peripheral) = self.peripherals.get(&id).cloned() else {
            self.panel.connect_finished(&id, Err("device is no longer known".to_string()));
            return Command::none();
        };

        let fut = async move {
            connect_peripheral(&peripheral).await.map_err(|err| err.to_string())
        };

        Command::perform(fut, move |result| Message::HostCallComplete(id, HostCall::Connect, result))
    }

    fn disconnect(&self, id: DeviceId) -> Command<Message> {
        let Some(peripheral) = self.peripherals.get(&id).cloned() else {
            return Command::none();
        };

        let fut = async move {
            disconnect_peripheral(&peripheral).await.map_err(|err| err.to_string())
        };

        Command::perform(fut, move |result| Message::HostCallComplete(id, HostCall::Disconnect, result))
    }

    fn write_command(&self, id: DeviceId, command: Option<CarCommand>) -> Command<Message> {
        let (Some(command), Some(peripheral)) = (command, self.peripherals.get(&id).cloned()) else {
            return Command::none();
        };

        let fut = async move {
            write_car_command(&peripheral, command).await.map_err(|err| err.to_string())
        };

        Command::perform(fut, move |result| Message::HostCallComplete(id, HostCall::WriteCarState, result))
    }

    fn write_day_setting(&self, id: DeviceId) -> Command<Message> {
        let Some(peripheral) = self.peripherals.get(&id).cloned() else {
            return Command::none();
        };

        let fut = async move {
            write_day_setting(&peripheral).await.map_err(|err| err.to_string())
        };

        Command::perform(fut, move |result| Message::HostCallComplete(id, HostCall::WriteDaySetting, result))
    }

    fn read_state(&self, id: DeviceId) -> Command<Message> {
        let Some(peripheral) = self.peripherals.get(&id).cloned() else {
            return Command::none();
        };

        let fut = async move {
            read_car_state(&peripheral).await.map_err(|err| err.to_string())
        };

        Command::perform(fut, move |result| Message::ReadComplete(id, result))
    }

    fn handle_device_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::AvailabilityChange(availability) => {
                match availability {
                    Availability::Available => self.panel.log("Finding devices..."),
                    Availability::Unavailable => self.panel.log("Bluetooth is not available"),
                    Availability::NoPermission => {
                        self.panel.log("ERROR on availability check: permission denied");
                        self.notices.push("Not allowed to access Bluetooth. Grant this application \
                            Bluetooth access in the system settings and restart it.".to_string());
                    },
                }
                self.availability = Some(availability);
            },
            DeviceEvent::DeviceSeen(device) => {
                self.panel.device_seen(&device.id, &device.name, device.rssi);
                self.peripherals.insert(device.id, device.peripheral);
            },
            DeviceEvent::DiscoveryError(err) => {
                self.panel.log(format!("ERROR on discovery: {}", err));
            },
            DeviceEvent::Disconnected(id) => {
                self.panel.disconnected(&id);
            },
        }
    }

    fn handle_card_action(&mut self, id: DeviceId, action: CardAction) -> Command<Message> {
        match action {
            CardAction::Slide(control, value) => {
                let command = self.panel.slider_input(&id, control, value, Instant::now());
                self.write_command(id, command)
            },
            CardAction::Release => {
                let command = self.panel.slider_release(&id);
                self.write_command(id, command)
            },
            CardAction::Standby => {
                let command = self.panel.standby(&id);
                self.write_command(id, command)
            },
            CardAction::Brake => {
                let command = self.panel.brake(&id);
                self.write_command(id, command)
            },
            CardAction::Disconnect => {
                self.panel.log("Clicked disconnect button");
                self.disconnect(id)
            },
            CardAction::SendDaySetting => self.write_day_setting(id),
            CardAction::Read => self.read_state(id),
        }
    }

    fn handle_host_call(&mut self, id: DeviceId, call: HostCall, result: Result<(), String>) {
        if let Some(notice) = self.panel.host_call_finished(&id, call, result) {
            self.notices.push(notice);
        }
    }

    fn update_inner(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::ConfigLoadComplete((config, error_message)) => {
                info!("Config load complete");
                self.panel.log(format!("Config loaded from {}", self.config_io.path().to_string_lossy()));
                self.panel.set_config(config);
                self.config_loaded = true;
                if let Some(error_message) = error_message {
                    self.notices.push(error_message);
                }
            },
            Message::NoticeConfirmed => {
                if !self.notices.is_empty() {
                    self.notices.remove(0);
                }
            },
            Message::EventOccurred(Event::Window(id, window::Event::CloseRequested)) => {
                info!("Close requested");
                self.before_close();
                return window::close(id);
            },
            Message::EventOccurred(_) => {},
            Message::DeviceEvent(event) => self.handle_device_event(event),
            Message::SelectDevice(id) => {
                if self.panel.select(&id) == SelectOutcome::Connect {
                    return self.connect(id);
                }
            },
            Message::Card(id, action) => return self.handle_card_action(id, action),
            Message::HostCallComplete(id, call, result) => self.handle_host_call(id, call, result),
            Message::ReadComplete(_, Ok(value)) => {
                self.panel.log(format!("Read {}: {}", RC_CAR_CONTROL_CHARACTERISTIC, to_hex(&value)));
            },
            Message::ReadComplete(_, Err(err)) => {
                self.panel.log(format!("Error reading {}: {}", RC_CAR_CONTROL_CHARACTERISTIC, err));
            },
        }

        Command::none()
    }
}

impl Application for RcCarApplication {
    type Executor = iced::executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ApplicationFlags;

    fn new(flags: ApplicationFlags) -> (RcCarApplication, Command<Self::Message>) {
        let app = RcCarApplication {
            app_cancel: CancellationToken::new(),
            notices: Vec::new(),
            config_io: flags.config_io,
            config_loaded: false,
            availability: None,
            peripherals: HashMap::new(),
            panel: Panel::new(Config::default()),
            log_scrollable: scrollable::Id::unique(),
        };

        let command = app.load_config();
        (app, command)
    }

    fn title(&self) -> String {
        String::from(concat!("RC Car Remote ", env!("CARGO_PKG_VERSION")))
    }

    fn update(&mut self, message: Message) -> Command<Self::Message> {
        let logged_before = self.panel.log_box().total();
        let command = self.update_inner(message);

        if self.panel.log_box().total() != logged_before {
            return Command::batch(vec![
                command,
                scrollable::snap_to(self.log_scrollable.clone(), RelativeOffset::END),
            ]);
        }
        command
    }

    fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = vec![event::listen().map(Message::EventOccurred)];

        if self.config_loaded {
            subscriptions.push(
                discovery_subscription(
                    self.app_cancel.clone(),
                    self.panel.config().scan_filter_services,
                ).map(Message::DeviceEvent)
            );
        }

        for id in self.panel.registry().connected() {
            if let Some(peripheral) = self.peripherals.get(id) {
                subscriptions.push(
                    connection_watch_subscription(id.clone(), peripheral.clone()).map(Message::DeviceEvent)
                );
            }
        }

        Subscription::batch(subscriptions)
    }

    fn view(&self) -> Element<Message> {
        if let Some(notice) = self.notices.first() {
            return container(
                column![
                    text(notice),

                    button(text("Okay"))
                        .on_press(Message::NoticeConfirmed),

                ].align_items(Alignment::Center).spacing(20),
            )
            .width(Length::Fill)
            .padding(20)
            .into()
        }

        let availability = match self.availability {
            None => text("Checking Bluetooth…"),
            Some(Availability::Available) => text(""),
            Some(Availability::Unavailable) => text("Bluetooth is not available. Turn on Bluetooth to find devices."),
            Some(Availability::NoPermission) => text("Not allowed to access Bluetooth!"),
        };

        let device_list = Column::with_children(
            self.panel.entries().map(|entry| device_list_item(entry, self.panel.registry()))
        )
            .spacing(4)
            .width(Length::Fill);

        let cards = Column::with_children(
            self.panel.cards().map(|card| device_card(card, self.panel.config()))
        )
            .spacing(10)
            .width(Length::Fill);

        let log_box = scrollable(
            Column::with_children(
                self.panel.log_box().entries().map(log_line)
            )
                .width(Length::Fill)
        )
            .id(self.log_scrollable.clone())
            .height(Length::Fixed(160.0));

        container(
            column![
                availability,
                text(format!("Devices ({})", self.panel.registry().discovered_count())).size(18),
                device_list,
                horizontal_rule(10),
                scrollable(cards).height(Length::Fill),
                horizontal_rule(10),
                container(log_box).style(theme::Container::Box).padding(5),
            ]
                .spacing(10)
                .width(Length::Fill),
        )
        .width(Length::Fill)
        .height(Length::Fill)
        .padding(20)
        .into()
    }
}

fn log_line(line: &str) -> Element<Message> {
    text(line).size(12).into()
}

fn device_list_item<'a>(entry: &'a DeviceListEntry, registry: &DeviceRegistry) -> Element<'a, Message> {
    let mut rssi = match entry.rssi {
        None => "-".to_string(),
        Some(rssi) => format!("{} dBm", rssi),
    };
    if registry.is_connecting(&entry.id) {
        rssi.push_str(" · connecting");
    } else if registry.is_connected(&entry.id) {
        rssi.push_str(" · connected");
    }

    button(
        row![
            column![
                text(&entry.name),
                text(entry.id.as_str()).size(12),
            ].width(Length::Fill),
            text(rssi),
        ].align_items(Alignment::Center)
    )
        .width(Length::Fill)
        .style(theme::Button::Custom(Box::new(DeviceListItemStyleSheet { active: entry.active })))
        .on_press(Message::SelectDevice(entry.id.clone()))
        .into()
}

fn device_card<'a>(card: &'a DeviceCard, config: &Config) -> Element<'a, Message> {
    let status_style = match card.status {
        ConnectionStatus::Connected => theme::Button::Primary,
        ConnectionStatus::Error => theme::Button::Destructive,
        ConnectionStatus::Connecting | ConnectionStatus::Disconnected => theme::Button::Secondary,
    };

    let mut header = row![
        text(&card.name).size(18).width(Length::Fill),
        // no on_press: the status button is display only
        button(text(card.status.to_string()).size(14)).style(status_style),
    ]
        .align_items(Alignment::Center)
        .spacing(10);

    if card.controls_visible() {
        header = header.push(
            button(text("Disconnect").size(14))
                .style(theme::Button::Secondary)
                .on_press(Message::Card(card.id.clone(), CardAction::Disconnect))
        );
    }

    let mut content = column![header].spacing(10);

    if card.controls_visible() {
        let direction_id = card.id.clone();
        let speed_id = card.id.clone();
        let direction_range = config.direction_range;
        let speed_range = config.speed_range;

        content = content.push(column![
            text(format!("Direction: {}", card.direction)),
            slider(
                direction_range.min..=direction_range.max,
                card.direction,
                move |value| Message::Card(direction_id.clone(), CardAction::Slide(SliderControl::Direction, value)),
            ).on_release(Message::Card(card.id.clone(), CardAction::Release)),

            text(format!("Speed: {}", card.speed)),
            slider(
                speed_range.min..=speed_range.max,
                card.speed,
                move |value| Message::Card(speed_id.clone(), CardAction::Slide(SliderControl::Speed, value)),
            ).on_release(Message::Card(card.id.clone(), CardAction::Release)),

            row![
                button(text("Standby"))
                    .style(theme::Button::Positive)
                    .on_press(Message::Card(card.id.clone(), CardAction::Standby)),
                button(text("Brake"))
                    .style(theme::Button::Destructive)
                    .on_press(Message::Card(card.id.clone(), CardAction::Brake)),
                button(text("Send day setting"))
                    .style(theme::Button::Secondary)
                    .on_press(Message::Card(card.id.clone(), CardAction::SendDaySetting)),
                button(text("Read"))
                    .style(theme::Button::Secondary)
                    .on_press(Message::Card(card.id.clone(), CardAction::Read)),
            ].spacing(10),
        ].spacing(8));
    }

    container(content)
        .style(theme::Container::Box)
        .width(Length::Fill)
        .padding(10)
        .into()
}

pub fn run_application(config_path: Option<PathBuf>) -> Result<(), AppRunError> {
    let config_io = ConfigIO::new_sync(config_path)?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let flags = ApplicationFlags { config_io };
    let mut settings = Settings::with_flags(flags);

    // handle exits ourselves (Event::CloseRequested)
    settings.id = Some("rc-car-remote".to_string());
    settings.window.exit_on_close_request = false;
    settings.window.size = Size::new(640.0, 860.0);

    // this function will call process::exit() unless there was a startup error
    RcCarApplication::run(settings)?;
    Ok(())
}
