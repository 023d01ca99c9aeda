use std::convert::Infallible;
use iced::subscription::{self, Subscription};
use futures::SinkExt;
use futures::channel::mpsc::Sender;
use btleplug::api::{Central, CentralState, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use tokio::time::{sleep, Duration};

use crate::device::constants::{DISCOVERY_POLL_DELAY, RC_CAR_SERVICE, UNAVAILABLE_RETRY_DELAY};
use crate::device::types::{Availability, DeviceEvent, DeviceId, DiscoveredDevice};
use crate::error::DeviceError;

const UNNAMED_DEVICE: &str = "(unnamed)";

struct Discovery {
    filter_services: bool,
    manager: Option<Manager>,
    adapters: Option<Vec<Adapter>>,
}

impl Discovery {
    async fn start_scanning(&mut self) -> Result<Vec<Adapter>, DeviceError> {
        let manager = match self.manager.take() {
            Some(manager) => manager,
            None => Manager::new().await?,
        };
        let adapters = manager.adapters().await;
        self.manager = Some(manager);

        let adapters = adapters?;
        if adapters.is_empty() {
            return Err(DeviceError::NoAdapters);
        }

        let filter = ScanFilter {
            services: if self.filter_services { vec![RC_CAR_SERVICE] } else { vec![] },
        };

        for adapter in &adapters {
            info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
            adapter.start_scan(filter.clone()).await?;
        }

        Ok(adapters)
    }

    /// Makes sure scanning is running on a powered adapter, returns the resulting availability.
    async fn check_availability(&mut self) -> Availability {
        if self.adapters.is_none() {
            match self.start_scanning().await {
                Ok(adapters) => self.adapters = Some(adapters),
                Err(err) => {
                    warn!("Scanning failed {:?}", err);
                    return availability_from_error(&err);
                },
            }
        }

        let mut states = Vec::new();
        for adapter in self.adapters.iter().flatten() {
            match adapter.adapter_state().await {
                Ok(state) => states.push(state),
                Err(err) => warn!("Failed to query adapter state: {:?}", err),
            }
        }

        let availability = availability_from_states(&states);
        if availability != Availability::Available {
            // scanning is started again once an adapter is powered on
            self.stop_scanning().await;
        }
        availability
    }

    async fn find_peripherals(&mut self) -> Result<Vec<DiscoveredDevice>, DeviceError> {
        let Some(adapters) = self.adapters.as_ref() else {
            return Ok(vec![]);
        };

        let mut found = Vec::new();
        let mut last_error: Option<DeviceError> = None;
        let mut failed_adapters = 0;

        for adapter in adapters {
            let peripherals = match adapter.peripherals().await {
                Ok(v) => v,
                Err(err) => {
                    warn!("Failed to query BLE adapter for peripherals: {}", err);
                    failed_adapters += 1;
                    last_error = Some(err.into());
                    continue;
                },
            };

            for peripheral in peripherals {
                match peripheral.properties().await {
                    Err(err) => {
                        warn!("Could not query peripheral for properties: {:?}", err);
                    },
                    Ok(None) => {
                        debug!("Peripheral has no properties");
                    },
                    Ok(Some(properties)) => {
                        // Some environments ignore the filter, so make sure to check the service uuid again
                        if self.filter_services && !properties.services.contains(&RC_CAR_SERVICE) {
                            continue;
                        }

                        found.push(DiscoveredDevice {
                            id: DeviceId::from(format!("{:?}", peripheral.id())),
                            name: properties.local_name.unwrap_or(UNNAMED_DEVICE.to_string()),
                            rssi: properties.rssi,
                            peripheral,
                        });
                    },
                }
            }
        }

        if failed_adapters == adapters.len() {
            // every adapter failed, so start over with a fresh availability check
            self.adapters = None;
            if let Some(err) = last_error {
                return Err(err);
            }
        }

        Ok(found)
    }

    async fn stop_scanning(&mut self) {
        if let Some(adapters) = self.adapters.take() {
            for adapter in adapters {
                if let Err(err) = adapter.stop_scan().await {
                    warn!("Failed to stop scanning: {:?}", err);
                }
            }
        }
    }
}

fn availability_from_error(err: &DeviceError) -> Availability {
    if err.is_permission_denied() {
        Availability::NoPermission
    } else {
        Availability::Unavailable
    }
}

fn availability_from_states(states: &[CentralState]) -> Availability {
    if states.iter().any(|state| matches!(state, CentralState::PoweredOn)) {
        Availability::Available
    } else {
        Availability::Unavailable
    }
}

/// Returns the event to emit if the availability changed since the previous iteration.
fn availability_change(previous: Option<Availability>, current: Availability) -> Option<DeviceEvent> {
    if previous == Some(current) {
        return None;
    }
    Some(DeviceEvent::AvailabilityChange(current))
}

/// Milliseconds to wait before the next iteration.
fn next_delay(availability: Availability) -> u64 {
    match availability {
        Availability::Available => DISCOVERY_POLL_DELAY,
        Availability::Unavailable | Availability::NoPermission => UNAVAILABLE_RETRY_DELAY,
    }
}

async fn emit(senders: &mut Vec<Sender<DeviceEvent>>, event: DeviceEvent) {
    for sender in senders {
        if let Err(err) = sender.send(event.clone()).await {
            warn!("Failed to send DeviceEvent: {:?}", err);
        }
    }
}

async fn discover_devices(cancel: CancellationToken, filter_services: bool, mut senders: Vec<Sender<DeviceEvent>>) -> Infallible {
    let mut discovery = Discovery { filter_services, manager: None, adapters: None };
    let mut previous_availability: Option<Availability> = None;

    // note: subscription::channel expects the future to never resolve (Infallible)
    while !cancel.is_cancelled() {
        let availability = discovery.check_availability().await;

        if let Some(event) = availability_change(previous_availability, availability) {
            emit(&mut senders, event).await;
        }
        previous_availability = Some(availability);

        if availability == Availability::Available {
            match discovery.find_peripherals().await {
                Ok(devices) => {
                    for device in devices {
                        emit(&mut senders, DeviceEvent::DeviceSeen(device)).await;
                    }
                },
                Err(err) => {
                    emit(&mut senders, DeviceEvent::DiscoveryError(err.to_string())).await;
                },
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {},
            _ = sleep(Duration::from_millis(next_delay(availability))) => {},
        }
    }

    info!("Discovery stopped");
    discovery.stop_scanning().await;
    futures::future::pending().await
}

pub fn discovery_subscription(cancel: CancellationToken, filter_services: bool) -> Subscription<DeviceEvent> {
    struct Discover;

    subscription::channel(
        std::any::TypeId::of::<Discover>(),
        64,
        move |subscription_sender| {
            async move {
                discover_devices(cancel, filter_services, vec![subscription_sender]).await
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_powered_adapter_makes_bluetooth_available() {
        let states = [CentralState::PoweredOff, CentralState::PoweredOn];
        assert_eq!(availability_from_states(&states), Availability::Available);
    }

    #[test]
    fn powered_off_or_missing_adapters_are_unavailable() {
        assert_eq!(availability_from_states(&[CentralState::PoweredOff]), Availability::Unavailable);
        assert_eq!(availability_from_states(&[CentralState::Unknown]), Availability::Unavailable);
        assert_eq!(availability_from_states(&[]), Availability::Unavailable);
    }

    #[test]
    fn scan_errors_map_to_availability() {
        let denied = DeviceError::from(btleplug::Error::PermissionDenied);
        assert_eq!(availability_from_error(&denied), Availability::NoPermission);
        assert_eq!(availability_from_error(&DeviceError::NoAdapters), Availability::Unavailable);
    }

    #[test]
    fn backs_off_while_unavailable() {
        assert_eq!(next_delay(Availability::Available), 100);
        assert_eq!(next_delay(Availability::Unavailable), 1000);
        assert_eq!(next_delay(Availability::NoPermission), 1000);
    }

    #[test]
    fn availability_is_reported_on_change_only() {
        assert!(matches!(
            availability_change(None, Availability::Available),
            Some(DeviceEvent::AvailabilityChange(Availability::Available))
        ));
        assert!(availability_change(Some(Availability::Available), Availability::Available).is_none());

        // bluetooth switched off mid-session
        assert!(matches!(
            availability_change(Some(Availability::Available), Availability::Unavailable),
            Some(DeviceEvent::AvailabilityChange(Availability::Unavailable))
        ));
        assert!(matches!(
            availability_change(Some(Availability::Unavailable), Availability::Available),
            Some(DeviceEvent::AvailabilityChange(Availability::Available))
        ));
    }
}
