use std::convert::Infallible;
use std::future::Future;
use iced::subscription::{self, Subscription};
use futures::SinkExt;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use log::{debug, info, warn};
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use crate::car::command::CarCommand;
use crate::device::constants::{
    CONNECTION_POLL_DELAY, DAY_SETTING_PAYLOAD, IS_CONNECTED_DEADLINE, RC_CAR_CONTROL_CHARACTERISTIC,
    RC_CAR_SERVICE, RC_DAY_CHARACTERISTIC, READ_DEADLINE, WRITE_DEADLINE,
};
use crate::device::types::{DeviceEvent, DeviceId};
use crate::error::DeviceError;

async fn with_deadline<T, F>(deadline: u64, operation: &'static str, fut: F) -> Result<T, DeviceError>
where
    F: Future<Output = Result<T, btleplug::Error>>,
{
    tokio::select! {
        _ = sleep(Duration::from_millis(deadline)) => {
            warn!("{} took too long", operation);
            Err(DeviceError::Timeout { operation })
        }
        result = fut => Ok(result?),
    }
}

pub async fn connect_peripheral(peripheral: &Peripheral) -> Result<(), DeviceError> {
    info!("Connecting to peripheral...");
    peripheral.connect().await?;

    info!("Connected; Discovering services...");
    peripheral.discover_services().await?;
    Ok(())
}

pub async fn disconnect_peripheral(peripheral: &Peripheral) -> Result<(), DeviceError> {
    info!("Disconnecting from peripheral...");
    peripheral.disconnect().await?;
    Ok(())
}

async fn find_characteristic(peripheral: &Peripheral, uuid: Uuid) -> Result<Characteristic, DeviceError> {
    if peripheral.characteristics().is_empty() {
        peripheral.discover_services().await?;
    }

    let characteristic = peripheral.characteristics()
        .into_iter()
        .find(|characteristic| characteristic.service_uuid == RC_CAR_SERVICE && characteristic.uuid == uuid)
        .ok_or(DeviceError::MissingCharacteristic { uuid })?;

    debug!("Got characteristic {} {}", RC_CAR_SERVICE, uuid);
    Ok(characteristic)
}

async fn write_characteristic(peripheral: &Peripheral, uuid: Uuid, payload: &[u8]) -> Result<(), DeviceError> {
    let characteristic = find_characteristic(peripheral, uuid).await?;
    let fut = peripheral.write(&characteristic, payload, WriteType::WithResponse);
    with_deadline(WRITE_DEADLINE, "Writing to characteristic", fut).await
}

pub async fn write_car_command(peripheral: &Peripheral, command: CarCommand) -> Result<(), DeviceError> {
    write_characteristic(peripheral, RC_CAR_CONTROL_CHARACTERISTIC, &command.to_bytes()).await
}

pub async fn write_day_setting(peripheral: &Peripheral) -> Result<(), DeviceError> {
    write_characteristic(peripheral, RC_DAY_CHARACTERISTIC, &DAY_SETTING_PAYLOAD).await
}

pub async fn read_car_state(peripheral: &Peripheral) -> Result<Vec<u8>, DeviceError> {
    let characteristic = find_characteristic(peripheral, RC_CAR_CONTROL_CHARACTERISTIC).await?;
    let value = with_deadline(READ_DEADLINE, "Reading characteristic", peripheral.read(&characteristic)).await?;

    if value.is_empty() {
        return Err(DeviceError::EmptyRead);
    }
    Ok(value)
}

pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

async fn still_connected(peripheral: &Peripheral) -> bool {
    tokio::select! {
        _ = sleep(Duration::from_millis(IS_CONNECTED_DEADLINE)) => {
            // macOS
            warn!("Checking for connection status took too long");
            false
        }
        result = peripheral.is_connected() => match result {
            Err(err) => {
                warn!("Error checking for connection state: {:?}", err);
                false
            },
            Ok(connected) => connected,
        }
    }
}

async fn watch_connection(id: DeviceId, peripheral: Peripheral, mut sender: futures::channel::mpsc::Sender<DeviceEvent>) -> Infallible {
    loop {
        sleep(Duration::from_millis(CONNECTION_POLL_DELAY)).await;

        if !still_connected(&peripheral).await {
            warn!("Connection lost: {}", id);
            if let Err(err) = sender.send(DeviceEvent::Disconnected(id.clone())).await {
                warn!("Failed to send DeviceEvent: {:?}", err);
            }
            // the subscription is dropped once the device leaves the connected set
            break;
        }
    }

    futures::future::pending().await
}

/// Reports `DeviceEvent::Disconnected` once the peripheral is no longer connected.
pub fn connection_watch_subscription(id: DeviceId, peripheral: Peripheral) -> Subscription<DeviceEvent> {
    struct Watch;

    subscription::channel(
        (std::any::TypeId::of::<Watch>(), id.clone()),
        4,
        move |subscription_sender| {
            async move {
                watch_connection(id, peripheral, subscription_sender).await
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_lowercase_and_zero_padded() {
        assert_eq!(to_hex(&[0x00, 0x0f, 0xab, 0xff]), "000fabff");
        assert_eq!(to_hex(&[]), "");
    }

    #[tokio::test]
    async fn deadline_reports_timeout() {
        let result: Result<(), DeviceError> = with_deadline(10, "Waiting", futures::future::pending()).await;
        assert!(matches!(result, Err(DeviceError::Timeout { operation: "Waiting" })));
    }

    #[tokio::test]
    async fn deadline_passes_through_host_errors() {
        let result: Result<(), DeviceError> = with_deadline(
            1000,
            "Writing",
            async { Err(btleplug::Error::NotConnected) },
        ).await;
        assert!(matches!(result, Err(DeviceError::Btle { source: btleplug::Error::NotConnected })));
    }
}
