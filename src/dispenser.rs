use crate::errors::AppError;
use crate::structs::DeviceInfo;
use crate::transmit::ChunkWriter;

use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A connected dispenser with its data characteristic resolved.
pub struct DispenserLink {
    device: Peripheral,
    characteristic: Characteristic,
    write_type: WriteType,
    name: String,
}

impl DispenserLink {
    /// Connects and looks up `characteristic_uuid` inside `service_uuid`.
    /// On any failure the peripheral is disconnected again.
    pub async fn connect(
        peripheral: &DeviceInfo,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
        connect_timeout: Duration,
        with_response: bool,
    ) -> Result<Self, AppError> {
        let device = peripheral
            .device
            .clone()
            .ok_or_else(|| AppError::DeviceNotFound(peripheral.name.clone()))?;
        info!(
            "Connecting to dispenser! Name: {:?} | Address: {:?}",
            peripheral.name, peripheral.address
        );
        match timeout(connect_timeout, device.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("BLE Connection error: {}", e);
                reset(&device).await;
                return Err(AppError::ConnectFailed(e.to_string()));
            }
            Err(_) => {
                error!("Connection timed out");
                reset(&device).await;
                return Err(AppError::ConnectTimeout);
            }
        }

        if let Err(e) = device.discover_services().await {
            error!("Couldn't read services from connected device: {}", e);
            reset(&device).await;
            return Err(AppError::ConnectFailed(e.to_string()));
        }
        let characteristics = device.characteristics();
        debug!("Found {} characteristics", characteristics.len());
        let Some(characteristic) = characteristics
            .into_iter()
            .find(|c| c.uuid == characteristic_uuid && c.service_uuid == service_uuid)
        else {
            error!("Didn't find the data characteristic on {}", peripheral.name);
            reset(&device).await;
            return Err(AppError::NoCharacteristic);
        };
        info!("Ready for data transmission");

        let write_type = if with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        Ok(Self {
            device,
            characteristic,
            write_type,
            name: peripheral.name.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn disconnect(self) -> Result<(), AppError> {
        if self.device.is_connected().await.unwrap_or(false) {
            self.device.disconnect().await?;
            info!("Disconnected from {}", self.name);
        }
        Ok(())
    }
}

impl ChunkWriter for DispenserLink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), AppError> {
        self.device
            .write(&self.characteristic, chunk, self.write_type)
            .await?;
        Ok(())
    }
}

/// Drops a half-open connection so the next attempt starts clean.
async fn reset(device: &Peripheral) {
    if let Err(e) = device.disconnect().await {
        warn!("Failed to reset connection: {}", e);
    }
}
