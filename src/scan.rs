use crate::errors::AppError;
use crate::structs::DeviceInfo;
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral, ScanFilter};
use btleplug::platform::{Adapter, Manager};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Status lines for the user while the scan is running.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanUpdate {
    Scanning,
    Discovered { name: String, address: String },
    Finished { found: usize },
}

impl ScanUpdate {
    pub fn status_message(&self) -> String {
        match self {
            ScanUpdate::Scanning => "Scanning for devices...".into(),
            ScanUpdate::Discovered { name, address } => format!("Found {name} ({address})"),
            ScanUpdate::Finished { found: 0 } => "No devices found".into(),
            ScanUpdate::Finished { .. } => "Scan complete".into(),
        }
    }
}

/// Returns the first Bluetooth adapter on the system.
pub async fn first_adapter() -> Result<Adapter, AppError> {
    let manager = Manager::new().await.map_err(|e| {
        error!("Failed to create manager: {}", e);
        AppError::Bt(e)
    })?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or_else(|| {
        error!("No Bluetooth adapters found!");
        AppError::NoAdapter
    })
}

/// Scans for Bluetooth devices until `duration` runs out or `cancel_token` fires.
/// Devices are deduplicated by platform id, later sightings refresh earlier ones.
pub async fn bluetooth_scan(
    central: &Adapter,
    duration: Duration,
    tx: &UnboundedSender<ScanUpdate>,
    cancel_token: &CancellationToken,
) -> Result<Vec<DeviceInfo>, AppError> {
    let mut events = central.events().await?;
    central.start_scan(ScanFilter::default()).await?;
    debug!("Scanning started for {} seconds", duration.as_secs());
    let _ = tx.send(ScanUpdate::Scanning);

    let mut discovered: Vec<DeviceInfo> = Vec::new();
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    'events: loop {
        tokio::select! {
            Some(event) = events.next() => {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    CentralEvent::DeviceDisconnected(id) => {
                        warn!("Device disconnected: {}", id);
                        continue 'events;
                    }
                    _ => continue 'events,
                };
                let Ok(device) = central.peripheral(&id).await else {
                    continue 'events;
                };
                let properties = match device.properties().await {
                    Ok(Some(properties)) => properties,
                    Ok(None) => continue 'events,
                    Err(e) => {
                        warn!("Couldn't read properties of {}: {}", id, e);
                        continue 'events;
                    }
                };
                let info = DeviceInfo::new(
                    device.id().to_string(),
                    properties.local_name,
                    properties.address.to_string(),
                    properties.rssi,
                    properties.services,
                    Some(device.clone()),
                );
                match discovered.iter_mut().find(|d| d.id == info.id) {
                    Some(existing) => *existing = info,
                    None => {
                        debug!("Discovered {} ({})", info.name, info.address);
                        let _ = tx.send(ScanUpdate::Discovered {
                            name: info.name.clone(),
                            address: info.address.clone(),
                        });
                        discovered.push(info);
                    }
                }
            }
            _ = &mut deadline => {
                debug!("Scan timeout reached");
                break 'events;
            }
            _ = cancel_token.cancelled() => {
                info!("Scan cancelled");
                break 'events;
            }
        }
    }

    if let Err(e) = central.stop_scan().await {
        warn!("Failed to stop scan: {}", e);
    }
    info!("Scan finished with {} devices", discovered.len());
    let _ = tx.send(ScanUpdate::Finished {
        found: discovered.len(),
    });
    if cancel_token.is_cancelled() {
        return Err(AppError::Cancelled);
    }
    Ok(discovered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_messages() {
        assert_eq!(ScanUpdate::Finished { found: 0 }.status_message(), "No devices found");
        assert_eq!(ScanUpdate::Finished { found: 3 }.status_message(), "Scan complete");
        assert_eq!(
            ScanUpdate::Discovered {
                name: "PillBox".into(),
                address: "AA:BB".into()
            }
            .status_message(),
            "Found PillBox (AA:BB)"
        );
    }
}
