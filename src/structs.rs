use btleplug::platform::Peripheral;
use uuid::Uuid;

/// A peripheral seen during a scan.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
    pub services: Vec<Uuid>,
    pub device: Option<Peripheral>,
}

impl DeviceInfo {
    pub fn new(
        id: String,
        name: Option<String>,
        address: String,
        rssi: Option<i16>,
        services: Vec<Uuid>,
        device: Option<Peripheral>,
    ) -> Self {
        Self {
            id,
            name: name.unwrap_or_else(|| "Unknown".to_string()),
            address,
            rssi,
            services,
            device,
        }
    }

    pub fn advertises(&self, service: &Uuid) -> bool {
        self.services.contains(service)
    }

    /// Case-insensitive match against the name, address or platform id.
    pub fn matches(&self, selector: &str) -> bool {
        let selector = selector.trim();
        [&self.name, &self.address, &self.id]
            .iter()
            .any(|field| field.eq_ignore_ascii_case(selector))
    }
}

/// Picks the dispenser to talk to: an explicit selector, else the first
/// device advertising `service`.
pub fn select_device<'a>(
    devices: &'a [DeviceInfo],
    selector: Option<&str>,
    service: &Uuid,
) -> Option<&'a DeviceInfo> {
    match selector {
        Some(selector) => devices.iter().find(|d| d.matches(selector)),
        None => devices.iter().find(|d| d.advertises(service)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::DISPENSER_SERVICE_UUID;

    fn device(name: &str, address: &str, services: Vec<Uuid>) -> DeviceInfo {
        DeviceInfo::new(
            address.to_lowercase(),
            Some(name.to_owned()),
            address.to_owned(),
            Some(-60),
            services,
            None,
        )
    }

    #[test]
    fn selection() {
        let devices = vec![
            device("Headphones", "11:22:33:44:55:66", vec![]),
            device("PillBox", "AA:BB:CC:DD:EE:FF", vec![DISPENSER_SERVICE_UUID]),
            device("PillBox Spare", "AA:BB:CC:DD:EE:00", vec![DISPENSER_SERVICE_UUID]),
        ];
        let pick = |sel: Option<&str>| select_device(&devices, sel, &DISPENSER_SERVICE_UUID).map(|d| d.name.as_str());

        assert_eq!(pick(None), Some("PillBox"));
        assert_eq!(pick(Some("pillbox spare")), Some("PillBox Spare"));
        assert_eq!(pick(Some("aa:bb:cc:dd:ee:ff")), Some("PillBox"));
        assert_eq!(pick(Some("headphones")), Some("Headphones"));
        assert_eq!(pick(Some("Nope")), None);
        assert!(select_device(&devices[..1], None, &DISPENSER_SERVICE_UUID).is_none());
    }

    #[test]
    fn unnamed_devices() {
        let unnamed = DeviceInfo::new("id".into(), None, "addr".into(), None, vec![], None);
        assert_eq!(unnamed.name, "Unknown");
    }
}
