//! udev device database enumeration - only supported on Linux.
//! Requires 'udev' feature.
use udevlib::Enumerator;

use crate::error::{Error, ErrorKind, Result};
use crate::profiler::{DeviceRecord, DeviceSource, RawDevice};

/// Enumerates the whole udev database into [`DeviceRecord`]s
#[derive(Debug, Default)]
pub struct UdevSource;

impl UdevSource {
    /// New source over the system udev database
    pub fn new() -> Self {
        UdevSource
    }
}

fn property(device: &udevlib::Device, name: &str) -> Option<String> {
    device
        .property_value(name)
        .map(|v| v.to_string_lossy().to_string())
}

fn attribute(device: &udevlib::Device, name: &str) -> Option<String> {
    device
        .attribute_value(name)
        .map(|v| v.to_string_lossy().to_string())
}

impl DeviceSource for UdevSource {
    fn records(&self) -> Result<Vec<DeviceRecord>> {
        let mut enumerator = Enumerator::new().map_err(|e| {
            Error::new(
                ErrorKind::Udev,
                &format!("Failed to create udev enumerator: Error({e})"),
            )
        })?;
        let devices = enumerator.scan_devices().map_err(|e| {
            Error::new(
                ErrorKind::Udev,
                &format!("Failed to scan udev devices: Error({e})"),
            )
        })?;

        let mut records = Vec::new();
        for device in devices {
            let raw = RawDevice {
                devpath: device.devpath().to_string_lossy().to_string(),
                devtype: property(&device, "DEVTYPE"),
                devname: property(&device, "DEVNAME"),
                devlinks: property(&device, "DEVLINKS"),
                id_path: property(&device, "ID_PATH"),
                subsystem: property(&device, "SUBSYSTEM"),
                interface: property(&device, "INTERFACE"),
                tags: property(&device, "TAGS"),
                vendor_id: attribute(&device, "idVendor"),
                product_id: attribute(&device, "idProduct"),
                device_class: attribute(&device, "bDeviceClass"),
            };
            if let Some(record) = raw.adapt() {
                records.push(record);
            }
        }

        log::debug!("udev snapshot yielded {} USB records", records.len());
        Ok(records)
    }
}
