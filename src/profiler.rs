//! Device record adapter and the device database provider boundary
//!
//! [`DeviceSource`] is the seam to the operating system's device
//! database; the Linux udev implementation lives in
//! [`udev`](crate::profiler::udev) behind the `udev` feature. Tests
//! substitute a mock source yielding canned [`DeviceRecord`]s.
use crate::error::Result;
use crate::path::PortPath;

#[cfg(all(target_os = "linux", feature = "udev"))]
pub mod udev;

/// USB identity read from a `usb_device` entry's sysfs attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbInfo {
    /// idVendor
    pub vendor_id: u16,
    /// idProduct
    pub product_id: u16,
    /// bDeviceClass; hubs report 0x09
    pub device_class: u8,
}

/// One device database entry normalized to a uniform shape
///
/// Each record sits on the USB bus at `port_path` but may itself be a
/// USB device, a device node (tty, block, hidraw...) or a network
/// interface hanging off one.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    /// udev DEVPATH the record came from
    pub devpath: String,
    /// Physical position derived from the DEVPATH
    pub port_path: PortPath,
    /// USB identity when the record is a `usb_device`
    pub usb: Option<UsbInfo>,
    /// DEVNAME device node path
    pub devname: Option<String>,
    /// DEVLINKS alias paths
    pub links: Vec<String>,
    /// udev ID_PATH
    pub id_path: Option<String>,
    /// Network interface name for `net` subsystem records
    pub interface: Option<String>,
    /// udev tags
    pub tags: Vec<String>,
}

/// Raw udev properties of one device, before adaptation
///
/// All fields are optional strings as udev reports them; [`RawDevice::adapt`]
/// turns them into a typed [`DeviceRecord`] or discards the entry.
#[derive(Debug, Default, Clone)]
pub struct RawDevice {
    /// DEVPATH property
    pub devpath: String,
    /// DEVTYPE property
    pub devtype: Option<String>,
    /// DEVNAME property
    pub devname: Option<String>,
    /// DEVLINKS property, space separated
    pub devlinks: Option<String>,
    /// ID_PATH property
    pub id_path: Option<String>,
    /// SUBSYSTEM property
    pub subsystem: Option<String>,
    /// INTERFACE property for net devices
    pub interface: Option<String>,
    /// TAGS property, colon separated
    pub tags: Option<String>,
    /// idVendor sysfs attribute, base16
    pub vendor_id: Option<String>,
    /// idProduct sysfs attribute, base16
    pub product_id: Option<String>,
    /// bDeviceClass sysfs attribute, base16
    pub device_class: Option<String>,
}

impl RawDevice {
    /// Normalize into a [`DeviceRecord`]
    ///
    /// Returns `None` for entries that are not on the USB bus (no port
    /// path can be derived from the DEVPATH). USB identity is only
    /// taken from `usb_device` entries; an entry on the bus may well be
    /// scsi, net etc.
    pub fn adapt(self) -> Option<DeviceRecord> {
        let port_path = PortPath::from_devpath(&self.devpath)?;

        let usb = if self.devtype.as_deref() == Some("usb_device") {
            match (
                parse_base16(self.vendor_id.as_deref()),
                parse_base16(self.product_id.as_deref()),
                parse_base16(self.device_class.as_deref()),
            ) {
                (Some(vendor_id), Some(product_id), Some(device_class)) => Some(UsbInfo {
                    vendor_id,
                    product_id,
                    device_class: device_class as u8,
                }),
                _ => {
                    log::debug!("usb_device at {} missing id attributes", self.devpath);
                    None
                }
            }
        } else {
            None
        };

        let interface = if self.subsystem.as_deref() == Some("net") {
            self.interface
        } else {
            None
        };

        Some(DeviceRecord {
            devpath: self.devpath,
            port_path,
            usb,
            devname: self.devname,
            links: self
                .devlinks
                .map(|l| l.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            id_path: self.id_path,
            interface,
            tags: self
                .tags
                .map(|t| {
                    t.split(':')
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

fn parse_base16(value: Option<&str>) -> Option<u16> {
    u16::from_str_radix(value?.trim(), 16).ok()
}

/// Snapshot provider for the current device database state
pub trait DeviceSource {
    /// Yield all device records for the current snapshot
    fn records(&self) -> Result<Vec<DeviceRecord>>;
}

/// The device database backend this build was compiled with
pub fn system_source() -> Result<Box<dyn DeviceSource>> {
    #[cfg(all(target_os = "linux", feature = "udev"))]
    {
        Ok(Box::new(udev::UdevSource::new()))
    }
    #[cfg(not(all(target_os = "linux", feature = "udev")))]
    {
        Err(crate::error::Error::new(
            crate::error::ErrorKind::Other("udev"),
            "lsudt was built without a device database backend; enable the 'udev' feature on Linux",
        ))
    }
}

impl DeviceSource for Box<dyn DeviceSource> {
    fn records(&self) -> Result<Vec<DeviceRecord>> {
        self.as_ref().records()
    }
}
