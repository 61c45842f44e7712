//! Helper type for USB sysfs style port paths
//!
//! A port path identifies a physical position in the USB topology: the
//! bus number followed by the chain of hub ports walked to reach the
//! device, rendered `bus-port.port.port` as in Linux sysfs.
use itertools::Itertools;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, ErrorKind};

/// Position of a device in the USB topology: bus number and port chain
///
/// ```
/// use std::str::FromStr;
/// use lsudt::path::PortPath;
///
/// let path = PortPath::from_str("1-10.2.4").unwrap();
/// assert_eq!(path.bus(), 1);
/// assert_eq!(path.ports(), &[10, 2, 4]);
/// assert_eq!(path.to_string(), "1-10.2.4");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortPath {
    bus: u8,
    ports: Vec<u8>,
}

impl fmt::Display for PortPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.bus, self.ports.iter().format("."))
    }
}

impl FromStr for PortPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (bus, ports) = s.split_once('-').ok_or_else(|| {
            Error::new(
                ErrorKind::Parsing,
                &format!("Port path '{s}' missing bus separator '-'"),
            )
        })?;
        let bus = bus.parse::<u8>().map_err(|e| {
            Error::new(
                ErrorKind::Parsing,
                &format!("Invalid bus number in port path '{s}': {e}"),
            )
        })?;
        Ok(PortPath {
            bus,
            ports: parse_ports(ports)?,
        })
    }
}

impl Serialize for PortPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PortPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PortPathVisitor;

        impl Visitor<'_> for PortPathVisitor {
            type Value = PortPath;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a port path string 'bus-port.port...'")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                PortPath::from_str(value).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(PortPathVisitor)
    }
}

impl PortPath {
    /// New path from bus number and port chain
    pub fn new(bus: u8, ports: Vec<u8>) -> Self {
        PortPath { bus, ports }
    }

    /// USB bus (controller) number
    pub fn bus(&self) -> u8 {
        self.bus
    }

    /// Chain of hub ports from the bus root
    pub fn ports(&self) -> &[u8] {
        &self.ports
    }

    /// Final port component; the port on the immediate parent hub
    pub fn port(&self) -> u8 {
        *self.ports.last().unwrap_or(&0)
    }

    /// Depth in the topology; root-level devices have depth 1
    pub fn depth(&self) -> usize {
        self.ports.len()
    }

    /// Path of the parent hub, `None` for root-level devices
    ///
    /// ```
    /// use std::str::FromStr;
    /// use lsudt::path::PortPath;
    ///
    /// let path = PortPath::from_str("1-10.3.2").unwrap();
    /// assert_eq!(path.parent(), Some(PortPath::from_str("1-10.3").unwrap()));
    /// assert_eq!(PortPath::from_str("1-10").unwrap().parent(), None);
    /// ```
    pub fn parent(&self) -> Option<PortPath> {
        if self.ports.len() > 1 {
            Some(PortPath {
                bus: self.bus,
                ports: self.ports[..self.ports.len() - 1].to_vec(),
            })
        } else {
            None
        }
    }

    /// Path of a child on `port` of this device
    pub fn child(&self, port: u8) -> PortPath {
        let mut ports = self.ports.clone();
        ports.push(port);
        PortPath {
            bus: self.bus,
            ports,
        }
    }

    /// Rebase a relative port chain onto this path
    ///
    /// Used to place segment port rules below their mapping anchor;
    /// relative chains may be multi-level to reach grandchildren.
    ///
    /// ```
    /// use std::str::FromStr;
    /// use lsudt::path::PortPath;
    ///
    /// let anchor = PortPath::from_str("1-10.2").unwrap();
    /// assert_eq!(anchor.extend(&[4, 3]).to_string(), "1-10.2.4.3");
    /// ```
    pub fn extend(&self, relative: &[u8]) -> PortPath {
        let mut ports = self.ports.clone();
        ports.extend_from_slice(relative);
        PortPath {
            bus: self.bus,
            ports,
        }
    }

    /// Is `self` equal to or a descendant of `other`
    ///
    /// ```
    /// use std::str::FromStr;
    /// use lsudt::path::PortPath;
    ///
    /// let path = PortPath::from_str("1-10.2.4").unwrap();
    /// assert!(path.starts_with(&PortPath::from_str("1-10.2").unwrap()));
    /// assert!(path.starts_with(&path.clone()));
    /// assert!(!path.starts_with(&PortPath::from_str("1-10.3").unwrap()));
    /// assert!(!path.starts_with(&PortPath::from_str("2-10").unwrap()));
    /// ```
    pub fn starts_with(&self, other: &PortPath) -> bool {
        self.bus == other.bus && self.ports.starts_with(&other.ports)
    }

    /// Extract the port path from a udev DEVPATH
    ///
    /// Searches for the `usbN/N-P` root of the USB tree then takes the
    /// deepest path component below it, dropping any
    /// `:configuration.interface` suffix since only the physical
    /// topology is of interest.
    ///
    /// ```
    /// use lsudt::path::PortPath;
    ///
    /// let devpath = "/devices/pci0000:00/0000:00:14.0/usb1/1-10/1-10.3/1-10.3:1.0/ttyUSB0/tty/ttyUSB0";
    /// assert_eq!(PortPath::from_devpath(devpath).unwrap().to_string(), "1-10.3");
    /// assert_eq!(PortPath::from_devpath("/devices/platform/soc"), None);
    /// ```
    pub fn from_devpath(devpath: &str) -> Option<PortPath> {
        let parts: Vec<&str> = devpath.split('/').collect();
        // root of the USB tree: "usbN" followed by "N-P"
        let trunk = parts.windows(2).find_map(|w| {
            let bus = w[0].strip_prefix("usb")?;
            bus.chars().all(|c| c.is_ascii_digit()).then_some(())?;
            w[1].starts_with(&format!("{bus}-")).then_some(w[1])
        })?;

        // deepest component still on the trunk holds the full port chain
        parts
            .iter()
            .rev()
            .find(|p| p.starts_with(trunk))
            .and_then(|p| p.split(':').next())
            .and_then(|p| PortPath::from_str(p).ok())
    }
}

/// Parse a relative dot-separated port chain, e.g. `4.3`
pub fn parse_ports(s: &str) -> crate::error::Result<Vec<u8>> {
    s.split('.')
        .map(|p| {
            p.parse::<u8>().map_err(|e| {
                Error::new(
                    ErrorKind::Parsing,
                    &format!("Invalid port number '{p}': {e}"),
                )
            })
        })
        .collect()
}
