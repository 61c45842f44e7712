//! Topology builder: assembles adapted device records into a rooted
//! forest of [`UsbDevice`] keyed by port path
//!
//! The forest is a plain owned-children tree; ports are physical so
//! parent/child linkage is structurally acyclic. Children are kept
//! sorted ascending by their final port component at all times since
//! both display order and env ordinal order depend on it.
use serde::Serialize;
use std::collections::BTreeMap;

use crate::labels::EnvCategory;
use crate::path::PortPath;
use crate::profiler::DeviceRecord;

/// USB class code reported by hubs in bDeviceClass
const USB_CLASS_HUB: u8 = 0x09;

/// Classification of an occupied port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    /// USB hub (bDeviceClass 0x09)
    Hub,
    /// Any other classified USB device
    Device,
    /// Occupied port whose device could not be classified, or a
    /// placeholder for an intermediate hub missing from the snapshot
    RootPort,
}

/// A Linux device node created for a USB device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DevNode {
    /// Device node path, e.g. `/dev/ttyUSB0`
    pub path: String,
    /// udev ID_PATH for the node if known
    pub id_path: Option<String>,
    /// DEVLINKS alias paths for the node
    pub links: Vec<String>,
}

/// One entry in the reconstructed USB tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsbDevice {
    /// Classification of the device on this port
    pub kind: DeviceKind,
    /// Physical position in the topology
    pub port_path: PortPath,
    /// Vendor id, absent for unclassified ports
    pub vendor_id: Option<u16>,
    /// Product id, absent for unclassified ports
    pub product_id: Option<u16>,
    /// udev ID_PATH of the device itself
    pub id_path: Option<String>,
    /// sysfs DEVPATH the device originated from
    pub syspath: Option<String>,
    /// udev tags attached to the device or its nodes
    pub tags: Vec<String>,
    /// Device nodes owned by this device
    pub nodes: Vec<DevNode>,
    /// Network interface names owned by this device
    pub net_interfaces: Vec<String>,
    /// Devices attached to this device's ports, sorted by port number
    pub children: Vec<UsbDevice>,
    /// Display label resolved from segment/mapping configuration
    pub label: Option<String>,
    /// Identifier of the segment that labelled this device
    pub segment: Option<String>,
    /// Env category resolved from segment/mapping configuration
    pub env: Option<EnvCategory>,
}

impl UsbDevice {
    /// New unclassified device at `port_path`
    pub fn new(port_path: PortPath) -> Self {
        UsbDevice {
            kind: DeviceKind::RootPort,
            port_path,
            vendor_id: None,
            product_id: None,
            id_path: None,
            syspath: None,
            tags: Vec::new(),
            nodes: Vec::new(),
            net_interfaces: Vec::new(),
            children: Vec::new(),
            label: None,
            segment: None,
            env: None,
        }
    }

    /// Attach `child`, keeping children sorted ascending by final port
    pub fn insert_child(&mut self, child: UsbDevice) {
        let at = self
            .children
            .partition_point(|c| c.port_path.port() <= child.port_path.port());
        self.children.insert(at, child);
    }

    /// Does this device or any descendant carry dev nodes or a
    /// classified non-hub device
    pub fn has_devices(&self) -> bool {
        self.kind == DeviceKind::Device
            || !self.nodes.is_empty()
            || !self.net_interfaces.is_empty()
            || self.children.iter().any(|c| c.has_devices())
    }

    fn merge_record(&mut self, record: DeviceRecord) {
        if let Some(usb) = &record.usb {
            self.kind = if usb.device_class == USB_CLASS_HUB {
                DeviceKind::Hub
            } else {
                DeviceKind::Device
            };
            self.vendor_id = Some(usb.vendor_id);
            self.product_id = Some(usb.product_id);
            self.syspath = Some(record.devpath.clone());
            if record.id_path.is_some() {
                self.id_path = record.id_path.clone();
            }
        }
        for tag in &record.tags {
            if !self.tags.contains(tag) {
                self.tags.push(tag.clone());
            }
        }
        if let Some(devname) = record.devname {
            self.nodes.push(DevNode {
                path: devname,
                id_path: record.id_path,
                links: record.links,
            });
        } else if let Some(interface) = record.interface {
            self.net_interfaces.push(interface);
        }
    }
}

/// Assemble adapted device records into a forest of [`UsbDevice`]
///
/// Records are indexed by port path and merged; placeholder
/// [`DeviceKind::RootPort`] entries are created for any intermediate
/// port with a confirmed occupant but no record of its own. An empty
/// record collection produces an empty forest.
pub fn build_tree(records: Vec<DeviceRecord>) -> Vec<UsbDevice> {
    let mut index: BTreeMap<PortPath, UsbDevice> = BTreeMap::new();

    for record in records {
        index
            .entry(record.port_path.clone())
            .or_insert_with(|| UsbDevice::new(record.port_path.clone()))
            .merge_record(record);
    }

    // placeholder ancestors for intermediate ports with no record
    let occupied: Vec<PortPath> = index.keys().cloned().collect();
    for path in occupied {
        let mut parent = path.parent();
        while let Some(p) = parent {
            parent = p.parent();
            index.entry(p.clone()).or_insert_with(|| UsbDevice::new(p));
        }
    }

    // attach deepest first so every parent is still in the index
    let mut paths: Vec<PortPath> = index.keys().cloned().collect();
    paths.sort_by_key(|p| std::cmp::Reverse(p.depth()));
    for path in paths {
        let Some(parent_path) = path.parent() else {
            continue;
        };
        if let Some(node) = index.remove(&path) {
            if let Some(parent) = index.get_mut(&parent_path) {
                parent.insert_child(node);
            }
        }
    }

    // remaining are root-level devices, in (bus, port) order
    index.into_values().collect()
}

/// Find the device at exactly `path` in the forest
pub fn find<'a>(forest: &'a [UsbDevice], path: &PortPath) -> Option<&'a UsbDevice> {
    for device in forest {
        if &device.port_path == path {
            return Some(device);
        }
        if path.starts_with(&device.port_path) {
            return find(&device.children, path);
        }
    }
    None
}

/// Find the port path of the device whose ID_PATH is exactly `id_path`
pub fn find_by_id_path(forest: &[UsbDevice], id_path: &str) -> Option<PortPath> {
    for device in forest {
        if device.id_path.as_deref() == Some(id_path) {
            return Some(device.port_path.clone());
        }
        if let Some(found) = find_by_id_path(&device.children, id_path) {
            return Some(found);
        }
    }
    None
}

/// Extract the subtree rooted at `path`, discarding the ancestor chain
///
/// Used by the label filter to re-base display on a segment's anchor.
/// Returns an empty forest if nothing sits at `path`.
pub fn rebase(forest: Vec<UsbDevice>, path: &PortPath) -> Vec<UsbDevice> {
    for device in forest {
        if &device.port_path == path {
            return vec![device];
        }
        if path.starts_with(&device.port_path) {
            return rebase(device.children, path);
        }
    }
    Vec::new()
}
