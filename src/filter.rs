//! Filter engine: prunes the topology down to a requested view
//!
//! Five independent predicates evaluated as a conjunction. A match
//! always keeps the full ancestor chain for display context and the
//! full descendant subtree so nested matches are never truncated. An
//! unmatched filter value yields an empty result, not an error.
use crate::path::PortPath;
use crate::tree::UsbDevice;

/// Used to filter devices within the topology
#[derive(Debug, Default)]
pub struct Filter {
    /// Retain devices whose sysfs DEVPATH starts with this
    pub device_path: Option<String>,
    /// Retain devices at or below this port path
    pub port_path: Option<PortPath>,
    /// Retain devices carrying this udev tag
    pub tag: Option<String>,
    /// Retain devices whose ID_PATH starts with this
    pub id_path: Option<String>,
    /// Retain devices labelled by this segment identifier
    pub segment: Option<String>,
}

/// Path-based predicates already satisfied by an ancestor
#[derive(Debug, Default, Clone, Copy)]
struct Inherited {
    device_path: bool,
    id_path: bool,
}

impl Filter {
    /// Creates a new filter with defaults
    pub fn new() -> Self {
        Default::default()
    }

    /// Is any predicate set
    pub fn is_empty(&self) -> bool {
        self.device_path.is_none()
            && self.port_path.is_none()
            && self.tag.is_none()
            && self.id_path.is_none()
            && self.segment.is_none()
    }

    /// Retain only devices matching the filter, with ancestor chains
    /// and full matched subtrees
    pub fn retain(&self, forest: &mut Vec<UsbDevice>) {
        if self.is_empty() {
            return;
        }
        forest.retain_mut(|d| self.retain_device(d, Inherited::default()));
    }

    fn retain_device(&self, device: &mut UsbDevice, inherited: Inherited) -> bool {
        if self.is_match(device, inherited) {
            // whole subtree is part of the result
            return true;
        }
        let inherited = self.descend(device, inherited);
        device
            .children
            .retain_mut(|c| self.retain_device(c, inherited));
        // no match here; keep only as ancestor context
        !device.children.is_empty()
    }

    /// Checks whether `device` passes through filter
    fn is_match(&self, device: &UsbDevice, inherited: Inherited) -> bool {
        (self.port_path.as_ref().is_none_or(|p| device.port_path.starts_with(p)))
            && (self
                .device_path
                .as_ref()
                .is_none_or(|p| inherited.device_path || device_path_match(device, p)))
            && (self
                .id_path
                .as_ref()
                .is_none_or(|p| inherited.id_path || id_path_match(device, p)))
            && (self
                .tag
                .as_ref()
                .is_none_or(|t| device.tags.iter().any(|x| x == t)))
            && (self
                .segment
                .as_ref()
                .is_none_or(|s| device.segment.as_ref() == Some(s)))
    }

    fn descend(&self, device: &UsbDevice, mut inherited: Inherited) -> Inherited {
        if let Some(p) = &self.device_path {
            inherited.device_path |= device_path_match(device, p);
        }
        if let Some(p) = &self.id_path {
            inherited.id_path |= id_path_match(device, p);
        }
        inherited
    }
}

fn device_path_match(device: &UsbDevice, prefix: &str) -> bool {
    device
        .syspath
        .as_deref()
        .is_some_and(|s| s.starts_with(prefix))
}

fn id_path_match(device: &UsbDevice, prefix: &str) -> bool {
    device
        .id_path
        .as_deref()
        .is_some_and(|s| s.starts_with(prefix))
        || device
            .nodes
            .iter()
            .any(|n| n.id_path.as_deref().is_some_and(|s| s.starts_with(prefix)))
}

/// Remove hubs and unclassified ports with no devices anywhere below
///
/// Post-filter pass; idempotent. Classified devices are never removed
/// even when they expose no nodes.
pub fn prune_empty_hubs(forest: &mut Vec<UsbDevice>) {
    forest.retain_mut(keep_occupied);
}

fn keep_occupied(device: &mut UsbDevice) -> bool {
    device.children.retain_mut(keep_occupied);
    device.has_devices()
}

/// Accept `/sys` and `/sys/devices` prefixed variants of a device path
///
/// udev DEVPATH values start at `/devices`, but a user will usually
/// paste a path from a shell under `/sys`.
///
/// ```
/// use lsudt::filter::sanitise_device_path;
///
/// assert_eq!(sanitise_device_path("/sys/devices/pci0000:00"), "/devices/pci0000:00");
/// assert_eq!(sanitise_device_path("pci0000:00"), "/devices/pci0000:00");
/// assert_eq!(sanitise_device_path("/devices/pci0000:00"), "/devices/pci0000:00");
/// ```
pub fn sanitise_device_path(device_path: &str) -> String {
    let path = device_path.strip_prefix("/sys").unwrap_or(device_path);
    if path.starts_with("/devices") {
        path.to_string()
    } else {
        format!("/devices/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PortPath;
    use crate::profiler::{DeviceRecord, UsbInfo};
    use crate::tree::{self, build_tree, DeviceKind};
    use std::str::FromStr;

    fn record(
        port_path: &str,
        class: u8,
        devname: Option<&str>,
        tags: &[&str],
        id_path: Option<&str>,
    ) -> DeviceRecord {
        DeviceRecord {
            devpath: format!("/devices/pci0000:00/0000:00:14.0/usb1/{port_path}"),
            port_path: PortPath::from_str(port_path).unwrap(),
            usb: Some(UsbInfo {
                vendor_id: 0x0403,
                product_id: 0x6001,
                device_class: class,
            }),
            devname: devname.map(str::to_string),
            links: Vec::new(),
            id_path: id_path.map(str::to_string),
            interface: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn forest() -> Vec<UsbDevice> {
        build_tree(vec![
            record("1-10", 0x09, None, &[], None),
            record(
                "1-10.2",
                0x09,
                None,
                &[],
                Some("pci-0000:00:14.0-usb-0:10.2"),
            ),
            record(
                "1-10.2.3",
                0x00,
                Some("/dev/ttyUSB0"),
                &["uart"],
                Some("pci-0000:00:14.0-usb-0:10.2.3"),
            ),
            record("1-10.4", 0x00, Some("/dev/sda"), &[], None),
            record("2-1", 0x09, None, &[], None),
        ])
    }

    fn flatten_paths(devices: &[UsbDevice]) -> Vec<String> {
        let mut out = Vec::new();
        fn walk(devices: &[UsbDevice], out: &mut Vec<String>) {
            for d in devices {
                out.push(d.port_path.to_string());
                walk(&d.children, out);
            }
        }
        walk(devices, &mut out);
        out
    }

    #[test]
    fn test_no_filters_keeps_everything() {
        let mut f = forest();
        let before = flatten_paths(&f);
        Filter::new().retain(&mut f);
        assert_eq!(flatten_paths(&f), before);
    }

    #[test]
    fn test_port_path_keeps_ancestors_and_descendants() {
        let mut f = forest();
        let filter = Filter {
            port_path: Some(PortPath::from_str("1-10.2").unwrap()),
            ..Default::default()
        };
        filter.retain(&mut f);
        // ancestor 1-10 kept for context, subtree of 1-10.2 intact,
        // siblings and other buses pruned
        assert_eq!(flatten_paths(&f), vec!["1-10", "1-10.2", "1-10.2.3"]);
    }

    #[test]
    fn test_tag_filter_selects_device_with_ancestors() {
        let mut f = forest();
        let filter = Filter {
            tag: Some("uart".into()),
            ..Default::default()
        };
        filter.retain(&mut f);
        assert_eq!(flatten_paths(&f), vec!["1-10", "1-10.2", "1-10.2.3"]);
    }

    #[test]
    fn test_id_path_filter_matches_prefix_and_subtree() {
        let mut f = forest();
        let filter = Filter {
            id_path: Some("pci-0000:00:14.0-usb-0:10.2".into()),
            ..Default::default()
        };
        filter.retain(&mut f);
        assert_eq!(flatten_paths(&f), vec!["1-10", "1-10.2", "1-10.2.3"]);
    }

    #[test]
    fn test_device_path_filter() {
        let mut f = forest();
        let filter = Filter {
            device_path: Some(sanitise_device_path(
                "/sys/devices/pci0000:00/0000:00:14.0/usb1/1-10.4",
            )),
            ..Default::default()
        };
        filter.retain(&mut f);
        assert_eq!(flatten_paths(&f), vec!["1-10", "1-10.4"]);
    }

    #[test]
    fn test_conjunction_of_filters() {
        let mut f = forest();
        let filter = Filter {
            port_path: Some(PortPath::from_str("1-10").unwrap()),
            tag: Some("uart".into()),
            ..Default::default()
        };
        filter.retain(&mut f);
        assert_eq!(flatten_paths(&f), vec!["1-10", "1-10.2", "1-10.2.3"]);
    }

    #[test]
    fn test_unmatched_filter_empty_result() {
        let mut f = forest();
        let filter = Filter {
            tag: Some("nonexistent".into()),
            ..Default::default()
        };
        filter.retain(&mut f);
        assert!(f.is_empty());
    }

    #[test]
    fn test_prune_empty_hubs_idempotent() {
        let mut f = forest();
        prune_empty_hubs(&mut f);
        // bus 2 hub had no devices below it
        assert!(!flatten_paths(&f).contains(&"2-1".to_string()));
        assert!(flatten_paths(&f).contains(&"1-10.2".to_string()));

        let once = flatten_paths(&f);
        prune_empty_hubs(&mut f);
        assert_eq!(flatten_paths(&f), once);
    }

    #[test]
    fn test_prune_keeps_classified_devices() {
        let mut f = build_tree(vec![record("1-2", 0x00, None, &[], None)]);
        prune_empty_hubs(&mut f);
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].kind, DeviceKind::Device);
    }

    #[test]
    fn test_segment_filter() {
        let mut f = forest();
        // annotate as the label resolver would
        fn tag_segment(devices: &mut [UsbDevice], path: &PortPath, segment: &str) {
            for d in devices {
                if &d.port_path == path {
                    d.segment = Some(segment.into());
                }
                tag_segment(&mut d.children, path, segment);
            }
        }
        tag_segment(&mut f, &PortPath::from_str("1-10.2.3").unwrap(), "rig");
        let filter = Filter {
            segment: Some("rig".into()),
            ..Default::default()
        };
        filter.retain(&mut f);
        assert_eq!(flatten_paths(&f), vec!["1-10", "1-10.2", "1-10.2.3"]);
        let _ = tree::find(&f, &PortPath::from_str("1-10.2.3").unwrap()).unwrap();
    }
}
