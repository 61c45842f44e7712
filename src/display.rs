//! Renderer: turns the filtered, labelled forest into indented text
//!
//! Stateless; purely a function of (forest, display options). The env
//! emission mode bypasses this entirely.
use colored::*;
use std::fmt::Write;

use crate::error::Result;
use crate::tree::{DeviceKind, UsbDevice};

/// Indent added per tree level
const INDENT: usize = 4;
/// Extra indent for device node lines under their device
const NODE_INDENT: usize = 3;

/// Options controlling what the renderer shows
#[derive(Debug, Default, Clone)]
pub struct DisplayOptions {
    /// Show `/dev/bus/usb/` device nodes, hidden by default
    pub show_devusb: bool,
    /// Annotate device nodes with their udev ID_PATH
    pub show_id_path: bool,
    /// Show DEVLINKS alias paths under each device node
    pub show_device_links: bool,
}

/// Render the forest as indented text, one top-level subtree per block
pub fn render(forest: &[UsbDevice], options: &DisplayOptions) -> String {
    let mut out = String::new();
    for device in forest {
        render_device(&mut out, device, 0, options);
        out.push('\n');
    }
    out
}

fn render_device(out: &mut String, device: &UsbDevice, depth: usize, options: &DisplayOptions) {
    let space = " ".repeat(depth * INDENT);
    let name = device.label.clone().unwrap_or_else(|| match device.kind {
        DeviceKind::Hub => "Hub".into(),
        DeviceKind::Device => "Device".into(),
        DeviceKind::RootPort => String::new(),
    });

    // unclassified ports carry no vendor/product info
    let _ = match (device.vendor_id, device.product_id) {
        (Some(vid), Some(pid)) => writeln!(
            out,
            "{}Port {}: {} ({}:{} / {})",
            space,
            device.port_path.port(),
            name.blue(),
            format!("{vid:x}").yellow().bold(),
            format!("{pid:x}").yellow(),
            device.port_path,
        ),
        _ if name.is_empty() => writeln!(
            out,
            "{}Port {}: ({})",
            space,
            device.port_path.port(),
            device.port_path,
        ),
        _ => writeln!(
            out,
            "{}Port {}: {} ({})",
            space,
            device.port_path.port(),
            name.blue(),
            device.port_path,
        ),
    };

    let node_space = " ".repeat(depth * INDENT + NODE_INDENT);
    for node in &device.nodes {
        if !options.show_devusb && node.path.starts_with("/dev/bus/usb") {
            continue;
        }
        let id_path = match (&node.id_path, options.show_id_path) {
            (Some(id_path), true) => format!(" ({id_path})"),
            _ => String::new(),
        };
        let _ = writeln!(out, "{}{}{}", node_space, node.path.green(), id_path);
        if options.show_device_links {
            for link in &node.links {
                let _ = writeln!(out, "{}: {}", node_space, link.bright_black());
            }
        }
    }
    for interface in &device.net_interfaces {
        let _ = writeln!(out, "{}Net: {}", node_space, interface.cyan());
    }

    for child in &device.children {
        render_device(out, child, depth + 1, options);
    }
}

/// Render the forest as JSON for machine consumption
pub fn render_json(forest: &[UsbDevice]) -> Result<String> {
    Ok(serde_json::to_string_pretty(forest)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PortPath;
    use crate::profiler::{DeviceRecord, UsbInfo};
    use crate::tree::build_tree;
    use std::str::FromStr;

    fn no_colour() {
        colored::control::set_override(false);
    }

    fn forest() -> Vec<UsbDevice> {
        let mut forest = build_tree(vec![
            DeviceRecord {
                devpath: "/devices/pci0000:00/0000:00:14.0/usb1/1-10".into(),
                port_path: PortPath::from_str("1-10").unwrap(),
                usb: Some(UsbInfo {
                    vendor_id: 0x2109,
                    product_id: 0x3431,
                    device_class: 0x09,
                }),
                devname: None,
                links: Vec::new(),
                id_path: None,
                interface: None,
                tags: Vec::new(),
            },
            DeviceRecord {
                devpath: "/devices/pci0000:00/0000:00:14.0/usb1/1-10/1-10.3".into(),
                port_path: PortPath::from_str("1-10.3").unwrap(),
                usb: Some(UsbInfo {
                    vendor_id: 0x0403,
                    product_id: 0x6001,
                    device_class: 0x00,
                }),
                devname: None,
                links: Vec::new(),
                id_path: None,
                interface: None,
                tags: Vec::new(),
            },
            DeviceRecord {
                devpath: "/devices/pci0000:00/0000:00:14.0/usb1/1-10/1-10.3/1-10.3:1.0/ttyUSB0"
                    .into(),
                port_path: PortPath::from_str("1-10.3").unwrap(),
                usb: None,
                devname: Some("/dev/ttyUSB0".into()),
                links: vec!["/dev/serial/by-id/usb-FTDI".into()],
                id_path: Some("pci-0000:00:14.0-usb-0:10.3:1.0".into()),
                interface: None,
                tags: Vec::new(),
            },
            DeviceRecord {
                devpath: "/devices/pci0000:00/0000:00:14.0/usb1/1-10/1-10.3/usbdev".into(),
                port_path: PortPath::from_str("1-10.3").unwrap(),
                usb: None,
                devname: Some("/dev/bus/usb/001/004".into()),
                links: Vec::new(),
                id_path: None,
                interface: None,
                tags: Vec::new(),
            },
        ]);
        forest[0].children[0].label = Some("Raspberry Pi UART".into());
        forest
    }

    #[test]
    fn test_render_tree() {
        no_colour();
        let text = render(&forest(), &DisplayOptions::default());
        let expected = "\
Port 10: Hub (2109:3431 / 1-10)
    Port 3: Raspberry Pi UART (403:6001 / 1-10.3)
       /dev/ttyUSB0
";
        assert_eq!(text, format!("{expected}\n"));
    }

    #[test]
    fn test_render_devusb_and_id_path() {
        no_colour();
        let options = DisplayOptions {
            show_devusb: true,
            show_id_path: true,
            show_device_links: true,
        };
        let text = render(&forest(), &options);
        assert!(text.contains("/dev/bus/usb/001/004"));
        assert!(text.contains("/dev/ttyUSB0 (pci-0000:00:14.0-usb-0:10.3:1.0)"));
        assert!(text.contains(": /dev/serial/by-id/usb-FTDI"));
    }

    #[test]
    fn test_render_unclassified_port() {
        no_colour();
        let device = UsbDevice::new(PortPath::from_str("1-2").unwrap());
        let text = render(&[device], &DisplayOptions::default());
        assert_eq!(text, "Port 2: (1-2)\n\n");
    }

    #[test]
    fn test_render_json_round_trips_paths() {
        let json = render_json(&forest()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["port_path"], "1-10");
    }
}
