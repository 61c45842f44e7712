//! Full pipeline tests driving a mock device source through build,
//! label, filter and env generation
use std::str::FromStr;

use lsudt::config::Config;
use lsudt::display::{self, DisplayOptions};
use lsudt::env;
use lsudt::error::Result;
use lsudt::filter::{self, Filter};
use lsudt::labels::LabelMap;
use lsudt::path::PortPath;
use lsudt::profiler::{DeviceRecord, DeviceSource, RawDevice};
use lsudt::tree::{self, UsbDevice};

/// Mock device database yielding canned raw properties
struct MockSource {
    raw: Vec<RawDevice>,
}

impl DeviceSource for MockSource {
    fn records(&self) -> Result<Vec<DeviceRecord>> {
        Ok(self.raw.iter().cloned().filter_map(RawDevice::adapt).collect())
    }
}

fn usb_device(port_path: &str, vid: &str, pid: &str, class: &str) -> RawDevice {
    RawDevice {
        devpath: format!("/devices/pci0000:00/0000:00:14.0/usb1/{port_path}"),
        devtype: Some("usb_device".into()),
        subsystem: Some("usb".into()),
        vendor_id: Some(vid.into()),
        product_id: Some(pid.into()),
        device_class: Some(class.into()),
        ..Default::default()
    }
}

fn dev_node(port_path: &str, devname: &str) -> RawDevice {
    RawDevice {
        devpath: format!(
            "/devices/pci0000:00/0000:00:14.0/usb1/{port_path}/{port_path}:1.0/node"
        ),
        devname: Some(devname.into()),
        subsystem: Some("tty".into()),
        ..Default::default()
    }
}

/// Hub at 1-10 with a downstream hub at 1-10.2 carrying a serial
/// adapter on port 3 and disks on port 4
fn rig() -> MockSource {
    MockSource {
        raw: vec![
            usb_device("1-10", "2109", "3431", "09"),
            usb_device("1-10/1-10.2", "2109", "2817", "09"),
            usb_device("1-10/1-10.2/1-10.2.3", "0403", "6001", "00"),
            dev_node("1-10/1-10.2/1-10.2.3", "/dev/ttyUSB0"),
            usb_device("1-10/1-10.2/1-10.2.4", "0781", "5583", "00"),
            dev_node("1-10/1-10.2/1-10.2.4", "/dev/sdb"),
            dev_node("1-10/1-10.2/1-10.2.4", "/dev/sda1"),
            dev_node("1-10/1-10.2/1-10.2.4", "/dev/sda"),
            dev_node("1-10/1-10.2/1-10.2.4", "/dev/sg0"),
        ],
    }
}

const CONFIG: &str = "
segments:
  - identifier: raspberry_pi
    label: Raspberry Pi
    ports:
      - port: '3'
        label: Raspberry Pi UART
        env: UART
      - port: '4'
        label: Raspberry Pi disk
        env: DISK
        env_match: sd
mappings:
  - identifier: raspberry_pi
    port: 1-10.2
";

fn pipeline(source: &impl DeviceSource, config: &str, filter: &Filter) -> Vec<UsbDevice> {
    let config = Config::from_str(config).unwrap();
    let labels = LabelMap::new(&config);
    let mut forest = tree::build_tree(source.records().unwrap());
    labels.apply(&mut forest);
    filter.retain(&mut forest);
    if let Some(segment) = &filter.segment {
        match labels.resolve_anchor(segment, &forest) {
            Some(anchor) => forest = tree::rebase(forest, &anchor),
            None => forest.clear(),
        }
    }
    filter::prune_empty_hubs(&mut forest);
    forest
}

fn assert_rendered(expected: &str, actual: &str) {
    if expected != actual {
        let diff_text = diff::lines(expected, actual)
            .into_iter()
            .map(|diff| match diff {
                diff::Result::Left(l) => format!("-{l}"),
                diff::Result::Both(l, _) => format!(" {l}"),
                diff::Result::Right(r) => format!("+{r}"),
            })
            .collect::<Vec<_>>()
            .join("\n");
        panic!("rendered output did not match expected:\n{diff_text}\n");
    }
}

#[test]
fn test_emission_mode_exact_binding() {
    let forest = pipeline(&rig(), CONFIG, &Filter::new());
    let bindings = env::generate(&forest);
    let rendered: Vec<String> = bindings.iter().map(|b| b.to_string()).collect();
    assert_eq!(
        rendered,
        vec![
            "RASPBERRY_PI_UART_0=/dev/ttyUSB0",
            "RASPBERRY_PI_DISK_0=/dev/sda",
            "RASPBERRY_PI_DISK_1=/dev/sda1",
            "RASPBERRY_PI_DISK_2=/dev/sdb",
        ]
    );
}

#[test]
fn test_rendered_tree_with_labels() {
    colored::control::set_override(false);
    let forest = pipeline(&rig(), CONFIG, &Filter::new());
    let text = display::render(&forest, &DisplayOptions::default());
    let expected = "\
Port 10: Hub (2109:3431 / 1-10)
    Port 2: Raspberry Pi (2109:2817 / 1-10.2)
        Port 3: Raspberry Pi UART (403:6001 / 1-10.2.3)
           /dev/ttyUSB0
        Port 4: Raspberry Pi disk (781:5583 / 1-10.2.4)
           /dev/sdb
           /dev/sda1
           /dev/sda
           /dev/sg0

";
    assert_rendered(expected, &text);
}

#[test]
fn test_label_filter_rebases_display_root() {
    let filter = Filter {
        segment: Some("raspberry_pi".into()),
        ..Default::default()
    };
    let forest = pipeline(&rig(), CONFIG, &filter);
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].port_path, PortPath::from_str("1-10.2").unwrap());
    assert_eq!(forest[0].label.as_deref(), Some("Raspberry Pi"));
}

#[test]
fn test_unknown_label_filter_empty_not_error() {
    let filter = Filter {
        segment: Some("ghost".into()),
        ..Default::default()
    };
    let forest = pipeline(&rig(), CONFIG, &filter);
    assert!(forest.is_empty());
}

#[test]
fn test_port_path_filter_keeps_nested_matches() {
    let filter = Filter {
        port_path: Some(PortPath::from_str("1-10.2").unwrap()),
        ..Default::default()
    };
    let forest = pipeline(&rig(), CONFIG, &filter);
    // ancestor chain retained down to the match, subtree intact
    assert_eq!(forest[0].port_path, PortPath::from_str("1-10").unwrap());
    let anchor = &forest[0].children[0];
    assert_eq!(anchor.children.len(), 2);
}

#[test]
fn test_wait_controller_over_live_pipeline() {
    use lsudt::wait::{Sleeper, WaitController};
    use std::time::Duration;

    struct NoopSleeper;
    impl Sleeper for NoopSleeper {
        fn sleep(&mut self, _d: Duration) {}
    }

    // device appears on the third snapshot
    let present = rig();
    let absent = MockSource {
        raw: vec![usb_device("1-10", "2109", "3431", "09")],
    };
    let mut attempts = 0;
    let mut sampler = || -> Result<Vec<lsudt::env::EnvBinding>> {
        attempts += 1;
        let source: &MockSource = if attempts < 3 { &absent } else { &present };
        Ok(env::generate(&pipeline(source, CONFIG, &Filter::new())))
    };

    let controller = WaitController::new(5, Duration::from_secs(1));
    let bindings = controller
        .wait(
            &["RASPBERRY_PI_UART_0".into()],
            &mut sampler,
            &mut NoopSleeper,
        )
        .unwrap();
    assert_eq!(attempts, 3);
    assert!(bindings
        .iter()
        .any(|b| b.to_string() == "RASPBERRY_PI_UART_0=/dev/ttyUSB0"));
}
