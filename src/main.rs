use clap::Parser;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use lsudt::config::Config;
use lsudt::display::{self, DisplayOptions};
use lsudt::env::{self, EnvBinding};
use lsudt::error::Result;
use lsudt::filter::{self, Filter};
use lsudt::labels::LabelMap;
use lsudt::path::PortPath;
use lsudt::profiler::{self, DeviceSource};
use lsudt::tree::{self, UsbDevice};
use lsudt::wait::{ThreadSleeper, WaitController};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Show /dev/bus/usb/ device nodes
    #[arg(short = 'u', long, default_value_t = false)]
    show_devusb: bool,

    /// Show udev ID_PATH next to device nodes
    #[arg(short = 's', long, default_value_t = false)]
    show_idpath: bool,

    /// Show empty hubs
    #[arg(short = 'e', long, default_value_t = false)]
    show_empty_hubs: bool,

    /// Show device links
    #[arg(short = 'l', long, default_value_t = false)]
    show_device_links: bool,

    /// Limit output to devices contained within a path starting with /sys/devices/
    #[arg(short = 'd', long)]
    device_path: Option<String>,

    /// Limit output to devices downstream of a particular port path
    #[arg(short = 'p', long)]
    port_path: Option<String>,

    /// Limit output to devices downstream of a particular labelled segment
    #[arg(short = 'b', long)]
    label: Option<String>,

    /// Limit output to devices with a udev tag
    #[arg(short = 't', long)]
    udev_tag: Option<String>,

    /// Limit output to devices with an ID_PATH starting with the given value
    #[arg(short = 'i', long)]
    udev_idpath: Option<String>,

    /// Print NAME=value environment bindings for labelled device nodes instead of the tree
    #[arg(long, default_value_t = false)]
    env: bool,

    /// Wait until all given environment names exist, then print all bindings; implies --env
    #[arg(short = 'w', long = "wait-for", value_name = "NAME")]
    wait_for: Vec<String>,

    /// Sampling attempts while waiting; -1 retries forever
    #[arg(short = 'r', long, default_value_t = 10, allow_negative_numbers = true)]
    retries: i32,

    /// Seconds to sleep between wait attempts
    #[arg(long, default_value_t = 1)]
    interval: u64,

    /// Output the filtered tree as JSON rather than text
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Turn debugging information on. Alternatively can use RUST_LOG environment variable
    #[arg(short = 'z', long, action = clap::ArgAction::Count)]
    debug: u8,
}

/// One complete snapshot-build-label-filter pass
fn snapshot(
    source: &impl DeviceSource,
    labels: &LabelMap,
    filter: &Filter,
    show_empty_hubs: bool,
) -> Result<Vec<UsbDevice>> {
    let mut forest = tree::build_tree(source.records()?);
    labels.apply(&mut forest);
    filter.retain(&mut forest);

    // re-base display on the segment's anchor when filtering by label
    if let Some(segment) = &filter.segment {
        match labels.resolve_anchor(segment, &forest) {
            Some(anchor) => forest = tree::rebase(forest, &anchor),
            None => forest.clear(),
        }
    }

    if !show_empty_hubs {
        filter::prune_empty_hubs(&mut forest);
    }
    Ok(forest)
}

fn print_bindings(bindings: &[EnvBinding]) {
    for binding in bindings {
        println!("{binding}");
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    lsudt::set_log_level(args.debug)?;

    let config = Config::load()?;
    let labels = LabelMap::new(&config);

    let filter = Filter {
        device_path: args
            .device_path
            .as_deref()
            .map(filter::sanitise_device_path),
        port_path: args
            .port_path
            .as_deref()
            .map(PortPath::from_str)
            .transpose()?,
        tag: args.udev_tag,
        id_path: args.udev_idpath,
        segment: args.label,
    };

    let source = profiler::system_source()?;

    if !args.wait_for.is_empty() {
        let controller = WaitController::new(args.retries, Duration::from_secs(args.interval));
        let mut sampler = || {
            snapshot(&source, &labels, &filter, args.show_empty_hubs)
                .map(|forest| env::generate(&forest))
        };
        let bindings = controller.wait(&args.wait_for, &mut sampler, &mut ThreadSleeper)?;
        print_bindings(&bindings);
        return Ok(());
    }

    let forest = snapshot(&source, &labels, &filter, args.show_empty_hubs)?;

    if args.env {
        print_bindings(&env::generate(&forest));
    } else if args.json {
        println!("{}", display::render_json(&forest)?);
    } else {
        let options = DisplayOptions {
            show_devusb: args.show_devusb,
            show_id_path: args.show_idpath,
            show_device_links: args.show_device_links,
        };
        print!("{}", display::render(&forest, &options));
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("lsudt: {e:#}");
            ExitCode::FAILURE
        }
    }
}
