//! Env name generator: emits ordered, uniquely-suffixed `NAME=value`
//! bindings for labelled device nodes
//!
//! Candidates are collected per (segment, category) across the whole
//! tree walk then sorted lexicographically by path before ordinal
//! assignment, so `/dev/sda`, `/dev/sda1`, `/dev/sdb` always receive
//! ordinals 0, 1, 2 regardless of database report order.
use serde::Serialize;
use std::fmt;

use crate::labels::EnvCategory;
use crate::tree::UsbDevice;

/// One `NAME=value` environment binding in final emission order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvBinding {
    /// `UPPER(segment)_UPPER(category)_ordinal`
    pub name: String,
    /// Device node path, or interface name for net devices
    pub value: String,
}

impl fmt::Display for EnvBinding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Candidate values for one (segment, category) pair, in walk order
#[derive(Debug)]
struct Group {
    segment: String,
    category: String,
    values: Vec<String>,
}

/// Generate bindings from the filtered, labelled forest
///
/// Depth-first walk with children already sorted ascending; groups are
/// emitted in first-encounter order, values within a group sorted by
/// ordinary lexicographic string ordering with gap-free ordinals from
/// zero.
pub fn generate(forest: &[UsbDevice]) -> Vec<EnvBinding> {
    let mut groups: Vec<Group> = Vec::new();
    collect(forest, &mut groups);

    let mut bindings = Vec::new();
    for group in &mut groups {
        group.values.sort();
        let name_base = format!("{}_{}", env_key(&group.segment), env_key(&group.category));
        for (ordinal, value) in group.values.iter().enumerate() {
            bindings.push(EnvBinding {
                name: format!("{name_base}_{ordinal}"),
                value: value.clone(),
            });
        }
    }
    bindings
}

fn collect(devices: &[UsbDevice], groups: &mut Vec<Group>) {
    for device in devices {
        if let Some(env) = &device.env {
            let candidates = device
                .nodes
                .iter()
                .map(|n| n.path.as_str())
                .chain(device.net_interfaces.iter().map(String::as_str))
                .filter(|v| prefix_match(v, env.match_prefix.as_deref()));
            for value in candidates {
                group_for(groups, env).values.push(value.to_string());
            }
        }
        collect(&device.children, groups);
    }
}

fn group_for<'a>(groups: &'a mut Vec<Group>, env: &EnvCategory) -> &'a mut Group {
    if let Some(at) = groups
        .iter()
        .position(|g| g.segment == env.segment && g.category == env.category)
    {
        &mut groups[at]
    } else {
        groups.push(Group {
            segment: env.segment.clone(),
            category: env.category.clone(),
            values: Vec::new(),
        });
        let end = groups.len() - 1;
        &mut groups[end]
    }
}

/// Does the node name satisfy the category's prefix option
///
/// The prefix is matched against the file name of a device node path
/// (`sd` keeps `/dev/sda1`, drops `/dev/sg1`) or against a network
/// interface name directly.
fn prefix_match(value: &str, prefix: Option<&str>) -> bool {
    match prefix {
        Some(prefix) => value
            .rsplit('/')
            .next()
            .is_some_and(|name| name.starts_with(prefix)),
        None => true,
    }
}

/// Normalize an identifier or category for use in an env name
///
/// Uppercased with `-` and space replaced by `_`.
fn env_key(s: &str) -> String {
    s.to_uppercase().replace(['-', ' '], "_")
}
