//! Label resolver: rebases segment port rules onto mapping anchors and
//! annotates the topology with labels and env categories
use serde::Serialize;
use std::collections::HashMap;

use crate::config::{Anchor, Config, Segment};
use crate::path::PortPath;
use crate::tree::{self, UsbDevice};

/// Named env group a labelled device's nodes belong to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvCategory {
    /// Identifier of the owning segment
    pub segment: String,
    /// Category name within the segment
    pub category: String,
    /// Prefix a node name must carry to join the category
    pub match_prefix: Option<String>,
}

/// Annotation resolved for one absolute bus position
#[derive(Debug, Clone, PartialEq, Eq)]
struct PortLabel {
    segment: String,
    label: Option<String>,
    env: Option<EnvCategory>,
}

/// Segment/mapping pairs ready to resolve against a topology
///
/// Built once per pass from the validated [`Config`]; anchors are
/// looked up against the live tree at apply time since configuration
/// may refer to hardware not currently present.
#[derive(Debug, Default)]
pub struct LabelMap {
    entries: Vec<(Anchor, Segment)>,
}

impl LabelMap {
    /// Join each mapping to its segment
    pub fn new(config: &Config) -> LabelMap {
        let entries = config
            .mappings
            .iter()
            .filter_map(|mapping| {
                config
                    .segment(&mapping.identifier)
                    .map(|segment| (mapping.anchor.clone(), segment.clone()))
            })
            .collect();
        LabelMap { entries }
    }

    /// Resolve the anchor of segment `identifier` to an absolute port
    /// path in `forest`
    pub fn resolve_anchor(&self, identifier: &str, forest: &[UsbDevice]) -> Option<PortPath> {
        self.entries
            .iter()
            .find(|(_, s)| s.identifier == identifier)
            .and_then(|(anchor, _)| resolve(anchor, forest))
    }

    /// Annotate `forest` with labels and env categories
    ///
    /// Unresolvable anchors are skipped; hardware may legitimately be
    /// absent. When two rules claim the same absolute position the
    /// first one wins and the later claim is logged.
    pub fn apply(&self, forest: &mut [UsbDevice]) {
        let mut resolved: HashMap<PortPath, PortLabel> = HashMap::new();

        for (anchor, segment) in &self.entries {
            let Some(root) = resolve(anchor, forest) else {
                log::info!(
                    "Anchor for segment '{}' not present in topology, skipping",
                    segment.identifier
                );
                continue;
            };

            claim(
                &mut resolved,
                root.clone(),
                PortLabel {
                    segment: segment.identifier.clone(),
                    label: segment.label.clone(),
                    env: None,
                },
            );

            for rule in &segment.ports {
                let env = rule.env.as_ref().map(|category| EnvCategory {
                    segment: segment.identifier.clone(),
                    category: category.clone(),
                    match_prefix: rule.env_match.clone(),
                });
                claim(
                    &mut resolved,
                    root.extend(&rule.ports),
                    PortLabel {
                        segment: segment.identifier.clone(),
                        label: rule.label.clone(),
                        env,
                    },
                );
            }
        }

        annotate(forest, &resolved);
    }
}

fn resolve(anchor: &Anchor, forest: &[UsbDevice]) -> Option<PortPath> {
    match anchor {
        Anchor::Port(path) => tree::find(forest, path).map(|d| d.port_path.clone()),
        Anchor::IdPath(id_path) => tree::find_by_id_path(forest, id_path),
    }
}

fn claim(resolved: &mut HashMap<PortPath, PortLabel>, path: PortPath, label: PortLabel) {
    match resolved.entry(path) {
        std::collections::hash_map::Entry::Vacant(entry) => {
            entry.insert(label);
        }
        std::collections::hash_map::Entry::Occupied(entry) => {
            log::warn!(
                "Port {} already labelled by segment '{}', ignoring claim from '{}'",
                entry.key(),
                entry.get().segment,
                label.segment
            );
        }
    }
}

fn annotate(devices: &mut [UsbDevice], resolved: &HashMap<PortPath, PortLabel>) {
    for device in devices {
        if let Some(port_label) = resolved.get(&device.port_path) {
            device.segment = Some(port_label.segment.clone());
            device.label = port_label.label.clone();
            device.env = port_label.env.clone();
        }
        annotate(&mut device.children, resolved);
    }
}
