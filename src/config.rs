//! Segment and mapping configuration for lsudt
//!
//! Configuration lives in `~/.lsudt/` as any number of `.yml` files,
//! each holding `segments` (relocatable port-to-label/env rules) and
//! `mappings` (absolute anchors placing a segment onto the topology).
//! Files merge into one configuration set; the schema is checked
//! strictly at load time so malformed files fail up front rather than
//! surfacing as missing labels later.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, ErrorKind, Result};
use crate::path::{parse_ports, PortPath};

/// Directory under the user's home dir scanned for config files
pub const CONFIG_DIR: &str = ".lsudt";
/// Suffix of configuration files within [`CONFIG_DIR`]
pub const CONFIG_SUFFIX: &str = ".yml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    segments: Vec<RawSegment>,
    #[serde(default)]
    mappings: Vec<RawMapping>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSegment {
    identifier: String,
    label: Option<String>,
    #[serde(default)]
    ports: Vec<RawPortRule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPortRule {
    port: String,
    label: Option<String>,
    env: Option<String>,
    env_match: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMapping {
    identifier: String,
    port: Option<String>,
    id_path: Option<String>,
}

/// One labelled port within a [`Segment`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortRule {
    /// Relative port chain below the segment anchor, may be multi-level
    pub ports: Vec<u8>,
    /// Display label for the device at this port
    pub label: Option<String>,
    /// Env category name for the device's nodes
    pub env: Option<String>,
    /// Prefix a node name must carry to join the env category
    pub env_match: Option<String>,
}

/// A reusable, relocatable set of port-to-label/env-category rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Identifier matched against [`Mapping::identifier`]
    pub identifier: String,
    /// Label for the anchor device itself
    pub label: Option<String>,
    /// Rules for ports below the anchor
    pub ports: Vec<PortRule>,
}

/// Absolute anchor placing a segment onto the live topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Anchor {
    /// Anchor at an exact bus-port-path
    Port(PortPath),
    /// Anchor at the device whose udev ID_PATH matches exactly
    IdPath(String),
}

/// Binds a [`Segment`] identifier to an [`Anchor`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mapping {
    /// Identifier of the segment this mapping places
    pub identifier: String,
    /// Where the segment's relative rules are rebased
    pub anchor: Anchor,
}

/// Merged, validated configuration set
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// All loaded segments
    pub segments: Vec<Segment>,
    /// All loaded mappings
    pub mappings: Vec<Mapping>,
}

impl Config {
    /// Empty configuration
    pub fn new() -> Config {
        Default::default()
    }

    /// Load and merge all `.yml` files from `~/.lsudt/`
    ///
    /// A missing config directory is not an error; labelling is
    /// optional.
    pub fn load() -> Result<Config> {
        match dirs::home_dir().map(|h| h.join(CONFIG_DIR)) {
            Some(dir) if dir.is_dir() => Config::from_dir(&dir),
            _ => Ok(Config::new()),
        }
    }

    /// Load and merge all config files within `dir`
    pub fn from_dir(dir: &Path) -> Result<Config> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.to_str().is_some_and(|p| p.ends_with(CONFIG_SUFFIX)))
            .collect();
        // deterministic merge order regardless of directory iteration
        files.sort();

        let mut config = Config::new();
        for file in files {
            log::debug!("Reading config {}", file.display());
            let data = fs::read_to_string(&file)?;
            let parsed = Config::from_str(&data).map_err(|e| {
                Error::new(
                    ErrorKind::Config,
                    &format!("Unable to parse {}: {:#}", file.display(), e),
                )
            })?;
            config.merge(parsed)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn merge(&mut self, other: Config) -> Result<()> {
        for segment in other.segments {
            if self.segments.iter().any(|s| s.identifier == segment.identifier) {
                return Err(Error::new(
                    ErrorKind::Config,
                    &format!("Duplicate segment identifier '{}'", segment.identifier),
                ));
            }
            self.segments.push(segment);
        }
        for mapping in other.mappings {
            if self.mappings.iter().any(|m| m.identifier == mapping.identifier) {
                return Err(Error::new(
                    ErrorKind::Config,
                    &format!("Duplicate mapping identifier '{}'", mapping.identifier),
                ));
            }
            self.mappings.push(mapping);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for mapping in &self.mappings {
            if !self.segments.iter().any(|s| s.identifier == mapping.identifier) {
                return Err(Error::new(
                    ErrorKind::Config,
                    &format!(
                        "Mapping '{}' references an unknown segment identifier",
                        mapping.identifier
                    ),
                ));
            }
        }
        Ok(())
    }

    /// The segment named `identifier`, if loaded
    pub fn segment(&self, identifier: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.identifier == identifier)
    }

    /// The mapping for segment `identifier`, if loaded
    pub fn mapping(&self, identifier: &str) -> Option<&Mapping> {
        self.mappings.iter().find(|m| m.identifier == identifier)
    }
}

impl FromStr for Config {
    type Err = Error;

    /// Parse one configuration file's YAML into a (unvalidated) set
    fn from_str(s: &str) -> Result<Config> {
        let file: ConfigFile = serde_yaml::from_str(s)?;

        let segments = file
            .segments
            .into_iter()
            .map(|raw| {
                let ports = raw
                    .ports
                    .into_iter()
                    .map(|rule| {
                        Ok(PortRule {
                            ports: parse_ports(&rule.port).map_err(|e| {
                                Error::new(
                                    ErrorKind::Config,
                                    &format!(
                                        "Segment '{}': malformed port '{}': {:#}",
                                        raw.identifier, rule.port, e
                                    ),
                                )
                            })?,
                            label: rule.label,
                            env: rule.env,
                            env_match: rule.env_match,
                        })
                    })
                    .collect::<Result<Vec<PortRule>>>()?;
                Ok(Segment {
                    identifier: raw.identifier,
                    label: raw.label,
                    ports,
                })
            })
            .collect::<Result<Vec<Segment>>>()?;

        let mappings = file
            .mappings
            .into_iter()
            .map(|raw| {
                let anchor = match (raw.port, raw.id_path) {
                    (Some(port), None) => Anchor::Port(PortPath::from_str(&port).map_err(|e| {
                        Error::new(
                            ErrorKind::Config,
                            &format!(
                                "Mapping '{}': malformed port path '{}': {:#}",
                                raw.identifier, port, e
                            ),
                        )
                    })?),
                    (None, Some(id_path)) => Anchor::IdPath(id_path),
                    _ => {
                        return Err(Error::new(
                            ErrorKind::Config,
                            &format!(
                                "Mapping '{}' must set exactly one of 'port' or 'id_path'",
                                raw.identifier
                            ),
                        ))
                    }
                };
                Ok(Mapping {
                    identifier: raw.identifier,
                    anchor,
                })
            })
            .collect::<Result<Vec<Mapping>>>()?;

        Ok(Config { segments, mappings })
    }
}
