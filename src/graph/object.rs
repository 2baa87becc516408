//! Graph objects, ports and links

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ControlError;

/// Raw object properties (`node.name`, `media.class`, ...)
pub type Properties = BTreeMap<String, String>;

/// Object types mirrored from the live graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Node,
    Port,
    Device,
    Link,
    Module,
    Factory,
    Client,
}

impl ObjectType {
    pub const ALL: [ObjectType; 7] = [
        ObjectType::Node,
        ObjectType::Port,
        ObjectType::Device,
        ObjectType::Link,
        ObjectType::Module,
        ObjectType::Factory,
        ObjectType::Client,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::Node => "node",
            ObjectType::Port => "port",
            ObjectType::Device => "device",
            ObjectType::Link => "link",
            ObjectType::Module => "module",
            ObjectType::Factory => "factory",
            ObjectType::Client => "client",
        }
    }

    /// Map an interface type such as `PipeWire:Interface:Node`
    ///
    /// Types the control plane does not mirror (core, metadata, profiler, ...)
    /// map to `None`.
    pub fn from_interface(interface: &str) -> Option<Self> {
        let short = interface.rsplit(':').next().unwrap_or(interface);
        short.parse().ok()
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let singular = lower.strip_suffix("ies").map(|b| format!("{}y", b));
        let singular = singular
            .or_else(|| lower.strip_suffix('s').map(str::to_string))
            .unwrap_or_else(|| lower.clone());
        ObjectType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower || t.as_str() == singular)
            .ok_or_else(|| ControlError::validation(format!("unknown object type: {}", s)))
    }
}

/// An object as enumerated from the live graph, before indexing
#[derive(Debug, Clone, PartialEq)]
pub struct RawObject {
    pub id: u32,
    pub object_type: ObjectType,
    pub properties: Properties,
}

impl RawObject {
    pub fn new(id: u32, object_type: ObjectType) -> Self {
        Self {
            id,
            object_type,
            properties: Properties::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A graph object in a published snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphObject {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    #[serde(skip)]
    properties: Properties,
}

impl GraphObject {
    pub fn from_raw(raw: RawObject) -> Self {
        let name = display_name(raw.id, raw.object_type, &raw.properties);
        Self {
            id: raw.id,
            name,
            object_type: raw.object_type,
            properties: raw.properties,
        }
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Parse a numeric property such as `node.id`
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn media_class(&self) -> Option<&str> {
        self.get("media.class")
    }

    pub fn description(&self) -> Option<&str> {
        self.get("node.description")
            .or_else(|| self.get("device.description"))
            .or_else(|| self.get("port.alias"))
    }
}

const NAME_KEYS: [&str; 7] = [
    "node.name",
    "device.name",
    "port.name",
    "client.name",
    "module.name",
    "factory.name",
    "link.name",
];

fn display_name(id: u32, object_type: ObjectType, props: &Properties) -> String {
    if let Some(name) = NAME_KEYS.iter().find_map(|k| props.get(*k)) {
        return name.clone();
    }

    if object_type == ObjectType::Link {
        let get = |k: &str| props.get(k).map(String::as_str).unwrap_or("?");
        return format!(
            "{}:{} -> {}:{}",
            get("link.output.node"),
            get("link.output.port"),
            get("link.input.node"),
            get("link.input.port")
        );
    }

    props
        .get("object.path")
        .or_else(|| props.get("object.serial"))
        .cloned()
        .unwrap_or_else(|| format!("object-{}", id))
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    #[serde(rename = "in")]
    Input,
    #[serde(rename = "out")]
    Output,
}

impl PortDirection {
    pub fn from_property(value: &str) -> Option<Self> {
        match value {
            "in" | "input" => Some(PortDirection::Input),
            "out" | "output" => Some(PortDirection::Output),
            _ => None,
        }
    }

    pub fn as_property(self) -> &'static str {
        match self {
            PortDirection::Input => "in",
            PortDirection::Output => "out",
        }
    }
}

/// A port, named `<node_name>:<port_name>`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Port {
    pub id: u32,
    pub name: String,
    pub node_name: String,
    pub port_name: String,
    #[serde(skip)]
    pub node_id: u32,
    #[serde(skip)]
    pub direction: PortDirection,
}

/// A directed output→input link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub id: u32,
    pub output_port_id: u32,
    pub output_port_name: String,
    pub input_port_id: u32,
    pub input_port_name: String,
}
