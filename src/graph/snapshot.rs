//! Immutable point-in-time view of the live graph
//!
//! A snapshot is built once from the enumerated raw objects and never changes
//! afterwards. Ports and links are derived from the port and link objects'
//! properties and indexed by id and by name.

use std::collections::{BTreeMap, HashMap};

use super::object::{GraphObject, Link, ObjectType, Port, PortDirection, RawObject};

#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    objects: BTreeMap<u32, GraphObject>,
    ports: BTreeMap<u32, Port>,
    links: BTreeMap<u32, Link>,
    /// Lowest id carrying each name
    by_name: HashMap<String, u32>,
    port_by_name: HashMap<String, u32>,
}

impl GraphSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Index raw objects. A duplicated id keeps the last object enumerated.
    pub fn from_raw(raw: Vec<RawObject>) -> Self {
        let mut objects = BTreeMap::new();
        for obj in raw {
            let obj = GraphObject::from_raw(obj);
            objects.insert(obj.id, obj);
        }

        let mut by_name = HashMap::new();
        for obj in objects.values() {
            by_name.entry(obj.name.clone()).or_insert(obj.id);
        }

        let ports = derive_ports(&objects);
        let port_by_name = ports
            .values()
            .map(|p| (p.name.clone(), p.id))
            .collect();
        let links = derive_links(&objects, &ports);

        Self {
            objects,
            ports,
            links,
            by_name,
            port_by_name,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&GraphObject> {
        self.objects.get(&id)
    }

    /// All objects in id order
    pub fn objects(&self) -> impl Iterator<Item = &GraphObject> {
        self.objects.values()
    }

    /// Objects of one type in id order, or all of them
    pub fn list(&self, filter: Option<ObjectType>) -> Vec<GraphObject> {
        self.objects
            .values()
            .filter(|o| filter.map_or(true, |t| o.object_type == t))
            .cloned()
            .collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&GraphObject> {
        self.by_name.get(name).and_then(|id| self.objects.get(id))
    }

    /// Find a node by `node.name`
    pub fn find_node(&self, name: &str) -> Option<&GraphObject> {
        self.objects
            .values()
            .find(|o| o.object_type == ObjectType::Node && o.get("node.name") == Some(name))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphObject> {
        self.of_type(ObjectType::Node)
    }

    pub fn devices(&self) -> impl Iterator<Item = &GraphObject> {
        self.of_type(ObjectType::Device)
    }

    fn of_type(&self, t: ObjectType) -> impl Iterator<Item = &GraphObject> {
        self.objects.values().filter(move |o| o.object_type == t)
    }

    pub fn port(&self, id: u32) -> Option<&Port> {
        self.ports.get(&id)
    }

    pub fn port_by_name(&self, name: &str) -> Option<&Port> {
        self.port_by_name.get(name).and_then(|id| self.ports.get(id))
    }

    /// Ports in id order, optionally of one direction
    pub fn ports(&self, direction: Option<PortDirection>) -> Vec<Port> {
        self.ports
            .values()
            .filter(|p| direction.map_or(true, |d| p.direction == d))
            .cloned()
            .collect()
    }

    pub fn node_ports(&self, node_id: u32) -> impl Iterator<Item = &Port> {
        self.ports.values().filter(move |p| p.node_id == node_id)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn link(&self, id: u32) -> Option<&Link> {
        self.links.get(&id)
    }

    /// Link between two port ids, if one exists
    pub fn find_link(&self, output_port_id: u32, input_port_id: u32) -> Option<&Link> {
        self.links
            .values()
            .find(|l| l.output_port_id == output_port_id && l.input_port_id == input_port_id)
    }
}

fn derive_ports(objects: &BTreeMap<u32, GraphObject>) -> BTreeMap<u32, Port> {
    let mut ports = BTreeMap::new();
    for obj in objects.values().filter(|o| o.object_type == ObjectType::Port) {
        let Some(node_id) = obj.get_u32("node.id") else {
            continue;
        };
        let Some(direction) = obj.get("port.direction").and_then(PortDirection::from_property)
        else {
            continue;
        };
        let node_name = match objects.get(&node_id) {
            Some(node) => node.name.clone(),
            None => continue,
        };
        let port_name = obj.get("port.name").unwrap_or(obj.name.as_str()).to_string();

        ports.insert(
            obj.id,
            Port {
                id: obj.id,
                name: format!("{}:{}", node_name, port_name),
                node_name,
                port_name,
                node_id,
                direction,
            },
        );
    }
    ports
}

fn derive_links(
    objects: &BTreeMap<u32, GraphObject>,
    ports: &BTreeMap<u32, Port>,
) -> BTreeMap<u32, Link> {
    let mut links = BTreeMap::new();
    for obj in objects.values().filter(|o| o.object_type == ObjectType::Link) {
        let (Some(out_id), Some(in_id)) = (
            obj.get_u32("link.output.port"),
            obj.get_u32("link.input.port"),
        ) else {
            continue;
        };
        let (Some(out_port), Some(in_port)) = (ports.get(&out_id), ports.get(&in_id)) else {
            continue;
        };

        links.insert(
            obj.id,
            Link {
                id: obj.id,
                output_port_id: out_id,
                output_port_name: out_port.name.clone(),
                input_port_id: in_id,
                input_port_name: in_port.name.clone(),
            },
        );
    }
    links
}
