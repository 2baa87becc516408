//! Live graph mirror
//!
//! - `backend`: the `LiveGraph` trait and the serialized connection
//! - `memory` / `pipewire`: backend implementations
//! - `snapshot` / `cache`: immutable views and the published listing
//! - `links`: link CRUD against the live graph
//! - `link_rules`: configured link rules and the relink scheduler
//! - `dot`: Graphviz rendering

pub mod backend;
pub mod cache;
pub mod dot;
pub mod link_rules;
pub mod links;
pub mod memory;
pub mod object;
pub mod pipewire;
pub mod snapshot;

pub use backend::{GraphConnection, LiveGraph};
pub use cache::GraphCache;
pub use dot::render_dot;
pub use link_rules::{
    LinkRule, LinkRuleResult, LinkRuleSet, LinkRuleStatus, LinkScheduler, LinkType, NodeIdentifier,
};
pub use links::{LinkExists, LinkManager};
pub use memory::MemoryGraph;
pub use object::{GraphObject, Link, ObjectType, Port, PortDirection, Properties, RawObject};
pub use pipewire::PwCliGraph;
pub use snapshot::GraphSnapshot;
