//! Live graph access
//!
//! Every call into the live graph goes through [`GraphConnection`], which
//! serializes them behind one mutex. Backends never see concurrent calls.

use parking_lot::Mutex;

use super::object::RawObject;
use crate::error::Result;
use crate::params::value::ParamMap;

/// Operations the control plane needs from the live audio graph
pub trait LiveGraph: Send {
    /// Enumerate every object the backend knows about
    fn enumerate(&mut self) -> Result<Vec<RawObject>>;

    /// Read a node's `Props` parameters
    fn node_params(&mut self, node_id: u32) -> Result<ParamMap>;

    /// Write a batch of parameters in one call
    fn set_node_params(&mut self, node_id: u32, params: &ParamMap) -> Result<()>;

    /// Link an output port to an input port, returning the new link id
    fn create_link(&mut self, output_port: u32, input_port: u32) -> Result<u32>;

    fn destroy_link(&mut self, link_id: u32) -> Result<()>;

    /// Linear volume, or `None` if the object has no volume control
    fn volume(&mut self, id: u32) -> Result<Option<f32>>;

    fn set_volume(&mut self, id: u32, volume: f32) -> Result<()>;
}

/// The single serialized connection to the live graph
pub struct GraphConnection {
    inner: Mutex<Box<dyn LiveGraph>>,
}

impl GraphConnection {
    pub fn new(backend: impl LiveGraph + 'static) -> Self {
        Self {
            inner: Mutex::new(Box::new(backend)),
        }
    }

    /// Run `f` with exclusive access to the backend
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn LiveGraph) -> R) -> R {
        let mut guard = self.inner.lock();
        f(guard.as_mut())
    }
}

impl std::fmt::Debug for GraphConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphConnection").finish_non_exhaustive()
    }
}
