use std::sync::{Arc, Mutex, PoisonError};

use super::DiscoveredNode;

/// Receiver of nodes discovered while scanning responses.
///
/// Returning `false` tells the walker that this node and every later entry
/// of the same page are not needed, which also stops paging of that
/// collection.
pub trait NodeSink: Send {
    fn accept(&mut self, node: &Arc<DiscoveredNode>) -> bool;
}

impl<F> NodeSink for F
where
    F: FnMut(&Arc<DiscoveredNode>) -> bool + Send,
{
    fn accept(&mut self, node: &Arc<DiscoveredNode>) -> bool {
        self(node)
    }
}

/// Shared handle to the node sink of one sync pass.
///
/// Every query of a pass (batch chunks and their follow-up pages) holds a
/// clone of the same handle, so its mutex is the one lock serialising callback
/// execution across concurrently scanned pages. The lock is held only while
/// the sink runs, never across a network call.
#[derive(Clone)]
pub struct NodeCallback(Arc<Mutex<dyn NodeSink>>);

impl NodeCallback {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(&Arc<DiscoveredNode>) -> bool + Send + 'static,
    {
        Self(Arc::new(Mutex::new(callback)))
    }

    /// Wrap a sink the caller keeps a typed handle to, e.g. to drain it after
    /// the queries finished
    pub fn from_sink<S>(sink: Arc<Mutex<S>>) -> Self
    where
        S: NodeSink + 'static,
    {
        Self(sink)
    }

    /// Hand a node to the sink under the pass lock
    pub fn accept(&self, node: &Arc<DiscoveredNode>) -> bool {
        let mut sink = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        sink.accept(node)
    }
}

impl std::fmt::Debug for NodeCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NodeCallback")
    }
}
