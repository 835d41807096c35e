use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use mediaplat_core::sync;
use mediaplat_core::{Handle, Object, PlatformError, Result};
use serde::{Deserialize, Serialize};

/// 64-bit node identifier: creating process id in the upper half, a
/// non-zero local counter in the lower half.
pub type TopoId = u64;

/// The fixed set of pipeline stage kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Output = 0,
    SourceStream = 1,
    Transform = 2,
    Tee = 3,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Output => write!(f, "Output"),
            NodeType::SourceStream => write!(f, "SourceStream"),
            NodeType::Transform => write!(f, "Transform"),
            NodeType::Tee => write!(f, "Tee"),
        }
    }
}

impl TryFrom<u32> for NodeType {
    type Error = PlatformError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(NodeType::Output),
            1 => Ok(NodeType::SourceStream),
            2 => Ok(NodeType::Transform),
            3 => Ok(NodeType::Tee),
            _ => Err(PlatformError::InvalidArgument),
        }
    }
}

/// One end of a link: the peer node and the slot index on the peer.
#[derive(Debug, Clone)]
struct Link {
    node: Weak<NodeInner>,
    index: u32,
}

impl Link {
    fn points_at(&self, node: &Arc<NodeInner>, index: u32) -> bool {
        self.index == index && std::ptr::eq(self.node.as_ptr(), Arc::as_ptr(node))
    }
}

#[derive(Debug)]
pub struct NodeInner {
    id: AtomicU64,
    node_type: NodeType,
    /// Id of the owning topology, 0 while detached.
    owner: AtomicU64,
    object: RwLock<Option<Object>>,
    inputs: Mutex<Vec<Option<Link>>>,
    outputs: Mutex<Vec<Option<Link>>>,
}

/// Handle to a topology node.
///
/// Links between nodes are weak: connecting two nodes never keeps either
/// of them alive, and a link to a destroyed peer reads as disconnected.
#[derive(Debug, Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Handle for Node {
    type Inner = NodeInner;

    fn from_inner(inner: Arc<NodeInner>) -> Self {
        Self { inner }
    }

    fn inner(&self) -> &Arc<NodeInner> {
        &self.inner
    }
}

impl Node {
    pub(crate) fn new(id: TopoId, node_type: NodeType) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                id: AtomicU64::new(id),
                node_type,
                owner: AtomicU64::new(0),
                object: RwLock::new(None),
                inputs: Mutex::new(Vec::new()),
                outputs: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> TopoId {
        self.inner.id.load(Ordering::Relaxed)
    }

    /// Re-identify the node. Uniqueness is only checked when the node is
    /// added to a topology; lookups by id always see the current value.
    pub fn set_id(&self, id: TopoId) {
        self.inner.id.store(id, Ordering::Relaxed);
    }

    pub fn node_type(&self) -> NodeType {
        self.inner.node_type
    }

    /// Id of the topology this node currently belongs to.
    pub fn topology_id(&self) -> Option<u64> {
        match self.inner.owner.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    /// Claim the node for a topology. Fails if another topology owns it.
    pub(crate) fn attach(&self, topology_id: u64) -> bool {
        self.inner
            .owner
            .compare_exchange(0, topology_id, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn detach(&self, topology_id: u64) {
        let _ = self.inner.owner.compare_exchange(
            topology_id,
            0,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Attach the media object this node stands for (or clear it).
    pub fn set_object(&self, object: Option<Object>) {
        *sync::write(&self.inner.object) = object;
    }

    pub fn object(&self) -> Result<Object> {
        sync::read(&self.inner.object)
            .clone()
            .ok_or(PlatformError::NotFound)
    }

    // ── Links ─────────────────────────────────────────────────────

    /// Connect output `output_index` of this node to input `input_index`
    /// of `downstream`, replacing whatever either slot was linked to.
    pub fn connect_output(&self, output_index: u32, downstream: &Node, input_index: u32) -> Result<()> {
        if self.node_type() == NodeType::Output || downstream.node_type() == NodeType::SourceStream {
            return Err(PlatformError::InvalidArgument);
        }

        let _ = self.disconnect_output(output_index);
        downstream.disconnect_input(input_index);

        set_slot(
            &mut sync::lock(&self.inner.outputs),
            output_index,
            Link { node: Arc::downgrade(&downstream.inner), index: input_index },
        );
        set_slot(
            &mut sync::lock(&downstream.inner.inputs),
            input_index,
            Link { node: Arc::downgrade(&self.inner), index: output_index },
        );
        Ok(())
    }

    /// Break the link leaving output `output_index`.
    pub fn disconnect_output(&self, output_index: u32) -> Result<()> {
        let link = take_slot(&mut sync::lock(&self.inner.outputs), output_index)
            .ok_or(PlatformError::InvalidIndex)?;
        if let Some(peer) = link.node.upgrade() {
            let mut inputs = sync::lock(&peer.inputs);
            if let Some(slot) = inputs.get_mut(link.index as usize) {
                if slot.as_ref().is_some_and(|back| back.points_at(&self.inner, output_index)) {
                    *slot = None;
                }
            }
        }
        Ok(())
    }

    fn disconnect_input(&self, input_index: u32) {
        let Some(link) = take_slot(&mut sync::lock(&self.inner.inputs), input_index) else {
            return;
        };
        if let Some(peer) = link.node.upgrade() {
            let mut outputs = sync::lock(&peer.outputs);
            if let Some(slot) = outputs.get_mut(link.index as usize) {
                if slot.as_ref().is_some_and(|back| back.points_at(&self.inner, input_index)) {
                    *slot = None;
                }
            }
        }
    }

    /// Upstream node feeding input `index`, with the upstream output index.
    pub fn input(&self, index: u32) -> Result<(Node, u32)> {
        resolve(&sync::lock(&self.inner.inputs), index)
    }

    /// Downstream node fed by output `index`, with the downstream input index.
    pub fn output(&self, index: u32) -> Result<(Node, u32)> {
        resolve(&sync::lock(&self.inner.outputs), index)
    }

    pub fn input_count(&self) -> usize {
        sync::lock(&self.inner.inputs).len()
    }

    pub fn output_count(&self) -> usize {
        sync::lock(&self.inner.outputs).len()
    }

    /// Types of the live nodes linked into this node's inputs.
    pub(crate) fn upstream_types(&self) -> Vec<NodeType> {
        sync::lock(&self.inner.inputs)
            .iter()
            .flatten()
            .filter_map(|link| link.node.upgrade())
            .map(|peer| peer.node_type)
            .collect()
    }
}

fn set_slot(slots: &mut Vec<Option<Link>>, index: u32, link: Link) {
    let index = index as usize;
    if slots.len() <= index {
        slots.resize_with(index + 1, || None);
    }
    slots[index] = Some(link);
}

fn take_slot(slots: &mut [Option<Link>], index: u32) -> Option<Link> {
    slots.get_mut(index as usize).and_then(Option::take)
}

fn resolve(slots: &[Option<Link>], index: u32) -> Result<(Node, u32)> {
    slots
        .get(index as usize)
        .and_then(Option::as_ref)
        .and_then(|link| link.node.upgrade().map(|inner| (Node { inner }, link.index)))
        .ok_or(PlatformError::InvalidIndex)
}
