use std::sync::{Arc, PoisonError, RwLock};

use mediaplat_core::sync;
use mediaplat_core::{Collection, Handle, PlatformError, Result};
use tracing::debug;

use crate::node::{Node, NodeType, TopoId};

#[derive(Debug)]
pub struct TopologyInner {
    id: u64,
    output_collections: bool,
    nodes: RwLock<Vec<Node>>,
}

impl Drop for TopologyInner {
    fn drop(&mut self) {
        let nodes = self.nodes.get_mut().unwrap_or_else(PoisonError::into_inner);
        for node in nodes.drain(..) {
            node.detach(self.id);
        }
    }
}

/// Handle to a topology: an ordered set of nodes with unique ids.
///
/// The topology holds a shared reference to each member. Releasing the
/// last topology handle releases those references; members still held
/// elsewhere survive and become detached.
#[derive(Debug, Clone)]
pub struct Topology {
    inner: Arc<TopologyInner>,
}

impl Handle for Topology {
    type Inner = TopologyInner;

    fn from_inner(inner: Arc<TopologyInner>) -> Self {
        Self { inner }
    }

    fn inner(&self) -> &Arc<TopologyInner> {
        &self.inner
    }
}

impl Topology {
    pub(crate) fn new(id: u64, output_collections: bool) -> Self {
        Self {
            inner: Arc::new(TopologyInner {
                id,
                output_collections,
                nodes: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Add a node. Fails without side effects if a member already carries
    /// the node's current id, or if the node belongs to another topology.
    pub fn add_node(&self, node: &Node) -> Result<()> {
        let mut nodes = sync::write(&self.inner.nodes);
        let id = node.id();
        if nodes.iter().any(|n| n.same_as(node) || n.id() == id) {
            debug!("Topology {}: node {:#x} already present", self.inner.id, id);
            return Err(PlatformError::InvalidArgument);
        }
        if !node.attach(self.inner.id) {
            debug!(
                "Topology {}: node {:#x} is owned by topology {:?}",
                self.inner.id,
                id,
                node.topology_id()
            );
            return Err(PlatformError::InvalidArgument);
        }
        nodes.push(node.clone());
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        sync::read(&self.inner.nodes).len()
    }

    /// Acquire the member at `index` (insertion order).
    pub fn node(&self, index: i32) -> Result<Node> {
        let nodes = sync::read(&self.inner.nodes);
        usize::try_from(index)
            .ok()
            .and_then(|i| nodes.get(i))
            .cloned()
            .ok_or(PlatformError::InvalidIndex)
    }

    /// Find the first member whose *current* id is `id`.
    pub fn node_by_id(&self, id: TopoId) -> Result<Node> {
        sync::read(&self.inner.nodes)
            .iter()
            .find(|n| n.id() == id)
            .cloned()
            .ok_or(PlatformError::NotFound)
    }

    /// Remove a member by handle identity. A different node carrying the
    /// same id is not a match.
    pub fn remove_node(&self, node: &Node) -> Result<()> {
        let mut nodes = sync::write(&self.inner.nodes);
        let pos = nodes
            .iter()
            .position(|n| n.same_as(node))
            .ok_or(PlatformError::InvalidArgument)?;
        let removed = nodes.remove(pos);
        removed.detach(self.inner.id);
        Ok(())
    }

    /// Release every member.
    pub fn clear(&self) {
        let mut nodes = sync::write(&self.inner.nodes);
        if !nodes.is_empty() {
            debug!("Topology {}: clearing {} nodes", self.inner.id, nodes.len());
        }
        for node in nodes.drain(..) {
            node.detach(self.inner.id);
        }
    }

    /// Snapshot of the members, in insertion order.
    pub fn nodes(&self) -> Vec<Node> {
        sync::read(&self.inner.nodes).clone()
    }

    /// Graph entry points: source-stream, tee and transform members with no
    /// input linked from a non-source node. Each call returns a new collection.
    pub fn source_node_collection(&self) -> Collection {
        let nodes = sync::read(&self.inner.nodes);
        Collection::from_objects(
            nodes
                .iter()
                .filter(|n| is_entry_point(n))
                .map(Node::to_object),
        )
    }

    /// Output members. Each call returns a new collection.
    pub fn output_node_collection(&self) -> Result<Collection> {
        if !self.inner.output_collections {
            return Err(PlatformError::Unsupported);
        }
        let nodes = sync::read(&self.inner.nodes);
        Ok(Collection::from_objects(
            nodes
                .iter()
                .filter(|n| n.node_type() == NodeType::Output)
                .map(Node::to_object),
        ))
    }
}

fn is_entry_point(node: &Node) -> bool {
    match node.node_type() {
        NodeType::SourceStream | NodeType::Tee | NodeType::Transform => node
            .upstream_types()
            .into_iter()
            .all(|t| t == NodeType::SourceStream),
        NodeType::Output => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> Topology {
        Topology::new(1, true)
    }

    #[test]
    fn empty_topology() {
        let t = topology();
        assert_eq!(t.node_count(), 0);
        assert_eq!(t.node(0).unwrap_err(), PlatformError::InvalidIndex);
        assert_eq!(t.node_by_id(1).unwrap_err(), PlatformError::NotFound);
        t.clear();
        t.clear();
        assert_eq!(t.node_count(), 0);
    }

    #[test]
    fn negative_index_is_invalid() {
        let t = topology();
        t.add_node(&Node::new(10, NodeType::Tee)).unwrap();
        assert!(t.node(0).is_ok());
        assert_eq!(t.node(-2).unwrap_err(), PlatformError::InvalidIndex);
        assert_eq!(t.node(1).unwrap_err(), PlatformError::InvalidIndex);
    }

    #[test]
    fn duplicate_id_is_rejected_without_mutation() {
        let t = topology();
        let a = Node::new(10, NodeType::Output);
        let b = Node::new(10, NodeType::Tee);

        t.add_node(&a).unwrap();
        assert_eq!(t.add_node(&b), Err(PlatformError::InvalidArgument));
        assert_eq!(t.add_node(&a), Err(PlatformError::InvalidArgument));
        assert_eq!(t.node_count(), 1);
        assert_eq!(b.topology_id(), None);
    }

    #[test]
    fn nodes_are_in_one_topology_at_a_time() {
        let t1 = Topology::new(1, true);
        let t2 = Topology::new(2, true);
        let a = Node::new(10, NodeType::Tee);

        t1.add_node(&a).unwrap();
        assert_eq!(t2.add_node(&a), Err(PlatformError::InvalidArgument));
        assert_eq!(t2.node_count(), 0);

        t1.remove_node(&a).unwrap();
        t2.add_node(&a).unwrap();
        assert_eq!(a.topology_id(), Some(2));
    }

    #[test]
    fn lookup_follows_reidentified_members() {
        let t = topology();
        let a = Node::new(10, NodeType::Output);
        t.add_node(&a).unwrap();

        a.set_id(11);
        assert!(t.node_by_id(11).unwrap().same_as(&a));
        assert_eq!(t.node_by_id(10).unwrap_err(), PlatformError::NotFound);
        assert_eq!(t.node_by_id(12).unwrap_err(), PlatformError::NotFound);
    }

    #[test]
    fn colliding_ids_resolve_to_first_member() {
        let t = topology();
        let a = Node::new(10, NodeType::Output);
        let b = Node::new(20, NodeType::Tee);
        t.add_node(&a).unwrap();
        t.add_node(&b).unwrap();

        b.set_id(10);
        assert!(t.node_by_id(10).unwrap().same_as(&a));
    }

    #[test]
    fn remove_matches_identity_not_id() {
        let t = topology();
        let a = Node::new(10, NodeType::Tee);
        let impostor = Node::new(10, NodeType::Tee);
        t.add_node(&a).unwrap();

        assert_eq!(t.remove_node(&impostor), Err(PlatformError::InvalidArgument));
        assert_eq!(t.node_count(), 1);

        t.remove_node(&a).unwrap();
        assert_eq!(t.node_count(), 0);
        assert_eq!(t.remove_node(&a), Err(PlatformError::InvalidArgument));
    }

    #[test]
    fn topology_holds_and_releases_references() {
        let a = Node::new(10, NodeType::Tee);
        {
            let t = topology();
            t.add_node(&a).unwrap();
            assert_eq!(a.ref_count(), 2);
            assert_eq!(a.topology_id(), Some(1));
        }
        assert_eq!(a.ref_count(), 1);
        assert_eq!(a.topology_id(), None);
    }

    #[test]
    fn clear_releases_members() {
        let t = topology();
        let a = Node::new(10, NodeType::Tee);
        t.add_node(&a).unwrap();
        t.clear();
        assert_eq!(a.ref_count(), 1);
        assert_eq!(a.topology_id(), None);
    }

    #[test]
    fn collections_are_snapshots() {
        let t = topology();
        let c1 = t.source_node_collection();
        let c2 = t.source_node_collection();
        assert!(!c1.same_as(&c2));

        c1.add_element(Some(c1.to_object()));
        assert_eq!(c1.count(), 1);
        assert_eq!(c2.count(), 0);
        assert_eq!(t.source_node_collection().count(), 0);
        c1.remove_all();
    }

    #[test]
    fn unlinked_stages_are_entry_points() {
        let t = topology();
        let src = Node::new(1, NodeType::SourceStream);
        let xform = Node::new(2, NodeType::Transform);
        let out = Node::new(3, NodeType::Output);
        for n in [&src, &xform, &out] {
            t.add_node(n).unwrap();
        }

        let sources: Vec<Node> = t.source_node_collection().handles();
        assert_eq!(sources.len(), 2);
        assert!(sources[0].same_as(&src));
        assert!(sources[1].same_as(&xform));

        let outputs: Vec<Node> = t.output_node_collection().unwrap().handles();
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].same_as(&out));
    }

    #[test]
    fn stage_fed_by_non_source_is_not_an_entry_point() {
        let t = topology();
        let src = Node::new(1, NodeType::SourceStream);
        let tee = Node::new(2, NodeType::Tee);
        let xform = Node::new(3, NodeType::Transform);
        for n in [&src, &tee, &xform] {
            t.add_node(n).unwrap();
        }
        src.connect_output(0, &tee, 0).unwrap();
        tee.connect_output(0, &xform, 0).unwrap();

        let sources: Vec<Node> = t.source_node_collection().handles();
        assert_eq!(sources.len(), 2);
        assert!(sources[0].same_as(&src));
        assert!(sources[1].same_as(&tee));

        tee.disconnect_output(0).unwrap();
        assert_eq!(t.source_node_collection().count(), 3);
    }

    #[test]
    fn output_collection_can_be_unsupported() {
        let t = Topology::new(1, false);
        assert_eq!(t.output_node_collection().unwrap_err(), PlatformError::Unsupported);
        assert_eq!(t.source_node_collection().count(), 0);
    }
}
