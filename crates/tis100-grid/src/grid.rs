//! The grid (C4's static topology) and its node storage.

use std::collections::HashSet;

use tis100_asm::{Direction, Program};
use tis100_core::{NodeId, NodeState};

use crate::loader::LoaderError;
use crate::sink::ObserverSink;

/// Grid-level wiring failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// A sink was requested on a node/direction with no neighbor there.
    #[error("node {0} has no neighbor in direction {1:?} to attach a sink to")]
    NoNeighbor(NodeId, Direction),
}

/// Either a running program or a receive-only observer (§9 design note).
///
/// The scheduler advances only [`GridNode::Programmed`]; the port fabric
/// dispatches writes on the variant, so a sink never needs its own mode
/// stack or pending-op machinery.
#[derive(Debug, Clone)]
pub enum GridNode {
    /// A node with a program loaded (or empty, if never loaded).
    Programmed(NodeState),
    /// A receive-only observer attached to another node's output.
    Sink(ObserverSink),
}

/// A fixed `W x H` array of nodes, wired to their orthogonal neighbors.
#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    nodes: Vec<GridNode>,
    neighbors: Vec<[Option<NodeId>; 4]>,
    disabled: HashSet<NodeId>,
}

impl Grid {
    /// Builds a grid of `width * height` nodes with row-major stable ids,
    /// wiring each interior cell to its upper and left neighbor (the
    /// complementary down/right links follow from the attach being
    /// bidirectional). Ids in `disabled` exist as positions but are
    /// skipped by both the loader and the scheduler.
    #[must_use]
    pub fn new(width: usize, height: usize, disabled: HashSet<NodeId>) -> Self {
        let count = width * height;
        let nodes = (0..count).map(|id| GridNode::Programmed(NodeState::new(id))).collect();
        let mut neighbors = vec![[None; 4]; count];

        for row in 0..height {
            for col in 0..width {
                let id = row * width + col;
                if row > 0 {
                    Self::attach(&mut neighbors, id - width, id, Direction::Down);
                }
                if col > 0 {
                    Self::attach(&mut neighbors, id - 1, id, Direction::Right);
                }
            }
        }

        Self {
            width,
            height,
            nodes,
            neighbors,
            disabled,
        }
    }

    fn attach(neighbors: &mut [[Option<NodeId>; 4]], a: NodeId, b: NodeId, dir: Direction) {
        debug_assert!(neighbors[a][dir as usize].is_none(), "attach is monotone");
        debug_assert!(
            neighbors[b][dir.opposite() as usize].is_none(),
            "attach is monotone"
        );
        neighbors[a][dir as usize] = Some(b);
        neighbors[b][dir.opposite() as usize] = Some(a);
    }

    /// Grid width in columns.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Grid height in rows.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Total node count, `width * height`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether `id` was marked disabled at construction.
    #[must_use]
    pub fn is_disabled(&self, id: NodeId) -> bool {
        self.disabled.contains(&id)
    }

    /// Every disabled id, in ascending order.
    pub fn disabled_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut ids: Vec<NodeId> = self.disabled.iter().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
    }

    /// The node at `id`.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &GridNode {
        &self.nodes[id]
    }

    /// Mutable access to the node at `id`.
    pub fn node_mut(&mut self, id: NodeId) -> &mut GridNode {
        &mut self.nodes[id]
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [GridNode] {
        &mut self.nodes
    }

    pub(crate) fn neighbor_table(&self) -> &[[Option<NodeId>; 4]] {
        &self.neighbors
    }

    /// The neighbor of `id` in `dir`, if wired.
    #[must_use]
    pub fn neighbor_of(&self, id: NodeId, dir: Direction) -> Option<NodeId> {
        self.neighbors[id][dir as usize]
    }

    /// Installs `program` onto the node at `id`.
    ///
    /// # Errors
    ///
    /// [`LoaderError::DisabledOrOutOfRange`] if `id` does not name a
    /// programmable node (out of bounds, disabled, or already a sink).
    pub fn install_program(&mut self, id: NodeId, program: Program) -> Result<(), LoaderError> {
        if id >= self.nodes.len() || self.is_disabled(id) {
            return Err(LoaderError::DisabledOrOutOfRange(id));
        }
        match &mut self.nodes[id] {
            GridNode::Programmed(node) => {
                node.load(program);
                Ok(())
            }
            GridNode::Sink(_) => Err(LoaderError::DisabledOrOutOfRange(id)),
        }
    }

    /// Replaces `source`'s neighbor in `dir` with a fresh observer sink,
    /// returning that sink's id (§4.5; canonically `dir == Direction::Down`).
    ///
    /// # Errors
    ///
    /// [`GridError::NoNeighbor`] if `source` has no neighbor in `dir`
    /// (a grid edge).
    pub fn attach_sink(&mut self, source: NodeId, dir: Direction) -> Result<NodeId, GridError> {
        let target = self
            .neighbor_of(source, dir)
            .ok_or(GridError::NoNeighbor(source, dir))?;
        self.nodes[target] = GridNode::Sink(ObserverSink::new());
        Ok(target)
    }

    /// The sink at `id`, if one is attached there.
    #[must_use]
    pub fn sink(&self, id: NodeId) -> Option<&ObserverSink> {
        match &self.nodes[id] {
            GridNode::Sink(sink) => Some(sink),
            GridNode::Programmed(_) => None,
        }
    }
}
