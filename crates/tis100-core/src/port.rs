//! The port fabric trait (C3).
//!
//! A [`NodeState`](crate::node::NodeState) never holds a reference to its
//! neighbors directly — ownership of the node array stays with whatever
//! assembles the grid (`tis100-grid`'s scheduler). Instead, every port
//! operation that touches a peer goes through this trait, the same way
//! the teacher's CPU never holds a reference to memory and instead goes
//! through a `Bus` trait. This keeps the interpreter free of aliasing
//! concerns and leaves the scheduler as the sole owner of nodes, per the
//! source's neighbor-reference redesign note.

use tis100_asm::Direction;

/// A node's stable identity: its row-major index in the grid.
pub type NodeId = usize;

/// The interface a node uses to reach its neighbors.
///
/// Implementors own the neighbor topology and every node's input slots;
/// a node only ever touches its own `inputs` array directly and defers to
/// this trait for anything involving another node.
pub trait PortFabric {
    /// The neighbor wired to `from` in `dir`, if any (grid edges have none).
    fn neighbor_of(&self, from: NodeId, dir: Direction) -> Option<NodeId>;

    /// Whether `peer`'s input slot on `dir` currently holds a value (P1).
    fn peer_input_occupied(&self, peer: NodeId, dir: Direction) -> bool;

    /// Appends `value` to `peer`'s input slot on `dir`.
    ///
    /// Callers must check [`PortFabric::peer_input_occupied`] first; this
    /// is a strict queue-append, not a check-and-set.
    fn deliver(&mut self, peer: NodeId, dir: Direction, value: i32);
}
