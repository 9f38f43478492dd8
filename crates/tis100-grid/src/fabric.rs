//! The concrete [`PortFabric`] implementation over a live node array.
//!
//! Borrowed only for the duration of a single node's [`NodeState::step`]
//! call (see `scheduler.rs`): the node currently stepping has been
//! temporarily swapped out of the array it borrows, so there is no
//! aliasing between the node under its own mutation and the fabric it
//! reaches its peers through.

use tis100_asm::Direction;
use tis100_core::{NodeId, PortFabric};

use crate::grid::GridNode;

pub(crate) struct GridFabric<'a> {
    pub(crate) nodes: &'a mut [GridNode],
    pub(crate) neighbors: &'a [[Option<NodeId>; 4]],
}

impl PortFabric for GridFabric<'_> {
    fn neighbor_of(&self, from: NodeId, dir: Direction) -> Option<NodeId> {
        self.neighbors[from][dir as usize]
    }

    fn peer_input_occupied(&self, peer: NodeId, dir: Direction) -> bool {
        match &self.nodes[peer] {
            GridNode::Programmed(node) => node.input_occupied(dir),
            // A sink never accumulates a pending slot; it drains on arrival.
            GridNode::Sink(_) => false,
        }
    }

    fn deliver(&mut self, peer: NodeId, dir: Direction, value: i32) {
        match &mut self.nodes[peer] {
            GridNode::Programmed(node) => node.deliver_input(dir, value),
            GridNode::Sink(sink) => sink.receive(value),
        }
    }
}
