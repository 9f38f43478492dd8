//! The grid scheduler (C4): the `Tis` facade and its cycle stream.

use std::collections::{HashMap, VecDeque};

use tis100_asm::Direction;
use tis100_core::{BadOperand, Mode, NodeId, NodeState};

use crate::fabric::GridFabric;
use crate::grid::{Grid, GridNode};
use crate::loader::{load_program, LoaderError};

/// The outcome of one full scheduler pass over every loaded node.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// This cycle's ordinal, starting at 0.
    pub cycle: usize,
    /// Ids of every node that made observable progress this cycle (a read,
    /// a write, or a host-input injection) — used by callers that want to
    /// detect a quiescent cycle themselves (P4), though termination
    /// remains the host's call per §4.4.
    pub progressed: Vec<NodeId>,
}

/// Owns the grid, the host's buffered inputs, and the cycle counter.
///
/// Named after the original's `TIS` class. Does not decide when a run
/// ends: it streams cycles indefinitely via [`Tis::cycles`], and the host
/// inspects [`Tis::has_buffered_inputs`] and observer sink contents to
/// break out (§4.4).
pub struct Tis {
    grid: Grid,
    host_inputs: HashMap<(NodeId, Direction), VecDeque<i32>>,
    cycle: usize,
}

impl Tis {
    /// Wraps an already-wired, already-loaded [`Grid`].
    #[must_use]
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            host_inputs: HashMap::new(),
            cycle: 0,
        }
    }

    /// Parses and installs a program file's sections onto the grid.
    ///
    /// # Errors
    ///
    /// See [`LoaderError`].
    pub fn load(&mut self, source: &str) -> Result<(), LoaderError> {
        load_program(&mut self.grid, source)
    }

    /// Read-only access to the grid (topology, node/sink inspection).
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Mutable access to the grid, for attaching observer sinks post-load.
    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// Appends values to a node's host-input buffer for `dir` (§6.3 fixes
    /// `dir` to `Up` for the CLI, but the scheduler itself is direction-agnostic).
    pub fn buffer_input(&mut self, node: NodeId, dir: Direction, values: impl IntoIterator<Item = i32>) {
        self.host_inputs.entry((node, dir)).or_default().extend(values);
    }

    /// Whether any host-input buffer still holds an undelivered value.
    #[must_use]
    pub fn has_buffered_inputs(&self) -> bool {
        self.host_inputs.values().any(|queue| !queue.is_empty())
    }

    /// Advances every loaded, non-disabled node by exactly one suspension
    /// point, in stable row-major order, injecting at most one buffered
    /// host value per node beforehand (§4.4).
    ///
    /// # Errors
    ///
    /// [`BadOperand`] if any node's instruction dispatch fails; per §7
    /// this aborts the run.
    pub fn step_cycle(&mut self) -> Result<CycleReport, BadOperand> {
        let cycle = self.cycle;
        self.cycle += 1;
        let mut progressed = Vec::new();

        for id in 0..self.grid.len() {
            if self.grid.is_disabled(id) {
                continue;
            }
            if !matches!(self.grid.node(id), GridNode::Programmed(_)) {
                continue;
            }

            if self.inject_host_input(id) {
                progressed.push(id);
            }

            if self.advance_node(id)? {
                if !progressed.contains(&id) {
                    progressed.push(id);
                }
            }
        }

        Ok(CycleReport { cycle, progressed })
    }

    /// An endless iterator over [`Tis::step_cycle`] results.
    pub fn cycles(&mut self) -> Cycles<'_> {
        Cycles { tis: self }
    }

    fn inject_host_input(&mut self, id: NodeId) -> bool {
        let is_reading = matches!(self.grid.node(id), GridNode::Programmed(node) if node.mode() == Mode::Read);
        if !is_reading {
            return false;
        }

        let mut chosen = None;
        for dir in Direction::ALL {
            let occupied = match self.grid.node(id) {
                GridNode::Programmed(node) => node.input_occupied(dir),
                GridNode::Sink(_) => true,
            };
            if occupied {
                continue;
            }
            if let Some(queue) = self.host_inputs.get_mut(&(id, dir)) {
                if let Some(value) = queue.pop_front() {
                    chosen = Some((dir, value));
                    break;
                }
            }
        }

        match chosen {
            Some((dir, value)) => {
                if let GridNode::Programmed(node) = self.grid.node_mut(id) {
                    node.deliver_input(dir, value);
                }
                true
            }
            None => false,
        }
    }

    fn advance_node(&mut self, id: NodeId) -> Result<bool, BadOperand> {
        let placeholder = GridNode::Programmed(NodeState::new(id));
        let mut node_state = match std::mem::replace(self.grid.node_mut(id), placeholder) {
            GridNode::Programmed(node) => node,
            other @ GridNode::Sink(_) => {
                *self.grid.node_mut(id) = other;
                return Ok(false);
            }
        };

        let outcome = {
            let mut fabric = GridFabric {
                nodes: self.grid.nodes_mut(),
                neighbors: self.grid.neighbor_table(),
            };
            node_state.step(&mut fabric)
        };

        *self.grid.node_mut(id) = GridNode::Programmed(node_state);

        outcome.map(|outcome| outcome.progressed)
    }
}

/// Streams [`CycleReport`]s forever; see [`Tis::cycles`].
pub struct Cycles<'a> {
    tis: &'a mut Tis,
}

impl Iterator for Cycles<'_> {
    type Item = Result<CycleReport, BadOperand>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.tis.step_cycle())
    }
}
