//! The grid scheduler (C4), observer sinks (C5), and the program-file
//! loader, integrating `tis100-asm` and `tis100-core` behind a single
//! [`Tis`] facade.

mod fabric;
mod grid;
mod loader;
mod scheduler;
mod sink;

pub use grid::{Grid, GridError, GridNode};
pub use loader::{resolve_node_id, LoaderError};
pub use scheduler::{CycleReport, Cycles, Tis};
pub use sink::ObserverSink;

pub use tis100_asm::Direction;
pub use tis100_core::{BadOperand, Mode, NodeId, NodeState};
