//! The single-node TIS-100 interpreter (C2) and its port fabric seam (C3).
//!
//! This crate has no notion of a grid: it defines what one node is and how
//! it advances by a single suspension point, and the [`PortFabric`] trait a
//! grid implementation must provide to let that node see its neighbors.
//! Assembling many [`NodeState`]s into a simulated machine is the job of
//! `tis100-grid`.

mod error;
mod mode;
mod node;
mod port;

pub use error::BadOperand;
pub use mode::{Mode, ModeStack};
pub use node::{NodeState, StepOutcome, CLAMP_MAX, CLAMP_MIN};
pub use port::{NodeId, PortFabric};

pub use tis100_asm::Direction;
