//! The per-node instruction interpreter (C2).
//!
//! The source models each instruction as a Python generator suspending on
//! `yield`. This redesign replaces the generator with an explicit
//! resumable state machine stored on the node (§9): [`PendingOp`] records
//! exactly what the node is in the middle of, and [`NodeState::step`]
//! advances it by one suspension point per call. A node never blocks two
//! scheduler cycles on the same internal non-blocking computation — only
//! a port rendezvous (or `ANY`/`LAST` resolving to one) can span cycles.

use tis100_asm::{Direction, Instruction, Opcode, Operand, Program, Register};

use crate::error::BadOperand;
use crate::mode::{Mode, ModeStack};
use crate::port::{NodeId, PortFabric};

/// Lower and upper bounds values are clamped to after any register write or
/// port send (§4.2).
pub const CLAMP_MIN: i32 = -999;
/// See [`CLAMP_MIN`].
pub const CLAMP_MAX: i32 = 999;

fn clamp(value: i64) -> i32 {
    value.clamp(i64::from(CLAMP_MIN), i64::from(CLAMP_MAX)) as i32
}

/// What to do with a source value once it has been obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Continuation {
    /// Write the value into this destination operand (`MOV`).
    WriteTo(Operand),
    /// `acc <- clamp(acc + value)` (`ADD`).
    AddToAcc,
    /// `acc <- clamp(acc - value)` (`SUB`).
    SubFromAcc,
    /// Relative jump by this offset (`JRO`).
    JumpRelative,
}

/// What a node is in the middle of resuming, across scheduler cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingOp {
    /// Ready to fetch and dispatch the next instruction.
    Fetch,
    /// Blocked reading a specific cardinal port (or a `LAST` resolved to
    /// one).
    AwaitingRead { dir: Direction, cont: Continuation },
    /// Blocked scanning all cardinals for `ANY`; re-scanned from `UP` every
    /// cycle (the tie-break rule), so there is no cursor to resume from.
    AnyRead { cont: Continuation },
    /// Blocked writing to a specific cardinal port (or a `LAST`/`ANY`
    /// resolved to one). `delivered` distinguishes "waiting for room to
    /// send" from "sent, waiting for the peer to drain it".
    AwaitingWrite {
        dir: Direction,
        value: i32,
        delivered: bool,
    },
    /// Blocked scanning all cardinals for a non-blocking `ANY` write; once
    /// one accepts the value this degrades to `AwaitingWrite`.
    AnyWrite { value: i32 },
}

/// Whether a call to [`NodeState::step`] produced observable progress.
///
/// Used by the grid scheduler to detect a quiescent cycle (P4): a node
/// that merely re-suspends waiting on an empty port or a full peer slot
/// reports `progressed = false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// `true` if this call read, wrote, or otherwise completed part of an
    /// instruction; `false` if it only re-confirmed a block.
    pub progressed: bool,
}

impl StepOutcome {
    const fn progressed() -> Self {
        Self { progressed: true }
    }

    const fn blocked() -> Self {
        Self { progressed: false }
    }
}

/// A single TIS-100 node's register file, program, and suspended state.
#[derive(Debug, Clone)]
pub struct NodeState {
    id: NodeId,
    acc: i32,
    bak: i32,
    iptr: usize,
    next_iptr: usize,
    program: Program,
    mode_stack: ModeStack,
    last_port_dir: Option<Direction>,
    inputs: [Option<i32>; 4],
    pending: PendingOp,
}

impl NodeState {
    /// Creates an empty, unloaded node at the given grid position.
    #[must_use]
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            acc: 0,
            bak: 0,
            iptr: 0,
            next_iptr: 0,
            program: Program::default(),
            mode_stack: ModeStack::new(),
            last_port_dir: None,
            inputs: [None; 4],
            pending: PendingOp::Fetch,
        }
    }

    /// This node's stable row-major identity.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// The accumulator register.
    #[must_use]
    pub const fn acc(&self) -> i32 {
        self.acc
    }

    /// The backup register.
    #[must_use]
    pub const fn bak(&self) -> i32 {
        self.bak
    }

    /// The index of the instruction most recently dispatched.
    #[must_use]
    pub const fn iptr(&self) -> usize {
        self.iptr
    }

    /// The node's current mode (top of the mode stack).
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode_stack.current()
    }

    /// The direction used by the most recent successful port read/write.
    #[must_use]
    pub const fn last_port_dir(&self) -> Option<Direction> {
        self.last_port_dir
    }

    /// Whether a program has been installed on this node.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        !self.program.is_empty()
    }

    /// Installs a compiled program. A node may be loaded at most once per
    /// session; enforcing that is the loader's responsibility (§4.4).
    pub fn load(&mut self, program: Program) {
        self.program = program;
    }

    /// The current value held in this node's input slot for `dir`, if any.
    #[must_use]
    pub fn input_value(&self, dir: Direction) -> Option<i32> {
        self.inputs[dir as usize]
    }

    /// Whether this node's input slot for `dir` currently holds a value.
    ///
    /// Exposed so a [`PortFabric`] implementation can check the one-slot
    /// mailbox of a *peer* node before delivering into it (P1).
    #[must_use]
    pub fn input_occupied(&self, dir: Direction) -> bool {
        self.inputs[dir as usize].is_some()
    }

    /// Appends a value into this node's input slot for `dir`.
    ///
    /// Used both by a [`PortFabric`] delivering a peer's write and by the
    /// scheduler's host-input injection (§4.4).
    ///
    /// # Panics
    ///
    /// Panics (debug builds only) if the slot is already occupied — P1
    /// guarantees callers never do this.
    pub fn deliver_input(&mut self, dir: Direction, value: i32) {
        debug_assert!(
            self.inputs[dir as usize].is_none(),
            "port capacity violation: node {} direction {dir:?} already occupied",
            self.id
        );
        log::trace!("[node {}] <<< {value} written from {dir:?}", self.id);
        self.inputs[dir as usize] = Some(value);
    }

    /// Advances this node by exactly one suspension point.
    ///
    /// # Errors
    ///
    /// Returns [`BadOperand`] if the instruction uses `BAK` as a source or
    /// references an unresolved label; the caller (the grid scheduler)
    /// aborts the run on this error, per §7.
    pub fn step(&mut self, fabric: &mut dyn PortFabric) -> Result<StepOutcome, BadOperand> {
        if self.program.is_empty() {
            return Ok(StepOutcome::blocked());
        }

        match std::mem::replace(&mut self.pending, PendingOp::Fetch) {
            PendingOp::Fetch => self.dispatch_next(fabric),
            PendingOp::AwaitingRead { dir, cont } => self.attempt_read(dir, cont, fabric),
            PendingOp::AnyRead { cont } => self.resume_any_read(cont, fabric),
            PendingOp::AwaitingWrite {
                dir,
                value,
                delivered,
            } => self.attempt_write(dir, value, delivered, fabric),
            PendingOp::AnyWrite { value } => self.attempt_any_write(value, fabric),
        }
    }

    fn dispatch_next(&mut self, fabric: &mut dyn PortFabric) -> Result<StepOutcome, BadOperand> {
        if self.next_iptr >= self.program.len() {
            self.next_iptr = 0;
        }

        let instr = self.program.instructions[self.next_iptr].clone();
        self.iptr = self.next_iptr;
        self.next_iptr = self.iptr + 1;
        self.mode_stack.push(Mode::Run);

        log::trace!(
            "[node {}] {:?} {:?}, {:?}",
            self.id,
            instr.opcode,
            instr.arg1,
            instr.arg2
        );

        self.dispatch(instr, fabric)
    }

    fn dispatch(
        &mut self,
        instr: Instruction,
        fabric: &mut dyn PortFabric,
    ) -> Result<StepOutcome, BadOperand> {
        match instr.opcode {
            Opcode::Nop => self.complete_instruction(),
            Opcode::Swp => {
                std::mem::swap(&mut self.acc, &mut self.bak);
                self.complete_instruction()
            }
            Opcode::Sav => {
                self.bak = self.acc;
                self.complete_instruction()
            }
            Opcode::Neg => {
                self.acc = clamp(-i64::from(self.acc));
                self.complete_instruction()
            }
            Opcode::Add => {
                let src = require_operand(instr.arg1)?;
                self.eval_operand(src, Continuation::AddToAcc, fabric)
            }
            Opcode::Sub => {
                let src = require_operand(instr.arg1)?;
                self.eval_operand(src, Continuation::SubFromAcc, fabric)
            }
            Opcode::Mov => {
                let src = require_operand(instr.arg1)?;
                let dst = require_operand(instr.arg2)?;
                self.eval_operand(src, Continuation::WriteTo(dst), fabric)
            }
            Opcode::Jro => {
                let src = require_operand(instr.arg1)?;
                self.eval_operand(src, Continuation::JumpRelative, fabric)
            }
            Opcode::Jmp => {
                self.jump_to_label(&instr.arg1)?;
                self.complete_instruction()
            }
            Opcode::Jez => {
                if self.acc == 0 {
                    self.jump_to_label(&instr.arg1)?;
                }
                self.complete_instruction()
            }
            Opcode::Jnz => {
                if self.acc != 0 {
                    self.jump_to_label(&instr.arg1)?;
                }
                self.complete_instruction()
            }
            Opcode::Jgz => {
                if self.acc > 0 {
                    self.jump_to_label(&instr.arg1)?;
                }
                self.complete_instruction()
            }
            Opcode::Jlz => {
                if self.acc < 0 {
                    self.jump_to_label(&instr.arg1)?;
                }
                self.complete_instruction()
            }
        }
    }

    fn jump_to_label(&mut self, arg: &Option<Operand>) -> Result<(), BadOperand> {
        match arg {
            Some(Operand::Label(name)) => {
                let target = self
                    .program
                    .labels
                    .get(name)
                    .copied()
                    .ok_or_else(|| BadOperand::UnknownLabel(name.clone()))?;
                self.next_iptr = target;
                Ok(())
            }
            _ => Err(BadOperand::MissingOperand),
        }
    }

    /// `JRO`'s offset is relative to the instruction just dispatched
    /// (`iptr`), clamped inclusive into `[0, len(program)]`; combined with
    /// fetch wraparound, overshoot routes execution to instruction 0.
    fn apply_jro(&mut self, offset: i32) {
        let target = (self.iptr as i64 + i64::from(offset)).clamp(0, self.program.len() as i64);
        self.next_iptr = target as usize;
    }

    fn complete_instruction(&mut self) -> Result<StepOutcome, BadOperand> {
        self.mode_stack.pop();
        self.pending = PendingOp::Fetch;
        Ok(StepOutcome::progressed())
    }

    fn eval_operand(
        &mut self,
        operand: Operand,
        cont: Continuation,
        fabric: &mut dyn PortFabric,
    ) -> Result<StepOutcome, BadOperand> {
        match operand {
            Operand::Register(Register::Acc) => {
                let value = self.acc;
                self.with_value(value, cont, fabric)
            }
            Operand::Register(Register::Bak) => Err(BadOperand::BakAsSource),
            Operand::Nil => self.with_value(0, cont, fabric),
            Operand::Immediate(value) => self.with_value(value, cont, fabric),
            Operand::Port(dir) => self.begin_read(dir, cont, fabric),
            Operand::Any => {
                self.mode_stack.push(Mode::Read);
                self.resume_any_read(cont, fabric)
            }
            Operand::Last => match self.last_port_dir {
                Some(dir) => self.begin_read(dir, cont, fabric),
                // Unset LAST: yields 0 with no port touched (§9 open question).
                None => self.with_value(0, cont, fabric),
            },
            Operand::Label(name) => Err(BadOperand::InvalidOperand(name)),
        }
    }

    fn with_value(
        &mut self,
        value: i32,
        cont: Continuation,
        fabric: &mut dyn PortFabric,
    ) -> Result<StepOutcome, BadOperand> {
        match cont {
            Continuation::AddToAcc => {
                self.acc = clamp(i64::from(self.acc) + i64::from(value));
                self.complete_instruction()
            }
            Continuation::SubFromAcc => {
                self.acc = clamp(i64::from(self.acc) - i64::from(value));
                self.complete_instruction()
            }
            Continuation::JumpRelative => {
                self.apply_jro(value);
                self.complete_instruction()
            }
            Continuation::WriteTo(dst) => self.write_dst(dst, value, fabric),
        }
    }

    fn begin_read(
        &mut self,
        dir: Direction,
        cont: Continuation,
        fabric: &mut dyn PortFabric,
    ) -> Result<StepOutcome, BadOperand> {
        self.mode_stack.push(Mode::Read);
        self.attempt_read(dir, cont, fabric)
    }

    fn attempt_read(
        &mut self,
        dir: Direction,
        cont: Continuation,
        fabric: &mut dyn PortFabric,
    ) -> Result<StepOutcome, BadOperand> {
        match self.inputs[dir as usize].take() {
            Some(value) => {
                self.last_port_dir = Some(dir);
                self.mode_stack.pop();
                log::trace!("[node {}] <<< reading {value} from {dir:?}", self.id);
                self.with_value(value, cont, fabric)
            }
            None => {
                self.pending = PendingOp::AwaitingRead { dir, cont };
                Ok(StepOutcome::blocked())
            }
        }
    }

    fn resume_any_read(
        &mut self,
        cont: Continuation,
        fabric: &mut dyn PortFabric,
    ) -> Result<StepOutcome, BadOperand> {
        for dir in Direction::ALL {
            if let Some(value) = self.inputs[dir as usize].take() {
                self.last_port_dir = Some(dir);
                self.mode_stack.pop();
                log::trace!("[node {}] <<< ANY resolved to {dir:?}: {value}", self.id);
                return self.with_value(value, cont, fabric);
            }
        }

        self.pending = PendingOp::AnyRead { cont };
        Ok(StepOutcome::blocked())
    }

    fn write_dst(
        &mut self,
        dst: Operand,
        value: i32,
        fabric: &mut dyn PortFabric,
    ) -> Result<StepOutcome, BadOperand> {
        match dst {
            Operand::Register(Register::Acc) => {
                self.acc = clamp(i64::from(value));
                self.complete_instruction()
            }
            Operand::Register(Register::Bak) => {
                self.bak = clamp(i64::from(value));
                self.complete_instruction()
            }
            Operand::Nil => self.complete_instruction(),
            Operand::Port(dir) => {
                self.mode_stack.push(Mode::Write);
                self.attempt_write(dir, value, false, fabric)
            }
            Operand::Any => {
                self.mode_stack.push(Mode::Write);
                self.attempt_any_write(value, fabric)
            }
            Operand::Last => match self.last_port_dir {
                Some(dir) => {
                    self.mode_stack.push(Mode::Write);
                    self.attempt_write(dir, value, false, fabric)
                }
                None => self.complete_instruction(),
            },
            Operand::Immediate(_) => Err(BadOperand::InvalidOperand("immediate".to_string())),
            Operand::Label(name) => Err(BadOperand::InvalidOperand(name)),
        }
    }

    fn attempt_write(
        &mut self,
        dir: Direction,
        value: i32,
        delivered: bool,
        fabric: &mut dyn PortFabric,
    ) -> Result<StepOutcome, BadOperand> {
        let Some(peer) = fabric.neighbor_of(self.id, dir) else {
            // Write to a missing neighbor: permanent, legal WRITE suspension.
            self.pending = PendingOp::AwaitingWrite {
                dir,
                value,
                delivered,
            };
            return Ok(StepOutcome::blocked());
        };
        let opposite = dir.opposite();

        if delivered {
            if fabric.peer_input_occupied(peer, opposite) {
                self.pending = PendingOp::AwaitingWrite {
                    dir,
                    value,
                    delivered: true,
                };
                return Ok(StepOutcome::blocked());
            }
            self.mode_stack.pop();
            return self.complete_instruction();
        }

        if fabric.peer_input_occupied(peer, opposite) {
            self.pending = PendingOp::AwaitingWrite {
                dir,
                value,
                delivered: false,
            };
            return Ok(StepOutcome::blocked());
        }

        fabric.deliver(peer, opposite, value);
        self.last_port_dir = Some(dir);
        log::trace!("[node {}] >>> wrote {value} to {dir:?}", self.id);

        if fabric.peer_input_occupied(peer, opposite) {
            self.pending = PendingOp::AwaitingWrite {
                dir,
                value,
                delivered: true,
            };
            Ok(StepOutcome::progressed())
        } else {
            self.mode_stack.pop();
            self.complete_instruction()
        }
    }

    fn attempt_any_write(
        &mut self,
        value: i32,
        fabric: &mut dyn PortFabric,
    ) -> Result<StepOutcome, BadOperand> {
        for dir in Direction::ALL {
            if let Some(peer) = fabric.neighbor_of(self.id, dir) {
                if !fabric.peer_input_occupied(peer, dir.opposite()) {
                    return self.attempt_write(dir, value, false, fabric);
                }
            }
        }

        self.pending = PendingOp::AnyWrite { value };
        Ok(StepOutcome::blocked())
    }
}

fn require_operand(operand: Option<Operand>) -> Result<Operand, BadOperand> {
    operand.ok_or(BadOperand::MissingOperand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tis100_asm::compile_asm;

    /// A minimal two-node fabric for unit-testing node behavior in
    /// isolation, without pulling in the grid crate.
    struct PairFabric {
        neighbors: HashMap<(NodeId, Direction), NodeId>,
        inputs: HashMap<(NodeId, Direction), i32>,
    }

    impl PairFabric {
        fn new() -> Self {
            Self {
                neighbors: HashMap::new(),
                inputs: HashMap::new(),
            }
        }

        fn attach(&mut self, a: NodeId, b: NodeId, dir: Direction) {
            self.neighbors.insert((a, dir), b);
            self.neighbors.insert((b, dir.opposite()), a);
        }
    }

    impl PortFabric for PairFabric {
        fn neighbor_of(&self, from: NodeId, dir: Direction) -> Option<NodeId> {
            self.neighbors.get(&(from, dir)).copied()
        }

        fn peer_input_occupied(&self, peer: NodeId, dir: Direction) -> bool {
            self.inputs.contains_key(&(peer, dir))
        }

        fn deliver(&mut self, peer: NodeId, dir: Direction, value: i32) {
            assert!(
                self.inputs.insert((peer, dir), value).is_none(),
                "port capacity violation in test fabric"
            );
        }
    }

    fn node_with(id: NodeId, src: &str) -> NodeState {
        let mut node = NodeState::new(id);
        node.load(compile_asm(src).unwrap());
        node
    }

    #[test]
    fn swp_sav_round_trip() {
        let mut node = node_with(0, "SAV\nSWP\nSWP\n");
        let mut fabric = PairFabric::new();
        node.acc = 7;
        node.step(&mut fabric).unwrap(); // SAV: bak = 7
        node.step(&mut fabric).unwrap(); // SWP: acc=7 bak=7 (no-op observably)
        node.step(&mut fabric).unwrap(); // SWP again
        assert_eq!(node.acc(), 7);
        assert_eq!(node.bak(), 7);
    }

    #[test]
    fn neg_twice_is_identity() {
        let mut node = node_with(0, "NEG\nNEG\n");
        let mut fabric = PairFabric::new();
        node.acc = 42;
        node.step(&mut fabric).unwrap();
        assert_eq!(node.acc(), -42);
        node.step(&mut fabric).unwrap();
        assert_eq!(node.acc(), 42);
    }

    #[test]
    fn clamps_after_add() {
        let mut node = node_with(0, "ADD 998\n");
        let mut fabric = PairFabric::new();
        node.acc = 998;
        node.step(&mut fabric).unwrap();
        assert_eq!(node.acc(), CLAMP_MAX);
    }

    #[test]
    fn bak_as_source_is_bad_operand() {
        let mut node = node_with(0, "ADD BAK\n");
        let mut fabric = PairFabric::new();
        assert_eq!(node.step(&mut fabric), Err(BadOperand::BakAsSource));
    }

    #[test]
    fn mov_blocks_until_input_arrives_then_completes() {
        let mut node = node_with(0, "MOV UP, ACC\n");
        let mut fabric = PairFabric::new();

        let outcome = node.step(&mut fabric).unwrap();
        assert!(!outcome.progressed);
        assert_eq!(node.mode(), Mode::Read);

        node.deliver_input(Direction::Up, 5);
        let outcome = node.step(&mut fabric).unwrap();
        assert!(outcome.progressed);
        assert_eq!(node.acc(), 5);
        assert_eq!(node.mode(), Mode::Idle);
        assert_eq!(node.last_port_dir(), Some(Direction::Up));
    }

    #[test]
    fn write_to_missing_neighbor_blocks_forever() {
        let mut node = node_with(0, "MOV 3, RIGHT\n");
        let mut fabric = PairFabric::new();
        for _ in 0..5 {
            let outcome = node.step(&mut fabric).unwrap();
            assert!(!outcome.progressed);
            assert_eq!(node.mode(), Mode::Write);
        }
    }

    #[test]
    fn write_completes_once_peer_has_room_then_waits_for_drain() {
        let mut a = node_with(0, "MOV 9, RIGHT\n");
        let mut b = NodeState::new(1);
        let mut fabric = PairFabric::new();
        fabric.attach(0, 1, Direction::Right);

        let outcome = a.step(&mut fabric).unwrap();
        assert!(outcome.progressed);
        assert_eq!(a.mode(), Mode::Write);
        assert_eq!(b.input_value(Direction::Left), None); // fabric holds it, not `b` directly in this test

        // Simulate the peer draining its slot by consuming from the fabric.
        fabric.inputs.remove(&(1, Direction::Left));
        let outcome = a.step(&mut fabric).unwrap();
        assert!(outcome.progressed);
        assert_eq!(a.mode(), Mode::Idle);
    }

    #[test]
    fn any_read_prefers_up_over_left() {
        let mut node = node_with(0, "MOV ANY, ACC\n");
        let mut fabric = PairFabric::new();
        node.deliver_input(Direction::Left, 100);
        node.deliver_input(Direction::Up, 7);

        let outcome = node.step(&mut fabric).unwrap();
        assert!(outcome.progressed);
        assert_eq!(node.acc(), 7);
        assert_eq!(node.last_port_dir(), Some(Direction::Up));
    }

    #[test]
    fn last_with_no_prior_port_yields_zero() {
        let mut node = node_with(0, "MOV LAST, ACC\n");
        let mut fabric = PairFabric::new();
        let outcome = node.step(&mut fabric).unwrap();
        assert!(outcome.progressed);
        assert_eq!(node.acc(), 0);
        assert_eq!(node.last_port_dir(), None);
    }

    #[test]
    fn jro_offset_is_relative_to_dispatched_instruction() {
        // iptr=0 dispatched, JRO 2 -> next_iptr = clamp(0+2, 0, len=3) = 2
        let mut node = node_with(0, "JRO 2\nNOP\nNOP\n");
        let mut fabric = PairFabric::new();
        node.step(&mut fabric).unwrap();
        assert_eq!(node.next_iptr, 2);
    }

    #[test]
    fn jro_overshoot_clamps_to_len_then_wraps_to_zero() {
        let mut node = node_with(0, "JRO 99\nNOP\n");
        let mut fabric = PairFabric::new();
        node.step(&mut fabric).unwrap();
        assert_eq!(node.next_iptr, node.program.len());
        // Next dispatch wraps per the fetch rule.
        node.step(&mut fabric).unwrap();
        assert_eq!(node.iptr, 0);
    }
}
