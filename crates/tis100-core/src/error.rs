//! Interpreter-level failure modes (§7).

/// Errors the node interpreter can raise while dispatching an instruction.
///
/// Unlike the source, an unknown opcode can never reach dispatch here —
/// [`tis100_asm::Opcode`] is a closed Rust enum, so the compiler already
/// rejects anything the engine doesn't know how to execute. Only the
/// genuinely dynamic failure modes survive: `BAK` used as a source, and a
/// jump whose label the compiler somehow failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BadOperand {
    /// `BAK` was used as a source operand; it is write-only.
    #[error("BAK cannot be used as a source operand")]
    BakAsSource,
    /// An instruction was missing a required operand.
    #[error("instruction missing a required operand")]
    MissingOperand,
    /// An operand token appeared somewhere it can never be valid (e.g. a
    /// label or an immediate used as a write destination).
    #[error("operand is not valid in this position: {0}")]
    InvalidOperand(String),
    /// A jump referenced a label absent from the program's label table.
    ///
    /// P3 guarantees this never happens for a program the loader accepted,
    /// but the interpreter still checks rather than indexing blindly.
    #[error("jump referenced unresolved label `{0}`")]
    UnknownLabel(String),
}
