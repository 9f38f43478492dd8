//! Compiling a small multi-instruction program with forward and backward
//! label references.

use tis100_asm::{compile_asm, Opcode, Operand};

#[test]
fn compiles_a_loop_with_forward_and_backward_labels() {
    let source = "\
top:    MOV UP, ACC
        JGZ pos
        MOV 0, DOWN
        JMP top
pos:    MOV ACC, DOWN
        JMP top
";
    let program = compile_asm(source).unwrap();

    assert_eq!(program.instructions.len(), 6);
    assert_eq!(program.labels.get("top"), Some(&0));
    assert_eq!(program.labels.get("pos"), Some(&4));
    assert_eq!(program.instructions[1].opcode, Opcode::Jgz);
    assert_eq!(
        program.instructions[1].arg1,
        Some(Operand::Label("pos".to_string()))
    );
    assert_eq!(
        program.instructions[5].arg1,
        Some(Operand::Label("top".to_string()))
    );
}
