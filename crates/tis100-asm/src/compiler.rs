//! Text-to-opcode compiler.
//!
//! A direct, idiomatic port of `tis100/compiler.py` from the original
//! implementation: strip trailing `#` comments, split an optional
//! `label:` prefix off the front of a line, and tokenize the remaining
//! mnemonic plus up to two comma-separated arguments.

use std::collections::HashMap;

use crate::direction::Direction;
use crate::program::{Instruction, Opcode, Operand, Program, Register};

/// Errors raised while compiling assembly source into a [`Program`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// An opcode mnemonic was not recognized.
    #[error("unknown opcode `{0}`")]
    UnknownOpcode(String),
    /// An argument list could not be parsed (wrong arity or bad token).
    #[error("malformed argument list in `{0}`")]
    MalformedArguments(String),
    /// A jump referenced a label with no matching definition.
    #[error("undefined label `{0}`")]
    UndefinedLabel(String),
}

/// Compiles TIS-100 assembly source into a [`Program`].
///
/// # Errors
///
/// Returns [`ParseError`] on an unrecognized opcode, a malformed argument
/// list, or a jump referencing a label that is never defined (P3).
pub fn compile_asm(source: &str) -> Result<Program, ParseError> {
    let mut instructions = Vec::new();
    let mut labels = HashMap::new();

    for raw_line in source.lines() {
        let mut line = strip_comment(raw_line).trim();

        if line.is_empty() {
            continue;
        }

        if let Some(colon) = line.find(':') {
            let (label, rest) = line.split_at(colon);
            labels.insert(label.trim().to_string(), instructions.len());
            line = rest[1..].trim();

            if line.is_empty() {
                continue;
            }
        }

        instructions.push(parse_instruction(line)?);
    }

    for instruction in &instructions {
        if instruction.opcode.is_label_jump() {
            if let Some(Operand::Label(name)) = &instruction.arg1 {
                if !labels.contains_key(name) {
                    return Err(ParseError::UndefinedLabel(name.clone()));
                }
            }
        }
    }

    Ok(Program {
        instructions,
        labels,
    })
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_instruction(line: &str) -> Result<Instruction, ParseError> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("");
    let opcode = Opcode::from_token(name).ok_or_else(|| ParseError::UnknownOpcode(name.to_string()))?;

    let rest = parts.next().unwrap_or("").trim();
    let tokens: Vec<&str> = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(',').map(str::trim).collect()
    };

    if tokens.len() > 2 || tokens.iter().any(|t| t.is_empty()) {
        return Err(ParseError::MalformedArguments(line.to_string()));
    }

    let label_context = opcode.is_label_jump();
    let arg1 = tokens
        .first()
        .map(|t| parse_operand(t, label_context))
        .transpose()?;
    let arg2 = tokens
        .get(1)
        .map(|t| parse_operand(t, false))
        .transpose()?;

    Ok(Instruction {
        opcode,
        arg1,
        arg2,
    })
}

fn parse_operand(token: &str, label_context: bool) -> Result<Operand, ParseError> {
    if label_context {
        return Ok(Operand::Label(token.to_string()));
    }

    if let Some(dir) = Direction::from_token(token) {
        return Ok(Operand::Port(dir));
    }

    match token {
        "ACC" => return Ok(Operand::Register(Register::Acc)),
        "BAK" => return Ok(Operand::Register(Register::Bak)),
        "NIL" => return Ok(Operand::Nil),
        "ANY" => return Ok(Operand::Any),
        "LAST" => return Ok(Operand::Last),
        _ => {}
    }

    token
        .parse::<i32>()
        .map(Operand::Immediate)
        .map_err(|_| ParseError::MalformedArguments(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_comments_and_blank_lines() {
        let program = compile_asm("# a comment\n\nNOP\n").unwrap();
        assert_eq!(program.instructions.len(), 1);
        assert_eq!(program.instructions[0].opcode, Opcode::Nop);
    }

    #[test]
    fn compiles_label_prefix_on_same_line() {
        let program = compile_asm("top: MOV UP, ACC\nJMP top\n").unwrap();
        assert_eq!(program.labels.get("top"), Some(&0));
        assert_eq!(program.instructions[1].opcode, Opcode::Jmp);
        assert_eq!(
            program.instructions[1].arg1,
            Some(Operand::Label("top".to_string()))
        );
    }

    #[test]
    fn compiles_negative_immediates() {
        let program = compile_asm("SUB -5\n").unwrap();
        assert_eq!(
            program.instructions[0].arg1,
            Some(Operand::Immediate(-5))
        );
    }

    #[test]
    fn rejects_unknown_opcode() {
        assert_eq!(
            compile_asm("FROB ACC\n"),
            Err(ParseError::UnknownOpcode("FROB".to_string()))
        );
    }

    #[test]
    fn rejects_undefined_label() {
        assert_eq!(
            compile_asm("JMP nowhere\n"),
            Err(ParseError::UndefinedLabel("nowhere".to_string()))
        );
    }

    #[test]
    fn rejects_too_many_arguments() {
        assert!(compile_asm("MOV UP, DOWN, ACC\n").is_err());
    }

    #[test]
    fn label_only_line_is_skipped() {
        let program = compile_asm("top:\nNOP\n").unwrap();
        assert_eq!(program.labels.get("top"), Some(&0));
        assert_eq!(program.instructions.len(), 1);
    }
}
