//! Program-file loading: `@N`-section parsing with disabled-node offsetting.
//!
//! A direct, idiomatic port of the original's `loader.py`: walk the sorted
//! disabled-id list, incrementing the offset and consuming an id each time
//! the running node id reaches it.

use std::collections::BTreeSet;

use tis100_asm::{compile_asm, ParseError};
use tis100_core::NodeId;

use crate::grid::Grid;

/// Failures surfaced while loading a program file onto a [`Grid`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoaderError {
    /// A `@N` header's declared id resolves, after offsetting, past the
    /// grid's bounds or onto a node that is disabled or already a sink.
    #[error("section `@{0}` resolves to a disabled or out-of-range node")]
    DisabledOrOutOfRange(NodeId),
    /// A `@` header's trailing text was not a non-negative integer.
    #[error("malformed section header `@{0}`")]
    MalformedHeader(String),
    /// The section's body failed to compile.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Resolves a declared node id to its effective grid id, skipping over
/// disabled ids in ascending order. Each disabled id at or below the
/// running `actual` consumes one slot, bumping every id at or past it up
/// by one.
#[must_use]
pub fn resolve_node_id(declared: usize, disabled: &BTreeSet<NodeId>) -> NodeId {
    let mut actual = declared;
    for &id in disabled {
        if id <= actual {
            actual += 1;
        } else {
            break;
        }
    }
    actual
}

/// Splits program-file text into `(declared id, body)` sections on `@N`
/// header lines. Lines before the first header are discarded.
fn parse_sections(source: &str) -> Result<Vec<(usize, String)>, LoaderError> {
    let mut sections = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for line in source.lines() {
        if let Some(rest) = line.strip_prefix('@') {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            let declared = rest
                .trim()
                .parse::<usize>()
                .map_err(|_| LoaderError::MalformedHeader(rest.trim().to_string()))?;
            current = Some((declared, String::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }

    if let Some(section) = current.take() {
        sections.push(section);
    }

    Ok(sections)
}

/// Parses and installs every section of a program file onto `grid`.
///
/// # Errors
///
/// [`LoaderError`] on a malformed header, a section that resolves to a
/// disabled or out-of-range node, or a section body that fails to compile
/// (P3 is enforced transitively through [`compile_asm`]).
pub fn load_program(grid: &mut Grid, source: &str) -> Result<(), LoaderError> {
    let disabled: BTreeSet<NodeId> = grid.disabled_ids().collect();

    for (declared, body) in parse_sections(source)? {
        let resolved = resolve_node_id(declared, &disabled);
        let program = compile_asm(&body)?;
        grid.install_program(resolved, program)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn resolves_identity_with_no_disabled_nodes() {
        let disabled = BTreeSet::new();
        assert_eq!(resolve_node_id(0, &disabled), 0);
        assert_eq!(resolve_node_id(5, &disabled), 5);
    }

    #[test]
    fn single_disabled_id_shifts_everything_at_or_past_it() {
        let disabled: BTreeSet<NodeId> = [1].into_iter().collect();
        assert_eq!(resolve_node_id(0, &disabled), 0);
        assert_eq!(resolve_node_id(1, &disabled), 2);
    }

    #[test]
    fn cascading_disabled_ids_shift_further() {
        let disabled: BTreeSet<NodeId> = [1, 2].into_iter().collect();
        assert_eq!(resolve_node_id(0, &disabled), 0);
        assert_eq!(resolve_node_id(1, &disabled), 3);
        assert_eq!(resolve_node_id(2, &disabled), 4);
    }

    #[test]
    fn disabled_node_offset_end_to_end() {
        let mut grid = Grid::new(4, 3, [1].into_iter().collect::<HashSet<_>>());
        load_program(&mut grid, "@0\nNOP\n@1\nNOP\n").unwrap();
        assert!(!grid.is_disabled(0));
        assert!(grid.is_disabled(1));

        match grid.node(2) {
            crate::grid::GridNode::Programmed(node) => assert!(node.is_loaded()),
            crate::grid::GridNode::Sink(_) => panic!("expected a programmed node"),
        }
    }

    #[test]
    fn rejects_malformed_header() {
        assert_eq!(
            parse_sections("@x\nNOP\n"),
            Err(LoaderError::MalformedHeader("x".to_string()))
        );
    }
}
