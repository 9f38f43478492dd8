//! Command-line host driver for the TIS-100 execution engine.
//!
//! Wires buffered host inputs and observer sinks onto a loaded grid, drives
//! the cycle stream until every expected output has been observed and no
//! buffered input remains, then prints the `expected : actual` result table.

use std::collections::HashSet;
use std::fs;
use std::num::ParseIntError;
use std::process::ExitCode;

use clap::Parser;
use tis100_grid::{BadOperand, Direction, Grid, GridError, GridNode, LoaderError, NodeId, Tis};

/// Runs a TIS-100 program file against buffered inputs and output checks.
#[derive(Debug, Parser)]
#[command(name = "tis100", version, about)]
struct Args {
    /// Path to the program file (`@N`-sectioned assembly).
    file: String,

    /// Buffer input values to a node's UP port: `NODE:V1,V2,...`. Repeatable.
    #[arg(long = "input", value_name = "NODE:V1,V2,...")]
    inputs: Vec<String>,

    /// Attach an observer sink to a node's DOWN port and record expected
    /// values for comparison: `NODE:V1,V2,...`. Repeatable.
    #[arg(long = "output", value_name = "NODE:V1,V2,...")]
    outputs: Vec<String>,

    /// Comma-separated node ids to mark disabled.
    #[arg(long = "disabled-nodes", value_name = "N,N,...")]
    disabled_nodes: Option<String>,
}

/// Everything that can go wrong driving a run from the command line.
#[derive(Debug, thiserror::Error)]
enum CliError {
    /// The program file could not be read.
    #[error("could not read `{path}`: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// An `--input`/`--output`/`--disabled-nodes` value was malformed.
    #[error("malformed argument `{0}`: expected NODE:V1,V2,...")]
    MalformedSpec(String),
    /// A node id or value token failed to parse as an integer.
    #[error("malformed integer: {0}")]
    BadInteger(#[from] ParseIntError),
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Interpreter(#[from] BadOperand),
}

#[derive(Debug)]
struct OutputSpec {
    sink: NodeId,
    expected: Vec<i32>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("tis100: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<bool, CliError> {
    let source = fs::read_to_string(&args.file).map_err(|source| CliError::ReadFile {
        path: args.file.clone(),
        source,
    })?;
    let disabled = parse_disabled(args.disabled_nodes.as_deref())?;

    let mut tis = Tis::new(Grid::new(4, 3, disabled));
    tis.load(&source)?;

    for spec in &args.inputs {
        let (node, values) = parse_node_values(spec)?;
        tis.buffer_input(node, Direction::Up, values);
    }

    let mut output_specs = Vec::new();
    for spec in &args.outputs {
        let (node, values) = parse_node_values(spec)?;
        let sink = tis.grid_mut().attach_sink(node, Direction::Down)?;
        output_specs.push(OutputSpec {
            sink,
            expected: values,
        });
    }

    let expected_count: usize = output_specs.iter().map(|spec| spec.expected.len()).sum();

    loop {
        let observed_count: usize = output_specs.iter().map(|spec| seen_len(&tis, spec.sink)).sum();

        if !tis.has_buffered_inputs() && observed_count >= expected_count {
            break;
        }

        tis.cycles().next().expect("cycles() never ends on its own")?;
    }

    Ok(print_report(&tis, &output_specs))
}

fn seen_len(tis: &Tis, sink_id: NodeId) -> usize {
    match tis.grid().node(sink_id) {
        GridNode::Sink(sink) => sink.seen_inputs().len(),
        GridNode::Programmed(_) => 0,
    }
}

fn print_report(tis: &Tis, specs: &[OutputSpec]) -> bool {
    let mut all_matched = true;

    for spec in specs {
        let actual: &[i32] = match tis.grid().node(spec.sink) {
            GridNode::Sink(sink) => sink.seen_inputs(),
            GridNode::Programmed(_) => &[],
        };

        for (index, expected) in spec.expected.iter().enumerate() {
            let got = actual.get(index);
            all_matched &= got == Some(expected);
            println!(
                "node {} [{index}]: expected {expected}, got {}",
                spec.sink,
                got.map_or_else(|| "<none>".to_string(), i32::to_string)
            );
        }
    }

    all_matched
}

fn parse_disabled(raw: Option<&str>) -> Result<HashSet<NodeId>, CliError> {
    let Some(raw) = raw else {
        return Ok(HashSet::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| token.parse::<NodeId>().map_err(CliError::from))
        .collect()
}

fn parse_node_values(spec: &str) -> Result<(NodeId, Vec<i32>), CliError> {
    let (node, values) = spec
        .split_once(':')
        .ok_or_else(|| CliError::MalformedSpec(spec.to_string()))?;
    let node: NodeId = node.trim().parse()?;
    let values = values
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::parse::<i32>)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((node, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_node_values_spec() {
        let (node, values) = parse_node_values("4:1,2,3").unwrap();
        assert_eq!(node, 4);
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn rejects_spec_without_colon() {
        assert!(parse_node_values("412,3").is_err());
    }

    #[test]
    fn parses_disabled_node_list() {
        let disabled = parse_disabled(Some("1, 5,9")).unwrap();
        assert_eq!(disabled, [1, 5, 9].into_iter().collect());
    }

    #[test]
    fn empty_disabled_list_is_empty_set() {
        assert!(parse_disabled(None).unwrap().is_empty());
    }
}
