use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use crate::memory::Word;
use crate::vm::{VirtualMemory, VmError};

/// One operation of a replayable access trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOp {
    Read { address: u64 },
    Write { address: u64, value: Word },
}

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("failed to read trace file: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: unknown operation {op:?}")]
    UnknownOp { line: usize, op: String },
    #[error("line {line}: missing operand")]
    MissingOperand { line: usize },
    #[error("line {line}: invalid number {token:?}")]
    InvalidNumber { line: usize, token: String },
    #[error("line {line}: trailing tokens after operation")]
    TrailingTokens { line: usize },
}

/// An access trace: one operation per line, `w <va> <value>` or
/// `r <va>`. Blank lines and `#` comments are skipped.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Trace {
    pub ops: Vec<TraceOp>,
}

impl Trace {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TraceError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, TraceError> {
        let mut ops = Vec::new();
        for (i, raw_line) in content.lines().enumerate() {
            let line = i + 1;
            let text = raw_line.split('#').next().unwrap_or("");
            let mut tokens = text.split_whitespace();
            let Some(op) = tokens.next() else {
                continue;
            };

            let parsed = match op {
                "r" | "read" => TraceOp::Read {
                    address: parse_operand(tokens.next(), line)?,
                },
                "w" | "write" => TraceOp::Write {
                    address: parse_operand(tokens.next(), line)?,
                    value: parse_operand(tokens.next(), line)?,
                },
                other => {
                    return Err(TraceError::UnknownOp {
                        line,
                        op: other.to_string(),
                    });
                }
            };
            if tokens.next().is_some() {
                return Err(TraceError::TrailingTokens { line });
            }
            ops.push(parsed);
        }
        Ok(Trace { ops })
    }

    /// Run every operation against `vm`, collecting one outcome per op.
    pub fn replay(&self, vm: &mut VirtualMemory) -> Vec<TraceOutcome> {
        self.ops
            .iter()
            .map(|&op| match op {
                TraceOp::Read { address } => match vm.read(address) {
                    Ok(value) => TraceOutcome::Value(value),
                    Err(VmError::AddressOutOfRange { .. }) => TraceOutcome::OutOfRange,
                },
                TraceOp::Write { address, value } => match vm.write(address, value) {
                    Ok(()) => TraceOutcome::Wrote,
                    Err(VmError::AddressOutOfRange { .. }) => TraceOutcome::OutOfRange,
                },
            })
            .collect()
    }
}

fn parse_operand<T: FromStr>(token: Option<&str>, line: usize) -> Result<T, TraceError> {
    let token = token.ok_or(TraceError::MissingOperand { line })?;
    token.parse().map_err(|_| TraceError::InvalidNumber {
        line,
        token: token.to_string(),
    })
}

/// Result of one replayed operation: the word read, `ok` for a write,
/// `err` for an out-of-range access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOutcome {
    Value(Word),
    Wrote,
    OutOfRange,
}

impl std::fmt::Display for TraceOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceOutcome::Value(value) => write!(f, "{value}"),
            TraceOutcome::Wrote => write!(f, "ok"),
            TraceOutcome::OutOfRange => write!(f, "err"),
        }
    }
}

pub fn write_results<P: AsRef<Path>>(path: P, results: &[TraceOutcome]) -> Result<(), TraceError> {
    let output: Vec<String> = results.iter().map(|r| r.to_string()).collect();
    fs::write(path.as_ref(), output.join(" ")).map_err(TraceError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;

    #[test]
    fn test_parse_basic_trace() {
        let trace = Trace::parse("w 5 7\nr 5\n").unwrap();
        assert_eq!(
            trace.ops,
            vec![
                TraceOp::Write {
                    address: 5,
                    value: 7
                },
                TraceOp::Read { address: 5 },
            ]
        );
    }

    #[test]
    fn test_parse_long_forms_comments_and_blanks() {
        let content = "\n# warm-up\nwrite 12 -3   # negative words are fine\n\nread 12\n";
        let trace = Trace::parse(content).unwrap();
        assert_eq!(
            trace.ops,
            vec![
                TraceOp::Write {
                    address: 12,
                    value: -3
                },
                TraceOp::Read { address: 12 },
            ]
        );
    }

    #[test]
    fn test_parse_rejects_unknown_op() {
        assert!(matches!(
            Trace::parse("x 1"),
            Err(TraceError::UnknownOp { line: 1, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_missing_operand() {
        assert!(matches!(
            Trace::parse("r 1\nw 2"),
            Err(TraceError::MissingOperand { line: 2 })
        ));
    }

    #[test]
    fn test_parse_rejects_bad_number() {
        assert!(matches!(
            Trace::parse("r abc"),
            Err(TraceError::InvalidNumber { line: 1, .. })
        ));
    }

    #[test]
    fn test_parse_rejects_trailing_tokens() {
        assert!(matches!(
            Trace::parse("r 1 2"),
            Err(TraceError::TrailingTokens { line: 1 })
        ));
    }

    #[test]
    fn test_replay_round_trip() {
        let mut vm = VirtualMemory::new(Geometry::new(2, 2, 6).unwrap());
        let trace = Trace::parse("w 5 7\nr 5\nr 64\n").unwrap();

        let results = trace.replay(&mut vm);

        assert_eq!(
            results,
            vec![
                TraceOutcome::Wrote,
                TraceOutcome::Value(7),
                TraceOutcome::OutOfRange,
            ]
        );
    }

    #[test]
    fn test_outcome_formatting() {
        assert_eq!(TraceOutcome::Value(-3).to_string(), "-3");
        assert_eq!(TraceOutcome::Wrote.to_string(), "ok");
        assert_eq!(TraceOutcome::OutOfRange.to_string(), "err");
    }
}
