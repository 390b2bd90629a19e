//! Trace parsing
//!
//! A trace drives one simulation run. The first line selects the placement
//! policy (`1`/`2`/`3` or a policy name), the second line is the total
//! capacity, and every following line is one command:
//!
//! ```text
//! 2
//! 100
//! A 1 30
//! A 2 20
//! D 1
//! P
//! ```
//!
//! Verbs are case-insensitive. Blank lines are skipped. Malformed input is
//! the one fatal condition of a run; every error carries its 1-based line
//! number.

use crate::alloc::{PlacementPolicy, ProcessId};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// One simulation command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `A <pid> <size>` — place `size` units for a process
    Allocate { owner: ProcessId, size: u64 },
    /// `D <pid>` — release a process's block
    Deallocate { owner: ProcessId },
    /// `P` — report the current layout
    Print,
}

/// Trace parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    #[error("trace is missing the policy header line")]
    MissingPolicy,

    #[error("trace is missing the capacity header line")]
    MissingCapacity,

    #[error("line {line}: invalid policy {value:?} (expected 1/2/3 or first/best/worst)")]
    InvalidPolicy { line: usize, value: String },

    #[error("line {line}: invalid capacity {value:?} (expected a positive integer)")]
    InvalidCapacity { line: usize, value: String },

    #[error("line {line}: unknown directive {verb:?}")]
    UnknownDirective { line: usize, verb: String },

    #[error("line {line}: missing {what}")]
    MissingField { line: usize, what: &'static str },

    #[error("line {line}: invalid {field} {value:?}")]
    InvalidInteger {
        line: usize,
        field: &'static str,
        value: String,
    },
}

/// A parsed trace: header plus the ordered command stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub policy: PlacementPolicy,
    pub capacity: u64,
    pub commands: Vec<Command>,
}

impl Trace {
    /// Parse a complete trace from text
    pub fn parse(input: &str) -> Result<Self, TraceError> {
        let mut lines = input
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty());

        let (line, policy) = lines.next().ok_or(TraceError::MissingPolicy)?;
        let policy = policy
            .parse::<PlacementPolicy>()
            .map_err(|_| TraceError::InvalidPolicy {
                line,
                value: policy.to_string(),
            })?;

        let (line, capacity) = lines.next().ok_or(TraceError::MissingCapacity)?;
        let capacity = match capacity.parse::<u64>() {
            Ok(value) if value > 0 => value,
            _ => {
                return Err(TraceError::InvalidCapacity {
                    line,
                    value: capacity.to_string(),
                })
            }
        };

        let mut commands = Vec::new();
        for (line, text) in lines {
            commands.push(parse_command(line, text)?);
        }

        Ok(Self {
            policy,
            capacity,
            commands,
        })
    }

    /// Read and parse a trace file
    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::error::Result<Self> {
        let input = fs::read_to_string(path)?;
        Ok(Self::parse(&input)?)
    }
}

fn parse_command(line: usize, text: &str) -> Result<Command, TraceError> {
    let mut fields = text.split_whitespace();
    let verb = fields.next().expect("blank lines are filtered before dispatch");

    match verb.to_ascii_uppercase().as_str() {
        "A" => {
            let owner = parse_pid(line, fields.next())?;
            let size = fields.next().ok_or(TraceError::MissingField {
                line,
                what: "allocation size",
            })?;
            let size = match size.parse::<u64>() {
                Ok(value) if value > 0 => value,
                _ => {
                    return Err(TraceError::InvalidInteger {
                        line,
                        field: "allocation size",
                        value: size.to_string(),
                    })
                }
            };
            Ok(Command::Allocate { owner, size })
        }
        "D" => {
            let owner = parse_pid(line, fields.next())?;
            Ok(Command::Deallocate { owner })
        }
        "P" => Ok(Command::Print),
        _ => Err(TraceError::UnknownDirective {
            line,
            verb: verb.to_string(),
        }),
    }
}

fn parse_pid(line: usize, field: Option<&str>) -> Result<ProcessId, TraceError> {
    let field = field.ok_or(TraceError::MissingField {
        line,
        what: "process id",
    })?;
    field
        .parse::<u32>()
        .map(ProcessId::new)
        .map_err(|_| TraceError::InvalidInteger {
            line,
            field: "process id",
            value: field.to_string(),
        })
}
