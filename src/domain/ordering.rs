//! Stable execution ordering for deterministic matching.

use crate::domain::Execution;

/// Ordering key for executions within a matching group.
///
/// Ordering: timestamp -> input position. Two executions with the same
/// timestamp keep the order in which the broker reported them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExecutionOrderingKey {
    /// Time in milliseconds (primary sort).
    pub time_ms: i64,
    /// Position in the import batch (tie-break).
    pub input_index: usize,
}

impl ExecutionOrderingKey {
    pub fn new(exec: &Execution, input_index: usize) -> Self {
        ExecutionOrderingKey {
            time_ms: exec.timestamp.as_ms(),
            input_index,
        }
    }
}
