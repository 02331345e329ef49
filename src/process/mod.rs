// Process model: reference cells, steps, sequences and composites

pub mod composite;
pub mod reference;
pub mod sequence;
pub mod step;

pub use composite::{Choice, Parallel};
pub use reference::References;
pub use sequence::{Pending, Program, Sequence};
pub use step::{Slot, Step, StepFn};

use crate::core::value::ProcessId;

/// What a process is
#[derive(Debug, Clone)]
pub enum ProcessKind {
    Sequence(Sequence),
    Parallel(Parallel),
    Choice(Choice),
}

/// Who created a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Built through the engine's factories
    Built,
    /// Forked by a replicating sequence; owned and reclaimed by the engine
    Replica { of: ProcessId },
}

/// A process slot in the engine's arena
#[derive(Debug, Clone)]
pub struct Process {
    pub id: ProcessId,
    pub kind: ProcessKind,
    pub origin: Origin,
    /// Composite this process was added to
    pub owner: Option<ProcessId>,
    pub launched: bool,
}

impl Process {
    pub fn new(id: ProcessId, kind: ProcessKind) -> Self {
        Self {
            id,
            kind,
            origin: Origin::Built,
            owner: None,
            launched: false,
        }
    }

    pub fn replica(id: ProcessId, of: ProcessId, sequence: Sequence) -> Self {
        Self {
            id,
            kind: ProcessKind::Sequence(sequence),
            origin: Origin::Replica { of },
            owner: None,
            launched: true,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ProcessKind::Sequence(seq) if seq.is_replicating() => "replicating sequence",
            ProcessKind::Sequence(_) => "sequence",
            ProcessKind::Parallel(_) => "parallel",
            ProcessKind::Choice(_) => "choice",
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match &self.kind {
            ProcessKind::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Sequence> {
        match &mut self.kind {
            ProcessKind::Sequence(seq) => Some(seq),
            _ => None,
        }
    }
}
