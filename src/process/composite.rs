//! Parallel and choice composites
//!
//! Both only hold member handles. Launching and cancellation are driven by
//! the engine, which owns every member.

use crate::core::value::ProcessId;

/// Members launched together, independent afterwards
#[derive(Debug, Clone, Default)]
pub struct Parallel {
    members: Vec<ProcessId>,
}

impl Parallel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, member: ProcessId) {
        self.members.push(member);
    }

    pub fn members(&self) -> &[ProcessId] {
        &self.members
    }
}

/// Mutually exclusive arms; the first to synchronize wins
#[derive(Debug, Clone, Default)]
pub struct Choice {
    arms: Vec<ProcessId>,
    chosen: Option<ProcessId>,
}

impl Choice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, arm: ProcessId) {
        self.arms.push(arm);
    }

    pub fn arms(&self) -> &[ProcessId] {
        &self.arms
    }

    /// Record the winning arm and return the siblings to cancel.
    ///
    /// Only the first commit counts; later calls return nothing.
    pub fn commit(&mut self, arm: ProcessId) -> Vec<ProcessId> {
        if self.chosen.is_some() {
            return Vec::new();
        }
        self.chosen = Some(arm);
        self.arms.iter().copied().filter(|a| *a != arm).collect()
    }

    pub fn chosen(&self) -> Option<ProcessId> {
        self.chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_returns_siblings_once() {
        let mut choice = Choice::new();
        choice.add(ProcessId(1));
        choice.add(ProcessId(2));
        choice.add(ProcessId(3));

        assert_eq!(choice.commit(ProcessId(2)), vec![ProcessId(1), ProcessId(3)]);
        assert_eq!(choice.chosen(), Some(ProcessId(2)));
        assert!(choice.commit(ProcessId(3)).is_empty());
        assert_eq!(choice.chosen(), Some(ProcessId(2)));
    }

    #[test]
    fn test_parallel_keeps_insertion_order() {
        let mut parallel = Parallel::new();
        parallel.add(ProcessId(5));
        parallel.add(ProcessId(4));
        assert_eq!(parallel.members(), &[ProcessId(5), ProcessId(4)]);
    }
}
