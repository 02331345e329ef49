//! Sequential process state
//!
//! The step list is built once and then shared, unchanged, by the process
//! and every replica forked from it. Cursor, cell bindings, the pending
//! offer and the choice link are per instance.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::errors::{PiplError, Result};
use crate::core::value::{ChannelId, Name, ProcessId, RefId};
use crate::process::reference::References;
use crate::process::step::{Slot, Step};

/// Immutable program shared between a process and its replicas
#[derive(Debug, Clone, Default)]
pub struct Program {
    steps: Vec<Step>,
    slots: HashMap<Name, Slot>,
}

impl Program {
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub(crate) fn len(&self) -> usize {
        self.steps.len()
    }

    /// Slot a name was bound to when the program was built
    pub fn slot_of(&self, name: &Name) -> Option<Slot> {
        self.slots.get(name).copied()
    }
}

/// Offer a sequence currently has registered on a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    pub channel: ChannelId,
    /// Index of the step that registered it
    pub step: usize,
}

#[derive(Debug, Clone)]
pub struct Sequence {
    program: Arc<Program>,
    cursor: usize,
    refs: Vec<RefId>,
    pending: Option<Pending>,
    choice: Option<ProcessId>,
    replicating: bool,
}

impl Sequence {
    pub fn new(replicating: bool) -> Self {
        Self {
            program: Arc::new(Program::default()),
            cursor: 0,
            refs: Vec::new(),
            pending: None,
            choice: None,
            replicating,
        }
    }

    pub fn is_replicating(&self) -> bool {
        self.replicating
    }

    /// Slot for `name`, allocating its cell on first mention
    pub fn slot(&mut self, name: &Name, cells: &mut References) -> Slot {
        if let Some(slot) = self.program.slot_of(name) {
            return slot;
        }
        let slot = Slot(self.refs.len());
        self.refs.push(cells.alloc(name.initial_value()));
        Arc::make_mut(&mut self.program)
            .slots
            .insert(name.clone(), slot);
        slot
    }

    pub fn push_step(&mut self, step: Step) {
        Arc::make_mut(&mut self.program).steps.push(step);
    }

    pub fn program(&self) -> Arc<Program> {
        Arc::clone(&self.program)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Take the step under the cursor, moving the cursor past it
    pub fn advance(&mut self) -> Option<usize> {
        if self.cursor < self.program.len() {
            let index = self.cursor;
            self.cursor += 1;
            Some(index)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Past the last step with nothing left on any channel
    pub fn is_inert(&self) -> bool {
        self.cursor >= self.program.len() && self.pending.is_none()
    }

    pub fn refs(&self) -> &[RefId] {
        &self.refs
    }

    pub fn cell(&self, slot: Slot) -> Result<RefId> {
        self.refs
            .get(slot.0)
            .copied()
            .ok_or_else(|| PiplError::internal(format!("slot {} has no cell", slot.0)))
    }

    pub fn pending(&self) -> Option<Pending> {
        self.pending
    }

    pub fn set_pending(&mut self, pending: Pending) {
        self.pending = Some(pending);
    }

    pub fn take_pending(&mut self) -> Option<Pending> {
        self.pending.take()
    }

    pub fn set_choice(&mut self, owner: ProcessId) {
        self.choice = Some(owner);
    }

    /// Clear the choice link, returning the owner if it was still set
    pub fn take_choice(&mut self) -> Option<ProcessId> {
        self.choice.take()
    }

    /// One-shot continuation of this sequence positioned after `fired`.
    ///
    /// Shares the program, owns copies of every cell.
    pub fn fork(&self, fired: usize, cells: &mut References) -> Result<Sequence> {
        Ok(Sequence {
            program: Arc::clone(&self.program),
            cursor: fired + 1,
            refs: cells.copy_all(&self.refs)?,
            pending: None,
            choice: None,
            replicating: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::{Value, VarId};

    fn read_step(channel: Slot, target: Slot) -> Step {
        Step::Read { channel, target }
    }

    #[test]
    fn test_same_name_shares_slot() {
        let mut cells = References::new();
        let mut seq = Sequence::new(false);
        let w = Name::Channel(ChannelId(0));

        let a = seq.slot(&w, &mut cells);
        let b = seq.slot(&Name::from(42), &mut cells);
        let c = seq.slot(&w, &mut cells);

        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(seq.refs().len(), 2);
        assert_eq!(cells.get(seq.cell(b).unwrap()).unwrap(), &Value::Int(42));
    }

    #[test]
    fn test_cursor_walks_program_once() {
        let mut cells = References::new();
        let mut seq = Sequence::new(false);
        let w = seq.slot(&Name::Channel(ChannelId(0)), &mut cells);
        let x = seq.slot(&Name::Var(VarId(0)), &mut cells);
        seq.push_step(read_step(w, x));
        seq.push_step(read_step(w, x));

        assert_eq!(seq.advance(), Some(0));
        assert_eq!(seq.advance(), Some(1));
        assert_eq!(seq.advance(), None);
        assert!(seq.is_inert());

        seq.set_pending(Pending {
            channel: ChannelId(0),
            step: 1,
        });
        assert!(!seq.is_inert());
    }

    #[test]
    fn test_fork_copies_cells_and_skips_fired_step() {
        let mut cells = References::new();
        let mut seq = Sequence::new(true);
        let w = seq.slot(&Name::Channel(ChannelId(0)), &mut cells);
        let x = seq.slot(&Name::Var(VarId(0)), &mut cells);
        seq.push_step(read_step(w, x));
        seq.push_step(read_step(w, x));
        seq.set_choice(ProcessId(9));

        let replica = seq.fork(0, &mut cells).unwrap();
        assert_eq!(replica.cursor(), 1);
        assert!(!replica.is_replicating());
        assert!(replica.pending().is_none());
        assert!(Arc::ptr_eq(&replica.program(), &seq.program()));

        cells.set(replica.cell(x).unwrap(), Value::Int(5)).unwrap();
        assert!(cells.get(seq.cell(x).unwrap()).unwrap().is_unset());
    }

    #[test]
    fn test_take_choice_is_one_shot() {
        let mut seq = Sequence::new(false);
        seq.set_choice(ProcessId(3));
        assert_eq!(seq.take_choice(), Some(ProcessId(3)));
        assert_eq!(seq.take_choice(), None);
    }
}
