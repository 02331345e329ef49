//! The proceed / output / input protocol between processes and channels.
//!
//! A sequence fires steps until one registers an offer; a synchronization
//! pops one sender and one reader, takes the sender's value (letting the
//! sender continue), then delivers it to the reader (letting the reader
//! continue). Replicating sequences hand each match to a fresh one-shot
//! copy and re-offer their first step. Choice arms cancel their siblings
//! the first time any of them is matched.

use tracing::{debug, info, trace};

use super::events::EngineEvent;
use super::Engine;
use crate::core::errors::{PiplError, Result};
use crate::core::value::{ChannelId, ProcessId, RefId, Value};
use crate::process::{Origin, Pending, Process, ProcessKind, Sequence, Slot, Step};

/// Which side of a synchronization a process was matched on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Sender,
    Reader,
}

impl Engine {
    pub(super) fn proceed(&mut self, process: ProcessId) -> Result<()> {
        let (members, choice) = match &self.process(process)?.kind {
            ProcessKind::Sequence(_) => return self.proceed_sequence(process),
            ProcessKind::Parallel(parallel) => (parallel.members().to_vec(), false),
            ProcessKind::Choice(choice) => (choice.arms().to_vec(), true),
        };
        for member in members {
            if choice {
                self.sequence_mut(member)?.set_choice(process);
            }
            self.proceed(member)?;
        }
        Ok(())
    }

    fn proceed_sequence(&mut self, process: ProcessId) -> Result<()> {
        loop {
            let next = {
                let seq = self.sequence_mut(process)?;
                seq.advance().map(|index| (index, seq.program()))
            };
            let Some((index, program)) = next else {
                return self.retire(process);
            };
            let step = program
                .step(index)
                .ok_or_else(|| PiplError::internal(format!("{} has no step {}", process, index)))?;
            match step {
                Step::Send { channel, .. } => {
                    let channel = self.resolve_channel(process, *channel)?;
                    self.sequence_mut(process)?.set_pending(Pending { channel, step: index });
                    if self.channel_mut(channel)?.send(process) {
                        self.enqueue_step(channel)?;
                    }
                    return Ok(());
                }
                Step::Read { channel, .. } => {
                    let channel = self.resolve_channel(process, *channel)?;
                    self.sequence_mut(process)?.set_pending(Pending { channel, step: index });
                    if self.channel_mut(channel)?.read(process) {
                        self.enqueue_step(channel)?;
                    }
                    return Ok(());
                }
                Step::Function { label, func, args } => {
                    let cells = self.cells_of(process, args)?;
                    let mut values = cells
                        .iter()
                        .map(|cell| self.cells.get(*cell).cloned())
                        .collect::<Result<Vec<_>>>()?;
                    trace!(process = %process, function = %label, "calling function step");
                    (**func)(&mut values).map_err(|source| PiplError::Function { process, source })?;
                    for (cell, value) in cells.into_iter().zip(values) {
                        self.cells.set(cell, value)?;
                    }
                }
            }
        }
    }

    /// Queue a channel for a synchronization pass
    pub(super) fn enqueue_step(&mut self, channel: ChannelId) -> Result<()> {
        if self.ready.push(channel) {
            Ok(())
        } else {
            Err(PiplError::QueueFull {
                capacity: self.ready.capacity(),
            })
        }
    }

    pub(super) fn sync(&mut self, channel: ChannelId) -> Result<()> {
        let step = self.step_count;
        let Some((sender, reader)) = self.channel_mut(channel)?.take_pair() else {
            trace!(step, channel = %channel, "null step");
            self.stats.record_null_step();
            self.events.emit(EngineEvent::NullStep { step, channel });
            return Ok(());
        };

        let value = self.output(sender)?;
        let event = EngineEvent::Synchronized {
            step,
            channel,
            sender,
            reader,
            value: value.clone(),
        };
        if self.config.trace_synchronizations {
            info!("{}", event);
        }
        self.events.emit(event);
        self.input(reader, value)?;
        self.stats.record_synchronization();
        Ok(())
    }

    /// Matched as sender: produce the offered value and move on
    fn output(&mut self, process: ProcessId) -> Result<Value> {
        let (pending, actor) = self.matched(process, Side::Sender)?;
        let value = self.offered_value(actor, pending.step)?;
        self.proceed(actor)?;
        if actor != process {
            self.restart(process)?;
        }
        Ok(value)
    }

    /// Matched as reader: bind the received value and move on
    fn input(&mut self, process: ProcessId, value: Value) -> Result<()> {
        let (pending, actor) = self.matched(process, Side::Reader)?;
        let target = match self.step_of(actor, pending.step)? {
            Step::Read { target, .. } => target,
            other => {
                return Err(PiplError::internal(format!(
                    "{} matched as reader on a {} step",
                    actor,
                    other.kind()
                )))
            }
        };
        let cell = self.sequence(actor)?.cell(target)?;
        self.cells.set(cell, value)?;
        self.proceed(actor)?;
        if actor != process {
            self.restart(process)?;
        }
        Ok(())
    }

    /// Common prologue for both sides of a match.
    ///
    /// Consumes the pending offer, notifies the choice owner once, and for a
    /// replicating sequence forks the replica that carries on instead.
    /// Returns the process that should continue.
    fn matched(&mut self, process: ProcessId, side: Side) -> Result<(Pending, ProcessId)> {
        let (pending, owner, replicating) = {
            let seq = self.sequence_mut(process)?;
            let pending = seq.take_pending().ok_or_else(|| {
                PiplError::internal(format!("{} matched as {:?} without an offer", process, side))
            })?;
            (pending, seq.take_choice(), seq.is_replicating())
        };
        if let Some(owner) = owner {
            self.chosen(owner, process)?;
        }
        let actor = if replicating {
            self.fork_replica(process, pending.step)?
        } else {
            process
        };
        Ok((pending, actor))
    }

    /// Commit a choice to `arm` and withdraw every sibling's offer
    fn chosen(&mut self, owner: ProcessId, arm: ProcessId) -> Result<()> {
        let siblings = match &mut self.process_mut(owner)?.kind {
            ProcessKind::Choice(choice) => choice.commit(arm),
            _ => {
                return Err(PiplError::internal(format!(
                    "{} linked to {} which is not a choice",
                    arm, owner
                )))
            }
        };
        debug!(choice = %owner, arm = %arm, cancelling = siblings.len(), "choice committed");

        for sibling in siblings {
            let pending = {
                let seq = self.sequence_mut(sibling)?;
                seq.take_choice();
                seq.pending()
            };
            let Some(pending) = pending else { continue };
            // An offer already popped by the current synchronization stays with its sibling
            if self.channel_mut(pending.channel)?.cancel(sibling) {
                self.sequence_mut(sibling)?.take_pending();
                self.stats.record_cancellation();
                self.events.emit(EngineEvent::Cancelled {
                    channel: pending.channel,
                    process: sibling,
                    choice: owner,
                });
            }
        }
        Ok(())
    }

    fn fork_replica(&mut self, origin: ProcessId, fired: usize) -> Result<ProcessId> {
        let replica = match self.processes.get(&origin) {
            Some(Process {
                kind: ProcessKind::Sequence(seq),
                ..
            }) => seq.fork(fired, &mut self.cells)?,
            Some(_) => return Err(PiplError::internal(format!("{} cannot replicate", origin))),
            None => return Err(PiplError::UnknownProcess(origin)),
        };
        let id = self.allocate_process_id();
        self.processes.insert(id, Process::replica(id, origin, replica));
        self.stats.record_fork();
        debug!(origin = %origin, replica = %id, resume_at = fired + 1, "replica forked");
        self.events.emit(EngineEvent::ReplicaForked {
            origin,
            replica: id,
            resume_at: fired + 1,
        });
        Ok(id)
    }

    /// Re-offer a replicating sequence from its first step
    fn restart(&mut self, process: ProcessId) -> Result<()> {
        self.sequence_mut(process)?.reset();
        self.proceed(process)
    }

    /// Drop an exhausted replica and recycle its cells
    fn retire(&mut self, process: ProcessId) -> Result<()> {
        let reclaim = self.config.reclaim_replicas
            && matches!(self.process(process)?.origin, Origin::Replica { .. });
        if !reclaim {
            return Ok(());
        }
        if let Some(removed) = self.processes.remove(&process) {
            if let Some(seq) = removed.as_sequence() {
                for cell in seq.refs() {
                    self.cells.release(*cell);
                }
            }
            trace!(process = %process, "replica retired");
        }
        Ok(())
    }

    fn offered_value(&self, process: ProcessId, step: usize) -> Result<Value> {
        match self.step_of(process, step)? {
            Step::Send { value, .. } => {
                let cell = self.sequence(process)?.cell(value)?;
                Ok(self.cells.get(cell)?.clone())
            }
            other => Err(PiplError::internal(format!(
                "{} matched as sender on a {} step",
                process,
                other.kind()
            ))),
        }
    }

    fn resolve_channel(&self, process: ProcessId, slot: Slot) -> Result<ChannelId> {
        let cell = self.sequence(process)?.cell(slot)?;
        let channel = self.cells.get(cell)?.as_channel(process)?;
        self.channel(channel)?;
        Ok(channel)
    }

    fn step_of(&self, process: ProcessId, index: usize) -> Result<Step> {
        self.sequence(process)?
            .program()
            .step(index)
            .cloned()
            .ok_or_else(|| PiplError::internal(format!("{} has no step {}", process, index)))
    }

    fn cells_of(&self, process: ProcessId, slots: &[Slot]) -> Result<Vec<RefId>> {
        let seq = self.sequence(process)?;
        slots.iter().map(|slot| seq.cell(*slot)).collect()
    }

    fn sequence(&self, process: ProcessId) -> Result<&Sequence> {
        self.process(process)?
            .as_sequence()
            .ok_or_else(|| PiplError::internal(format!("{} is not a sequence", process)))
    }

    fn sequence_mut(&mut self, process: ProcessId) -> Result<&mut Sequence> {
        self.process_mut(process)?
            .as_sequence_mut()
            .ok_or_else(|| PiplError::internal(format!("{} is not a sequence", process)))
    }
}
