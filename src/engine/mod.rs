//! The engine: process and channel factories, graph building, and the run loop.
//!
//! Everything lives in arenas owned by one [`Engine`] value. Launching a
//! process registers offers on channels; a channel whose new offer completes
//! a pairing is pushed onto the ready queue; the run loop pops channels in
//! that order and synchronizes each one, which may register further offers.
//! A run ends exactly when the ready queue is empty.

pub mod events;
mod protocol;
pub mod ready_queue;
pub mod stats;

pub use events::{BufferingEventSink, EngineEvent, EventEnvelope, EventSink, LoggingEventSink};
pub use ready_queue::ReadyQueue;
pub use stats::RunStats;

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::channel::Channel;
use crate::core::config::EngineConfig;
use crate::core::errors::{PiplError, Result};
use crate::core::value::{ChannelId, Name, ProcessId, Value, VarId};
use crate::process::{Choice, Origin, Parallel, Process, ProcessKind, References, Sequence, Step};
use events::EventEmitter;

pub struct Engine {
    config: EngineConfig,
    channels: Vec<Channel>,
    processes: HashMap<ProcessId, Process>,
    next_process: usize,
    next_var: usize,
    cells: References,
    ready: ReadyQueue<ChannelId>,
    step_count: u64,
    stats: RunStats,
    events: EventEmitter,
    /// Set when a synchronization or launch failed part way through
    poisoned: bool,
}

impl Engine {
    pub fn new() -> Self {
        Self::build(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        let ready = ReadyQueue::new(config.ready_queue_capacity);
        let events = EventEmitter::new();
        debug!(run_id = events.run_id(), "engine created");
        Self {
            config,
            channels: Vec::new(),
            processes: HashMap::new(),
            next_process: 0,
            next_var: 0,
            cells: References::new(),
            ready,
            step_count: 0,
            stats: RunStats::new(),
            events,
            poisoned: false,
        }
    }

    /// Attach a sink that observes synchronizations, cancellations and forks
    pub fn set_event_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.events.set_sink(sink);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run_id(&self) -> &str {
        self.events.run_id()
    }

    // Factories

    pub fn make_channel(&mut self) -> ChannelId {
        let id = ChannelId(self.channels.len());
        self.channels.push(Channel::new(id));
        id
    }

    /// A placeholder name whose cell starts out [`Value::Unset`]
    pub fn make_variable(&mut self) -> VarId {
        let id = VarId(self.next_var);
        self.next_var += 1;
        id
    }

    pub fn make_sequence(&mut self) -> ProcessId {
        self.insert(ProcessKind::Sequence(Sequence::new(false)))
    }

    pub fn make_replicating_sequence(&mut self) -> ProcessId {
        self.insert(ProcessKind::Sequence(Sequence::new(true)))
    }

    pub fn make_parallel_process(&mut self) -> ProcessId {
        self.insert(ProcessKind::Parallel(Parallel::new()))
    }

    pub fn make_choice_process(&mut self) -> ProcessId {
        self.insert(ProcessKind::Choice(Choice::new()))
    }

    fn insert(&mut self, kind: ProcessKind) -> ProcessId {
        let id = self.allocate_process_id();
        self.processes.insert(id, Process::new(id, kind));
        id
    }

    fn allocate_process_id(&mut self) -> ProcessId {
        let id = ProcessId(self.next_process);
        self.next_process += 1;
        id
    }

    // Building

    /// Append a step offering the content of `value` on `channel`
    pub fn add_send(
        &mut self,
        process: ProcessId,
        channel: impl Into<Name>,
        value: impl Into<Name>,
    ) -> Result<()> {
        let (channel, value) = (channel.into(), value.into());
        self.check_channel_name("add_send", &channel)?;
        self.check_name("add_send", &value)?;
        self.with_builder("add_send", process, |seq, cells| {
            let channel = seq.slot(&channel, cells);
            let value = seq.slot(&value, cells);
            seq.push_step(Step::Send { channel, value });
        })
    }

    /// Append a step reading from `channel` into a freshly allocated channel
    /// name, which is returned so later steps can use what was received
    pub fn add_read(&mut self, process: ProcessId, channel: impl Into<Name>) -> Result<Name> {
        let channel = channel.into();
        self.check_channel_name("add_read", &channel)?;
        self.check_buildable("add_read", process)?;
        let target = Name::Channel(self.make_channel());
        self.add_read_into(process, channel, target)
    }

    /// Append a step reading from `channel` into `target`, returning `target`
    pub fn add_read_into(
        &mut self,
        process: ProcessId,
        channel: impl Into<Name>,
        target: impl Into<Name>,
    ) -> Result<Name> {
        let (channel, target) = (channel.into(), target.into());
        self.check_channel_name("add_read", &channel)?;
        self.check_name("add_read", &target)?;
        self.with_builder("add_read", process, |seq, cells| {
            let channel = seq.slot(&channel, cells);
            let slot = seq.slot(&target, cells);
            seq.push_step(Step::Read {
                channel,
                target: slot,
            });
        })?;
        Ok(target)
    }

    /// Append a step that runs `func` over the cells of `args` and moves on
    pub fn add_function<F>(
        &mut self,
        process: ProcessId,
        label: &str,
        args: &[Name],
        func: F,
    ) -> Result<()>
    where
        F: Fn(&mut [Value]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        for name in args {
            self.check_name("add_function", name)?;
        }
        let func: crate::process::StepFn = Arc::new(func);
        self.with_builder("add_function", process, |seq, cells| {
            let args = args.iter().map(|name| seq.slot(name, cells)).collect();
            seq.push_step(Step::Function {
                label: label.to_string(),
                func,
                args,
            });
        })
    }

    /// Add `member` to a parallel or choice composite
    pub fn add_process(&mut self, composite: ProcessId, member: ProcessId) -> Result<()> {
        const OP: &str = "add_process";
        if composite == member {
            return Err(PiplError::invalid_argument(
                OP,
                format!("{} cannot contain itself", composite),
            ));
        }
        let member_process = self.process(member)?;
        if member_process.launched {
            return Err(PiplError::invalid_argument(
                OP,
                format!("{} was already launched", member),
            ));
        }
        if let Some(owner) = member_process.owner {
            return Err(PiplError::invalid_argument(
                OP,
                format!("{} already belongs to {}", member, owner),
            ));
        }
        let member_is_sequence = member_process.as_sequence().is_some();
        if self.ancestors(composite).contains(&member) {
            return Err(PiplError::invalid_argument(
                OP,
                format!("adding {} to {} would create a cycle", member, composite),
            ));
        }

        let target = self.process_mut(composite)?;
        if target.launched {
            return Err(PiplError::invalid_argument(
                OP,
                format!("{} was already launched", composite),
            ));
        }
        match &mut target.kind {
            ProcessKind::Parallel(parallel) => parallel.add(member),
            ProcessKind::Choice(choice) if member_is_sequence => choice.add(member),
            ProcessKind::Choice(_) => {
                return Err(PiplError::invalid_argument(
                    OP,
                    format!("choice arms must be sequences, {} is not", member),
                ))
            }
            ProcessKind::Sequence(_) => {
                return Err(PiplError::invalid_argument(
                    OP,
                    format!("{} is a sequence, not a composite", composite),
                ))
            }
        }
        self.process_mut(member)?.owner = Some(composite);
        Ok(())
    }

    fn with_builder<R>(
        &mut self,
        operation: &str,
        process: ProcessId,
        build: impl FnOnce(&mut Sequence, &mut References) -> R,
    ) -> Result<R> {
        let target = self
            .processes
            .get_mut(&process)
            .ok_or(PiplError::UnknownProcess(process))?;
        let kind = target.kind_name();
        if target.launched {
            return Err(PiplError::invalid_argument(
                operation,
                format!("{} was already launched", process),
            ));
        }
        let seq = target.as_sequence_mut().ok_or_else(|| {
            PiplError::invalid_argument(
                operation,
                format!("{} is a {}, not a sequence", process, kind),
            )
        })?;
        Ok(build(seq, &mut self.cells))
    }

    fn check_buildable(&self, operation: &str, process: ProcessId) -> Result<()> {
        let target = self.process(process)?;
        if target.launched || target.as_sequence().is_none() {
            return Err(PiplError::invalid_argument(
                operation,
                format!("{} is not an unlaunched sequence", process),
            ));
        }
        Ok(())
    }

    fn check_channel_name(&self, operation: &str, name: &Name) -> Result<()> {
        if !name.is_channel_like() {
            return Err(PiplError::invalid_argument(
                operation,
                format!("{} is not a channel", name),
            ));
        }
        self.check_name(operation, name)
    }

    fn check_name(&self, operation: &str, name: &Name) -> Result<()> {
        match name {
            Name::Channel(id) => self.channel(*id).map(|_| ()),
            Name::Var(id) if id.0 >= self.next_var => Err(PiplError::invalid_argument(
                operation,
                format!("{} was not created by this engine", id),
            )),
            Name::Var(_) => Ok(()),
            Name::Const(Value::Channel(id)) => self.channel(*id).map(|_| ()),
            Name::Const(_) => Ok(()),
        }
    }

    fn ancestors(&self, process: ProcessId) -> Vec<ProcessId> {
        let mut chain = vec![process];
        let mut current = process;
        while let Some(owner) = self.processes.get(&current).and_then(|p| p.owner) {
            chain.push(owner);
            current = owner;
        }
        chain
    }

    // Running

    /// Launch `process` and synchronize until the ready queue is empty
    pub fn run(&mut self, process: ProcessId) -> Result<RunStats> {
        self.run_all(&[process])
    }

    /// Launch every process in order, then synchronize until drained
    pub fn run_all(&mut self, processes: &[ProcessId]) -> Result<RunStats> {
        let before = self.stats;
        for process in processes {
            self.launch(*process)?;
        }
        self.drain()?;
        let delta = self.stats.since(&before);
        info!(
            steps = delta.steps,
            synchronizations = delta.synchronizations,
            null_steps = delta.null_steps,
            "run drained"
        );
        Ok(delta)
    }

    /// Push the initial proceed into `process` without running the loop
    pub fn launch(&mut self, process: ProcessId) -> Result<()> {
        self.ensure_usable("run")?;
        let target = self.process(process)?;
        if target.launched {
            return Err(PiplError::invalid_argument(
                "run",
                format!("{} was already launched", process),
            ));
        }
        if let Some(owner) = target.owner {
            return Err(PiplError::invalid_argument(
                "run",
                format!("{} is launched by its composite {}", process, owner),
            ));
        }
        debug!(process = %process, kind = target.kind_name(), "launching");
        self.mark_launched(process)?;
        let result = self.proceed(process);
        self.poison_on_error(result)
    }

    fn mark_launched(&mut self, process: ProcessId) -> Result<()> {
        let target = self.process_mut(process)?;
        target.launched = true;
        let members = match &target.kind {
            ProcessKind::Parallel(parallel) => parallel.members().to_vec(),
            ProcessKind::Choice(choice) => choice.arms().to_vec(),
            ProcessKind::Sequence(_) => Vec::new(),
        };
        for member in members {
            self.mark_launched(member)?;
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        let mut steps = 0u64;
        while self.is_running() {
            if let Some(limit) = self.config.max_steps {
                if steps >= limit {
                    return Err(PiplError::StepLimitExceeded { limit });
                }
            }
            self.step()?;
            steps += 1;
        }
        Ok(())
    }

    /// Run one iteration of the loop. Returns false when there was nothing to do.
    pub fn step(&mut self) -> Result<bool> {
        self.ensure_usable("step")?;
        let Some(channel) = self.ready.pop() else {
            return Ok(false);
        };
        self.step_count += 1;
        self.stats.steps += 1;
        let result = self.sync(channel);
        self.poison_on_error(result)?;
        Ok(true)
    }

    /// A failed launch or synchronization left offers registered that can
    /// no longer be scheduled; the engine refuses to run after that
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    fn poison_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            error!(
                category = err.category(),
                run_id = self.events.run_id(),
                "run failed: {}",
                err
            );
            self.poisoned = true;
        }
        result
    }

    fn ensure_usable(&self, operation: &str) -> Result<()> {
        if self.poisoned {
            return Err(PiplError::internal(format!(
                "{} refused: an earlier failure left the engine inconsistent",
                operation
            )));
        }
        Ok(())
    }

    /// Channels are still waiting to be synchronized
    pub fn is_running(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Queued channels in the order the loop will synchronize them
    pub fn ready_channels(&self) -> Vec<ChannelId> {
        self.ready.iter().copied().collect()
    }

    // Inspection

    pub fn channel(&self, id: ChannelId) -> Result<&Channel> {
        self.channels.get(id.0).ok_or(PiplError::UnknownChannel(id))
    }

    /// Number of pending (senders, readers) on a channel
    pub fn pending_offers(&self, id: ChannelId) -> Result<(usize, usize)> {
        Ok(self.channel(id)?.pending())
    }

    pub fn process(&self, id: ProcessId) -> Result<&Process> {
        self.processes.get(&id).ok_or(PiplError::UnknownProcess(id))
    }

    /// Current content of the cell `process` bound to `name`
    pub fn binding(&self, process: ProcessId, name: impl Into<Name>) -> Result<Value> {
        let name = name.into();
        let target = self.process(process)?;
        let seq = target.as_sequence().ok_or_else(|| {
            PiplError::invalid_argument("binding", format!("{} is not a sequence", process))
        })?;
        let slot = seq.program().slot_of(&name).ok_or_else(|| {
            PiplError::invalid_argument("binding", format!("{} never mentions {}", process, name))
        })?;
        Ok(self.cells.get(seq.cell(slot)?)?.clone())
    }

    /// Launched and never going to act again
    pub fn is_inert(&self, id: ProcessId) -> Result<bool> {
        let target = self.process(id)?;
        if !target.launched {
            return Ok(false);
        }
        match &target.kind {
            ProcessKind::Sequence(seq) => Ok(seq.is_inert()),
            ProcessKind::Parallel(parallel) => self.all_inert(parallel.members()),
            ProcessKind::Choice(choice) => self.all_inert(choice.arms()),
        }
    }

    fn all_inert(&self, members: &[ProcessId]) -> Result<bool> {
        for member in members {
            if !self.is_inert(*member)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Replicas currently alive that were forked from `process`
    pub fn replicas_of(&self, process: ProcessId) -> Vec<ProcessId> {
        let mut replicas: Vec<_> = self
            .processes
            .values()
            .filter(|p| p.origin == Origin::Replica { of: process })
            .map(|p| p.id)
            .collect();
        replicas.sort();
        replicas
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn live_references(&self) -> usize {
        self.cells.live()
    }

    /// Cumulative counters across every run of this engine
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Loop iterations executed so far
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    fn process_mut(&mut self, id: ProcessId) -> Result<&mut Process> {
        self.processes
            .get_mut(&id)
            .ok_or(PiplError::UnknownProcess(id))
    }

    fn channel_mut(&mut self, id: ChannelId) -> Result<&mut Channel> {
        self.channels
            .get_mut(id.0)
            .ok_or(PiplError::UnknownChannel(id))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
