//! Rendezvous channels
//!
//! A channel keeps the processes currently offering to send and to read on
//! it, oldest first. It does not move values itself: it reports when a new
//! offer completes a pairing, and hands out the oldest pair when the engine
//! synchronizes it.

use std::collections::VecDeque;
use tracing::debug;

use crate::core::value::{ChannelId, ProcessId};

/// Pending offers on one channel
#[derive(Debug, Clone)]
pub struct Channel {
    id: ChannelId,
    send_queue: VecDeque<ProcessId>,
    read_queue: VecDeque<ProcessId>,
}

impl Channel {
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            send_queue: VecDeque::new(),
            read_queue: VecDeque::new(),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Register a send offer.
    ///
    /// Returns true when a reader was already waiting without a match, i.e.
    /// when this offer completes a new pairing and the channel must be
    /// scheduled.
    pub fn send(&mut self, offer: ProcessId) -> bool {
        let ready = self.read_queue.len() > self.send_queue.len();
        self.send_queue.push_back(offer);
        debug!(channel = %self.id, process = %offer, ready, "send offer");
        ready
    }

    /// Register a read offer. Symmetric to [`Channel::send`].
    pub fn read(&mut self, offer: ProcessId) -> bool {
        let ready = self.send_queue.len() > self.read_queue.len();
        self.read_queue.push_back(offer);
        debug!(channel = %self.id, process = %offer, ready, "read offer");
        ready
    }

    /// Pop the oldest sender and the oldest reader.
    ///
    /// None when either side is empty, which happens when a scheduled
    /// pairing was cancelled before the channel came up in the ready queue.
    pub fn take_pair(&mut self) -> Option<(ProcessId, ProcessId)> {
        if self.send_queue.is_empty() || self.read_queue.is_empty() {
            return None;
        }
        let sender = self.send_queue.pop_front()?;
        let reader = self.read_queue.pop_front()?;
        Some((sender, reader))
    }

    /// Withdraw an offer from whichever queue holds it. Absent offers are ignored.
    pub fn cancel(&mut self, offer: ProcessId) -> bool {
        let before = self.send_queue.len() + self.read_queue.len();
        self.send_queue.retain(|p| *p != offer);
        self.read_queue.retain(|p| *p != offer);
        let removed = before != self.send_queue.len() + self.read_queue.len();
        if removed {
            debug!(channel = %self.id, process = %offer, "offer cancelled");
        }
        removed
    }

    /// Both sides have someone waiting
    pub fn is_ready(&self) -> bool {
        !self.send_queue.is_empty() && !self.read_queue.is_empty()
    }

    /// Number of pending (senders, readers)
    pub fn pending(&self) -> (usize, usize) {
        (self.send_queue.len(), self.read_queue.len())
    }

    pub fn senders(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.send_queue.iter().copied()
    }

    pub fn readers(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.read_queue.iter().copied()
    }
}
