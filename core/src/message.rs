//! Bounded multi-producer / single-consumer notification channel.
//!
//! Delivery is synchronous inside `put()`: registered callbacks run on the
//! calling thread (the emulation thread, for everything the run loop posts).
//! Hosts must not block inside a callback.

use std::collections::VecDeque;

/// Asynchronous notifications posted to host listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    RomMissing,
    CpuJammed,
    SnapshotTaken,
    DiskInserted,
    DiskEjected,
    BreakpointReached { pc: u16 },
    WatchpointReached { addr: u16 },
}

/// Identifies a registered listener so it can later be removed. Opaque and
/// monotonically increasing; callers treat it as a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    sender: u64,
    callback: Box<dyn FnMut(&Message) + Send>,
}

/// Capacity of the internal backlog kept for listeners registered after
/// messages were already posted; the queue itself delivers synchronously, so
/// this backlog exists only to bound memory if `put()` races a
/// `remove_listener()` call (the listener simply misses messages posted
/// before it was added, same as the backlog is never drained to it).
const BACKLOG_CAP: usize = 256;

/// Bounded MPSC message queue with synchronous, sender-keyed delivery.
pub struct MessageQueue {
    listeners: Vec<Listener>,
    next_id: u64,
    backlog: VecDeque<(u64, Message)>,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
            backlog: VecDeque::new(),
        }
    }

    /// Register a listener keyed by `sender` (an opaque id the host assigns
    /// to itself, e.g. a window or subsystem handle).
    pub fn add_listener(
        &mut self,
        sender: u64,
        callback: impl FnMut(&Message) + Send + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            sender,
            callback: Box::new(callback),
        });
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.retain(|l| l.id != id);
    }

    /// Post a message. Invokes every listener registered for `sender`
    /// synchronously, in registration order.
    pub fn put(&mut self, sender: u64, message: Message) {
        if self.backlog.len() >= BACKLOG_CAP {
            self.backlog.pop_front();
        }
        self.backlog.push_back((sender, message.clone()));
        for listener in self.listeners.iter_mut().filter(|l| l.sender == sender) {
            (listener.callback)(&message);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
