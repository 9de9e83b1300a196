//! Broadcast registry for long-lived subscribers.
//!
//! Suspended requests and websocket connections that wait on shared
//! events register here. The registry is owned and injected by the
//! embedder; there is no global state. Each subscriber gets its own
//! mailbox, drained at its own pace.

use std::collections::VecDeque;

/// Handle identifying one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

/// A broadcast channel with per-subscriber mailboxes.
#[derive(Debug)]
pub struct PubSub<M: Clone> {
    next_id: u64,
    subscribers: Vec<(u64, VecDeque<M>)>,
}

impl<M: Clone> Default for PubSub<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Clone> PubSub<M> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Subscription {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push((id, VecDeque::new()));
        Subscription(id)
    }

    /// Drop a subscriber and whatever it had not drained.
    pub fn unsubscribe(&mut self, sub: Subscription) {
        self.subscribers.retain(|(id, _)| *id != sub.0);
    }

    /// Deliver `message` to every mailbox. Returns how many
    /// subscribers got it.
    pub fn publish(&mut self, message: M) -> usize {
        for (_, mailbox) in &mut self.subscribers {
            mailbox.push_back(message.clone());
        }
        self.subscribers.len()
    }

    /// Take everything queued for one subscriber.
    pub fn drain(&mut self, sub: Subscription) -> Vec<M> {
        match self.subscribers.iter_mut().find(|(id, _)| *id == sub.0) {
            Some((_, mailbox)) => mailbox.drain(..).collect(),
            None => Vec::new(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
