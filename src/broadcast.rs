//! Fan-out of live events to every connected client.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::ranking::Entry;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Event {
    LeaderboardUpdated(Vec<Entry>),
    ActiveUsers(usize),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::LeaderboardUpdated(_) => "leaderboardUpdated",
            Event::ActiveUsers(_) => "activeUsers",
        }
    }

    /// Encode as a Server-Sent-Events frame
    pub fn to_sse(&self) -> String {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "null".to_string());
        format!("event: {}\ndata: {}\n\n", self.name(), data)
    }
}

pub struct Hub {
    sender: broadcast::Sender<Event>,
    clients: AtomicUsize,
}

impl Hub {
    /// `capacity` events are buffered per client before it starts skipping
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            clients: AtomicUsize::new(0),
        }
    }

    /// Send an event to everyone, returning how many clients received it
    pub fn publish(&self, event: Event) -> usize {
        log::debug!(target: "broadcast", "Publishing {}", event.name());
        // No receivers is not an error
        self.sender.send(event).unwrap_or(0)
    }

    pub fn active_clients(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    /// Register a new client and tell everyone about it
    pub fn subscribe(self: Arc<Self>) -> Subscription {
        let receiver = self.sender.subscribe();
        let count = self.clients.fetch_add(1, Ordering::SeqCst) + 1;
        self.publish(Event::ActiveUsers(count));
        Subscription {
            hub: self,
            receiver,
        }
    }
}

/// A connected client; dropping it counts as a disconnect
pub struct Subscription {
    hub: Arc<Hub>,
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Next event for this client, `None` once the hub is gone
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!(target: "broadcast", "Client lagged, {skipped} event(s) skipped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let count = self.hub.clients.fetch_sub(1, Ordering::SeqCst) - 1;
        self.hub.publish(Event::ActiveUsers(count));
    }
}
