//! Bounded notification queue with an explicit replay contract: events
//! published before anyone subscribes are buffered (bounded, oldest dropped
//! first) and delivered to the first subscriber; later events fan out live
//! to every connected subscriber.

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Error,
}

/// One user-facing notification produced by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notification {
    pub fn info(id: impl Into<String>, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            severity: Severity::Info,
            title: title.into(),
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn error(id: impl Into<String>, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            severity: Severity::Error,
            title: title.into(),
            message: message.into(),
            at: Utc::now(),
        }
    }
}

struct HubState {
    buffer: VecDeque<Notification>,
    dropped: u64,
    subscribers: Vec<Sender<Notification>>,
}

pub struct NotificationHub {
    capacity: usize,
    state: Mutex<HubState>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(HubState {
                buffer: VecDeque::new(),
                dropped: 0,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Publish an event. With no subscribers attached yet, the event lands in
    /// the bounded buffer; once the buffer is full, the oldest entry is
    /// dropped and counted.
    pub fn publish(&self, notification: Notification) {
        let mut state = self.state.lock().expect("hub mutex poisoned");

        if state.subscribers.is_empty() {
            if state.buffer.len() == self.capacity {
                state.buffer.pop_front();
                state.dropped += 1;
            }
            state.buffer.push_back(notification);
            return;
        }

        state
            .subscribers
            .retain(|subscriber| subscriber.send(notification.clone()).is_ok());

        // Every subscriber may have disconnected since the last publish;
        // fall back to buffering so the event is not lost.
        if state.subscribers.is_empty() {
            if state.buffer.len() == self.capacity {
                state.buffer.pop_front();
                state.dropped += 1;
            }
            state.buffer.push_back(notification);
        }
    }

    /// Attach a subscriber. The first subscriber receives every buffered
    /// event, in publish order, before any live event.
    pub fn subscribe(&self) -> Receiver<Notification> {
        let (sender, receiver) = channel();
        let mut state = self.state.lock().expect("hub mutex poisoned");

        for buffered in state.buffer.drain(..) {
            // A receiver we just created cannot be disconnected yet.
            let _ = sender.send(buffered);
        }
        state.subscribers.push(sender);

        receiver
    }

    /// Events discarded because the pre-subscriber buffer overflowed.
    pub fn dropped(&self) -> u64 {
        self.state.lock().expect("hub mutex poisoned").dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_subscriber_replays_buffered_events_in_order() {
        let hub = NotificationHub::new(8);
        hub.publish(Notification::info("n1", "Updated", "first"));
        hub.publish(Notification::info("n2", "Updated", "second"));

        let receiver = hub.subscribe();
        let first = receiver.try_recv().expect("replayed event");
        let second = receiver.try_recv().expect("replayed event");
        assert_eq!(first.id, "n1");
        assert_eq!(second.id, "n2");
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn buffer_is_bounded_and_drops_oldest() {
        let hub = NotificationHub::new(2);
        hub.publish(Notification::info("n1", "t", "m"));
        hub.publish(Notification::info("n2", "t", "m"));
        hub.publish(Notification::info("n3", "t", "m"));

        assert_eq!(hub.dropped(), 1);
        let receiver = hub.subscribe();
        assert_eq!(receiver.try_recv().expect("event").id, "n2");
        assert_eq!(receiver.try_recv().expect("event").id, "n3");
    }

    #[test]
    fn live_events_fan_out_to_all_subscribers() {
        let hub = NotificationHub::new(4);
        let first = hub.subscribe();
        let second = hub.subscribe();

        hub.publish(Notification::info("n1", "t", "m"));

        assert_eq!(first.try_recv().expect("event").id, "n1");
        assert_eq!(second.try_recv().expect("event").id, "n1");
    }

    #[test]
    fn events_buffer_again_after_all_subscribers_disconnect() {
        let hub = NotificationHub::new(4);
        drop(hub.subscribe());

        hub.publish(Notification::info("n1", "t", "m"));

        let receiver = hub.subscribe();
        assert_eq!(receiver.try_recv().expect("event").id, "n1");
    }
}
