//! Typed unbuffered channel

use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Subscribers<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

pub struct Channel<T> {
    name: &'static str,
    subscribers: Arc<RwLock<Subscribers<T>>>,
}

impl<T: 'static> Channel<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            subscribers: Arc::new(RwLock::new(Subscribers {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register `callback` for every emission from now on
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut subscribers = self.subscribers.write();
            let id = subscribers.next_id;
            subscribers.next_id += 1;
            subscribers.entries.push((id, Arc::new(callback)));
            id
        };

        let weak: Weak<RwLock<Subscribers<T>>> = Arc::downgrade(&self.subscribers);
        Subscription {
            channel: self.name,
            detach: Some(Box::new(move || {
                if let Some(subscribers) = weak.upgrade() {
                    subscribers.write().entries.retain(|(entry, _)| *entry != id);
                }
            })),
        }
    }

    /// Deliver `value` to the current subscribers in subscription order.
    /// Returns how many were reached.
    pub fn emit(&self, value: T) -> usize {
        // Callbacks may (un)subscribe while we deliver
        let targets: Vec<Callback<T>> = self
            .subscribers
            .read()
            .entries
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in &targets {
            callback(&value);
        }

        tracing::trace!(channel = self.name, subscribers = targets.len(), "Emitted");
        targets.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().entries.len()
    }
}

impl<T: Clone + Send + 'static> Channel<T> {
    /// Forward emissions into an async receiver.
    ///
    /// The receiver only sees what is emitted after this call.
    pub fn listen(&self) -> (Subscription, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |value: &T| {
            let _ = tx.send(value.clone());
        });
        (subscription, rx)
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

/// Handle to one registration. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    channel: &'static str,
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn channel(&self) -> &'static str {
        self.channel
    }

    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("active", &self.detach.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_delivery_follows_subscription_order() {
        let channel: Channel<u32> = Channel::new("numbers");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let subs: Vec<Subscription> = (0..3)
            .map(|n| {
                let seen = Arc::clone(&seen);
                channel.subscribe(move |value| seen.lock().push((n, *value)))
            })
            .collect();

        assert_eq!(channel.emit(7), 3);
        assert_eq!(*seen.lock(), vec![(0, 7), (1, 7), (2, 7)]);
        drop(subs);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let channel: Channel<&'static str> = Channel::new("changes");
        assert_eq!(channel.emit("before"), 0);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let seen = Arc::clone(&seen);
            channel.subscribe(move |value| seen.lock().push(*value))
        };
        assert!(seen.lock().is_empty());

        channel.emit("after");
        assert_eq!(*seen.lock(), vec!["after"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let channel: Channel<u32> = Channel::new("numbers");
        let count = Arc::new(Mutex::new(0));
        let sub = {
            let count = Arc::clone(&count);
            channel.subscribe(move |_| *count.lock() += 1)
        };

        channel.emit(1);
        sub.unsubscribe();
        channel.emit(2);
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_subscription_outlives_channel() {
        let channel: Channel<u32> = Channel::new("short");
        let sub = channel.subscribe(|_| {});
        drop(channel);
        drop(sub);
    }

    #[test]
    fn test_callback_can_subscribe_during_emit() {
        let channel: Channel<u32> = Channel::new("reentrant");
        let held = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let inner = channel.clone();
            let held = Arc::clone(&held);
            channel.subscribe(move |_| held.lock().push(inner.subscribe(|_| {})))
        };

        assert_eq!(channel.emit(1), 1);
        assert_eq!(channel.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_listen_forwards_values() {
        let channel: Channel<String> = Channel::new("closed");
        let (_sub, mut rx) = channel.listen();

        channel.emit("s1".to_string());
        channel.emit("s2".to_string());
        assert_eq!(rx.recv().await.unwrap(), "s1");
        assert_eq!(rx.recv().await.unwrap(), "s2");
    }
}
