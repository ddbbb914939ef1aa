//! In-process publish/subscribe hub

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, warn};

/// Called with the topic and payload of every message published on a
/// subscribed topic
pub type Handler = Arc<dyn Fn(&str, &Value) + Send + Sync>;

pub trait Hub: Send + Sync {
    fn publish(&self, topic: &str, data: Value);
    fn subscribe(&self, topic: &str, handler: Handler) -> Subscription;
}

/// Removes its handler from the hub when `unsubscribe` is called
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

type Subscribers = HashMap<String, Vec<(u64, Handler)>>;

#[derive(Default)]
struct Inner {
    next_id: u64,
    subscribers: Subscribers,
}

/// Hub delivering messages synchronously on the publisher's task
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        match self.inner.read() {
            Ok(inner) => inner.subscribers.get(topic).map_or(0, Vec::len),
            Err(_) => 0,
        }
    }
}

impl Hub for MemoryHub {
    fn publish(&self, topic: &str, data: Value) {
        // Handlers may publish in turn, so none are called under the lock
        let handlers: Vec<Handler> = match self.inner.read() {
            Ok(inner) => inner
                .subscribers
                .get(topic)
                .map(|subs| subs.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default(),
            Err(_) => {
                warn!("Hub lock poisoned, dropping message on {}", topic);
                return;
            }
        };
        debug!("Publishing on {} to {} subscriber(s)", topic, handlers.len());
        for handler in handlers {
            handler(topic, &data);
        }
    }

    fn subscribe(&self, topic: &str, handler: Handler) -> Subscription {
        let id = match self.inner.write() {
            Ok(mut inner) => {
                inner.next_id += 1;
                let id = inner.next_id;
                inner
                    .subscribers
                    .entry(topic.to_string())
                    .or_default()
                    .push((id, handler));
                id
            }
            Err(_) => {
                warn!("Hub lock poisoned, subscription to {} ignored", topic);
                return Subscription { cancel: None };
            }
        };

        let inner = Arc::clone(&self.inner);
        let topic = topic.to_string();
        Subscription::new(move || {
            if let Ok(mut inner) = inner.write() {
                if let Some(subs) = inner.subscribers.get_mut(&topic) {
                    subs.retain(|(sub_id, _)| *sub_id != id);
                    if subs.is_empty() {
                        inner.subscribers.remove(&topic);
                    }
                }
            }
        })
    }
}
