//! Synchronous fan-out of domain events to observers.

/// Holds subscriber callbacks and hands each published event to all of them,
/// in subscription order, on the publishing thread.
///
/// Subscribers shouldn't block; the adder and restorer publish mid-walk.
pub struct EventManager<T> {
    subscribers: Vec<Box<dyn Fn(&T) + Send>>,
}

impl<T> EventManager<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe<F: Fn(&T) + Send + 'static>(&mut self, callback: F) {
        self.subscribers.push(Box::new(callback));
    }

    pub fn publish(&self, event: &T) {
        for subscriber in &self.subscribers {
            subscriber(event);
        }
    }
}

impl<T> Default for EventManager<T> {
    fn default() -> Self {
        Self::new()
    }
}
