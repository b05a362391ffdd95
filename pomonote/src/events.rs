use pomonote_ipc::TimerEvent;

pub type Listener = Box<dyn FnMut(&TimerEvent) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Synchronous observer list. Every emitted event reaches every listener
/// registered at that moment, in registration order.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&TimerEvent) + Send + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` if the id was not (or no longer) registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn emit(&mut self, event: &TimerEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn delivers_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();
        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            bus.subscribe(move |event| seen.lock().unwrap().push((tag, event.name())));
        }

        bus.emit(&TimerEvent::Pause);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", "pause"), ("second", "pause"), ("third", "pause")]
        );
    }

    #[test]
    fn unsubscribed_listeners_stop_receiving() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();
        let id = {
            let count = count.clone();
            bus.subscribe(move |_| *count.lock().unwrap() += 1)
        };

        bus.emit(&TimerEvent::Resume);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(&TimerEvent::Resume);

        assert_eq!(*count.lock().unwrap(), 1);
        assert!(bus.is_empty());
    }
}
