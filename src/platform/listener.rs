// Event listener registry
//
// Listeners are invoked synchronously, in registration order, from the
// window's event pump. A failing listener is logged and skipped so one bad
// callback cannot stop the loop.

use anyhow::Result;

use super::event::{EventKind, WindowEvent};

pub type EventCallback = Box<dyn FnMut(&WindowEvent) -> Result<()>>;

/// Opaque handle returned on registration. `0` is never handed out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub const INVALID: Self = Self(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

pub struct ListenerRegistry {
    listeners: Vec<(ListenerId, EventCallback)>,
    next_id: u64,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 1,
        }
    }

    pub fn add(&mut self, callback: EventCallback) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, callback));

        log::debug!("Added event listener with ID: {}", id.get());
        id
    }

    /// Returns false if no listener had this id.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        match self.listeners.iter().position(|(existing, _)| *existing == id) {
            Some(index) => {
                self.listeners.remove(index);
                log::debug!("Removed event listener with ID: {}", id.get());
                true
            }
            None => {
                log::warn!(
                    "Attempted to remove non-existent event listener with ID: {}",
                    id.get()
                );
                false
            }
        }
    }

    pub fn clear(&mut self) {
        log::debug!("Clearing {} event listeners", self.listeners.len());
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn dispatch(&mut self, event: &WindowEvent) {
        for (id, callback) in &mut self.listeners {
            if let Err(e) = callback(event) {
                log::error!("Error in event listener {}: {:#}", id.get(), e);
            }
        }
    }
}

/// Wrap `callback` so it only sees events of one kind.
pub fn typed<F>(kind: EventKind, mut callback: F) -> EventCallback
where
    F: FnMut(&WindowEvent) -> Result<()> + 'static,
{
    Box::new(move |event| {
        if event.kind() == kind {
            callback(event)
        } else {
            Ok(())
        }
    })
}
