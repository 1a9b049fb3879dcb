use std::fmt;
use std::rc::{Rc, Weak};

use anyhow::Result;

use super::event::Event;
use super::listener::Listener;
use super::registry::{AddEventListenerOptions, EventListenerOptions, ListenerRegistry};

/// Rust-side event target. Cloning yields another handle to the same target.
#[derive(Clone, Default)]
pub struct EventTarget {
    registry: Rc<ListenerRegistry<Listener>>,
}

/// Non-owning reference to an [`EventTarget`], as stored on dispatched events.
#[derive(Clone)]
pub struct WeakEventTarget {
    registry: Weak<ListenerRegistry<Listener>>,
}

impl WeakEventTarget {
    pub fn upgrade(&self) -> Option<EventTarget> {
        self.registry
            .upgrade()
            .map(|registry| EventTarget { registry })
    }
}

impl EventTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn downgrade(&self) -> WeakEventTarget {
        WeakEventTarget {
            registry: Rc::downgrade(&self.registry),
        }
    }

    pub fn add_event_listener(
        &self,
        event_type: &str,
        listener: Listener,
        options: impl Into<AddEventListenerOptions>,
    ) {
        self.registry.add(event_type, listener, options.into());
    }

    pub fn remove_event_listener(
        &self,
        event_type: &str,
        listener: &Listener,
        options: impl Into<EventListenerOptions>,
    ) {
        self.registry.remove(event_type, listener, options.into());
    }

    pub fn has_event_listener(
        &self,
        event_type: &str,
        listener: &Listener,
        options: impl Into<EventListenerOptions>,
    ) -> bool {
        self.registry.contains(event_type, listener, options.into())
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.registry.listener_count(event_type)
    }

    /// Invoke the listeners registered for `event`'s type.
    ///
    /// Returns `Ok(false)` when a listener prevented the default action. A
    /// listener error aborts the dispatch and is handed back unchanged.
    pub fn dispatch_event(&self, event: &Event) -> Result<bool> {
        let weak = self.downgrade();
        event.set_target(Some(weak.clone()));
        event.set_current_target(Some(weak));

        let proceed = self
            .registry
            .dispatch_with(event, |registration| registration.listener.invoke(event, self));

        event.set_current_target(None);
        proceed
    }

    pub fn ptr_eq(&self, other: &EventTarget) -> bool {
        Rc::ptr_eq(&self.registry, &other.registry)
    }
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTarget")
            .field("ptr", &Rc::as_ptr(&self.registry))
            .finish()
    }
}
