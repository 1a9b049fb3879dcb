use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use tracing::trace;

use super::event::{Event, EventPhase};

/// Flags accepted by `addEventListener`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddEventListenerOptions {
    pub capture: bool,
    pub once: bool,
    pub passive: bool,
}

impl AddEventListenerOptions {
    pub fn once() -> Self {
        Self {
            once: true,
            ..Self::default()
        }
    }
}

impl From<bool> for AddEventListenerOptions {
    fn from(capture: bool) -> Self {
        Self {
            capture,
            ..Self::default()
        }
    }
}

/// Flags accepted by `removeEventListener`; only `capture` takes part in matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventListenerOptions {
    pub capture: bool,
}

impl From<bool> for EventListenerOptions {
    fn from(capture: bool) -> Self {
        Self { capture }
    }
}

impl From<AddEventListenerOptions> for EventListenerOptions {
    fn from(options: AddEventListenerOptions) -> Self {
        Self {
            capture: options.capture,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registration<L> {
    serial: u64,
    pub listener: L,
    pub capture: bool,
    pub once: bool,
    pub passive: bool,
}

impl<L: PartialEq> Registration<L> {
    fn matches(&self, listener: &L, capture: bool) -> bool {
        self.capture == capture && self.listener == *listener
    }
}

/// Event-type keyed listener lists plus the dispatch algorithm.
///
/// `L` supplies listener identity through `PartialEq`; the registry never
/// invokes listeners itself; `dispatch_with` hands each one to the caller.
/// All methods take `&self` so listeners may re-enter the registry while a
/// dispatch is in progress.
pub struct ListenerRegistry<L> {
    listeners: RefCell<HashMap<String, Vec<Registration<L>>>>,
    next_serial: Cell<u64>,
}

impl<L> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self {
            listeners: RefCell::new(HashMap::new()),
            next_serial: Cell::new(1),
        }
    }
}

impl<L: Clone + PartialEq> ListenerRegistry<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when an equivalent registration already exists.
    pub fn add(&self, event_type: &str, listener: L, options: AddEventListenerOptions) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let list = listeners.entry(event_type.to_string()).or_default();
        if list
            .iter()
            .any(|registration| registration.matches(&listener, options.capture))
        {
            return false;
        }

        let serial = self.next_serial.get();
        self.next_serial.set(serial.wrapping_add(1));
        list.push(Registration {
            serial,
            listener,
            capture: options.capture,
            once: options.once,
            passive: options.passive,
        });
        true
    }

    /// Removes the first registration matching `(listener, capture)`.
    pub fn remove(&self, event_type: &str, listener: &L, options: EventListenerOptions) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(list) = listeners.get_mut(event_type) else {
            return false;
        };
        let Some(index) = list
            .iter()
            .position(|registration| registration.matches(listener, options.capture))
        else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            listeners.remove(event_type);
        }
        true
    }

    pub fn contains(&self, event_type: &str, listener: &L, options: EventListenerOptions) -> bool {
        self.listeners
            .borrow()
            .get(event_type)
            .map(|list| {
                list.iter()
                    .any(|registration| registration.matches(listener, options.capture))
            })
            .unwrap_or(false)
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners
            .borrow()
            .get(event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    /// Visit every registered listener. Used by hosts that must report the
    /// values they keep alive to a garbage collector.
    pub fn for_each_listener(&self, mut visit: impl FnMut(&L)) {
        for list in self.listeners.borrow().values() {
            for registration in list {
                visit(&registration.listener);
            }
        }
    }

    /// Run the dispatch algorithm for `event`, calling `invoke` once per
    /// registration in registration order.
    ///
    /// The list is snapshotted before the first call, so registrations added or
    /// removed by a listener only affect later dispatches. Iteration stops as
    /// soon as the event's default is prevented. `once` registrations that were
    /// reached are dropped from the live list afterwards. An error from `invoke`
    /// is returned immediately and skips that cleanup.
    ///
    /// Returns `true` when the default action should proceed.
    pub fn dispatch_with<E, F>(&self, event: &Event, invoke: F) -> Result<bool, E>
    where
        F: FnMut(&Registration<L>) -> Result<(), E>,
    {
        let event_type = event.event_type().to_string();
        event.set_phase(EventPhase::AtTarget);
        let proceed = self.dispatch_type(&event_type, || event.default_prevented(), invoke);
        event.set_phase(EventPhase::None);
        proceed
    }

    /// The dispatch loop of [`ListenerRegistry::dispatch_with`] for events
    /// that are not [`Event`] records. `is_prevented` is consulted before the
    /// first listener and after each one.
    pub fn dispatch_type<E, P, F>(
        &self,
        event_type: &str,
        is_prevented: P,
        mut invoke: F,
    ) -> Result<bool, E>
    where
        P: Fn() -> bool,
        F: FnMut(&Registration<L>) -> Result<(), E>,
    {
        let snapshot = match self.listeners.borrow().get(event_type) {
            Some(list) if !list.is_empty() => list.clone(),
            _ => return Ok(!is_prevented()),
        };

        trace!(
            target: "webshim",
            event_type = %event_type,
            listeners = snapshot.len(),
            "dispatching event"
        );

        let mut expired = Vec::new();
        for registration in &snapshot {
            invoke(registration)?;
            if registration.once {
                expired.push(registration.serial);
            }
            if is_prevented() {
                break;
            }
        }

        if !expired.is_empty() {
            self.remove_serials(event_type, &expired);
        }

        Ok(!is_prevented())
    }

    fn remove_serials(&self, event_type: &str, serials: &[u64]) {
        let mut listeners = self.listeners.borrow_mut();
        if let Some(list) = listeners.get_mut(event_type) {
            list.retain(|registration| !serials.contains(&registration.serial));
            if list.is_empty() {
                listeners.remove(event_type);
            }
        }
    }
}
