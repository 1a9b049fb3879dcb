use std::cell::{Cell, Ref, RefCell};
use std::fmt;

use thiserror::Error;

use super::target::{EventTarget, WeakEventTarget};
use crate::time;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("the event type cannot be the empty string")]
    EmptyType,
}

/// Where the event currently is in its (single-target) traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u16)]
pub enum EventPhase {
    #[default]
    None = 0,
    CapturingPhase = 1,
    AtTarget = 2,
    BubblingPhase = 3,
}

impl EventPhase {
    pub const ALL: [EventPhase; 4] = [
        EventPhase::None,
        EventPhase::CapturingPhase,
        EventPhase::AtTarget,
        EventPhase::BubblingPhase,
    ];

    pub fn code(self) -> u16 {
        self as u16
    }

    /// Constant name as exposed on the `Event` constructor.
    pub fn name(self) -> &'static str {
        match self {
            EventPhase::None => "NONE",
            EventPhase::CapturingPhase => "CAPTURING_PHASE",
            EventPhase::AtTarget => "AT_TARGET",
            EventPhase::BubblingPhase => "BUBBLING_PHASE",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventInit {
    pub bubbles: bool,
    pub cancelable: bool,
    pub composed: bool,
}

impl EventInit {
    pub fn cancelable() -> Self {
        Self {
            cancelable: true,
            ..Self::default()
        }
    }
}

/// Extra state carried by progress events.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Progress {
    pub length_computable: bool,
    pub loaded: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressEventInit {
    pub event: EventInit,
    pub length_computable: bool,
    pub loaded: f64,
    pub total: f64,
}

/// One occurrence of something listeners may react to.
///
/// All mutable state sits behind `Cell`/`RefCell`: listeners receive a shared
/// reference and mutate the event in place, and the dispatcher observes those
/// mutations between invocations.
pub struct Event {
    event_type: RefCell<String>,
    bubbles: Cell<bool>,
    cancelable: Cell<bool>,
    composed: bool,
    phase: Cell<EventPhase>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
    immediate_propagation_stopped: Cell<bool>,
    is_trusted: bool,
    time_stamp: f64,
    target: RefCell<Option<WeakEventTarget>>,
    current_target: RefCell<Option<WeakEventTarget>>,
    progress: Option<Progress>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, init: EventInit) -> Result<Self, EventError> {
        Self::build(event_type.into(), init, false, None)
    }

    /// An event synthesized by the host rather than by script code.
    pub fn trusted(event_type: impl Into<String>, init: EventInit) -> Result<Self, EventError> {
        Self::build(event_type.into(), init, true, None)
    }

    pub fn progress(
        event_type: impl Into<String>,
        init: ProgressEventInit,
    ) -> Result<Self, EventError> {
        let progress = Progress {
            length_computable: init.length_computable,
            loaded: byte_count(init.loaded),
            total: byte_count(init.total),
        };
        Self::build(event_type.into(), init.event, false, Some(progress))
    }

    fn build(
        event_type: String,
        init: EventInit,
        is_trusted: bool,
        progress: Option<Progress>,
    ) -> Result<Self, EventError> {
        if event_type.is_empty() {
            return Err(EventError::EmptyType);
        }
        Ok(Self {
            event_type: RefCell::new(event_type),
            bubbles: Cell::new(init.bubbles),
            cancelable: Cell::new(init.cancelable),
            composed: init.composed,
            phase: Cell::new(EventPhase::None),
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
            immediate_propagation_stopped: Cell::new(false),
            is_trusted,
            time_stamp: time::now(),
            target: RefCell::new(None),
            current_target: RefCell::new(None),
            progress,
        })
    }

    pub fn event_type(&self) -> Ref<'_, str> {
        Ref::map(self.event_type.borrow(), String::as_str)
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles.get()
    }

    pub fn cancelable(&self) -> bool {
        self.cancelable.get()
    }

    pub fn composed(&self) -> bool {
        self.composed
    }

    pub fn phase(&self) -> EventPhase {
        self.phase.get()
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped.get()
    }

    pub fn is_trusted(&self) -> bool {
        self.is_trusted
    }

    pub fn time_stamp(&self) -> f64 {
        self.time_stamp
    }

    pub fn progress_state(&self) -> Option<&Progress> {
        self.progress.as_ref()
    }

    /// The target the event was last dispatched on, if it is still alive.
    pub fn target(&self) -> Option<EventTarget> {
        self.target.borrow().as_ref().and_then(WeakEventTarget::upgrade)
    }

    pub fn current_target(&self) -> Option<EventTarget> {
        self.current_target
            .borrow()
            .as_ref()
            .and_then(WeakEventTarget::upgrade)
    }

    /// Ignored unless the event is cancelable.
    pub fn prevent_default(&self) {
        if self.cancelable.get() {
            self.default_prevented.set(true);
        }
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    /// Also marks the default as prevented, regardless of `cancelable`.
    /// With single-target dispatch that is what halts the remaining listeners.
    pub fn stop_immediate_propagation(&self) {
        self.propagation_stopped.set(true);
        self.immediate_propagation_stopped.set(true);
        self.default_prevented.set(true);
    }

    /// Always empty: there is no tree to traverse.
    pub fn composed_path(&self) -> Vec<EventTarget> {
        Vec::new()
    }

    /// Legacy re-initialization. Leaves every other piece of state untouched.
    pub fn init_event(
        &self,
        event_type: impl Into<String>,
        bubbles: bool,
        cancelable: bool,
    ) -> Result<(), EventError> {
        let event_type = event_type.into();
        if event_type.is_empty() {
            return Err(EventError::EmptyType);
        }
        *self.event_type.borrow_mut() = event_type;
        self.bubbles.set(bubbles);
        self.cancelable.set(cancelable);
        Ok(())
    }

    pub(crate) fn set_phase(&self, phase: EventPhase) {
        self.phase.set(phase);
    }

    pub(crate) fn set_target(&self, target: Option<WeakEventTarget>) {
        *self.target.borrow_mut() = target;
    }

    pub(crate) fn set_current_target(&self, target: Option<WeakEventTarget>) {
        *self.current_target.borrow_mut() = target;
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &*self.event_type.borrow())
            .field("bubbles", &self.bubbles.get())
            .field("cancelable", &self.cancelable.get())
            .field("composed", &self.composed)
            .field("phase", &self.phase.get())
            .field("default_prevented", &self.default_prevented.get())
            .field("is_trusted", &self.is_trusted)
            .field("progress", &self.progress)
            .finish()
    }
}

/// Byte counts are whole; negative and non-finite values read as zero.
fn byte_count(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value.trunc()
    } else {
        0.0
    }
}
