//! Event dispatch core: events, listener registrations and single-target
//! dispatch with snapshot isolation.

pub mod event;
pub mod listener;
pub mod registry;
pub mod target;

pub use event::{Event, EventError, EventInit, EventPhase, Progress, ProgressEventInit};
pub use listener::{HandleEvent, Listener};
pub use registry::{
    AddEventListenerOptions, EventListenerOptions, ListenerRegistry, Registration,
};
pub use target::{EventTarget, WeakEventTarget};
