use std::fmt;
use std::rc::Rc;

use anyhow::Result;

use super::event::Event;
use super::target::EventTarget;

/// An object that reacts to events through a `handle_event` method.
pub trait HandleEvent {
    fn handle_event(&self, event: &Event, target: &EventTarget) -> Result<()>;
}

type Callback = dyn Fn(&Event, &EventTarget) -> Result<()>;

/// A listener registration's callee.
///
/// Identity is pointer identity of the shared allocation: clones of one
/// `Listener` are the same listener, two separately built closures are not.
#[derive(Clone)]
pub enum Listener {
    Callable(Rc<Callback>),
    HandlerObject(Rc<dyn HandleEvent>),
}

impl Listener {
    pub fn callable<F>(callback: F) -> Self
    where
        F: Fn(&Event, &EventTarget) -> Result<()> + 'static,
    {
        Listener::Callable(Rc::new(callback))
    }

    pub fn handler<H>(handler: Rc<H>) -> Self
    where
        H: HandleEvent + 'static,
    {
        Listener::HandlerObject(handler)
    }

    pub(crate) fn invoke(&self, event: &Event, target: &EventTarget) -> Result<()> {
        match self {
            Listener::Callable(callback) => callback(event, target),
            Listener::HandlerObject(handler) => handler.handle_event(event, target),
        }
    }

    fn identity(&self) -> *const () {
        match self {
            Listener::Callable(callback) => Rc::as_ptr(callback) as *const (),
            Listener::HandlerObject(handler) => Rc::as_ptr(handler) as *const (),
        }
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Listener::Callable(_) => "Callable",
            Listener::HandlerObject(_) => "HandlerObject",
        };
        write!(f, "Listener::{kind}({:p})", self.identity())
    }
}
