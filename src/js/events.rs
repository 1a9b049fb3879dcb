//! QuickJS bindings for the event core.
//!
//! `Event` and `EventTarget` are native classes wrapping [`crate::events`];
//! `ProgressEvent` is a thin script-side subclass whose instances are native
//! events carrying progress state.

use std::cell::{Cell, RefCell};

use rquickjs::class::{Trace, Tracer};
use rquickjs::convert::Coerced;
use rquickjs::function::{Opt, This};
use rquickjs::object::Property;
use rquickjs::{Class, Ctx, Exception, FromJs, Function, IntoJs, JsLifetime, Object, Result, Value};

use super::registry::HostModule;
use crate::events::{
    AddEventListenerOptions, Event, EventInit, EventListenerOptions, EventPhase, ListenerRegistry,
    ProgressEventInit,
};

#[rquickjs::class(rename = "Event")]
pub struct JsEvent<'js> {
    event: Event,
    target: RefCell<Option<Value<'js>>>,
    current_target: RefCell<Option<Value<'js>>>,
}

unsafe impl<'js> JsLifetime<'js> for JsEvent<'js> {
    type Changed<'to> = JsEvent<'to>;
}

impl<'js> Trace<'js> for JsEvent<'js> {
    fn trace<'a>(&self, tracer: Tracer<'a, 'js>) {
        if let Some(target) = self.target.borrow().as_ref() {
            target.trace(tracer);
        }
        if let Some(target) = self.current_target.borrow().as_ref() {
            target.trace(tracer);
        }
    }
}

impl<'js> JsEvent<'js> {
    fn wrap(event: Event) -> Self {
        Self {
            event,
            target: RefCell::new(None),
            current_target: RefCell::new(None),
        }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    fn begin_dispatch(&self, target: &Value<'js>) {
        *self.target.borrow_mut() = Some(target.clone());
        *self.current_target.borrow_mut() = Some(target.clone());
    }

    fn end_dispatch(&self) {
        self.current_target.borrow_mut().take();
    }

    fn target_or_null(ctx: &Ctx<'js>, slot: &RefCell<Option<Value<'js>>>) -> Value<'js> {
        slot.borrow()
            .clone()
            .unwrap_or_else(|| Value::new_null(ctx.clone()))
    }
}

#[rquickjs::methods(rename_all = "camelCase")]
impl<'js> JsEvent<'js> {
    #[qjs(constructor)]
    pub fn new(ctx: Ctx<'js>, event_type: Opt<Value<'js>>, init: Opt<Value<'js>>) -> Result<Self> {
        let event_type = required_type(&ctx, "Event", event_type.0)?;
        let init = event_init(init.0.as_ref())?;
        let event = Event::new(event_type, init).map_err(|err| {
            Exception::throw_type(&ctx, &format!("Failed to construct 'Event': {err}"))
        })?;
        Ok(Self::wrap(event))
    }

    #[qjs(get, rename = "type")]
    pub fn event_type(&self) -> String {
        self.event.event_type().to_string()
    }

    #[qjs(get)]
    pub fn bubbles(&self) -> bool {
        self.event.bubbles()
    }

    #[qjs(get)]
    pub fn cancelable(&self) -> bool {
        self.event.cancelable()
    }

    #[qjs(get)]
    pub fn composed(&self) -> bool {
        self.event.composed()
    }

    #[qjs(get)]
    pub fn event_phase(&self) -> u16 {
        self.event.phase().code()
    }

    #[qjs(get)]
    pub fn default_prevented(&self) -> bool {
        self.event.default_prevented()
    }

    #[qjs(get)]
    pub fn return_value(&self) -> bool {
        !self.event.default_prevented()
    }

    #[qjs(get)]
    pub fn cancel_bubble(&self) -> bool {
        self.event.propagation_stopped()
    }

    #[qjs(get)]
    pub fn is_trusted(&self) -> bool {
        self.event.is_trusted()
    }

    #[qjs(get)]
    pub fn time_stamp(&self) -> f64 {
        self.event.time_stamp()
    }

    #[qjs(get)]
    pub fn target(&self, ctx: Ctx<'js>) -> Value<'js> {
        Self::target_or_null(&ctx, &self.target)
    }

    #[qjs(get)]
    pub fn src_element(&self, ctx: Ctx<'js>) -> Value<'js> {
        Self::target_or_null(&ctx, &self.target)
    }

    #[qjs(get)]
    pub fn current_target(&self, ctx: Ctx<'js>) -> Value<'js> {
        Self::target_or_null(&ctx, &self.current_target)
    }

    pub fn prevent_default(&self) {
        self.event.prevent_default();
    }

    pub fn stop_propagation(&self) {
        self.event.stop_propagation();
    }

    pub fn stop_immediate_propagation(&self) {
        self.event.stop_immediate_propagation();
    }

    pub fn composed_path(&self) -> Vec<Value<'js>> {
        Vec::new()
    }

    pub fn init_event(
        &self,
        ctx: Ctx<'js>,
        event_type: Opt<Value<'js>>,
        bubbles: Opt<Value<'js>>,
        cancelable: Opt<Value<'js>>,
    ) -> Result<()> {
        let event_type = required_type(&ctx, "initEvent", event_type.0)?;
        let bubbles = truthy(&ctx, bubbles.0)?;
        let cancelable = truthy(&ctx, cancelable.0)?;
        self.event
            .init_event(event_type, bubbles, cancelable)
            .map_err(|err| {
                Exception::throw_type(&ctx, &format!("Failed to execute 'initEvent': {err}"))
            })
    }
}

/// A registered script listener. Functions are called directly; any other
/// object has its `handleEvent` looked up on every invocation.
#[derive(Clone)]
pub enum JsListener<'js> {
    Callable(Function<'js>),
    HandlerObject(Object<'js>),
}

impl<'js> JsListener<'js> {
    fn from_value(value: Value<'js>) -> Option<Self> {
        if let Some(function) = value.as_function() {
            return Some(JsListener::Callable(function.clone()));
        }
        value
            .as_object()
            .map(|object| JsListener::HandlerObject(object.clone()))
    }

    fn as_value(&self) -> &Value<'js> {
        match self {
            JsListener::Callable(function) => function.as_value(),
            JsListener::HandlerObject(object) => object.as_value(),
        }
    }

    fn invoke(&self, target: &Value<'js>, event: &Value<'js>) -> Result<()> {
        let callback = match self {
            JsListener::Callable(function) => function.clone(),
            JsListener::HandlerObject(object) => {
                match object.get::<_, Value>("handleEvent")?.into_function() {
                    Some(function) => function,
                    None => return Ok(()),
                }
            }
        };
        callback.call::<_, Value>((This(target.clone()), event.clone()))?;
        Ok(())
    }
}

impl<'js> PartialEq for JsListener<'js> {
    fn eq(&self, other: &Self) -> bool {
        self.as_value() == other.as_value()
    }
}

#[derive(Default)]
#[rquickjs::class(rename = "EventTarget")]
pub struct JsEventTarget<'js> {
    registry: ListenerRegistry<JsListener<'js>>,
}

unsafe impl<'js> JsLifetime<'js> for JsEventTarget<'js> {
    type Changed<'to> = JsEventTarget<'to>;
}

impl<'js> Trace<'js> for JsEventTarget<'js> {
    fn trace<'a>(&self, tracer: Tracer<'a, 'js>) {
        self.registry
            .for_each_listener(|listener| listener.as_value().trace(tracer));
    }
}

impl<'js> JsEventTarget<'js> {
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.registry.listener_count(event_type)
    }
}

#[rquickjs::methods(rename_all = "camelCase")]
impl<'js> JsEventTarget<'js> {
    #[qjs(constructor)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event_listener(
        &self,
        ctx: Ctx<'js>,
        event_type: Opt<Value<'js>>,
        listener: Opt<Value<'js>>,
        options: Opt<Value<'js>>,
    ) -> Result<()> {
        let Some(listener) = listener.0.and_then(JsListener::from_value) else {
            return Ok(());
        };
        let Some(event_type) = optional_type(&ctx, event_type.0)? else {
            return Ok(());
        };
        let options = listener_options(options.0.as_ref())?;
        self.registry.add(&event_type, listener, options);
        Ok(())
    }

    pub fn remove_event_listener(
        &self,
        ctx: Ctx<'js>,
        event_type: Opt<Value<'js>>,
        listener: Opt<Value<'js>>,
        options: Opt<Value<'js>>,
    ) -> Result<()> {
        let Some(listener) = listener.0.and_then(JsListener::from_value) else {
            return Ok(());
        };
        let Some(event_type) = optional_type(&ctx, event_type.0)? else {
            return Ok(());
        };
        let options = listener_options(options.0.as_ref())?;
        self.registry
            .remove(&event_type, &listener, EventListenerOptions::from(options));
        Ok(())
    }

    /// Native events run the full algorithm. A plain object with a string
    /// `type` is handed to the listeners as is, with its `defaultPrevented`
    /// property read after each one. Anything else is let through with `true`.
    pub fn dispatch_event(
        this: This<Class<'js, Self>>,
        ctx: Ctx<'js>,
        event: Opt<Value<'js>>,
    ) -> Result<bool> {
        let Some(event_value) = event.0 else {
            return Ok(true);
        };
        let target_value: Value<'js> = this.0.clone().into_js(&ctx)?;
        let target = this.0.borrow();

        if let Ok(event_class) = Class::<JsEvent>::from_js(&ctx, event_value.clone()) {
            let event = event_class.borrow();
            event.begin_dispatch(&target_value);
            let proceed = target.registry.dispatch_with(&event.event, |registration| {
                registration.listener.invoke(&target_value, &event_value)
            });
            event.end_dispatch();
            return proceed;
        }

        let Some(object) = event_value.as_object() else {
            return Ok(true);
        };
        let Some(event_type) = object.get::<_, Value>("type")?.into_string() else {
            return Ok(true);
        };
        let event_type = event_type.to_string()?;

        let prevented = Cell::new(flag(object, "defaultPrevented")?);
        target
            .registry
            .dispatch_type(&event_type, || prevented.get(), |registration| {
                registration.listener.invoke(&target_value, &event_value)?;
                prevented.set(flag(object, "defaultPrevented")?);
                Ok(())
            })
    }
}

/// Registers `Event`, `EventTarget`, `ProgressEvent` and `EventPhase`.
pub struct EventsModule;

impl HostModule for EventsModule {
    fn name(&self) -> &'static str {
        "events"
    }

    fn exports<'js>(&self, ctx: &Ctx<'js>) -> Result<Vec<(&'static str, Value<'js>)>> {
        let scratch = Object::new(ctx.clone())?;
        Class::<JsEvent>::define(&scratch)?;
        Class::<JsEventTarget>::define(&scratch)?;

        let event_ctor: Object = scratch.get("Event")?;
        let event_proto: Object = event_ctor.get("prototype")?;
        let phases = Object::new(ctx.clone())?;
        for phase in EventPhase::ALL {
            event_ctor.prop(phase.name(), Property::from(phase.code()))?;
            event_proto.prop(phase.name(), Property::from(phase.code()))?;
            phases.prop(phase.name(), Property::from(phase.code()).enumerable())?;
        }

        let freeze: Function = ctx.globals().get::<_, Object>("Object")?.get("freeze")?;
        freeze.call::<_, Value>((phases.clone(),))?;

        let target_ctor: Value = scratch.get("EventTarget")?;
        let progress_ctor = progress_event_constructor(ctx, &event_ctor)?;

        Ok(vec![
            ("Event", event_ctor.into_value()),
            ("EventTarget", target_ctor),
            ("ProgressEvent", progress_ctor),
            ("EventPhase", phases.into_value()),
        ])
    }
}

fn progress_event_constructor<'js>(ctx: &Ctx<'js>, event_ctor: &Object<'js>) -> Result<Value<'js>> {
    let create = Function::new(
        ctx.clone(),
        |ctx: Ctx<'js>,
         event_type: Opt<Value<'js>>,
         init: Opt<Value<'js>>|
         -> Result<Class<'js, JsEvent<'js>>> {
            let event_type = required_type(&ctx, "ProgressEvent", event_type.0)?;
            let init = progress_init(init.0.as_ref())?;
            let event = Event::progress(event_type, init).map_err(|err| {
                Exception::throw_type(&ctx, &format!("Failed to construct 'ProgressEvent': {err}"))
            })?;
            Class::instance(ctx, JsEvent::wrap(event))
        },
    )?
    .with_name("createProgressEvent")?;

    let field = Function::new(
        ctx.clone(),
        |ctx: Ctx<'js>, event: Class<'js, JsEvent<'js>>, name: String| -> Result<Value<'js>> {
            let progress = event
                .borrow()
                .event
                .progress_state()
                .copied()
                .unwrap_or_default();
            match name.as_str() {
                "lengthComputable" => progress.length_computable.into_js(&ctx),
                "loaded" => progress.loaded.into_js(&ctx),
                "total" => progress.total.into_js(&ctx),
                _ => Ok(Value::new_undefined(ctx)),
            }
        },
    )?
    .with_name("progressField")?;

    let build: Function = ctx.eval(PROGRESS_EVENT_BOOTSTRAP)?;
    build.call((event_ctor.clone(), create, field))
}

fn required_type<'js>(
    ctx: &Ctx<'js>,
    operation: &str,
    value: Option<Value<'js>>,
) -> Result<String> {
    match value {
        Some(value) if !value.is_undefined() => Ok(Coerced::<String>::from_js(ctx, value)?.0),
        _ => Err(Exception::throw_type(
            ctx,
            &format!("Failed to execute '{operation}': 1 argument required, but only 0 present."),
        )),
    }
}

fn optional_type<'js>(ctx: &Ctx<'js>, value: Option<Value<'js>>) -> Result<Option<String>> {
    match value {
        Some(value) if !value.is_undefined() => Ok(Some(Coerced::<String>::from_js(ctx, value)?.0)),
        _ => Ok(None),
    }
}

fn truthy<'js>(ctx: &Ctx<'js>, value: Option<Value<'js>>) -> Result<bool> {
    match value {
        Some(value) => Ok(Coerced::<bool>::from_js(ctx, value)?.0),
        None => Ok(false),
    }
}

fn flag<'js>(object: &Object<'js>, key: &str) -> Result<bool> {
    Ok(object.get::<_, Coerced<bool>>(key)?.0)
}

fn number<'js>(object: &Object<'js>, key: &str) -> Result<f64> {
    let value: Value = object.get(key)?;
    if value.is_undefined() {
        return Ok(0.0);
    }
    Ok(Coerced::<f64>::from_js(object.ctx(), value)?.0)
}

fn event_init<'js>(init: Option<&Value<'js>>) -> Result<EventInit> {
    let Some(object) = init.and_then(Value::as_object) else {
        return Ok(EventInit::default());
    };
    Ok(EventInit {
        bubbles: flag(object, "bubbles")?,
        cancelable: flag(object, "cancelable")?,
        composed: flag(object, "composed")?,
    })
}

fn progress_init<'js>(init: Option<&Value<'js>>) -> Result<ProgressEventInit> {
    let event = event_init(init)?;
    let Some(object) = init.and_then(Value::as_object) else {
        return Ok(ProgressEventInit {
            event,
            ..ProgressEventInit::default()
        });
    };
    Ok(ProgressEventInit {
        event,
        length_computable: flag(object, "lengthComputable")?,
        loaded: number(object, "loaded")?,
        total: number(object, "total")?,
    })
}

/// `true`/`false` is the capture shorthand; an object supplies every flag.
fn listener_options<'js>(options: Option<&Value<'js>>) -> Result<AddEventListenerOptions> {
    let Some(options) = options else {
        return Ok(AddEventListenerOptions::default());
    };
    if let Some(capture) = options.as_bool() {
        return Ok(AddEventListenerOptions::from(capture));
    }
    let Some(object) = options.as_object() else {
        return Ok(AddEventListenerOptions::default());
    };
    Ok(AddEventListenerOptions {
        capture: flag(object, "capture")?,
        once: flag(object, "once")?,
        passive: flag(object, "passive")?,
    })
}

const PROGRESS_EVENT_BOOTSTRAP: &str = r#"
((Event, createProgressEvent, progressField) => {
    function ProgressEvent(type, init) {
        if (new.target === undefined) {
            throw new TypeError(
                "Failed to construct 'ProgressEvent': Please use the 'new' operator",
            );
        }
        const event = createProgressEvent(type, init);
        Object.setPrototypeOf(event, new.target.prototype);
        return event;
    }

    ProgressEvent.prototype = Object.create(Event.prototype, {
        constructor: { value: ProgressEvent, writable: true, configurable: true },
    });

    for (const name of ['lengthComputable', 'loaded', 'total']) {
        Object.defineProperty(ProgressEvent.prototype, name, {
            get() {
                return progressField(this, name);
            },
            enumerable: true,
            configurable: true,
        });
    }

    Object.setPrototypeOf(ProgressEvent, Event);
    return ProgressEvent;
})
"#;
