use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Result;
use rquickjs::{Ctx, Function, Object, Persistent, Value};
use tracing::trace;

use super::registry::HostModule;
use super::runtime::QuickJsEngine;

struct TimerEntry {
    deadline: Instant,
    interval: Option<Duration>,
}

/// Deadline-ordered timer bookkeeping. Nothing fires on its own: the host
/// asks for due timers with [`TimerQueue::pop_due`].
pub struct TimerQueue {
    next_id: Cell<u32>,
    timers: RefCell<HashMap<u32, TimerEntry>>,
    min_interval: Duration,
}

impl TimerQueue {
    pub fn new(min_interval_ms: f64) -> Self {
        Self {
            next_id: Cell::new(1),
            timers: RefCell::new(HashMap::new()),
            min_interval: millis(min_interval_ms),
        }
    }

    fn next_id(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id.wrapping_add(1).max(1));
        id
    }

    pub fn register(&self, delay_ms: f64, repeating: bool) -> u32 {
        self.register_at(Instant::now(), delay_ms, repeating)
    }

    pub fn register_at(&self, now: Instant, delay_ms: f64, repeating: bool) -> u32 {
        let id = self.next_id();
        let mut delay = millis(delay_ms);
        if repeating && delay < self.min_interval {
            delay = self.min_interval;
        }

        self.timers.borrow_mut().insert(
            id,
            TimerEntry {
                deadline: now + delay,
                interval: repeating.then_some(delay),
            },
        );
        id
    }

    pub fn clear(&self, id: u32) -> bool {
        self.timers.borrow_mut().remove(&id).is_some()
    }

    pub fn clear_all(&self) {
        self.timers.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.borrow().is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers
            .borrow()
            .values()
            .map(|entry| entry.deadline)
            .min()
    }

    /// Take the earliest timer due at `now`. One-shot timers are removed,
    /// repeating ones move to their next deadline.
    pub fn pop_due(&self, now: Instant) -> Option<u32> {
        let mut timers = self.timers.borrow_mut();
        let id = timers
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .min_by_key(|(id, entry)| (entry.deadline, **id))
            .map(|(id, _)| *id)?;

        let interval = timers.get(&id).and_then(|entry| entry.interval);
        match interval {
            Some(interval) => {
                if let Some(entry) = timers.get_mut(&id) {
                    entry.deadline = now + interval;
                }
            }
            None => {
                timers.remove(&id);
            }
        }
        Some(id)
    }
}

fn millis(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_secs_f64(ms / 1_000.0)
    } else {
        Duration::ZERO
    }
}

struct TimerState {
    queue: TimerQueue,
    invoke: RefCell<Option<Persistent<Function<'static>>>>,
}

/// `setTimeout`, `setInterval` and their `clear*` counterparts.
///
/// Callbacks stay on the script side; the queue only tracks ids and deadlines.
#[derive(Clone)]
pub struct TimersModule {
    state: Rc<TimerState>,
}

impl TimersModule {
    pub fn new(min_interval_ms: f64) -> Self {
        Self {
            state: Rc::new(TimerState {
                queue: TimerQueue::new(min_interval_ms),
                invoke: RefCell::new(None),
            }),
        }
    }

    pub fn queue(&self) -> &TimerQueue {
        &self.state.queue
    }

    /// Drop the script-side invoke handle. Must happen before the engine goes
    /// away, since the handle pins a JS function.
    pub(crate) fn release(&self) {
        self.state.queue.clear_all();
        self.state.invoke.borrow_mut().take();
    }

    /// Run every timer that is due now. Returns how many callbacks ran.
    ///
    /// Timers registered by a callback are not due in the same poll, even with
    /// a zero delay. A throwing callback stops the poll and is reported.
    pub fn run_due(&self, engine: &QuickJsEngine) -> Result<usize> {
        let now = Instant::now();
        let mut executed = 0;
        while let Some(id) = self.state.queue.pop_due(now) {
            let invoke = self.state.invoke.borrow().clone();
            let Some(invoke) = invoke else {
                break;
            };
            trace!(target: "quickjs", timer_id = id, "firing timer");
            let ran = engine
                .with_context(|ctx| invoke.restore(&ctx)?.call::<_, bool>((id,)))
                .map_err(|err| anyhow::anyhow!("timer {id} threw: {err}"))?;
            engine.execute_pending_jobs();
            if ran {
                executed += 1;
            }
        }
        Ok(executed)
    }
}

impl HostModule for TimersModule {
    fn name(&self) -> &'static str {
        "timers"
    }

    fn uninitialize(&self, _ctx: &Ctx<'_>) -> rquickjs::Result<()> {
        self.release();
        Ok(())
    }

    fn exports<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Vec<(&'static str, Value<'js>)>> {
        let register = {
            let state = Rc::clone(&self.state);
            Function::new(ctx.clone(), move |delay: f64, repeating: bool| {
                state.queue.register(delay, repeating)
            })?
            .with_name("registerTimer")?
        };
        let clear = {
            let state = Rc::clone(&self.state);
            Function::new(ctx.clone(), move |id: f64| {
                if id.is_finite() && id >= 1.0 && id <= u32::MAX as f64 {
                    state.queue.clear(id as u32);
                }
            })?
            .with_name("clearTimer")?
        };

        let build: Function = ctx.eval(TIMERS_BOOTSTRAP)?;
        let timers: Object = build.call((register, clear))?;
        let invoke: Function = timers.get("invoke")?;
        *self.state.invoke.borrow_mut() = Some(Persistent::save(ctx, invoke));

        Ok(vec![
            ("setTimeout", timers.get::<_, Value>("setTimeout")?),
            ("setInterval", timers.get::<_, Value>("setInterval")?),
            ("clearTimeout", timers.get::<_, Value>("clearTimeout")?),
            ("clearInterval", timers.get::<_, Value>("clearInterval")?),
        ])
    }
}

const TIMERS_BOOTSTRAP: &str = r#"
((registerTimer, clearTimer) => {
    const callbacks = new Map();

    const schedule = (repeating) => function (callback, delay, ...args) {
        const id = registerTimer(Number(delay) || 0, repeating);
        callbacks.set(id, { callback, args, repeating });
        return id;
    };

    const cancel = function (id) {
        const key = Math.trunc(Number(id));
        callbacks.delete(key);
        clearTimer(key);
    };

    const invoke = (id) => {
        const entry = callbacks.get(id);
        if (!entry) {
            return false;
        }
        if (!entry.repeating) {
            callbacks.delete(id);
        }
        if (typeof entry.callback === 'function') {
            entry.callback.apply(globalThis, entry.args);
        } else {
            (0, eval)(String(entry.callback));
        }
        return true;
    };

    return {
        setTimeout: schedule(false),
        setInterval: schedule(true),
        clearTimeout: cancel,
        clearInterval: cancel,
        invoke,
    };
})
"#;
