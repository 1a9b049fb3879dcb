use webshim::{ShimConfig, WebShim};

fn shim() -> WebShim {
    WebShim::new(&ShimConfig::ephemeral()).expect("web shim")
}

#[tokio::test]
async fn test_add_event_listener() {
    let shim = shim();

    let log: String = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            const log = [];
            target.addEventListener('ping', function (event) {
                log.push(event.type);
            });
            target.dispatchEvent(new Event('ping'));
            target.dispatchEvent(new Event('pong'));
            log.join(',');
        "#,
            "event-test.js",
        )
        .expect("evaluate script");

    assert_eq!(log, "ping");
}

#[tokio::test]
async fn test_remove_event_listener() {
    let shim = shim();

    let count: i32 = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            let count = 0;
            function handler() {
                count++;
            }
            target.addEventListener('ping', handler);
            target.dispatchEvent(new Event('ping'));
            target.removeEventListener('ping', handler);
            target.dispatchEvent(new Event('ping'));
            count;
        "#,
            "remove-event-test.js",
        )
        .expect("evaluate script");

    assert_eq!(count, 1, "listener should only fire before removal");
}

#[tokio::test]
async fn test_dispatch_without_listeners_reflects_default_prevented() {
    let shim = shim();

    let result: String = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            const fresh = target.dispatchEvent(new Event('nothing', { cancelable: true }));
            const prevented = new Event('nothing', { cancelable: true });
            prevented.preventDefault();
            [fresh, target.dispatchEvent(prevented)].join(',');
        "#,
            "no-listeners.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "true,false");
}

#[tokio::test]
async fn test_duplicate_registration_is_ignored() {
    let shim = shim();

    let calls: i32 = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            let calls = 0;
            const listener = () => calls++;
            target.addEventListener('ping', listener);
            target.addEventListener('ping', listener);
            target.addEventListener('ping', listener, { capture: false });
            target.dispatchEvent(new Event('ping'));
            calls;
        "#,
            "duplicate.js",
        )
        .expect("evaluate script");

    assert_eq!(calls, 1);
}

#[tokio::test]
async fn test_capture_flag_distinguishes_registrations() {
    let shim = shim();

    let result: String = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            let calls = 0;
            const listener = () => calls++;
            target.addEventListener('ping', listener);
            target.addEventListener('ping', listener, true);
            target.dispatchEvent(new Event('ping'));
            const both = calls;
            target.removeEventListener('ping', listener, { capture: true });
            target.dispatchEvent(new Event('ping'));
            [both, calls].join(',');
        "#,
            "capture.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "2,3");
}

#[tokio::test]
async fn test_once_listener_fires_once() {
    let shim = shim();

    let calls: i32 = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            let calls = 0;
            target.addEventListener('ping', () => calls++, { once: true });
            for (let i = 0; i < 3; i++) {
                target.dispatchEvent(new Event('ping'));
            }
            calls;
        "#,
            "once.js",
        )
        .expect("evaluate script");

    assert_eq!(calls, 1);
}

#[tokio::test]
async fn test_prevent_default_stops_remaining_listeners() {
    let shim = shim();

    let result: String = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            const log = [];
            target.addEventListener('go', (event) => {
                log.push('first');
                event.preventDefault();
            });
            target.addEventListener('go', () => log.push('second'));
            const proceed = target.dispatchEvent(new Event('go', { cancelable: true }));
            [proceed, log.join('|')].join(',');
        "#,
            "prevent.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "false,first");
}

#[tokio::test]
async fn test_prevent_default_on_non_cancelable_event_is_ignored() {
    let shim = shim();

    let result: String = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            const log = [];
            target.addEventListener('go', (event) => {
                event.preventDefault();
                log.push(event.defaultPrevented);
            });
            target.addEventListener('go', () => log.push('second'));
            const proceed = target.dispatchEvent(new Event('go'));
            [proceed, log.join('|')].join(',');
        "#,
            "non-cancelable.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "true,false|second");
}

#[tokio::test]
async fn test_listener_mutations_apply_to_next_dispatch() {
    let shim = shim();

    let log: String = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            const log = [];
            const late = () => log.push('late');
            const victim = () => log.push('victim');
            target.addEventListener('tick', () => {
                log.push('first');
                target.addEventListener('tick', late);
                target.removeEventListener('tick', victim);
            });
            target.addEventListener('tick', victim);
            target.dispatchEvent(new Event('tick'));
            log.push('/');
            target.dispatchEvent(new Event('tick'));
            log.join(',');
        "#,
            "snapshot.js",
        )
        .expect("evaluate script");

    assert_eq!(log, "first,victim,/,first,late");
}

#[tokio::test]
async fn test_once_and_prevent_default_scenario() {
    let shim = shim();

    let result: String = shim
        .eval_with(
            r#"
            const t = new EventTarget();
            const log = [];
            const l1 = () => log.push('A');
            const l2 = (event) => {
                log.push('B');
                event.preventDefault();
            };
            const l3 = () => log.push('C');
            t.addEventListener('x', l1);
            t.addEventListener('x', l2, { once: true });
            t.addEventListener('x', l3);
            const first = t.dispatchEvent(new Event('x', { cancelable: true }));
            const afterFirst = log.join('');
            const second = t.dispatchEvent(new Event('x', { cancelable: true }));
            [first, afterFirst, second, log.join('')].join(',');
        "#,
            "scenario.js",
        )
        .expect("evaluate script");

    // l2 is gone after the first dispatch, so the second one reaches l3.
    assert_eq!(result, "false,AB,true,ABAC");
}

#[tokio::test]
async fn test_remove_unknown_listener_is_noop() {
    let shim = shim();

    shim.eval(
        r#"
        const target = new EventTarget();
        target.removeEventListener('never', () => {});
        target.removeEventListener('never');
        target.removeEventListener();
        target.addEventListener('ping');
        target.addEventListener('ping', null);
        "#,
        "remove-unknown.js",
    )
    .expect("malformed calls should not throw");
}

#[tokio::test]
async fn test_dispatch_tolerates_non_events() {
    let shim = shim();

    let result: String = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            target.addEventListener('ping', () => { throw new Error('should not run'); });
            [
                target.dispatchEvent(),
                target.dispatchEvent('ping'),
                target.dispatchEvent({ type: 42 }),
                target.dispatchEvent({}),
            ].join(',');
        "#,
            "non-event.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "true,true,true,true");
}

#[tokio::test]
async fn test_dispatch_plain_object_with_string_type() {
    let shim = shim();

    let result: String = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            const seen = [];
            target.addEventListener('ping', function (event) {
                seen.push(this === target, event.detail);
            });
            target.addEventListener('ping', (event) => {
                seen.push('cancel');
                event.defaultPrevented = true;
            });
            target.addEventListener('ping', () => seen.push('late'));
            target.addEventListener('pong', () => seen.push('pong'), { once: true });

            const first = target.dispatchEvent({ type: 'ping', detail: 'plain' });
            const untouched = target.dispatchEvent({ type: 'quiet' });
            const already = target.dispatchEvent({ type: 'pong', defaultPrevented: true });
            target.dispatchEvent({ type: 'pong' });
            [first, untouched, already, ...seen].join(',');
        "#,
            "plain-object.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "false,true,false,true,plain,cancel,pong");
}

#[tokio::test]
async fn test_handle_event_object_receives_target_as_this() {
    let shim = shim();

    let result: String = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            const seen = [];
            const handler = {
                handleEvent(event) {
                    seen.push(
                        this === target,
                        event.currentTarget === target,
                        event.target === target,
                    );
                },
            };
            target.addEventListener('ping', handler);
            target.addEventListener('ping', handler);
            target.addEventListener('ping', { notAHandler: true });
            target.dispatchEvent(new Event('ping'));
            seen.join(',');
        "#,
            "handle-event.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "true,true,true");
}

#[tokio::test]
async fn test_handle_event_is_looked_up_per_dispatch() {
    let shim = shim();

    let log: String = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            const log = [];
            const handler = { handleEvent() { log.push('one'); } };
            target.addEventListener('ping', handler);
            target.dispatchEvent(new Event('ping'));
            handler.handleEvent = () => log.push('two');
            target.dispatchEvent(new Event('ping'));
            log.join(',');
        "#,
            "handle-event-swap.js",
        )
        .expect("evaluate script");

    assert_eq!(log, "one,two");
}

#[tokio::test]
async fn test_throwing_listener_propagates_to_caller() {
    let shim = shim();

    let result: String = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            const log = [];
            target.addEventListener('boom', () => { throw new RangeError('listener failed'); });
            target.addEventListener('boom', () => log.push('after'));
            let caught = 'none';
            try {
                target.dispatchEvent(new Event('boom'));
            } catch (err) {
                caught = `${err.name}: ${err.message}`;
            }
            [caught, log.length].join(',');
        "#,
            "throwing.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "RangeError: listener failed,0");
}

#[tokio::test]
async fn test_uncaught_listener_error_surfaces_from_eval() {
    let shim = shim();

    let err = shim
        .eval(
            r#"
            const target = new EventTarget();
            target.addEventListener('boom', () => { throw new TypeError('bad listener'); });
            target.dispatchEvent(new Event('boom'));
            "#,
            "uncaught.js",
        )
        .expect_err("listener error should reach the host");

    assert!(
        err.to_string().contains("TypeError: bad listener"),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn test_stop_immediate_propagation_prevents_default() {
    let shim = shim();

    let result: String = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            const log = [];
            target.addEventListener('go', (event) => {
                log.push('first');
                event.stopImmediatePropagation();
            });
            target.addEventListener('go', () => log.push('second'));
            const event = new Event('go');
            const proceed = target.dispatchEvent(event);
            [proceed, event.defaultPrevented, log.join('|')].join(',');
        "#,
            "stop-immediate.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "false,true,first");
}

#[tokio::test]
async fn test_event_defaults_and_phase_constants() {
    let shim = shim();

    let result: String = shim
        .eval_with(
            r#"
            const event = new Event('load');
            const phases = [
                Event.NONE,
                Event.CAPTURING_PHASE,
                Event.AT_TARGET,
                Event.BUBBLING_PHASE,
            ];
            [
                event.type,
                event.bubbles,
                event.cancelable,
                event.composed,
                event.isTrusted,
                event.eventPhase,
                event.target,
                event.composedPath().length,
                typeof event.timeStamp,
                phases.join(''),
                EventPhase.AT_TARGET,
                event.AT_TARGET,
            ].join(',');
        "#,
            "defaults.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "load,false,false,false,false,0,,0,number,0123,2,2");
}

#[tokio::test]
async fn test_event_phase_and_targets_during_dispatch() {
    let shim = shim();

    let result: String = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            const event = new Event('ping');
            let during;
            target.addEventListener('ping', (e) => {
                during = [e.eventPhase, e.currentTarget === target, e === event];
            });
            target.dispatchEvent(event);
            [...during, event.eventPhase, event.target === target, event.currentTarget].join(',');
        "#,
            "phase.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "2,true,true,0,true,");
}

#[tokio::test]
async fn test_event_constructor_requires_type() {
    let shim = shim();

    let result: String = shim
        .eval_with(
            r#"
            let message = 'none';
            try {
                new Event();
            } catch (err) {
                message = err.name;
            }
            const coerced = new Event(42);
            [message, coerced.type].join(',');
        "#,
            "constructor.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "TypeError,42");
}

#[tokio::test]
async fn test_init_event_overwrites_type_and_flags() {
    let shim = shim();

    let result: String = shim
        .eval_with(
            r#"
            const event = new Event('before', { composed: true });
            event.initEvent('after', true, true);
            event.initEvent('again', true, true);
            event.preventDefault();
            [
                event.type,
                event.bubbles,
                event.cancelable,
                event.composed,
                event.defaultPrevented,
            ].join(',');
        "#,
            "init-event.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "again,true,true,true,true");
}

#[tokio::test]
async fn test_progress_event() {
    let shim = shim();

    let result: String = shim
        .eval_with(
            r#"
            const event = new ProgressEvent('progress', {
                lengthComputable: true,
                loaded: 50,
                total: 100,
            });
            const plain = new ProgressEvent('loadstart');
            [
                event.type,
                event.lengthComputable,
                event.loaded,
                event.total,
                event.bubbles,
                event.cancelable,
                event instanceof ProgressEvent,
                event instanceof Event,
                plain.lengthComputable,
                plain.loaded,
                plain.total,
            ].join(',');
        "#,
            "progress.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "progress,true,50,100,false,false,true,true,false,0,0");
}

#[tokio::test]
async fn test_progress_event_dispatches_like_any_event() {
    let shim = shim();

    let loaded: f64 = shim
        .eval_with(
            r#"
            const target = new EventTarget();
            let loaded = -1;
            target.addEventListener('progress', (event) => {
                loaded = event.loaded;
            });
            target.dispatchEvent(new ProgressEvent('progress', { loaded: 7 }));
            loaded;
        "#,
            "progress-dispatch.js",
        )
        .expect("evaluate script");

    assert_eq!(loaded, 7.0);
}

#[tokio::test]
async fn test_progress_event_counts_are_not_negative() {
    let shim = shim();

    let result: String = shim
        .eval_with(
            r#"
            const below = new ProgressEvent('progress', { loaded: -5, total: -1 });
            const odd = new ProgressEvent('progress', { loaded: 'junk', total: 9.75 });
            [below.loaded, below.total, odd.loaded, odd.total].join(',');
        "#,
            "progress-clamp.js",
        )
        .expect("evaluate script");

    assert_eq!(result, "0,0,0,9");
}
