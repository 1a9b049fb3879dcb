use std::time::Duration as StdDuration;

use tokio::time::{sleep, Duration};
use webshim::{ShimConfig, WebShim};

fn shim() -> WebShim {
    WebShim::new(&ShimConfig::ephemeral()).expect("web shim")
}

#[tokio::test]
async fn test_set_timeout() {
    let shim = shim();

    shim.eval(
        r#"
        globalThis.status = 'initial';
        setTimeout(function () {
            status = 'updated by timeout';
        }, 100);
        "#,
        "timeout-test.js",
    )
    .expect("evaluate script");

    assert_eq!(shim.poll_timers().expect("poll timers"), 0, "nothing is due yet");

    // Wait for the timeout to fire (async sleep)
    sleep(Duration::from_millis(150)).await;

    let executed = shim.poll_timers().expect("poll timers");
    assert_eq!(executed, 1, "should execute 1 timer");

    let status: String = shim.eval_with("status", "read.js").expect("read status");
    assert_eq!(status, "updated by timeout");
    assert!(!shim.has_pending_timers());
}

#[tokio::test]
async fn test_set_timeout_passes_arguments() {
    let shim = shim();

    shim.eval(
        r#"
        globalThis.received = '';
        setTimeout((a, b) => { received = `${a}-${b}`; }, 0, 'left', 'right');
        "#,
        "timeout-args.js",
    )
    .expect("evaluate script");

    sleep(Duration::from_millis(5)).await;
    shim.poll_timers().expect("poll timers");

    let received: String = shim.eval_with("received", "read.js").expect("read");
    assert_eq!(received, "left-right");
}

#[tokio::test]
async fn test_set_interval() {
    let shim = shim();

    shim.eval(
        r#"
        globalThis.count = 0;
        globalThis.testIntervalId = setInterval(function () {
            count++;
        }, 20);
        "#,
        "interval-test.js",
    )
    .expect("evaluate script");

    for _ in 0..3 {
        sleep(Duration::from_millis(30)).await;
        shim.poll_timers().expect("poll timers");
    }

    let count: i32 = shim.eval_with("count", "read.js").expect("read count");
    assert!(count >= 3, "interval should fire on every poll, got {count}");
    assert!(shim.has_pending_timers());

    shim.eval("clearInterval(testIntervalId);", "clear-interval.js")
        .expect("clear interval");
    assert!(!shim.has_pending_timers());

    sleep(Duration::from_millis(30)).await;
    assert_eq!(shim.poll_timers().expect("poll timers"), 0);
}

#[tokio::test]
async fn test_clear_timeout() {
    let shim = shim();

    shim.eval(
        r#"
        globalThis.fired = false;
        const id = setTimeout(() => { fired = true; }, 10);
        clearTimeout(id);
        clearTimeout(9999);
        clearTimeout();
        "#,
        "clear-timeout.js",
    )
    .expect("evaluate script");

    sleep(Duration::from_millis(20)).await;
    assert_eq!(shim.poll_timers().expect("poll timers"), 0);

    let fired: bool = shim.eval_with("fired", "read.js").expect("read");
    assert!(!fired);
}

#[tokio::test]
async fn test_clear_timeout_truncates_fractional_id() {
    let shim = shim();

    shim.eval(
        r#"
        globalThis.fired = false;
        const id = setTimeout(() => { fired = true; }, 10);
        clearTimeout(id + 0.5);
        "#,
        "clear-fractional.js",
    )
    .expect("evaluate script");
    assert!(!shim.has_pending_timers());

    sleep(Duration::from_millis(20)).await;
    assert_eq!(shim.poll_timers().expect("poll timers"), 0);

    let fired: bool = shim.eval_with("fired", "read.js").expect("read");
    assert!(!fired);
}

#[tokio::test]
async fn test_timers_fire_in_deadline_order() {
    let shim = shim();

    shim.eval(
        r#"
        globalThis.order = [];
        setTimeout(() => order.push('slow'), 30);
        setTimeout(() => order.push('fast'), 5);
        setTimeout(() => order.push('immediate'), 0);
        "#,
        "order.js",
    )
    .expect("evaluate script");

    sleep(Duration::from_millis(50)).await;
    assert_eq!(shim.poll_timers().expect("poll timers"), 3);

    let order: String = shim.eval_with("order.join(',')", "read.js").expect("read");
    assert_eq!(order, "immediate,fast,slow");
}

#[tokio::test]
async fn test_string_callback_is_evaluated() {
    let shim = shim();

    shim.eval(
        r#"
        globalThis.fromString = 0;
        setTimeout('fromString = 42', 0);
        "#,
        "string-callback.js",
    )
    .expect("evaluate script");

    sleep(Duration::from_millis(5)).await;
    shim.poll_timers().expect("poll timers");

    let value: i32 = shim.eval_with("fromString", "read.js").expect("read");
    assert_eq!(value, 42);
}

#[tokio::test]
async fn test_throwing_timer_is_reported() {
    let shim = shim();

    shim.eval(
        "setTimeout(() => { throw new Error('timer exploded'); }, 0);",
        "throwing-timer.js",
    )
    .expect("evaluate script");

    sleep(Duration::from_millis(5)).await;
    let err = shim.poll_timers().expect_err("timer error should surface");
    assert!(err.to_string().contains("timer exploded"), "unexpected error: {err}");
}

#[tokio::test]
async fn test_run_until_idle_drains_nested_timers() {
    let shim = shim();

    shim.eval(
        r#"
        globalThis.steps = [];
        setTimeout(() => {
            steps.push('outer');
            setTimeout(() => steps.push('inner'), 5);
        }, 5);
        Promise.resolve().then(() => steps.push('microtask'));
        "#,
        "nested.js",
    )
    .expect("evaluate script");

    let drained = shim.run_until_idle(None).await.expect("run until idle");
    assert!(drained);

    let steps: String = shim.eval_with("steps.join(',')", "read.js").expect("read");
    assert_eq!(steps, "microtask,outer,inner");
}

#[tokio::test]
async fn test_run_until_idle_respects_limit() {
    let shim = shim();

    shim.eval(
        r#"
        globalThis.ticks = 0;
        setInterval(() => ticks++, 10);
        "#,
        "forever.js",
    )
    .expect("evaluate script");

    let drained = shim
        .run_until_idle(Some(StdDuration::from_millis(60)))
        .await
        .expect("run until idle");
    assert!(!drained, "an interval never drains");

    let ticks: i32 = shim.eval_with("ticks", "read.js").expect("read");
    assert!(ticks >= 1, "interval should have ticked, got {ticks}");
}

#[tokio::test]
async fn test_shutdown_clears_timers() {
    let shim = shim();

    shim.eval("setTimeout(() => {}, 1000);", "pending.js")
        .expect("evaluate script");
    assert!(shim.has_pending_timers());

    shim.shutdown().expect("shutdown");
    assert!(!shim.has_pending_timers());

    let kind: String = shim
        .eval_with("typeof setTimeout", "read.js")
        .expect("read");
    assert_eq!(kind, "undefined");
}
